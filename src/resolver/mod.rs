//! # Exercise Identity Resolver
//!
//! Maps free-text exercise titles written by the plan generator onto canonical
//! library entries. Titles arrive with arbitrary casing, filler words,
//! parenthetical notes and abbreviations, so resolution runs an ordered list of
//! strategies and stops at the first one that produces a hit:
//!
//! 1. alias table
//! 2. exact (case-insensitive) name
//! 3. normalized retry of 1–2
//! 4. substring containment, either direction
//! 5. keyword scoring
//! 6. category keyword fallback
//!
//! Edit-distance matching is deliberately not part of that chain; it is only
//! reachable through [`Resolver::find_closest_match`].
//!
//! A miss is an ordinary `None`. Every hit carries a [`MatchStrategy`] saying
//! which strategy produced it.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use trainlog::library::ExerciseLibrary;
//! use trainlog::resolver::{MatchStrategy, Resolver};
//!
//! let resolver = Resolver::new(Arc::new(ExerciseLibrary::builtin().unwrap()));
//! let hit = resolver.resolve("Fingerboard Max Hangs").unwrap();
//! assert_eq!(hit.exercise.name, "Fingerboard Max Hangs (Crimps)");
//! assert_eq!(hit.strategy, MatchStrategy::Alias);
//! ```

pub mod aliases;
pub mod fuzzy;
pub mod normalize;

use crate::library::{Exercise, ExerciseCategory, ExerciseLibrary, SESSION_COMPLETE};
use aliases::{ALIASES, CATEGORY_KEYWORDS};
use normalize::{normalize_title, tokenize};
use std::collections::HashMap;
use std::sync::Arc;

/// Minimum keyword score a candidate must exceed.
const KEYWORD_THRESHOLD: u32 = 2;

/// Which lookup produced a normalized hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectMatch {
    Alias,
    ExactName,
}

/// Trace of the strategy that resolved a title
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Curated alias table
    Alias,
    /// Case-insensitive library name
    ExactName,
    /// Alias or exact match after normalizing the title
    Normalized {
        /// The normalized form that matched
        normalized: String,
        via: DirectMatch,
    },
    /// Library name and query contain one another
    Substring,
    /// Best token-overlap score
    KeywordScore { score: u32 },
    /// First exercise of a category named by a keyword in the query
    CategoryKeyword { keyword: &'static str },
    /// Edit-distance match (closest-match entry point only)
    Fuzzy { distance: usize },
}

/// A resolved title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    pub exercise: &'a Exercise,
    pub category: &'a ExerciseCategory,
    pub strategy: MatchStrategy,
}

impl Resolution<'_> {
    /// Whether the title was the reserved "session complete" marker.
    pub fn is_session_marker(&self) -> bool {
        self.exercise.name == SESSION_COMPLETE
    }
}

type Strategy = for<'a, 'b> fn(&'a Resolver, &'b str) -> Option<Resolution<'a>>;

/// Automatic strategy chain, in priority order.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("alias", Resolver::by_alias),
    ("exact", Resolver::by_exact_name),
    ("normalized", Resolver::by_normalized),
    ("substring", Resolver::by_substring),
    ("keyword", Resolver::by_keyword_score),
    ("category", Resolver::by_category_keyword),
];

/// Title → canonical exercise resolver
#[derive(Debug, Clone)]
pub struct Resolver {
    library: Arc<ExerciseLibrary>,
    aliases: HashMap<&'static str, &'static str>,
}

impl Resolver {
    pub fn new(library: Arc<ExerciseLibrary>) -> Self {
        Self {
            library,
            aliases: ALIASES.iter().copied().collect(),
        }
    }

    pub fn library(&self) -> &ExerciseLibrary {
        &self.library
    }

    /// Run the strategy chain. `None` means unresolved.
    pub fn resolve(&self, title: &str) -> Option<Resolution<'_>> {
        let query = title.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }

        for (name, strategy) in STRATEGIES {
            if let Some(hit) = strategy(self, &query) {
                tracing::debug!(
                    title,
                    strategy = name,
                    exercise = %hit.exercise.name,
                    "resolved exercise title"
                );
                return Some(hit);
            }
        }

        tracing::debug!(title, "exercise title unresolved");
        None
    }

    /// Closest library name by edit distance, if within `min(len) / 3`.
    ///
    /// Ties keep the first candidate in catalog order.
    pub fn find_closest_match(&self, title: &str) -> Option<Resolution<'_>> {
        let query = title.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }
        let query_len = query.chars().count();

        let mut best: Option<(usize, &Exercise, &ExerciseCategory)> = None;
        for (exercise, category) in self.library.iter() {
            let candidate = exercise.name.to_lowercase();
            let distance = fuzzy::levenshtein(&query, &candidate);
            if distance > fuzzy::max_distance(query_len, candidate.chars().count()) {
                continue;
            }
            if best.map_or(true, |(d, _, _)| distance < d) {
                best = Some((distance, exercise, category));
            }
        }

        best.map(|(distance, exercise, category)| Resolution {
            exercise,
            category,
            strategy: MatchStrategy::Fuzzy { distance },
        })
    }

    fn by_alias<'a>(&'a self, query: &str) -> Option<Resolution<'a>> {
        let canonical = self.aliases.get(query)?;
        let (exercise, category) = self.library.find_by_name(canonical)?;
        Some(Resolution {
            exercise,
            category,
            strategy: MatchStrategy::Alias,
        })
    }

    fn by_exact_name<'a>(&'a self, query: &str) -> Option<Resolution<'a>> {
        let (exercise, category) = self.library.find_by_name(query)?;
        Some(Resolution {
            exercise,
            category,
            strategy: MatchStrategy::ExactName,
        })
    }

    fn by_normalized<'a>(&'a self, query: &str) -> Option<Resolution<'a>> {
        let normalized = normalize_title(query);
        if normalized.is_empty() || normalized == query {
            return None;
        }

        let (hit, via) = match self.by_alias(&normalized) {
            Some(hit) => (hit, DirectMatch::Alias),
            None => (self.by_exact_name(&normalized)?, DirectMatch::ExactName),
        };
        Some(Resolution {
            strategy: MatchStrategy::Normalized { normalized, via },
            ..hit
        })
    }

    fn by_substring<'a>(&'a self, query: &str) -> Option<Resolution<'a>> {
        self.library
            .iter()
            .find(|(exercise, _)| {
                let name = exercise.name.to_lowercase();
                name.contains(query) || query.contains(name.as_str())
            })
            .map(|(exercise, category)| Resolution {
                exercise,
                category,
                strategy: MatchStrategy::Substring,
            })
    }

    fn by_keyword_score<'a>(&'a self, query: &str) -> Option<Resolution<'a>> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return None;
        }

        let mut best: Option<(u32, &Exercise, &ExerciseCategory)> = None;
        for (exercise, category) in self.library.iter() {
            let name = exercise.name.to_lowercase();
            let score = keyword_score(&query_tokens, &tokenize(&name));
            if best.map_or(true, |(s, _, _)| score > s) {
                best = Some((score, exercise, category));
            }
        }

        let (score, exercise, category) = best?;
        (score > KEYWORD_THRESHOLD).then(|| Resolution {
            exercise,
            category,
            strategy: MatchStrategy::KeywordScore { score },
        })
    }

    fn by_category_keyword<'a>(&'a self, query: &str) -> Option<Resolution<'a>> {
        CATEGORY_KEYWORDS
            .iter()
            .filter(|(keyword, _)| query.contains(keyword))
            .find_map(|(keyword, category_name)| {
                let category = self.library.category(category_name)?;
                let exercise = category.exercises.first()?;
                Some(Resolution {
                    exercise,
                    category,
                    strategy: MatchStrategy::CategoryKeyword { keyword },
                })
            })
    }
}

/// +3 per exact token, else +1 per partial token, +2 when token counts are
/// within one of each other.
fn keyword_score(query: &[&str], candidate: &[&str]) -> u32 {
    let mut score = 0;
    for q in query {
        if candidate.contains(q) {
            score += 3;
        } else if candidate.iter().any(|c| q.contains(c) || c.contains(q)) {
            score += 1;
        }
    }
    if query.len().abs_diff(candidate.len()) <= 1 {
        score += 2;
    }
    score
}
