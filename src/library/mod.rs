//! # Canonical Exercise Library
//!
//! Immutable catalog of exercises grouped into categories. The built-in
//! catalog is embedded from `catalog.toml` and parsed once by whoever owns the
//! process lifecycle; the resulting [`ExerciseLibrary`] is then shared by
//! reference (usually through an `Arc`).
//!
//! Iteration order is the catalog order, and several resolver strategies
//! break ties by it.
//!
//! ## Usage
//!
//! ```rust
//! use trainlog::library::ExerciseLibrary;
//!
//! let library = ExerciseLibrary::builtin().unwrap();
//! let (exercise, category) = library.find_by_name("campus ladders").unwrap();
//! assert_eq!(exercise.name, "Campus Ladders");
//! assert_eq!(category.name, "Campus Board");
//! ```

use crate::resolver::normalize::slugify;
use crate::shared::error::LibraryError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const BUILTIN_CATALOG: &str = include_str!("catalog.toml");

/// Canonical name of the session-complete marker exercise.
pub const SESSION_COMPLETE: &str = "Session Complete";

/// A library exercise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    /// Stable identifier; the slug of `name` unless the catalog overrides it
    pub id: String,
    /// Display name, unique within its category
    pub name: String,
    /// Coaching description
    pub description: String,
    /// Name of the owning category
    pub category: String,
}

/// A named, ordered group of exercises
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseCategory {
    pub name: String,
    pub exercises: Vec<Exercise>,
}

/// The full catalog
#[derive(Debug, Clone)]
pub struct ExerciseLibrary {
    categories: Vec<ExerciseCategory>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "category")]
    categories: Vec<CatalogCategory>,
}

#[derive(Debug, Deserialize)]
struct CatalogCategory {
    name: String,
    #[serde(default, rename = "exercise")]
    exercises: Vec<CatalogExercise>,
}

#[derive(Debug, Deserialize)]
struct CatalogExercise {
    id: Option<String>,
    name: String,
    #[serde(default)]
    description: String,
}

impl ExerciseLibrary {
    /// Parse the embedded catalog.
    pub fn builtin() -> Result<Self, LibraryError> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    /// Parse a catalog in the `[[category]]` / `[[category.exercise]]` shape.
    pub fn from_toml_str(text: &str) -> Result<Self, LibraryError> {
        let file: CatalogFile = toml::from_str(text)?;
        let mut categories = Vec::with_capacity(file.categories.len());

        for raw in file.categories {
            let category_name = raw.name.trim().to_string();
            if category_name.is_empty() {
                return Err(LibraryError::EmptyName {
                    category: category_name,
                });
            }

            let mut seen = HashSet::new();
            let mut exercises = Vec::with_capacity(raw.exercises.len());
            for entry in raw.exercises {
                let name = entry.name.trim().to_string();
                if name.is_empty() {
                    return Err(LibraryError::EmptyName {
                        category: category_name,
                    });
                }
                if !seen.insert(name.to_lowercase()) {
                    return Err(LibraryError::DuplicateExercise {
                        category: category_name,
                        name,
                    });
                }
                let id = entry
                    .id
                    .filter(|id| !id.trim().is_empty())
                    .unwrap_or_else(|| slugify(&name));
                exercises.push(Exercise {
                    id,
                    name,
                    description: entry.description.trim().to_string(),
                    category: category_name.clone(),
                });
            }

            categories.push(ExerciseCategory {
                name: category_name,
                exercises,
            });
        }

        Ok(Self { categories })
    }

    pub fn categories(&self) -> &[ExerciseCategory] {
        &self.categories
    }

    /// Every exercise with its category, in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (&Exercise, &ExerciseCategory)> + '_ {
        self.categories
            .iter()
            .flat_map(|category| category.exercises.iter().map(move |e| (e, category)))
    }

    pub fn len(&self) -> usize {
        self.categories.iter().map(|c| c.exercises.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Case-insensitive, trimmed name lookup. First hit in catalog order.
    pub fn find_by_name(&self, name: &str) -> Option<(&Exercise, &ExerciseCategory)> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.iter().find(|(e, _)| e.name.to_lowercase() == wanted)
    }

    pub fn find_by_id(&self, id: &str) -> Option<(&Exercise, &ExerciseCategory)> {
        self.iter().find(|(e, _)| e.id == id)
    }

    /// Case-insensitive category lookup.
    pub fn category(&self, name: &str) -> Option<&ExerciseCategory> {
        let wanted = name.trim().to_lowercase();
        self.categories
            .iter()
            .find(|c| c.name.to_lowercase() == wanted)
    }
}
