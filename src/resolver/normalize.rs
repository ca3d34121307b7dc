//! Title normalization helpers shared by the resolver and the key generator.

/// Leading filler removed before retrying a lookup. Applied repeatedly.
const LEADING_FILLER: &[&str] = &["do ", "perform ", "complete ", "the "];

/// Trailing generic suffixes. Applied repeatedly, longest forms first.
const TRAILING_SUFFIXES: &[&str] = &[
    " exercises",
    " exercise",
    " drills",
    " drill",
    " session",
    " training",
    " workout",
    " sets",
    " set",
];

/// Lowercase, drop parenthetical clauses, strip filler and generic suffixes,
/// and collapse whitespace.
///
/// Never strips a title down to nothing: a suffix that is the whole remaining
/// text is kept.
pub fn normalize_title(title: &str) -> String {
    let mut text = collapse_whitespace(&strip_parentheticals(&title.to_lowercase()));

    loop {
        let before = text.len();
        for filler in LEADING_FILLER {
            if let Some(rest) = text.strip_prefix(filler) {
                text = rest.trim_start().to_string();
            }
        }
        if text.len() == before {
            break;
        }
    }

    loop {
        let before = text.len();
        for suffix in TRAILING_SUFFIXES {
            if let Some(rest) = text.strip_suffix(suffix) {
                if !rest.trim().is_empty() {
                    text = rest.trim_end().to_string();
                }
            }
        }
        if text.len() == before {
            break;
        }
    }

    collapse_whitespace(&text)
}

/// Remove `( ... )` clauses, including nested ones. An unclosed `(` drops the
/// rest of the text; a stray `)` is dropped.
pub fn strip_parentheticals(text: &str) -> String {
    let mut depth = 0usize;
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Trim and squeeze every whitespace run to a single space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase alphanumeric slug with single `-` separators.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Whitespace tokens with surrounding punctuation trimmed.
pub(crate) fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|t| !t.is_empty())
        .collect()
}
