//! Legacy bracketed tags.
//!
//! Older records smuggled structured data into the free-text notes field as
//! `[EXERCISE:<title>]` and `[KEY:<key>]`. These helpers pull those values out
//! and hand back the notes the user actually wrote.

const EXERCISE_TAG: &str = "[EXERCISE:";
const KEY_TAG: &str = "[KEY:";

/// Values recovered from a legacy notes string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyTags {
    /// Notes with every recognised tag removed
    pub notes: String,
    /// Value of the first `[EXERCISE:...]` tag
    pub exercise_title: Option<String>,
    /// Value of the first `[KEY:...]` tag
    pub key: Option<String>,
}

impl LegacyTags {
    /// Parse and strip tags. Unterminated tags are left in place as text.
    pub fn extract(notes: &str) -> Self {
        let (notes, exercise_title) = take_tag(notes, EXERCISE_TAG);
        let (notes, key) = take_tag(&notes, KEY_TAG);
        Self {
            notes: notes.trim().to_string(),
            exercise_title,
            key,
        }
    }

    /// Whether `notes` carries any recognised tag.
    pub fn present_in(notes: &str) -> bool {
        has_closed_tag(notes, EXERCISE_TAG) || has_closed_tag(notes, KEY_TAG)
    }

    pub fn is_empty(&self) -> bool {
        self.exercise_title.is_none() && self.key.is_none()
    }
}

fn has_closed_tag(text: &str, tag: &str) -> bool {
    text.find(tag)
        .is_some_and(|start| text[start + tag.len()..].contains(']'))
}

/// Remove every closed occurrence of `tag`, returning the first value.
fn take_tag(text: &str, tag: &str) -> (String, Option<String>) {
    let mut out = text.to_string();
    let mut first = None;
    let mut search_from = 0;

    while let Some(offset) = out[search_from..].find(tag) {
        let start = search_from + offset;
        let value_start = start + tag.len();
        let Some(close) = out[value_start..].find(']') else {
            break;
        };
        let end = value_start + close + 1;

        let value = out[value_start..end - 1].trim();
        if first.is_none() && !value.is_empty() {
            first = Some(value.to_string());
        }

        // Swallow one separator so "a [KEY:x] b" becomes "a b".
        let at_boundary = start == 0 || out[..start].ends_with(char::is_whitespace);
        let end = if at_boundary && out[end..].starts_with([' ', '\n', '\t']) {
            end + 1
        } else {
            end
        };

        out.replace_range(start..end, "");
        search_from = start;
    }

    (out, first)
}
