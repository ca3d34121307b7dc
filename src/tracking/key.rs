//! Completion key generation.
//!
//! A key identifies "this exercise in this session of this plan". It is built
//! from the resolved exercise id when the title resolves and from a slug of the
//! normalized title otherwise, so offline records are addressable before any
//! server round-trip and titles the resolver treats as equal share a key.

use crate::resolver::normalize::{normalize_title, slugify};
use crate::resolver::Resolver;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

const SEPARATOR: &str = "::";

/// Escaped in plan and session ids so they cannot forge a separator.
const KEY_COMPONENT: &AsciiSet = &CONTROLS.add(b':').add(b'%');

/// Deterministic completion identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionKey(String);

impl CompletionKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap an already-formed key, e.g. one recovered from a legacy tag.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Text after the last separator, if there is any.
    pub fn last_segment(&self) -> Option<&str> {
        self.0
            .rsplit_once(SEPARATOR)
            .map(|(_, tail)| tail.trim())
            .filter(|tail| !tail.is_empty())
    }

    /// Whether the identity segment came from a resolved library exercise.
    pub fn is_resolved(&self) -> bool {
        self.0
            .rsplit(SEPARATOR)
            .next()
            .is_some_and(|identity| identity.starts_with("ex:"))
    }
}

impl fmt::Display for CompletionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives completion keys through the resolver
#[derive(Debug, Clone)]
pub struct CompletionKeyGenerator {
    resolver: Arc<Resolver>,
}

impl CompletionKeyGenerator {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// `<plan>::<session>::ex:<exercise id>` or `<plan>::<session>::raw:<slug>`.
    pub fn key(&self, plan_id: &str, session_id: &str, title: &str) -> CompletionKey {
        let identity = match self.resolver.resolve(title) {
            Some(hit) => format!("ex:{}", hit.exercise.id),
            None => format!("raw:{}", raw_identity(title)),
        };
        CompletionKey(format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            utf8_percent_encode(plan_id.trim(), KEY_COMPONENT),
            utf8_percent_encode(session_id.trim(), KEY_COMPONENT),
            identity
        ))
    }
}

/// Slug of the normalized title; falls back to the trimmed lowercase text for
/// titles with no alphanumerics at all.
fn raw_identity(title: &str) -> String {
    let slug = slugify(&normalize_title(title));
    if slug.is_empty() {
        title.trim().to_lowercase()
    } else {
        slug
    }
}
