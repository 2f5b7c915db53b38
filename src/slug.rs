//! GitHub-style heading anchors.
use std::collections::{HashMap, HashSet};

/// Id used when a heading has no letters or digits at all.
pub const FALLBACK_SLUG: &str = "heading";

/// Derive an anchor id from heading text.
///
/// ASCII letters are lowercased and non-ASCII characters pass through
/// unchanged. Anything that is not a letter, digit, whitespace, `-` or `_` is
/// dropped, and runs of whitespace, `-` and `_` collapse into one `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Hands out unique ids for one document.
#[derive(Debug, Default)]
pub struct Slugger {
    occurrences: HashMap<String, usize>,
    issued: HashSet<String>,
}

impl Slugger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first heading with a given base slug gets the base itself, later
    /// ones get `base-1`, `base-2`, and so on.
    pub fn slug(&mut self, text: &str) -> String {
        let base = slugify(text);
        let count = self.occurrences.entry(base.clone()).or_insert(0);

        let mut id = if *count == 0 {
            base.clone()
        } else {
            format!("{base}-{count}")
        };
        *count += 1;

        // A literal "foo-1" heading can collide with a generated suffix
        while self.issued.contains(&id) {
            id = format!("{base}-{count}");
            *count += 1;
        }

        self.issued.insert(id.clone());
        id
    }
}
