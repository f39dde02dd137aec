//! SQL identifiers derived from headers and file names.

use std::{collections::HashSet, path::Path, sync::LazyLock};

use regex::Regex;

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern"));

/// Identifier used for a header whose slug is empty.
pub const FALLBACK_IDENTIFIER: &str = "x";

/// Lowercases `value`, collapses every run of characters outside `[a-z0-9]`
/// into one `_`, and trims underscores from both ends. May return an empty string.
pub fn slug(value: &str) -> String {
    let lowered = value.to_lowercase();
    NON_ALPHANUMERIC
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

/// Unique column identifiers for a header row.
///
/// Headers are processed left to right; the first occurrence of a slug keeps
/// it and later ones receive the first free `_2`, `_3`, ... suffix.
pub fn derive_column_identifiers<S: AsRef<str>>(headers: &[S]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(headers.len());
    let mut identifiers = Vec::with_capacity(headers.len());
    for header in headers {
        let mut identifier = slug(header.as_ref());
        if identifier.is_empty() {
            identifier = FALLBACK_IDENTIFIER.to_string();
        }
        if seen.contains(&identifier) {
            identifier = (2usize..)
                .map(|n| format!("{identifier}_{n}"))
                .find(|candidate| !seen.contains(candidate))
                .unwrap_or(identifier);
        }
        seen.insert(identifier.clone());
        identifiers.push(identifier);
    }
    identifiers
}

/// Table name for a source file: the slug of its stem (`data/Q1 Sales.csv` -> `q1_sales`).
pub fn derive_table_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();
    slug(&stem)
}
