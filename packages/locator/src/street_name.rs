//! Street name keys used to decide which fragments may be merged.
//!
//! Two fragments are candidates for merging only when their keys are
//! equal. The key is built the same way for every fragment: lower-cased,
//! punctuation stripped, street types and directions expanded to one
//! canonical spelling, whitespace collapsed. `"N. Main St"` and
//! `"North Main Street"` therefore share a key.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// Punctuation that never distinguishes two street names.
static PUNCTUATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[.,#'"/\\\-()]+"#).expect("valid regex"));

/// Abbreviation -> canonical spelling for street types and directions.
static SYNONYMS: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    BTreeMap::from([
        ("st", "street"),
        ("str", "street"),
        ("ave", "avenue"),
        ("av", "avenue"),
        ("blvd", "boulevard"),
        ("rd", "road"),
        ("dr", "drive"),
        ("ln", "lane"),
        ("ct", "court"),
        ("pl", "place"),
        ("sq", "square"),
        ("hwy", "highway"),
        ("pkwy", "parkway"),
        ("ter", "terrace"),
        ("cir", "circle"),
        ("trl", "trail"),
        ("aly", "alley"),
        ("n", "north"),
        ("s", "south"),
        ("e", "east"),
        ("w", "west"),
        ("ne", "northeast"),
        ("nw", "northwest"),
        ("se", "southeast"),
        ("sw", "southwest"),
    ])
});

/// Expands a single lower-cased token to its canonical form.
fn expand_token(token: &str) -> &str {
    SYNONYMS.get(token).copied().unwrap_or(token)
}

/// Builds the merge key for a street name.
#[must_use]
pub fn street_name_key(name: &str) -> String {
    let lower = name.to_lowercase();
    let no_punct = PUNCTUATION_RE.replace_all(&lower, " ");
    no_punct
        .split_whitespace()
        .map(expand_token)
        .collect::<Vec<_>>()
        .join(" ")
}
