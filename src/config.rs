//! Normalization configuration: removal rules, translations and the exception
//! tables consumed by the normalizer.
//!
//! The configuration is built once per run and never mutated afterwards.
//! Generic rules are built in; track- and artist-specific exceptions come
//! from a JSON file (see `config/exceptions.json`).

use anyhow::{Context, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Substrings whose removal may produce an older spelling.
const REMOVES: &[&str] = &[
    ",", "!", "?", "?!", "'",
    "The ", "De ", " Experience", " Groep", " Group", " Theme", " Edit",
];

/// Character translations: byte order mark, non-breaking space, curly quote.
const TRANSLATIONS: &[(&str, &str)] = &[
    ("\u{FEFF}", ""),
    ("\u{00A0}", " "),
    ("\u{2019}", "'"),
];

/// Separators between collaborating artists, in the order they are tried.
const ARTIST_SPLITS: &[&str] = &[
    " & ", " Feat. ", " feat. ", " ft ", " ft. ", " Ft. ", ", ", " And ",
    " en ", " x ", "  ", "vs. ",
];

/// Generic substring replacements applied to every artist, in order.
const ARTIST_REPLACES: &[(&str, &str)] = &[
    (" en ", " & "),
    (" + ", " & "),
    (", ", " & "),
    (" x ", " & "),
    (" \u{039B} ", " And "), // Lambda
    (" Feat. ", " ft. "),
    (" Vs ", " vs. "),
    (" vs ", " vs. "),
];

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn owned_pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

/// Immutable configuration of the normalizer.
///
/// Ordered tables are lists of `[from, to]` pairs in JSON; lookup tables are
/// JSON objects. Fields missing from an exception file keep the built-in
/// defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Substring-removal rules for both artists and titles.
    pub removes: Vec<String>,
    /// Character translations applied before any other rule.
    pub translations: Vec<(String, String)>,
    /// Exact (translated) title to preferred title.
    pub title_fixes: FxHashMap<String, String>,
    /// Collaborative acts whose separators must not be split.
    pub artist_no_splits: FxHashSet<String>,
    /// Separator tokens between collaborating artists.
    pub artist_splits: Vec<String>,
    /// Substring to parent act, merged without changing the displayed name.
    pub artist_groups: Vec<(String, String)>,
    /// Substring replacements applied to the running artist name.
    pub artist_replaces: Vec<(String, String)>,
    /// Exact artist name to preferred artist name.
    pub artist_full_replaces: FxHashMap<String, String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            removes: owned(REMOVES),
            translations: owned_pairs(TRANSLATIONS),
            title_fixes: FxHashMap::default(),
            artist_no_splits: FxHashSet::default(),
            artist_splits: owned(ARTIST_SPLITS),
            artist_groups: Vec::new(),
            artist_replaces: owned_pairs(ARTIST_REPLACES),
            artist_full_replaces: FxHashMap::default(),
        }
    }
}

impl NormalizerConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse normalizer configuration")
    }

    /// Load a configuration from a JSON exception file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {:?}", path))?;
        Self::from_json_str(&json).with_context(|| format!("Invalid configuration {:?}", path))
    }

    /// Apply the character translation table.
    pub fn translate(&self, text: &str) -> String {
        let mut result = text.to_string();
        for (from, to) in &self.translations {
            if result.contains(from.as_str()) {
                result = result.replace(from.as_str(), to);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_has_generic_rules_only() {
        let config = NormalizerConfig::default();
        assert!(config.removes.contains(&"The ".to_string()));
        assert_eq!(config.artist_splits.first().map(String::as_str), Some(" & "));
        assert!(config.title_fixes.is_empty());
        assert!(config.artist_no_splits.is_empty());
    }

    #[test]
    fn test_translate() {
        let config = NormalizerConfig::default();
        assert_eq!(config.translate("\u{FEFF}Don\u{2019}t\u{00A0}Stop"), "Don't Stop");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = NormalizerConfig::from_json_str(
            r#"{
                "title_fixes": {"Born In The USA": "Born In The U.S.A."},
                "artist_no_splits": ["Simon & Garfunkel"],
                "artist_groups": [["Jay Z", "Jay-Z"]]
            }"#,
        )
        .unwrap();
        assert_eq!(config.title_fixes["Born In The USA"], "Born In The U.S.A.");
        assert!(config.artist_no_splits.contains("Simon & Garfunkel"));
        assert_eq!(config.artist_groups, vec![("Jay Z".to_string(), "Jay-Z".to_string())]);
        assert_eq!(config.removes, NormalizerConfig::default().removes);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"artist_full_replaces": {{"REM": "R.E.M."}}}}"#).unwrap();
        let config = NormalizerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.artist_full_replaces["REM"], "R.E.M.");
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(NormalizerConfig::from_json_str(r#"{"removes": 3}"#).is_err());
    }

    #[test]
    fn test_bundled_exceptions_parse() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/exceptions.json");
        let config = NormalizerConfig::from_json_file(&path).unwrap();
        assert!(config.artist_no_splits.contains("Simon & Garfunkel"));
        assert_eq!(config.title_fixes["Born In The USA"], "Born In The U.S.A.");
    }
}
