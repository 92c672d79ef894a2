//! Core data models for chart reconciliation.
//!
//! This module contains the identity key, the typed track record, row and
//! field-name types, and the ingestion statistics used throughout the engine.

use rustc_hash::FxHashMap;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::InvalidYear;

// ============================================================================
// Type Aliases
// ============================================================================

/// One input row from a chart source: field name to raw value.
pub type Row = BTreeMap<String, FieldValue>;

/// The track catalog: every identity key ever seen, canonical or alias.
pub type Catalog = FxHashMap<IdentityKey, TrackRecord>;

// ============================================================================
// Identity Key
// ============================================================================

/// Normalized (artist, title) pair used as the catalog primary key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey {
    pub artist: String,
    pub title: String,
}

impl IdentityKey {
    /// Build a key from display strings: lower-cased and whitespace-trimmed.
    pub fn new(artist: &str, title: &str) -> Self {
        Self {
            artist: artist.to_lowercase().trim().to_string(),
            title: title.to_lowercase().trim().to_string(),
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}, {:?})", self.artist, self.title)
    }
}

// ============================================================================
// Field values and years
// ============================================================================

/// Raw value of a row field. CSV sources only produce text; JSON sources
/// may produce integers and booleans as well.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Integer(i64),
    Text(String),
}

impl FieldValue {
    /// Interpret the value as an integer, parsing text when needed.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::Flag(_) => None,
        }
    }

    /// True for empty text, which marks timestamp rows in broadcast listings.
    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.is_empty())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Flag(b) => write!(f, "{}", b),
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Flag(b)
    }
}

/// Label of a processing year, e.g. "2014" or "2023.5" for a special edition
/// broadcast in the same year. Ordered numerically.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Year(String);

impl Year {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into().trim().to_string())
    }

    /// Parse a label of the form "2014" or "2023.5".
    pub fn parse(label: &str) -> Result<Self, InvalidYear> {
        let year = Self::new(label);
        let (major, minor) = year.0.split_once('.').unwrap_or((&year.0, "0"));
        let numeric = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !numeric(major) || !numeric(minor) {
            return Err(InvalidYear(label.to_string()));
        }
        Ok(year)
    }

    pub fn label(&self) -> &str {
        &self.0
    }

    fn sort_key(&self) -> (u64, u64) {
        let (major, minor) = self.0.split_once('.').unwrap_or((&self.0, "0"));
        (major.parse().unwrap_or(0), minor.parse().unwrap_or(0))
    }
}

impl Ord for Year {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Year {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'de> Deserialize<'de> for Year {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Year::parse(&label).map_err(de::Error::custom)
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u16> for Year {
    fn from(year: u16) -> Self {
        Year(year.to_string())
    }
}

// ============================================================================
// Track Record
// ============================================================================

/// Canonical pointer of a track record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Best {
    /// This key is the canonical record of its track.
    Canonical,
    /// This key is an alias resolving to another key.
    Alias(IdentityKey),
}

/// Track record stored under an identity key.
///
/// Engine-owned bookkeeping (`best`, `position`, `years`, flags) is kept apart
/// from `fields`, the passthrough data of the source rows, so that a source
/// column can never overwrite the alias pointer or a year entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackRecord {
    /// Display artist
    pub artist: String,
    /// Display title
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best: Option<Best>,
    /// Current-year chart position
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    /// Chart position per historical processing year
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub years: BTreeMap<Year, u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub album_version: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_year: Option<i64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldValue>,
}

impl TrackRecord {
    pub fn is_canonical(&self) -> bool {
        matches!(self.best, Some(Best::Canonical))
    }

    pub fn alias_target(&self) -> Option<&IdentityKey> {
        match &self.best {
            Some(Best::Alias(key)) => Some(key),
            _ => None,
        }
    }

    /// Overlay this (stored) record onto a copy of `incoming`.
    /// Stored values win field by field since they carry accumulated history.
    pub fn merged_over(&self, incoming: &TrackRecord) -> TrackRecord {
        let mut merged = incoming.clone();
        merged.artist = self.artist.clone();
        merged.title = self.title.clone();
        if self.best.is_some() {
            merged.best = self.best.clone();
        }
        if self.position.is_some() {
            merged.position = self.position;
        }
        merged
            .years
            .extend(self.years.iter().map(|(year, pos)| (year.clone(), *pos)));
        merged.album_version |= self.album_version;
        if self.timestamp.is_some() {
            merged.timestamp = self.timestamp.clone();
        }
        if self.release_year.is_some() {
            merged.release_year = self.release_year;
        }
        merged.fields.extend(
            self.fields
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        merged
    }
}

// ============================================================================
// Field names
// ============================================================================

/// Names of the row fields the engine reads, declared per source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    pub artist: String,
    pub title: String,
    pub position: String,
    /// Release year column of the track, if the source has one
    pub year: Option<String>,
    pub previous_position: String,
    /// Broadcast time column, if the source has one
    pub timestamp: Option<String>,
}

impl FieldNames {
    /// Field names of the broadcaster's CSV exports.
    pub fn csv() -> Self {
        Self {
            artist: "artiest".to_string(),
            title: "titel".to_string(),
            position: "pos".to_string(),
            year: None,
            previous_position: "prv".to_string(),
            timestamp: None,
        }
    }

    /// Field names of the (flattened) JSON API exports.
    pub fn json() -> Self {
        Self {
            artist: "track.artist".to_string(),
            title: "track.title".to_string(),
            position: "position.current".to_string(),
            year: None,
            previous_position: "position.previous".to_string(),
            timestamp: Some("broadcastUnixTime".to_string()),
        }
    }
}

impl Default for FieldNames {
    fn default() -> Self {
        Self::csv()
    }
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Ingestion statistics, accumulated over a whole run.
#[derive(Default, Debug, Clone, Serialize)]
pub struct IngestStats {
    // Rows
    pub rows: usize,
    pub timestamp_rows: usize,
    pub uncharted_rows: usize, // Historical rows with an empty position
    pub current_rows: usize,
    pub historical_rows: usize,
    pub reused_slots: usize, // Current-year rows matched through an existing position

    // Key attempts
    pub keys_inserted: usize,
    pub keys_merged: usize,
    pub duplicates: usize, // Same current-year row seen again
    pub collisions_replaced: usize,
    pub collisions_kept: usize,

    // Alias bookkeeping
    pub aliases_linked: usize,

    // Timing
    pub elapsed_seconds: f64,
}

impl IngestStats {
    /// Share of key attempts that were accepted, as a percentage
    pub fn acceptance_rate(&self) -> f64 {
        let accepted = self.keys_inserted + self.keys_merged;
        let total = accepted + self.duplicates + self.collisions_replaced + self.collisions_kept;
        if total == 0 {
            0.0
        } else {
            100.0 * accepted as f64 / total as f64
        }
    }

    /// Log stats in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            log::info!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_key_folds_case_and_whitespace() {
        let key = IdentityKey::new("  Queen ", "Under Pressure ");
        assert_eq!(key.artist, "queen");
        assert_eq!(key.title, "under pressure");
        assert_eq!(key, IdentityKey::new("QUEEN", "under PRESSURE"));
    }

    #[test]
    fn test_year_ordering_is_numeric() {
        let mut years = vec![Year::new("2023.5"), Year::new("2014"), Year::new("2023"), Year::new("999")];
        years.sort();
        let labels: Vec<&str> = years.iter().map(|y| y.label()).collect();
        assert_eq!(labels, vec!["999", "2014", "2023", "2023.5"]);
    }

    #[test]
    fn test_year_parse() {
        assert_eq!(Year::parse(" 2014 ").unwrap().label(), "2014");
        assert_eq!(Year::parse("2023.5").unwrap().label(), "2023.5");
        assert!(Year::parse("next year").is_err());
        assert!(Year::parse("2023.").is_err());
        assert!(Year::parse("").is_err());
    }

    #[test]
    fn test_year_deserialize_rejects_non_numeric_label() {
        let year: Year = serde_json::from_str(r#""2016""#).unwrap();
        assert_eq!(year, Year::new("2016"));
        assert!(serde_json::from_str::<Year>(r#""latest""#).is_err());
    }

    #[test]
    fn test_field_value_as_integer() {
        assert_eq!(FieldValue::from(" 12 ").as_integer(), Some(12));
        assert_eq!(FieldValue::from(7_i64).as_integer(), Some(7));
        assert_eq!(FieldValue::from("x").as_integer(), None);
        assert_eq!(FieldValue::from(true).as_integer(), None);
        assert!(FieldValue::from("").is_empty());
    }

    #[test]
    fn test_merged_over_prefers_stored_values() {
        let stored = TrackRecord {
            artist: "Queen".to_string(),
            title: "Under Pressure".to_string(),
            best: Some(Best::Canonical),
            years: BTreeMap::from([(Year::new("2015"), 12)]),
            fields: BTreeMap::from([("prv".to_string(), FieldValue::from("3"))]),
            ..Default::default()
        };
        let incoming = TrackRecord {
            artist: "QUEEN".to_string(),
            title: "Under pressure".to_string(),
            position: Some(4),
            years: BTreeMap::from([(Year::new("2015"), 99), (Year::new("2016"), 20)]),
            timestamp: Some("20:00".to_string()),
            fields: BTreeMap::from([("prv".to_string(), FieldValue::from("5"))]),
            ..Default::default()
        };

        let merged = stored.merged_over(&incoming);
        assert_eq!(merged.artist, "Queen");
        assert!(merged.is_canonical());
        assert_eq!(merged.position, Some(4));
        assert_eq!(merged.years[&Year::new("2015")], 12);
        assert_eq!(merged.years[&Year::new("2016")], 20);
        assert_eq!(merged.timestamp.as_deref(), Some("20:00"));
        assert_eq!(merged.fields["prv"], FieldValue::from("3"));
    }

    #[test]
    fn test_acceptance_rate() {
        let stats = IngestStats {
            keys_inserted: 3,
            keys_merged: 1,
            collisions_kept: 4,
            ..Default::default()
        };
        assert!((stats.acceptance_rate() - 50.0).abs() < f64::EPSILON);
        assert_eq!(IngestStats::default().acceptance_rate(), 0.0);
    }
}
