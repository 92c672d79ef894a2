//! Row ingestion: turns one chart row into catalog mutations and index
//! updates.
//!
//! Rows of the current year must be ingested before historical rows, and
//! historical years in decreasing order, since later merges depend on the
//! `best` pointers established by earlier ones. One `ingest_row` call is the
//! unit of consistency: it takes `&mut self` and runs to completion.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::iter;

use crate::collision::{update_record, Attempt, Outcome};
use crate::error::IngestError;
use crate::index::{ArtistChart, PositionIndex};
use crate::models::{Best, Catalog, FieldNames, IdentityKey, IngestStats, Row, TrackRecord, Year};
use crate::normalize::{Alternatives, Normalizer};

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Album version marker as its own bracket: "Hotel California (Albumversie)"
static ALBUM_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i) \(albumversie\)$").unwrap());

/// Album version marker inside another bracket: "Hey Jude (Live Albumversie)"
static ALBUM_VERSION_INNER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i) albumversie\)$").unwrap());

/// Strip an album version marker from a title, if present.
pub fn strip_album_version(title: &str) -> Option<String> {
    if !title.to_lowercase().ends_with("albumversie)") {
        return None;
    }
    let stripped = ALBUM_VERSION.replace(title, "");
    Some(ALBUM_VERSION_INNER.replace(&stripped, ")").into_owned())
}

// ============================================================================
// INGESTOR
// ============================================================================

/// Result of ingesting one track row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestedRow {
    /// Canonical key of the track
    pub key: IdentityKey,
    /// Chart position of the row, offset applied
    pub position: Option<u32>,
    /// Accepted alias keys, canonical key excluded
    pub aliases: Vec<IdentityKey>,
}

/// The identity-resolution engine for one processing run.
#[derive(Debug)]
pub struct Ingestor {
    normalizer: Normalizer,
    catalog: Catalog,
    positions: PositionIndex,
    year_positions: BTreeMap<Year, PositionIndex>,
    artists: ArtistChart,
    pending_timestamp: Option<String>,
    trace: Option<Regex>,
    stats: IngestStats,
}

impl Ingestor {
    pub fn new(normalizer: Normalizer) -> Self {
        Self {
            normalizer,
            catalog: Catalog::default(),
            positions: PositionIndex::new(),
            year_positions: BTreeMap::new(),
            artists: ArtistChart::new(),
            pending_timestamp: None,
            trace: None,
            stats: IngestStats::default(),
        }
    }

    /// Log the resolution of rows whose raw artist or title matches `pattern`.
    pub fn with_trace(mut self, pattern: Regex) -> Self {
        self.trace = Some(pattern);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Position index of the current year.
    pub fn positions(&self) -> &PositionIndex {
        &self.positions
    }

    /// Position index of a processing cycle: the current year for `None`.
    pub fn positions_for(&self, year: Option<&Year>) -> Option<&PositionIndex> {
        match year {
            None => Some(&self.positions),
            Some(year) => self.year_positions.get(year),
        }
    }

    /// Historical years with at least one charted row, in ascending order.
    pub fn years(&self) -> impl Iterator<Item = &Year> {
        self.year_positions.keys()
    }

    /// Sorted chart positions of an artist key.
    pub fn artist_chart(&self, artist: &str) -> &[u32] {
        self.artists.get(artist)
    }

    pub fn artists(&self) -> &ArtistChart {
        &self.artists
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Broadcast time label waiting for the next current-year row.
    pub fn pending_timestamp(&self) -> Option<&str> {
        self.pending_timestamp.as_deref()
    }

    /// Forget a pending broadcast time, e.g. at the start of a new file.
    pub fn clear_pending_timestamp(&mut self) {
        self.pending_timestamp = None;
    }

    /// Ingest one row of a chart source.
    ///
    /// `year` is `None` for the current (live) chart and the processing year
    /// for historical data. `offset` is added to the row's chart position.
    /// Returns `None` for a timestamp marker row, whose title holds the
    /// broadcast time of the next row, and for a historical row with an empty
    /// position.
    pub fn ingest_row(
        &mut self,
        row: &Row,
        fields: &FieldNames,
        year: Option<&Year>,
        offset: i64,
    ) -> Result<Option<IngestedRow>, IngestError> {
        self.stats.rows += 1;

        if row.get(&fields.position).is_some_and(|value| value.is_empty()) {
            // An empty cell in a historical overview: not charted that year
            if year.is_some() {
                self.stats.uncharted_rows += 1;
                return Ok(None);
            }
            let label = required_field(row, &fields.title)?;
            self.pending_timestamp = Some(label);
            self.stats.timestamp_rows += 1;
            return Ok(None);
        }

        let raw_artist = required_field(row, &fields.artist)?;
        let mut raw_title = required_field(row, &fields.title)?;
        let position = parse_position(row, fields, offset)?;

        let mut album_version = false;
        let mut timestamp = None;
        if year.is_none() {
            self.stats.current_rows += 1;
            if let Some(stripped) = strip_album_version(&raw_title) {
                album_version = true;
                raw_title = stripped;
            }
            timestamp = match fields.timestamp.as_ref().and_then(|name| row.get(name)) {
                Some(value) => Some(value.to_string()),
                None => self.pending_timestamp.clone(),
            };
            self.pending_timestamp = None;
        } else {
            self.stats.historical_rows += 1;
        }

        let incoming = build_record(row, fields, year, position, &raw_artist, &raw_title, album_version, timestamp);
        let artist_alternatives = self.normalizer.normalize_artist(&raw_artist);
        let title_alternatives = self.normalizer.normalize_title(&raw_title);

        let (best_key, mut accepted, rejected) =
            self.resolve_keys(&incoming, year, position, &artist_alternatives, &title_alternatives);
        let best_key = best_key.unwrap_or_else(|| {
            IdentityKey::new(artist_alternatives.canonical(), title_alternatives.canonical())
        });

        // The canonical record always takes the freshest display strings
        let resolution = update_record(
            &mut self.catalog,
            &best_key,
            &incoming,
            Attempt::Canonical,
            Some(best_key.clone()),
        );
        let best_key = resolution.best_key.unwrap_or(best_key);
        if year.is_none() {
            if let Some(record) = self.catalog.get_mut(&best_key) {
                record.artist = artist_alternatives.canonical().to_string();
                record.title = title_alternatives.canonical().to_string();
            }
        }

        accepted.retain(|key| *key != best_key);
        for key in &accepted {
            if let Some(record) = self.catalog.get_mut(key) {
                if !record.is_canonical() {
                    record.best = Some(Best::Alias(best_key.clone()));
                    self.stats.aliases_linked += 1;
                }
            }
        }

        if let Some(position) = position {
            self.record_position(position, year, &best_key, &accepted, &rejected);
        }

        if self.is_traced(&raw_artist, &raw_title) {
            log::debug!(
                "{}: {:?} x {:?} -> {} (accepted {:?}, rejected {:?})",
                year.map_or_else(|| "current".to_string(), Year::to_string),
                artist_alternatives.as_slice(),
                title_alternatives.as_slice(),
                best_key,
                accepted,
                rejected
            );
        }

        Ok(Some(IngestedRow {
            key: best_key,
            position,
            aliases: accepted,
        }))
    }

    /// Run the collision resolver over every alternative key of a row.
    /// Returns the running best key and the accepted and rejected keys.
    fn resolve_keys(
        &mut self,
        incoming: &TrackRecord,
        year: Option<&Year>,
        position: Option<u32>,
        artist_alternatives: &Alternatives,
        title_alternatives: &Alternatives,
    ) -> (Option<IdentityKey>, Vec<IdentityKey>, Vec<IdentityKey>) {
        // A second source for the current chart reuses the keys of the slot
        if year.is_none() {
            if let Some(keys) = position.and_then(|position| self.positions.get(position)) {
                self.stats.reused_slots += 1;
                return (keys.first().cloned(), keys.to_vec(), Vec::new());
            }
        }

        let attempt = match year {
            Some(year) => Attempt::Historical(year),
            None => Attempt::Current,
        };
        let mut best_key = None;
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        let mut seen = FxHashSet::default();

        for artist in artist_alternatives.iter() {
            for title in title_alternatives.iter() {
                let key = IdentityKey::new(artist, title);
                // Alternatives may only differ in case
                if !seen.insert(key.clone()) {
                    continue;
                }

                let resolution = update_record(&mut self.catalog, &key, incoming, attempt, best_key);
                let accepted_key = resolution.accepted();
                self.count(resolution.outcome);
                best_key = resolution.best_key;
                if accepted_key {
                    accepted.push(key);
                } else {
                    rejected.push(key);
                }
            }
        }

        (best_key, accepted, rejected)
    }

    /// Record a charted row in the position index of its cycle and, for the
    /// current year, promote the canonical record and update artist charts.
    fn record_position(
        &mut self,
        position: u32,
        year: Option<&Year>,
        best_key: &IdentityKey,
        accepted: &[IdentityKey],
        rejected: &[IdentityKey],
    ) {
        if let Some(year) = year {
            if let Some(record) = self.catalog.get_mut(best_key) {
                record.years.insert(year.clone(), position);
            }
        }

        // Keep split collaborators out when the full collaboration collided
        let listed: Vec<IdentityKey> = accepted
            .iter()
            .filter(|key| {
                best_key.artist.starts_with(key.artist.as_str())
                    || !rejected
                        .iter()
                        .any(|rejected_key| rejected_key.artist.starts_with(key.artist.as_str()))
            })
            .cloned()
            .collect();

        match year {
            Some(year) => self
                .year_positions
                .entry(year.clone())
                .or_default()
                .record(position, best_key.clone(), listed),
            None => {
                self.positions.record(position, best_key.clone(), listed);
                if let Some(record) = self.catalog.get_mut(best_key) {
                    record.best = Some(Best::Canonical);
                }
                for key in iter::once(best_key).chain(accepted).chain(rejected) {
                    self.artists.insert(&key.artist, position);
                }
            }
        }
    }

    fn count(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Inserted => self.stats.keys_inserted += 1,
            Outcome::Merged => self.stats.keys_merged += 1,
            Outcome::Duplicate => self.stats.duplicates += 1,
            Outcome::Replaced => self.stats.collisions_replaced += 1,
            Outcome::Kept => self.stats.collisions_kept += 1,
        }
    }

    fn is_traced(&self, artist: &str, title: &str) -> bool {
        self.trace
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(artist) || pattern.is_match(title))
    }
}

// ============================================================================
// ROW HELPERS
// ============================================================================

fn required_field(row: &Row, field: &str) -> Result<String, IngestError> {
    row.get(field)
        .map(|value| value.to_string())
        .ok_or_else(|| IngestError::missing_field(field))
}

fn parse_position(row: &Row, fields: &FieldNames, offset: i64) -> Result<Option<u32>, IngestError> {
    let Some(value) = row.get(&fields.position) else {
        return Ok(None);
    };
    value
        .as_integer()
        .and_then(|position| position.checked_add(offset))
        .and_then(|position| u32::try_from(position).ok())
        .map(Some)
        .ok_or_else(|| IngestError::invalid_position(&fields.position, value.to_string()))
}

/// Build the record written for a row. Fields with a typed slot in the
/// record are not copied into the passthrough map.
#[allow(clippy::too_many_arguments)]
fn build_record(
    row: &Row,
    fields: &FieldNames,
    year: Option<&Year>,
    position: Option<u32>,
    artist: &str,
    title: &str,
    album_version: bool,
    timestamp: Option<String>,
) -> TrackRecord {
    let release_year = fields
        .year
        .as_ref()
        .and_then(|name| row.get(name))
        .and_then(|value| value.as_integer());

    let mut record = TrackRecord {
        artist: artist.to_string(),
        title: title.to_string(),
        album_version,
        timestamp,
        release_year,
        ..Default::default()
    };
    match (year, position) {
        (Some(year), Some(position)) => {
            record.years.insert(year.clone(), position);
        }
        (None, position) => record.position = position,
        (Some(_), None) => {}
    }

    for (name, value) in row {
        let typed = *name == fields.artist
            || *name == fields.title
            || *name == fields.position
            || fields.timestamp.as_ref() == Some(name)
            || (release_year.is_some() && fields.year.as_ref() == Some(name))
            || (year.is_some() && *name == fields.previous_position);
        if !typed {
            record.fields.insert(name.clone(), value.clone());
        }
    }
    record
}

// ============================================================================
// TESTS
// ============================================================================
