//! JSON dump of a finished run: canonical tracks in chart order, the position
//! index of every cycle, the artist chart and the full catalog.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::index::{ArtistChart, PositionIndex};
use crate::ingest::Ingestor;
use crate::models::{IdentityKey, TrackRecord, Year};

/// Canonical track at a current-year chart position.
#[derive(Debug, Serialize)]
pub struct ChartEntry<'a> {
    pub position: u32,
    pub key: &'a IdentityKey,
    pub aliases: &'a [IdentityKey],
    pub record: &'a TrackRecord,
    /// Artist key of the slot with the most chart entries
    pub max_artist_key: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct CatalogEntry<'a> {
    pub key: &'a IdentityKey,
    pub record: &'a TrackRecord,
}

#[derive(Debug, Serialize)]
pub struct CatalogDump<'a> {
    pub year: &'a Year,
    pub tracks: Vec<ChartEntry<'a>>,
    /// Position index per cycle: "current" and each historical year
    pub positions: BTreeMap<String, &'a PositionIndex>,
    pub artists: &'a ArtistChart,
    /// Every key, sorted
    pub catalog: Vec<CatalogEntry<'a>>,
}

impl<'a> CatalogDump<'a> {
    /// Build the dump, failing if the current chart has a gap.
    pub fn new(ingestor: &'a Ingestor, year: &'a Year) -> Result<Self> {
        let current = ingestor.positions();
        current
            .check_consecutive()
            .context("Current chart is incomplete")?;

        let mut tracks = Vec::with_capacity(current.len());
        for (position, keys) in current.iter() {
            let key = &keys[0];
            let record = ingestor
                .catalog()
                .get(key)
                .with_context(|| format!("No record for {} at position {}", key, position))?;
            tracks.push(ChartEntry {
                position,
                key,
                aliases: &keys[1..],
                record,
                max_artist_key: ingestor.artists().max_artist(position, keys),
            });
        }

        let mut positions = BTreeMap::new();
        positions.insert("current".to_string(), current);
        for year in ingestor.years() {
            if let Some(index) = ingestor.positions_for(Some(year)) {
                positions.insert(year.to_string(), index);
            }
        }

        let mut catalog: Vec<CatalogEntry> = ingestor
            .catalog()
            .iter()
            .map(|(key, record)| CatalogEntry { key, record })
            .collect();
        catalog.sort_by(|a, b| a.key.cmp(b.key));

        Ok(Self {
            year,
            tracks,
            positions,
            artists: ingestor.artists(),
            catalog,
        })
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Failed to create output file {:?}", path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).context("Failed to serialize catalog dump")?;
        writer.flush().context("Failed to write output file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrderingViolation;
    use crate::models::{FieldNames, FieldValue, Row};
    use crate::normalize::Normalizer;
    use tempfile::TempDir;

    fn ingest(ingestor: &mut Ingestor, artist: &str, title: &str, position: &str) {
        let row = Row::from([
            ("artiest".to_string(), FieldValue::from(artist)),
            ("titel".to_string(), FieldValue::from(title)),
            ("pos".to_string(), FieldValue::from(position)),
        ]);
        ingestor.ingest_row(&row, &FieldNames::csv(), None, 0).unwrap();
    }

    #[test]
    fn test_dump_in_chart_order() {
        let mut ingestor = Ingestor::new(Normalizer::default());
        ingest(&mut ingestor, "Eagles", "Hotel California", "2");
        ingest(&mut ingestor, "Queen & David Bowie", "Under Pressure", "1");
        let year = Year::new("2023");

        let dump = CatalogDump::new(&ingestor, &year).unwrap();
        assert_eq!(dump.tracks.len(), 2);
        assert_eq!(dump.tracks[0].position, 1);
        assert_eq!(dump.tracks[0].record.artist, "Queen & David Bowie");
        assert_eq!(dump.tracks[0].aliases.len(), 3);
        assert_eq!(dump.tracks[1].key, &IdentityKey::new("Eagles", "Hotel California"));
        assert_eq!(dump.catalog.len(), 5);
        assert!(dump.catalog.windows(2).all(|pair| pair[0].key < pair[1].key));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        dump.write_to_file(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["year"], "2023");
        assert_eq!(value["tracks"][0]["record"]["best"], "Canonical");
        assert_eq!(value["positions"]["current"]["1"][0]["artist"], "queen & david bowie");
        assert_eq!(value["artists"]["queen"][0], 1);
    }

    #[test]
    fn test_dump_max_artist_key() {
        let mut ingestor = Ingestor::new(Normalizer::default());
        ingest(&mut ingestor, "Queen & David Bowie", "Under Pressure", "1");
        ingest(&mut ingestor, "Queen", "Bohemian Rhapsody", "2");
        ingest(&mut ingestor, "Eagles", "Hotel California", "3");
        let year = Year::new("2023");

        let dump = CatalogDump::new(&ingestor, &year).unwrap();
        assert_eq!(dump.tracks[0].max_artist_key, Some("queen"));
        assert_eq!(dump.tracks[1].max_artist_key, Some("queen"));
        assert_eq!(dump.tracks[2].max_artist_key, Some("eagles"));
    }

    #[test]
    fn test_dump_rejects_gap() {
        let mut ingestor = Ingestor::new(Normalizer::default());
        ingest(&mut ingestor, "Queen", "Bohemian Rhapsody", "1");
        ingest(&mut ingestor, "Eagles", "Hotel California", "3");
        let year = Year::new("2023");

        let error = CatalogDump::new(&ingestor, &year).unwrap_err();
        assert_eq!(
            error.downcast_ref::<OrderingViolation>(),
            Some(&OrderingViolation {
                previous: 1,
                missing: 2
            })
        );
    }
}
