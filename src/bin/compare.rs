//! Compare two catalog dumps track by track
//!
//! Usage: compare <first.json> <second.json> [--config exceptions.json] [--expected N]
//!
//! Artists and titles count as equal when they share a normalized spelling.
//! A year present on one side only is accepted when the other side's position
//! lies beyond the expected chart length.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Instant;

use chart_reconcile::config::NormalizerConfig;
use chart_reconcile::models::{TrackRecord, Year};
use chart_reconcile::normalize::Normalizer;

const DEFAULT_EXPECTED_POSITIONS: u32 = 2000;

#[derive(Debug, Deserialize)]
struct Dump {
    year: Year,
    tracks: Vec<DumpTrack>,
}

#[derive(Debug, Deserialize)]
struct DumpTrack {
    position: u32,
    record: TrackRecord,
}

fn load_dump(path: &Path) -> Result<Dump> {
    let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read dump {:?}", path))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse dump {:?}", path))
}

fn same_artist(normalizer: &Normalizer, first: &str, second: &str) -> bool {
    first.to_lowercase() == second.to_lowercase()
        || normalizer
            .normalize_artist(first)
            .intersects(&normalizer.normalize_artist(second))
}

fn same_title(normalizer: &Normalizer, first: &str, second: &str) -> bool {
    first.to_lowercase() == second.to_lowercase()
        || normalizer
            .normalize_title(first)
            .intersects(&normalizer.normalize_title(second))
}

/// Differences between two tracks at the same chart position.
fn compare_tracks(normalizer: &Normalizer, first: &DumpTrack, second: &DumpTrack, expected: u32) -> Vec<String> {
    let mut errors = Vec::new();

    if first.position != second.position {
        errors.push(format!("Difference in position: {} != {}", first.position, second.position));
    }
    let (a, b) = (&first.record, &second.record);
    if !same_artist(normalizer, &a.artist, &b.artist) {
        errors.push(format!("Difference in artist: {} != {}", a.artist, b.artist));
    }
    if !same_title(normalizer, &a.title, &b.title) {
        errors.push(format!("Difference in title: {} != {}", a.title, b.title));
    }
    if a.release_year != b.release_year {
        errors.push(format!(
            "Difference in release year: {:?} != {:?}",
            a.release_year, b.release_year
        ));
    }

    let years: BTreeSet<&Year> = a.years.keys().chain(b.years.keys()).collect();
    for year in years {
        let same = match (a.years.get(year), b.years.get(year)) {
            (Some(x), Some(y)) => x == y,
            (Some(only), None) | (None, Some(only)) => *only > expected,
            (None, None) => true,
        };
        if !same {
            errors.push(format!(
                "Difference in {}: {:?} != {:?}",
                year,
                a.years.get(year),
                b.years.get(year)
            ));
        }
    }

    errors
}

/// Compare two dumps, printing differences. Returns the number of errors.
fn compare_dumps(normalizer: &Normalizer, first: &Dump, second: &Dump, expected: u32) -> usize {
    let mut errors = 0;
    if first.year != second.year {
        eprintln!("Dumps are for different years: {} != {}", first.year, second.year);
        errors += 1;
    }

    for index in 0..first.tracks.len().max(second.tracks.len()) {
        match (first.tracks.get(index), second.tracks.get(index)) {
            (Some(one), Some(two)) => {
                let track_errors = compare_tracks(normalizer, one, two, expected);
                if !track_errors.is_empty() {
                    eprintln!(
                        "Differences between {:?} - {:?} and {:?} - {:?} at {}:\n- {}",
                        one.record.artist,
                        one.record.title,
                        two.record.artist,
                        two.record.title,
                        index,
                        track_errors.join("\n- ")
                    );
                    errors += track_errors.len();
                }
            }
            (None, _) => {
                eprintln!("Missing track in first dump at {}", index);
                errors += 1;
            }
            (_, None) => {
                eprintln!("Missing track in second dump at {}", index);
                errors += 1;
            }
        }
    }
    errors
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: compare <first.json> <second.json> [--config exceptions.json] [--expected N]");
        std::process::exit(1);
    }

    let option = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
    };
    let expected: u32 = option("--expected")
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_EXPECTED_POSITIONS);
    let config = match option("--config") {
        Some(path) => NormalizerConfig::from_json_file(Path::new(path))?,
        None => NormalizerConfig::default(),
    };
    let normalizer = Normalizer::new(config);

    let start = Instant::now();
    let first = load_dump(Path::new(&args[1]))?;
    let second = load_dump(Path::new(&args[2]))?;
    println!(
        "Comparing {} tracks with {} tracks",
        first.tracks.len(),
        second.tracks.len()
    );

    let errors = compare_dumps(&normalizer, &first, &second, expected);
    println!("Detected {} errors ({:.2}s)", errors, start.elapsed().as_secs_f64());

    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chart_reconcile::ingest::Ingestor;
    use chart_reconcile::models::{FieldNames, FieldValue, Row};
    use chart_reconcile::output::CatalogDump;
    use std::collections::BTreeMap;

    fn track(position: u32, artist: &str, title: &str, years: &[(&str, u32)]) -> DumpTrack {
        DumpTrack {
            position,
            record: TrackRecord {
                artist: artist.to_string(),
                title: title.to_string(),
                years: years
                    .iter()
                    .map(|(year, position)| (Year::new(*year), *position))
                    .collect::<BTreeMap<_, _>>(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_alternative_spellings_are_equal() {
        let normalizer = Normalizer::default();
        let one = track(1, "Queen & David Bowie", "Under Pressure", &[("2015", 12)]);
        let two = track(1, "David Bowie & Queen", "Under Pressure (Live)", &[("2015", 12)]);
        assert!(compare_tracks(&normalizer, &one, &two, 2000).is_empty());
    }

    #[test]
    fn test_differences_reported() {
        let normalizer = Normalizer::default();
        let one = track(1, "Queen", "Bohemian Rhapsody", &[("2015", 1)]);
        let two = track(1, "Eagles", "Hotel California", &[("2015", 2)]);
        let errors = compare_tracks(&normalizer, &one, &two, 2000);
        assert_eq!(errors.len(), 3);
        assert!(errors[2].starts_with("Difference in 2015"));
    }

    #[test]
    fn test_year_on_one_side_beyond_chart_length() {
        let normalizer = Normalizer::default();
        let one = track(1, "Queen", "Bohemian Rhapsody", &[("2014", 2500)]);
        let two = track(1, "Queen", "Bohemian Rhapsody", &[]);
        assert!(compare_tracks(&normalizer, &one, &two, 2000).is_empty());

        let one = track(1, "Queen", "Bohemian Rhapsody", &[("2014", 25)]);
        assert_eq!(compare_tracks(&normalizer, &one, &two, 2000).len(), 1);
    }

    #[test]
    fn test_compare_written_dumps() {
        let mut ingestor = Ingestor::new(Normalizer::default());
        for (artist, title, position) in [("Queen", "Bohemian Rhapsody", "1"), ("Eagles", "Hotel California", "2")] {
            let row = Row::from([
                ("artiest".to_string(), FieldValue::from(artist)),
                ("titel".to_string(), FieldValue::from(title)),
                ("pos".to_string(), FieldValue::from(position)),
            ]);
            ingestor.ingest_row(&row, &FieldNames::csv(), None, 0).unwrap();
        }
        let year = Year::new("2023");
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        CatalogDump::new(&ingestor, &year).unwrap().write_to_file(&path).unwrap();

        let first = load_dump(&path).unwrap();
        let second = load_dump(&path).unwrap();
        assert_eq!(first.tracks.len(), 2);
        assert_eq!(compare_dumps(&Normalizer::default(), &first, &second, 2000), 0);

        let mut shorter = load_dump(&path).unwrap();
        shorter.tracks.pop();
        assert_eq!(compare_dumps(&Normalizer::default(), &first, &shorter, 2000), 1);
    }
}
