//! Run manifest: which chart sources make up one processing run, and the pass
//! that feeds them to the ingestor in the required order.
//!
//! ```json
//! {
//!   "year": "2023",
//!   "current": [{ "path": "2023.json", "format": "json", "rows": "/data/0/positions" }],
//!   "historical": [{ "year": "2014", "path": "overview.csv", "fields": { "position": "pos 2014" } }]
//! }
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ingest::Ingestor;
use crate::models::{FieldNames, Row, Year};
use crate::progress::{create_progress_bar, log_progress};
use crate::readers::{lookup_encoding, read_csv_rows, read_json_rows, SourceFormat};

/// Field name overrides of a source; unset names keep the format defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FieldOverrides {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub position: Option<String>,
    pub year: Option<String>,
    pub previous_position: Option<String>,
    pub timestamp: Option<String>,
}

impl FieldOverrides {
    pub fn apply(&self, mut fields: FieldNames) -> FieldNames {
        if let Some(artist) = &self.artist {
            fields.artist = artist.clone();
        }
        if let Some(title) = &self.title {
            fields.title = title.clone();
        }
        if let Some(position) = &self.position {
            fields.position = position.clone();
        }
        if let Some(previous) = &self.previous_position {
            fields.previous_position = previous.clone();
        }
        if self.year.is_some() {
            fields.year = self.year.clone();
        }
        if self.timestamp.is_some() {
            fields.timestamp = self.timestamp.clone();
        }
        fields
    }
}

/// One chart source file.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Source {
    pub path: PathBuf,
    #[serde(default)]
    pub format: SourceFormat,
    /// JSON pointer to the array of rows
    #[serde(default)]
    pub rows: Option<String>,
    #[serde(default)]
    pub fields: FieldOverrides,
    /// Added to every chart position of the source
    #[serde(default)]
    pub offset: i64,
    /// Character encoding label, UTF-8 when absent
    #[serde(default)]
    pub encoding: Option<String>,
}

impl Source {
    /// Field names for this source. The broadcaster's overview CSV holds one
    /// "pos <year>" column per year, which is the default for historical CSV.
    pub fn field_names(&self, year: Option<&Year>) -> FieldNames {
        let mut fields = self.format.default_fields();
        if let (Some(year), SourceFormat::Csv) = (year, self.format) {
            fields.position = format!("pos {}", year);
        }
        self.fields.apply(fields)
    }

    /// Read all rows of the source, resolving its path against `base_dir`.
    pub fn read_rows(&self, base_dir: &Path) -> Result<Vec<Row>> {
        let path = base_dir.join(&self.path);
        let encoding = lookup_encoding(self.encoding.as_deref())?;
        match self.format {
            SourceFormat::Csv => read_csv_rows(&path, encoding),
            SourceFormat::Json => read_json_rows(&path, self.rows.as_deref(), encoding),
        }
    }
}

/// Source of one historical processing year.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct HistoricalSource {
    pub year: Year,
    #[serde(flatten)]
    pub source: Source,
}

/// The sources of one processing run.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    /// Year of the current chart
    pub year: Year,
    #[serde(default)]
    pub current: Vec<Source>,
    #[serde(default)]
    pub historical: Vec<HistoricalSource>,
    /// Directory that relative source paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Manifest {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse run manifest")
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run manifest {:?}", path))?;
        let mut manifest = Self::from_json_str(&json)?;
        manifest.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(manifest)
    }

    /// Historical sources, newest year first. Sources of the same year keep
    /// their manifest order.
    pub fn historical_in_order(&self) -> Vec<&HistoricalSource> {
        let mut sources: Vec<&HistoricalSource> = self.historical.iter().collect();
        sources.sort_by(|a, b| b.year.cmp(&a.year));
        sources
    }

    /// Resolved paths of every source file.
    pub fn source_paths(&self) -> Vec<PathBuf> {
        self.current
            .iter()
            .chain(self.historical.iter().map(|historical| &historical.source))
            .map(|source| self.base_dir.join(&source.path))
            .collect()
    }

    /// Feed every source to the ingestor: current-year sources first, then
    /// historical years in decreasing order.
    pub fn run(&self, ingestor: &mut Ingestor) -> Result<()> {
        for source in &self.current {
            self.ingest_source(ingestor, source, None)?;
        }
        for historical in self.historical_in_order() {
            if historical.year >= self.year {
                anyhow::bail!(
                    "Historical year {} is not before current year {}",
                    historical.year,
                    self.year
                );
            }
            self.ingest_source(ingestor, &historical.source, Some(&historical.year))?;
        }
        Ok(())
    }

    fn ingest_source(&self, ingestor: &mut Ingestor, source: &Source, year: Option<&Year>) -> Result<usize> {
        let phase = match year {
            Some(year) => format!("{} {}", year, source.path.display()),
            None => format!("current {}", source.path.display()),
        };
        let rows = source.read_rows(&self.base_dir)?;
        let fields = source.field_names(year);
        ingestor.clear_pending_timestamp();

        let total = rows.len() as u64;
        let pb = create_progress_bar(total, &phase);
        let mut tracks = 0;
        for (index, row) in rows.iter().enumerate() {
            let ingested = ingestor
                .ingest_row(row, &fields, year, source.offset)
                .with_context(|| format!("Failed to ingest row {} of {:?}", index + 1, source.path))?;
            if ingested.is_some() {
                tracks += 1;
            }
            pb.inc(1);
            log_progress(&phase, index as u64 + 1, total, 500);
        }
        pb.finish_with_message(format!("{}: {} tracks", phase, tracks));
        log::info!("{}: {} rows, {} tracks", phase, rows.len(), tracks);
        Ok(tracks)
    }
}
