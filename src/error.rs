/// Errors raised while ingesting a chart row.
///
/// Both variants point at a field-mapping misconfiguration of the source,
/// not at bad chart data, so they abort the run.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Missing required field '{field}' in row")]
    MissingField { field: String },

    #[error("Invalid chart position {value:?} in field '{field}'")]
    InvalidPosition { field: String, value: String },
}

impl IngestError {
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid_position(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidPosition {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// A gap in what should be consecutive chart positions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Missing chart position {missing} (after {previous})")]
pub struct OrderingViolation {
    pub previous: u32,
    pub missing: u32,
}

/// A processing year label that is not of the form "2014" or "2023.5".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid year label {0:?}")]
pub struct InvalidYear(pub String);
