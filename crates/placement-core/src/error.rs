//! Error types for placement operations

use thiserror::Error;

/// Errors that abort a placement operation.
///
/// Precondition violations and missing collaborator data are not errors:
/// those operations log a warning and leave state untouched.
#[derive(Debug, Clone, Error)]
pub enum PlacementError {
    #[error("Failed to materialize '{file_name}': {reason}")]
    Materialization { file_name: String, reason: String },

    #[error("Unknown placeable: {0}")]
    UnknownPlaceable(String),

    #[error("Invalid loop frequency: {0} Hz")]
    InvalidFrequency(u32),
}

/// Result type for placement operations
pub type PlacementResult<T> = Result<T, PlacementError>;

/// Errors while loading an inspection-point catalogue
#[derive(Debug, Error)]
pub enum InspectionError {
    #[error("Failed to read inspection points from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse inspection points: {0}")]
    Parse(#[from] serde_json::Error),
}
