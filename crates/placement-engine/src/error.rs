//! Error types for the orchestration layer

use thiserror::Error;

/// Errors reported by a persistence collaborator while attaching an anchor.
///
/// Attachment is best-effort: these are logged and never abort placement.
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    #[error("World anchor storage is unavailable: {0}")]
    Unavailable(String),
}
