//! Error types for the last-known position store.

use std::path::PathBuf;

/// Failures reading or writing the persisted last-known position.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access position store at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("persisted position is malformed")]
    Decode(#[from] serde_json::Error),
}
