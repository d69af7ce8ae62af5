use std::path::PathBuf;
use thiserror::Error;

/// Per-request failures from the link store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The long URL is not an `http://` or `https://` URL with a host part.
    #[error("invalid URL: {0:?}")]
    InvalidUrl(String),

    #[error("short-code counter exhausted")]
    CounterExhausted,
}

/// Failures reading or writing the snapshot file.
///
/// None of these are fatal: a read failure falls back to an empty store and a
/// write failure leaves the store dirty for the next flush.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to read snapshot {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse snapshot {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to write snapshot {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
