//! Data sources for the place-name explorer

pub mod sources;

use thiserror::Error;
use tokio::task::JoinError;

// Re-exports
pub use sources::{load_places, read_places, MemoryBackend, MemoryBackendConfig};

/// Errors that can occur while loading place data
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(String),

    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("row {row}: {message}")]
    InvalidRow { row: usize, message: String },

    #[error("Join error: {0}")]
    Join(#[from] JoinError),
}

impl From<csv::Error> for DataError {
    fn from(error: csv::Error) -> Self {
        match error.kind() {
            csv::ErrorKind::Io(io_err) => DataError::Io(std::io::Error::new(io_err.kind(), error.to_string())),
            _ => DataError::Csv(error.to_string()),
        }
    }
}
