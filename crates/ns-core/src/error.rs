//! Error types for the orchestration core

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::fetch::Channel;

/// Why a fetch did not produce data
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request task ended before responding")]
    Dropped,
}

impl From<anyhow::Error> for FetchError {
    fn from(error: anyhow::Error) -> Self {
        FetchError::Network(format!("{error:#}"))
    }
}

/// Errors raised while setting up or driving the explorer
#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no tokio runtime available to run fetches")]
    NoRuntime,

    #[error("explorer has been disposed")]
    Disposed,
}

/// A failure surfaced to the query-state owner for display.
///
/// Shown next to the last-known-good data, never instead of it.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorNotice {
    pub channel: Channel,
    pub error: FetchError,
    pub at: DateTime<Utc>,
}

impl ErrorNotice {
    pub fn new(channel: Channel, error: FetchError) -> Self {
        Self {
            channel,
            error,
            at: Utc::now(),
        }
    }

    pub fn message(&self) -> String {
        format!("{} unavailable: {}", self.channel, self.error)
    }
}
