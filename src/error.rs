//! Error types for every stage of the pipeline.
//!
//! Recoverable conditions are classified where they are detected
//! (`SourceError::Transient`, `SinkError::is_recoverable`). Everything
//! else ends up in `CollectError` and stops the collector.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Invalid path pattern in the configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("empty path pattern")]
    Empty,

    #[error("pattern '{0}' contains an empty segment")]
    EmptySegment(String),

    #[error("pattern '{0}': wildcard is only allowed as the last segment")]
    WildcardNotLast(String),

    #[error("pattern '{0}': wildcard needs at least one segment before it")]
    BareWildcard(String),
}

/// The snapshot does not have the shape a pattern expects.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("pattern '{pattern}': key '{key}' not found")]
    MissingKey { pattern: String, key: String },

    #[error("pattern '{pattern}': value at '{key}' is not a mapping")]
    NotAMapping { pattern: String, key: String },

    #[error("metric '{name}' is not numeric")]
    NotNumeric { name: String },
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("pickle serialization failed: {0}")]
    Pickle(#[from] serde_pickle::Error),

    #[error("payload of {0} bytes does not fit the 4-byte length prefix")]
    TooLarge(usize),
}

/// Failure reported by a status source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The connection silently dropped; the same query should be retried.
    #[error("transient source error: {0}")]
    Transient(String),

    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

/// Failure of a single sink operation.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink {op} timed out after {timeout:?}")]
    Timeout { op: &'static str, timeout: Duration },

    #[error("sink {op} failed: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("sink is not connected")]
    NotConnected,
}

impl SinkError {
    /// Timeouts and dropped/refused connections are handled by reconnecting.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::NotConnected => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::NotConnected
            ),
        }
    }
}

/// Fatal errors that stop the collector loop.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("source query failed: {0:#}")]
    Source(anyhow::Error),

    #[error("serverStatus returned a falsy ok flag: {0}")]
    StatusNotOk(String),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("short write to sink: sent {sent} of {expected} bytes")]
    ShortWrite { sent: usize, expected: usize },
}
