use crate::{error::SourceError, schema::Snapshot};

/// StatusSource is the abstraction layer between:
/// - The collector loop
/// - A concrete database client
///
/// Each implementation must:
/// - Issue one status query per call
/// - Convert the reply into a `Snapshot`
/// - Classify failures as transient (retry) or fatal
///
/// The caller owns the retry policy and the query timeout;
/// implementations must not retry internally.
#[async_trait::async_trait]
pub trait StatusSource: Send {
    /// Human readable target, used for logging only.
    fn target(&self) -> &str;

    /// Runs the status command with the given optional sections disabled.
    ///
    /// ERRORS:
    /// - `SourceError::Transient` when the connection silently dropped
    ///   and the same query should simply be retried
    /// - `SourceError::Fatal` for everything else
    async fn server_status(&mut self, disabled_sections: &[String]) -> Result<Snapshot, SourceError>;
}
