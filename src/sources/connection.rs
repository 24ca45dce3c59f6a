use std::time::Duration;

use log::{debug, warn};
use serde_json::Value;
use tokio::time::{sleep, timeout};

use crate::{
    error::{CollectError, SourceError},
    schema::Snapshot,
};

use super::adapter::StatusSource;

/// Owns the status source and applies the query retry policy.
///
/// Behavior:
/// - Each attempt is bounded by `timeout`
/// - Transient failures (and timeouts) are retried forever,
///   `retry_delay` apart
/// - Fatal failures are returned to the caller
/// - A reply whose `ok` flag is falsy is fatal, never retried
pub struct SourceConnection<S> {
    source: S,
    timeout: Duration,
    retry_delay: Duration,
    disabled_sections: Vec<String>,

    /// Total attempts issued, including retries.
    attempts: u64,

    /// Attempts that ended in a transient failure.
    retries: u64,
}

impl<S: StatusSource> SourceConnection<S> {
    pub fn new(
        source: S,
        timeout: Duration,
        retry_delay: Duration,
        disabled_sections: Vec<String>,
    ) -> Self {
        Self {
            source,
            timeout,
            retry_delay,
            disabled_sections,
            attempts: 0,
            retries: 0,
        }
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn retries(&self) -> u64 {
        self.retries
    }

    pub fn target(&self) -> &str {
        self.source.target()
    }

    /// Fetches one snapshot, retrying through transient disconnects.
    pub async fn query(&mut self) -> Result<Snapshot, CollectError> {
        let snapshot = loop {
            self.attempts += 1;

            let attempt = timeout(
                self.timeout,
                self.source.server_status(&self.disabled_sections),
            )
            .await
            .unwrap_or_else(|_| {
                Err(SourceError::Transient(format!(
                    "query timed out after {:?}",
                    self.timeout
                )))
            });

            match attempt {
                Ok(snapshot) => break snapshot,
                Err(SourceError::Transient(reason)) => {
                    self.retries += 1;
                    warn!(
                        "source {} dropped the connection: {reason} (attempt {}), retrying in {:?}",
                        self.source.target(),
                        self.attempts,
                        self.retry_delay
                    );
                    sleep(self.retry_delay).await;
                }
                Err(SourceError::Fatal(e)) => return Err(CollectError::Source(e)),
            }
        };

        match snapshot.document.get("ok") {
            Some(flag) if truthy(flag) => {
                debug!("serverStatus ok after {} attempt(s)", self.attempts);
                Ok(snapshot)
            }
            other => Err(CollectError::StatusNotOk(
                other.map_or_else(|| "<missing>".to_string(), Value::to_string),
            )),
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Null => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedSource, assert_close};
    use serde_json::json;
    use tokio::time::Instant;

    const SECOND: Duration = Duration::from_secs(1);

    fn connection(source: ScriptedSource) -> SourceConnection<ScriptedSource> {
        SourceConnection::new(source, Duration::from_secs(30), SECOND, vec!["mem".into()])
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_until_success() {
        let source = ScriptedSource::new()
            .transient(3)
            .ok(json!({"ok": 1.0, "connections": {"current": 4}}));
        let mut conn = connection(source);

        let started = Instant::now();
        let snapshot = conn.query().await.unwrap();

        assert_eq!(conn.attempts(), 4);
        assert_eq!(conn.retries(), 3);
        assert_close(started.elapsed(), 3 * SECOND);
        assert_eq!(snapshot.document["connections"]["current"], 4);
    }

    #[tokio::test(start_paused = true)]
    async fn passes_disabled_sections_to_the_source() {
        let source = ScriptedSource::new().ok(json!({"ok": 1}));
        let seen = source.seen_sections();
        let mut conn = connection(source);

        conn.query().await.unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), &[vec!["mem".to_string()]]);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_are_retried_like_disconnects() {
        let source = ScriptedSource::new()
            .stall(Duration::from_secs(60))
            .ok(json!({"ok": true}));
        let mut conn = connection(source);

        let started = Instant::now();
        conn.query().await.unwrap();

        assert_eq!(conn.attempts(), 2);
        assert_close(started.elapsed(), Duration::from_secs(30) + SECOND);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_are_not_retried() {
        let source = ScriptedSource::new().fatal("auth failed").ok(json!({"ok": 1}));
        let mut conn = connection(source);

        let err = conn.query().await.unwrap_err();
        assert!(matches!(err, CollectError::Source(_)));
        assert_eq!(conn.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn falsy_ok_flag_is_fatal() {
        let source = ScriptedSource::new().ok(json!({"ok": 0.0}));
        let mut conn = connection(source);
        let err = conn.query().await.unwrap_err();
        assert!(matches!(err, CollectError::StatusNotOk(flag) if flag == "0.0"));

        let source = ScriptedSource::new().ok(json!({"uptime": 5}));
        let mut conn = connection(source);
        let err = conn.query().await.unwrap_err();
        assert!(matches!(err, CollectError::StatusNotOk(flag) if flag == "<missing>"));
        assert_eq!(conn.attempts(), 1);
    }

    #[test]
    fn truthiness_follows_the_usual_rules() {
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!(1.0)));
        assert!(truthy(&json!(true)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&Value::Null));
    }
}
