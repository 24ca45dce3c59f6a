use std::time::Duration;

use log::{Level, debug, info, log_enabled, warn};
use tokio::time::{Instant, sleep};

use crate::{
    carbon_sender::{ConnectionState, SinkConnection, SinkConnector},
    collector::extractor::{PathPattern, extract},
    config::CollectorConfig,
    encoder,
    error::CollectError,
    metrics::RuntimeMetrics,
    schema::PointBatch,
    sources::{SourceConnection, StatusSource},
};

/// What one tick did, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub points: usize,
    pub bytes: usize,

    /// Time spent querying, extracting, encoding and sending
    pub elapsed: Duration,

    /// Time slept afterwards to fill the interval
    pub slept: Duration,
}

/// ============================================================
/// Collector
/// ============================================================
///
/// The polling loop. Owns the only source and the only sink
/// connection of the process.
///
/// Each tick:
/// - Query the source (retrying transient disconnects)
/// - Flatten the snapshot into points
/// - Encode and frame the batch
/// - Send it, reconnecting the sink as needed
/// - Sleep for whatever is left of the interval
///
/// GUARANTEES:
/// - One tick at a time, never overlapping
/// - A slow tick delays the next one, it is never skipped
/// - A batch that hits a sink outage is resent in full after reconnect
pub struct Collector<S, C: SinkConnector> {
    source: SourceConnection<S>,
    sink: SinkConnection<C>,
    patterns: Vec<PathPattern>,
    prefix: String,
    interval: Duration,
    retry_delay: Duration,
    report_every: u64,
    metrics: RuntimeMetrics,
}

impl<S: StatusSource, C: SinkConnector> Collector<S, C> {
    pub fn new(
        source: SourceConnection<S>,
        sink: SinkConnection<C>,
        config: &CollectorConfig,
        prefix: String,
    ) -> Self {
        Self {
            source,
            sink,
            patterns: config.patterns.clone(),
            prefix,
            interval: config.interval,
            retry_delay: config.retry_delay,
            report_every: config.report_every,
            metrics: RuntimeMetrics::default(),
        }
    }

    pub fn metrics(&self) -> &RuntimeMetrics {
        &self.metrics
    }

    /// Runs ticks until a fatal error occurs.
    ///
    /// The caller is responsible for `shutdown()` afterwards.
    pub async fn run(&mut self) -> Result<(), CollectError> {
        info!(
            "starting loop: source={} sink={} interval={:?} patterns={}",
            self.source.target(),
            self.sink.describe(),
            self.interval,
            self.patterns.len()
        );

        loop {
            self.run_once().await?;
        }
    }

    /// One full tick followed by pacing.
    pub async fn run_once(&mut self) -> Result<TickReport, CollectError> {
        let started = Instant::now();
        let (points, bytes) = self.tick().await?;
        let elapsed = started.elapsed();

        self.metrics.record_tick(points, bytes, elapsed);
        self.metrics.source_retries = self.source.retries();
        if self.metrics.report_due(self.report_every) {
            info!("{}", self.metrics);
        }

        let slept = self.pace(elapsed).await;
        Ok(TickReport {
            points,
            bytes,
            elapsed,
            slept,
        })
    }

    /// Query, extract, encode, send. Returns (points, bytes sent).
    async fn tick(&mut self) -> Result<(usize, usize), CollectError> {
        let snapshot = self.source.query().await?;
        let batch = extract(
            &snapshot.document,
            &self.patterns,
            &self.prefix,
            snapshot.timestamp(),
        )?;

        self.log_batch(&batch);

        let frame = encoder::encode(&batch)?;
        let sent = self.deliver(&frame).await?;

        debug!("tick: {} points, {} bytes", batch.len(), sent);
        Ok((batch.len(), sent))
    }

    /// Sends one framed batch, reconnecting until it goes through.
    ///
    /// Recoverable failures (timeout, reset, refused) close the
    /// socket, wait `retry_delay` and resend the same frame on a
    /// fresh connection. Anything else is fatal, and so is a write
    /// that did not take the whole frame.
    pub async fn deliver(&mut self, frame: &[u8]) -> Result<usize, CollectError> {
        let mut need_reconnect = self.sink.state() == ConnectionState::Disconnected;

        loop {
            if need_reconnect {
                match self.sink.connect().await {
                    Ok(()) => {
                        self.metrics.sink_reconnects += 1;
                        need_reconnect = false;
                    }
                    Err(e) if e.is_recoverable() => {
                        warn!("{e}, retrying in {:?}", self.retry_delay);
                        sleep(self.retry_delay).await;
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            match self.sink.send(frame).await {
                Ok(sent) if sent == frame.len() => return Ok(sent),
                Ok(sent) => {
                    return Err(CollectError::ShortWrite {
                        sent,
                        expected: frame.len(),
                    });
                }
                Err(e) if e.is_recoverable() => {
                    warn!("{e}, reconnecting in {:?}", self.retry_delay);
                    need_reconnect = true;
                    sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Sleeps for what is left of the interval and returns how long.
    async fn pace(&self, elapsed: Duration) -> Duration {
        let delay = remaining(self.interval, elapsed);
        if !delay.is_zero() {
            sleep(delay).await;
        }
        delay
    }

    /// Best-effort close of the sink socket.
    pub async fn shutdown(&mut self) {
        info!("shutting down: {}", self.metrics);
        self.sink.shutdown().await;
    }

    fn log_batch(&self, batch: &PointBatch) {
        if self.sink.is_demo() {
            for p in &batch.points {
                debug!("DEMO -> {} {:?} {}", p.name, p.value, p.timestamp);
            }
        } else if log_enabled!(Level::Trace) {
            for p in &batch.points {
                log::trace!("{} {:?} {}", p.name, p.value, p.timestamp);
            }
        }
    }
}

/// Sleep needed to fill the interval; zero once the work overran it.
pub fn remaining(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}
