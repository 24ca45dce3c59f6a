use std::fmt;
use std::time::Duration;

/// Runtime counters for the bridge itself.
///
/// Purpose:
/// - Track throughput (ticks, points, bytes)
/// - Track resilience events (source retries, sink reconnects)
/// - Track how long the last tick took
///
/// Design:
/// - Owned by the collector, updated inline on the single loop
/// - Reported every N ticks as one log line
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RuntimeMetrics {
    // Throughput
    pub ticks: u64,
    pub points_sent: u64,
    pub bytes_sent: u64,

    // Resilience
    pub source_retries: u64,
    pub sink_reconnects: u64,

    // Latency of the most recent tick (query to send)
    pub last_tick: Duration,
}

impl RuntimeMetrics {
    pub fn record_tick(&mut self, points: usize, bytes: usize, elapsed: Duration) {
        self.ticks += 1;
        self.points_sent += points as u64;
        self.bytes_sent += bytes as u64;
        self.last_tick = elapsed;
    }

    /// True when a summary line is due after the current tick.
    pub fn report_due(&self, every: u64) -> bool {
        every > 0 && self.ticks > 0 && self.ticks % every == 0
    }
}

impl fmt::Display for RuntimeMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[METRICS] ticks={} points={} bytes={} source_retries={} sink_reconnects={} last_tick={:?}",
            self.ticks,
            self.points_sent,
            self.bytes_sent,
            self.source_retries,
            self.sink_reconnects,
            self.last_tick,
        )
    }
}
