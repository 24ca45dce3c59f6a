use std::path::PathBuf;

use clap::Parser;

/// Command line of the bridge. Every flag can also come from the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "mongo-carbon-bridge")]
#[command(about = "Polls MongoDB serverStatus and ships selected counters to Carbon")]
#[command(version)]
pub struct Args {
    /// MongoDB connection string
    #[arg(long, env = "BRIDGE_MONGO_URI", default_value = "mongodb://localhost:27017/admin")]
    pub uri: String,

    /// MongoDB query timeout in milliseconds
    #[arg(long = "timeout", env = "BRIDGE_MONGO_TIMEOUT_MS", default_value_t = 30_000)]
    pub timeout_ms: u64,

    /// Carbon pickle receiver host
    #[arg(long, env = "BRIDGE_GRAPHITE_HOST", default_value = "localhost")]
    pub graphite_host: String,

    /// Carbon pickle receiver port
    #[arg(long, env = "BRIDGE_GRAPHITE_PORT", default_value_t = 2004)]
    pub graphite_port: u16,

    /// Carbon connect/send timeout in seconds
    #[arg(long, env = "BRIDGE_GRAPHITE_TIMEOUT", default_value_t = 15.0)]
    pub graphite_timeout: f64,

    /// Seconds between two polls
    #[arg(long, env = "BRIDGE_INTERVAL", default_value_t = 1.0)]
    pub interval: f64,

    /// Metric name prefix; `{fqdn}` is replaced by the local host name
    #[arg(long, env = "BRIDGE_PREFIX", default_value = "{fqdn}.mongo.")]
    pub prefix: String,

    /// JSON file overriding the pattern list and disabled sections
    #[arg(long, env = "BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log a counters summary every N ticks (0 disables it)
    #[arg(long, default_value_t = 60)]
    pub report_every: u64,

    /// Do not connect to Carbon; log the points instead
    #[arg(long)]
    pub demo: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
