use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Deserialize;

use crate::{
    cli::Args,
    collector::extractor::{PathPattern, parse_patterns},
};

/// Counters shipped when no config file overrides them.
pub const DEFAULT_PATTERNS: &[&str] = &[
    "connections.current",
    "opcounters.*",
    "backgroundFlushing.flushes",
    "backgroundFlushing.total_ms",
    "dur.commitsInWriteLock",
    "metrics.document.*",
    "metrics.record.moves",
    "globalLock.lockTime",
];

/// serverStatus sections that are expensive and unused.
///
/// NOTE:
/// `recordStats` takes a read lock on every database.
pub const DEFAULT_DISABLED_SECTIONS: &[&str] = &[
    "network",
    "cursors",
    "repl",
    "opcountersRepl",
    "recordStats",
    "mem",
    "asserts",
    "indexCounters",
];

/// Pause between two attempts after a recoverable failure.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

// ------------------------------------------------------------
// Root configuration
// ------------------------------------------------------------
//
// Built once at startup from the command line plus the optional
// JSON file, then handed to the collector. Never changes while
// the process runs.
//
#[derive(Debug, Clone)]
pub struct Config {
    pub source: SourceConfig,
    pub sink: SinkConfig,
    pub collector: CollectorConfig,
}

#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// MongoDB connection string
    pub uri: String,

    /// Bound on a single serverStatus attempt
    pub timeout: Duration,

    /// serverStatus sections switched off on every query
    pub disabled_sections: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub host: String,
    pub port: u16,

    /// Bound on connect and on each send
    pub timeout: Duration,

    /// Demo mode flag (nothing sent, points logged)
    pub demo: bool,
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Target duration of one tick
    pub interval: Duration,

    /// Metric prefix before `{fqdn}` substitution
    pub prefix_template: String,

    /// Validated path patterns, in emission order
    pub patterns: Vec<PathPattern>,

    /// Pause before a source retry or sink reconnect
    pub retry_delay: Duration,

    /// Summary log line every N ticks, 0 = never
    pub report_every: u64,
}

// ------------------------------------------------------------
// Config file
// ------------------------------------------------------------
//
// Optional JSON overlay. Both fields may be omitted.
//
// Example:
// {
//   "patterns": ["connections.current", "locks.app.timeLockedMicros.*"],
//   "disabled_sections": ["network", "mem"]
// }
//
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub patterns: Option<Vec<String>>,
    pub disabled_sections: Option<Vec<String>>,
}

impl Config {
    /// Validates the command line (and config file, if any).
    pub fn from_args(args: &Args) -> anyhow::Result<Self> {
        let file = match &args.config {
            Some(path) => load_config(path)?,
            None => FileConfig::default(),
        };
        Self::build(args, file)
    }

    fn build(args: &Args, file: FileConfig) -> anyhow::Result<Self> {
        let raw_patterns = file
            .patterns
            .unwrap_or_else(|| DEFAULT_PATTERNS.iter().map(|s| s.to_string()).collect());
        if raw_patterns.is_empty() {
            bail!("pattern list is empty");
        }
        let patterns = parse_patterns(&raw_patterns).context("invalid path pattern")?;

        let disabled_sections = file
            .disabled_sections
            .unwrap_or_else(|| DEFAULT_DISABLED_SECTIONS.iter().map(|s| s.to_string()).collect());

        if args.timeout_ms == 0 {
            bail!("--timeout must be greater than zero");
        }

        Ok(Self {
            source: SourceConfig {
                uri: args.uri.clone(),
                timeout: Duration::from_millis(args.timeout_ms),
                disabled_sections,
            },
            sink: SinkConfig {
                host: args.graphite_host.clone(),
                port: args.graphite_port,
                timeout: seconds("--graphite-timeout", args.graphite_timeout)?,
                demo: args.demo,
            },
            collector: CollectorConfig {
                interval: seconds("--interval", args.interval)?,
                prefix_template: args.prefix.clone(),
                patterns,
                retry_delay: RETRY_DELAY,
                report_every: args.report_every,
            },
        })
    }
}

/// Positive, finite seconds to a Duration.
fn seconds(flag: &str, value: f64) -> anyhow::Result<Duration> {
    if !(value > 0.0) {
        bail!("{flag} must be a positive number of seconds, got {value}");
    }
    Duration::try_from_secs_f64(value).with_context(|| format!("{flag} is out of range: {value}"))
}

// ------------------------------------------------------------
// Configuration loader
// ------------------------------------------------------------
//
// Reads a JSON configuration file from disk and deserializes
// it into `FileConfig`.
//
pub fn load_config(path: &Path) -> anyhow::Result<FileConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let cfg = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["mongo-carbon-bridge"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_produce_the_builtin_patterns() {
        let cfg = Config::build(&args(&[]), FileConfig::default()).unwrap();

        let patterns: Vec<&str> = cfg.collector.patterns.iter().map(PathPattern::as_str).collect();
        assert_eq!(patterns, DEFAULT_PATTERNS);
        assert_eq!(cfg.source.disabled_sections.len(), DEFAULT_DISABLED_SECTIONS.len());
        assert_eq!(cfg.source.timeout, Duration::from_secs(30));
        assert_eq!(cfg.sink.timeout, Duration::from_secs(15));
        assert_eq!(cfg.collector.interval, Duration::from_secs(1));
        assert_eq!(cfg.collector.retry_delay, RETRY_DELAY);
    }

    #[test]
    fn fractional_interval_is_kept() {
        let cfg = Config::build(&args(&["--interval", "0.25"]), FileConfig::default()).unwrap();
        assert_eq!(cfg.collector.interval, Duration::from_millis(250));
    }

    #[test]
    fn rejects_non_positive_durations() {
        assert!(Config::build(&args(&["--interval", "0"]), FileConfig::default()).is_err());
        assert!(Config::build(&args(&["--interval=-1"]), FileConfig::default()).is_err());
        assert!(Config::build(&args(&["--graphite-timeout", "NaN"]), FileConfig::default()).is_err());
        assert!(Config::build(&args(&["--timeout", "0"]), FileConfig::default()).is_err());
    }

    #[test]
    fn file_overrides_patterns_and_sections() {
        let file: FileConfig = serde_json::from_str(
            r#"{"patterns": ["locks.app.timeLockedMicros.*"], "disabled_sections": []}"#,
        )
        .unwrap();
        let cfg = Config::build(&args(&[]), file).unwrap();

        assert_eq!(cfg.collector.patterns.len(), 1);
        assert!(cfg.collector.patterns[0].is_wildcard());
        assert!(cfg.source.disabled_sections.is_empty());
    }

    #[test]
    fn misplaced_wildcard_fails_at_startup() {
        let file = FileConfig {
            patterns: Some(vec!["locks.*.timeLockedMicros".into()]),
            disabled_sections: None,
        };
        let err = Config::build(&args(&[]), file).unwrap_err();
        assert!(format!("{err:#}").contains("wildcard is only allowed as the last segment"));
    }

    #[test]
    fn empty_pattern_list_is_rejected() {
        let file = FileConfig {
            patterns: Some(vec![]),
            disabled_sections: None,
        };
        assert!(Config::build(&args(&[]), file).is_err());
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(serde_json::from_str::<FileConfig>(r#"{"patern": []}"#).is_err());
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/bridge.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
