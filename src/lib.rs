// ------------------------------------------------------------
// Module declarations
// ------------------------------------------------------------
//
// Each module represents a well-defined responsibility:
//
// - cli:           Command line flags (clap)
// - config:        Validated runtime configuration
// - logging:       env_logger setup
// - schema:        Snapshot, metric point and batch types
// - util:          Host name resolution and prefix templating
// - sources:       Status sources and the query retry policy
// - collector:     Pattern extraction and the polling loop
// - encoder:       Carbon pickle framing
// - carbon_sender: Sink connection (connect, send, shutdown)
// - metrics:       Counters about the bridge itself
// - error:         Error types per stage
//
pub mod carbon_sender;
pub mod cli;
pub mod collector;
pub mod config;
pub mod encoder;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod schema;
pub mod sources;
pub mod util;

#[cfg(test)]
mod testing;
