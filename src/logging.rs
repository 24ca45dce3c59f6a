use std::io::Write;

use env_logger::{Builder, Env};

/// Installs the global logger.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `--verbose`.
/// Line format: `<timestamp> <LEVEL> <file>:<line>  <message>`.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };

    Builder::from_env(Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {}:{}  {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("?"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .init();
}
