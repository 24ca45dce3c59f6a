use anyhow::Context;
use clap::Parser;
use log::{error, info};

use mongo_carbon_bridge::{
    carbon_sender::{DemoConnector, SinkConnection, SinkConnector, TcpConnector},
    cli::Args,
    collector::Collector,
    config::Config,
    logging,
    sources::{MongoStatusSource, SourceConnection, StatusSource},
    util,
};

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// Responsibilities:
// - Parse flags and validate configuration
// - Resolve the metric prefix (once)
// - Build the source and sink connections
// - Run the collector until a fatal error or a termination signal
// - Close the sink socket on the way out, whatever happened
//
// Everything runs on one thread: ticks are strictly sequential.
//
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    // --------------------------------------------------------
    // Configuration errors (bad pattern, bad interval) stop us
    // here, before anything is connected.
    // --------------------------------------------------------
    let config = Config::from_args(&args)?;

    let fqdn = util::resolve_fqdn();
    info!("Starting. Using fqdn: {fqdn}");
    let prefix = util::render_prefix(&config.collector.prefix_template, &fqdn);

    let mongo = MongoStatusSource::connect(&config.source.uri, config.source.timeout).await?;
    let source = SourceConnection::new(
        mongo,
        config.source.timeout,
        config.collector.retry_delay,
        config.source.disabled_sections.clone(),
    );

    if config.sink.demo {
        info!("Carbon sink running in DEMO mode");
        run(source, DemoConnector, &config, prefix).await
    } else {
        let connector = TcpConnector::new(config.sink.host.clone(), config.sink.port);
        run(source, connector, &config, prefix).await
    }
}

/// Connects the sink, runs the loop, and always shuts the socket down.
async fn run<S, C>(
    source: SourceConnection<S>,
    connector: C,
    config: &Config,
    prefix: String,
) -> anyhow::Result<()>
where
    S: StatusSource,
    C: SinkConnector,
{
    let mut sink = SinkConnection::new(connector, config.sink.timeout);
    sink.connect().await.context("initial connection to carbon failed")?;

    let mut collector = Collector::new(source, sink, &config.collector, prefix);

    let result = tokio::select! {
        result = collector.run() => result.context("collector stopped"),
        () = shutdown_signal() => {
            info!("termination signal received");
            Ok(())
        }
    };

    collector.shutdown().await;

    if let Err(e) = &result {
        error!("{e:#}");
    }
    result
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
