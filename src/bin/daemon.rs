use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cortexd::actors::alert::AlertHandle;
use cortexd::actors::monitor::MonitorHandle;
use cortexd::config::{Config, ConfigStore};
use cortexd::ipc::dispatch::Dispatcher;
use cortexd::ipc::server::IpcServer;
use cortexd::monitors::resources::SystemSampler;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init(log_level: &str) {
    let level: LevelFilter = log_level.parse().unwrap_or(LevelFilter::INFO);
    let filter = filter::Targets::new().with_target("cortexd", level);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    // Peek at the file only for the log level; logging is not up yet, the
    // store logs the authoritative load right after.
    let log_level = args
        .config
        .as_deref()
        .and_then(Config::load)
        .map(|config| config.log_level)
        .unwrap_or_else(|| String::from("info"));
    init(&log_level);

    let store = Arc::new(ConfigStore::new(args.config.clone()));

    info!("cortexd {} starting", env!("CARGO_PKG_VERSION"));
    trace!("started with args: {args:?}");

    let (event_tx, event_rx) = broadcast::channel(64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let monitor = MonitorHandle::spawn(Arc::clone(&store), SystemSampler::new(), event_tx);
    let alerts = AlertHandle::spawn(event_rx);

    // A reload mid-sleep reschedules the next tick against the new interval.
    {
        let monitor = monitor.clone();
        store.on_change(move |_config| monitor.config_changed());
    }

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&store),
        Some(monitor.clone()),
        Some(alerts.clone()),
        shutdown_tx.clone(),
    ));

    let server = IpcServer::new(Arc::clone(&store), dispatcher, shutdown_rx);
    let mut server_task = tokio::spawn(server.serve());

    tokio::select! {
        result = &mut server_task => {
            result.context("IPC server task failed")??;
        }

        _ = shutdown_signal() => {
            info!("received shutdown signal");
            let _ = shutdown_tx.send(true);
            server_task.await.context("IPC server task failed")??;
        }
    }

    // Server is down; stop the background actors before the supervisor
    // reaps us.
    debug!("stopping actors");
    monitor.shutdown().await;
    alerts.shutdown().await;

    info!("cortexd stopped");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            tracing::error!("cannot install SIGTERM handler: {e}");
            std::future::pending().await
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}
