use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use spread_scanner::config::ScannerConfig;
use spread_scanner::distribution::SubscriberSet;
use spread_scanner::engine::VolumeSource;
use spread_scanner::market_data::adapters::mexc::MexcConnector;
use spread_scanner::market_data::directory::MexcDirectory;
use spread_scanner::pipeline::spawn_scanner;
use spread_scanner::server::{self, AppState};
use spread_scanner::{shutdown, telemetry};

/// Watches MEXC spot order books and streams the widest bid/ask spreads.
#[derive(Parser, Debug)]
#[command(name = "spread-scanner", version, about)]
struct Cli {
    /// Config file (yaml/toml/json); defaults to ./config.* when present
    #[arg(long)]
    config: Option<String>,

    /// Minimum spread in percent, overrides spread.min_spread
    #[arg(long)]
    min_spread: Option<f64>,

    /// Default tracing filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Listen address, overrides server.host/server.port
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env

    let cli = Cli::parse();
    telemetry::init_tracing(&cli.log_level);

    let config = ScannerConfig::load(cli.config.as_deref())
        .context("loading configuration")?
        .with_min_spread(cli.min_spread)
        .context("applying --min-spread")?;

    if let Some(addr) = config.metrics_addr.as_deref() {
        let addr: SocketAddr = addr.parse().with_context(|| format!("invalid metrics_addr {addr}"))?;
        telemetry::init_metrics(addr)?;
    }

    let directory = Arc::new(MexcDirectory::new(&config.feed.rest_url).context("building REST client")?);
    let symbols = if config.symbols.is_empty() {
        directory
            .tradable_symbols()
            .await
            .context("fetching tradable symbols")?
    } else {
        info!(count = config.symbols.len(), "Using configured symbol list");
        config.symbols.clone()
    };

    let (trigger, shutdown) = shutdown::channel();
    let subscribers = Arc::new(SubscriberSet::new());
    let volumes = config
        .spread
        .enrich_volume
        .then(|| directory.clone() as Arc<dyn VolumeSource>);

    let connector = MexcConnector::new(&config.feed.ws_url, config.feed.depth);
    let scanner = spawn_scanner(connector, symbols, &config, volumes, subscribers.clone(), &trigger);

    let bind = cli.bind.unwrap_or_else(|| config.server_address());
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    let state = AppState {
        subscribers,
        static_dir: PathBuf::from(&config.server.static_dir),
        shutdown,
    };
    let server = tokio::spawn(server::serve(listener, state));

    wait_for_signal().await;
    info!("Shutdown requested");
    trigger.trigger();

    scanner.join().await;
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "HTTP server failed"),
        Err(e) => error!(error = %e, "HTTP server task panicked"),
    }
    info!("Bye");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
