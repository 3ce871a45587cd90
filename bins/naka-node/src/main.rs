//! naka full service binary.
//!
//! Loads configuration, runs an immediate refresh pass followed by periodic
//! ones, and serves the registry over HTTP until Ctrl+C.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use naka_node_lib::api::CoefficientRow;
use naka_node_lib::{router, Node, NodeConfig};

/// Per-network Nakamoto coefficient service.
#[derive(Parser, Debug)]
#[command(
    name = "naka-node",
    version,
    about = "Tracks Nakamoto coefficients across networks and serves them over HTTP"
)]
struct Args {
    /// TOML configuration file (layered over built-in defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory for the coefficient store
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// HTTP server bind address
    #[arg(long)]
    http_bind: Option<String>,

    /// HTTP server port
    #[arg(long)]
    http_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Run a single refresh pass, print the coefficients as JSON, and exit
    #[arg(long)]
    once: bool,
}

impl Args {
    /// Layered configuration with command-line flags applied last.
    fn into_config(self) -> Result<(NodeConfig, String, bool), naka_core::error::ConfigError> {
        let mut config = NodeConfig::load(self.config.as_deref())?;
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(bind) = self.http_bind {
            config.http_bind = bind;
        }
        if let Some(port) = self.http_port {
            config.http_port = port;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        Ok((config, self.log_format, self.once))
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let (config, log_format, once) = match args.into_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            process::exit(2);
        }
    };

    init_logging(&config.log_level, &log_format);

    info!("naka-node v{}", env!("CARGO_PKG_VERSION"));
    info!("data_dir: {:?}", config.data_dir);
    info!("http_addr: {}", config.http_addr());
    info!(
        networks = config.enabled_networks().count(),
        refresh_interval_secs = config.refresh_interval_secs,
        job_timeout_secs = config.job_timeout_secs,
        cycle_deadline_secs = config.cycle_deadline_secs,
        max_concurrent_jobs = config.max_concurrent_jobs,
        "schedule"
    );

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        error!("failed to create data_dir: {}", e);
        process::exit(1);
    }

    let node = match Node::new(config.clone()) {
        Ok(n) => n,
        Err(e) => {
            error!("failed to start node: {}", e);
            process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if once {
        let report = node.refresh(shutdown_rx).await;
        let rows: Vec<CoefficientRow> = node.registry().iter().map(CoefficientRow::from).collect();
        match serde_json::to_string_pretty(&serde_json::json!({ "coefficients": rows })) {
            Ok(out) => println!("{out}"),
            Err(e) => error!("failed to render coefficients: {e}"),
        }
        if !report.failures.is_empty() {
            process::exit(1);
        }
        return;
    }

    let listener = match tokio::net::TcpListener::bind(config.http_addr()).await {
        Ok(l) => l,
        Err(e) => {
            error!("failed to bind {}: {}", config.http_addr(), e);
            process::exit(1);
        }
    };
    info!("HTTP server listening on {}", config.http_addr());

    let mut server_shutdown = shutdown_rx.clone();
    let app = router(node.clone());
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.wait_for(|stop| *stop).await;
            })
            .await
    });
    let refresher = tokio::spawn(node.clone().run(shutdown_rx));

    info!("naka-node running (Ctrl+C to stop)");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for Ctrl+C: {e}");
    }
    info!("received Ctrl+C, shutting down...");
    let _ = shutdown_tx.send(true);

    match server.await {
        Ok(Ok(())) => info!("HTTP server stopped"),
        Ok(Err(e)) => warn!("HTTP server error: {e}"),
        Err(e) => warn!("HTTP server task failed: {e}"),
    }
    if let Err(e) = refresher.await {
        warn!("refresh loop task failed: {e}");
    }
    info!("naka-node shutdown complete");
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
