use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use docdesk::config::{load_with_env, validate_config};
use docdesk::Service;
use docdesk_server::{serve, telemetry, ServerError};

/// Batch extraction service for bank statements, F.572 forms and Excel files.
#[derive(Parser, Debug)]
#[command(name = "docdesk-server", version)]
struct Cli {
    /// JSON config file; defaults apply when omitted
    #[arg(short, long, env = "DOCDESK_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address (overrides config and environment)
    #[arg(long)]
    host: Option<String>,

    /// Port (overrides config and environment)
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of extraction worker threads
    #[arg(short, long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = load_with_env(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(workers) = cli.workers {
        config.worker_count = workers;
    }
    validate_config(&config)?;

    telemetry::init(config.server.log_format);

    match dotenv {
        Ok(path) => tracing::info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Ignoring .env file: {}", e),
    }

    let addr = (config.server.host.clone(), config.server.port);
    let service = Arc::new(Service::start(Arc::new(config))?);
    let listener = TcpListener::bind(addr).await?;

    serve(listener, service, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
