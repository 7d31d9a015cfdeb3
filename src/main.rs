use std::sync::Arc;

use clap::Parser;
use completion_relay::config::{Cli, Config};
use completion_relay::server::relay::{build_router, AppState};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "completion_relay=debug,tower_http=debug"
    } else {
        "completion_relay=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("completion-relay v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration. The CLI listen address wins over the file.
    let mut config = Config::load(&cli.config)?;
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    let config = Arc::new(config);

    info!(
        upstream = %config.upstream.url,
        token_delay_ms = config.stream.token_delay_ms,
        request_timeout_secs = config.upstream.request_timeout_secs,
        "Configuration loaded"
    );

    // Build application state and the HTTP router.
    let state = Arc::new(AppState::new(config.clone())?);
    let app = build_router(state);

    // Start the server.
    let listen_addr = config.server.listen.clone();
    info!(addr = %listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
