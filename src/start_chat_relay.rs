//! Startup helpers for the chat relay server.

use std::process::ExitCode;
use std::sync::Arc;

use crate::config::RelayConfig;
use crate::server::{self, AppState};

/// Run the server until Ctrl+C.
///
/// Configuration is loaded before anything else; a missing API key aborts
/// startup without binding a listener.
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    init_tracing();

    tracing::info!("Starting chat relay v{}", env!("CARGO_PKG_VERSION"));

    let (config, state) = match initialize() {
        Ok(ready) => ready,
        Err(e) => {
            tracing::error!("Startup failed: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(server::run_server_with_shutdown(
        state,
        config.port,
        shutdown_signal(),
    )) {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    tracing::info!("Chat relay stopped");
    ExitCode::SUCCESS
}

/// Install the global tracing subscriber. `RUST_LOG` refines the `info` default.
///
/// Call once per process; a second call panics.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();
}

/// Load `.env` and the environment, then build application state.
///
/// # Errors
/// Returns an error if configuration is missing or invalid, or if the
/// upstream client cannot be created.
pub fn initialize() -> Result<(RelayConfig, Arc<AppState>), Box<dyn std::error::Error + Send + Sync>> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(format!("Failed to read .env file: {e}").into());
        }
    }

    let config = RelayConfig::from_env()?;
    let state = build_state(&config)?;
    Ok((config, state))
}

/// Build application state from an already-loaded configuration.
///
/// # Errors
/// Returns an error if the upstream client cannot be created.
pub fn build_state(config: &RelayConfig) -> Result<Arc<AppState>, Box<dyn std::error::Error + Send + Sync>> {
    tracing::info!(
        endpoint = %config.upstream.base_url,
        model = %config.upstream.model,
        timeout_secs = config.upstream.timeout.as_secs(),
        max_conversations = ?config.max_conversations,
        "Upstream configured"
    );

    AppState::from_config(config).map_err(|e| format!("Failed to create state: {e}").into())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
