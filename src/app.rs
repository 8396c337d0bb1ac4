//! Composition root: parses flags, loads settings, wires up the
//! provider, and runs the HTTP server until shutdown.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::config::Settings;
use crate::exit_codes::{exit_code_for_config_error, exit_code_for_provider_error, EXIT_IO};
use crate::http;
use crate::provider::Provider;

pub async fn run() -> ExitCode {
    init_logging();

    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings
            .with_addr_override(cli.addr)
            .with_data_dir_override(cli.data_dir),
        Err(err) => {
            tracing::error!(error = %err, "failed to load configuration");
            return exit_code_for_config_error(&err);
        }
    };

    if let Err(err) = settings.ensure_data_dir() {
        tracing::error!(error = %err, "failed to prepare data directory");
        return exit_code_for_config_error(&err);
    }

    let root_key = match settings.resolve_root_key() {
        Ok(key) => key,
        Err(err) => {
            tracing::error!(error = %err, "failed to resolve root key");
            return exit_code_for_config_error(&err);
        }
    };

    let provider = match Provider::open(&settings.data_dir, &root_key, "local") {
        Ok(provider) => Arc::new(provider),
        Err(err) => {
            tracing::error!(error = %err, "failed to initialize provider");
            return exit_code_for_provider_error(&err);
        }
    };
    // RootWrapper::new has copied what it needs into its AES-GCM key
    // schedule; zero this plaintext copy now rather than waiting for
    // function return.
    drop(root_key);

    let router = http::build_router(provider.clone());

    let listener = match tokio::net::TcpListener::bind(&settings.addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, addr = %settings.addr, "failed to bind address");
            return ExitCode::from(EXIT_IO);
        }
    };

    tracing::info!(addr = %settings.addr, "kmsd listening");

    let serve_result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    provider.close();

    match serve_result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "server exited with an error");
            ExitCode::from(EXIT_IO)
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
