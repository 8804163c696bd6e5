// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use clap::Parser;
use nextdns_webhook::{
    constants::SHUTDOWN_GRACE_PERIOD_SECS,
    provider::Provider,
    rewrites::{NextDnsApi, RewriteClient},
    settings::{LogFormat, Settings},
    webhook::{self, api_router, health_router},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    // Configuration errors are fatal before anything else starts
    let settings = Settings::parse().validate()?;

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("nextdns-webhook")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(settings))
}

/// Initialize logging.
///
/// Format: timestamp file:line LEVEL message
/// Example: 2025-11-29T23:45:00.123456Z main.rs:49 INFO Starting NextDNS webhook provider
///
/// `RUST_LOG` wins if set, otherwise `LOG_LEVEL` is used.
fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level));

    match settings.log_format() {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(settings: Settings) -> Result<()> {
    init_tracing(&settings);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting NextDNS webhook provider");
    debug!(settings = ?settings, "Configuration loaded");

    let api = NextDnsApi::new(
        &settings.api_key,
        &settings.profile_id,
        &settings.base_url,
        settings.request_timeout(),
    )?;
    let client = RewriteClient::new(Arc::new(api));
    let shutdown = CancellationToken::new();

    if settings.dry_run {
        info!("Dry-run mode enabled, no changes will be written to NextDNS");
    } else if let Err(e) = client.test_connection(&shutdown).await {
        // The API may come back later; every request retries on its own
        warn!(error = %e, "Failed to connect to NextDNS API");
    }

    let provider = Arc::new(Provider::new(&settings, client));

    let api_listener = TcpListener::bind(settings.server_address())
        .await
        .with_context(|| format!("failed to bind webhook server on {}", settings.server_address()))?;
    let health_listener = TcpListener::bind(settings.health_address())
        .await
        .with_context(|| format!("failed to bind health server on {}", settings.health_address()))?;

    let api_task = tokio::spawn(run_server(
        "webhook",
        api_listener,
        api_router(provider, shutdown.clone()),
        shutdown.clone(),
    ));
    let health_task = tokio::spawn(run_server(
        "health",
        health_listener,
        health_router(),
        shutdown.clone(),
    ));
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    shutdown.cancelled().await;
    info!("Stopping HTTP servers...");

    let grace = Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS);
    let (api_result, health_result) =
        tokio::time::timeout(grace, async { tokio::join!(api_task, health_task) })
            .await
            .context("HTTP servers did not stop within the shutdown grace period")?;

    api_result?.context("webhook server failed")?;
    health_result?.context("health server failed")?;

    info!("Shutdown complete");
    Ok(())
}

/// Serve one router; its exit, clean or not, brings the whole process down.
async fn run_server(
    name: &'static str,
    listener: TcpListener,
    router: axum::Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let result = webhook::serve(listener, router, shutdown.clone()).await;

    if let Err(e) = &result {
        error!(server = name, error = %e, "CRITICAL: HTTP server exited unexpectedly");
    } else if !shutdown.is_cancelled() {
        error!(server = name, "CRITICAL: HTTP server exited unexpectedly without error");
    }

    shutdown.cancel();
    result
}

/// Cancel `shutdown` on SIGINT or SIGTERM.
async fn cancel_on_signal(shutdown: CancellationToken) {
    let sigterm = async {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        }
        #[cfg(not(unix))]
        std::future::pending::<()>().await;
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
        }
        () = sigterm => {
            info!("Received SIGTERM (pod termination), initiating graceful shutdown...");
        }
        () = shutdown.cancelled() => return,
    }

    shutdown.cancel();
}
