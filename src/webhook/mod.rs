// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP surface spoken to external-dns.
//!
//! Two routers are exposed:
//!
//! - [`api_router`] - the external-dns webhook protocol (`/`, `/records`,
//!   `/adjustendpoints`), bound to the loopback interface next to external-dns
//! - [`health_router`] - liveness, readiness and Prometheus metrics
//!
//! Every request works on a child of the process-wide shutdown token, so a
//! shutdown interrupts retries that are still waiting.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{CONTENT_TYPE, VARY};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::constants::WEBHOOK_MEDIA_TYPE;
use crate::metrics;
use crate::provider::Provider;
use crate::records::{ChangeSet, DesiredRecord};

pub mod errors;
pub mod types;

pub use errors::WebhookError;
pub use types::{Changes, DomainFilter, Endpoint, ProviderSpecificProperty};

/// Shared state of the webhook handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub provider: Arc<Provider>,
    pub shutdown: CancellationToken,
}

/// Router implementing the external-dns webhook protocol.
pub fn api_router(provider: Arc<Provider>, shutdown: CancellationToken) -> Router {
    Router::new()
        .route("/", get(negotiate))
        .route("/records", get(get_records).post(apply_changes))
        .route("/adjustendpoints", post(adjust_endpoints))
        .with_state(AppState { provider, shutdown })
}

/// Router for `/healthz`, `/readyz` and `/metrics`.
pub fn health_router() -> Router {
    Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/readyz", get(|| async { "Ready" }))
        .route("/metrics", get(metrics_handler))
}

/// Serve `router` on `listener` until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(address) = listener.local_addr() {
        info!(address = %address, "HTTP server listening");
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

fn webhook_json<T: Serialize>(value: &T) -> Result<Response, WebhookError> {
    let body = serde_json::to_vec(value).map_err(|e| WebhookError::Encode(e.to_string()))?;
    Ok((
        [(CONTENT_TYPE, WEBHOOK_MEDIA_TYPE), (VARY, "Content-Type")],
        body,
    )
        .into_response())
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, WebhookError> {
    serde_json::from_slice(body).map_err(|e| WebhookError::BadRequest(e.to_string()))
}

async fn negotiate(State(state): State<AppState>) -> Result<Response, WebhookError> {
    let filter = DomainFilter {
        include: state.provider.domain_filter().to_vec(),
    };
    debug!(include = ?filter.include, "Domain filter negotiated");
    webhook_json(&filter)
}

async fn get_records(State(state): State<AppState>) -> Result<Response, WebhookError> {
    let cancel = state.shutdown.child_token();
    let records = state.provider.records(&cancel).await?;

    let endpoints: Vec<Endpoint> = records.into_iter().map(Endpoint::from).collect();
    webhook_json(&endpoints)
}

async fn apply_changes(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    let changes: Changes = parse_body(&body)?;
    let change_set = ChangeSet::try_from(changes)?;

    if change_set.is_empty() {
        debug!("Empty change set received");
    }

    let cancel = state.shutdown.child_token();
    state.provider.apply_changes(&cancel, &change_set).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn adjust_endpoints(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, WebhookError> {
    let endpoints: Vec<Endpoint> = parse_body(&body)?;
    let received = endpoints.len();

    let kept: Vec<Endpoint> = state
        .provider
        .adjust_endpoints(endpoints.into_iter().map(DesiredRecord::from).collect())
        .into_iter()
        .map(Endpoint::from)
        .collect();

    debug!(received, kept = kept.len(), "Endpoints adjusted");
    webhook_json(&kept)
}

async fn metrics_handler() -> Result<Response, WebhookError> {
    let text = metrics::gather_metrics().map_err(|e| WebhookError::Encode(e.to_string()))?;
    Ok((
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        text,
    )
        .into_response())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
