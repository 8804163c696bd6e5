// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP error mapping for the webhook API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::errors::{RewriteApiError, SyncError};

/// Errors returned by webhook handlers.
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("failed to fetch records: {0}")]
    Records(#[from] RewriteApiError),

    #[error("failed to apply changes: {0}")]
    Sync(#[from] SyncError),

    #[error("invalid request body: {0}")]
    BadRequest(String),

    #[error("failed to encode response: {0}")]
    Encode(String),
}

impl WebhookError {
    /// HTTP status this error is answered with.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Sync(SyncError::Precondition(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Records(_) | Self::Sync(_) | Self::Encode(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        match &self {
            Self::Sync(err) if err.requires_operator_attention() => {
                error!(
                    status = %status,
                    error = %message,
                    "Webhook request failed; a record needs manual reconciliation"
                );
            }
            _ => error!(status = %status, error = %message, "Webhook request failed"),
        }

        (status, message).into_response()
    }
}
