// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! NextDNS HTTP API operations.
//!
//! This module contains the raw rewrite calls against `api.nextdns.io`. Retries are
//! not applied here; [`super::RewriteClient`] wraps these calls with the retry policy.

use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use super::types::{
    CreateRewriteRequest, CreatedRewrite, DataEnvelope, ErrorEnvelope, RewriteRow,
};
use super::RewriteStore;
use crate::constants::API_KEY_HEADER;
use crate::errors::{ConfigError, RewriteApiError};
use crate::records::RemoteRecord;

/// Build the API base URL from a configured endpoint.
///
/// Converts "api.nextdns.io" or "https://api.nextdns.io/" to `<https://api.nextdns.io>`.
pub(crate) fn build_api_url(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Flatten an error and its sources into one message, so that transport causes
/// such as "connection reset" stay visible to classification.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Map a reqwest failure onto the classified error type.
fn map_transport_error(url: &str, err: &reqwest::Error) -> RewriteApiError {
    if err.is_timeout() {
        RewriteApiError::Timeout {
            url: url.to_string(),
        }
    } else if err.is_connect() {
        RewriteApiError::Connection {
            url: url.to_string(),
            reason: error_chain(err),
        }
    } else if err.is_decode() {
        RewriteApiError::Decode(error_chain(err))
    } else {
        RewriteApiError::Transport(error_chain(err))
    }
}

/// Client for the rewrites endpoints of one NextDNS profile.
#[derive(Debug, Clone)]
pub struct NextDnsApi {
    http: HttpClient,
    base_url: String,
    profile_id: String,
    api_key: String,
}

impl NextDnsApi {
    /// Create an API client.
    ///
    /// # Arguments
    /// * `api_key` - NextDNS API key, sent as `X-Api-Key`
    /// * `profile_id` - Profile whose rewrites are managed
    /// * `base_url` - API endpoint, normally `https://api.nextdns.io`
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the key or profile is empty or the HTTP client cannot be built.
    pub fn new(
        api_key: &str,
        profile_id: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if profile_id.trim().is_empty() {
            return Err(ConfigError::MissingProfileId);
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let api = Self {
            http,
            base_url: build_api_url(base_url),
            profile_id: profile_id.to_string(),
            api_key: api_key.to_string(),
        };

        debug!(
            profile_id = %api.profile_id,
            base_url = %api.base_url,
            "NextDNS client created successfully"
        );

        Ok(api)
    }

    /// URL of the rewrites collection of the configured profile.
    #[must_use]
    pub fn rewrites_url(&self) -> String {
        format!("{}/profiles/{}/rewrites", self.base_url, self.profile_id)
    }

    /// Send a request and turn non-2xx answers into [`RewriteApiError::Status`].
    async fn send(
        &self,
        request: RequestBuilder,
        method: &str,
        url: &str,
    ) -> Result<Response, RewriteApiError> {
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| map_transport_error(url, &e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .and_then(|envelope| envelope.summary())
            .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            });

        error!(
            method = %method,
            url = %url,
            status = %status,
            error = %message,
            "NextDNS API request failed"
        );

        Err(RewriteApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    /// Read the body of a successful response and decode its `data` payload.
    async fn read_data<T: DeserializeOwned>(
        url: &str,
        response: Response,
    ) -> Result<T, RewriteApiError> {
        let text = response
            .text()
            .await
            .map_err(|e| map_transport_error(url, &e))?;

        serde_json::from_str::<DataEnvelope<T>>(&text)
            .map(|envelope| envelope.data)
            .map_err(|e| RewriteApiError::Decode(format!("{e} (body: {text})")))
    }
}

#[async_trait]
impl RewriteStore for NextDnsApi {
    async fn list(&self) -> Result<Vec<RemoteRecord>, RewriteApiError> {
        let url = self.rewrites_url();
        let response = self.send(self.http.get(&url), "GET", &url).await?;
        let rows: Vec<RewriteRow> = Self::read_data(&url, response).await?;

        Ok(rows.into_iter().map(RemoteRecord::from).collect())
    }

    async fn create(&self, name: &str, content: &str) -> Result<String, RewriteApiError> {
        let url = self.rewrites_url();
        let body = CreateRewriteRequest { name, content };
        let response = self
            .send(self.http.post(&url).json(&body), "POST", &url)
            .await?;
        let created: CreatedRewrite = Self::read_data(&url, response).await?;

        Ok(created.id)
    }

    async fn delete(&self, id: &str) -> Result<(), RewriteApiError> {
        let url = format!("{}/{id}", self.rewrites_url());
        self.send(self.http.delete(&url), "DELETE", &url).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod http_tests;
