// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Runtime configuration.
//!
//! Every setting is read from the environment and may be overridden by a command
//! line flag of the same name (`NEXTDNS_PROFILE_ID` / `--profile-id`).
//! [`Settings::validate`] normalizes the raw values and rejects configurations
//! the provider cannot run with.

use std::fmt;
use std::time::Duration;

use clap::Parser;

use crate::constants::{
    DEFAULT_BASE_URL, DEFAULT_HEALTH_PORT, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SERVER_HOST,
    DEFAULT_SERVER_PORT, DEFAULT_SUPPORTED_RECORDS,
};
use crate::errors::ConfigError;
use crate::records::RecordKind;
use crate::rewrites::http::build_api_url;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Provider settings.
#[derive(Parser, Clone, PartialEq, Eq)]
#[command(
    name = "nextdns-webhook",
    version,
    about = "external-dns webhook provider for NextDNS rewrites"
)]
pub struct Settings {
    /// NextDNS API key
    #[arg(long, env = "NEXTDNS_API_KEY", default_value = "", hide_env_values = true)]
    pub api_key: String,

    /// NextDNS profile whose rewrites are managed
    #[arg(long, env = "NEXTDNS_PROFILE_ID", default_value = "")]
    pub profile_id: String,

    /// NextDNS API endpoint
    #[arg(long, env = "NEXTDNS_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Address the webhook API binds to
    #[arg(long, env = "SERVER_HOST", default_value = DEFAULT_SERVER_HOST)]
    pub server_host: String,

    /// Port of the webhook API
    #[arg(long, env = "SERVER_PORT", default_value_t = DEFAULT_SERVER_PORT)]
    pub server_port: u16,

    /// Port of the health and metrics server
    #[arg(long, env = "HEALTH_PORT", default_value_t = DEFAULT_HEALTH_PORT)]
    pub health_port: u16,

    /// Log planned changes instead of applying them
    #[arg(long, env = "DRY_RUN")]
    pub dry_run: bool,

    /// Default log filter when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format: text or json
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Record types managed by this provider
    #[arg(
        long,
        env = "SUPPORTED_RECORDS",
        value_delimiter = ',',
        default_value = DEFAULT_SUPPORTED_RECORDS
    )]
    pub supported_records: Vec<String>,

    /// Domain suffixes this provider manages; empty means all
    #[arg(long, env = "DOMAIN_FILTER", value_delimiter = ',')]
    pub domain_filter: Vec<String>,

    /// Timeout of a single request to the NextDNS API, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &"<redacted>")
            .field("profile_id", &self.profile_id)
            .field("base_url", &self.base_url)
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("health_port", &self.health_port)
            .field("dry_run", &self.dry_run)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("supported_records", &self.supported_records)
            .field("domain_filter", &self.domain_filter)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn normalize_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

impl Settings {
    /// Normalize and check the parsed values.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a required value is blank, the base URL cannot
    /// be parsed, no record type is supported, or the log format is unknown.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        self.api_key = self.api_key.trim().to_string();
        self.profile_id = self.profile_id.trim().to_string();

        if self.api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.profile_id.is_empty() {
            return Err(ConfigError::MissingProfileId);
        }

        let base_url = build_api_url(&self.base_url);
        url::Url::parse(&base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        self.base_url = base_url;

        self.supported_records = normalize_list(self.supported_records)
            .into_iter()
            .map(|kind| kind.to_ascii_uppercase())
            .collect();
        if self.supported_records.is_empty() {
            return Err(ConfigError::NoSupportedRecords);
        }

        self.domain_filter = normalize_list(self.domain_filter);
        self.log_level = self.log_level.trim().to_string();
        self.log_format = self.log_format.trim().to_ascii_lowercase();
        self.parsed_log_format()?;

        Ok(self)
    }

    fn parsed_log_format(&self) -> Result<LogFormat, ConfigError> {
        match self.log_format.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::InvalidLogFormat(other.to_string())),
        }
    }

    /// Configured log format; unknown values fall back to text.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.parsed_log_format().unwrap_or(LogFormat::Text)
    }

    /// Supported record kinds, in configuration order.
    #[must_use]
    pub fn supported_kinds(&self) -> Vec<RecordKind> {
        self.supported_records
            .iter()
            .map(|kind| RecordKind::from(kind.as_str()))
            .collect()
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `host:port` of the webhook API.
    #[must_use]
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// `host:port` of the health server; always bound on all interfaces.
    #[must_use]
    pub fn health_address(&self) -> String {
        format!("0.0.0.0:{}", self.health_port)
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod settings_tests;
