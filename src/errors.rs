// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the NextDNS webhook provider.
//!
//! This module provides specialized error types for:
//! - NextDNS rewrite API calls ([`RewriteApiError`]), carrying enough of the failure
//!   (status code, timeout, connection failure) for the retry policy to classify it
//! - Record synchronization ([`SyncError`]), wrapping API failures with the record
//!   and action that was being attempted
//! - Startup configuration ([`ConfigError`])

use thiserror::Error;

use crate::constants::{RETRYABLE_STATUS_CODES, TERMINAL_STATUS_CODES, TRANSIENT_ERROR_PATTERNS};
use crate::records::{ChangeAction, RecordKind};

/// Errors returned by the NextDNS rewrite API or the transport in front of it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewriteApiError {
    /// The API answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Error detail reported by the API (or the raw body)
        message: String,
    },

    /// The request did not complete within the configured timeout
    #[error("request to {url} timed out")]
    Timeout {
        /// URL of the request that timed out
        url: String,
    },

    /// No connection could be established (refused, reset, DNS failure)
    #[error("connection to {url} failed: {reason}")]
    Connection {
        /// URL of the request
        url: String,
        /// Underlying transport error
        reason: String,
    },

    /// Any other transport failure; classified from its message
    #[error("transport error: {0}")]
    Transport(String),

    /// The API answered 2xx with a body that could not be decoded
    #[error("invalid response from rewrite API: {0}")]
    Decode(String),

    /// The caller's cancellation signal fired
    #[error("operation cancelled")]
    Cancelled,
}

/// How the retry policy treats an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network trouble, 429 or 5xx: worth another attempt
    Transient,
    /// 400/401/403/404: retrying cannot help
    Terminal,
    /// Anything else: fail fast rather than retry an unknown condition
    Unclassified,
}

impl ErrorClass {
    /// Label used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Terminal => "terminal",
            Self::Unclassified => "unclassified",
        }
    }
}

impl RewriteApiError {
    /// HTTP status of the failure, if the API produced one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the remote store reported that the addressed row does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Classify an error for the retry policy.
///
/// Structured failures are classified directly. Transport failures that only carry
/// a message are classified by looking for well-known network failure patterns and
/// status indicators in that message.
#[must_use]
pub fn classify_error(err: &RewriteApiError) -> ErrorClass {
    match err {
        RewriteApiError::Status { status, .. } => classify_status(*status),
        RewriteApiError::Timeout { .. } | RewriteApiError::Connection { .. } => {
            ErrorClass::Transient
        }
        RewriteApiError::Transport(message) => classify_message(message),
        RewriteApiError::Decode(_) | RewriteApiError::Cancelled => ErrorClass::Unclassified,
    }
}

fn classify_status(status: u16) -> ErrorClass {
    if RETRYABLE_STATUS_CODES.contains(&status) {
        ErrorClass::Transient
    } else if TERMINAL_STATUS_CODES.contains(&status) {
        ErrorClass::Terminal
    } else {
        ErrorClass::Unclassified
    }
}

fn classify_message(message: &str) -> ErrorClass {
    let lowered = message.to_ascii_lowercase();

    if mentions_status_code(&lowered, RETRYABLE_STATUS_CODES)
        || TRANSIENT_ERROR_PATTERNS.iter().any(|p| lowered.contains(p))
    {
        return ErrorClass::Transient;
    }

    if mentions_status_code(&lowered, TERMINAL_STATUS_CODES) {
        return ErrorClass::Terminal;
    }

    ErrorClass::Unclassified
}

/// Whether one of `codes` appears as a whole word, so ids and ports such as
/// `abc500` or `:5003` are not mistaken for status codes.
fn mentions_status_code(message: &str, codes: &[u16]) -> bool {
    message
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| word.len() == 3)
        .filter_map(|word| word.parse::<u16>().ok())
        .any(|code| codes.contains(&code))
}

/// Convenience wrapper over [`classify_error`].
#[must_use]
pub fn is_retryable_error(err: &RewriteApiError) -> bool {
    classify_error(err) == ErrorClass::Transient
}

/// Errors produced by the record synchronizer.
///
/// Every variant names the record being acted on. Two variants describe a record
/// left half-applied (old value removed, new value missing); see
/// [`SyncError::requires_operator_attention`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Looking up the current rewrite for `(name, kind)` failed
    #[error("failed to check for existing record {name} ({kind}): {source}")]
    Lookup {
        name: String,
        kind: RecordKind,
        #[source]
        source: RewriteApiError,
    },

    /// Creating a rewrite failed; nothing was removed beforehand
    #[error("failed to create record {name} ({kind}) -> {target}: {source}")]
    Create {
        name: String,
        kind: RecordKind,
        target: String,
        #[source]
        source: RewriteApiError,
    },

    /// Deleting a rewrite failed
    #[error("failed to delete record {name} ({kind}) with id {id}: {source}")]
    Delete {
        name: String,
        kind: RecordKind,
        id: String,
        #[source]
        source: RewriteApiError,
    },

    /// An authorized overwrite deleted the existing row but could not recreate it
    #[error(
        "record {name} ({kind}) is in an inconsistent state: existing rewrite {old_id} \
         ({old_target}) was deleted but {new_target} could not be created: {source}"
    )]
    ReplaceIncomplete {
        name: String,
        kind: RecordKind,
        old_id: String,
        old_target: String,
        new_target: String,
        #[source]
        source: RewriteApiError,
    },

    /// The delete half of an update failed; the create half was not attempted
    #[error("failed to delete old record {name} during update: {source}")]
    UpdateDelete {
        name: String,
        #[source]
        source: Box<SyncError>,
    },

    /// The delete half of an update succeeded but the create half failed
    #[error(
        "record {name} is in an inconsistent state: old value {old_targets:?} was deleted \
         but new value {new_targets:?} was not created: {source}"
    )]
    InconsistentUpdate {
        name: String,
        old_targets: Vec<String>,
        new_targets: Vec<String>,
        #[source]
        source: Box<SyncError>,
    },

    /// First failure of a change set; remaining actions were not attempted
    #[error("failed to {action} record {name}: {source}")]
    ChangeSet {
        action: ChangeAction,
        name: String,
        #[source]
        source: Box<SyncError>,
    },

    /// The change set itself is malformed
    #[error("invalid change set: {0}")]
    Precondition(String),
}

impl SyncError {
    /// Whether a record was left with its old value gone and its new value absent.
    ///
    /// There is no automatic rollback; such records need manual reconciliation or a
    /// later successful pass.
    #[must_use]
    pub fn requires_operator_attention(&self) -> bool {
        match self {
            Self::ReplaceIncomplete { .. } | Self::InconsistentUpdate { .. } => true,
            Self::ChangeSet { source, .. } | Self::UpdateDelete { source, .. } => {
                source.requires_operator_attention()
            }
            _ => false,
        }
    }

    /// Innermost API error, if the failure came from the remote store.
    #[must_use]
    pub fn api_error(&self) -> Option<&RewriteApiError> {
        match self {
            Self::Lookup { source, .. }
            | Self::Create { source, .. }
            | Self::Delete { source, .. }
            | Self::ReplaceIncomplete { source, .. } => Some(source),
            Self::UpdateDelete { source, .. }
            | Self::InconsistentUpdate { source, .. }
            | Self::ChangeSet { source, .. } => source.api_error(),
            Self::Precondition(_) => None,
        }
    }
}

/// Configuration errors; fatal at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("NEXTDNS_API_KEY environment variable is required")]
    MissingApiKey,

    #[error("NEXTDNS_PROFILE_ID environment variable is required")]
    MissingProfileId,

    #[error("invalid NEXTDNS_BASE_URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("SUPPORTED_RECORDS must name at least one record type")]
    NoSupportedRecords,

    #[error("invalid LOG_FORMAT '{0}': expected 'text' or 'json'")]
    InvalidLogFormat(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
