// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the NextDNS webhook provider.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

use std::time::Duration;

// ============================================================================
// Remote API Constants
// ============================================================================

/// Default NextDNS API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.nextdns.io";

/// Header carrying the static API credential
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Default per-request timeout toward the remote API
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Record Constants
// ============================================================================

/// Per-record annotation that authorizes overwriting an existing rewrite.
pub const OVERWRITE_ANNOTATION_KEY: &str =
    "external-dns.alpha.kubernetes.io/nextdns-allow-overwrite";

/// Prefix external-dns adds to provider-specific properties forwarded to webhooks
pub const WEBHOOK_PROPERTY_PREFIX: &str = "webhook/";

/// Literal that authorizes an overwrite (compared case-insensitively)
pub const OVERWRITE_ALLOWED_VALUE: &str = "true";

/// Record kinds managed when `SUPPORTED_RECORDS` is not set (comma-separated)
pub const DEFAULT_SUPPORTED_RECORDS: &str = "A,AAAA,CNAME";

// ============================================================================
// Retry Constants
// ============================================================================

/// Delays between consecutive attempts (1s, 2s, 4s): 4 attempts in total
pub const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// Status codes that indicate a transient remote failure
pub const RETRYABLE_STATUS_CODES: &[u16] = &[429, 500, 502, 503, 504];

/// Status codes that indicate a permanent remote failure
pub const TERMINAL_STATUS_CODES: &[u16] = &[400, 401, 403, 404];

/// Message fragments (lowercase) that identify transient network failures
pub const TRANSIENT_ERROR_PATTERNS: &[&str] = &[
    "connection refused",
    "connection reset",
    "no such host",
    "dns error",
    "failed to lookup address",
    "temporary failure",
    "timeout",
    "timed out",
    "eof",
    "broken pipe",
    "too many requests",
    "internal server error",
    "bad gateway",
    "service unavailable",
    "gateway timeout",
];

// ============================================================================
// Server Constants
// ============================================================================

/// Media type negotiated with external-dns
pub const WEBHOOK_MEDIA_TYPE: &str = "application/external.dns.webhook+json;version=1";

/// Default bind address of the webhook API
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default webhook API port
pub const DEFAULT_SERVER_PORT: u16 = 8888;

/// Default health/metrics port
pub const DEFAULT_HEALTH_PORT: u16 = 8080;

/// Grace period for in-flight requests on shutdown
pub const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 30;
