// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # nextdns-webhook - external-dns provider for NextDNS rewrites
//!
//! An external-dns webhook provider that keeps the DNS rewrites of a NextDNS
//! profile in line with the records external-dns wants to exist.
//!
//! ## Overview
//!
//! - Reads the rewrite list of one profile and reports it as DNS endpoints
//! - Applies create/update/delete change sets with bounded retries
//! - Refuses to overwrite an existing rewrite unless the record opts in
//! - Filters candidate records by supported kind and domain suffix
//! - Supports a dry-run mode that only previews changes
//!
//! ## Modules
//!
//! - [`settings`] - Environment and CLI configuration
//! - [`records`] - Record model, change sets and kind inference
//! - [`rewrites`] - NextDNS rewrite API adapter
//! - [`reconcilers`] - Retry, overwrite policy, filtering and synchronization
//! - [`provider`] - Facade used by the HTTP handlers
//! - [`webhook`] - external-dns webhook protocol and health server
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use nextdns_webhook::rewrites::{NextDnsApi, RewriteClient};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let api = NextDnsApi::new("api-key", "abc123", "https://api.nextdns.io", Duration::from_secs(30))?;
//! let client = RewriteClient::new(Arc::new(api));
//!
//! for record in client.list_all(&CancellationToken::new()).await? {
//!     println!("{} {} -> {}", record.name, record.kind, record.target);
//! }
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod errors;
pub mod metrics;
pub mod provider;
pub mod reconcilers;
pub mod records;
pub mod rewrites;
pub mod settings;
pub mod webhook;
