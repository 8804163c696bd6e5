// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic for NextDNS rewrites.
//!
//! This module contains everything between the control-plane surface and the
//! remote rewrite store.
//!
//! # Reconciliation Architecture
//!
//! 1. **Filter** - Narrow candidate records to supported kinds and allowed domains
//! 2. **Diff** - external-dns supplies the create/update/delete change set
//! 3. **Apply** - Create and delete rewrites, enforcing the overwrite policy
//! 4. **Retry** - Every remote call is retried on transient failure
//!
//! # Available Components
//!
//! - [`RecordSynchronizer`] - Applies change sets and reads current state
//! - [`CandidateFilter`] - Filters proposed records by kind and domain
//! - [`overwrite_allowed`] - Per-record overwrite authorization
//! - [`RetryPolicy`] - Bounded exponential backoff with cancellation
//!
//! # Example: Applying a Change Set
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use nextdns_webhook::reconcilers::RecordSynchronizer;
//! use nextdns_webhook::records::{ChangeSet, DesiredRecord, RecordKind};
//! use nextdns_webhook::rewrites::{InMemoryRewriteStore, RewriteClient};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = RewriteClient::new(Arc::new(InMemoryRewriteStore::new()));
//! let sync = RecordSynchronizer::new(client, [RecordKind::A, RecordKind::Aaaa, RecordKind::Cname]);
//!
//! let changes = ChangeSet {
//!     to_create: vec![DesiredRecord::new("app.example.com", RecordKind::A, ["10.0.0.1"])],
//!     ..ChangeSet::default()
//! };
//! let report = sync.apply_change_set(&CancellationToken::new(), &changes, false).await?;
//! assert_eq!(report.mutations(), 1);
//! # Ok(())
//! # }
//! ```

pub mod filter;
pub mod overwrite;
pub mod retry;
pub mod synchronizer;

pub use filter::{domain_matches, CandidateFilter};
pub use overwrite::{overwrite_allowed, OverwriteDecision};
pub use retry::RetryPolicy;
pub use synchronizer::RecordSynchronizer;
