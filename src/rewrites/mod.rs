// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! NextDNS rewrite management.
//!
//! This module is the narrow interface between the synchronizer and the remote
//! rewrite store. It handles:
//!
//! - Listing every rewrite of the configured profile
//! - Creating one rewrite per target (NextDNS infers the record type itself)
//! - Deleting rewrites by id (there is no update primitive)
//! - Looking up the first rewrite matching `(name, kind)`
//!
//! # Architecture
//!
//! [`RewriteStore`] is the raw remote surface without retries, implemented by
//! [`NextDnsApi`] over HTTP and by [`InMemoryRewriteStore`] for tests and local
//! runs. [`RewriteClient`] wraps a store: every call goes through the
//! [`RetryPolicy`] and is bounded by the caller's [`CancellationToken`].
//!
//! # Example
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
//! let rewrites = client.list_all(&CancellationToken::new()).await?;
//! println!("{} rewrites", rewrites.len());
//! # Ok(())
//! # }
//! ```

pub mod http;
pub mod memory;
pub mod types;

pub use http::NextDnsApi;
pub use memory::{InMemoryRewriteStore, StoreCall, StoreOperation};

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::RewriteApiError;
use crate::reconcilers::retry::RetryPolicy;
use crate::records::{RecordKind, RemoteRecord};

/// Raw access to the remote rewrite store, one request per call.
#[async_trait]
pub trait RewriteStore: Send + Sync {
    /// Every rewrite of the profile. No pagination: the API returns the full set.
    async fn list(&self) -> Result<Vec<RemoteRecord>, RewriteApiError>;

    /// Create one rewrite and return its id. The record type is inferred by the
    /// store from the shape of `content`.
    async fn create(&self, name: &str, content: &str) -> Result<String, RewriteApiError>;

    /// Delete one rewrite by id. A missing id surfaces as the store's 404.
    async fn delete(&self, id: &str) -> Result<(), RewriteApiError>;
}

/// Race a single remote call against the cancellation signal.
async fn cancellable<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T, RewriteApiError>>,
) -> Result<T, RewriteApiError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(RewriteApiError::Cancelled),
        result = call => result,
    }
}

/// Retry-wrapped adapter over a [`RewriteStore`].
#[derive(Clone)]
pub struct RewriteClient {
    store: Arc<dyn RewriteStore>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for RewriteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewriteClient")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RewriteClient {
    /// Create a client using the default 1s/2s/4s retry schedule.
    #[must_use]
    pub fn new(store: Arc<dyn RewriteStore>) -> Self {
        Self {
            store,
            policy: RetryPolicy::default(),
        }
    }

    /// Replace the retry schedule.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetch every rewrite of the profile.
    ///
    /// # Errors
    ///
    /// Returns the last API error once retries are exhausted, a terminal error
    /// immediately, or [`RewriteApiError::Cancelled`].
    pub async fn list_all(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteRecord>, RewriteApiError> {
        debug!("Listing DNS rewrites");

        let rewrites = self
            .policy
            .run(cancel, "ListRewrites", || {
                cancellable(cancel, self.store.list())
            })
            .await?;

        debug!(count = rewrites.len(), "Successfully listed DNS rewrites");
        Ok(rewrites)
    }

    /// Create one rewrite for `name` pointing at `target`.
    ///
    /// `kind` is informational: the store infers the type from `target`, so the
    /// created row may not carry `kind`.
    ///
    /// # Errors
    ///
    /// See [`RewriteClient::list_all`].
    pub async fn create(
        &self,
        cancel: &CancellationToken,
        name: &str,
        kind: &RecordKind,
        target: &str,
    ) -> Result<String, RewriteApiError> {
        debug!(name = %name, record_type = %kind, content = %target, "Creating DNS rewrite");

        let id = self
            .policy
            .run(cancel, "CreateRewrite", || {
                cancellable(cancel, self.store.create(name, target))
            })
            .await?;

        info!(
            id = %id,
            name = %name,
            record_type = %kind,
            content = %target,
            "Successfully created DNS rewrite"
        );
        Ok(id)
    }

    /// Delete one rewrite by id.
    ///
    /// A missing id is not special-cased here; callers decide whether a 404 means
    /// success.
    ///
    /// # Errors
    ///
    /// See [`RewriteClient::list_all`].
    pub async fn delete(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> Result<(), RewriteApiError> {
        debug!(id = %id, "Deleting DNS rewrite");

        self.policy
            .run(cancel, "DeleteRewrite", || {
                cancellable(cancel, self.store.delete(id))
            })
            .await?;

        info!(id = %id, "Successfully deleted DNS rewrite");
        Ok(())
    }

    /// First rewrite whose name and kind match, found by a linear scan of
    /// [`RewriteClient::list_all`].
    ///
    /// If several rewrites share `(name, kind)` only the first is returned.
    ///
    /// # Errors
    ///
    /// Propagates the error of the underlying list call.
    pub async fn find_by_name_and_kind(
        &self,
        cancel: &CancellationToken,
        name: &str,
        kind: &RecordKind,
    ) -> Result<Option<RemoteRecord>, RewriteApiError> {
        let found = self
            .find_all_by_name_and_kind(cancel, name, kind)
            .await?
            .into_iter()
            .next();

        match &found {
            Some(rewrite) => debug!(
                id = %rewrite.id,
                name = %rewrite.name,
                record_type = %rewrite.kind,
                content = %rewrite.target,
                "Found matching DNS rewrite"
            ),
            None => debug!(name = %name, record_type = %kind, "No matching DNS rewrite found"),
        }

        Ok(found)
    }

    /// Every rewrite whose name and kind match, in list order, from a single
    /// [`RewriteClient::list_all`].
    ///
    /// # Errors
    ///
    /// Propagates the error of the underlying list call.
    pub async fn find_all_by_name_and_kind(
        &self,
        cancel: &CancellationToken,
        name: &str,
        kind: &RecordKind,
    ) -> Result<Vec<RemoteRecord>, RewriteApiError> {
        debug!(name = %name, record_type = %kind, "Finding DNS rewrites by name");

        let found: Vec<RemoteRecord> = self
            .list_all(cancel)
            .await?
            .into_iter()
            .filter(|rewrite| rewrite.name == name && rewrite.kind == *kind)
            .collect();

        debug!(
            name = %name,
            record_type = %kind,
            count = found.len(),
            "Matching DNS rewrites found"
        );
        Ok(found)
    }

    /// Verify the API is reachable and the credential accepted.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying list call.
    pub async fn test_connection(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(), RewriteApiError> {
        debug!("Testing connection to NextDNS API");
        self.list_all(cancel).await?;
        info!("Successfully connected to NextDNS API");
        Ok(())
    }
}
