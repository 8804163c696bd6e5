// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Control-plane facade.
//!
//! [`Provider`] is what the webhook handlers call: it wires the configured
//! [`Settings`] into the [`RecordSynchronizer`] and [`CandidateFilter`] and
//! records change set metrics.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::errors::{RewriteApiError, SyncError};
use crate::metrics;
use crate::reconcilers::{CandidateFilter, RecordSynchronizer};
use crate::records::{ChangeSet, ChangeSetReport, DesiredRecord};
use crate::rewrites::RewriteClient;
use crate::settings::Settings;

/// NextDNS provider for one profile.
#[derive(Debug, Clone)]
pub struct Provider {
    synchronizer: RecordSynchronizer,
    filter: CandidateFilter,
    dry_run: bool,
}

impl Provider {
    /// Build a provider from validated settings and a rewrite client.
    #[must_use]
    pub fn new(settings: &Settings, client: RewriteClient) -> Self {
        let supported = settings.supported_kinds();
        let provider = Self {
            synchronizer: RecordSynchronizer::new(client, supported.clone()),
            filter: CandidateFilter::new(supported, settings.domain_filter.clone()),
            dry_run: settings.dry_run,
        };

        info!(
            profile_id = %settings.profile_id,
            base_url = %settings.base_url,
            dry_run = settings.dry_run,
            supported_records = ?settings.supported_records,
            domain_filter = ?settings.domain_filter,
            "NextDNS provider initialized"
        );

        provider
    }

    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Current remote state, one record per rewrite.
    ///
    /// # Errors
    ///
    /// Returns the remote error once retries are exhausted.
    pub async fn records(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<DesiredRecord>, RewriteApiError> {
        let records = self.synchronizer.fetch_all(cancel).await?;
        info!(count = records.len(), "Records fetched from NextDNS");
        Ok(records)
    }

    /// Apply a change set, or preview it in dry-run mode.
    ///
    /// # Errors
    ///
    /// Returns the first synchronization failure; see
    /// [`RecordSynchronizer::apply_change_set`].
    pub async fn apply_changes(
        &self,
        cancel: &CancellationToken,
        changes: &ChangeSet,
    ) -> Result<ChangeSetReport, SyncError> {
        info!(
            create = changes.to_create.len(),
            update = changes.to_update.len(),
            delete = changes.to_delete.len(),
            dry_run = self.dry_run,
            "Applying changes to NextDNS"
        );

        let start = Instant::now();
        let result = self
            .synchronizer
            .apply_change_set(cancel, changes, self.dry_run)
            .await;

        match &result {
            Ok(report) if report.dry_run => {
                metrics::record_changeset("dry_run", start.elapsed());
            }
            Ok(report) => {
                metrics::record_changeset("success", start.elapsed());
                info!(
                    mutations = report.mutations(),
                    skipped = report.skips(),
                    "Successfully applied changes to NextDNS"
                );
            }
            Err(err) => {
                metrics::record_changeset("error", start.elapsed());
                error!(
                    error = %err,
                    requires_operator_attention = err.requires_operator_attention(),
                    "Failed to apply changes to NextDNS"
                );
            }
        }

        result
    }

    /// Keep the candidates this provider manages, in input order.
    #[must_use]
    pub fn adjust_endpoints(&self, candidates: Vec<DesiredRecord>) -> Vec<DesiredRecord> {
        self.filter.filter(candidates)
    }

    /// Configured domain allow-list; empty means every domain.
    #[must_use]
    pub fn domain_filter(&self) -> &[String] {
        self.filter.allow_list()
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod provider_tests;
