// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Record synchronization against the NextDNS rewrite store.
//!
//! The synchronizer turns desired-state records into rewrite creations and
//! deletions. NextDNS has no update primitive, so:
//!
//! - an authorized overwrite of an existing row is a delete of that row followed
//!   by a create with the new target
//! - an update is a delete of the old record followed by a create of the new one
//!
//! Neither is atomic. When the delete half succeeds and the create half fails the
//! returned [`SyncError`] reports [`SyncError::requires_operator_attention`].
//!
//! Processing is sequential: records in list order, targets in list order, and
//! within a change set creates before updates before deletes. The first hard
//! error stops the change set; mutations already applied stay applied.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::overwrite;
use crate::constants::OVERWRITE_ANNOTATION_KEY;
use crate::errors::{RewriteApiError, SyncError};
use crate::metrics;
use crate::records::{
    ChangeAction, ChangeSet, ChangeSetReport, DesiredRecord, KindClassifier, PreviewLine,
    RecordKind, TargetOutcome, TargetShapeClassifier,
};
use crate::rewrites::RewriteClient;

/// Reconciliation engine between desired records and the remote rewrite store.
#[derive(Clone)]
pub struct RecordSynchronizer {
    client: RewriteClient,
    supported: HashSet<RecordKind>,
    classifier: Arc<dyn KindClassifier>,
}

impl std::fmt::Debug for RecordSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSynchronizer")
            .field("client", &self.client)
            .field("supported", &self.supported)
            .finish_non_exhaustive()
    }
}

impl RecordSynchronizer {
    /// Create a synchronizer managing the given record kinds.
    pub fn new(client: RewriteClient, supported: impl IntoIterator<Item = RecordKind>) -> Self {
        Self {
            client,
            supported: supported.into_iter().collect(),
            classifier: Arc::new(TargetShapeClassifier),
        }
    }

    /// Replace the strategy used to predict the kind NextDNS assigns to a target.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn KindClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    fn is_supported(&self, kind: &RecordKind) -> bool {
        self.supported.contains(kind)
    }

    /// Every rewrite of the profile as a single-target desired record.
    ///
    /// Rows sharing a name and kind are returned as separate records.
    ///
    /// # Errors
    ///
    /// Propagates the client error unchanged (it has already been retried).
    pub async fn fetch_all(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<DesiredRecord>, RewriteApiError> {
        let rows = self.client.list_all(cancel).await?;
        Ok(rows.iter().map(|row| row.to_desired()).collect())
    }

    /// Create one rewrite per target of `record`.
    ///
    /// Per target, the rows sharing the record's name and kind are read and:
    /// - a row already holding the target is left alone
    /// - otherwise the first colliding row is replaced (delete, then create) if
    ///   the record carries the overwrite marker, or left alone and reported as
    ///   [`TargetOutcome::OverwriteBlocked`]
    /// - with no colliding row, the target is created
    ///
    /// Rows claimed earlier in the same call and rows holding another target of
    /// the record never collide, so re-applying a record with N targets keeps
    /// exactly N rows.
    ///
    /// # Errors
    ///
    /// Returns the first lookup, delete or create failure. Targets processed
    /// before the failure stay applied.
    pub async fn apply_create(
        &self,
        cancel: &CancellationToken,
        record: &DesiredRecord,
    ) -> Result<Vec<TargetOutcome>, SyncError> {
        if !self.is_supported(&record.kind) {
            debug!(
                dns_name = %record.name,
                record_type = %record.kind,
                "Skipping create for unsupported record type"
            );
            return Ok(vec![unsupported(record)]);
        }

        info!(
            dns_name = %record.name,
            record_type = %record.kind,
            targets = ?record.targets,
            "Creating record"
        );

        let wanted: HashSet<&str> = record.targets.iter().map(String::as_str).collect();
        let mut claimed: HashSet<String> = HashSet::new();
        let mut outcomes = Vec::with_capacity(record.targets.len());

        for target in &record.targets {
            self.warn_on_kind_mismatch(record, target);

            let rows = self
                .client
                .find_all_by_name_and_kind(cancel, &record.name, &record.kind)
                .await
                .map_err(|source| SyncError::Lookup {
                    name: record.name.clone(),
                    kind: record.kind.clone(),
                    source,
                })?;

            let existing = match rows.iter().position(|row| row.target == *target) {
                Some(holding) => Some(rows[holding].clone()),
                None => rows.into_iter().find(|row| {
                    !claimed.contains(&row.id) && !wanted.contains(row.target.as_str())
                }),
            };

            let outcome = match existing {
                None => {
                    let id = self.create_target(cancel, record, target).await?;
                    TargetOutcome::Created {
                        name: record.name.clone(),
                        kind: record.kind.clone(),
                        target: target.clone(),
                        id,
                    }
                }
                Some(row) if row.target == *target => {
                    debug!(
                        id = %row.id,
                        dns_name = %record.name,
                        record_type = %record.kind,
                        target = %target,
                        "Record already holds the planned value"
                    );
                    TargetOutcome::Unchanged {
                        name: record.name.clone(),
                        kind: record.kind.clone(),
                        id: row.id,
                        target: row.target,
                    }
                }
                Some(row) if overwrite::overwrite_allowed(record) => {
                    info!(
                        dns_name = %record.name,
                        record_type = %record.kind,
                        old_value = %row.target,
                        new_value = %target,
                        "Overwriting existing record (annotation allows overwrite)"
                    );
                    self.replace_target(cancel, record, &row.id, &row.target, target)
                        .await?
                }
                Some(row) => {
                    warn!(
                        dns_name = %record.name,
                        record_type = %record.kind,
                        current_value = %row.target,
                        planned_value = %target,
                        annotation = OVERWRITE_ANNOTATION_KEY,
                        "Record already exists and will NOT be overwritten. To allow overwrite, \
                         set the annotation to \"true\""
                    );
                    metrics::record_overwrite_blocked(record.kind.as_str());
                    TargetOutcome::OverwriteBlocked {
                        name: record.name.clone(),
                        kind: record.kind.clone(),
                        current: row.target,
                        planned: target.clone(),
                    }
                }
            };

            match &outcome {
                TargetOutcome::Created { id, .. } | TargetOutcome::Unchanged { id, .. } => {
                    claimed.insert(id.clone());
                }
                TargetOutcome::Replaced { new_id, .. } => {
                    claimed.insert(new_id.clone());
                }
                _ => {}
            }
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    async fn create_target(
        &self,
        cancel: &CancellationToken,
        record: &DesiredRecord,
        target: &str,
    ) -> Result<String, SyncError> {
        let id = self
            .client
            .create(cancel, &record.name, &record.kind, target)
            .await
            .map_err(|source| SyncError::Create {
                name: record.name.clone(),
                kind: record.kind.clone(),
                target: target.to_string(),
                source,
            })?;
        metrics::record_rewrite_created(record.kind.as_str());
        Ok(id)
    }

    /// Delete `old_id`, then create `new_target` under the same name.
    async fn replace_target(
        &self,
        cancel: &CancellationToken,
        record: &DesiredRecord,
        old_id: &str,
        old_target: &str,
        new_target: &str,
    ) -> Result<TargetOutcome, SyncError> {
        self.client
            .delete(cancel, old_id)
            .await
            .map_err(|source| SyncError::Delete {
                name: record.name.clone(),
                kind: record.kind.clone(),
                id: old_id.to_string(),
                source,
            })?;
        metrics::record_rewrite_deleted(record.kind.as_str());

        let new_id = match self
            .client
            .create(cancel, &record.name, &record.kind, new_target)
            .await
        {
            Ok(id) => id,
            Err(source) => {
                error!(
                    dns_name = %record.name,
                    record_type = %record.kind,
                    old_id = %old_id,
                    old_value = %old_target,
                    new_value = %new_target,
                    error = %source,
                    "DNS record is in inconsistent state - existing record deleted but \
                     replacement not created"
                );
                return Err(SyncError::ReplaceIncomplete {
                    name: record.name.clone(),
                    kind: record.kind.clone(),
                    old_id: old_id.to_string(),
                    old_target: old_target.to_string(),
                    new_target: new_target.to_string(),
                    source,
                });
            }
        };
        metrics::record_rewrite_created(record.kind.as_str());

        Ok(TargetOutcome::Replaced {
            name: record.name.clone(),
            kind: record.kind.clone(),
            old_id: old_id.to_string(),
            old_target: old_target.to_string(),
            new_id,
            new_target: new_target.to_string(),
        })
    }

    fn warn_on_kind_mismatch(&self, record: &DesiredRecord, target: &str) {
        let inferred = self.classifier.classify(target);
        if inferred != record.kind {
            warn!(
                dns_name = %record.name,
                record_type = %record.kind,
                inferred_type = %inferred,
                target = %target,
                "NextDNS infers the record type from the target; the stored rewrite will \
                 not match the requested type"
            );
        }
    }

    /// Remove one rewrite per target of `record`.
    ///
    /// A target with no matching row is already in its desired state and is
    /// reported as [`TargetOutcome::AlreadyAbsent`]; so is a row that vanished
    /// between lookup and delete.
    ///
    /// # Errors
    ///
    /// Returns the first lookup or delete failure.
    pub async fn apply_delete(
        &self,
        cancel: &CancellationToken,
        record: &DesiredRecord,
    ) -> Result<Vec<TargetOutcome>, SyncError> {
        if !self.is_supported(&record.kind) {
            debug!(
                dns_name = %record.name,
                record_type = %record.kind,
                "Skipping delete for unsupported record type"
            );
            return Ok(vec![unsupported(record)]);
        }

        info!(
            dns_name = %record.name,
            record_type = %record.kind,
            targets = ?record.targets,
            "Deleting record"
        );

        let mut outcomes = Vec::with_capacity(record.targets.len());

        for target in &record.targets {
            let existing = self
                .client
                .find_by_name_and_kind(cancel, &record.name, &record.kind)
                .await
                .map_err(|source| SyncError::Lookup {
                    name: record.name.clone(),
                    kind: record.kind.clone(),
                    source,
                })?;

            let Some(row) = existing else {
                warn!(
                    dns_name = %record.name,
                    record_type = %record.kind,
                    target = %target,
                    "Record not found for deletion, may have already been deleted"
                );
                outcomes.push(already_absent(record, target));
                continue;
            };

            match self.client.delete(cancel, &row.id).await {
                Ok(()) => {
                    metrics::record_rewrite_deleted(record.kind.as_str());
                    info!(
                        id = %row.id,
                        dns_name = %record.name,
                        record_type = %record.kind,
                        "Successfully deleted record"
                    );
                    outcomes.push(TargetOutcome::Deleted {
                        name: record.name.clone(),
                        kind: record.kind.clone(),
                        id: row.id,
                        target: row.target,
                    });
                }
                Err(err) if err.is_not_found() => {
                    warn!(
                        id = %row.id,
                        dns_name = %record.name,
                        record_type = %record.kind,
                        "Record disappeared before it could be deleted"
                    );
                    outcomes.push(already_absent(record, target));
                }
                Err(source) => {
                    return Err(SyncError::Delete {
                        name: record.name.clone(),
                        kind: record.kind.clone(),
                        id: row.id,
                        source,
                    });
                }
            }
        }

        Ok(outcomes)
    }

    /// Replace `old` by `new`: delete first, then create.
    ///
    /// # Errors
    ///
    /// - [`SyncError::UpdateDelete`] if the delete fails; the create is not attempted
    /// - [`SyncError::InconsistentUpdate`] if the delete succeeded but the create
    ///   failed, leaving neither value in place
    pub async fn apply_update(
        &self,
        cancel: &CancellationToken,
        old: &DesiredRecord,
        new: &DesiredRecord,
    ) -> Result<Vec<TargetOutcome>, SyncError> {
        info!(
            operation = "update",
            dns_name = %old.name,
            old_target = ?old.targets,
            new_target = ?new.targets,
            "Updating record"
        );

        let mut outcomes = match self.apply_delete(cancel, old).await {
            Ok(outcomes) => outcomes,
            Err(err) => {
                error!(
                    operation = "update",
                    phase = "delete",
                    dns_name = %old.name,
                    record_type = %old.kind,
                    old_target = ?old.targets,
                    error = %err,
                    "Failed to delete old record during update"
                );
                return Err(SyncError::UpdateDelete {
                    name: old.name.clone(),
                    source: Box::new(err),
                });
            }
        };

        match self.apply_create(cancel, new).await {
            Ok(created) => outcomes.extend(created),
            Err(err) => {
                error!(
                    operation = "update",
                    phase = "create",
                    dns_name = %new.name,
                    record_type = %new.kind,
                    old_target = ?old.targets,
                    new_target = ?new.targets,
                    error = %err,
                    "Failed to create new record during update"
                );
                warn!(
                    dns_name = %new.name,
                    old_target = ?old.targets,
                    new_target = ?new.targets,
                    "DNS record is in inconsistent state - old record deleted but new record \
                     not created"
                );
                return Err(SyncError::InconsistentUpdate {
                    name: new.name.clone(),
                    old_targets: old.targets.clone(),
                    new_targets: new.targets.clone(),
                    source: Box::new(err),
                });
            }
        }

        info!(
            operation = "update",
            dns_name = %new.name,
            record_type = %new.kind,
            old_target = ?old.targets,
            new_target = ?new.targets,
            "Successfully updated record"
        );
        Ok(outcomes)
    }

    /// Apply a change set: creates, then updates, then deletes.
    ///
    /// With `dry_run` nothing is mutated; the report carries one
    /// [`PreviewLine`] per entry instead of outcomes.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Precondition`] if an entry has an empty name
    /// - [`SyncError::ChangeSet`] wrapping the first failure; later entries are
    ///   not attempted
    pub async fn apply_change_set(
        &self,
        cancel: &CancellationToken,
        changes: &ChangeSet,
        dry_run: bool,
    ) -> Result<ChangeSetReport, SyncError> {
        validate_change_set(changes)?;

        if dry_run {
            info!("Dry run mode enabled, changes will not be applied");
            let preview = self.preview(cancel, changes).await;
            return Ok(ChangeSetReport {
                dry_run: true,
                outcomes: Vec::new(),
                preview,
            });
        }

        let mut outcomes = Vec::new();

        for record in &changes.to_create {
            let applied = self
                .apply_create(cancel, record)
                .await
                .map_err(|e| wrap(ChangeAction::Create, &record.name, e))?;
            outcomes.extend(applied);
        }

        for (old, new) in &changes.to_update {
            let applied = self
                .apply_update(cancel, old, new)
                .await
                .map_err(|e| wrap(ChangeAction::Update, &old.name, e))?;
            outcomes.extend(applied);
        }

        for record in &changes.to_delete {
            let applied = self
                .apply_delete(cancel, record)
                .await
                .map_err(|e| wrap(ChangeAction::Delete, &record.name, e))?;
            outcomes.extend(applied);
        }

        Ok(ChangeSetReport {
            dry_run: false,
            outcomes,
            preview: Vec::new(),
        })
    }

    /// Describe what a change set would do, without mutating anything.
    ///
    /// Current state is read once; if that read fails the preview compares
    /// against an empty store instead of failing.
    pub async fn preview(
        &self,
        cancel: &CancellationToken,
        changes: &ChangeSet,
    ) -> Vec<PreviewLine> {
        let rows = match self.client.list_all(cancel).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "Failed to fetch current records for dry-run comparison");
                Vec::new()
            }
        };

        let mut current: BTreeMap<(String, RecordKind), Vec<String>> = BTreeMap::new();
        for row in rows {
            current
                .entry((row.name, row.kind))
                .or_default()
                .push(row.target);
        }
        let current_for = |record: &DesiredRecord| {
            current
                .get(&(record.name.clone(), record.kind.clone()))
                .cloned()
                .unwrap_or_default()
        };

        info!("=== DRY RUN PREVIEW ===");
        let mut lines = Vec::new();

        for record in &changes.to_create {
            let existing = current_for(record);
            let conflict = !existing.is_empty();
            let line = PreviewLine {
                action: ChangeAction::Create,
                name: record.name.clone(),
                kind: record.kind.clone(),
                current: existing,
                planned: record.targets.clone(),
                inferred: self.infer_all(&record.targets),
                conflict,
                overwrite_allowed: conflict.then(|| overwrite::evaluate(record).allowed),
            };
            log_preview(&line, "Would create record");
            lines.push(line);
        }

        for (old, new) in &changes.to_update {
            let line = PreviewLine {
                action: ChangeAction::Update,
                name: old.name.clone(),
                kind: old.kind.clone(),
                current: old.targets.clone(),
                planned: new.targets.clone(),
                inferred: self.infer_all(&new.targets),
                conflict: false,
                overwrite_allowed: None,
            };
            log_preview(&line, "Would update record");
            lines.push(line);
        }

        for record in &changes.to_delete {
            let line = PreviewLine {
                action: ChangeAction::Delete,
                name: record.name.clone(),
                kind: record.kind.clone(),
                current: current_for(record),
                planned: Vec::new(),
                inferred: Vec::new(),
                conflict: false,
                overwrite_allowed: None,
            };
            log_preview(&line, "Would delete record");
            lines.push(line);
        }

        info!("=== END DRY RUN PREVIEW ===");
        lines
    }

    fn infer_all(&self, targets: &[String]) -> Vec<RecordKind> {
        targets.iter().map(|t| self.classifier.classify(t)).collect()
    }
}

fn unsupported(record: &DesiredRecord) -> TargetOutcome {
    TargetOutcome::UnsupportedKind {
        name: record.name.clone(),
        kind: record.kind.clone(),
    }
}

fn already_absent(record: &DesiredRecord, target: &str) -> TargetOutcome {
    TargetOutcome::AlreadyAbsent {
        name: record.name.clone(),
        kind: record.kind.clone(),
        target: target.to_string(),
    }
}

fn wrap(action: ChangeAction, name: &str, source: SyncError) -> SyncError {
    if source.requires_operator_attention() {
        error!(
            action = %action,
            dns_name = %name,
            error = %source,
            "Change set stopped with a record requiring manual reconciliation"
        );
    }
    SyncError::ChangeSet {
        action,
        name: name.to_string(),
        source: Box::new(source),
    }
}

fn validate_change_set(changes: &ChangeSet) -> Result<(), SyncError> {
    let records = changes
        .to_create
        .iter()
        .chain(changes.to_update.iter().flat_map(|(old, new)| [old, new]))
        .chain(changes.to_delete.iter());

    for record in records {
        if record.name.trim().is_empty() {
            return Err(SyncError::Precondition(format!(
                "{} record with targets {:?} has an empty name",
                record.kind, record.targets
            )));
        }
    }
    Ok(())
}

fn log_preview(line: &PreviewLine, message: &str) {
    let overwrite = match line.overwrite_allowed {
        Some(true) => "allowed (annotation present)",
        Some(false) => "blocked (annotation not present)",
        None => "",
    };
    info!(
        action = %line.action,
        dns_name = %line.name,
        record_type = %line.kind,
        current = ?line.current,
        planned = ?line.planned,
        inferred = ?line.inferred,
        conflict = line.conflict,
        overwrite = overwrite,
        "{message}"
    );
}

#[cfg(test)]
#[path = "synchronizer_tests.rs"]
mod synchronizer_tests;
