// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Record data model shared by the synchronizer, the rewrite client and the webhook.
//!
//! - [`DesiredRecord`] - one name → target(s) mapping supplied by external-dns
//! - [`RemoteRecord`] - one rewrite row stored by NextDNS (single target)
//! - [`ChangeSet`] - the create/update/delete diff for one reconciliation pass
//! - [`TargetOutcome`] / [`ChangeSetReport`] - what a pass actually did
//!
//! NextDNS infers the record type of a rewrite from the shape of its content, so
//! this module also hosts the [`KindClassifier`] seam used to predict that inference.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{OVERWRITE_ANNOTATION_KEY, WEBHOOK_PROPERTY_PREFIX};

/// DNS record type.
///
/// The managed set is closed at configuration time, but external-dns also proposes
/// kinds this provider never manages (e.g. TXT ownership records), so unknown kinds
/// are preserved verbatim in [`RecordKind::Other`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    #[default]
    A,
    Aaaa,
    Cname,
    Other(String),
}

impl RecordKind {
    /// Wire name of the kind (`A`, `AAAA`, `CNAME`, ...).
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::A => "A",
            Self::Aaaa => "AAAA",
            Self::Cname => "CNAME",
            Self::Other(kind) => kind,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for RecordKind {
    fn from(value: &str) -> Self {
        let normalized = value.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "A" => Self::A,
            "AAAA" => Self::Aaaa,
            "CNAME" => Self::Cname,
            _ => Self::Other(normalized),
        }
    }
}

impl FromStr for RecordKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl Serialize for RecordKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RecordKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw.as_str()))
    }
}

/// One item of desired DNS state.
///
/// `targets` is ordered; one remote rewrite is created per target. `markers` holds
/// the provider-specific key/value annotations attached by external-dns, among them
/// the overwrite marker. `ttl`, `set_identifier` and `labels` are carried through
/// untouched: NextDNS rewrites have no TTL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DesiredRecord {
    pub name: String,
    pub kind: RecordKind,
    pub targets: Vec<String>,
    pub markers: BTreeMap<String, String>,
    pub ttl: Option<i64>,
    pub set_identifier: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl DesiredRecord {
    /// Create a record without markers.
    pub fn new(
        name: impl Into<String>,
        kind: RecordKind,
        targets: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            targets: targets.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Attach a provider-specific marker.
    #[must_use]
    pub fn with_marker(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.markers.insert(key.into(), value.into());
        self
    }

    /// Raw value of the overwrite marker, if present.
    ///
    /// external-dns forwards annotations to webhooks both bare and with a `webhook/`
    /// prefix; the bare key wins when both are present.
    #[must_use]
    pub fn overwrite_marker(&self) -> Option<&str> {
        self.markers
            .get(OVERWRITE_ANNOTATION_KEY)
            .or_else(|| {
                self.markers
                    .get(&format!("{WEBHOOK_PROPERTY_PREFIX}{OVERWRITE_ANNOTATION_KEY}"))
            })
            .map(String::as_str)
    }
}

/// One rewrite row in the NextDNS profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    pub id: String,
    pub name: String,
    pub kind: RecordKind,
    pub target: String,
}

impl RemoteRecord {
    /// Read model of this row: a single-target desired record.
    #[must_use]
    pub fn to_desired(&self) -> DesiredRecord {
        DesiredRecord::new(self.name.clone(), self.kind.clone(), [self.target.clone()])
    }
}

/// Create/update/delete diff for one reconciliation pass.
///
/// Processing order is creates, then updates, then deletes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub to_create: Vec<DesiredRecord>,
    /// `(old, new)` pairs
    pub to_update: Vec<(DesiredRecord, DesiredRecord)>,
    pub to_delete: Vec<DesiredRecord>,
}

impl ChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// Phase of a change set an action belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Result of processing a single target of a desired record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Created {
        name: String,
        kind: RecordKind,
        target: String,
        id: String,
    },
    /// An existing row was deleted and recreated with the planned target.
    Replaced {
        name: String,
        kind: RecordKind,
        old_id: String,
        old_target: String,
        new_id: String,
        new_target: String,
    },
    /// The existing row already holds the planned target.
    Unchanged {
        name: String,
        kind: RecordKind,
        id: String,
        target: String,
    },
    /// An existing row would have been replaced but the record carries no
    /// overwrite authorization.
    OverwriteBlocked {
        name: String,
        kind: RecordKind,
        current: String,
        planned: String,
    },
    Deleted {
        name: String,
        kind: RecordKind,
        id: String,
        target: String,
    },
    /// Nothing to delete: the desired absence already holds.
    AlreadyAbsent {
        name: String,
        kind: RecordKind,
        target: String,
    },
    UnsupportedKind {
        name: String,
        kind: RecordKind,
    },
}

impl TargetOutcome {
    /// Whether this outcome changed the remote store.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Created { .. } | Self::Replaced { .. } | Self::Deleted { .. }
        )
    }

    /// Whether this outcome is a policy-driven skip that an operator may want to see.
    #[must_use]
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::OverwriteBlocked { .. } | Self::AlreadyAbsent { .. }
        )
    }
}

/// One line of a dry-run preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewLine {
    pub action: ChangeAction,
    pub name: String,
    pub kind: RecordKind,
    /// Values currently stored for `(name, kind)`
    pub current: Vec<String>,
    pub planned: Vec<String>,
    /// Kinds NextDNS will infer for the planned targets
    pub inferred: Vec<RecordKind>,
    /// A create collides with an existing record
    pub conflict: bool,
    /// Overwrite decision for a conflicting create
    pub overwrite_allowed: Option<bool>,
}

/// Everything one `apply_change_set` pass did (or, in dry-run, would do).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSetReport {
    pub dry_run: bool,
    pub outcomes: Vec<TargetOutcome>,
    pub preview: Vec<PreviewLine>,
}

impl ChangeSetReport {
    /// Number of outcomes that changed the remote store.
    #[must_use]
    pub fn mutations(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_mutation()).count()
    }

    /// Number of policy-driven skips.
    #[must_use]
    pub fn skips(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_skip()).count()
    }
}

/// Predicts the record kind the remote store will assign to a target value.
pub trait KindClassifier: Send + Sync {
    fn classify(&self, target: &str) -> RecordKind;
}

/// Heuristic classification by the literal syntax of the target:
///
/// 1. contains a colon ⇒ AAAA
/// 2. four dot-separated numeric groups ⇒ A
/// 3. anything else ⇒ CNAME
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetShapeClassifier;

impl KindClassifier for TargetShapeClassifier {
    fn classify(&self, target: &str) -> RecordKind {
        infer_kind_from_target(target)
    }
}

/// See [`TargetShapeClassifier`].
#[must_use]
pub fn infer_kind_from_target(target: &str) -> RecordKind {
    if target.contains(':') {
        return RecordKind::Aaaa;
    }

    let groups: Vec<&str> = target.split('.').collect();
    let dotted_quad = groups.len() == 4
        && groups
            .iter()
            .all(|g| !g.is_empty() && g.chars().all(|c| c.is_ascii_digit()));

    if dotted_quad {
        RecordKind::A
    } else {
        RecordKind::Cname
    }
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod records_tests;
