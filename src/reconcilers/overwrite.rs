// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Overwrite policy for records that already exist in the remote store.
//!
//! Replacing an existing rewrite is denied unless the desired record carries the
//! overwrite marker with the value `true` (case-insensitive). The marker is a
//! per-record opt-in; there is no global switch.

use tracing::debug;

use crate::constants::{OVERWRITE_ALLOWED_VALUE, OVERWRITE_ANNOTATION_KEY};
use crate::records::DesiredRecord;

/// Outcome of evaluating the overwrite marker of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverwriteDecision {
    /// Raw marker value, if the marker is present
    pub marker: Option<String>,
    pub allowed: bool,
}

impl OverwriteDecision {
    /// Human-readable reason for audit logs.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match (&self.marker, self.allowed) {
            (None, _) => "overwrite marker absent",
            (Some(_), true) => "overwrite marker set to true",
            (Some(_), false) => "overwrite marker present but not true",
        }
    }
}

/// Evaluate the overwrite marker of `record` and log the decision.
#[must_use]
pub fn evaluate(record: &DesiredRecord) -> OverwriteDecision {
    let marker = record.overwrite_marker().map(str::to_string);
    let allowed = marker
        .as_deref()
        .is_some_and(|value| value.eq_ignore_ascii_case(OVERWRITE_ALLOWED_VALUE));

    let decision = OverwriteDecision { marker, allowed };

    debug!(
        dns_name = %record.name,
        record_type = %record.kind,
        marker_key = OVERWRITE_ANNOTATION_KEY,
        marker_present = decision.marker.is_some(),
        marker_value = decision.marker.as_deref().unwrap_or(""),
        allowed = decision.allowed,
        reason = decision.reason(),
        "Evaluated overwrite policy"
    );

    decision
}

/// Whether an existing record with the same name and kind may be replaced.
#[must_use]
pub fn overwrite_allowed(record: &DesiredRecord) -> bool {
    evaluate(record).allowed
}

#[cfg(test)]
#[path = "overwrite_tests.rs"]
mod overwrite_tests;
