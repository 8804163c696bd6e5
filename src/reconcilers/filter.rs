// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Candidate filtering by record kind and domain allow-list.

use std::collections::BTreeSet;

use tracing::debug;

use crate::records::{DesiredRecord, RecordKind};

/// Narrows a proposed record set to the records this provider manages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateFilter {
    supported: BTreeSet<RecordKind>,
    allow_list: Vec<String>,
}

impl CandidateFilter {
    /// Create a filter. An empty `allow_list` admits every name.
    pub fn new(
        supported: impl IntoIterator<Item = RecordKind>,
        allow_list: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            supported: supported.into_iter().collect(),
            allow_list: allow_list.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn supported(&self) -> &BTreeSet<RecordKind> {
        &self.supported
    }

    #[must_use]
    pub fn allow_list(&self) -> &[String] {
        &self.allow_list
    }

    #[must_use]
    pub fn is_supported(&self, kind: &RecordKind) -> bool {
        self.supported.contains(kind)
    }

    /// Whether `name` passes the allow-list.
    #[must_use]
    pub fn matches_domain(&self, name: &str) -> bool {
        self.allow_list.is_empty()
            || self
                .allow_list
                .iter()
                .any(|suffix| domain_matches(name, suffix))
    }

    /// Keep the records whose kind is supported and whose name passes the
    /// allow-list, in input order.
    #[must_use]
    pub fn filter(&self, candidates: Vec<DesiredRecord>) -> Vec<DesiredRecord> {
        let total = candidates.len();

        let kept: Vec<DesiredRecord> = candidates
            .into_iter()
            .filter(|record| {
                if !self.is_supported(&record.kind) {
                    debug!(
                        dns_name = %record.name,
                        record_type = %record.kind,
                        "Skipping endpoint - unsupported record type"
                    );
                    return false;
                }
                if !self.matches_domain(&record.name) {
                    debug!(
                        dns_name = %record.name,
                        "Skipping endpoint - doesn't match domain filter"
                    );
                    return false;
                }
                true
            })
            .collect();

        debug!(total = total, kept = kept.len(), "Adjusted endpoints");
        kept
    }
}

/// Suffix match, where the suffix without its leading dot also matches exactly.
///
/// `"example.com"` matches `"example.com"` and `"app.example.com"`;
/// `".example.com"` matches both as well.
#[must_use]
pub fn domain_matches(name: &str, suffix: &str) -> bool {
    name.ends_with(suffix) || name == suffix.trim_start_matches('.')
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod filter_tests;
