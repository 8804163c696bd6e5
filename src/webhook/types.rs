// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Wire types of the external-dns webhook protocol.
//!
//! external-dns serializes empty slices and maps as `null`, so every collection
//! field accepts `null` as empty.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::SyncError;
use crate::records::{ChangeSet, DesiredRecord, RecordKind};

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Provider-specific key/value attached to an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpecificProperty {
    pub name: String,
    pub value: String,
}

/// One DNS endpoint as exchanged with external-dns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub dns_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub targets: Vec<String>,
    #[serde(default)]
    pub record_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_identifier: Option<String>,
    #[serde(rename = "recordTTL", default, skip_serializing_if = "Option::is_none")]
    pub record_ttl: Option<i64>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub labels: BTreeMap<String, String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub provider_specific: Vec<ProviderSpecificProperty>,
}

impl From<Endpoint> for DesiredRecord {
    fn from(endpoint: Endpoint) -> Self {
        Self {
            name: endpoint.dns_name,
            kind: RecordKind::from(endpoint.record_type.as_str()),
            targets: endpoint.targets,
            markers: endpoint
                .provider_specific
                .into_iter()
                .map(|property| (property.name, property.value))
                .collect(),
            ttl: endpoint.record_ttl,
            set_identifier: endpoint.set_identifier.filter(|id| !id.is_empty()),
            labels: endpoint.labels,
        }
    }
}

impl From<DesiredRecord> for Endpoint {
    fn from(record: DesiredRecord) -> Self {
        Self {
            dns_name: record.name,
            targets: record.targets,
            record_type: record.kind.to_string(),
            set_identifier: record.set_identifier,
            record_ttl: record.ttl,
            labels: record.labels,
            provider_specific: record
                .markers
                .into_iter()
                .map(|(name, value)| ProviderSpecificProperty { name, value })
                .collect(),
        }
    }
}

/// Body of `POST /records`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Changes {
    #[serde(default, deserialize_with = "null_as_default")]
    pub create: Vec<Endpoint>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub update_old: Vec<Endpoint>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub update_new: Vec<Endpoint>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub delete: Vec<Endpoint>,
}

impl TryFrom<Changes> for ChangeSet {
    type Error = SyncError;

    /// Pair `UpdateOld[i]` with `UpdateNew[i]`.
    fn try_from(changes: Changes) -> Result<Self, Self::Error> {
        if changes.update_old.len() != changes.update_new.len() {
            return Err(SyncError::Precondition(format!(
                "UpdateOld has {} endpoints but UpdateNew has {}",
                changes.update_old.len(),
                changes.update_new.len()
            )));
        }

        Ok(Self {
            to_create: changes.create.into_iter().map(DesiredRecord::from).collect(),
            to_update: changes
                .update_old
                .into_iter()
                .zip(changes.update_new)
                .map(|(old, new)| (DesiredRecord::from(old), DesiredRecord::from(new)))
                .collect(),
            to_delete: changes.delete.into_iter().map(DesiredRecord::from).collect(),
        })
    }
}

/// Domain filter advertised on `GET /`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainFilter {
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub include: Vec<String>,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
