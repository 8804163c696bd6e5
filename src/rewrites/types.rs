// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Wire types of the NextDNS rewrites API.

use serde::{Deserialize, Serialize};

use crate::records::{infer_kind_from_target, RecordKind, RemoteRecord};

/// Successful responses wrap their payload in `{"data": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// Error responses carry `{"errors": [{"code": ..., "detail": ...}]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorEnvelope {
    /// `code: detail` of the first reported error, if any.
    #[must_use]
    pub fn summary(&self) -> Option<String> {
        let first = self.errors.first()?;
        match (&first.code, &first.detail) {
            (Some(code), Some(detail)) => Some(format!("{code}: {detail}")),
            (Some(text), None) | (None, Some(text)) => Some(text.clone()),
            (None, None) => None,
        }
    }
}

/// One rewrite row as listed by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRow {
    pub id: String,
    pub name: String,
    /// Server-inferred record type; older API responses may omit it
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub content: String,
}

impl From<RewriteRow> for RemoteRecord {
    fn from(row: RewriteRow) -> Self {
        let kind = match row.kind.as_deref() {
            Some(kind) if !kind.trim().is_empty() => RecordKind::from(kind),
            _ => infer_kind_from_target(&row.content),
        };
        Self {
            id: row.id,
            name: row.name,
            kind,
            target: row.content,
        }
    }
}

/// Body of `POST /profiles/{id}/rewrites`. The API rejects a `type` field.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRewriteRequest<'a> {
    pub name: &'a str,
    pub content: &'a str,
}

/// Payload of a successful create; only the id is relied upon.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedRewrite {
    pub id: String,
}
