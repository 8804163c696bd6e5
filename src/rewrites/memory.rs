// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory rewrite store.
//!
//! Behaves like the NextDNS rewrite API for the operations the provider uses:
//! ids are assigned by the store, the record type is inferred from the content,
//! and deleting an unknown id answers 404. Every call is appended to an operation
//! log, and failures can be queued per call type so tests can drive the retry and
//! failure paths deterministically.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::RewriteStore;
use crate::errors::RewriteApiError;
use crate::records::{infer_kind_from_target, RemoteRecord};

/// Type of a raw store call, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreCall {
    List,
    Create,
    Delete,
}

/// One call received by the store, in arrival order. Failed calls are logged too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOperation {
    List,
    Create { name: String, content: String },
    Delete { id: String },
}

impl StoreOperation {
    /// Whether this call would mutate the store.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::List)
    }
}

#[derive(Debug, Default)]
struct State {
    rows: Vec<RemoteRecord>,
    next_id: u64,
    operations: Vec<StoreOperation>,
    failures: HashMap<StoreCall, VecDeque<RewriteApiError>>,
}

impl State {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("rw{}", self.next_id)
    }

    fn take_failure(&mut self, call: StoreCall) -> Option<RewriteApiError> {
        self.failures.get_mut(&call).and_then(VecDeque::pop_front)
    }
}

/// Rewrite store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRewriteStore {
    state: Mutex<State>,
}

impl InMemoryRewriteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with rows given as `(name, content)`; kinds are inferred.
    #[must_use]
    pub fn with_records<'a>(rows: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let store = Self::new();
        for (name, content) in rows {
            store.insert(name, content);
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a row directly, bypassing the operation log. Returns its id.
    pub fn insert(&self, name: &str, content: &str) -> String {
        let mut state = self.lock();
        let id = state.allocate_id();
        state.rows.push(RemoteRecord {
            id: id.clone(),
            name: name.to_string(),
            kind: infer_kind_from_target(content),
            target: content.to_string(),
        });
        id
    }

    /// Queue `err` to be returned by the next call of type `call`.
    pub fn push_failure(&self, call: StoreCall, err: RewriteApiError) {
        self.lock().failures.entry(call).or_default().push_back(err);
    }

    /// Snapshot of the stored rows, in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<RemoteRecord> {
        self.lock().rows.clone()
    }

    /// Snapshot of every call received so far.
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOperation> {
        self.lock().operations.clone()
    }

    /// Calls that would have changed the store.
    #[must_use]
    pub fn mutations(&self) -> Vec<StoreOperation> {
        self.operations()
            .into_iter()
            .filter(StoreOperation::is_mutation)
            .collect()
    }
}

#[async_trait]
impl RewriteStore for InMemoryRewriteStore {
    async fn list(&self) -> Result<Vec<RemoteRecord>, RewriteApiError> {
        let mut state = self.lock();
        state.operations.push(StoreOperation::List);
        if let Some(err) = state.take_failure(StoreCall::List) {
            return Err(err);
        }
        Ok(state.rows.clone())
    }

    async fn create(&self, name: &str, content: &str) -> Result<String, RewriteApiError> {
        let mut state = self.lock();
        state.operations.push(StoreOperation::Create {
            name: name.to_string(),
            content: content.to_string(),
        });
        if let Some(err) = state.take_failure(StoreCall::Create) {
            return Err(err);
        }

        let id = state.allocate_id();
        state.rows.push(RemoteRecord {
            id: id.clone(),
            name: name.to_string(),
            kind: infer_kind_from_target(content),
            target: content.to_string(),
        });
        Ok(id)
    }

    async fn delete(&self, id: &str) -> Result<(), RewriteApiError> {
        let mut state = self.lock();
        state.operations.push(StoreOperation::Delete { id: id.to_string() });
        if let Some(err) = state.take_failure(StoreCall::Delete) {
            return Err(err);
        }

        let Some(position) = state.rows.iter().position(|row| row.id == id) else {
            return Err(RewriteApiError::Status {
                status: 404,
                message: format!("notFound: rewrite {id} does not exist"),
            });
        };
        state.rows.remove(position);
        Ok(())
    }
}
