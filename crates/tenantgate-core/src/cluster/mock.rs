// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock cluster for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ClusterApi, ClusterError, ClusterNamespace, NamespaceSpec};

#[derive(Debug, Default)]
struct MockState {
    namespaces: HashMap<String, ClusterNamespace>,
    get_error: Option<ClusterError>,
    create_error: Option<ClusterError>,
    delete_error: Option<ClusterError>,
}

/// In-memory [`ClusterApi`].
#[derive(Debug, Default)]
pub struct MockCluster {
    state: Mutex<MockState>,
    create_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MockCluster {
    /// Create an empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace without going through `create_namespace`.
    pub async fn insert_namespace(&self, name: &str) {
        self.state.lock().await.namespaces.insert(
            name.to_string(),
            ClusterNamespace {
                name: name.to_string(),
                annotations: Default::default(),
                phase: Some("Active".to_string()),
            },
        );
    }

    /// Remove a namespace without going through `delete_namespace`.
    pub async fn remove_namespace(&self, name: &str) {
        self.state.lock().await.namespaces.remove(name);
    }

    /// Current namespace, if present.
    pub async fn namespace(&self, name: &str) -> Option<ClusterNamespace> {
        self.state.lock().await.namespaces.get(name).cloned()
    }

    /// Fail every get with `err` until cleared.
    pub async fn set_get_error(&self, err: Option<ClusterError>) {
        self.state.lock().await.get_error = err;
    }

    /// Fail every create with `err` until cleared.
    pub async fn set_create_error(&self, err: Option<ClusterError>) {
        self.state.lock().await.create_error = err;
    }

    /// Fail every delete with `err` until cleared.
    pub async fn set_delete_error(&self, err: Option<ClusterError>) {
        self.state.lock().await.delete_error = err;
    }

    /// Number of create calls received.
    pub fn create_count(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of delete calls received.
    pub fn delete_count(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterApi for MockCluster {
    async fn get_namespace(&self, name: &str) -> Result<Option<ClusterNamespace>, ClusterError> {
        let state = self.state.lock().await;
        if let Some(err) = &state.get_error {
            return Err(err.clone());
        }
        Ok(state.namespaces.get(name).cloned())
    }

    async fn create_namespace(
        &self,
        spec: &NamespaceSpec,
    ) -> Result<ClusterNamespace, ClusterError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock().await;
        if let Some(err) = &state.create_error {
            return Err(err.clone());
        }
        if state.namespaces.contains_key(&spec.name) {
            return Err(ClusterError::AlreadyExists(spec.name.clone()));
        }

        let namespace = ClusterNamespace {
            name: spec.name.clone(),
            annotations: spec.annotations.clone(),
            phase: Some("Active".to_string()),
        };
        state.namespaces.insert(spec.name.clone(), namespace.clone());
        Ok(namespace)
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), ClusterError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock().await;
        if let Some(err) = &state.delete_error {
            return Err(err.clone());
        }
        state
            .namespaces
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ClusterError::NotFound(name.to_string()))
    }
}
