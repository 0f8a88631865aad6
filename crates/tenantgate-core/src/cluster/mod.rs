// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cluster API port.
//!
//! Only cluster-scoped namespaces are managed. [`KubeClient`] talks to the
//! Kubernetes REST API directly; [`MockCluster`] keeps namespaces in memory.

pub mod kube;
pub mod mock;

pub use kube::{KubeClient, KubeConfig};
pub use mock::MockCluster;

use std::collections::BTreeMap;

use async_trait::async_trait;

/// Annotation carrying the owning tenant.
pub const ANNOTATION_CUSTOMER_ID: &str = "customer-id";
/// Annotation carrying the requesting identity.
pub const ANNOTATION_CREATED_BY: &str = "created-by";
/// OpenShift per-namespace node selector.
pub const ANNOTATION_NODE_SELECTOR: &str = "openshift.io/node-selector";

/// A namespace to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceSpec {
    pub name: String,
    pub annotations: BTreeMap<String, String>,
}

/// A namespace as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNamespace {
    pub name: String,
    pub annotations: BTreeMap<String, String>,
    /// `Active` or `Terminating`, when reported.
    pub phase: Option<String>,
}

/// Errors reported by a [`ClusterApi`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClusterError {
    #[error("namespace '{0}' not found")]
    NotFound(String),

    #[error("namespace '{0}' already exists")]
    AlreadyExists(String),

    #[error("cluster API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("cluster transport error: {0}")]
    Transport(String),
}

impl ClusterError {
    /// Whether the cluster reported the namespace as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound(_))
    }
}

/// Namespace operations on the container-orchestration cluster.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Fetch a namespace; `None` when it does not exist.
    async fn get_namespace(&self, name: &str) -> Result<Option<ClusterNamespace>, ClusterError>;

    /// Create a namespace.
    async fn create_namespace(&self, spec: &NamespaceSpec)
    -> Result<ClusterNamespace, ClusterError>;

    /// Delete a namespace. Fails with [`ClusterError::NotFound`] when absent.
    async fn delete_namespace(&self, name: &str) -> Result<(), ClusterError>;
}
