// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Namespace lifecycle with a local ownership record.
//!
//! A namespace is `absent` or `owned` by exactly one customer. Requests from
//! any other customer see it as absent. Create and delete each touch the
//! cluster and the record store without a shared transaction; divergence is
//! reported through [`PartialFailure`].

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::audit::{AuditAction, AuditEntry, AuditLog, AuditResource};
use crate::cluster::{
    ANNOTATION_CREATED_BY, ANNOTATION_CUSTOMER_ID, ANNOTATION_NODE_SELECTOR, ClusterApi,
    ClusterError, NamespaceSpec,
};
use crate::error::{Conflict, Error, NotFound, PartialFailure, Result};
use crate::metrics::GatewayMetrics;
use crate::store::{HistoryRecord, NamespaceRecord, NewNamespace, RecordStore};

const MIN_NAME_LEN: usize = 2;
const MAX_NAME_LEN: usize = 63;

/// What to do when the record write fails after the cluster namespace exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanPolicy {
    /// Leave the cluster namespace and report `ClusterOrphan`.
    #[default]
    Surface,
    /// Delete the cluster namespace again. `ClusterOrphan` is still reported
    /// when that delete fails.
    Compensate,
}

impl FromStr for OrphanPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "surface" => Ok(OrphanPolicy::Surface),
            "compensate" => Ok(OrphanPolicy::Compensate),
            other => Err(format!(
                "unknown orphan policy '{}', expected 'surface' or 'compensate'",
                other
            )),
        }
    }
}

/// Settings for [`NamespaceService`].
#[derive(Debug, Clone, Default)]
pub struct NamespaceConfig {
    /// Value of the node selector annotation put on every new namespace.
    pub node_selector: Option<String>,
    pub orphan_policy: OrphanPolicy,
}

/// Create, delete and read customer namespaces.
pub struct NamespaceService {
    cluster: Arc<dyn ClusterApi>,
    store: Arc<dyn RecordStore>,
    audit: AuditLog,
    metrics: Arc<GatewayMetrics>,
    config: NamespaceConfig,
}

impl NamespaceService {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        store: Arc<dyn RecordStore>,
        audit: AuditLog,
        metrics: Arc<GatewayMetrics>,
        config: NamespaceConfig,
    ) -> Self {
        Self {
            cluster,
            store,
            audit,
            metrics,
            config,
        }
    }

    pub fn config(&self) -> &NamespaceConfig {
        &self.config
    }

    /// Create `name` in the cluster and record `customer_id` as its owner.
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        name: &str,
        customer_id: &str,
        created_by: &str,
    ) -> Result<NamespaceRecord> {
        let result = self.create_inner(name, customer_id, created_by).await;
        match &result {
            Ok(_) => self.metrics.namespace_created(),
            Err(e) => self.mutation_failed(e),
        }

        let entry = AuditEntry::new(
            AuditResource::Namespace,
            AuditAction::Create,
            customer_id,
            name,
            created_by,
        )
        .with_details("namespace create");
        self.audit.record_result(entry, &result).await;

        result
    }

    async fn create_inner(
        &self,
        name: &str,
        customer_id: &str,
        created_by: &str,
    ) -> Result<NamespaceRecord> {
        validate_name(name)?;
        require("customer_id", customer_id)?;
        require("created_by", created_by)?;

        let existing = self
            .cluster
            .get_namespace(name)
            .await
            .map_err(Error::cluster)?;
        if existing.is_some() {
            return Err(Error::Conflict(Conflict::ExistsInCluster(name.to_string())));
        }

        let recorded = self
            .store
            .get_namespace(name, customer_id)
            .await
            .map_err(|e| Error::persistence("get_namespace", e))?;
        if recorded.is_some() {
            return Err(Error::Conflict(Conflict::ExistsInStore(name.to_string())));
        }

        let spec = self.namespace_spec(name, customer_id, created_by);
        self.cluster
            .create_namespace(&spec)
            .await
            .map_err(|e| match e {
                ClusterError::AlreadyExists(_) => {
                    Error::Conflict(Conflict::ExistsInCluster(name.to_string()))
                }
                other => Error::cluster(other),
            })?;
        debug!("Cluster namespace created");

        let new_record = NewNamespace {
            name: name.to_string(),
            customer_id: customer_id.to_string(),
            created_by: created_by.to_string(),
        };
        match self.store.insert_namespace(&new_record).await {
            Ok(record) => {
                info!(record_id = record.id, "Namespace created and recorded");
                Ok(record)
            }
            Err(e) => Err(self.handle_unrecorded_namespace(name, e).await),
        }
    }

    async fn handle_unrecorded_namespace(
        &self,
        name: &str,
        source: crate::store::StoreError,
    ) -> Error {
        if self.config.orphan_policy == OrphanPolicy::Compensate {
            match self.cluster.delete_namespace(name).await {
                Ok(()) | Err(ClusterError::NotFound(_)) => {
                    warn!(error = %source, "Namespace record write failed; cluster namespace removed");
                    return Error::persistence("insert_namespace", source);
                }
                Err(e) => {
                    error!(error = %e, "Compensating namespace delete failed");
                }
            }
        }

        self.metrics.partial_failure();
        error!(
            error = %source,
            "Namespace exists in the cluster without a record; manual reconciliation required"
        );
        Error::partial(
            "insert_namespace",
            PartialFailure::ClusterOrphan {
                namespace: name.to_string(),
            },
            source,
        )
    }

    /// Delete a namespace owned by `customer_id`.
    ///
    /// A cluster namespace that is already gone is not an error; the record
    /// is still removed.
    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str, customer_id: &str, actor: &str) -> Result<()> {
        let result = self.delete_inner(name, customer_id).await;
        match &result {
            Ok(()) => self.metrics.namespace_deleted(),
            Err(e) => self.mutation_failed(e),
        }

        let entry = AuditEntry::new(
            AuditResource::Namespace,
            AuditAction::Delete,
            customer_id,
            name,
            actor,
        )
        .with_details("namespace delete");
        self.audit.record_result(entry, &result).await;

        result
    }

    async fn delete_inner(&self, name: &str, customer_id: &str) -> Result<()> {
        require("name", name)?;
        require("customer_id", customer_id)?;

        self.owned_record(name, customer_id).await?;

        match self.cluster.delete_namespace(name).await {
            Ok(()) => debug!("Cluster namespace deleted"),
            Err(ClusterError::NotFound(_)) => {
                info!("Cluster namespace already absent; removing record")
            }
            Err(e) => return Err(Error::cluster(e)),
        }

        match self.store.delete_namespace(name, customer_id).await {
            Ok(true) => {
                info!("Namespace deleted");
                Ok(())
            }
            Ok(false) => {
                debug!("Namespace record already removed");
                Ok(())
            }
            Err(e) => {
                self.metrics.partial_failure();
                error!(
                    error = %e,
                    "Cluster namespace deleted but record remains; manual reconciliation required"
                );
                Err(Error::partial(
                    "delete_namespace",
                    PartialFailure::RecordOrphan {
                        namespace: name.to_string(),
                    },
                    e,
                ))
            }
        }
    }

    /// Record of a namespace owned by `customer_id`. Failed lookups are audited.
    pub async fn get(&self, name: &str, customer_id: &str, actor: &str) -> Result<NamespaceRecord> {
        let result = self.owned_record(name, customer_id).await;
        if result.is_err() {
            let entry = AuditEntry::new(
                AuditResource::Namespace,
                AuditAction::Get,
                customer_id,
                name,
                actor,
            )
            .with_details("namespace get");
            self.audit.record_result(entry, &result).await;
        }
        result
    }

    /// Namespaces owned by `customer_id`, ordered by name.
    pub async fn list_by_customer(&self, customer_id: &str) -> Result<Vec<NamespaceRecord>> {
        self.store
            .list_namespaces_by_customer(customer_id)
            .await
            .map_err(|e| Error::persistence("list_namespaces_by_customer", e))
    }

    /// Latest namespace audit entries of `customer_id`, newest first.
    pub async fn history(&self, customer_id: &str, limit: i64) -> Result<Vec<HistoryRecord>> {
        self.store
            .list_history(customer_id, Some(AuditResource::Namespace.as_str()), limit)
            .await
            .map_err(|e| Error::persistence("list_history", e))
    }

    async fn owned_record(&self, name: &str, customer_id: &str) -> Result<NamespaceRecord> {
        let record = self
            .store
            .get_namespace(name, customer_id)
            .await
            .map_err(|e| Error::persistence("get_namespace", e))?;
        match record {
            Some(record) if record.customer_id == customer_id => Ok(record),
            _ => Err(Error::NotFound(NotFound::Namespace(name.to_string()))),
        }
    }

    fn namespace_spec(&self, name: &str, customer_id: &str, created_by: &str) -> NamespaceSpec {
        let mut annotations = BTreeMap::new();
        annotations.insert(ANNOTATION_CUSTOMER_ID.to_string(), customer_id.to_string());
        annotations.insert(ANNOTATION_CREATED_BY.to_string(), created_by.to_string());
        if let Some(selector) = &self.config.node_selector {
            annotations.insert(ANNOTATION_NODE_SELECTOR.to_string(), selector.clone());
        }
        NamespaceSpec {
            name: name.to_string(),
            annotations,
        }
    }

    fn mutation_failed(&self, err: &Error) {
        self.metrics.namespace_failed();
        debug!(code = err.error_code(), error = %err, "Namespace operation failed");
    }
}

fn require(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(field, "must not be empty"));
    }
    Ok(())
}

/// DNS-1123 label: lowercase alphanumerics and '-', alphanumeric at both ends.
pub fn validate_name(name: &str) -> Result<()> {
    let len = name.len();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return Err(Error::validation(
            "name",
            format!(
                "must be between {} and {} characters",
                MIN_NAME_LEN, MAX_NAME_LEN
            ),
        ));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(Error::validation(
            "name",
            "may only contain lowercase letters, digits and '-'",
        ));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(Error::validation(
            "name",
            "must start and end with a letter or digit",
        ));
    }
    Ok(())
}
