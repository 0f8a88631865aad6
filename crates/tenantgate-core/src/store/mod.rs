// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Record store interfaces and backends.
//!
//! The store is the local ledger of what each tenant owns. It is never
//! transactional with the automation platform or the cluster; callers are
//! responsible for surfacing divergence.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresRecordStore;
pub use self::sqlite::SqliteRecordStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::types::Json;

use crate::status::JobStatus;

/// Upper bound for history listings.
pub const MAX_HISTORY_LIMIT: i64 = 500;

/// Errors raised by a record store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Query or connection failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failure.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether the failure is a unique constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Provisioning job row.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ProvisioningJob {
    /// Internal record id.
    pub id: i64,
    /// Job id on the automation platform (unique).
    pub external_job_id: i64,
    /// Platform template id.
    pub template_id: i64,
    /// Platform template name.
    pub template_name: String,
    /// Name of the requested instance.
    pub instance_name: String,
    /// Owning tenant.
    pub customer_id: String,
    /// Internal status (running, completed, failed).
    pub status: String,
    /// Last raw platform status.
    pub external_status: String,
    /// Failure detail, if any.
    pub error_message: Option<String>,
    /// Identity that requested the job.
    pub created_by: String,
    /// Variables the job was launched with, secrets redacted.
    pub launch_params: Json<Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ProvisioningJob {
    /// Parsed internal status. Unknown stored values read as running.
    pub fn job_status(&self) -> JobStatus {
        self.status.parse().unwrap_or(JobStatus::Running)
    }
}

/// Fields for a new provisioning job. Status always starts as running.
#[derive(Debug, Clone)]
pub struct NewProvisioningJob {
    pub external_job_id: i64,
    pub template_id: i64,
    pub template_name: String,
    pub instance_name: String,
    pub customer_id: String,
    pub created_by: String,
    pub launch_params: Value,
}

/// Namespace ownership row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct NamespaceRecord {
    pub id: i64,
    pub name: String,
    pub customer_id: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new namespace record.
#[derive(Debug, Clone)]
pub struct NewNamespace {
    pub name: String,
    pub customer_id: String,
    pub created_by: String,
}

/// Audit history row.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub customer_id: String,
    /// namespace, provisioning_job
    pub resource: String,
    /// create, delete, get, list
    pub action: String,
    /// success, error
    pub outcome: String,
    /// Name of the resource the action targeted.
    pub target: String,
    /// Identity that performed the action.
    pub actor: String,
    pub details: String,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new history entry.
#[derive(Debug, Clone)]
pub struct NewHistoryRecord {
    pub customer_id: String,
    pub resource: String,
    pub action: String,
    pub outcome: String,
    pub target: String,
    pub actor: String,
    pub details: String,
    pub error_message: Option<String>,
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence for job bookkeeping, namespace ownership and audit history.
///
/// Implementations must be safe for concurrent use; both shipped backends
/// wrap a connection pool.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a job record with status running.
    async fn insert_job(&self, job: &NewProvisioningJob) -> Result<ProvisioningJob>;

    /// Fetch a job by internal id.
    async fn get_job(&self, id: i64) -> Result<Option<ProvisioningJob>>;

    /// Fetch a job by its platform id.
    async fn get_job_by_external_id(&self, external_job_id: i64)
    -> Result<Option<ProvisioningJob>>;

    /// Most recent running job for a (customer, template) pair.
    async fn find_running_job(
        &self,
        customer_id: &str,
        template_name: &str,
    ) -> Result<Option<ProvisioningJob>>;

    /// Move a running job to a terminal status.
    ///
    /// Returns `false` without writing when the job is not running anymore,
    /// so a terminal status is never overwritten.
    async fn complete_job_if_running(
        &self,
        id: i64,
        status: JobStatus,
        external_status: &str,
        error_message: Option<&str>,
    ) -> Result<bool>;

    /// Every running job across all customers, oldest first.
    async fn list_running_jobs(&self) -> Result<Vec<ProvisioningJob>>;

    /// All jobs of a customer, newest first.
    async fn list_jobs_by_customer(&self, customer_id: &str) -> Result<Vec<ProvisioningJob>>;

    /// Namespace record owned by `customer_id`.
    async fn get_namespace(&self, name: &str, customer_id: &str)
    -> Result<Option<NamespaceRecord>>;

    /// Insert a namespace record.
    async fn insert_namespace(&self, namespace: &NewNamespace) -> Result<NamespaceRecord>;

    /// Delete a namespace record. Returns whether a row was removed.
    async fn delete_namespace(&self, name: &str, customer_id: &str) -> Result<bool>;

    /// Namespaces owned by a customer, ordered by name.
    async fn list_namespaces_by_customer(&self, customer_id: &str)
    -> Result<Vec<NamespaceRecord>>;

    /// Append an audit entry.
    async fn append_history(&self, entry: &NewHistoryRecord) -> Result<()>;

    /// Latest audit entries of a customer, newest first.
    ///
    /// `resource` narrows the listing to one resource kind. `limit` is
    /// clamped to `1..=MAX_HISTORY_LIMIT`.
    async fn list_history(
        &self,
        customer_id: &str,
        resource: Option<&str>,
        limit: i64,
    ) -> Result<Vec<HistoryRecord>>;

    /// Check database connectivity.
    async fn health_check(&self) -> Result<bool>;
}

pub(crate) fn clamp_history_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_HISTORY_LIMIT)
}
