// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed record store.
//!
//! Used for embedded/single-node deployments and as the test backend
//! (`sqlite::memory:`).

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::types::Json;

use crate::migrations;
use crate::status::JobStatus;

use super::{
    HistoryRecord, NamespaceRecord, NewHistoryRecord, NewNamespace, NewProvisioningJob,
    ProvisioningJob, RecordStore, Result, StoreError, clamp_history_limit,
};

const JOB_COLUMNS: &str = "id, external_job_id, template_id, template_name, instance_name, \
     customer_id, status, external_status, error_message, created_by, launch_params, \
     created_at, updated_at";

/// SQLite-backed record store.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Create a store from an existing, migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) a database file and run migrations.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Database(sqlx::Error::Configuration(
                    format!("failed to create directory {:?}: {}", parent, e).into(),
                ))
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        migrations::run_sqlite(&pool).await?;
        Ok(Self { pool })
    }

    /// Open a private in-memory database and run migrations.
    ///
    /// A single connection keeps every query on the same database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        migrations::run_sqlite(&pool).await?;
        Ok(Self { pool })
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert_job(&self, job: &NewProvisioningJob) -> Result<ProvisioningJob> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, ProvisioningJob>(&format!(
            r#"
            INSERT INTO provisioning_jobs
                (external_job_id, template_id, template_name, instance_name, customer_id,
                 status, external_status, created_by, launch_params, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 'running', 'pending', ?, ?, ?, ?)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job.external_job_id)
        .bind(job.template_id)
        .bind(&job.template_name)
        .bind(&job.instance_name)
        .bind(&job.customer_id)
        .bind(&job.created_by)
        .bind(Json(&job.launch_params))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_job(&self, id: i64) -> Result<Option<ProvisioningJob>> {
        let record = sqlx::query_as::<_, ProvisioningJob>(&format!(
            "SELECT {JOB_COLUMNS} FROM provisioning_jobs WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_job_by_external_id(
        &self,
        external_job_id: i64,
    ) -> Result<Option<ProvisioningJob>> {
        let record = sqlx::query_as::<_, ProvisioningJob>(&format!(
            "SELECT {JOB_COLUMNS} FROM provisioning_jobs WHERE external_job_id = ?"
        ))
        .bind(external_job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_running_job(
        &self,
        customer_id: &str,
        template_name: &str,
    ) -> Result<Option<ProvisioningJob>> {
        let record = sqlx::query_as::<_, ProvisioningJob>(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM provisioning_jobs
            WHERE customer_id = ? AND template_name = ? AND status = 'running'
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#
        ))
        .bind(customer_id)
        .bind(template_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn complete_job_if_running(
        &self,
        id: i64,
        status: JobStatus,
        external_status: &str,
        error_message: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE provisioning_jobs
            SET status = ?, external_status = ?, error_message = ?, updated_at = ?
            WHERE id = ? AND status = 'running'
            "#,
        )
        .bind(status.as_str())
        .bind(external_status)
        .bind(error_message)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_running_jobs(&self) -> Result<Vec<ProvisioningJob>> {
        let records = sqlx::query_as::<_, ProvisioningJob>(&format!(
            "SELECT {JOB_COLUMNS} FROM provisioning_jobs WHERE status = 'running' ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn list_jobs_by_customer(&self, customer_id: &str) -> Result<Vec<ProvisioningJob>> {
        let records = sqlx::query_as::<_, ProvisioningJob>(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM provisioning_jobs
            WHERE customer_id = ?
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn get_namespace(
        &self,
        name: &str,
        customer_id: &str,
    ) -> Result<Option<NamespaceRecord>> {
        let record = sqlx::query_as::<_, NamespaceRecord>(
            r#"
            SELECT id, name, customer_id, created_by, created_at, updated_at
            FROM namespaces
            WHERE name = ? AND customer_id = ?
            "#,
        )
        .bind(name)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert_namespace(&self, namespace: &NewNamespace) -> Result<NamespaceRecord> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, NamespaceRecord>(
            r#"
            INSERT INTO namespaces (name, customer_id, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, name, customer_id, created_by, created_at, updated_at
            "#,
        )
        .bind(&namespace.name)
        .bind(&namespace.customer_id)
        .bind(&namespace.created_by)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn delete_namespace(&self, name: &str, customer_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM namespaces WHERE name = ? AND customer_id = ?")
            .bind(name)
            .bind(customer_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_namespaces_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<NamespaceRecord>> {
        let records = sqlx::query_as::<_, NamespaceRecord>(
            r#"
            SELECT id, name, customer_id, created_by, created_at, updated_at
            FROM namespaces
            WHERE customer_id = ?
            ORDER BY name
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn append_history(&self, entry: &NewHistoryRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO history
                (customer_id, resource, action, outcome, target, actor, details,
                 error_message, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.customer_id)
        .bind(&entry.resource)
        .bind(&entry.action)
        .bind(&entry.outcome)
        .bind(&entry.target)
        .bind(&entry.actor)
        .bind(&entry.details)
        .bind(&entry.error_message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_history(
        &self,
        customer_id: &str,
        resource: Option<&str>,
        limit: i64,
    ) -> Result<Vec<HistoryRecord>> {
        let records = sqlx::query_as::<_, HistoryRecord>(
            r#"
            SELECT id, customer_id, resource, action, outcome, target, actor, details,
                   error_message, created_at
            FROM history
            WHERE customer_id = ?1 AND (?2 IS NULL OR resource = ?2)
            ORDER BY created_at DESC, id DESC
            LIMIT ?3
            "#,
        )
        .bind(customer_id)
        .bind(resource)
        .bind(clamp_history_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn health_check(&self) -> Result<bool> {
        let row: (i64,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        Ok(row.0 == 1)
    }
}
