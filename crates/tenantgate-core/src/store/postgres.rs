// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed record store.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use sqlx::types::Json;

use crate::status::JobStatus;

use super::{
    HistoryRecord, NamespaceRecord, NewHistoryRecord, NewNamespace, NewProvisioningJob,
    ProvisioningJob, RecordStore, Result, clamp_history_limit,
};

const JOB_COLUMNS: &str = "id, external_job_id, template_id, template_name, instance_name, \
     customer_id, status, external_status, error_message, created_by, launch_params, \
     created_at, updated_at";

/// PostgreSQL-backed record store.
#[derive(Clone)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    /// Create a store from an existing, migrated pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn insert_job(&self, job: &NewProvisioningJob) -> Result<ProvisioningJob> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, ProvisioningJob>(&format!(
            r#"
            INSERT INTO provisioning_jobs
                (external_job_id, template_id, template_name, instance_name, customer_id,
                 status, external_status, created_by, launch_params, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 'running', 'pending', $6, $7, $8, $8)
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
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_job(&self, id: i64) -> Result<Option<ProvisioningJob>> {
        let record = sqlx::query_as::<_, ProvisioningJob>(&format!(
            "SELECT {JOB_COLUMNS} FROM provisioning_jobs WHERE id = $1"
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
            "SELECT {JOB_COLUMNS} FROM provisioning_jobs WHERE external_job_id = $1"
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
            WHERE customer_id = $1 AND template_name = $2 AND status = 'running'
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
            SET status = $1, external_status = $2, error_message = $3, updated_at = $4
            WHERE id = $5 AND status = 'running'
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
            WHERE customer_id = $1
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
            WHERE name = $1 AND customer_id = $2
            "#,
        )
        .bind(name)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert_namespace(&self, namespace: &NewNamespace) -> Result<NamespaceRecord> {
        let record = sqlx::query_as::<_, NamespaceRecord>(
            r#"
            INSERT INTO namespaces (name, customer_id, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, name, customer_id, created_by, created_at, updated_at
            "#,
        )
        .bind(&namespace.name)
        .bind(&namespace.customer_id)
        .bind(&namespace.created_by)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn delete_namespace(&self, name: &str, customer_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM namespaces WHERE name = $1 AND customer_id = $2")
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
            WHERE customer_id = $1
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
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
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
            WHERE customer_id = $1 AND ($2::TEXT IS NULL OR resource = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
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
        let row: (i64,) = sqlx::query_as("SELECT 1::BIGINT")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 == 1)
    }
}
