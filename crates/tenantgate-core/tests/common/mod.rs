// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for tenantgate-core integration tests.
//!
//! Provides [`TestGateway`], which wires both services to in-memory mocks and
//! an in-memory SQLite store that can be told to fail selected writes.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use tenantgate_core::audit::AuditLog;
use tenantgate_core::cluster::MockCluster;
use tenantgate_core::job_monitor::JobMonitorConfig;
use tenantgate_core::metrics::GatewayMetrics;
use tenantgate_core::namespaces::{NamespaceConfig, NamespaceService, OrphanPolicy};
use tenantgate_core::platform::MockPlatform;
use tenantgate_core::provisioning::{
    LaunchGuard, ProvisionRequest, ProvisioningConfig, ProvisioningService,
};
use tenantgate_core::status::JobStatus;
use tenantgate_core::store::{
    HistoryRecord, NamespaceRecord, NewHistoryRecord, NewNamespace, NewProvisioningJob,
    ProvisioningJob, RecordStore, SqliteRecordStore, StoreError,
};
use tenantgate_core::supervisor::MonitorSupervisor;

pub const TEMPLATE: &str = "dbaas-create";
pub const TEMPLATE_ID: i64 = 42;

fn injected() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

/// SQLite store with switchable write failures.
pub struct FailingStore {
    inner: SqliteRecordStore,
    pub fail_insert_job: AtomicBool,
    pub fail_insert_namespace: AtomicBool,
    pub fail_delete_namespace: AtomicBool,
    pub fail_append_history: AtomicBool,
}

impl FailingStore {
    pub async fn new() -> Self {
        Self {
            inner: SqliteRecordStore::in_memory()
                .await
                .expect("in-memory sqlite store"),
            fail_insert_job: AtomicBool::new(false),
            fail_insert_namespace: AtomicBool::new(false),
            fail_delete_namespace: AtomicBool::new(false),
            fail_append_history: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &SqliteRecordStore {
        &self.inner
    }

    fn check(flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(injected())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn insert_job(&self, job: &NewProvisioningJob) -> Result<ProvisioningJob, StoreError> {
        Self::check(&self.fail_insert_job)?;
        self.inner.insert_job(job).await
    }

    async fn get_job(&self, id: i64) -> Result<Option<ProvisioningJob>, StoreError> {
        self.inner.get_job(id).await
    }

    async fn get_job_by_external_id(
        &self,
        external_job_id: i64,
    ) -> Result<Option<ProvisioningJob>, StoreError> {
        self.inner.get_job_by_external_id(external_job_id).await
    }

    async fn find_running_job(
        &self,
        customer_id: &str,
        template_name: &str,
    ) -> Result<Option<ProvisioningJob>, StoreError> {
        self.inner.find_running_job(customer_id, template_name).await
    }

    async fn complete_job_if_running(
        &self,
        id: i64,
        status: JobStatus,
        external_status: &str,
        error_message: Option<&str>,
    ) -> Result<bool, StoreError> {
        self.inner
            .complete_job_if_running(id, status, external_status, error_message)
            .await
    }

    async fn list_running_jobs(&self) -> Result<Vec<ProvisioningJob>, StoreError> {
        self.inner.list_running_jobs().await
    }

    async fn list_jobs_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<ProvisioningJob>, StoreError> {
        self.inner.list_jobs_by_customer(customer_id).await
    }

    async fn get_namespace(
        &self,
        name: &str,
        customer_id: &str,
    ) -> Result<Option<NamespaceRecord>, StoreError> {
        self.inner.get_namespace(name, customer_id).await
    }

    async fn insert_namespace(
        &self,
        namespace: &NewNamespace,
    ) -> Result<NamespaceRecord, StoreError> {
        Self::check(&self.fail_insert_namespace)?;
        self.inner.insert_namespace(namespace).await
    }

    async fn delete_namespace(&self, name: &str, customer_id: &str) -> Result<bool, StoreError> {
        Self::check(&self.fail_delete_namespace)?;
        self.inner.delete_namespace(name, customer_id).await
    }

    async fn list_namespaces_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<NamespaceRecord>, StoreError> {
        self.inner.list_namespaces_by_customer(customer_id).await
    }

    async fn append_history(&self, entry: &NewHistoryRecord) -> Result<(), StoreError> {
        Self::check(&self.fail_append_history)?;
        self.inner.append_history(entry).await
    }

    async fn list_history(
        &self,
        customer_id: &str,
        resource: Option<&str>,
        limit: i64,
    ) -> Result<Vec<HistoryRecord>, StoreError> {
        self.inner.list_history(customer_id, resource, limit).await
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        self.inner.health_check().await
    }
}

/// Both services wired to mocks.
pub struct TestGateway {
    pub store: Arc<FailingStore>,
    pub platform: Arc<MockPlatform>,
    pub cluster: Arc<MockCluster>,
    pub metrics: Arc<GatewayMetrics>,
    pub supervisor: Arc<MonitorSupervisor>,
    pub provisioning: ProvisioningService,
    pub namespaces: NamespaceService,
}

impl TestGateway {
    /// Enforced launch guard, surfaced orphans, template 42 and next job 777.
    pub async fn new() -> Self {
        Self::with_options(
            MockPlatform::new()
                .with_template(TEMPLATE, TEMPLATE_ID)
                .with_next_job_id(777),
            LaunchGuard::Enforced,
            OrphanPolicy::Surface,
        )
        .await
    }

    pub async fn with_options(
        platform: MockPlatform,
        launch_guard: LaunchGuard,
        orphan_policy: OrphanPolicy,
    ) -> Self {
        let store = Arc::new(FailingStore::new().await);
        let platform = Arc::new(platform);
        let cluster = Arc::new(MockCluster::new());
        let metrics = Arc::new(GatewayMetrics::new());
        let supervisor = Arc::new(MonitorSupervisor::new());
        let audit = AuditLog::new(store.clone(), metrics.clone());

        let provisioning = ProvisioningService::new(
            platform.clone(),
            store.clone(),
            supervisor.clone(),
            audit.clone(),
            metrics.clone(),
            ProvisioningConfig {
                launch_guard,
                monitor: fast_monitor(),
            },
        );
        let namespaces = NamespaceService::new(
            cluster.clone(),
            store.clone(),
            audit,
            metrics.clone(),
            NamespaceConfig {
                node_selector: Some("node-role.kubernetes.io/tenant=".to_string()),
                orphan_policy,
            },
        );

        Self {
            store,
            platform,
            cluster,
            metrics,
            supervisor,
            provisioning,
            namespaces,
        }
    }

    /// A provisioning service on the same store and platform with its own
    /// supervisor, as a restarted process would build it.
    pub fn restarted_provisioning(&self) -> (ProvisioningService, Arc<MonitorSupervisor>) {
        let supervisor = Arc::new(MonitorSupervisor::new());
        let service = ProvisioningService::new(
            self.platform.clone(),
            self.store.clone(),
            supervisor.clone(),
            AuditLog::new(self.store.clone(), self.metrics.clone()),
            self.metrics.clone(),
            self.provisioning.config().clone(),
        );
        (service, supervisor)
    }

    /// Latest history entries of `customer_id`.
    pub async fn history(&self, customer_id: &str) -> Vec<HistoryRecord> {
        self.store
            .list_history(customer_id, None, 50)
            .await
            .expect("list history")
    }
}

/// Monitor settings for tests: 10ms polls, three failures allowed.
pub fn fast_monitor() -> JobMonitorConfig {
    JobMonitorConfig {
        poll_interval: Duration::from_millis(10),
        max_consecutive_failures: 3,
    }
}

/// A provisioning request for `instance` by cust-1.
pub fn request(instance: &str) -> ProvisionRequest {
    ProvisionRequest {
        template_name: TEMPLATE.to_string(),
        instance_name: instance.to_string(),
        customer_id: "cust-1".to_string(),
        requested_by: "alice".to_string(),
        parameters: serde_json::json!({"db_version": "16", "admin_password": "hunter2"})
            .as_object()
            .cloned()
            .unwrap_or_default(),
    }
}

/// Poll the store until the job record reaches `status`.
pub async fn wait_for_status(
    store: &dyn RecordStore,
    record_id: i64,
    status: JobStatus,
) -> ProvisioningJob {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let job = store
            .get_job(record_id)
            .await
            .expect("get job")
            .expect("job record exists");
        if job.job_status() == status {
            return job;
        }
        if tokio::time::Instant::now() > deadline {
            panic!(
                "job {} stayed '{}' (external '{}'), expected '{}'",
                record_id, job.status, job.external_status, status
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
