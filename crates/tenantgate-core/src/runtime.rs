// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable runtime for tenantgate-core.
//!
//! [`GatewayRuntime`] wires the record store and both external clients into
//! the provisioning and namespace services, and owns the monitor supervisor
//! so shutdown can stop background monitors.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tenantgate_core::runtime::GatewayRuntime;
//! use tenantgate_core::store::PostgresRecordStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = sqlx::PgPool::connect("postgres://...").await?;
//!     let awx = Arc::new(tenantgate_awx::AwxClient::from_env()?);
//!
//!     let runtime = GatewayRuntime::builder()
//!         .store(Arc::new(PostgresRecordStore::new(pool)))
//!         .platform(awx)
//!         .cluster(cluster)
//!         .build()?
//!         .start()
//!         .await?;
//!
//!     let job = runtime.provisioning().provision(request).await?;
//!
//!     runtime.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::audit::AuditLog;
use crate::cluster::ClusterApi;
use crate::job_monitor::JobMonitorConfig;
use crate::metrics::{GatewayMetrics, MetricsSnapshot};
use crate::namespaces::{NamespaceConfig, NamespaceService, OrphanPolicy};
use crate::platform::JobPlatform;
use crate::provisioning::{LaunchGuard, ProvisioningConfig, ProvisioningService};
use crate::store::RecordStore;
use crate::supervisor::MonitorSupervisor;

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Builder for [`GatewayRuntime`].
#[derive(Default)]
pub struct GatewayRuntimeBuilder {
    store: Option<Arc<dyn RecordStore>>,
    platform: Option<Arc<dyn JobPlatform>>,
    cluster: Option<Arc<dyn ClusterApi>>,
    metrics: Option<Arc<GatewayMetrics>>,
    monitor: JobMonitorConfig,
    launch_guard: LaunchGuard,
    namespaces: NamespaceConfig,
    shutdown_grace: Option<Duration>,
}

impl GatewayRuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record store (required).
    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Automation platform (required).
    pub fn platform(mut self, platform: Arc<dyn JobPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Cluster API (required).
    pub fn cluster(mut self, cluster: Arc<dyn ClusterApi>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Metrics sink. A fresh one is created when not set.
    pub fn metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn monitor_config(mut self, config: JobMonitorConfig) -> Self {
        self.monitor = config;
        self
    }

    pub fn launch_guard(mut self, guard: LaunchGuard) -> Self {
        self.launch_guard = guard;
        self
    }

    pub fn orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.namespaces.orphan_policy = policy;
        self
    }

    /// Node selector annotation for new namespaces.
    pub fn node_selector(mut self, selector: Option<String>) -> Self {
        self.namespaces.node_selector = selector;
        self
    }

    /// How long [`GatewayRuntime::shutdown`] waits for monitors (default: 10s).
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = Some(grace);
        self
    }

    /// Validate the builder.
    pub fn build(self) -> Result<GatewayRuntimeConfig> {
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("store is required"))?;
        let platform = self
            .platform
            .ok_or_else(|| anyhow::anyhow!("platform is required"))?;
        let cluster = self
            .cluster
            .ok_or_else(|| anyhow::anyhow!("cluster is required"))?;

        Ok(GatewayRuntimeConfig {
            store,
            platform,
            cluster,
            metrics: self.metrics.unwrap_or_default(),
            provisioning: ProvisioningConfig {
                launch_guard: self.launch_guard,
                monitor: self.monitor,
            },
            namespaces: self.namespaces,
            shutdown_grace: self.shutdown_grace.unwrap_or(DEFAULT_SHUTDOWN_GRACE),
        })
    }
}

/// Validated runtime settings, ready to start.
pub struct GatewayRuntimeConfig {
    store: Arc<dyn RecordStore>,
    platform: Arc<dyn JobPlatform>,
    cluster: Arc<dyn ClusterApi>,
    metrics: Arc<GatewayMetrics>,
    provisioning: ProvisioningConfig,
    namespaces: NamespaceConfig,
    shutdown_grace: Duration,
}

impl GatewayRuntimeConfig {
    /// Check the store, assemble the services and resume monitors for jobs
    /// the store still holds as running.
    pub async fn start(self) -> Result<GatewayRuntime> {
        if !self.store.health_check().await? {
            return Err(anyhow::anyhow!("record store health check failed"));
        }

        let supervisor = Arc::new(MonitorSupervisor::new());
        let audit = AuditLog::new(self.store.clone(), self.metrics.clone());

        info!(
            launch_guard = ?self.provisioning.launch_guard,
            orphan_policy = ?self.namespaces.orphan_policy,
            poll_interval_ms = self.provisioning.monitor.poll_interval.as_millis() as u64,
            "Starting gateway runtime"
        );

        let provisioning = Arc::new(ProvisioningService::new(
            self.platform,
            self.store.clone(),
            supervisor.clone(),
            audit.clone(),
            self.metrics.clone(),
            self.provisioning,
        ));
        provisioning.resume_monitors().await?;

        let namespaces = Arc::new(NamespaceService::new(
            self.cluster,
            self.store,
            audit,
            self.metrics.clone(),
            self.namespaces,
        ));

        Ok(GatewayRuntime {
            provisioning,
            namespaces,
            supervisor,
            metrics: self.metrics,
            shutdown_grace: self.shutdown_grace,
        })
    }
}

/// Running gateway services.
pub struct GatewayRuntime {
    provisioning: Arc<ProvisioningService>,
    namespaces: Arc<NamespaceService>,
    supervisor: Arc<MonitorSupervisor>,
    metrics: Arc<GatewayMetrics>,
    shutdown_grace: Duration,
}

impl GatewayRuntime {
    /// Create a new builder for configuring the runtime.
    pub fn builder() -> GatewayRuntimeBuilder {
        GatewayRuntimeBuilder::new()
    }

    pub fn provisioning(&self) -> &Arc<ProvisioningService> {
        &self.provisioning
    }

    pub fn namespaces(&self) -> &Arc<NamespaceService> {
        &self.namespaces
    }

    pub fn supervisor(&self) -> &Arc<MonitorSupervisor> {
        &self.supervisor
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Stop all job monitors.
    ///
    /// Jobs still in flight keep their `running` record.
    pub async fn shutdown(self) -> MetricsSnapshot {
        info!("GatewayRuntime shutting down...");

        if !self.supervisor.shutdown(self.shutdown_grace).await {
            warn!("Some job monitors did not stop in time; their records stay running");
        }

        let snapshot = self.metrics.snapshot();
        info!(
            jobs_launched = snapshot.jobs_launched,
            jobs_completed = snapshot.jobs_completed,
            jobs_failed = snapshot.jobs_failed,
            namespaces_created = snapshot.namespaces_created,
            namespaces_deleted = snapshot.namespaces_deleted,
            partial_failures = snapshot.partial_failures,
            "GatewayRuntime shutdown complete"
        );
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MockCluster;
    use crate::platform::MockPlatform;
    use crate::provisioning::ProvisionRequest;
    use crate::status::JobStatus;
    use crate::store::{NewProvisioningJob, SqliteRecordStore};

    #[test]
    fn test_build_requires_parts() {
        let err = GatewayRuntime::builder().build().err().unwrap();
        assert_eq!(err.to_string(), "store is required");
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let store = Arc::new(SqliteRecordStore::in_memory().await.unwrap());
        let platform = Arc::new(
            MockPlatform::new()
                .with_template("dbaas-create", 42)
                .with_next_job_id(777),
        );

        let runtime = GatewayRuntime::builder()
            .store(store)
            .platform(platform)
            .cluster(Arc::new(MockCluster::new()))
            .monitor_config(JobMonitorConfig {
                poll_interval: Duration::from_millis(10),
                max_consecutive_failures: 3,
            })
            .shutdown_grace(Duration::from_secs(2))
            .build()
            .unwrap()
            .start()
            .await
            .unwrap();

        let response = runtime
            .provisioning()
            .provision(ProvisionRequest {
                template_name: "dbaas-create".into(),
                instance_name: "pg1".into(),
                customer_id: "cust-1".into(),
                requested_by: "alice".into(),
                parameters: Default::default(),
            })
            .await
            .unwrap();
        assert_eq!(response.job_id, 777);
        assert_eq!(runtime.supervisor().active_count(), 1);

        let snapshot = runtime.shutdown().await;
        assert_eq!(snapshot.jobs_launched, 1);
        assert_eq!(snapshot.monitors_cancelled, 1);
    }

    #[tokio::test]
    async fn test_start_resumes_running_jobs() {
        let store = Arc::new(SqliteRecordStore::in_memory().await.unwrap());
        let record = store
            .insert_job(&NewProvisioningJob {
                external_job_id: 555,
                template_id: 42,
                template_name: "dbaas-create".into(),
                instance_name: "pg0".into(),
                customer_id: "cust-1".into(),
                created_by: "alice".into(),
                launch_params: serde_json::json!({}),
            })
            .await
            .unwrap();
        let platform = Arc::new(MockPlatform::new().with_template("dbaas-create", 42));
        platform.insert_job(42, 555, "successful").await;

        let runtime = GatewayRuntime::builder()
            .store(store.clone())
            .platform(platform)
            .cluster(Arc::new(MockCluster::new()))
            .monitor_config(JobMonitorConfig {
                poll_interval: Duration::from_millis(10),
                max_consecutive_failures: 3,
            })
            .build()
            .unwrap()
            .start()
            .await
            .unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let job = store.get_job(record.id).await.unwrap().unwrap();
            if job.job_status() == JobStatus::Completed {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "job never completed");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let snapshot = runtime.shutdown().await;
        assert_eq!(snapshot.jobs_completed, 1);
        assert_eq!(snapshot.monitors_cancelled, 0);
    }
}
