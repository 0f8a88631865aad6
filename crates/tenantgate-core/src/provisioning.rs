// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Job-backed provisioning (database instances and similar resources).
//!
//! `provision` resolves the template, launches a job, records it as running
//! and hands it to a [`JobMonitor`]. It returns as soon as the record exists;
//! completion is observed through the record or [`get_job_status`].
//!
//! # Failure modes
//!
//! | Step | Error | State left behind |
//! |------|-------|-------------------|
//! | template lookup | `NotFound(Template)` | nothing |
//! | launch | `LaunchFailed` | maybe a job on the platform, no record |
//! | record insert | `Persistence` + `LaunchedUnrecorded` | job on the platform, no record |
//! | monitor start | logged only | record stays running |
//!
//! # Launch guard
//!
//! With [`LaunchGuard::Enforced`] launches for the same (customer, template)
//! are serialised in-process and rejected with `Conflict(ActiveJob)` while
//! the store holds a running job for that pair that the platform still
//! reports in flight. A running record whose job already finished is
//! settled first and does not block. [`LaunchGuard::Advisory`]
//! leaves deduplication to callers of [`check_active_job`]; concurrent
//! `provision` calls may then both launch.
//!
//! [`get_job_status`]: ProvisioningService::get_job_status
//! [`check_active_job`]: ProvisioningService::check_active_job

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, instrument, warn};

use crate::audit::{AuditAction, AuditEntry, AuditLog, AuditResource};
use crate::error::{Conflict, Error, NotFound, PartialFailure, Result};
use crate::job_monitor::{
    JobMonitor, JobMonitorConfig, terminal_outcome, vanished_reason, write_terminal,
};
use crate::metrics::GatewayMetrics;
use crate::platform::{JobPlatform, PlatformError};
use crate::status::{JobStatus, JobStatusView, UNKNOWN_EXTERNAL_STATUS};
use crate::store::{HistoryRecord, NewProvisioningJob, ProvisioningJob, RecordStore};
use crate::supervisor::{MonitorSupervisor, SupervisorError};

/// Keys whose values are never persisted in launch parameters.
const SECRET_KEY_MARKERS: [&str; 3] = ["password", "secret", "token"];
const REDACTED: &str = "********";

/// Server-side deduplication of launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchGuard {
    /// One running job per (customer, template).
    #[default]
    Enforced,
    /// No server-side check.
    Advisory,
}

impl FromStr for LaunchGuard {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "enforced" => Ok(LaunchGuard::Enforced),
            "advisory" => Ok(LaunchGuard::Advisory),
            other => Err(format!(
                "unknown launch guard '{}', expected 'enforced' or 'advisory'",
                other
            )),
        }
    }
}

/// Settings for [`ProvisioningService`].
#[derive(Debug, Clone, Default)]
pub struct ProvisioningConfig {
    pub launch_guard: LaunchGuard,
    pub monitor: JobMonitorConfig,
}

/// A request to provision one resource through a job template.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    /// Template to launch, matched by exact name.
    pub template_name: String,
    /// Name of the resource the job creates.
    pub instance_name: String,
    /// Requesting tenant.
    pub customer_id: String,
    /// Identity of the requester.
    pub requested_by: String,
    /// Extra template variables. `instance_name` and `customer_id` are always
    /// overwritten with the values above.
    pub parameters: Map<String, Value>,
}

/// Result of a successful [`ProvisioningService::provision`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ProvisionResponse {
    /// External (platform) job id.
    pub job_id: i64,
    /// Internal record id.
    pub record_id: i64,
    /// Always [`JobStatus::Running`].
    pub status: JobStatus,
}

type LockKey = (String, String);

/// Per-key async locks. An entry lives while some caller holds or awaits it.
#[derive(Default)]
struct KeyedLocks {
    locks: Mutex<HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    async fn acquire(&self, key: LockKey) -> KeyedGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(key.clone()).or_default().clone()
        };
        KeyedGuard {
            owner: self,
            key,
            guard: Some(lock.lock_owned().await),
        }
    }

    fn release(&self, key: &LockKey) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map's own reference left: nobody else holds or waits.
        if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

struct KeyedGuard<'a> {
    owner: &'a KeyedLocks,
    key: LockKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.owner.release(&self.key);
    }
}

/// Orchestrates dedup check, launch, record and monitor.
pub struct ProvisioningService {
    platform: Arc<dyn JobPlatform>,
    store: Arc<dyn RecordStore>,
    supervisor: Arc<MonitorSupervisor>,
    audit: AuditLog,
    metrics: Arc<GatewayMetrics>,
    config: ProvisioningConfig,
    locks: KeyedLocks,
}

impl ProvisioningService {
    pub fn new(
        platform: Arc<dyn JobPlatform>,
        store: Arc<dyn RecordStore>,
        supervisor: Arc<MonitorSupervisor>,
        audit: AuditLog,
        metrics: Arc<GatewayMetrics>,
        config: ProvisioningConfig,
    ) -> Self {
        Self {
            platform,
            store,
            supervisor,
            audit,
            metrics,
            config,
            locks: KeyedLocks::default(),
        }
    }

    pub fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    /// Launch a job for `request` and start following it.
    #[instrument(
        skip(self, request),
        fields(
            customer_id = %request.customer_id,
            template = %request.template_name,
            instance = %request.instance_name
        )
    )]
    pub async fn provision(&self, request: ProvisionRequest) -> Result<ProvisionResponse> {
        let result = self.provision_inner(&request).await;

        let mut entry = AuditEntry::new(
            AuditResource::ProvisioningJob,
            AuditAction::Create,
            &request.customer_id,
            &request.instance_name,
            &request.requested_by,
        );
        entry = match &result {
            Ok(resp) => entry.with_details(format!(
                "provision via template '{}' (job {})",
                request.template_name, resp.job_id
            )),
            Err(_) => {
                entry.with_details(format!("provision via template '{}'", request.template_name))
            }
        };
        self.audit.record_result(entry, &result).await;

        result
    }

    async fn provision_inner(&self, request: &ProvisionRequest) -> Result<ProvisionResponse> {
        validate_request(request)?;

        let _guard = match self.config.launch_guard {
            LaunchGuard::Enforced => {
                let key = (request.customer_id.clone(), request.template_name.clone());
                let guard = self.locks.acquire(key).await;

                while let Some(existing) = self
                    .store
                    .find_running_job(&request.customer_id, &request.template_name)
                    .await
                    .map_err(|e| Error::persistence("find_running_job", e))?
                {
                    if self.settle_if_finished(&existing).await? {
                        continue;
                    }
                    self.metrics.launch_conflict();
                    info!(
                        job_id = existing.external_job_id,
                        "Rejecting launch; job already running for this template"
                    );
                    return Err(Error::Conflict(Conflict::ActiveJob {
                        job_id: existing.external_job_id,
                    }));
                }
                Some(guard)
            }
            LaunchGuard::Advisory => None,
        };

        let template_id = self
            .platform
            .resolve_template_id(&request.template_name)
            .await
            .map_err(|e| template_error(&request.template_name, e))?;

        let variables = launch_variables(request);
        let external_job_id = match self
            .platform
            .launch_job(template_id, variables.clone())
            .await
        {
            Ok(id) => id,
            Err(e) => {
                self.metrics.launch_failed();
                warn!(template_id, error = %e, "Job launch failed");
                return Err(Error::LaunchFailed {
                    template: request.template_name.clone(),
                    source: e,
                });
            }
        };
        self.metrics.job_launched();

        let new_job = NewProvisioningJob {
            external_job_id,
            template_id,
            template_name: request.template_name.clone(),
            instance_name: request.instance_name.clone(),
            customer_id: request.customer_id.clone(),
            created_by: request.requested_by.clone(),
            launch_params: redact_secrets(&variables),
        };
        let record = match self.store.insert_job(&new_job).await {
            Ok(record) => record,
            Err(e) => {
                self.metrics.partial_failure();
                error!(
                    job_id = external_job_id,
                    error = %e,
                    "Job launched but could not be recorded; manual reconciliation required"
                );
                return Err(Error::partial(
                    "insert_job",
                    PartialFailure::LaunchedUnrecorded { external_job_id },
                    e,
                ));
            }
        };

        info!(
            job_id = external_job_id,
            record_id = record.id,
            "Job launched and recorded"
        );

        if let Err(e) = self.spawn_monitor(external_job_id, record.id) {
            error!(job_id = external_job_id, error = %e, "Failed to start job monitor");
        }

        Ok(ProvisionResponse {
            job_id: external_job_id,
            record_id: record.id,
            status: JobStatus::Running,
        })
    }

    fn spawn_monitor(
        &self,
        external_job_id: i64,
        record_id: i64,
    ) -> std::result::Result<(), SupervisorError> {
        let monitor = JobMonitor::new(
            self.platform.clone(),
            self.store.clone(),
            self.metrics.clone(),
            self.config.monitor.clone(),
            external_job_id,
            record_id,
        );
        self.supervisor.spawn(monitor).map(|_| ())
    }

    /// Start a monitor for every record the store holds as running.
    ///
    /// Called once at startup so jobs left behind by a previous process
    /// still reach a terminal record. Returns how many monitors started.
    #[instrument(skip(self))]
    pub async fn resume_monitors(&self) -> Result<usize> {
        let running = self
            .store
            .list_running_jobs()
            .await
            .map_err(|e| Error::persistence("list_running_jobs", e))?;

        let mut resumed = 0;
        for job in &running {
            match self.spawn_monitor(job.external_job_id, job.id) {
                Ok(()) => resumed += 1,
                Err(e) => {
                    warn!(job_id = job.external_job_id, error = %e, "Failed to resume job monitor")
                }
            }
        }

        if resumed > 0 {
            info!(resumed, "Resumed monitors for running jobs");
        }
        Ok(resumed)
    }

    /// Ask the platform about a record the store still holds as running.
    ///
    /// The record can outlive its monitor (shutdown, restart, failed
    /// spawn). A terminal or vanished job is written to the record and
    /// `true` returned. A job still in flight, or a platform that cannot be
    /// reached, keeps the record running and returns `false`.
    async fn settle_if_finished(&self, existing: &ProvisioningJob) -> Result<bool> {
        let job_id = existing.external_job_id;
        let (status, external_status, error_message) = match self.platform.get_job(job_id).await
        {
            Ok(job) => match terminal_outcome(&job.status) {
                Some((status, error_message)) => (status, job.status, error_message),
                None => return Ok(false),
            },
            Err(PlatformError::NotFound(what)) => (
                JobStatus::Failed,
                UNKNOWN_EXTERNAL_STATUS.to_string(),
                Some(vanished_reason(&what)),
            ),
            Err(e) => {
                warn!(job_id, error = %e, "Could not verify running job; keeping it active");
                return Ok(false);
            }
        };

        write_terminal(
            self.store.as_ref(),
            &self.metrics,
            existing.id,
            status,
            &external_status,
            error_message.as_deref(),
        )
        .await
        .map_err(|e| Error::persistence("complete_job_if_running", e))?;

        info!(
            job_id,
            record_id = existing.id,
            %status,
            external_status = %external_status,
            "Settled running record left without a monitor"
        );
        Ok(true)
    }

    /// First job of the template the platform reports as in flight.
    ///
    /// The platform listing is per template; `customer_id` only scopes logs.
    /// Advisory: nothing stops a `provision` call racing this check.
    #[instrument(skip(self))]
    pub async fn check_active_job(
        &self,
        customer_id: &str,
        template_name: &str,
    ) -> Result<Option<JobStatusView>> {
        let template_id = self
            .platform
            .resolve_template_id(template_name)
            .await
            .map_err(|e| template_error(template_name, e))?;

        let jobs = self
            .platform
            .list_running_jobs(template_id)
            .await
            .map_err(Error::platform)?;

        let active = jobs
            .into_iter()
            .map(|job| JobStatusView::from_external(job.id, job.status))
            .find(|view| view.status == JobStatus::Running);

        debug!(active = ?active.as_ref().map(|v| v.job_id), "Checked for active job");
        Ok(active)
    }

    /// Live status from the platform, mapped like the monitor maps it.
    #[instrument(skip(self))]
    pub async fn get_job_status(&self, job_id: i64) -> Result<JobStatusView> {
        let job = self.platform.get_job(job_id).await.map_err(|e| match e {
            PlatformError::NotFound(_) => Error::NotFound(NotFound::Job(job_id)),
            other => Error::platform(other),
        })?;
        Ok(JobStatusView::from_external(job.id, job.status))
    }

    /// Local record of a job owned by `customer_id`.
    ///
    /// Jobs of other customers read as not found.
    pub async fn get_job_record(&self, customer_id: &str, job_id: i64) -> Result<ProvisioningJob> {
        let record = self
            .store
            .get_job_by_external_id(job_id)
            .await
            .map_err(|e| Error::persistence("get_job_by_external_id", e))?;
        match record {
            Some(record) if record.customer_id == customer_id => Ok(record),
            _ => Err(Error::NotFound(NotFound::Job(job_id))),
        }
    }

    /// Latest provisioning audit entries of `customer_id`, newest first.
    pub async fn history(&self, customer_id: &str, limit: i64) -> Result<Vec<HistoryRecord>> {
        self.store
            .list_history(
                customer_id,
                Some(AuditResource::ProvisioningJob.as_str()),
                limit,
            )
            .await
            .map_err(|e| Error::persistence("list_history", e))
    }

    /// All job records of a customer, newest first.
    pub async fn list_jobs(&self, customer_id: &str) -> Result<Vec<ProvisioningJob>> {
        self.store
            .list_jobs_by_customer(customer_id)
            .await
            .map_err(|e| Error::persistence("list_jobs_by_customer", e))
    }
}

fn template_error(template_name: &str, err: PlatformError) -> Error {
    match err {
        PlatformError::NotFound(_) => Error::NotFound(NotFound::Template(template_name.to_string())),
        other => Error::platform(other),
    }
}

fn validate_request(request: &ProvisionRequest) -> Result<()> {
    let required = [
        ("template_name", &request.template_name),
        ("instance_name", &request.instance_name),
        ("customer_id", &request.customer_id),
        ("requested_by", &request.requested_by),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(Error::validation(field, "must not be empty"));
        }
    }
    Ok(())
}

/// Request parameters plus tenant context.
fn launch_variables(request: &ProvisionRequest) -> Value {
    let mut vars = request.parameters.clone();
    vars.insert(
        "instance_name".to_string(),
        Value::String(request.instance_name.clone()),
    );
    vars.insert(
        "customer_id".to_string(),
        Value::String(request.customer_id.clone()),
    );
    Value::Object(vars)
}

/// Copy of `value` with secret-looking keys masked, at any depth.
fn redact_secrets(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| {
                    let lower = key.to_lowercase();
                    if SECRET_KEY_MARKERS.iter().any(|m| lower.contains(m)) {
                        (key.clone(), Value::String(REDACTED.to_string()))
                    } else {
                        (key.clone(), redact_secrets(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_secrets).collect()),
        other => other.clone(),
    }
}
