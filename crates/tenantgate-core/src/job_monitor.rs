// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Background follower for one launched job.
//!
//! A [`JobMonitor`] polls the platform at a fixed interval until the job
//! reaches a terminal state, then writes that outcome to the record store
//! once. It stops early when:
//! - its cancellation token fires (the record stays running),
//! - the platform reports the job as missing,
//! - `max_consecutive_failures` fetches fail in a row.
//!
//! The last two cases still write a failed record carrying the error, with
//! [`UNKNOWN_EXTERNAL_STATUS`] as external status since no real status was
//! observed.
//!
//! Cancellation is only checked between polls; an in-flight request is
//! never interrupted.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::metrics::GatewayMetrics;
use crate::platform::{JobPlatform, PlatformError};
use crate::status::{JobStatus, UNKNOWN_EXTERNAL_STATUS};
use crate::store::{RecordStore, Result as StoreResult};

/// Configuration for job monitors.
#[derive(Debug, Clone)]
pub struct JobMonitorConfig {
    /// Time between two status fetches.
    pub poll_interval: Duration,
    /// Fetch failures in a row before the job is marked failed.
    pub max_consecutive_failures: u32,
}

impl Default for JobMonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_consecutive_failures: 5,
        }
    }
}

/// How a monitor ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// The platform reported a terminal status.
    Terminal(JobStatus),
    /// The job could not be followed anymore and was marked failed.
    Unreachable { reason: String },
    /// Cancelled before a terminal status was seen.
    Cancelled,
}

/// Follows one job to a terminal state.
pub struct JobMonitor {
    platform: Arc<dyn JobPlatform>,
    store: Arc<dyn RecordStore>,
    metrics: Arc<GatewayMetrics>,
    config: JobMonitorConfig,
    external_job_id: i64,
    record_id: i64,
}

impl JobMonitor {
    /// Create a monitor for `external_job_id`, whose record is `record_id`.
    pub fn new(
        platform: Arc<dyn JobPlatform>,
        store: Arc<dyn RecordStore>,
        metrics: Arc<GatewayMetrics>,
        config: JobMonitorConfig,
        external_job_id: i64,
        record_id: i64,
    ) -> Self {
        Self {
            platform,
            store,
            metrics,
            config,
            external_job_id,
            record_id,
        }
    }

    /// External job id followed by this monitor.
    pub fn external_job_id(&self) -> i64 {
        self.external_job_id
    }

    /// Run until a terminal status, an unrecoverable error, or cancellation.
    pub async fn run(self, cancel: CancellationToken) -> MonitorOutcome {
        let job_id = self.external_job_id;
        debug!(
            job_id,
            record_id = self.record_id,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Job monitor started"
        );

        let mut consecutive_failures: u32 = 0;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!(job_id, "Job monitor cancelled; record left running");
                    self.metrics.monitor_cancelled();
                    return MonitorOutcome::Cancelled;
                }

                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }

            match self.platform.get_job(job_id).await {
                Ok(job) => {
                    consecutive_failures = 0;
                    let Some((status, error_message)) = terminal_outcome(&job.status) else {
                        debug!(job_id, external_status = %job.status, "Job still in progress");
                        continue;
                    };
                    self.finish(status, &job.status, error_message.as_deref())
                        .await;
                    return MonitorOutcome::Terminal(status);
                }
                Err(PlatformError::NotFound(what)) => {
                    let reason = vanished_reason(&what);
                    warn!(job_id, %reason, "Job disappeared from the platform");
                    self.finish(JobStatus::Failed, UNKNOWN_EXTERNAL_STATUS, Some(&reason))
                        .await;
                    return MonitorOutcome::Unreachable { reason };
                }
                Err(e) => {
                    consecutive_failures += 1;
                    self.metrics.monitor_poll_error();
                    warn!(
                        job_id,
                        attempt = consecutive_failures,
                        max = self.config.max_consecutive_failures,
                        error = %e,
                        "Failed to fetch job status"
                    );

                    if consecutive_failures >= self.config.max_consecutive_failures {
                        let reason = format!(
                            "job status unavailable after {} attempts: {}",
                            consecutive_failures, e
                        );
                        self.finish(JobStatus::Failed, UNKNOWN_EXTERNAL_STATUS, Some(&reason))
                            .await;
                        return MonitorOutcome::Unreachable { reason };
                    }
                }
            }
        }
    }

    /// Write the terminal outcome. Errors are logged, not returned.
    async fn finish(&self, status: JobStatus, external_status: &str, error_message: Option<&str>) {
        match write_terminal(
            self.store.as_ref(),
            &self.metrics,
            self.record_id,
            status,
            external_status,
            error_message,
        )
        .await
        {
            Ok(true) => info!(
                job_id = self.external_job_id,
                record_id = self.record_id,
                %status,
                external_status,
                "Job reached terminal state"
            ),
            Ok(false) => warn!(
                job_id = self.external_job_id,
                record_id = self.record_id,
                %status,
                "Job record was not running; terminal status not overwritten"
            ),
            Err(e) => error!(
                job_id = self.external_job_id,
                record_id = self.record_id,
                %status,
                error = %e,
                "Failed to record terminal job status"
            ),
        }
    }
}

/// Status and error message to record for a raw platform status.
///
/// `None` while the job is still in flight.
pub(crate) fn terminal_outcome(external_status: &str) -> Option<(JobStatus, Option<String>)> {
    let status = JobStatus::from_external(external_status);
    if !status.is_terminal() {
        return None;
    }
    let error_message = (status == JobStatus::Failed)
        .then(|| format!("job finished with status '{}'", external_status));
    Some((status, error_message))
}

pub(crate) fn vanished_reason(what: &str) -> String {
    format!("job no longer exists on the platform ({})", what)
}

/// Move a running record to `status`, counting only writes that happened.
pub(crate) async fn write_terminal(
    store: &dyn RecordStore,
    metrics: &GatewayMetrics,
    record_id: i64,
    status: JobStatus,
    external_status: &str,
    error_message: Option<&str>,
) -> StoreResult<bool> {
    let written = store
        .complete_job_if_running(record_id, status, external_status, error_message)
        .await?;
    if written {
        match status {
            JobStatus::Completed => metrics.job_completed(),
            _ => metrics.job_failed(),
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MockPlatform;
    use crate::store::{NewProvisioningJob, SqliteRecordStore};
    use serde_json::json;

    struct Fixture {
        platform: Arc<MockPlatform>,
        store: Arc<SqliteRecordStore>,
        metrics: Arc<GatewayMetrics>,
        record_id: i64,
    }

    async fn fixture(external_job_id: i64, status: &str) -> Fixture {
        let platform = Arc::new(MockPlatform::new());
        platform.insert_job(42, external_job_id, status).await;
        let store = Arc::new(SqliteRecordStore::in_memory().await.unwrap());
        let record = store
            .insert_job(&NewProvisioningJob {
                external_job_id,
                template_id: 42,
                template_name: "dbaas-create".to_string(),
                instance_name: "pg1".to_string(),
                customer_id: "cust-1".to_string(),
                created_by: "alice".to_string(),
                launch_params: json!({}),
            })
            .await
            .unwrap();
        Fixture {
            platform,
            store,
            metrics: Arc::new(GatewayMetrics::new()),
            record_id: record.id,
        }
    }

    fn monitor(f: &Fixture, external_job_id: i64, max_failures: u32) -> JobMonitor {
        JobMonitor::new(
            f.platform.clone(),
            f.store.clone(),
            f.metrics.clone(),
            JobMonitorConfig {
                poll_interval: Duration::from_millis(5),
                max_consecutive_failures: max_failures,
            },
            external_job_id,
            f.record_id,
        )
    }

    #[tokio::test]
    async fn test_successful_job_completes_record() {
        let f = fixture(777, "successful").await;

        let outcome = monitor(&f, 777, 3).run(CancellationToken::new()).await;
        assert_eq!(outcome, MonitorOutcome::Terminal(JobStatus::Completed));

        let record = f.store.get_job(f.record_id).await.unwrap().unwrap();
        assert_eq!(record.job_status(), JobStatus::Completed);
        assert_eq!(record.external_status, "successful");
        assert!(record.error_message.is_none());
        assert_eq!(f.metrics.snapshot().jobs_completed, 1);
    }

    #[tokio::test]
    async fn test_failed_states_fail_record() {
        for external in ["failed", "error", "canceled"] {
            let f = fixture(10, external).await;
            let outcome = monitor(&f, 10, 3).run(CancellationToken::new()).await;
            assert_eq!(outcome, MonitorOutcome::Terminal(JobStatus::Failed));

            let record = f.store.get_job(f.record_id).await.unwrap().unwrap();
            assert_eq!(record.job_status(), JobStatus::Failed);
            assert_eq!(record.external_status, external);
            assert!(record.error_message.unwrap().contains(external));
        }
    }

    #[tokio::test]
    async fn test_polls_until_terminal() {
        let f = fixture(5, "pending").await;
        let platform = f.platform.clone();
        let handle = tokio::spawn(monitor(&f, 5, 3).run(CancellationToken::new()));

        tokio::time::sleep(Duration::from_millis(30)).await;
        let record = f.store.get_job(f.record_id).await.unwrap().unwrap();
        assert_eq!(record.job_status(), JobStatus::Running);

        platform.set_job_status(5, "successful").await;
        let outcome = handle.await.unwrap();
        assert_eq!(outcome, MonitorOutcome::Terminal(JobStatus::Completed));
        assert!(platform.get_count() >= 2);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let f = fixture(6, "successful").await;
        f.platform.fail_next_gets(2).await;

        let outcome = monitor(&f, 6, 3).run(CancellationToken::new()).await;
        assert_eq!(outcome, MonitorOutcome::Terminal(JobStatus::Completed));
        assert_eq!(f.metrics.snapshot().monitor_poll_errors, 2);
    }

    #[tokio::test]
    async fn test_persistent_errors_mark_record_failed() {
        let f = fixture(7, "running").await;
        f.platform
            .set_get_error(Some(PlatformError::Unavailable("connection refused".into())))
            .await;

        let outcome = monitor(&f, 7, 3).run(CancellationToken::new()).await;
        assert!(matches!(outcome, MonitorOutcome::Unreachable { .. }));
        assert_eq!(f.platform.get_count(), 3);

        let record = f.store.get_job(f.record_id).await.unwrap().unwrap();
        assert_eq!(record.job_status(), JobStatus::Failed);
        assert_eq!(record.external_status, UNKNOWN_EXTERNAL_STATUS);
        let message = record.error_message.unwrap();
        assert!(message.contains("after 3 attempts"), "{message}");
        assert!(message.contains("connection refused"), "{message}");
    }

    #[tokio::test]
    async fn test_missing_job_marks_record_failed() {
        let f = fixture(8, "running").await;
        f.platform.remove_job(8).await;

        let outcome = monitor(&f, 8, 5).run(CancellationToken::new()).await;
        assert!(matches!(outcome, MonitorOutcome::Unreachable { .. }));
        assert_eq!(f.platform.get_count(), 1);

        let record = f.store.get_job(f.record_id).await.unwrap().unwrap();
        assert_eq!(record.job_status(), JobStatus::Failed);
        assert_eq!(record.external_status, UNKNOWN_EXTERNAL_STATUS);
    }

    #[tokio::test]
    async fn test_cancellation_leaves_record_running() {
        let f = fixture(9, "running").await;
        let token = CancellationToken::new();
        let handle = tokio::spawn(monitor(&f, 9, 3).run(token.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        assert_eq!(handle.await.unwrap(), MonitorOutcome::Cancelled);

        let record = f.store.get_job(f.record_id).await.unwrap().unwrap();
        assert_eq!(record.job_status(), JobStatus::Running);
        assert_eq!(f.metrics.snapshot().monitors_cancelled, 1);
    }

    #[tokio::test]
    async fn test_terminal_record_is_not_overwritten() {
        let f = fixture(11, "failed").await;
        f.store
            .complete_job_if_running(f.record_id, JobStatus::Completed, "successful", None)
            .await
            .unwrap();

        monitor(&f, 11, 3).run(CancellationToken::new()).await;

        let record = f.store.get_job(f.record_id).await.unwrap().unwrap();
        assert_eq!(record.job_status(), JobStatus::Completed);

        let snapshot = f.metrics.snapshot();
        assert_eq!(snapshot.jobs_failed, 0);
        assert_eq!(snapshot.jobs_completed, 0);
    }

    #[test]
    fn test_terminal_outcome() {
        assert_eq!(terminal_outcome("running"), None);
        assert_eq!(terminal_outcome("pending"), None);
        assert_eq!(
            terminal_outcome("successful"),
            Some((JobStatus::Completed, None))
        );
        let (status, message) = terminal_outcome("canceled").unwrap();
        assert_eq!(status, JobStatus::Failed);
        assert_eq!(message.as_deref(), Some("job finished with status 'canceled'"));
    }
}
