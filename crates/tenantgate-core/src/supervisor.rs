// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Process-wide owner of job monitor tasks.
//!
//! Monitors are not tied to the request that launched them. They run under a
//! root [`CancellationToken`] that is only cancelled by
//! [`MonitorSupervisor::shutdown`], and are tracked by a [`TaskTracker`] so
//! shutdown can wait for them.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::job_monitor::{JobMonitor, MonitorOutcome};

/// Errors from [`MonitorSupervisor::spawn`].
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("monitor supervisor is shutting down")]
    ShuttingDown,
}

/// Handle to one running monitor.
#[derive(Debug)]
pub struct MonitorHandle {
    job_id: i64,
    token: CancellationToken,
    join: JoinHandle<MonitorOutcome>,
}

impl MonitorHandle {
    /// External job id being followed.
    pub fn job_id(&self) -> i64 {
        self.job_id
    }

    /// Ask the monitor to stop at its next poll boundary.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the monitor to end. `None` if the task panicked.
    pub async fn join(self) -> Option<MonitorOutcome> {
        match self.join.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(job_id = self.job_id, error = %e, "Job monitor task failed");
                None
            }
        }
    }
}

/// Spawns and tracks job monitors.
#[derive(Debug, Default)]
pub struct MonitorSupervisor {
    root: CancellationToken,
    tracker: TaskTracker,
}

impl MonitorSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a monitor in the background.
    ///
    /// Fails once [`shutdown`](Self::shutdown) has begun.
    pub fn spawn(&self, monitor: JobMonitor) -> Result<MonitorHandle, SupervisorError> {
        if self.root.is_cancelled() || self.tracker.is_closed() {
            return Err(SupervisorError::ShuttingDown);
        }

        let job_id = monitor.external_job_id();
        let token = self.root.child_token();
        let join = self.tracker.spawn(monitor.run(token.clone()));

        Ok(MonitorHandle {
            job_id,
            token,
            join,
        })
    }

    /// Number of monitors still running.
    pub fn active_count(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Cancel every monitor and wait up to `grace` for them to stop.
    ///
    /// Returns `true` when all monitors ended within the grace period.
    /// Records of jobs still in flight stay `running`.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        let active = self.tracker.len();
        info!(active, "Stopping job monitors");

        self.root.cancel();
        self.tracker.close();

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => {
                info!("All job monitors stopped");
                true
            }
            Err(_) => {
                warn!(
                    remaining = self.tracker.len(),
                    grace_ms = grace.as_millis() as u64,
                    "Job monitors still running after grace period"
                );
                false
            }
        }
    }
}
