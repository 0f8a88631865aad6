// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Internal job status and the mapping from platform-reported states.
//!
//! ```text
//!            launch
//!              │
//!              ▼
//!         ┌─────────┐   successful    ┌───────────┐
//!         │ RUNNING │────────────────►│ COMPLETED │
//!         └────┬────┘                 └───────────┘
//!              │ failed | error | canceled
//!              │ (or platform unreachable)
//!              ▼
//!         ┌────────┐
//!         │ FAILED │
//!         └────────┘
//! ```
//!
//! Terminal states are final; the store refuses transitions out of them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// External status written when the platform could not be asked.
pub const UNKNOWN_EXTERNAL_STATUS: &str = "unknown";

/// Internal lifecycle status of a provisioning job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Launched and not yet observed in a terminal state.
    Running,
    /// The platform reported success.
    Completed,
    /// The platform reported failure, or the job became unreachable.
    Failed,
}

impl JobStatus {
    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether no further transition is allowed.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }

    /// Map a raw platform status onto the internal lifecycle.
    ///
    /// `successful` completes, `failed`, `error` and `canceled` fail, and any
    /// other value (including ones this table has never seen) keeps the job
    /// running.
    pub fn from_external(external: &str) -> Self {
        match external {
            "successful" => JobStatus::Completed,
            "failed" | "error" | "canceled" => JobStatus::Failed,
            _ => JobStatus::Running,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// Live view of a job: the mapped status plus the raw platform value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatusView {
    /// External (platform) job id.
    pub job_id: i64,
    /// Mapped internal status.
    pub status: JobStatus,
    /// Raw status as reported by the platform.
    pub external_status: String,
}

impl JobStatusView {
    /// Build a view from a raw platform status.
    pub fn from_external(job_id: i64, external_status: impl Into<String>) -> Self {
        let external_status = external_status.into();
        Self {
            job_id,
            status: JobStatus::from_external(&external_status),
            external_status,
        }
    }
}
