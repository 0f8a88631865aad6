// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Automation platform port.
//!
//! [`JobPlatform`] is the narrow surface the services need from the
//! automation platform. [`tenantgate_awx::AwxClient`] implements it in
//! [`awx`]; [`MockPlatform`] is an in-memory double for tests.

mod awx;
pub mod mock;

pub use mock::MockPlatform;

use async_trait::async_trait;
use serde_json::Value;

/// A job as seen by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformJob {
    /// External job id.
    pub id: i64,
    /// Raw platform status, unmapped.
    pub status: String,
}

/// Errors reported by a [`JobPlatform`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlatformError {
    /// The template or job does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// No response was received (connection failure, timeout).
    #[error("platform unavailable: {0}")]
    Unavailable(String),

    /// The platform answered with an error status.
    #[error("platform rejected request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Bad configuration or an unexpected response shape.
    #[error("invalid platform interaction: {0}")]
    Invalid(String),
}

impl PlatformError {
    /// Whether the platform reported the resource as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PlatformError::NotFound(_))
    }
}

/// Operations on the automation platform.
///
/// Reads are idempotent. [`launch_job`](Self::launch_job) is not and callers
/// must never retry it automatically.
#[async_trait]
pub trait JobPlatform: Send + Sync {
    /// Resolve a template id from its exact name.
    async fn resolve_template_id(&self, name: &str) -> Result<i64, PlatformError>;

    /// Launch a template and return the external job id.
    async fn launch_job(&self, template_id: i64, variables: Value) -> Result<i64, PlatformError>;

    /// Fetch the current raw status of a job.
    async fn get_job(&self, job_id: i64) -> Result<PlatformJob, PlatformError>;

    /// Jobs of a template in pending, waiting or running state.
    async fn list_running_jobs(&self, template_id: i64) -> Result<Vec<PlatformJob>, PlatformError>;
}
