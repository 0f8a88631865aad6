// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! [`JobPlatform`] adapter for the AWX client.

use async_trait::async_trait;
use serde_json::Value;
use tenantgate_awx::{AwxClient, AwxError, Job};

use super::{JobPlatform, PlatformError, PlatformJob};

impl From<AwxError> for PlatformError {
    fn from(err: AwxError) -> Self {
        match err {
            AwxError::NotFound(what) => PlatformError::NotFound(what),
            AwxError::Transport(msg) => PlatformError::Unavailable(msg),
            AwxError::Timeout(ms) => {
                PlatformError::Unavailable(format!("request timed out after {}ms", ms))
            }
            AwxError::Status { status, body } => PlatformError::Rejected {
                status,
                message: body,
            },
            AwxError::Config(msg) | AwxError::Decode(msg) => PlatformError::Invalid(msg),
        }
    }
}

impl From<Job> for PlatformJob {
    fn from(job: Job) -> Self {
        PlatformJob {
            id: job.id,
            status: job.status,
        }
    }
}

#[async_trait]
impl JobPlatform for AwxClient {
    async fn resolve_template_id(&self, name: &str) -> Result<i64, PlatformError> {
        Ok(AwxClient::resolve_template_id(self, name).await?)
    }

    async fn launch_job(&self, template_id: i64, variables: Value) -> Result<i64, PlatformError> {
        Ok(AwxClient::launch_job(self, template_id, variables).await?)
    }

    async fn get_job(&self, job_id: i64) -> Result<PlatformJob, PlatformError> {
        Ok(AwxClient::get_job(self, job_id).await?.into())
    }

    async fn list_running_jobs(&self, template_id: i64) -> Result<Vec<PlatformJob>, PlatformError> {
        let jobs = AwxClient::list_running_jobs(self, template_id).await?;
        Ok(jobs.into_iter().map(PlatformJob::from).collect())
    }
}
