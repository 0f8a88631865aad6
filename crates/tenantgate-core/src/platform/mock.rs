// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock automation platform for testing.
//!
//! Keeps templates and jobs in memory. Launched jobs start as `pending`;
//! tests drive them forward with [`MockPlatform::set_job_status`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{JobPlatform, PlatformError, PlatformJob};

#[derive(Debug, Clone)]
struct MockJob {
    template_id: i64,
    status: String,
}

#[derive(Debug, Default)]
struct MockState {
    templates: HashMap<String, i64>,
    jobs: HashMap<i64, MockJob>,
    launched: Vec<(i64, Value)>,
    launch_error: Option<PlatformError>,
    get_error: Option<PlatformError>,
    transient_get_failures: u32,
}

/// In-memory [`JobPlatform`].
#[derive(Debug)]
pub struct MockPlatform {
    state: Mutex<MockState>,
    next_job_id: AtomicI64,
    launch_calls: AtomicUsize,
    get_calls: AtomicUsize,
    /// Delay applied inside every launch, to widen race windows.
    pub launch_delay: Duration,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    /// Create an empty platform. Job ids start at 1.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            next_job_id: AtomicI64::new(1),
            launch_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            launch_delay: Duration::ZERO,
        }
    }

    /// Register a template.
    pub fn with_template(mut self, name: &str, id: i64) -> Self {
        self.state.get_mut().templates.insert(name.to_string(), id);
        self
    }

    /// Set the id handed to the next launched job.
    pub fn with_next_job_id(self, id: i64) -> Self {
        self.next_job_id.store(id, Ordering::SeqCst);
        self
    }

    /// Make every launch wait for `delay` before answering.
    pub fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = delay;
        self
    }

    /// Make every launch fail with `err`.
    pub fn with_launch_error(mut self, err: PlatformError) -> Self {
        self.state.get_mut().launch_error = Some(err);
        self
    }

    /// Add a job that already exists on the platform.
    pub async fn insert_job(&self, template_id: i64, job_id: i64, status: &str) {
        self.state.lock().await.jobs.insert(
            job_id,
            MockJob {
                template_id,
                status: status.to_string(),
            },
        );
    }

    /// Change the status of a job.
    pub async fn set_job_status(&self, job_id: i64, status: &str) {
        if let Some(job) = self.state.lock().await.jobs.get_mut(&job_id) {
            job.status = status.to_string();
        }
    }

    /// Forget a job, so fetching it reports NotFound.
    pub async fn remove_job(&self, job_id: i64) {
        self.state.lock().await.jobs.remove(&job_id);
    }

    /// Fail the next `count` job fetches with [`PlatformError::Unavailable`].
    pub async fn fail_next_gets(&self, count: u32) {
        self.state.lock().await.transient_get_failures = count;
    }

    /// Fail every job fetch with `err` until cleared with `None`.
    pub async fn set_get_error(&self, err: Option<PlatformError>) {
        self.state.lock().await.get_error = err;
    }

    /// Number of launch calls received.
    pub fn launch_count(&self) -> usize {
        self.launch_calls.load(Ordering::SeqCst)
    }

    /// Number of job fetches received.
    pub fn get_count(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Variables of every successful launch, in order.
    pub async fn launched_variables(&self) -> Vec<Value> {
        self.state
            .lock()
            .await
            .launched
            .iter()
            .map(|(_, vars)| vars.clone())
            .collect()
    }
}

#[async_trait]
impl JobPlatform for MockPlatform {
    async fn resolve_template_id(&self, name: &str) -> Result<i64, PlatformError> {
        self.state
            .lock()
            .await
            .templates
            .get(name)
            .copied()
            .ok_or_else(|| PlatformError::NotFound(format!("job template '{}'", name)))
    }

    async fn launch_job(&self, template_id: i64, variables: Value) -> Result<i64, PlatformError> {
        self.launch_calls.fetch_add(1, Ordering::SeqCst);

        if !self.launch_delay.is_zero() {
            tokio::time::sleep(self.launch_delay).await;
        }

        let mut state = self.state.lock().await;
        if let Some(err) = &state.launch_error {
            return Err(err.clone());
        }

        let job_id = self.next_job_id.fetch_add(1, Ordering::SeqCst);
        state.jobs.insert(
            job_id,
            MockJob {
                template_id,
                status: "pending".to_string(),
            },
        );
        state.launched.push((template_id, variables));
        Ok(job_id)
    }

    async fn get_job(&self, job_id: i64) -> Result<PlatformJob, PlatformError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock().await;
        if let Some(err) = &state.get_error {
            return Err(err.clone());
        }
        if state.transient_get_failures > 0 {
            state.transient_get_failures -= 1;
            return Err(PlatformError::Unavailable("connection reset".to_string()));
        }

        state
            .jobs
            .get(&job_id)
            .map(|job| PlatformJob {
                id: job_id,
                status: job.status.clone(),
            })
            .ok_or_else(|| PlatformError::NotFound(format!("job {}", job_id)))
    }

    async fn list_running_jobs(&self, template_id: i64) -> Result<Vec<PlatformJob>, PlatformError> {
        let state = self.state.lock().await;
        let mut jobs: Vec<PlatformJob> = state
            .jobs
            .iter()
            .filter(|(_, job)| job.template_id == template_id)
            .filter(|(_, job)| tenantgate_awx::ACTIVE_JOB_STATES.contains(&job.status.as_str()))
            .map(|(id, job)| PlatformJob {
                id: *id,
                status: job.status.clone(),
            })
            .collect();
        jobs.sort_by_key(|job| job.id);
        Ok(jobs)
    }
}
