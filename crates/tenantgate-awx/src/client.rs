// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! AwxClient for interacting with the automation platform.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::{AwxAuth, AwxConfig};
use crate::error::{AwxError, Result};
use crate::types::{ACTIVE_JOB_STATES, Job, JobLaunchRequest, JobLaunchResponse, JobTemplate, Page};

/// Upper bound on pages followed for one collection listing.
const MAX_PAGES: u32 = 50;

/// Typed client for the AWX REST API.
///
/// The client holds a pooled `reqwest::Client` and no per-request state, so a
/// single instance can be shared across tasks (`Arc<AwxClient>`).
#[derive(Debug, Clone)]
pub struct AwxClient {
    http: reqwest::Client,
    config: AwxConfig,
}

impl AwxClient {
    /// Create a new client with the given configuration.
    pub fn new(config: AwxConfig) -> Result<Self> {
        if config.insecure {
            warn!(api_root = %config.api_root, "TLS verification disabled for AWX client");
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| AwxError::Config(format!("failed to build HTTP client: {}", e)))?;

        info!(
            api_root = %config.api_root,
            auth = config.auth.method(),
            "Initialized AWX client"
        );

        Ok(Self { http, config })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(AwxConfig::from_env()?)
    }

    /// Get the client configuration.
    pub fn config(&self) -> &AwxConfig {
        &self.config
    }

    /// Check connectivity with the platform.
    #[instrument(skip(self))]
    pub async fn ping(&self) -> Result<()> {
        let resp = self.send(self.request(Method::GET, "/ping/")).await?;
        debug!(status = resp.status().as_u16(), "AWX ping successful");
        Ok(())
    }

    /// Resolve a job template id from its exact name.
    ///
    /// Returns [`AwxError::NotFound`] when no template carries that name.
    #[instrument(skip(self))]
    pub async fn resolve_template_id(&self, name: &str) -> Result<i64> {
        let templates: Vec<JobTemplate> = self
            .list_all("/job_templates/", &[("name", name.to_string())])
            .await?;

        match templates.into_iter().find(|t| t.name == name) {
            Some(template) => {
                debug!(template_id = template.id, "Resolved job template");
                Ok(template.id)
            }
            None => {
                warn!(template_name = %name, "Job template not found");
                Err(AwxError::NotFound(format!("job template '{}'", name)))
            }
        }
    }

    /// Launch a job template with extra variables and return the new job id.
    ///
    /// Never retried: a launch that timed out may still have created a job.
    #[instrument(skip(self, extra_vars))]
    pub async fn launch_job(&self, template_id: i64, extra_vars: Value) -> Result<i64> {
        let endpoint = format!("/job_templates/{}/launch/", template_id);
        let body = JobLaunchRequest {
            extra_vars: match extra_vars {
                Value::Null => None,
                other => Some(other),
            },
        };

        let resp = self
            .send(self.request(Method::POST, &endpoint).json(&body))
            .await?;
        let launch: JobLaunchResponse = decode(resp).await?;

        info!(template_id, job_id = launch.job, "Launched AWX job");
        Ok(launch.job)
    }

    /// Fetch one job. The raw platform status is returned unmapped.
    #[instrument(skip(self))]
    pub async fn get_job(&self, job_id: i64) -> Result<Job> {
        let endpoint = format!("/jobs/{}/", job_id);
        let resp = self
            .send(self.request(Method::GET, &endpoint))
            .await
            .map_err(|e| match e {
                AwxError::NotFound(_) => AwxError::NotFound(format!("job {}", job_id)),
                other => other,
            })?;
        decode(resp).await
    }

    /// List jobs of a template that are pending, waiting or running.
    #[instrument(skip(self))]
    pub async fn list_running_jobs(&self, template_id: i64) -> Result<Vec<Job>> {
        let jobs: Vec<Job> = self
            .list_all(
                "/jobs/",
                &[
                    ("job_template", template_id.to_string()),
                    ("status__in", ACTIVE_JOB_STATES.join(",")),
                ],
            )
            .await?;

        // The filter is applied server-side; re-check in case it was ignored.
        Ok(jobs.into_iter().filter(Job::is_active).collect())
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.api_root, endpoint);
        debug!(%method, %url, "Making AWX API request");

        let builder = self
            .http
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");

        match &self.config.auth {
            AwxAuth::Basic { username, password } => builder.basic_auth(username, Some(password)),
            AwxAuth::Token(token) => {
                builder.header(reqwest::header::AUTHORIZATION, format!("Token {}", token))
            }
            AwxAuth::Bearer(token) => builder.bearer_auth(token),
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response> {
        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AwxError::Timeout(self.config.request_timeout.as_millis() as u64)
            } else {
                AwxError::Transport(e.to_string())
            }
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let path = resp.url().path().to_string();
        let body = resp.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Err(AwxError::NotFound(path));
        }
        Err(AwxError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Fetch every page of a collection endpoint.
    async fn list_all<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();

        for page in 1..=MAX_PAGES {
            let builder = self
                .request(Method::GET, endpoint)
                .query(query)
                .query(&[("page", page.to_string())]);
            let body: Page<T> = decode(self.send(builder).await?).await?;
            items.extend(body.results);

            if body.next.is_none() {
                return Ok(items);
            }
        }

        warn!(endpoint, max_pages = MAX_PAGES, "Stopped following AWX pagination");
        Ok(items)
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| AwxError::Transport(format!("failed to read response body: {}", e)))?;
    Ok(serde_json::from_slice(&bytes)?)
}
