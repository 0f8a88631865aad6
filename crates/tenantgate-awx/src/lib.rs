// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tenantgate AWX client
//!
//! Typed async client for an AWX-compatible automation platform.
//!
//! The gateway only needs a small slice of the AWX REST API:
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | [`AwxClient::resolve_template_id`] | `GET /api/v2/job_templates/?name=...` |
//! | [`AwxClient::launch_job`] | `POST /api/v2/job_templates/{id}/launch/` |
//! | [`AwxClient::get_job`] | `GET /api/v2/jobs/{id}/` |
//! | [`AwxClient::list_running_jobs`] | `GET /api/v2/jobs/?job_template={id}&status__in=pending,waiting,running` |
//! | [`AwxClient::ping`] | `GET /api/v2/ping/` |
//!
//! Reads are idempotent and safe to retry at the call site. A launch is not:
//! the client never retries it on its own.
//!
//! # Example
//!
//! ```no_run
//! use tenantgate_awx::{AwxAuth, AwxClient, AwxConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AwxConfig::new("https://awx.example.com", AwxAuth::Token("secret".into()))?;
//! let client = AwxClient::new(config)?;
//!
//! let template_id = client.resolve_template_id("dbaas-create").await?;
//! let job_id = client
//!     .launch_job(template_id, serde_json::json!({"instance_name": "pg1"}))
//!     .await?;
//! let job = client.get_job(job_id).await?;
//! println!("job {} is {}", job.id, job.status);
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod types;

pub use client::AwxClient;
pub use config::{AwxAuth, AwxConfig};
pub use error::{AwxError, Result};
pub use types::{ACTIVE_JOB_STATES, Job, JobLaunchRequest, JobLaunchResponse, JobTemplate, Page};
