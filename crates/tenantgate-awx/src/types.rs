// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wire types for the AWX REST API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// External job states that count as "still in flight".
pub const ACTIVE_JOB_STATES: [&str; 3] = ["pending", "waiting", "running"];

/// Paginated list envelope used by every AWX collection endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    /// Total number of matching items across all pages.
    #[serde(default)]
    pub count: u64,
    /// URL of the next page, if any.
    #[serde(default)]
    pub next: Option<String>,
    /// Items on this page.
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// A job template.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobTemplate {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub url: String,
}

/// A job (one execution of a template).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Job {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// Raw platform status (`new`, `pending`, `waiting`, `running`,
    /// `successful`, `failed`, `error`, `canceled`).
    pub status: String,
    #[serde(default)]
    pub url: String,
}

impl Job {
    /// Whether the platform still considers this job in flight.
    pub fn is_active(&self) -> bool {
        ACTIVE_JOB_STATES.contains(&self.status.as_str())
    }
}

/// Body of a template launch request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobLaunchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_vars: Option<Value>,
}

/// Response of a template launch.
#[derive(Debug, Clone, Deserialize)]
pub struct JobLaunchResponse {
    /// External id of the launched job.
    pub job: i64,
    #[serde(default)]
    pub ignored_fields: Option<Value>,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}
