// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tenantgate Core - Self-Service Gateway
//!
//! Lets tenants provision resources through automation platform jobs and
//! manage their own cluster namespaces, while keeping a local record of what
//! each tenant owns and an audit trail of every attempt.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                  request layer (not included)                  │
//! └───────────────────────────────────────────────────────────────┘
//!                 │                                 │
//!                 ▼                                 ▼
//! ┌───────────────────────────┐     ┌───────────────────────────┐
//! │    ProvisioningService    │     │     NamespaceService      │
//! │  launch guard, launch,    │     │  ownership checks, create │
//! │  record, spawn monitor    │     │  delete, orphan handling  │
//! └───────────────────────────┘     └───────────────────────────┘
//!       │            │                    │             │
//!       │            ▼                    │             │
//!       │   ┌──────────────────┐          │             │
//!       │   │ MonitorSupervisor│          │             │
//!       │   │  JobMonitor x N  │          │             │
//!       │   └──────────────────┘          │             │
//!       ▼            │                    ▼             │
//! ┌────────────┐     │             ┌────────────┐       │
//! │ JobPlatform│◄────┘             │ ClusterApi │       │
//! │   (AWX)    │                   │   (k8s)    │       │
//! └────────────┘                   └────────────┘       │
//!                                                       ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │          RecordStore (PostgreSQL, or SQLite embedded)          │
//! │            provisioning_jobs · namespaces · history            │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Operations
//!
//! | Operation | Errors |
//! |-----------|--------|
//! | [`ProvisioningService::provision`] | `TEMPLATE_NOT_FOUND`, `ACTIVE_JOB_EXISTS`, `LAUNCH_FAILED`, `LAUNCHED_UNRECORDED` |
//! | [`ProvisioningService::get_job_status`] | `JOB_NOT_FOUND` |
//! | [`ProvisioningService::check_active_job`] | `TEMPLATE_NOT_FOUND` |
//! | [`NamespaceService::create`] | `NAMESPACE_EXISTS_IN_CLUSTER`, `NAMESPACE_EXISTS_IN_STORE`, `CLUSTER_ORPHAN` |
//! | [`NamespaceService::delete`] | `NAMESPACE_NOT_FOUND`, `RECORD_ORPHAN` |
//! | [`NamespaceService::list_by_customer`] | `PERSISTENCE_ERROR` |
//!
//! Any operation may also fail with `VALIDATION_ERROR`,
//! `EXTERNAL_SYSTEM_ERROR` or `PERSISTENCE_ERROR`. Codes come from
//! [`Error::error_code`].
//!
//! # Configuration
//!
//! See [`config::Config::from_env`] for the environment variables read by
//! the `tenantgate` binary.
//!
//! [`ProvisioningService::provision`]: provisioning::ProvisioningService::provision
//! [`ProvisioningService::get_job_status`]: provisioning::ProvisioningService::get_job_status
//! [`ProvisioningService::check_active_job`]: provisioning::ProvisioningService::check_active_job
//! [`NamespaceService::create`]: namespaces::NamespaceService::create
//! [`NamespaceService::delete`]: namespaces::NamespaceService::delete
//! [`NamespaceService::list_by_customer`]: namespaces::NamespaceService::list_by_customer

pub mod audit;
pub mod cluster;
pub mod config;
pub mod error;
pub mod job_monitor;
pub mod metrics;
pub mod migrations;
pub mod namespaces;
pub mod platform;
pub mod provisioning;
pub mod runtime;
pub mod status;
pub mod store;
pub mod supervisor;

pub use error::{Error, ErrorKind, Result};
pub use metrics::{GatewayMetrics, MetricsSnapshot};
pub use namespaces::NamespaceService;
pub use provisioning::{ProvisionRequest, ProvisionResponse, ProvisioningService};
pub use runtime::GatewayRuntime;
pub use status::{JobStatus, JobStatusView};
