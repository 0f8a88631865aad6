// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gateway counters.
//!
//! A [`GatewayMetrics`] is created by the runtime and handed to each service
//! as `Arc<GatewayMetrics>`; there is no process-global registry. Exporters
//! read a [`MetricsSnapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic counters for provisioning, monitoring and namespace operations.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    jobs_launched: AtomicU64,
    launch_failures: AtomicU64,
    launch_conflicts: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    monitor_poll_errors: AtomicU64,
    monitors_cancelled: AtomicU64,
    namespaces_created: AtomicU64,
    namespaces_deleted: AtomicU64,
    namespace_failures: AtomicU64,
    partial_failures: AtomicU64,
    audit_write_failures: AtomicU64,
}

/// Point-in-time copy of [`GatewayMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub jobs_launched: u64,
    pub launch_failures: u64,
    pub launch_conflicts: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub monitor_poll_errors: u64,
    pub monitors_cancelled: u64,
    pub namespaces_created: u64,
    pub namespaces_deleted: u64,
    pub namespace_failures: u64,
    pub partial_failures: u64,
    pub audit_write_failures: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_launched(&self) {
        bump(&self.jobs_launched);
    }

    pub fn launch_failed(&self) {
        bump(&self.launch_failures);
    }

    pub fn launch_conflict(&self) {
        bump(&self.launch_conflicts);
    }

    pub fn job_completed(&self) {
        bump(&self.jobs_completed);
    }

    pub fn job_failed(&self) {
        bump(&self.jobs_failed);
    }

    pub fn monitor_poll_error(&self) {
        bump(&self.monitor_poll_errors);
    }

    pub fn monitor_cancelled(&self) {
        bump(&self.monitors_cancelled);
    }

    pub fn namespace_created(&self) {
        bump(&self.namespaces_created);
    }

    pub fn namespace_deleted(&self) {
        bump(&self.namespaces_deleted);
    }

    pub fn namespace_failed(&self) {
        bump(&self.namespace_failures);
    }

    /// A two-system operation left one system updated and the other not.
    pub fn partial_failure(&self) {
        bump(&self.partial_failures);
    }

    pub fn audit_write_failed(&self) {
        bump(&self.audit_write_failures);
    }

    /// Read all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            jobs_launched: load(&self.jobs_launched),
            launch_failures: load(&self.launch_failures),
            launch_conflicts: load(&self.launch_conflicts),
            jobs_completed: load(&self.jobs_completed),
            jobs_failed: load(&self.jobs_failed),
            monitor_poll_errors: load(&self.monitor_poll_errors),
            monitors_cancelled: load(&self.monitors_cancelled),
            namespaces_created: load(&self.namespaces_created),
            namespaces_deleted: load(&self.namespaces_deleted),
            namespace_failures: load(&self.namespace_failures),
            partial_failures: load(&self.partial_failures),
            audit_write_failures: load(&self.audit_write_failures),
        }
    }
}
