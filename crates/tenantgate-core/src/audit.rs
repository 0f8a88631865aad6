// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Append-only audit log.
//!
//! Writes are best-effort: a failed history insert is logged and counted but
//! never changes the outcome of the operation being audited.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Error;
use crate::metrics::GatewayMetrics;
use crate::store::{NewHistoryRecord, RecordStore};

/// Kind of resource an entry is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditResource {
    Namespace,
    ProvisioningJob,
}

impl AuditResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditResource::Namespace => "namespace",
            AuditResource::ProvisioningJob => "provisioning_job",
        }
    }
}

/// Audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Create,
    Delete,
    Get,
    List,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Delete => "delete",
            AuditAction::Get => "get",
            AuditAction::List => "list",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    Success,
    Error,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Error => "error",
        }
    }
}

/// One entry, built by the services before handing it to [`AuditLog`].
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub resource: AuditResource,
    pub action: AuditAction,
    pub customer_id: String,
    pub target: String,
    pub actor: String,
    pub details: String,
    pub error_message: Option<String>,
}

impl AuditEntry {
    pub fn new(
        resource: AuditResource,
        action: AuditAction,
        customer_id: impl Into<String>,
        target: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            resource,
            action,
            customer_id: customer_id.into(),
            target: target.into(),
            actor: actor.into(),
            details: String::new(),
            error_message: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    /// Mark the entry failed. The error code is appended to the details.
    pub fn with_error(mut self, err: &Error) -> Self {
        self.details = if self.details.is_empty() {
            format!("[{}]", err.error_code())
        } else {
            format!("{} [{}]", self.details, err.error_code())
        };
        self.error_message = Some(err.to_string());
        self
    }

    pub fn outcome(&self) -> AuditOutcome {
        if self.error_message.is_some() {
            AuditOutcome::Error
        } else {
            AuditOutcome::Success
        }
    }

    fn into_record(self) -> NewHistoryRecord {
        NewHistoryRecord {
            outcome: self.outcome().as_str().to_string(),
            customer_id: self.customer_id,
            resource: self.resource.as_str().to_string(),
            action: self.action.as_str().to_string(),
            target: self.target,
            actor: self.actor,
            details: self.details,
            error_message: self.error_message,
        }
    }
}

/// Best-effort recorder of action outcomes.
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn RecordStore>,
    metrics: Arc<GatewayMetrics>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn RecordStore>, metrics: Arc<GatewayMetrics>) -> Self {
        Self { store, metrics }
    }

    /// Append an entry. Never fails.
    pub async fn record(&self, entry: AuditEntry) {
        let resource = entry.resource.as_str();
        let action = entry.action;
        let target = entry.target.clone();
        let customer_id = entry.customer_id.clone();
        let outcome = entry.outcome();

        match self.store.append_history(&entry.into_record()).await {
            Ok(()) => debug!(
                resource,
                %action,
                target = %target,
                customer_id = %customer_id,
                outcome = outcome.as_str(),
                "Audit entry recorded"
            ),
            Err(e) => {
                self.metrics.audit_write_failed();
                warn!(
                    resource,
                    %action,
                    target = %target,
                    customer_id = %customer_id,
                    outcome = outcome.as_str(),
                    error = %e,
                    "Failed to write audit entry"
                );
            }
        }
    }

    /// Append `entry`, marked failed when `result` is an error.
    pub async fn record_result<T>(&self, entry: AuditEntry, result: &Result<T, Error>) {
        let entry = match result {
            Ok(_) => entry,
            Err(err) => entry.with_error(err),
        };
        self.record(entry).await;
    }
}
