// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for tenantgate-core.
//!
//! Every service operation returns [`Error`], a closed set of variants the
//! request layer maps to transport codes through [`Error::kind`] or
//! [`Error::error_code`] without looking at message text.
//!
//! Partial failures across the two systems (launched but unrecorded job,
//! namespace present in only one system) are carried as
//! [`PartialFailure`] on [`Error::Persistence`] so operators can reconcile.

use std::fmt;

use thiserror::Error;

use crate::cluster::ClusterError;
use crate::platform::PlatformError;
use crate::store::StoreError;

/// Result type using the core Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    ExternalSystem,
    Persistence,
    Forbidden,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::ExternalSystem => "external_system",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Forbidden => "forbidden",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What was not found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    Template(String),
    Job(i64),
    /// Absent, or owned by another customer.
    Namespace(String),
}

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFound::Template(name) => write!(f, "job template '{}' not found", name),
            NotFound::Job(id) => write!(f, "job {} not found", id),
            NotFound::Namespace(name) => write!(f, "namespace '{}' not found", name),
        }
    }
}

/// What already exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// The namespace exists in the cluster.
    ExistsInCluster(String),
    /// The namespace is already recorded for this customer.
    ExistsInStore(String),
    /// A job for the same customer and template is still running.
    ActiveJob { job_id: i64 },
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::ExistsInCluster(name) => {
                write!(f, "namespace '{}' already exists in the cluster", name)
            }
            Conflict::ExistsInStore(name) => {
                write!(f, "namespace '{}' is already recorded", name)
            }
            Conflict::ActiveJob { job_id } => {
                write!(f, "job {} is still running for this template", job_id)
            }
        }
    }
}

/// Divergence left behind when only one of two systems was updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartialFailure {
    /// The platform launched a job that has no local record.
    LaunchedUnrecorded { external_job_id: i64 },
    /// The cluster namespace exists without an ownership record.
    ClusterOrphan { namespace: String },
    /// The ownership record survived deletion of the cluster namespace.
    RecordOrphan { namespace: String },
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialFailure::LaunchedUnrecorded { external_job_id } => {
                write!(f, "job {} was launched but not recorded", external_job_id)
            }
            PartialFailure::ClusterOrphan { namespace } => {
                write!(f, "namespace '{}' exists in the cluster without a record", namespace)
            }
            PartialFailure::RecordOrphan { namespace } => {
                write!(f, "record for namespace '{}' outlived the cluster namespace", namespace)
            }
        }
    }
}

/// External system an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalSystem {
    Automation,
    Cluster,
}

impl fmt::Display for ExternalSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalSystem::Automation => f.write_str("automation platform"),
            ExternalSystem::Cluster => f.write_str("cluster API"),
        }
    }
}

/// Underlying failure of an external call.
#[derive(Debug, Clone, Error)]
pub enum ExternalFailure {
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// Core errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Malformed input.
    #[error("validation error for '{field}': {message}")]
    Validation { field: &'static str, message: String },

    /// Missing, or not owned by the caller.
    #[error("{0}")]
    NotFound(NotFound),

    /// Duplicate resource or active job.
    #[error("{0}")]
    Conflict(Conflict),

    /// The job launch itself failed. No record was created; the platform may
    /// still have started a job.
    #[error("failed to launch template '{template}': {source}")]
    LaunchFailed {
        template: String,
        #[source]
        source: PlatformError,
    },

    /// Any other automation platform or cluster API failure.
    #[error("{system} error: {source}")]
    ExternalSystem {
        system: ExternalSystem,
        #[source]
        source: ExternalFailure,
    },

    /// Record store failure, possibly after an external mutation.
    #[error("persistence error during {operation}{}: {source}", partial_suffix(.partial))]
    Persistence {
        operation: &'static str,
        partial: Option<PartialFailure>,
        #[source]
        source: StoreError,
    },

    /// Reserved for role checks performed by the request layer.
    #[error("forbidden")]
    Forbidden,
}

fn partial_suffix(partial: &Option<PartialFailure>) -> String {
    match partial {
        Some(p) => format!(" ({})", p),
        None => String::new(),
    }
}

impl Error {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            field,
            message: message.into(),
        }
    }

    pub(crate) fn platform(source: PlatformError) -> Self {
        Error::ExternalSystem {
            system: ExternalSystem::Automation,
            source: source.into(),
        }
    }

    pub(crate) fn cluster(source: ClusterError) -> Self {
        Error::ExternalSystem {
            system: ExternalSystem::Cluster,
            source: source.into(),
        }
    }

    pub(crate) fn persistence(operation: &'static str, source: StoreError) -> Self {
        Error::Persistence {
            operation,
            partial: None,
            source,
        }
    }

    pub(crate) fn partial(
        operation: &'static str,
        partial: PartialFailure,
        source: StoreError,
    ) -> Self {
        Error::Persistence {
            operation,
            partial: Some(partial),
            source,
        }
    }

    /// Coarse category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::LaunchFailed { .. } | Error::ExternalSystem { .. } => ErrorKind::ExternalSystem,
            Error::Persistence { .. } => ErrorKind::Persistence,
            Error::Forbidden => ErrorKind::Forbidden,
        }
    }

    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "VALIDATION_ERROR",
            Error::NotFound(NotFound::Template(_)) => "TEMPLATE_NOT_FOUND",
            Error::NotFound(NotFound::Job(_)) => "JOB_NOT_FOUND",
            Error::NotFound(NotFound::Namespace(_)) => "NAMESPACE_NOT_FOUND",
            Error::Conflict(Conflict::ExistsInCluster(_)) => "NAMESPACE_EXISTS_IN_CLUSTER",
            Error::Conflict(Conflict::ExistsInStore(_)) => "NAMESPACE_EXISTS_IN_STORE",
            Error::Conflict(Conflict::ActiveJob { .. }) => "ACTIVE_JOB_EXISTS",
            Error::LaunchFailed { .. } => "LAUNCH_FAILED",
            Error::ExternalSystem { .. } => "EXTERNAL_SYSTEM_ERROR",
            Error::Persistence { partial, .. } => match partial {
                Some(PartialFailure::LaunchedUnrecorded { .. }) => "LAUNCHED_UNRECORDED",
                Some(PartialFailure::ClusterOrphan { .. }) => "CLUSTER_ORPHAN",
                Some(PartialFailure::RecordOrphan { .. }) => "RECORD_ORPHAN",
                None => "PERSISTENCE_ERROR",
            },
            Error::Forbidden => "FORBIDDEN",
        }
    }

    /// Divergence left behind by this failure, if any.
    pub fn partial_failure(&self) -> Option<&PartialFailure> {
        match self {
            Error::Persistence { partial, .. } => partial.as_ref(),
            _ => None,
        }
    }
}
