// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for tenantgate-awx.

use thiserror::Error;

/// Result type using AwxError.
pub type Result<T> = std::result::Result<T, AwxError>;

/// Errors that can occur when talking to the automation platform.
#[derive(Debug, Error)]
pub enum AwxError {
    /// Configuration error (missing URL, ambiguous or missing credentials).
    #[error("configuration error: {0}")]
    Config(String),

    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request exceeded the configured timeout.
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    /// The platform answered with a non-success status.
    #[error("AWX API error (status {status}): {body}")]
    Status { status: u16, body: String },

    /// The platform reports no such resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl AwxError {
    /// Whether the platform reported the resource as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the error happened before any response was received.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

impl From<serde_json::Error> for AwxError {
    fn from(err: serde_json::Error) -> Self {
        AwxError::Decode(err.to_string())
    }
}
