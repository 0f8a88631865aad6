// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Minimal Kubernetes REST client for namespaces.
//!
//! Uses `/api/v1/namespaces` with a service-account bearer token. API
//! `Status` bodies are decoded so error messages carry the server's reason.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::{ClusterApi, ClusterError, ClusterNamespace, NamespaceSpec};

/// Connection settings for [`KubeClient`].
#[derive(Clone)]
pub struct KubeConfig {
    /// API server base URL, e.g. `https://api.cluster.local:6443`.
    pub api_server: String,
    /// Bearer token. Requests are sent unauthenticated when `None`.
    pub token: Option<String>,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// Timeout applied to every request.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for KubeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeConfig")
            .field("api_server", &self.api_server)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("insecure", &self.insecure)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl KubeConfig {
    /// Create a configuration with a 30 second timeout.
    pub fn new(api_server: impl Into<String>) -> Self {
        Self {
            api_server: api_server.into().trim().trim_end_matches('/').to_string(),
            token: None,
            insecure: false,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Set the bearer token. Empty tokens are ignored.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.trim().is_empty()).then_some(token);
        self
    }

    /// Enable or disable TLS verification skipping.
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct NamespaceObject {
    #[serde(rename = "apiVersion", default, skip_serializing_if = "Option::is_none")]
    api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    metadata: ObjectMeta,
    #[serde(default, skip_serializing)]
    status: Option<NamespaceStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ObjectMeta {
    name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    annotations: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct NamespaceStatus {
    #[serde(default)]
    phase: Option<String>,
}

/// `Status` object returned by the API server on errors.
#[derive(Debug, Default, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: String,
}

impl From<NamespaceObject> for ClusterNamespace {
    fn from(obj: NamespaceObject) -> Self {
        ClusterNamespace {
            name: obj.metadata.name,
            annotations: obj.metadata.annotations,
            phase: obj.status.and_then(|s| s.phase),
        }
    }
}

/// Kubernetes client for namespace get/create/delete.
#[derive(Debug, Clone)]
pub struct KubeClient {
    http: reqwest::Client,
    config: KubeConfig,
}

impl KubeClient {
    /// Create a client.
    pub fn new(config: KubeConfig) -> Result<Self, ClusterError> {
        if config.token.is_none() {
            warn!(api_server = %config.api_server, "No Kubernetes token configured");
        }
        if config.insecure {
            warn!(api_server = %config.api_server, "TLS verification disabled for Kubernetes client");
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| ClusterError::Transport(format!("failed to build HTTP client: {}", e)))?;

        info!(api_server = %config.api_server, "Initialized Kubernetes client");
        Ok(Self { http, config })
    }

    /// Get the client configuration.
    pub fn config(&self) -> &KubeConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.api_server, path);
        debug!(%method, %url, "Making Kubernetes API request");

        let builder = self
            .http
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and map non-success statuses.
    async fn send(&self, builder: RequestBuilder, name: &str) -> Result<reqwest::Response, ClusterError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| ClusterError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        match status {
            StatusCode::NOT_FOUND => Err(ClusterError::NotFound(name.to_string())),
            StatusCode::CONFLICT => Err(ClusterError::AlreadyExists(name.to_string())),
            _ => {
                let body = resp.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiStatus>(&body)
                    .ok()
                    .map(|s| s.message)
                    .filter(|m| !m.is_empty())
                    .unwrap_or(body);
                Err(ClusterError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    async fn decode(resp: reqwest::Response) -> Result<ClusterNamespace, ClusterError> {
        let obj: NamespaceObject = resp
            .json()
            .await
            .map_err(|e| ClusterError::Transport(format!("invalid namespace body: {}", e)))?;
        Ok(obj.into())
    }
}

#[async_trait]
impl ClusterApi for KubeClient {
    #[instrument(skip(self))]
    async fn get_namespace(&self, name: &str) -> Result<Option<ClusterNamespace>, ClusterError> {
        let path = format!("/api/v1/namespaces/{}", name);
        match self.send(self.request(Method::GET, &path), name).await {
            Ok(resp) => Ok(Some(Self::decode(resp).await?)),
            Err(ClusterError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, spec), fields(name = %spec.name))]
    async fn create_namespace(
        &self,
        spec: &NamespaceSpec,
    ) -> Result<ClusterNamespace, ClusterError> {
        let body = NamespaceObject {
            api_version: Some("v1".to_string()),
            kind: Some("Namespace".to_string()),
            metadata: ObjectMeta {
                name: spec.name.clone(),
                annotations: spec.annotations.clone(),
            },
            status: None,
        };

        let resp = self
            .send(
                self.request(Method::POST, "/api/v1/namespaces").json(&body),
                &spec.name,
            )
            .await?;
        let created = Self::decode(resp).await?;
        info!(name = %created.name, "Created cluster namespace");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn delete_namespace(&self, name: &str) -> Result<(), ClusterError> {
        let path = format!("/api/v1/namespaces/{}", name);
        self.send(self.request(Method::DELETE, &path), name).await?;
        info!(name, "Deleted cluster namespace");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_normalizes_url_and_token() {
        let config = KubeConfig::new(" https://api.local:6443/ ")
            .with_token("  ")
            .with_insecure(true)
            .with_request_timeout(Duration::from_secs(3));
        assert_eq!(config.api_server, "https://api.local:6443");
        assert!(config.token.is_none());
        assert!(config.insecure);
        assert_eq!(config.request_timeout, Duration::from_secs(3));

        let config = config.with_token("sa-token");
        assert_eq!(config.token.as_deref(), Some("sa-token"));
        assert!(!format!("{:?}", config).contains("sa-token"));
    }

    #[test]
    fn test_namespace_body_shape() {
        let body = NamespaceObject {
            api_version: Some("v1".to_string()),
            kind: Some("Namespace".to_string()),
            metadata: ObjectMeta {
                name: "team-a".to_string(),
                annotations: BTreeMap::from([(
                    "customer-id".to_string(),
                    "cust-1".to_string(),
                )]),
            },
            status: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "apiVersion": "v1",
                "kind": "Namespace",
                "metadata": {"name": "team-a", "annotations": {"customer-id": "cust-1"}}
            })
        );
    }
}
