// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the AWX client.

use std::fmt;
use std::time::Duration;

use crate::error::{AwxError, Result};

const API_ROOT_SUFFIX: &str = "/api/v2";

/// Credentials used on every request. Exactly one method is configured.
#[derive(Clone, PartialEq, Eq)]
pub enum AwxAuth {
    /// HTTP Basic with username and password.
    Basic { username: String, password: String },
    /// `Authorization: Token <token>` (AWX personal access token).
    Token(String),
    /// `Authorization: Bearer <token>` (OAuth2 application token).
    Bearer(String),
}

impl AwxAuth {
    /// Build credentials from the optional raw settings.
    ///
    /// Empty strings count as unset. Fails unless exactly one method is
    /// fully provided; a basic pair missing one half is rejected outright.
    pub fn from_parts(
        username: Option<&str>,
        password: Option<&str>,
        token: Option<&str>,
        bearer: Option<&str>,
    ) -> Result<Self> {
        fn present(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|v| !v.is_empty())
        }
        let username = present(username);
        let password = present(password);
        let token = present(token);
        let bearer = present(bearer);

        let mut methods = Vec::new();
        if username.is_some() || password.is_some() {
            match (username, password) {
                (Some(username), Some(password)) => methods.push(AwxAuth::Basic {
                    username: username.to_string(),
                    password: password.to_string(),
                }),
                _ => {
                    return Err(AwxError::Config(
                        "basic authentication requires both username and password".to_string(),
                    ));
                }
            }
        }
        if let Some(token) = token {
            methods.push(AwxAuth::Token(token.to_string()));
        }
        if let Some(bearer) = bearer {
            methods.push(AwxAuth::Bearer(bearer.to_string()));
        }

        match methods.len() {
            0 => Err(AwxError::Config(
                "exactly one authentication method is required: username/password, token, or bearer"
                    .to_string(),
            )),
            1 => Ok(methods.remove(0)),
            n => {
                let names: Vec<&str> = methods.iter().map(AwxAuth::method).collect();
                Err(AwxError::Config(format!(
                    "exactly one authentication method is required, but {} were provided: {}",
                    n,
                    names.join(", ")
                )))
            }
        }
    }

    /// Short name of the method, safe to log.
    pub fn method(&self) -> &'static str {
        match self {
            AwxAuth::Basic { .. } => "basic",
            AwxAuth::Token(_) => "token",
            AwxAuth::Bearer(_) => "bearer",
        }
    }
}

impl fmt::Debug for AwxAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AwxAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            AwxAuth::Token(_) => f.write_str("Token(<redacted>)"),
            AwxAuth::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

/// Configuration for [`AwxClient`](crate::AwxClient).
#[derive(Debug, Clone)]
pub struct AwxConfig {
    /// Versioned API root, e.g. `https://awx.example.com/api/v2` (no trailing slash).
    pub api_root: String,
    /// Credentials.
    pub auth: AwxAuth,
    /// Skip TLS certificate verification (development only).
    pub insecure: bool,
    /// Timeout applied to every request.
    pub request_timeout: Duration,
}

impl AwxConfig {
    /// Create a configuration for the given base URL and credentials.
    ///
    /// The base URL may be the host root or already point at `/api/v2/`.
    pub fn new(base_url: &str, auth: AwxAuth) -> Result<Self> {
        Ok(Self {
            api_root: normalize_api_root(base_url)?,
            auth,
            insecure: false,
            request_timeout: Duration::from_secs(30),
        })
    }

    /// Create a configuration from environment variables.
    ///
    /// Environment variables:
    /// - `AWX_URL`: Base URL (required)
    /// - `AWX_USERNAME` / `AWX_PASSWORD`: Basic credentials
    /// - `AWX_TOKEN`: Personal access token
    /// - `AWX_BEARER`: OAuth2 bearer token
    /// - `AWX_INSECURE`: Skip TLS verification (default: "false")
    /// - `AWX_TIMEOUT_SECS`: Request timeout in seconds (default: 30)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through `var`.
    pub fn from_lookup<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = var("AWX_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AwxError::Config("AWX_URL is required".to_string()))?;

        let auth = AwxAuth::from_parts(
            var("AWX_USERNAME").as_deref(),
            var("AWX_PASSWORD").as_deref(),
            var("AWX_TOKEN").as_deref(),
            var("AWX_BEARER").as_deref(),
        )?;

        let insecure = var("AWX_INSECURE")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        let timeout_secs: u64 = var("AWX_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .map_err(|e| AwxError::Config(format!("invalid AWX_TIMEOUT_SECS: {}", e)))?;

        Ok(Self::new(&url, auth)?
            .with_insecure(insecure)
            .with_request_timeout(Duration::from_secs(timeout_secs)))
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

/// Normalize a base URL to the versioned API root.
fn normalize_api_root(base_url: &str) -> Result<String> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(AwxError::Config("AWX URL is empty".to_string()));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(AwxError::Config(format!(
            "AWX URL must start with http:// or https://, got '{}'",
            trimmed
        )));
    }

    let root = trimmed.trim_end_matches('/');
    if root.ends_with(API_ROOT_SUFFIX) {
        Ok(root.to_string())
    } else {
        Ok(format!("{}{}", root, API_ROOT_SUFFIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host_root() {
        assert_eq!(
            normalize_api_root("https://awx.local").unwrap(),
            "https://awx.local/api/v2"
        );
        assert_eq!(
            normalize_api_root("https://awx.local/").unwrap(),
            "https://awx.local/api/v2"
        );
    }

    #[test]
    fn test_normalize_already_versioned() {
        assert_eq!(
            normalize_api_root("https://awx.local/api/v2/").unwrap(),
            "https://awx.local/api/v2"
        );
        assert_eq!(
            normalize_api_root("http://awx.local:8052/api/v2").unwrap(),
            "http://awx.local:8052/api/v2"
        );
    }

    #[test]
    fn test_normalize_rejects_bad_urls() {
        assert!(normalize_api_root("").is_err());
        assert!(normalize_api_root("awx.local").is_err());
    }

    #[test]
    fn test_auth_requires_exactly_one_method() {
        let none = AwxAuth::from_parts(None, None, None, Some(""));
        assert!(matches!(none, Err(AwxError::Config(_))));

        let two = AwxAuth::from_parts(None, None, Some("t"), Some("b")).unwrap_err();
        assert!(two.to_string().contains("2 were provided"));

        let three = AwxAuth::from_parts(Some("u"), Some("p"), Some("t"), Some("b")).unwrap_err();
        assert!(three.to_string().contains("3 were provided"));
    }

    #[test]
    fn test_auth_rejects_half_basic_pair() {
        let err = AwxAuth::from_parts(Some("admin"), None, None, None).unwrap_err();
        assert!(err.to_string().contains("both username and password"));
    }

    #[test]
    fn test_auth_single_methods() {
        assert_eq!(
            AwxAuth::from_parts(Some("admin"), Some("pw"), None, None).unwrap(),
            AwxAuth::Basic {
                username: "admin".to_string(),
                password: "pw".to_string()
            }
        );
        assert_eq!(
            AwxAuth::from_parts(None, None, Some("tok"), None).unwrap(),
            AwxAuth::Token("tok".to_string())
        );
        assert_eq!(
            AwxAuth::from_parts(None, None, None, Some("bear")).unwrap(),
            AwxAuth::Bearer("bear".to_string())
        );
    }

    #[test]
    fn test_auth_debug_redacts_secrets() {
        let auth = AwxAuth::Basic {
            username: "admin".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{:?}", auth);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
        assert!(!format!("{:?}", AwxAuth::Token("abc".into())).contains("abc"));
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| {
            vars.iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn test_from_lookup_reads_all_settings() {
        let config = AwxConfig::from_lookup(lookup(&[
            ("AWX_URL", "https://awx.local/"),
            ("AWX_TOKEN", "tok"),
            ("AWX_INSECURE", "TRUE"),
            ("AWX_TIMEOUT_SECS", "12"),
        ]))
        .unwrap();
        assert_eq!(config.api_root, "https://awx.local/api/v2");
        assert_eq!(config.auth, AwxAuth::Token("tok".to_string()));
        assert!(config.insecure);
        assert_eq!(config.request_timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_from_lookup_defaults_and_failures() {
        let config = AwxConfig::from_lookup(lookup(&[
            ("AWX_URL", "https://awx.local"),
            ("AWX_BEARER", "b"),
        ]))
        .unwrap();
        assert!(!config.insecure);
        assert_eq!(config.request_timeout, Duration::from_secs(30));

        assert!(AwxConfig::from_lookup(lookup(&[("AWX_TOKEN", "t")])).is_err());
        assert!(
            AwxConfig::from_lookup(lookup(&[
                ("AWX_URL", "https://awx.local"),
                ("AWX_TOKEN", "t"),
                ("AWX_TIMEOUT_SECS", "soon"),
            ]))
            .is_err()
        );
    }

    #[test]
    fn test_builder_methods() {
        let config = AwxConfig::new("https://awx.local", AwxAuth::Token("t".into()))
            .unwrap()
            .with_insecure(true)
            .with_request_timeout(Duration::from_secs(5));
        assert!(config.insecure);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.auth.method(), "token");
    }
}
