// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the tenantgate binary.

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use tenantgate_awx::{AwxConfig, AwxError};

use crate::cluster::KubeConfig;
use crate::job_monitor::JobMonitorConfig;
use crate::namespaces::{NamespaceConfig, OrphanPolicy};
use crate::provisioning::LaunchGuard;

/// Where the record store lives.
#[derive(Clone)]
pub enum DatabaseConfig {
    /// A full connection URL.
    Url(String),
    /// Individual connection settings.
    Parts {
        host: String,
        port: u16,
        user: String,
        password: Option<String>,
        database: String,
        ssl_mode: PgSslMode,
    },
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseConfig::Url(_) => f.write_str("Url(<redacted>)"),
            DatabaseConfig::Parts {
                host,
                port,
                user,
                database,
                ssl_mode,
                ..
            } => f
                .debug_struct("Parts")
                .field("host", host)
                .field("port", port)
                .field("user", user)
                .field("database", database)
                .field("ssl_mode", ssl_mode)
                .finish_non_exhaustive(),
        }
    }
}

impl DatabaseConfig {
    /// Postgres connection options.
    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        match self {
            DatabaseConfig::Url(url) => {
                PgConnectOptions::from_str(url).map_err(|e| ConfigError::InvalidValue {
                    var: "TENANTGATE_DATABASE_URL",
                    message: e.to_string(),
                })
            }
            DatabaseConfig::Parts {
                host,
                port,
                user,
                password,
                database,
                ssl_mode,
            } => {
                let mut options = PgConnectOptions::new()
                    .host(host)
                    .port(*port)
                    .username(user)
                    .database(database)
                    .ssl_mode(*ssl_mode);
                if let Some(password) = password {
                    options = options.password(password);
                }
                Ok(options)
            }
        }
    }
}

/// Gateway configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Record store connection.
    pub database: DatabaseConfig,
    /// Pool size for the record store.
    pub db_max_connections: u32,
    /// Automation platform client settings.
    pub awx: AwxConfig,
    /// Cluster API client settings.
    pub kube: KubeConfig,
    /// Job monitor polling.
    pub monitor: JobMonitorConfig,
    /// Server-side launch deduplication.
    pub launch_guard: LaunchGuard,
    /// Namespace annotations and orphan handling.
    pub namespaces: NamespaceConfig,
    /// How long shutdown waits for monitors.
    pub shutdown_grace: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through `var`.
    pub fn from_lookup<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        let database = match var("TENANTGATE_DATABASE_URL").or_else(|| var("DATABASE_URL")) {
            Some(url) => DatabaseConfig::Url(url),
            None => {
                let host = var("TENANTGATE_DB_HOST").ok_or(ConfigError::MissingEnvVar(
                    "TENANTGATE_DATABASE_URL, DATABASE_URL or TENANTGATE_DB_HOST",
                ))?;
                DatabaseConfig::Parts {
                    host,
                    port: parse_or(&var, "TENANTGATE_DB_PORT", 5432)?,
                    user: var("TENANTGATE_DB_USER").unwrap_or_else(|| "postgres".to_string()),
                    password: var("TENANTGATE_DB_PASSWORD"),
                    database: var("TENANTGATE_DB_NAME").unwrap_or_else(|| "tenantgate".to_string()),
                    ssl_mode: parse_or(&var, "TENANTGATE_DB_SSLMODE", PgSslMode::Prefer)?,
                }
            }
        };
        let db_max_connections = parse_or(&var, "TENANTGATE_DB_MAX_CONNECTIONS", 10)?;

        let awx = AwxConfig::from_lookup(&var)?;

        let api_server = var("KUBERNETES_URL").ok_or(ConfigError::MissingEnvVar("KUBERNETES_URL"))?;
        let mut kube = KubeConfig::new(api_server)
            .with_insecure(flag(&var, "KUBERNETES_INSECURE"))
            .with_request_timeout(Duration::from_secs(parse_or(
                &var,
                "KUBERNETES_TIMEOUT_SECS",
                30,
            )?));
        if let Some(token) = var("KUBERNETES_TOKEN") {
            kube = kube.with_token(token);
        }

        let monitor = JobMonitorConfig {
            poll_interval: Duration::from_secs(parse_or(&var, "TENANTGATE_MONITOR_POLL_SECS", 5)?),
            max_consecutive_failures: parse_or(&var, "TENANTGATE_MONITOR_MAX_FAILURES", 5)?,
        };
        if monitor.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                var: "TENANTGATE_MONITOR_POLL_SECS",
                message: "must be at least 1".to_string(),
            });
        }

        let launch_guard = parse_or(&var, "TENANTGATE_LAUNCH_GUARD", LaunchGuard::Enforced)?;
        let namespaces = NamespaceConfig {
            node_selector: var("KUBERNETES_NODE_SELECTOR"),
            orphan_policy: parse_or(&var, "TENANTGATE_ORPHAN_POLICY", OrphanPolicy::Surface)?,
        };
        let shutdown_grace =
            Duration::from_secs(parse_or(&var, "TENANTGATE_SHUTDOWN_GRACE_SECS", 10)?);

        Ok(Self {
            database,
            db_max_connections,
            awx,
            kube,
            monitor,
            launch_guard,
            namespaces,
            shutdown_grace,
        })
    }
}

fn flag(var: &impl Fn(&str) -> Option<String>, name: &str) -> bool {
    var(name)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}

fn parse_or<T>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            var: name,
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// A variable is set but cannot be used.
    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: &'static str, message: String },
    /// Automation platform settings are incomplete or ambiguous.
    #[error(transparent)]
    Awx(#[from] AwxError),
}
