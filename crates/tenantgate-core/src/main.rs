// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tenantgate - Self-Service Gateway
//!
//! Connects the record store, runs migrations, builds the automation
//! platform and cluster clients and keeps job monitors running until Ctrl-C.

use std::sync::Arc;
use tracing::{info, warn};

use tenantgate_awx::AwxClient;
use tenantgate_core::cluster::KubeClient;
use tenantgate_core::config::Config;
use tenantgate_core::migrations;
use tenantgate_core::runtime::GatewayRuntime;
use tenantgate_core::store::PostgresRecordStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tenantgate_core=info,tenantgate_awx=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    info!(
        awx = %config.awx.api_root,
        awx_auth = config.awx.auth.method(),
        kubernetes = %config.kube.api_server,
        launch_guard = ?config.launch_guard,
        "Starting Tenantgate"
    );

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect_with(config.database.connect_options()?)
        .await?;

    info!("Connected to database");

    migrations::run_postgres(&pool).await?;

    info!("Database migrations applied");

    let awx = Arc::new(AwxClient::new(config.awx.clone())?);
    match awx.ping().await {
        Ok(()) => info!("Automation platform reachable"),
        Err(e) => warn!(error = %e, "Automation platform not reachable; continuing"),
    }

    let cluster = Arc::new(KubeClient::new(config.kube.clone())?);

    let runtime = GatewayRuntime::builder()
        .store(Arc::new(PostgresRecordStore::new(pool)))
        .platform(awx)
        .cluster(cluster)
        .monitor_config(config.monitor.clone())
        .launch_guard(config.launch_guard)
        .orphan_policy(config.namespaces.orphan_policy)
        .node_selector(config.namespaces.node_selector.clone())
        .shutdown_grace(config.shutdown_grace)
        .build()?
        .start()
        .await?;

    info!("Tenantgate ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    runtime.shutdown().await;

    info!("Tenantgate shut down");

    Ok(())
}
