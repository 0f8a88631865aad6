// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Schema for the record store, embedded at compile time.
//!
//! `migrations/postgres` backs production deployments: `BIGSERIAL` keys,
//! `TIMESTAMPTZ` columns, `JSONB` launch parameters and a partial index over
//! running jobs for the launch guard. `migrations/sqlite` mirrors it with
//! SQLite storage classes for the in-memory test store and single-node use.
//!
//! Either set creates `provisioning_jobs`, `namespaces` (unique per name and
//! customer) and `history`, the audit trail tagged by resource kind. The
//! binary applies [`POSTGRES`] at startup; [`SqliteRecordStore`] applies
//! [`SQLITE`] whenever it opens a database.
//!
//! [`SqliteRecordStore`]: crate::store::SqliteRecordStore

use sqlx::migrate::{MigrateError, Migrator};

pub static POSTGRES: Migrator = sqlx::migrate!("./migrations/postgres");

pub static SQLITE: Migrator = sqlx::migrate!("./migrations/sqlite");

/// Bring a PostgreSQL database up to the current schema.
///
/// Applied versions are recorded in `_sqlx_migrations`, so repeated runs are
/// no-ops.
pub async fn run_postgres(pool: &sqlx::PgPool) -> Result<(), MigrateError> {
    POSTGRES.run(pool).await
}

pub async fn run_sqlite(pool: &sqlx::SqlitePool) -> Result<(), MigrateError> {
    SQLITE.run(pool).await
}
