// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;

use crate::config::DbConfig;
use crate::database::Database;
use crate::error::DbError;

/// Open a WAL-mode SQLite pool for the store.
///
/// The returned [`Database`] is wired but not ready: the migration
/// collaborator must call [`Database::mark_migrated`] once the `secrets` and
/// `root_keys` tables exist.
///
/// # Errors
/// Returns `DbError::ServerConfiguration` if the URL is invalid and
/// `DbError::Sqlx` if the connection fails.
#[tracing::instrument(skip(config), fields(max_connections = config.max_connections()))]
pub async fn create_pool(config: &DbConfig) -> Result<Database, DbError> {
	let options = SqliteConnectOptions::from_str(config.database_url().expose())
		.map_err(|e| DbError::ServerConfiguration(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.create_if_missing(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(config.max_connections())
		.connect_with(options)
		.await?;

	tracing::debug!("database pool created");
	Ok(Database::new(pool))
}
