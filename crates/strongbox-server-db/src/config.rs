// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Connection settings for the secret store.
//!
//! Environment variables:
//! - `STRONGBOX_DATABASE_URL` - SQLite connection string (e.g. `sqlite:./strongbox.db`)
//! - `STRONGBOX_DATABASE_URL_FILE` - path to a file containing the connection string
//! - `STRONGBOX_DB_MAX_CONNECTIONS` - pool size (default: 5)

use std::path::PathBuf;

use strongbox_common_secret::SecretString;

use crate::error::{DbError, Result};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Clone)]
pub struct DbConfig {
	/// Connection strings may embed credentials, so they are kept redacted.
	database_url: SecretString,
	max_connections: u32,
}

impl DbConfig {
	pub fn new(database_url: SecretString, max_connections: Option<u32>) -> Result<Self> {
		if database_url.is_empty() {
			return Err(DbError::ServerConfiguration(
				"database URL must not be empty".to_string(),
			));
		}

		let max_connections = max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS);
		if max_connections == 0 {
			return Err(DbError::ServerConfiguration(
				"max connections must be at least 1".to_string(),
			));
		}

		Ok(Self {
			database_url,
			max_connections,
		})
	}

	#[tracing::instrument]
	pub fn from_env() -> Result<Self> {
		let database_url = load_secret_from_env("STRONGBOX_DATABASE_URL")?.ok_or_else(|| {
			DbError::ServerConfiguration("STRONGBOX_DATABASE_URL is not set".to_string())
		})?;

		let max_connections = match std::env::var("STRONGBOX_DB_MAX_CONNECTIONS") {
			Ok(raw) => Some(raw.parse::<u32>().map_err(|e| {
				DbError::ServerConfiguration(format!("invalid STRONGBOX_DB_MAX_CONNECTIONS: {e}"))
			})?),
			Err(_) => None,
		};

		Self::new(database_url, max_connections)
	}

	pub fn database_url(&self) -> &SecretString {
		&self.database_url
	}

	pub fn max_connections(&self) -> u32 {
		self.max_connections
	}
}

/// Read `{name}` directly, falling back to the file named by `{name}_FILE`.
fn load_secret_from_env(name: &str) -> Result<Option<SecretString>> {
	if let Ok(value) = std::env::var(name) {
		if !value.is_empty() {
			return Ok(Some(SecretString::new(value)));
		}
	}

	let file_var = format!("{name}_FILE");
	if let Ok(path_str) = std::env::var(&file_var) {
		let path = PathBuf::from(&path_str);
		let content = std::fs::read_to_string(&path).map_err(|e| {
			DbError::ServerConfiguration(format!("failed to read {file_var} from {path_str}: {e}"))
		})?;
		return Ok(Some(SecretString::new(content.trim().to_string())));
	}

	Ok(None)
}

impl std::fmt::Debug for DbConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DbConfig")
			.field("database_url", &"[REDACTED]")
			.field("max_connections", &self.max_connections)
			.finish()
	}
}
