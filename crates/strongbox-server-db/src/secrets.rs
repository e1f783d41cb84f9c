// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Generic secret repository.
//!
//! A secret is an opaque blob addressed by a `(kind, tag)` pair. At most one
//! row exists per pair: the only write path is an upsert that inserts the row
//! or, on conflict, replaces `time` and `data`. `kind` and `tag` never change
//! once written.
//!
//! The JWKS manager and the credential vault project their values onto this
//! table; they never own rows of their own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};

use crate::database::Database;
use crate::error::{DbError, Result};
use crate::timestamp;

/// One row of the `secrets` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSecret {
	pub kind: String,
	pub tag: String,
	pub time: DateTime<Utc>,
	pub data: Vec<u8>,
}

impl StoredSecret {
	/// A secret stamped with the current time.
	pub fn new(kind: impl Into<String>, tag: impl Into<String>, data: Vec<u8>) -> Self {
		Self {
			kind: kind.into(),
			tag: tag.into(),
			time: Utc::now(),
			data,
		}
	}
}

#[async_trait]
pub trait SecretStore: Send + Sync {
	async fn upsert_secret(&self, secret: &StoredSecret) -> Result<()>;
	async fn upsert_secrets(&self, secrets: &[StoredSecret]) -> Result<()>;
	async fn get_secret(&self, kind: &str, tag: &str) -> Result<StoredSecret>;
	async fn delete_secret(&self, kind: &str, tag: &str) -> Result<()>;
}

/// Repository for the `secrets` table.
#[derive(Clone, Debug)]
pub struct SecretRepository {
	db: Database,
}

impl SecretRepository {
	pub fn new(db: Database) -> Self {
		Self { db }
	}

	/// Insert a secret, or replace `time` and `data` of the existing row with
	/// the same `(kind, tag)`.
	///
	/// Returns `Err(DbError::BadRequest)` if either key part is empty or `time`
	/// falls outside years 0000 to 9999.
	#[tracing::instrument(skip(self, secret), fields(kind = %secret.kind, tag = %secret.tag))]
	pub async fn upsert_secret(&self, secret: &StoredSecret) -> Result<()> {
		let pool = self.db.ready()?;
		validate_key(&secret.kind, &secret.tag)?;
		let time = timestamp::encode("time", &secret.time)?;

		upsert_query(secret, time).execute(pool).await?;

		tracing::debug!(kind = %secret.kind, tag = %secret.tag, "secret upserted");
		Ok(())
	}

	/// Upsert several secrets in a single transaction.
	///
	/// Either every row is written or none is. Validation runs before the
	/// transaction opens, so a bad key never leaves a partial write behind.
	#[tracing::instrument(skip(self, secrets), fields(count = secrets.len()))]
	pub async fn upsert_secrets(&self, secrets: &[StoredSecret]) -> Result<()> {
		let pool = self.db.ready()?;
		let mut times = Vec::with_capacity(secrets.len());
		for secret in secrets {
			validate_key(&secret.kind, &secret.tag)?;
			times.push(timestamp::encode("time", &secret.time)?);
		}

		let mut tx = pool.begin().await?;
		for (secret, time) in secrets.iter().zip(times) {
			upsert_query(secret, time).execute(&mut *tx).await?;
		}
		tx.commit().await?;

		tracing::debug!(count = secrets.len(), "secrets upserted in transaction");
		Ok(())
	}

	/// Get the secret stored under `(kind, tag)`.
	///
	/// Returns `Err(DbError::NotFound)` if no row matches and
	/// `Err(DbError::BadRequest)` if either key part is empty.
	#[tracing::instrument(skip(self), fields(kind = %kind, tag = %tag))]
	pub async fn get_secret(&self, kind: &str, tag: &str) -> Result<StoredSecret> {
		let pool = self.db.ready()?;
		validate_key(kind, tag)?;

		let row = fetch_secret_row(pool, kind, tag).await?;
		match row {
			Some(row) => parse_secret_row(&row),
			None => Err(DbError::NotFound(format!("secret not found: {kind}/{tag}"))),
		}
	}

	/// Delete the secret stored under `(kind, tag)`.
	///
	/// Deleting a pair with no row is not an error, so cleanup routines can be
	/// re-run safely.
	#[tracing::instrument(skip(self), fields(kind = %kind, tag = %tag))]
	pub async fn delete_secret(&self, kind: &str, tag: &str) -> Result<()> {
		let pool = self.db.ready()?;
		validate_key(kind, tag)?;

		let result = sqlx::query("DELETE FROM secrets WHERE kind = ? AND tag = ?")
			.bind(kind)
			.bind(tag)
			.execute(pool)
			.await?;

		tracing::debug!(kind = %kind, tag = %tag, deleted = result.rows_affected(), "secret deleted");
		Ok(())
	}
}

#[async_trait]
impl SecretStore for SecretRepository {
	async fn upsert_secret(&self, secret: &StoredSecret) -> Result<()> {
		SecretRepository::upsert_secret(self, secret).await
	}

	async fn upsert_secrets(&self, secrets: &[StoredSecret]) -> Result<()> {
		SecretRepository::upsert_secrets(self, secrets).await
	}

	async fn get_secret(&self, kind: &str, tag: &str) -> Result<StoredSecret> {
		SecretRepository::get_secret(self, kind, tag).await
	}

	async fn delete_secret(&self, kind: &str, tag: &str) -> Result<()> {
		SecretRepository::delete_secret(self, kind, tag).await
	}
}

fn validate_key(kind: &str, tag: &str) -> Result<()> {
	if kind.is_empty() || tag.is_empty() {
		return Err(DbError::BadRequest("missing secret tag and type".to_string()));
	}
	Ok(())
}

fn upsert_query(
	secret: &StoredSecret,
	time: String,
) -> sqlx::query::Query<'_, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
	sqlx::query(
		r#"
		INSERT INTO secrets (kind, tag, time, data)
		VALUES (?, ?, ?, ?)
		ON CONFLICT (kind, tag) DO UPDATE SET
			time = excluded.time,
			data = excluded.data
		"#,
	)
	.bind(secret.kind.as_str())
	.bind(secret.tag.as_str())
	.bind(time)
	.bind(secret.data.as_slice())
}

async fn fetch_secret_row(
	pool: &SqlitePool,
	kind: &str,
	tag: &str,
) -> Result<Option<sqlx::sqlite::SqliteRow>> {
	let row = sqlx::query("SELECT kind, tag, time, data FROM secrets WHERE kind = ? AND tag = ?")
		.bind(kind)
		.bind(tag)
		.fetch_optional(pool)
		.await?;
	Ok(row)
}

fn parse_secret_row(row: &sqlx::sqlite::SqliteRow) -> Result<StoredSecret> {
	let time_str: String = row.get("time");
	let data: Option<Vec<u8>> = row.get("data");

	Ok(StoredSecret {
		kind: row.get("kind"),
		tag: row.get("tag"),
		time: timestamp::decode("time", &time_str)?,
		data: data.unwrap_or_default(),
	})
}
