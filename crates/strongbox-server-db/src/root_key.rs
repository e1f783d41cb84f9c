// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Root-key backing for macaroon issuance and verification.
//!
//! Service replicas share one `root_keys` table and agree, without talking to
//! each other, on which symmetric key signs new macaroons. The issuer asks
//! [`RootKeyRepository::find_latest_key`] for the newest key whose lifetime
//! still covers the token it is about to mint; only when none qualifies does
//! it generate a key and [`insert_key`](RootKeyRepository::insert_key) it.
//! Verifiers look keys up by id for as long as the row exists.
//!
//! Rows are immutable: there is no update path and this layer never deletes.
//!
//! # Concurrent issuers
//!
//! Find-then-insert is not atomic. Two replicas that both observe "no
//! reusable key" will each insert a key with a different id for an
//! overlapping window. Both keys are valid and verifiable; callers must
//! accept either. The primary key only guarantees that one id is never
//! written twice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use strongbox_common_secret::SecretBytes;

use crate::database::Database;
use crate::error::{is_unique_constraint_error, DbError, Result};
use crate::timestamp;

/// A symmetric signing key and its validity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootKey {
	pub id: Vec<u8>,
	pub created: DateTime<Utc>,
	pub expires: DateTime<Utc>,
	pub root_key: SecretBytes,
}

#[async_trait]
pub trait RootKeyBacking: Send + Sync {
	/// Look a key up by id. `None` means the key is unknown, which verifiers
	/// treat as an invalid token rather than a store failure.
	async fn get_key(&self, id: &[u8]) -> Result<Option<RootKey>>;

	/// The newest key with `created > created_after` and
	/// `expires_after <= expires <= expires_before`, if any.
	async fn find_latest_key(
		&self,
		created_after: DateTime<Utc>,
		expires_after: DateTime<Utc>,
		expires_before: DateTime<Utc>,
	) -> Result<Option<RootKey>>;

	/// Record a freshly minted key. Fails with `AlreadyExists` if the id is
	/// taken; the issuer should re-read rather than retry the insert.
	async fn insert_key(&self, key: &RootKey) -> Result<()>;
}

/// Repository for the `root_keys` table.
#[derive(Clone, Debug)]
pub struct RootKeyRepository {
	db: Database,
}

impl RootKeyRepository {
	pub fn new(db: Database) -> Self {
		Self { db }
	}

	#[tracing::instrument(skip(self, id), fields(key_id = %String::from_utf8_lossy(id)))]
	pub async fn get_key(&self, id: &[u8]) -> Result<Option<RootKey>> {
		let pool = self.db.ready()?;

		let row = sqlx::query("SELECT id, created_at, expires, root_key FROM root_keys WHERE id = ?")
			.bind(id)
			.fetch_optional(pool)
			.await?;

		match row {
			Some(row) => Ok(Some(parse_root_key_row(&row)?)),
			None => {
				tracing::debug!("root key not found");
				Ok(None)
			}
		}
	}

	/// Select the key an issuer may reuse.
	///
	/// `created_after` excludes keys from an older generation. The
	/// `[expires_after, expires_before]` band excludes keys that would expire
	/// before the new token does and keys so long-lived that rotation would
	/// stall. Among the survivors the most recently created one wins, which
	/// keeps the number of distinct keys verifiers must fetch low.
	///
	/// Returns `None` when nothing qualifies; that is the issuer's cue to mint.
	#[tracing::instrument(skip(self))]
	pub async fn find_latest_key(
		&self,
		created_after: DateTime<Utc>,
		expires_after: DateTime<Utc>,
		expires_before: DateTime<Utc>,
	) -> Result<Option<RootKey>> {
		let pool = self.db.ready()?;
		if timestamp::is_past_storable(&created_after) || timestamp::is_past_storable(&expires_after) {
			tracing::debug!("window starts after the last storable time");
			return Ok(None);
		}

		let row = sqlx::query(
			r#"
			SELECT id, created_at, expires, root_key
			FROM root_keys
			WHERE created_at > ? AND expires >= ? AND expires <= ?
			ORDER BY created_at DESC
			LIMIT 1
			"#,
		)
		.bind(timestamp::encode_bound(&created_after))
		.bind(timestamp::encode_bound(&expires_after))
		.bind(timestamp::encode_bound(&expires_before))
		.fetch_optional(pool)
		.await?;

		match row {
			Some(row) => {
				let key = parse_root_key_row(&row)?;
				tracing::debug!(key_id = %String::from_utf8_lossy(&key.id), "reusable root key found");
				Ok(Some(key))
			}
			None => {
				tracing::debug!("no reusable root key in window");
				Ok(None)
			}
		}
	}

	/// Append a root key.
	///
	/// Returns `Err(DbError::AlreadyExists)` if a key with the same id was
	/// already recorded and `Err(DbError::BadRequest)` for an empty id or a
	/// time outside years 0000 to 9999.
	#[tracing::instrument(skip(self, key), fields(key_id = %String::from_utf8_lossy(&key.id), expires = %key.expires))]
	pub async fn insert_key(&self, key: &RootKey) -> Result<()> {
		let pool = self.db.ready()?;
		if key.id.is_empty() {
			return Err(DbError::BadRequest("missing root key id".to_string()));
		}
		let created = timestamp::encode("created_at", &key.created)?;
		let expires = timestamp::encode("expires", &key.expires)?;

		let result = sqlx::query(
			r#"
			INSERT INTO root_keys (id, created_at, expires, root_key)
			VALUES (?, ?, ?, ?)
			"#,
		)
		.bind(key.id.as_slice())
		.bind(created)
		.bind(expires)
		.bind(key.root_key.expose().as_slice())
		.execute(pool)
		.await;

		match result {
			Ok(_) => {
				tracing::debug!(key_id = %String::from_utf8_lossy(&key.id), "root key recorded");
				Ok(())
			}
			Err(e) if is_unique_constraint_error(&e) => Err(DbError::AlreadyExists(format!(
				"root key already exists: {}",
				String::from_utf8_lossy(&key.id)
			))),
			Err(e) => Err(DbError::Sqlx(e)),
		}
	}
}

#[async_trait]
impl RootKeyBacking for RootKeyRepository {
	async fn get_key(&self, id: &[u8]) -> Result<Option<RootKey>> {
		RootKeyRepository::get_key(self, id).await
	}

	async fn find_latest_key(
		&self,
		created_after: DateTime<Utc>,
		expires_after: DateTime<Utc>,
		expires_before: DateTime<Utc>,
	) -> Result<Option<RootKey>> {
		RootKeyRepository::find_latest_key(self, created_after, expires_after, expires_before).await
	}

	async fn insert_key(&self, key: &RootKey) -> Result<()> {
		RootKeyRepository::insert_key(self, key).await
	}
}

fn parse_root_key_row(row: &sqlx::sqlite::SqliteRow) -> Result<RootKey> {
	let created_str: String = row.get("created_at");
	let expires_str: String = row.get("expires");
	let material: Vec<u8> = row.get("root_key");

	Ok(RootKey {
		id: row.get("id"),
		created: timestamp::decode("created_at", &created_str)?,
		expires: timestamp::decode("expires", &expires_str)?,
		root_key: SecretBytes::new(material),
	})
}
