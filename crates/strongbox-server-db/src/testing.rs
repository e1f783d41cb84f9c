// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use strongbox_common_secret::SecretString;

use crate::config::DbConfig;
use crate::database::Database;
use crate::error::{DbError, Result};
use crate::pool::create_pool;
use crate::secrets::{SecretStore, StoredSecret};

const SCHEMA: [&str; 2] = [
	include_str!("../migrations/001_secrets.sql"),
	include_str!("../migrations/002_root_keys.sql"),
];

pub async fn create_test_pool() -> SqlitePool {
	SqlitePoolOptions::new()
		.max_connections(1)
		.connect(":memory:")
		.await
		.unwrap()
}

pub async fn apply_schema(pool: &SqlitePool) {
	for script in SCHEMA {
		sqlx::raw_sql(script).execute(pool).await.unwrap();
	}
}

/// In-memory store with both tables created and the readiness flag set.
pub async fn create_test_database() -> Database {
	let pool = create_test_pool().await;
	apply_schema(&pool).await;
	let db = Database::new(pool);
	db.mark_migrated();
	db
}

/// File-backed store for tests that open several pools on one database, the
/// way independent replicas would. Call once per replica; the schema scripts
/// are idempotent.
pub async fn create_file_database(path: &Path) -> Database {
	let url = format!("sqlite:{}", path.display());
	let config = DbConfig::new(SecretString::new(url), Some(4)).unwrap();
	let db = create_pool(&config).await.unwrap();
	apply_schema(db.pool().unwrap()).await;
	db.mark_migrated();
	db
}

/// Passes everything through to `inner` except deletes of `failing_tag`,
/// which fail with `Internal`. Every attempted delete tag is recorded.
pub struct FailingDeleteStore {
	inner: Arc<dyn SecretStore>,
	failing_tag: String,
	attempted: Mutex<Vec<String>>,
}

impl FailingDeleteStore {
	pub fn new(inner: Arc<dyn SecretStore>, failing_tag: &str) -> Self {
		Self {
			inner,
			failing_tag: failing_tag.to_string(),
			attempted: Mutex::new(Vec::new()),
		}
	}

	pub fn attempted_deletes(&self) -> Vec<String> {
		self.attempted.lock().unwrap().clone()
	}
}

#[async_trait]
impl SecretStore for FailingDeleteStore {
	async fn upsert_secret(&self, secret: &StoredSecret) -> Result<()> {
		self.inner.upsert_secret(secret).await
	}

	async fn upsert_secrets(&self, secrets: &[StoredSecret]) -> Result<()> {
		self.inner.upsert_secrets(secrets).await
	}

	async fn get_secret(&self, kind: &str, tag: &str) -> Result<StoredSecret> {
		self.inner.get_secret(kind, tag).await
	}

	async fn delete_secret(&self, kind: &str, tag: &str) -> Result<()> {
		self.attempted.lock().unwrap().push(tag.to_string());
		if tag == self.failing_tag {
			return Err(DbError::Internal(format!("delete failed: {kind}/{tag}")));
		}
		self.inner.delete_secret(kind, tag).await
	}
}
