// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Store handle and readiness gate.
//!
//! Every repository in this crate holds a [`Database`]. Before touching the
//! pool each operation calls [`Database::ready`], which fails with
//! `ServerConfiguration` when no pool is wired and `UpgradeInProgress` until
//! the external migration step has called [`Database::mark_migrated`].
//! The flag is an atomic owned by the handle (shared between clones), so the
//! hot read path never takes a lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sqlx::sqlite::SqlitePool;

use crate::error::{DbError, Result};

#[derive(Debug, Default)]
pub struct Readiness {
	migrated: AtomicBool,
}

impl Readiness {
	pub fn is_migrated(&self) -> bool {
		self.migrated.load(Ordering::Acquire)
	}

	fn set(&self, migrated: bool) {
		self.migrated.store(migrated, Ordering::Release);
	}
}

/// Cheap-to-clone handle over the shared relational store.
#[derive(Clone, Debug)]
pub struct Database {
	pool: Option<SqlitePool>,
	readiness: Arc<Readiness>,
}

impl Database {
	/// Wrap a connected pool. The store rejects requests with
	/// `UpgradeInProgress` until [`Database::mark_migrated`] is called.
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			pool: Some(pool),
			readiness: Arc::new(Readiness::default()),
		}
	}

	/// A handle with no backing pool. Every operation fails with
	/// `ServerConfiguration`.
	pub fn unconfigured() -> Self {
		Self {
			pool: None,
			readiness: Arc::new(Readiness::default()),
		}
	}

	/// Record that the schema is at the version this crate expects.
	#[tracing::instrument(skip(self))]
	pub fn mark_migrated(&self) {
		self.readiness.set(true);
		tracing::info!("secret store marked ready");
	}

	/// Gate requests again, e.g. while a schema upgrade runs.
	#[tracing::instrument(skip(self))]
	pub fn mark_upgrading(&self) {
		self.readiness.set(false);
		tracing::info!("secret store gated for upgrade");
	}

	pub fn is_configured(&self) -> bool {
		self.pool.is_some()
	}

	pub fn is_ready(&self) -> bool {
		self.pool.is_some() && self.readiness.is_migrated()
	}

	/// The underlying pool regardless of readiness. Only the migration step
	/// should use this; request paths go through [`Database::ready`].
	pub fn pool(&self) -> Option<&SqlitePool> {
		self.pool.as_ref()
	}

	/// Return the pool if the store may serve requests.
	pub fn ready(&self) -> Result<&SqlitePool> {
		let pool = self
			.pool
			.as_ref()
			.ok_or_else(|| DbError::ServerConfiguration("database not configured".to_string()))?;
		if !self.readiness.is_migrated() {
			return Err(DbError::UpgradeInProgress);
		}
		Ok(pool)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorCode;

	#[test]
	fn unconfigured_store_reports_server_configuration() {
		let db = Database::unconfigured();
		assert!(!db.is_configured());
		let err = db.ready().unwrap_err();
		assert_eq!(err.code(), ErrorCode::ServerConfiguration);
	}

	#[tokio::test]
	async fn unmigrated_store_reports_upgrade_in_progress() {
		let pool = SqlitePool::connect(":memory:").await.unwrap();
		let db = Database::new(pool);
		assert!(db.is_configured());
		assert!(!db.is_ready());
		assert!(matches!(db.ready(), Err(DbError::UpgradeInProgress)));
	}

	#[tokio::test]
	async fn readiness_is_shared_between_clones() {
		let pool = SqlitePool::connect(":memory:").await.unwrap();
		let db = Database::new(pool);
		let clone = db.clone();

		db.mark_migrated();
		assert!(clone.is_ready());
		assert!(clone.ready().is_ok());

		clone.mark_upgrading();
		assert!(matches!(db.ready(), Err(DbError::UpgradeInProgress)));
	}
}
