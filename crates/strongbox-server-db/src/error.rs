// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Bad request: {0}")]
	BadRequest(String),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Already exists: {0}")]
	AlreadyExists(String),

	#[error("Server configuration: {0}")]
	ServerConfiguration(String),

	#[error("Upgrade in progress")]
	UpgradeInProgress,

	#[error("Operation cancelled")]
	Cancelled,

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),
}

/// Error classification shared with the callers of this layer.
///
/// Callers branch on the code rather than the variant so that wrapping a
/// `DbError` in a higher-level error does not lose the distinction between,
/// say, an unknown key and a broken store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
	BadRequest,
	NotFound,
	AlreadyExists,
	ServerConfiguration,
	UpgradeInProgress,
	Cancelled,
	Internal,
}

impl ErrorCode {
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorCode::BadRequest => "bad request",
			ErrorCode::NotFound => "not found",
			ErrorCode::AlreadyExists => "already exists",
			ErrorCode::ServerConfiguration => "server configuration",
			ErrorCode::UpgradeInProgress => "upgrade in progress",
			ErrorCode::Cancelled => "cancelled",
			ErrorCode::Internal => "internal",
		}
	}
}

impl fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl DbError {
	pub fn code(&self) -> ErrorCode {
		match self {
			DbError::BadRequest(_) => ErrorCode::BadRequest,
			DbError::NotFound(_) => ErrorCode::NotFound,
			DbError::AlreadyExists(_) => ErrorCode::AlreadyExists,
			DbError::ServerConfiguration(_) => ErrorCode::ServerConfiguration,
			DbError::UpgradeInProgress => ErrorCode::UpgradeInProgress,
			DbError::Cancelled => ErrorCode::Cancelled,
			DbError::Internal(_) | DbError::Serialization(_) | DbError::Sqlx(_) => {
				ErrorCode::Internal
			}
		}
	}

	pub fn is_not_found(&self) -> bool {
		self.code() == ErrorCode::NotFound
	}
}

pub type Result<T> = std::result::Result<T, DbError>;

pub(crate) fn is_unique_constraint_error(e: &sqlx::Error) -> bool {
	if let sqlx::Error::Database(ref db_err) = e {
		return db_err.message().contains("UNIQUE constraint failed");
	}
	false
}
