// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use strongbox_server_db::{DbError, ErrorCode};
use thiserror::Error;

pub type CredentialsResult<T> = Result<T, CredentialsError>;

#[derive(Debug, Error)]
pub enum CredentialsError {
	#[error(transparent)]
	Db(#[from] DbError),

	#[error("key generation failed: {0}")]
	KeyGeneration(String),

	#[error("invalid key: {0}")]
	InvalidKey(String),

	#[error("configuration error: {0}")]
	Configuration(String),
}

impl CredentialsError {
	/// Store failures keep their classification; everything raised by this
	/// crate itself is internal or a configuration problem.
	pub fn code(&self) -> ErrorCode {
		match self {
			CredentialsError::Db(e) => e.code(),
			CredentialsError::KeyGeneration(_) | CredentialsError::InvalidKey(_) => {
				ErrorCode::Internal
			}
			CredentialsError::Configuration(_) => ErrorCode::ServerConfiguration,
		}
	}
}
