// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request-scoped cancellation.
//!
//! Store operations are plain futures: dropping one aborts the statement it
//! is running. [`cancellable`] ties an operation to a caller's
//! [`CancellationToken`] so that a cancelled request surfaces as
//! `DbError::Cancelled`. Deadlines belong to the caller
//! (`tokio::time::timeout`); this layer sets none.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{DbError, Result};

/// Run `op` until it completes or `token` is cancelled.
///
/// A token that is already cancelled never starts the operation.
pub async fn cancellable<T, F>(token: &CancellationToken, op: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	if token.is_cancelled() {
		return Err(DbError::Cancelled);
	}
	tokio::select! {
		biased;
		_ = token.cancelled() => {
			tracing::debug!("store operation cancelled by caller");
			Err(DbError::Cancelled)
		}
		result = op => result,
	}
}
