// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! JWKS rotation controller.
//!
//! The stored expiry is the only rotation trigger. No expiry means the
//! identity was never installed (or a previous install failed and was
//! cleaned up); an expiry in the past means it is time for a new key. A past
//! expiry says nothing about whether the stored key material is consistent,
//! so the controller never tries to repair, it only replaces.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use strongbox_server_db::JwksStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::CredentialsConfig;
use crate::error::{CredentialsError, CredentialsResult};
use crate::keygen::generate_jwk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
	/// No identity was stored; one was installed with the initial expiry.
	Initialized { expiry: DateTime<Utc> },
	/// The stored identity had expired and was replaced.
	Rotated { expiry: DateTime<Utc> },
	/// The stored identity is still valid.
	Current { expiry: DateTime<Utc> },
}

pub struct JwksRotator<S: ?Sized> {
	store: Arc<S>,
	rotation_period: chrono::Duration,
	check_interval: Duration,
	initial_expiry: DateTime<Utc>,
}

impl<S> JwksRotator<S>
where
	S: JwksStore + ?Sized + 'static,
{
	/// A rotator whose first key set expires one rotation period from now and
	/// whose background loop checks at the configured interval.
	pub fn new(store: Arc<S>, config: &CredentialsConfig) -> CredentialsResult<Self> {
		let rotation_period = chrono::Duration::from_std(config.rotation_period())
			.map_err(|e| CredentialsError::Configuration(format!("rotation period out of range: {e}")))?;
		Ok(Self {
			store,
			rotation_period,
			check_interval: config.rotation_check_interval(),
			initial_expiry: Utc::now() + rotation_period,
		})
	}

	/// Override when the first installed key set expires.
	pub fn with_initial_expiry(mut self, initial_expiry: DateTime<Utc>) -> Self {
		self.initial_expiry = initial_expiry;
		self
	}

	/// Install or replace the signing identity if the stored expiry calls for
	/// it.
	///
	/// Store errors other than a missing expiry are returned without touching
	/// the stored identity.
	#[instrument(skip(self), fields(now = %now))]
	pub async fn rotate_if_needed(&self, now: DateTime<Utc>) -> CredentialsResult<RotationOutcome> {
		match self.store.get_expiry().await {
			Ok(expiry) if now > expiry => {
				let next = now + self.rotation_period;
				info!(expired = %expiry, expiry = %next, "signing identity expired, rotating");
				self.install(next).await?;
				Ok(RotationOutcome::Rotated { expiry: next })
			}
			Ok(expiry) => {
				debug!(expiry = %expiry, "signing identity still valid");
				Ok(RotationOutcome::Current { expiry })
			}
			Err(e) if e.is_not_found() => {
				info!(expiry = %self.initial_expiry, "no signing identity stored, installing initial key set");
				self.install(self.initial_expiry).await?;
				Ok(RotationOutcome::Initialized {
					expiry: self.initial_expiry,
				})
			}
			Err(e) => Err(e.into()),
		}
	}

	async fn install(&self, expiry: DateTime<Utc>) -> CredentialsResult<()> {
		let result = match generate_jwk() {
			Ok(generated) => self
				.store
				.rotate(&generated.key_set, &generated.private_key, expiry)
				.await
				.map(|()| generated.kid().to_string())
				.map_err(CredentialsError::from),
			Err(e) => Err(e),
		};

		match result {
			Ok(kid) => {
				info!(kid = %kid, expiry = %expiry, "installed new signing identity");
				Ok(())
			}
			Err(e) => {
				if let Err(cleanup_err) = self.store.cleanup().await {
					warn!(error = %cleanup_err, "cleanup after failed rotation also failed");
				}
				Err(e)
			}
		}
	}

	/// Rotate once now, then keep checking every configured check interval
	/// until `token` is cancelled.
	///
	/// An error from the first check is returned to the caller. Errors from
	/// later checks are logged and the loop carries on.
	#[instrument(skip(self, token), fields(check_interval_ms = self.check_interval.as_millis() as u64))]
	pub async fn start(self: Arc<Self>, token: CancellationToken) -> CredentialsResult<JoinHandle<()>> {
		self.rotate_if_needed(Utc::now()).await?;
		let check_interval = self.check_interval;

		let handle = tokio::spawn(async move {
			loop {
				tokio::select! {
					_ = tokio::time::sleep(check_interval) => {
						if let Err(e) = self.rotate_if_needed(Utc::now()).await {
							error!(security_failure = true, error = %e, "JWKS rotation failed");
						}
					}
					_ = token.cancelled() => {
						info!("JWKS rotator shut down");
						break;
					}
				}
			}
		});

		info!("JWKS rotator started");
		Ok(handle)
	}
}

impl<S: ?Sized> fmt::Debug for JwksRotator<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("JwksRotator")
			.field("rotation_period", &self.rotation_period)
			.field("check_interval", &self.check_interval)
			.field("initial_expiry", &self.initial_expiry)
			.finish()
	}
}
