// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cache and rotation settings.
//!
//! Environment variables:
//! - `STRONGBOX_JWKS_CACHE_TTL_SECS` - public key set cache lifetime (default: 3600)
//! - `STRONGBOX_OAUTH_KEY_CACHE_TTL_SECS` - OAuth signing key cache lifetime (default: 3600)
//! - `STRONGBOX_JWKS_ROTATION_DAYS` - lifetime of a rotated key set (default: 90)
//! - `STRONGBOX_JWKS_CHECK_INTERVAL_SECS` - how often the rotator checks the expiry (default: 3600)

use std::time::Duration;

use tracing::instrument;

use crate::error::{CredentialsError, CredentialsResult};

const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_ROTATION_DAYS: u64 = 90;
const DEFAULT_CHECK_INTERVAL_SECS: u64 = 3600;
const SECS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialsConfig {
	jwks_cache_ttl: Duration,
	oauth_key_cache_ttl: Duration,
	rotation_period: Duration,
	rotation_check_interval: Duration,
}

impl CredentialsConfig {
	/// Build a configuration, filling unset values with defaults.
	///
	/// Every duration must be non-zero.
	pub fn new(
		jwks_cache_ttl: Option<Duration>,
		oauth_key_cache_ttl: Option<Duration>,
		rotation_period: Option<Duration>,
		rotation_check_interval: Option<Duration>,
	) -> CredentialsResult<Self> {
		let config = Self {
			jwks_cache_ttl: jwks_cache_ttl.unwrap_or(Duration::from_secs(DEFAULT_CACHE_TTL_SECS)),
			oauth_key_cache_ttl: oauth_key_cache_ttl
				.unwrap_or(Duration::from_secs(DEFAULT_CACHE_TTL_SECS)),
			rotation_period: rotation_period
				.unwrap_or(Duration::from_secs(DEFAULT_ROTATION_DAYS * SECS_PER_DAY)),
			rotation_check_interval: rotation_check_interval
				.unwrap_or(Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS)),
		};

		for (name, value) in [
			("JWKS cache TTL", config.jwks_cache_ttl),
			("OAuth key cache TTL", config.oauth_key_cache_ttl),
			("rotation period", config.rotation_period),
			("rotation check interval", config.rotation_check_interval),
		] {
			if value.is_zero() {
				return Err(CredentialsError::Configuration(format!(
					"{name} must be greater than zero"
				)));
			}
		}

		Ok(config)
	}

	#[instrument]
	pub fn from_env() -> CredentialsResult<Self> {
		let jwks_cache_ttl = env_u64("STRONGBOX_JWKS_CACHE_TTL_SECS")?.map(Duration::from_secs);
		let oauth_key_cache_ttl =
			env_u64("STRONGBOX_OAUTH_KEY_CACHE_TTL_SECS")?.map(Duration::from_secs);
		let rotation_period = env_u64("STRONGBOX_JWKS_ROTATION_DAYS")?
			.map(|days| Duration::from_secs(days.saturating_mul(SECS_PER_DAY)));
		let rotation_check_interval =
			env_u64("STRONGBOX_JWKS_CHECK_INTERVAL_SECS")?.map(Duration::from_secs);

		Self::new(
			jwks_cache_ttl,
			oauth_key_cache_ttl,
			rotation_period,
			rotation_check_interval,
		)
	}

	pub fn jwks_cache_ttl(&self) -> Duration {
		self.jwks_cache_ttl
	}

	pub fn oauth_key_cache_ttl(&self) -> Duration {
		self.oauth_key_cache_ttl
	}

	/// Lifetime given to a key set installed because the previous one expired.
	pub fn rotation_period(&self) -> Duration {
		self.rotation_period
	}

	pub fn rotation_check_interval(&self) -> Duration {
		self.rotation_check_interval
	}
}

impl Default for CredentialsConfig {
	fn default() -> Self {
		Self {
			jwks_cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
			oauth_key_cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
			rotation_period: Duration::from_secs(DEFAULT_ROTATION_DAYS * SECS_PER_DAY),
			rotation_check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
		}
	}
}

fn env_u64(name: &str) -> CredentialsResult<Option<u64>> {
	match std::env::var(name) {
		Ok(raw) => raw
			.trim()
			.parse::<u64>()
			.map(Some)
			.map_err(|e| CredentialsError::Configuration(format!("invalid {name}: {e}"))),
		Err(_) => Ok(None),
	}
}
