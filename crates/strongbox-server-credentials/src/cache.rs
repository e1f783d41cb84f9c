// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read-through cache in front of the JWKS and credential stores.
//!
//! Token verification reads the public key set and OAuth middleware reads the
//! signing key on every request, while both change at most once per rotation.
//! Each value gets a single-slot cache with its own TTL. Writes through this
//! wrapper purge the slot first; writes made elsewhere (another replica, a
//! direct store handle) become visible once the TTL runs out.
//!
//! Each slot's lock is held across the backing read, so concurrent misses
//! cost one store round trip rather than one each.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use strongbox_common_secret::{SecretBytes, SecretString};
use strongbox_server_db::{
	CloudCredentialTag, ControllerCredentials, CredentialAttributes, CredentialStore,
	JsonWebKeySet, JwksStore, Result,
};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::CredentialsConfig;

struct TtlSlot<T> {
	ttl: Duration,
	entry: Mutex<Option<(Instant, T)>>,
}

impl<T: Clone> TtlSlot<T> {
	fn new(ttl: Duration) -> Self {
		Self {
			ttl,
			entry: Mutex::new(None),
		}
	}

	async fn get_or_load<F, Fut>(&self, load: F) -> Result<T>
	where
		F: FnOnce() -> Fut,
		Fut: std::future::Future<Output = Result<T>>,
	{
		let mut entry = self.entry.lock().await;
		if let Some((stored_at, value)) = entry.as_ref() {
			if stored_at.elapsed() < self.ttl {
				return Ok(value.clone());
			}
		}

		let value = load().await?;
		*entry = Some((Instant::now(), value.clone()));
		Ok(value)
	}

	async fn purge_then<F, Fut>(&self, write: F) -> Result<()>
	where
		F: FnOnce() -> Fut,
		Fut: std::future::Future<Output = Result<()>>,
	{
		let mut entry = self.entry.lock().await;
		*entry = None;
		write().await
	}
}

pub struct CachedCredentialStore<J: ?Sized, C: ?Sized> {
	jwks: Arc<J>,
	credentials: Arc<C>,
	key_set: TtlSlot<JsonWebKeySet>,
	oauth_key: TtlSlot<SecretBytes>,
}

impl<J, C> CachedCredentialStore<J, C>
where
	J: JwksStore + ?Sized,
	C: CredentialStore + ?Sized,
{
	pub fn new(jwks: Arc<J>, credentials: Arc<C>, config: &CredentialsConfig) -> Self {
		Self {
			jwks,
			credentials,
			key_set: TtlSlot::new(config.jwks_cache_ttl()),
			oauth_key: TtlSlot::new(config.oauth_key_cache_ttl()),
		}
	}
}

impl<J: ?Sized, C: ?Sized> std::fmt::Debug for CachedCredentialStore<J, C> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CachedCredentialStore")
			.field("jwks_cache_ttl", &self.key_set.ttl)
			.field("oauth_key_cache_ttl", &self.oauth_key.ttl)
			.finish()
	}
}

#[async_trait]
impl<J, C> JwksStore for CachedCredentialStore<J, C>
where
	J: JwksStore + ?Sized,
	C: CredentialStore + ?Sized,
{
	async fn put_public_key_set(&self, set: &JsonWebKeySet) -> Result<()> {
		self.key_set
			.purge_then(|| self.jwks.put_public_key_set(set))
			.await
	}

	#[tracing::instrument(skip(self))]
	async fn get_public_key_set(&self) -> Result<JsonWebKeySet> {
		self.key_set
			.get_or_load(|| self.jwks.get_public_key_set())
			.await
	}

	async fn put_private_key(&self, key: &SecretBytes) -> Result<()> {
		self.jwks.put_private_key(key).await
	}

	async fn get_private_key(&self) -> Result<SecretBytes> {
		self.jwks.get_private_key().await
	}

	async fn put_expiry(&self, expiry: DateTime<Utc>) -> Result<()> {
		self.jwks.put_expiry(expiry).await
	}

	async fn get_expiry(&self) -> Result<DateTime<Utc>> {
		self.jwks.get_expiry().await
	}

	async fn rotate(
		&self,
		set: &JsonWebKeySet,
		private_key: &SecretBytes,
		expiry: DateTime<Utc>,
	) -> Result<()> {
		self.key_set
			.purge_then(|| self.jwks.rotate(set, private_key, expiry))
			.await
	}

	async fn cleanup(&self) -> Result<()> {
		self.key_set.purge_then(|| self.jwks.cleanup()).await
	}
}

#[async_trait]
impl<J, C> CredentialStore for CachedCredentialStore<J, C>
where
	J: JwksStore + ?Sized,
	C: CredentialStore + ?Sized,
{
	async fn put_cloud_credential_attributes(
		&self,
		tag: &CloudCredentialTag,
		attributes: &CredentialAttributes,
	) -> Result<()> {
		self.credentials
			.put_cloud_credential_attributes(tag, attributes)
			.await
	}

	async fn get_cloud_credential_attributes(
		&self,
		tag: &CloudCredentialTag,
	) -> Result<CredentialAttributes> {
		self.credentials.get_cloud_credential_attributes(tag).await
	}

	async fn delete_cloud_credential_attributes(&self, tag: &CloudCredentialTag) -> Result<()> {
		self.credentials.delete_cloud_credential_attributes(tag).await
	}

	async fn put_controller_credentials(
		&self,
		controller: &str,
		username: &str,
		password: &SecretString,
	) -> Result<()> {
		self.credentials
			.put_controller_credentials(controller, username, password)
			.await
	}

	async fn get_controller_credentials(&self, controller: &str) -> Result<ControllerCredentials> {
		self.credentials.get_controller_credentials(controller).await
	}

	async fn delete_controller_credentials(&self, controller: &str) -> Result<()> {
		self.credentials.delete_controller_credentials(controller).await
	}

	async fn put_oauth_signing_key(&self, key: &SecretBytes) -> Result<()> {
		self.oauth_key
			.purge_then(|| self.credentials.put_oauth_signing_key(key))
			.await
	}

	#[tracing::instrument(skip(self))]
	async fn get_oauth_signing_key(&self) -> Result<SecretBytes> {
		self.oauth_key
			.get_or_load(|| self.credentials.get_oauth_signing_key())
			.await
	}

	async fn put_oauth_session_store_secret(&self, secret: &SecretBytes) -> Result<()> {
		self.credentials.put_oauth_session_store_secret(secret).await
	}

	async fn get_oauth_session_store_secret(&self) -> Result<SecretBytes> {
		self.credentials.get_oauth_session_store_secret().await
	}

	async fn cleanup_oauth_secrets(&self) -> Result<()> {
		self.oauth_key
			.purge_then(|| self.credentials.cleanup_oauth_secrets())
			.await
	}
}
