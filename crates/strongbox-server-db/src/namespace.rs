// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Kind-scoped views over the generic secret table.
//!
//! Several unrelated domains share the `secrets` table and are told apart only
//! by `kind`. [`NamespacedSecrets`] fixes the kind at the type level so a
//! caller holding, say, the controller view cannot read or overwrite a JWKS
//! row that happens to share a tag.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::Result;
use crate::secrets::{SecretStore, StoredSecret};

pub trait SecretNamespace: Send + Sync + 'static {
	const KIND: &'static str;
}

/// Public key set, private key and expiry of the token-signing identity.
#[derive(Debug, Clone, Copy)]
pub struct JwksNamespace;

impl SecretNamespace for JwksNamespace {
	const KIND: &'static str = "jwks";
}

/// Username/password pairs used to dial controllers.
#[derive(Debug, Clone, Copy)]
pub struct ControllerNamespace;

impl SecretNamespace for ControllerNamespace {
	const KIND: &'static str = "controller";
}

/// Cloud credential attribute maps.
#[derive(Debug, Clone, Copy)]
pub struct CloudCredentialNamespace;

impl SecretNamespace for CloudCredentialNamespace {
	const KIND: &'static str = "cloudcred";
}

/// OAuth signing key and session-store secret.
#[derive(Debug, Clone, Copy)]
pub struct OAuthNamespace;

impl SecretNamespace for OAuthNamespace {
	const KIND: &'static str = "oauth";
}

pub struct NamespacedSecrets<N: SecretNamespace> {
	store: Arc<dyn SecretStore>,
	_namespace: PhantomData<N>,
}

impl<N: SecretNamespace> NamespacedSecrets<N> {
	pub fn new(store: Arc<dyn SecretStore>) -> Self {
		Self {
			store,
			_namespace: PhantomData,
		}
	}

	pub fn kind(&self) -> &'static str {
		N::KIND
	}

	/// Build a row in this namespace stamped with the current time.
	pub fn entry(&self, tag: &str, data: Vec<u8>) -> StoredSecret {
		StoredSecret::new(N::KIND, tag, data)
	}

	pub async fn put(&self, tag: &str, data: Vec<u8>) -> Result<()> {
		self.store.upsert_secret(&self.entry(tag, data)).await
	}

	/// Write several rows of this namespace atomically.
	pub async fn put_all(&self, entries: Vec<(&str, Vec<u8>)>) -> Result<()> {
		let rows: Vec<StoredSecret> = entries
			.into_iter()
			.map(|(tag, data)| self.entry(tag, data))
			.collect();
		self.store.upsert_secrets(&rows).await
	}

	pub async fn get(&self, tag: &str) -> Result<StoredSecret> {
		self.store.get_secret(N::KIND, tag).await
	}

	pub async fn delete(&self, tag: &str) -> Result<()> {
		self.store.delete_secret(N::KIND, tag).await
	}
}

impl<N: SecretNamespace> Clone for NamespacedSecrets<N> {
	fn clone(&self) -> Self {
		Self::new(Arc::clone(&self.store))
	}
}

impl<N: SecretNamespace> fmt::Debug for NamespacedSecrets<N> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("NamespacedSecrets")
			.field("kind", &N::KIND)
			.finish()
	}
}
