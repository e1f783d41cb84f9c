// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential vault.
//!
//! Cloud credential attributes, controller logins and OAuth secrets are JSON
//! values projected onto the generic secret table, each domain under its own
//! kind.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strongbox_common_secret::{SecretBytes, SecretString};

use crate::error::{DbError, Result};
use crate::jwks::{decode_key_material, encode_key_material};
use crate::namespace::{
	CloudCredentialNamespace, ControllerNamespace, NamespacedSecrets, OAuthNamespace,
	SecretNamespace,
};
use crate::secrets::SecretStore;

pub const OAUTH_SIGNING_KEY_TAG: &str = "signingKey";
pub const OAUTH_SESSION_STORE_SECRET_TAG: &str = "sessionStoreSecret";

/// Flat string-to-string attributes of a cloud credential.
pub type CredentialAttributes = BTreeMap<String, String>;

/// Identifies a cloud credential as `cloud/owner/name`.
///
/// The stored tag is `cloudcred-<cloud>_<owner>_<name>`. Cloud and owner may
/// not contain `_` so that distinct credentials never share a tag; the name
/// is the last component and may.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CloudCredentialTag {
	cloud: String,
	owner: String,
	name: String,
}

impl CloudCredentialTag {
	pub fn new(
		cloud: impl Into<String>,
		owner: impl Into<String>,
		name: impl Into<String>,
	) -> Result<Self> {
		let tag = Self {
			cloud: cloud.into(),
			owner: owner.into(),
			name: name.into(),
		};
		tag.validate()?;
		Ok(tag)
	}

	fn validate(&self) -> Result<()> {
		for (part, value) in [
			("cloud", &self.cloud),
			("owner", &self.owner),
			("name", &self.name),
		] {
			if value.is_empty() {
				return Err(DbError::BadRequest(format!(
					"cloud credential {part} must not be empty"
				)));
			}
			if value.contains('/') {
				return Err(DbError::BadRequest(format!(
					"cloud credential {part} must not contain '/'"
				)));
			}
		}
		for (part, value) in [("cloud", &self.cloud), ("owner", &self.owner)] {
			if value.contains('_') {
				return Err(DbError::BadRequest(format!(
					"cloud credential {part} must not contain '_'"
				)));
			}
		}
		Ok(())
	}

	pub fn cloud(&self) -> &str {
		&self.cloud
	}

	pub fn owner(&self) -> &str {
		&self.owner
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn kind(&self) -> &'static str {
		CloudCredentialNamespace::KIND
	}
}

impl FromStr for CloudCredentialTag {
	type Err = DbError;

	fn from_str(s: &str) -> Result<Self> {
		let mut parts = s.splitn(3, '/');
		match (parts.next(), parts.next(), parts.next()) {
			(Some(cloud), Some(owner), Some(name)) => Self::new(cloud, owner, name),
			_ => Err(DbError::BadRequest(format!(
				"invalid cloud credential id {s:?}, expected cloud/owner/name"
			))),
		}
	}
}

impl fmt::Display for CloudCredentialTag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}-{}_{}_{}",
			CloudCredentialNamespace::KIND,
			self.cloud,
			self.owner,
			self.name
		)
	}
}

/// Login used to dial a controller. A controller that was never configured
/// has empty credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerCredentials {
	pub username: String,
	pub password: SecretString,
}

#[derive(Serialize)]
struct ControllerRecordRef<'a> {
	username: &'a str,
	password: &'a str,
}

#[derive(Deserialize)]
struct ControllerRecord {
	username: Option<String>,
	password: Option<String>,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
	async fn put_cloud_credential_attributes(
		&self,
		tag: &CloudCredentialTag,
		attributes: &CredentialAttributes,
	) -> Result<()>;
	async fn get_cloud_credential_attributes(
		&self,
		tag: &CloudCredentialTag,
	) -> Result<CredentialAttributes>;
	async fn delete_cloud_credential_attributes(&self, tag: &CloudCredentialTag) -> Result<()>;

	async fn put_controller_credentials(
		&self,
		controller: &str,
		username: &str,
		password: &SecretString,
	) -> Result<()>;
	async fn get_controller_credentials(&self, controller: &str) -> Result<ControllerCredentials>;
	async fn delete_controller_credentials(&self, controller: &str) -> Result<()>;

	async fn put_oauth_signing_key(&self, key: &SecretBytes) -> Result<()>;
	async fn get_oauth_signing_key(&self) -> Result<SecretBytes>;
	async fn put_oauth_session_store_secret(&self, secret: &SecretBytes) -> Result<()>;
	async fn get_oauth_session_store_secret(&self) -> Result<SecretBytes>;
	async fn cleanup_oauth_secrets(&self) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct CredentialVault {
	clouds: NamespacedSecrets<CloudCredentialNamespace>,
	controllers: NamespacedSecrets<ControllerNamespace>,
	oauth: NamespacedSecrets<OAuthNamespace>,
}

impl CredentialVault {
	pub fn new(store: Arc<dyn SecretStore>) -> Self {
		Self {
			clouds: NamespacedSecrets::new(Arc::clone(&store)),
			controllers: NamespacedSecrets::new(Arc::clone(&store)),
			oauth: NamespacedSecrets::new(store),
		}
	}

	/// Store the attributes of a cloud credential, replacing any previous
	/// set. An empty map removes the stored attributes instead.
	#[tracing::instrument(skip(self, tag, attributes), fields(credential = %tag, attribute_count = attributes.len()))]
	pub async fn put_cloud_credential_attributes(
		&self,
		tag: &CloudCredentialTag,
		attributes: &CredentialAttributes,
	) -> Result<()> {
		if attributes.is_empty() {
			return self.delete_cloud_credential_attributes(tag).await;
		}

		let data = serde_json::to_vec(attributes)?;
		self.clouds.put(&tag.to_string(), data).await?;
		tracing::debug!(credential = %tag, "cloud credential attributes stored");
		Ok(())
	}

	#[tracing::instrument(skip(self, tag), fields(credential = %tag))]
	pub async fn get_cloud_credential_attributes(
		&self,
		tag: &CloudCredentialTag,
	) -> Result<CredentialAttributes> {
		let row = self.clouds.get(&tag.to_string()).await?;
		Ok(serde_json::from_slice(&row.data)?)
	}

	#[tracing::instrument(skip(self, tag), fields(credential = %tag))]
	pub async fn delete_cloud_credential_attributes(&self, tag: &CloudCredentialTag) -> Result<()> {
		self.clouds.delete(&tag.to_string()).await?;
		tracing::debug!(credential = %tag, "cloud credential attributes deleted");
		Ok(())
	}

	#[tracing::instrument(skip(self, username, password), fields(controller = %controller))]
	pub async fn put_controller_credentials(
		&self,
		controller: &str,
		username: &str,
		password: &SecretString,
	) -> Result<()> {
		let data = serde_json::to_vec(&ControllerRecordRef {
			username,
			password: password.expose(),
		})?;
		self.controllers.put(controller, data).await?;
		tracing::debug!(controller = %controller, "controller credentials stored");
		Ok(())
	}

	/// Credentials for `controller`, or empty ones if none were ever stored.
	///
	/// A stored record lacking either field is corrupt and reported as
	/// `DbError::Internal`.
	#[tracing::instrument(skip(self), fields(controller = %controller))]
	pub async fn get_controller_credentials(&self, controller: &str) -> Result<ControllerCredentials> {
		let row = match self.controllers.get(controller).await {
			Ok(row) => row,
			Err(e) if e.is_not_found() => {
				tracing::debug!(controller = %controller, "no stored controller credentials");
				return Ok(ControllerCredentials::default());
			}
			Err(e) => return Err(e),
		};

		let record: ControllerRecord = serde_json::from_slice(&row.data)?;
		let username = record
			.username
			.ok_or_else(|| DbError::Internal("missing username".to_string()))?;
		let password = record
			.password
			.map(SecretString::new)
			.ok_or_else(|| DbError::Internal("missing password".to_string()))?;

		Ok(ControllerCredentials { username, password })
	}

	#[tracing::instrument(skip(self), fields(controller = %controller))]
	pub async fn delete_controller_credentials(&self, controller: &str) -> Result<()> {
		self.controllers.delete(controller).await?;
		tracing::debug!(controller = %controller, "controller credentials deleted");
		Ok(())
	}

	#[tracing::instrument(skip(self, key))]
	pub async fn put_oauth_signing_key(&self, key: &SecretBytes) -> Result<()> {
		self.oauth
			.put(OAUTH_SIGNING_KEY_TAG, encode_key_material(key)?)
			.await?;
		tracing::debug!("oauth signing key stored");
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_oauth_signing_key(&self) -> Result<SecretBytes> {
		let row = self.oauth.get(OAUTH_SIGNING_KEY_TAG).await?;
		decode_key_material(&row.data)
	}

	#[tracing::instrument(skip(self, secret))]
	pub async fn put_oauth_session_store_secret(&self, secret: &SecretBytes) -> Result<()> {
		self.oauth
			.put(OAUTH_SESSION_STORE_SECRET_TAG, encode_key_material(secret)?)
			.await?;
		tracing::debug!("oauth session store secret stored");
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_oauth_session_store_secret(&self) -> Result<SecretBytes> {
		let row = self.oauth.get(OAUTH_SESSION_STORE_SECRET_TAG).await?;
		decode_key_material(&row.data)
	}

	/// Delete the OAuth signing key, then the session store secret. Stops at
	/// the first failure; safe to call again.
	#[tracing::instrument(skip(self))]
	pub async fn cleanup_oauth_secrets(&self) -> Result<()> {
		for tag in [OAUTH_SIGNING_KEY_TAG, OAUTH_SESSION_STORE_SECRET_TAG] {
			self.oauth.delete(tag).await?;
		}
		tracing::info!("oauth secrets removed");
		Ok(())
	}
}

#[async_trait]
impl CredentialStore for CredentialVault {
	async fn put_cloud_credential_attributes(
		&self,
		tag: &CloudCredentialTag,
		attributes: &CredentialAttributes,
	) -> Result<()> {
		CredentialVault::put_cloud_credential_attributes(self, tag, attributes).await
	}

	async fn get_cloud_credential_attributes(
		&self,
		tag: &CloudCredentialTag,
	) -> Result<CredentialAttributes> {
		CredentialVault::get_cloud_credential_attributes(self, tag).await
	}

	async fn delete_cloud_credential_attributes(&self, tag: &CloudCredentialTag) -> Result<()> {
		CredentialVault::delete_cloud_credential_attributes(self, tag).await
	}

	async fn put_controller_credentials(
		&self,
		controller: &str,
		username: &str,
		password: &SecretString,
	) -> Result<()> {
		CredentialVault::put_controller_credentials(self, controller, username, password).await
	}

	async fn get_controller_credentials(&self, controller: &str) -> Result<ControllerCredentials> {
		CredentialVault::get_controller_credentials(self, controller).await
	}

	async fn delete_controller_credentials(&self, controller: &str) -> Result<()> {
		CredentialVault::delete_controller_credentials(self, controller).await
	}

	async fn put_oauth_signing_key(&self, key: &SecretBytes) -> Result<()> {
		CredentialVault::put_oauth_signing_key(self, key).await
	}

	async fn get_oauth_signing_key(&self) -> Result<SecretBytes> {
		CredentialVault::get_oauth_signing_key(self).await
	}

	async fn put_oauth_session_store_secret(&self, secret: &SecretBytes) -> Result<()> {
		CredentialVault::put_oauth_session_store_secret(self, secret).await
	}

	async fn get_oauth_session_store_secret(&self) -> Result<SecretBytes> {
		CredentialVault::get_oauth_session_store_secret(self).await
	}

	async fn cleanup_oauth_secrets(&self) -> Result<()> {
		CredentialVault::cleanup_oauth_secrets(self).await
	}
}
