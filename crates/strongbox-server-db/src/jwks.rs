// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The service's asymmetric token-signing identity.
//!
//! Three rows under kind `jwks` make up the identity: the public key set
//! served to verifiers, the private key used for signing, and the expiry at
//! which the rotation controller replaces both.
//!
//! The single-value setters are independent upserts, so a reader between
//! them can see a new public set next to an old private key or expiry.
//! Rotation controllers should call [`JwksManager::rotate`], which writes all
//! three rows in one transaction, and should read a past expiry only as a
//! trigger to rotate again.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strongbox_common_secret::{SecretBytes, SecretString};

use crate::error::{DbError, Result};
use crate::namespace::{JwksNamespace, NamespacedSecrets};
use crate::secrets::SecretStore;

pub const PUBLIC_KEY_TAG: &str = "jwksPublicKey";
pub const PRIVATE_KEY_TAG: &str = "jwksPrivateKey";
pub const EXPIRY_TAG: &str = "jwksExpiry";

/// JSON Web Key Set as served to token verifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonWebKeySet {
	pub keys: Vec<JsonWebKey>,
}

/// A single JSON Web Key.
///
/// Only the members every key shares are typed. Key-type specific members
/// (`crv`/`x` for OKP, `n`/`e` for RSA, ...) are kept in `params` exactly as
/// they were read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonWebKey {
	pub kty: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub kid: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub alg: Option<String>,
	#[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
	pub key_use: Option<String>,
	#[serde(flatten)]
	pub params: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
struct ExpiryRecord {
	expiry: DateTime<Utc>,
}

#[async_trait]
pub trait JwksStore: Send + Sync {
	async fn put_public_key_set(&self, set: &JsonWebKeySet) -> Result<()>;
	async fn get_public_key_set(&self) -> Result<JsonWebKeySet>;
	async fn put_private_key(&self, key: &SecretBytes) -> Result<()>;
	async fn get_private_key(&self) -> Result<SecretBytes>;
	async fn put_expiry(&self, expiry: DateTime<Utc>) -> Result<()>;
	async fn get_expiry(&self) -> Result<DateTime<Utc>>;
	async fn rotate(
		&self,
		set: &JsonWebKeySet,
		private_key: &SecretBytes,
		expiry: DateTime<Utc>,
	) -> Result<()>;
	async fn cleanup(&self) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct JwksManager {
	secrets: NamespacedSecrets<JwksNamespace>,
}

impl JwksManager {
	pub fn new(store: Arc<dyn SecretStore>) -> Self {
		Self {
			secrets: NamespacedSecrets::new(store),
		}
	}

	#[tracing::instrument(skip(self, set), fields(key_count = set.keys.len()))]
	pub async fn put_public_key_set(&self, set: &JsonWebKeySet) -> Result<()> {
		let data = serde_json::to_vec(set)?;
		self.secrets.put(PUBLIC_KEY_TAG, data).await?;
		tracing::debug!(key_count = set.keys.len(), "public key set stored");
		Ok(())
	}

	/// Returns `Err(DbError::NotFound)` if no key set was ever stored.
	#[tracing::instrument(skip(self))]
	pub async fn get_public_key_set(&self) -> Result<JsonWebKeySet> {
		let row = self.secrets.get(PUBLIC_KEY_TAG).await?;
		Ok(serde_json::from_slice(&row.data)?)
	}

	#[tracing::instrument(skip(self, key))]
	pub async fn put_private_key(&self, key: &SecretBytes) -> Result<()> {
		self.secrets.put(PRIVATE_KEY_TAG, encode_key_material(key)?).await?;
		tracing::debug!("private key stored");
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_private_key(&self) -> Result<SecretBytes> {
		let row = self.secrets.get(PRIVATE_KEY_TAG).await?;
		decode_key_material(&row.data)
	}

	#[tracing::instrument(skip(self), fields(expiry = %expiry))]
	pub async fn put_expiry(&self, expiry: DateTime<Utc>) -> Result<()> {
		let data = serde_json::to_vec(&ExpiryRecord { expiry })?;
		self.secrets.put(EXPIRY_TAG, data).await?;
		tracing::debug!(expiry = %expiry, "key set expiry stored");
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_expiry(&self) -> Result<DateTime<Utc>> {
		let row = self.secrets.get(EXPIRY_TAG).await?;
		let record: ExpiryRecord = serde_json::from_slice(&row.data)?;
		Ok(record.expiry)
	}

	/// Replace the whole signing identity in one transaction.
	#[tracing::instrument(skip(self, set, private_key), fields(key_count = set.keys.len(), expiry = %expiry))]
	pub async fn rotate(
		&self,
		set: &JsonWebKeySet,
		private_key: &SecretBytes,
		expiry: DateTime<Utc>,
	) -> Result<()> {
		let entries = vec![
			(PUBLIC_KEY_TAG, serde_json::to_vec(set)?),
			(PRIVATE_KEY_TAG, encode_key_material(private_key)?),
			(EXPIRY_TAG, serde_json::to_vec(&ExpiryRecord { expiry })?),
		];
		self.secrets.put_all(entries).await?;
		tracing::info!(expiry = %expiry, "signing identity rotated");
		Ok(())
	}

	/// Delete the public key set, private key and expiry in that order.
	///
	/// The first failing delete aborts the rest. Deletes are idempotent, so
	/// calling this again after a failure finishes the job.
	#[tracing::instrument(skip(self))]
	pub async fn cleanup(&self) -> Result<()> {
		for tag in [PUBLIC_KEY_TAG, PRIVATE_KEY_TAG, EXPIRY_TAG] {
			self.secrets.delete(tag).await?;
		}
		tracing::info!("signing identity removed");
		Ok(())
	}
}

#[async_trait]
impl JwksStore for JwksManager {
	async fn put_public_key_set(&self, set: &JsonWebKeySet) -> Result<()> {
		JwksManager::put_public_key_set(self, set).await
	}

	async fn get_public_key_set(&self) -> Result<JsonWebKeySet> {
		JwksManager::get_public_key_set(self).await
	}

	async fn put_private_key(&self, key: &SecretBytes) -> Result<()> {
		JwksManager::put_private_key(self, key).await
	}

	async fn get_private_key(&self) -> Result<SecretBytes> {
		JwksManager::get_private_key(self).await
	}

	async fn put_expiry(&self, expiry: DateTime<Utc>) -> Result<()> {
		JwksManager::put_expiry(self, expiry).await
	}

	async fn get_expiry(&self) -> Result<DateTime<Utc>> {
		JwksManager::get_expiry(self).await
	}

	async fn rotate(
		&self,
		set: &JsonWebKeySet,
		private_key: &SecretBytes,
		expiry: DateTime<Utc>,
	) -> Result<()> {
		JwksManager::rotate(self, set, private_key, expiry).await
	}

	async fn cleanup(&self) -> Result<()> {
		JwksManager::cleanup(self).await
	}
}

/// Raw key bytes travel as a JSON string holding their standard base64 form.
pub(crate) fn encode_key_material(key: &SecretBytes) -> Result<Vec<u8>> {
	let encoded = SecretString::new(STANDARD.encode(key.expose()));
	Ok(serde_json::to_vec(encoded.expose())?)
}

pub(crate) fn decode_key_material(data: &[u8]) -> Result<SecretBytes> {
	let encoded = SecretString::new(serde_json::from_slice::<String>(data)?);
	let bytes = STANDARD
		.decode(encoded.expose())
		.map_err(|e| DbError::Internal(format!("Invalid key encoding: {e}")))?;
	Ok(SecretBytes::new(bytes))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorCode;
	use crate::secrets::{SecretRepository, StoredSecret};
	use crate::testing::{create_test_database, FailingDeleteStore};
	use chrono::{Duration, DurationRound, TimeZone};

	const RSA_SET: &str = r#"{"keys":[{"kty":"RSA","kid":"rsa-1","alg":"RS256","use":"sig","e":"AQAB","n":"0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw"},{"kty":"OKP","kid":"ed-1","crv":"Ed25519","x":"11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo"}]}"#;

	async fn make_store() -> Arc<dyn SecretStore> {
		Arc::new(SecretRepository::new(create_test_database().await))
	}

	fn make_set(kid: &str) -> JsonWebKeySet {
		JsonWebKeySet {
			keys: vec![JsonWebKey {
				kty: "OKP".to_string(),
				kid: Some(kid.to_string()),
				alg: Some("EdDSA".to_string()),
				key_use: Some("sig".to_string()),
				params: BTreeMap::from([
					("crv".to_string(), serde_json::json!("Ed25519")),
					("x".to_string(), serde_json::json!("11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo")),
				]),
			}],
		}
	}

	fn now() -> DateTime<Utc> {
		Utc::now().duration_round(Duration::milliseconds(1)).unwrap()
	}

	#[tokio::test]
	async fn test_public_key_set_round_trips_foreign_members() {
		let manager = JwksManager::new(make_store().await);
		let set: JsonWebKeySet = serde_json::from_str(RSA_SET).unwrap();

		manager.put_public_key_set(&set).await.unwrap();
		let got = manager.get_public_key_set().await.unwrap();

		assert_eq!(got, set);
		assert_eq!(got.keys[0].params["e"], serde_json::json!("AQAB"));
		let reserialized: serde_json::Value = serde_json::to_value(&got).unwrap();
		let original: serde_json::Value = serde_json::from_str(RSA_SET).unwrap();
		assert_eq!(reserialized, original);
	}

	#[tokio::test]
	async fn test_public_key_set_last_write_wins() {
		let manager = JwksManager::new(make_store().await);
		manager.put_public_key_set(&make_set("a")).await.unwrap();
		manager.put_public_key_set(&make_set("b")).await.unwrap();

		let got = manager.get_public_key_set().await.unwrap();
		assert_eq!(got, make_set("b"));
	}

	#[tokio::test]
	async fn test_never_initialized_reads_are_not_found() {
		let manager = JwksManager::new(make_store().await);
		assert_eq!(
			manager.get_public_key_set().await.unwrap_err().code(),
			ErrorCode::NotFound
		);
		assert_eq!(
			manager.get_private_key().await.unwrap_err().code(),
			ErrorCode::NotFound
		);
		assert_eq!(
			manager.get_expiry().await.unwrap_err().code(),
			ErrorCode::NotFound
		);
	}

	#[tokio::test]
	async fn test_private_key_round_trip_and_wire_format() {
		let store = make_store().await;
		let manager = JwksManager::new(Arc::clone(&store));
		let key = SecretBytes::from_slice(&[0u8, 1, 2, 254, 255]);

		manager.put_private_key(&key).await.unwrap();
		assert_eq!(manager.get_private_key().await.unwrap(), key);

		let row = store.get_secret("jwks", PRIVATE_KEY_TAG).await.unwrap();
		assert_eq!(row.data, br#""AAEC/v8=""#.to_vec());
	}

	#[tokio::test]
	async fn test_expiry_round_trip_and_wire_format() {
		let store = make_store().await;
		let manager = JwksManager::new(Arc::clone(&store));
		let expiry = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();

		manager.put_expiry(expiry).await.unwrap();
		assert_eq!(manager.get_expiry().await.unwrap(), expiry);

		let row = store.get_secret("jwks", EXPIRY_TAG).await.unwrap();
		let value: serde_json::Value = serde_json::from_slice(&row.data).unwrap();
		assert_eq!(value, serde_json::json!({"expiry": "2030-01-02T03:04:05Z"}));
	}

	#[tokio::test]
	async fn test_expiry_without_field_is_internal() {
		let store = make_store().await;
		store
			.upsert_secret(&StoredSecret::new("jwks", EXPIRY_TAG, b"{}".to_vec()))
			.await
			.unwrap();
		let manager = JwksManager::new(store);

		let err = manager.get_expiry().await.unwrap_err();
		assert_eq!(err.code(), ErrorCode::Internal);
	}

	#[tokio::test]
	async fn test_corrupt_private_key_is_internal() {
		let store = make_store().await;
		store
			.upsert_secret(&StoredSecret::new(
				"jwks",
				PRIVATE_KEY_TAG,
				br#""not base64!""#.to_vec(),
			))
			.await
			.unwrap();
		let manager = JwksManager::new(store);

		let err = manager.get_private_key().await.unwrap_err();
		assert_eq!(err.code(), ErrorCode::Internal);
	}

	#[tokio::test]
	async fn test_rotate_writes_all_three() {
		let manager = JwksManager::new(make_store().await);
		let expiry = now() + Duration::days(90);
		let key = SecretBytes::from_slice(b"seed");

		manager.put_public_key_set(&make_set("old")).await.unwrap();
		manager.rotate(&make_set("new"), &key, expiry).await.unwrap();

		assert_eq!(manager.get_public_key_set().await.unwrap(), make_set("new"));
		assert_eq!(manager.get_private_key().await.unwrap(), key);
		assert_eq!(manager.get_expiry().await.unwrap(), expiry);
	}

	#[tokio::test]
	async fn test_cleanup_is_idempotent() {
		let manager = JwksManager::new(make_store().await);
		manager
			.rotate(&make_set("k"), &SecretBytes::from_slice(b"seed"), now())
			.await
			.unwrap();

		manager.cleanup().await.unwrap();
		manager.cleanup().await.unwrap();

		assert!(manager.get_public_key_set().await.unwrap_err().is_not_found());
		assert!(manager.get_private_key().await.unwrap_err().is_not_found());
		assert!(manager.get_expiry().await.unwrap_err().is_not_found());
	}

	#[tokio::test]
	async fn test_unready_store_propagates() {
		let store: Arc<dyn SecretStore> =
			Arc::new(SecretRepository::new(crate::database::Database::unconfigured()));
		let manager = JwksManager::new(store);

		let err = manager.cleanup().await.unwrap_err();
		assert_eq!(err.code(), ErrorCode::ServerConfiguration);
	}

	#[tokio::test]
	async fn test_cleanup_stops_at_first_failure_and_retry_converges() {
		let store = make_store().await;
		let healthy = JwksManager::new(Arc::clone(&store));
		healthy
			.rotate(&make_set("k1"), &SecretBytes::from_slice(b"seed"), Utc::now())
			.await
			.unwrap();

		let failing = Arc::new(FailingDeleteStore::new(Arc::clone(&store), PRIVATE_KEY_TAG));
		let err = JwksManager::new(failing.clone()).cleanup().await.unwrap_err();
		assert_eq!(err.code(), ErrorCode::Internal);
		assert_eq!(failing.attempted_deletes(), vec![PUBLIC_KEY_TAG, PRIVATE_KEY_TAG]);

		assert!(healthy.get_public_key_set().await.unwrap_err().is_not_found());
		assert_eq!(healthy.get_private_key().await.unwrap().expose(), &b"seed".to_vec());
		assert!(healthy.get_expiry().await.is_ok());

		healthy.cleanup().await.unwrap();
		assert!(healthy.get_private_key().await.unwrap_err().is_not_found());
		assert!(healthy.get_expiry().await.unwrap_err().is_not_found());
	}

	#[tokio::test]
	async fn test_key_set_without_key_ids_is_readable() {
		let manager = JwksManager::new(make_store().await);
		let set: JsonWebKeySet =
			serde_json::from_str(r#"{"keys":[{"kty":"OKP","crv":"Ed25519","x":"AAAA"}]}"#).unwrap();
		assert!(set.keys[0].kid.is_none());

		manager.put_public_key_set(&set).await.unwrap();
		let got = manager.get_public_key_set().await.unwrap();
		assert_eq!(got, set);
		assert_eq!(
			serde_json::to_value(&got).unwrap(),
			serde_json::json!({"keys":[{"kty":"OKP","crv":"Ed25519","x":"AAAA"}]})
		);
	}

	#[test]
	fn test_key_without_optional_members_omits_them() {
		let key: JsonWebKey = serde_json::from_str(r#"{"kty":"oct","kid":"k","k":"AAAA"}"#).unwrap();
		assert!(key.alg.is_none());
		assert!(key.key_use.is_none());
		let value = serde_json::to_value(&key).unwrap();
		assert_eq!(value, serde_json::json!({"kty":"oct","kid":"k","k":"AAAA"}));
	}
}
