// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Signing identity generation.
//!
//! Keys are Ed25519. The stored private key is the 32-byte seed; the public
//! half is published as an OKP JSON Web Key.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use ed25519_dalek::{SigningKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use rand::RngCore;
use strongbox_common_secret::SecretBytes;
use strongbox_server_db::{JsonWebKey, JsonWebKeySet};
use zeroize::Zeroize;

use crate::error::{CredentialsError, CredentialsResult};

/// A freshly generated key pair ready to hand to `JwksStore::rotate`.
#[derive(Debug, Clone)]
pub struct GeneratedKey {
	pub key_set: JsonWebKeySet,
	pub private_key: SecretBytes,
}

impl GeneratedKey {
	pub fn kid(&self) -> &str {
		self.key_set
			.keys
			.first()
			.and_then(|key| key.kid.as_deref())
			.unwrap_or_default()
	}
}

pub fn generate_jwk() -> CredentialsResult<GeneratedKey> {
	let mut seed = [0u8; SECRET_KEY_LENGTH];
	OsRng
		.try_fill_bytes(&mut seed)
		.map_err(|e| CredentialsError::KeyGeneration(e.to_string()))?;

	let signing_key = SigningKey::from_bytes(&seed);
	let private_key = SecretBytes::from_slice(&seed);
	seed.zeroize();

	let kid = uuid::Uuid::new_v4().to_string();
	let x = BASE64URL.encode(signing_key.verifying_key().to_bytes());

	let key = JsonWebKey {
		kty: "OKP".to_string(),
		kid: Some(kid),
		alg: Some("EdDSA".to_string()),
		key_use: Some("sig".to_string()),
		params: BTreeMap::from([
			("crv".to_string(), serde_json::Value::from("Ed25519")),
			("x".to_string(), serde_json::Value::from(x)),
		]),
	};

	Ok(GeneratedKey {
		key_set: JsonWebKeySet { keys: vec![key] },
		private_key,
	})
}

/// Rebuild the signing key from a stored private key.
pub fn signing_key(private_key: &SecretBytes) -> CredentialsResult<SigningKey> {
	let seed: &[u8; SECRET_KEY_LENGTH] = private_key
		.expose()
		.as_slice()
		.try_into()
		.map_err(|_| {
			CredentialsError::InvalidKey(format!(
				"expected {SECRET_KEY_LENGTH} byte Ed25519 seed, got {}",
				private_key.len()
			))
		})?;
	Ok(SigningKey::from_bytes(seed))
}
