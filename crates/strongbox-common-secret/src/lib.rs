// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Redacting wrapper for key material and credentials.
//!
//! Everything the strongbox store hands back that could sign a token or open
//! a controller connection travels inside a [`Secret<T>`]:
//!
//! - root-key material backing macaroon signatures
//! - the private half of the JWKS signing identity
//! - controller passwords and OAuth signing/session secrets
//!
//! The wrapper prints `[REDACTED]` through `Debug`, `Display` and `Serialize`,
//! zeroizes its contents on drop and has no `Deref`, so reading the value
//! always goes through an explicit [`Secret::expose`] call.
//!
//! ```
//! use strongbox_common_secret::SecretBytes;
//!
//! let key = SecretBytes::from_slice(b"root key material");
//! assert_eq!(format!("{key:?}"), "Secret(\"[REDACTED]\")");
//! assert_eq!(key.expose().as_slice(), b"root key material");
//! ```

use std::fmt;
use zeroize::Zeroize;

/// The placeholder printed in place of any secret value.
pub const REDACTED: &str = "[REDACTED]";

/// A value that must never appear in logs, error messages or serialized output.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

/// Passwords, OAuth client secrets and other textual credentials.
pub type SecretString = Secret<String>;

/// Raw key material (root keys, private keys, signing secrets).
pub type SecretBytes = Secret<Vec<u8>>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Access the wrapped value. Every call site is a place key material leaves
	/// the wrapper, so keep them few and obvious.
	pub fn expose(&self) -> &T {
		&self.inner
	}

	/// Return an owned copy of the wrapped value.
	///
	/// The copy is taken by clone so the original buffer is still zeroized when
	/// `self` drops.
	pub fn into_inner(self) -> T
	where
		T: Clone,
	{
		self.inner.clone()
	}
}

impl SecretBytes {
	pub fn from_slice(bytes: &[u8]) -> Self {
		Self::new(bytes.to_vec())
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}
}

impl SecretString {
	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T> Default for Secret<T>
where
	T: Zeroize + Default,
{
	fn default() -> Self {
		Self::new(T::default())
	}
}

impl<T> fmt::Debug for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T> fmt::Display for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T> PartialEq for Secret<T>
where
	T: Zeroize + PartialEq,
{
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T> Eq for Secret<T> where T: Zeroize + Eq {}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<Vec<u8>> for SecretBytes {
	fn from(value: Vec<u8>) -> Self {
		Self::new(value)
	}
}

// Serialization always emits the placeholder; stored encodings are produced
// from `expose()` explicitly by the code that owns the wire format.
#[cfg(feature = "serde")]
mod serde_impl {
	use super::{Secret, REDACTED};
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use zeroize::Zeroize;

	impl<T> Serialize for Secret<T>
	where
		T: Serialize + Zeroize,
	{
		fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			serializer.serialize_str(REDACTED)
		}
	}

	impl<'de, T> Deserialize<'de> for Secret<T>
	where
		T: Deserialize<'de> + Zeroize,
	{
		fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
		where
			D: Deserializer<'de>,
		{
			T::deserialize(deserializer).map(Secret::new)
		}
	}
}
