// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Strongbox secret and key-material store.
//!
//! Persistence for the credentials a multi-replica service signs and dials
//! with:
//!
//! - **Secrets**: opaque blobs addressed by `(kind, tag)` with an
//!   insert-or-replace write path
//! - **Root keys**: append-only macaroon signing keys and the "newest key
//!   still safe to reuse" query
//! - **JWKS**: the asymmetric signing identity (public set, private key,
//!   expiry) layered on secrets
//! - **Credential vault**: cloud credential attributes, controller logins and
//!   OAuth secrets layered on secrets
//!
//! Every operation goes through a [`Database`] handle whose readiness flag
//! rejects requests until the external migration step has run.
//!
//! # Security Design
//!
//! - Key material and passwords are held in [`strongbox_common_secret::Secret`]
//!   so they print as `[REDACTED]`
//! - Tracing spans skip payload arguments and record only kinds, tags and ids

pub mod cancel;
pub mod config;
pub mod credentials;
pub mod database;
pub mod error;
pub mod jwks;
pub mod namespace;
pub mod pool;
pub mod root_key;
pub mod secrets;
mod timestamp;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cancel::cancellable;
pub use config::DbConfig;
pub use credentials::{
	CloudCredentialTag, ControllerCredentials, CredentialAttributes, CredentialStore,
	CredentialVault,
};
pub use database::{Database, Readiness};
pub use error::{DbError, ErrorCode, Result};
pub use jwks::{JsonWebKey, JsonWebKeySet, JwksManager, JwksStore};
pub use namespace::{
	CloudCredentialNamespace, ControllerNamespace, JwksNamespace, NamespacedSecrets,
	OAuthNamespace, SecretNamespace,
};
pub use pool::create_pool;
pub use root_key::{RootKey, RootKeyBacking, RootKeyRepository};
pub use secrets::{SecretRepository, SecretStore, StoredSecret};
