// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential services on top of the strongbox store.
//!
//! - **Rotation**: [`JwksRotator`] keeps an Ed25519 signing identity
//!   installed and replaces it once its expiry passes
//! - **Caching**: [`CachedCredentialStore`] serves the public key set and the
//!   OAuth signing key from memory for a bounded time

pub mod cache;
pub mod config;
pub mod error;
pub mod keygen;
pub mod rotator;

pub use cache::CachedCredentialStore;
pub use config::CredentialsConfig;
pub use error::{CredentialsError, CredentialsResult};
pub use keygen::{generate_jwk, signing_key, GeneratedKey};
pub use rotator::{JwksRotator, RotationOutcome};
