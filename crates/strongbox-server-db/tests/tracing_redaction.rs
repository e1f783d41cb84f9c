// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Spans and events emitted by the store must carry kinds, tags and ids but
//! never key material or passwords.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use strongbox_common_secret::{SecretBytes, SecretString};
use strongbox_server_db::{
	create_pool, CredentialVault, Database, DbConfig, JwksManager, RootKey, RootKeyRepository,
	SecretRepository, SecretStore,
};
use tracing_subscriber::fmt::MakeWriter;

const SCHEMA: [&str; 2] = [
	include_str!("../migrations/001_secrets.sql"),
	include_str!("../migrations/002_root_keys.sql"),
];

#[derive(Clone, Default)]
struct CapturedOutput {
	buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedOutput {
	fn contents(&self) -> String {
		String::from_utf8(self.buffer.lock().unwrap().clone()).unwrap()
	}
}

impl Write for CapturedOutput {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.buffer.lock().unwrap().extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

impl<'a> MakeWriter<'a> for CapturedOutput {
	type Writer = CapturedOutput;

	fn make_writer(&'a self) -> Self::Writer {
		self.clone()
	}
}

async fn open_store(path: &std::path::Path) -> Database {
	let url = format!("sqlite:{}", path.display());
	let config = DbConfig::new(SecretString::new(url), None).unwrap();
	let db = create_pool(&config).await.unwrap();
	for script in SCHEMA {
		sqlx::raw_sql(script).execute(db.pool().unwrap()).await.unwrap();
	}
	db.mark_migrated();
	db
}

#[tokio::test]
async fn store_operations_never_log_secret_values() {
	let output = CapturedOutput::default();
	let subscriber = tracing_subscriber::fmt()
		.with_max_level(tracing::Level::TRACE)
		.with_ansi(false)
		.with_span_events(tracing_subscriber::fmt::format::FmtSpan::NEW)
		.with_writer(output.clone())
		.finish();
	let _guard = tracing::subscriber::set_default(subscriber);

	let dir = tempfile::tempdir().unwrap();
	let db = open_store(&dir.path().join("store.db")).await;
	let store: Arc<dyn SecretStore> = Arc::new(SecretRepository::new(db.clone()));

	let vault = CredentialVault::new(Arc::clone(&store));
	vault
		.put_controller_credentials(
			"ctl-redaction",
			"admin",
			&SecretString::new("pa55w0rd-do-not-log".to_string()),
		)
		.await
		.unwrap();
	let creds = vault.get_controller_credentials("ctl-redaction").await.unwrap();
	tracing::info!(?creds, "fetched");

	let jwks = JwksManager::new(Arc::clone(&store));
	jwks
		.put_private_key(&SecretBytes::from_slice(b"private-key-do-not-log"))
		.await
		.unwrap();

	let now = Utc::now();
	let root_keys = RootKeyRepository::new(db);
	let key = RootKey {
		id: b"root-key-id".to_vec(),
		created: now,
		expires: now + Duration::hours(24),
		root_key: SecretBytes::from_slice(b"root-material-do-not-log"),
	};
	root_keys.insert_key(&key).await.unwrap();
	tracing::info!(?key, "inserted");

	let logged = output.contents();
	assert!(logged.contains("ctl-redaction"), "{logged}");
	assert!(logged.contains("root-key-id"), "{logged}");
	assert!(logged.contains("[REDACTED]"), "{logged}");
	assert!(!logged.contains("pa55w0rd-do-not-log"), "{logged}");
	assert!(!logged.contains("private-key-do-not-log"), "{logged}");
	assert!(!logged.contains("root-material-do-not-log"), "{logged}");
}
