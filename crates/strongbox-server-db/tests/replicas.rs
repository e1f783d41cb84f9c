// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Several independent pools on one database file, standing in for service
//! replicas that share a store without talking to each other.

use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, DurationRound, Utc};
use strongbox_common_secret::{SecretBytes, SecretString};
use strongbox_server_db::{
	cancellable, create_pool, Database, DbConfig, DbError, ErrorCode, JsonWebKeySet, JwksManager,
	RootKey, RootKeyBacking, RootKeyRepository, SecretRepository, SecretStore, StoredSecret,
};
use tokio_util::sync::CancellationToken;

const SCHEMA: [&str; 2] = [
	include_str!("../migrations/001_secrets.sql"),
	include_str!("../migrations/002_root_keys.sql"),
];

async fn open_replica(path: &Path) -> Database {
	let url = format!("sqlite:{}", path.display());
	let config = DbConfig::new(SecretString::new(url), Some(4)).unwrap();
	let db = create_pool(&config).await.unwrap();
	let pool = db.pool().unwrap();
	for script in SCHEMA {
		sqlx::raw_sql(script).execute(pool).await.unwrap();
	}
	db.mark_migrated();
	db
}

async fn count_secrets(db: &Database, kind: &str, tag: &str) -> i64 {
	sqlx::query_scalar("SELECT COUNT(*) FROM secrets WHERE kind = ? AND tag = ?")
		.bind(kind)
		.bind(tag)
		.fetch_one(db.ready().unwrap())
		.await
		.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_upserts_from_replicas_leave_one_row() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("store.db");
	let a = open_replica(&path).await;
	let b = open_replica(&path).await;

	let repos = [
		Arc::new(SecretRepository::new(a.clone())),
		Arc::new(SecretRepository::new(b.clone())),
	];

	let mut handles = Vec::new();
	for i in 0..16u8 {
		let repo = Arc::clone(&repos[usize::from(i % 2)]);
		handles.push(tokio::spawn(async move {
			repo
				.upsert_secret(&StoredSecret::new("generic", "contended", vec![i]))
				.await
		}));
	}
	for handle in handles {
		handle.await.unwrap().unwrap();
	}

	assert_eq!(count_secrets(&a, "generic", "contended").await, 1);
	let seen_by_a = repos[0].get_secret("generic", "contended").await.unwrap();
	let seen_by_b = repos[1].get_secret("generic", "contended").await.unwrap();
	assert_eq!(seen_by_a, seen_by_b);
	assert!(seen_by_a.data[0] < 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn racing_issuers_may_both_mint_and_both_keys_verify() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("store.db");
	let a = RootKeyRepository::new(open_replica(&path).await);
	let b = RootKeyRepository::new(open_replica(&path).await);

	let now = Utc::now().duration_round(Duration::milliseconds(1)).unwrap();
	let window = (
		now - Duration::hours(1),
		now + Duration::hours(12),
		now + Duration::hours(36),
	);

	// Both replicas observe an empty window before either inserts.
	assert!(a.find_latest_key(window.0, window.1, window.2).await.unwrap().is_none());
	assert!(b.find_latest_key(window.0, window.1, window.2).await.unwrap().is_none());

	let key_a = RootKey {
		id: b"replica-a".to_vec(),
		created: now,
		expires: now + Duration::hours(24),
		root_key: SecretBytes::from_slice(b"material-a"),
	};
	let key_b = RootKey {
		id: b"replica-b".to_vec(),
		created: now + Duration::milliseconds(1),
		expires: now + Duration::hours(24),
		root_key: SecretBytes::from_slice(b"material-b"),
	};
	let (ra, rb) = tokio::join!(a.insert_key(&key_a), b.insert_key(&key_b));
	ra.unwrap();
	rb.unwrap();

	assert_eq!(b.get_key(b"replica-a").await.unwrap(), Some(key_a));
	assert_eq!(a.get_key(b"replica-b").await.unwrap(), Some(key_b.clone()));

	let latest = a.find_latest_key(window.0, window.1, window.2).await.unwrap();
	assert_eq!(latest, Some(key_b));
}

#[tokio::test]
async fn same_root_key_id_from_two_replicas_conflicts() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("store.db");
	let a = RootKeyRepository::new(open_replica(&path).await);
	let b = RootKeyRepository::new(open_replica(&path).await);

	let now = Utc::now();
	let key = RootKey {
		id: b"shared-id".to_vec(),
		created: now,
		expires: now + Duration::hours(24),
		root_key: SecretBytes::from_slice(b"first"),
	};
	a.insert_key(&key).await.unwrap();

	let err = b.insert_key(&key).await.unwrap_err();
	assert_eq!(err.code(), ErrorCode::AlreadyExists);

	// The loser re-reads the winner instead of retrying the insert.
	let winner = b.get_key(b"shared-id").await.unwrap().unwrap();
	assert_eq!(winner.root_key.expose(), &b"first".to_vec());
}

#[tokio::test]
async fn rotation_on_one_replica_is_visible_on_another() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("store.db");
	let a: Arc<dyn SecretStore> = Arc::new(SecretRepository::new(open_replica(&path).await));
	let b: Arc<dyn SecretStore> = Arc::new(SecretRepository::new(open_replica(&path).await));

	let set: JsonWebKeySet =
		serde_json::from_str(r#"{"keys":[{"kty":"OKP","kid":"k1","crv":"Ed25519","x":"AAAA"}]}"#)
			.unwrap();
	let expiry = Utc::now().duration_round(Duration::seconds(1)).unwrap() + Duration::days(90);

	JwksManager::new(a)
		.rotate(&set, &SecretBytes::from_slice(b"seed"), expiry)
		.await
		.unwrap();

	let reader = JwksManager::new(b);
	assert_eq!(reader.get_public_key_set().await.unwrap(), set);
	assert_eq!(reader.get_expiry().await.unwrap(), expiry);
}

#[tokio::test]
async fn cancelled_request_never_reaches_the_store() {
	let dir = tempfile::tempdir().unwrap();
	let db = open_replica(&dir.path().join("store.db")).await;
	let repo = SecretRepository::new(db.clone());

	let token = CancellationToken::new();
	token.cancel();
	let result = cancellable(
		&token,
		repo.upsert_secret(&StoredSecret::new("generic", "never", b"x".to_vec())),
	)
	.await;

	assert!(matches!(result, Err(DbError::Cancelled)));
	assert_eq!(count_secrets(&db, "generic", "never").await, 0);
}

#[tokio::test]
async fn operations_complete_within_caller_deadline() {
	let dir = tempfile::tempdir().unwrap();
	let db = open_replica(&dir.path().join("store.db")).await;
	let repo = SecretRepository::new(db);

	let result = tokio::time::timeout(
		std::time::Duration::from_secs(5),
		repo.get_secret("generic", "missing"),
	)
	.await
	.unwrap();
	assert!(result.unwrap_err().is_not_found());
}
