//! Storage-level guarantees: constraints, cascades, purge.

use authkeep::db::{NewUser, Store, StoreError, UserUpdate};
use chrono::{Duration, Utc};

async fn temp_store() -> Store {
    let db_path =
        std::env::temp_dir().join(format!("authkeep-store-test-{}.db", uuid::Uuid::new_v4()));
    Store::new(&format!("sqlite:{}", db_path.display()))
        .await
        .expect("failed to open store")
}

fn new_user(username: &str, email: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: email.to_string(),
        password_hash: "$argon2id$not-a-real-hash".to_string(),
        full_name: None,
        is_admin: false,
    }
}

#[tokio::test]
async fn test_duplicate_username_and_email_conflict() {
    let store = temp_store().await;
    store
        .create_user(new_user("alice", "alice@example.com"))
        .await
        .unwrap();

    let err = store
        .create_user(new_user("alice", "other@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(ref msg) if msg == "Username already exists"));

    let err = store
        .create_user(new_user("alice2", "alice@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(ref msg) if msg == "Email already exists"));
}

#[tokio::test]
async fn test_username_conflict_reported_before_email() {
    let store = temp_store().await;
    store
        .create_user(new_user("alice", "alice@example.com"))
        .await
        .unwrap();

    let err = store
        .create_user(new_user("alice", "alice@example.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Conflict(ref msg) if msg == "Username already exists"));
    assert_eq!(store.list_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_find_user_by_email() {
    let store = temp_store().await;
    let alice = store
        .create_user(new_user("alice", "alice@example.com"))
        .await
        .unwrap();

    let found = store
        .get_user_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, alice);

    assert!(
        store
            .get_user_by_email("nobody@example.com")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_session_for_missing_user_is_not_found() {
    let store = temp_store().await;

    let err = store
        .create_session(4242, "orphan-token", Utc::now() + Duration::days(1))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::NotFound(_)));
    assert!(store.get_session_by_token("orphan-token").await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_session_token_conflicts() {
    let store = temp_store().await;
    let user = store
        .create_user(new_user("alice", "alice@example.com"))
        .await
        .unwrap();
    let expires = Utc::now() + Duration::days(1);

    store.create_session(user.id, "same", expires).await.unwrap();
    let err = store
        .create_session(user.id, "same", expires)
        .await
        .unwrap_err();

    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_invalidate_is_idempotent() {
    let store = temp_store().await;
    let user = store
        .create_user(new_user("alice", "alice@example.com"))
        .await
        .unwrap();
    store
        .create_session(user.id, "tok", Utc::now() + Duration::days(1))
        .await
        .unwrap();

    assert_eq!(store.invalidate_session("tok").await.unwrap(), 1);
    let first = store.get_session_by_token("tok").await.unwrap().unwrap();

    store.invalidate_session("tok").await.unwrap();
    let second = store.get_session_by_token("tok").await.unwrap().unwrap();

    assert!(!first.is_valid);
    assert_eq!(first, second);
    assert_eq!(store.invalidate_session("never-issued").await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_user_cascades_sessions() {
    let store = temp_store().await;
    let alice = store
        .create_user(new_user("alice", "alice@example.com"))
        .await
        .unwrap();
    let bob = store
        .create_user(new_user("bob", "bob@example.com"))
        .await
        .unwrap();
    let expires = Utc::now() + Duration::days(1);

    store.create_session(alice.id, "a1", expires).await.unwrap();
    store.create_session(alice.id, "a2", expires).await.unwrap();
    store.create_session(bob.id, "b1", expires).await.unwrap();

    store.delete_user(alice.id).await.unwrap();

    assert!(store.get_session_by_token("a1").await.unwrap().is_none());
    assert!(store.get_session_by_token("a2").await.unwrap().is_none());
    assert!(store.get_session_by_token("b1").await.unwrap().is_some());

    let report = store.health_report().await.unwrap();
    assert_eq!(report.total_sessions, 1);
    assert_eq!(report.orphaned_sessions, 0);

    let err = store.delete_user(alice.id).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_deactivation_revokes_sessions() {
    let store = temp_store().await;
    let user = store
        .create_user(new_user("alice", "alice@example.com"))
        .await
        .unwrap();
    store
        .create_session(user.id, "tok", Utc::now() + Duration::days(1))
        .await
        .unwrap();

    let updated = store
        .update_user(
            user.id,
            UserUpdate {
                is_active: Some(false),
                ..UserUpdate::default()
            },
        )
        .await
        .unwrap();

    assert!(!updated.is_active);
    let session = store.get_session_by_token("tok").await.unwrap().unwrap();
    assert!(!session.is_valid);
}

#[tokio::test]
async fn test_purge_keeps_only_active_sessions() {
    let store = temp_store().await;
    let user = store
        .create_user(new_user("alice", "alice@example.com"))
        .await
        .unwrap();
    let now = Utc::now();

    store
        .create_session(user.id, "active", now + Duration::days(1))
        .await
        .unwrap();
    store
        .create_session(user.id, "expired", now - Duration::minutes(1))
        .await
        .unwrap();
    store
        .create_session(user.id, "revoked", now + Duration::days(1))
        .await
        .unwrap();
    store.invalidate_session("revoked").await.unwrap();

    let before = store.health_report().await.unwrap();
    assert_eq!(before.expired_valid_sessions, 1);

    let purged = store.purge_sessions(now).await.unwrap();
    assert_eq!(purged, 2);

    assert!(store.get_session_by_token("active").await.unwrap().is_some());
    assert!(store.get_session_by_token("expired").await.unwrap().is_none());
    assert!(store.get_session_by_token("revoked").await.unwrap().is_none());

    assert_eq!(store.purge_sessions(now).await.unwrap(), 0);
}

#[tokio::test]
async fn test_purged_token_is_never_reissued() {
    let store = temp_store().await;
    let user = store
        .create_user(new_user("alice", "alice@example.com"))
        .await
        .unwrap();
    let expires = Utc::now() + Duration::days(1);

    store.create_session(user.id, "tok-1", expires).await.unwrap();
    store.invalidate_session("tok-1").await.unwrap();
    assert_eq!(store.purge_sessions(Utc::now()).await.unwrap(), 1);

    let err = store
        .create_session(user.id, "tok-1", expires)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(ref msg) if msg == "Session token already issued"));
    assert!(store.get_session_by_token("tok-1").await.unwrap().is_none());

    let err = store
        .record_login(user.id, "tok-1", expires)
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_rejected_session_does_not_spend_token() {
    let store = temp_store().await;
    let user = store
        .create_user(new_user("alice", "alice@example.com"))
        .await
        .unwrap();
    let expires = Utc::now() + Duration::days(1);

    store
        .create_session(4242, "fresh", expires)
        .await
        .unwrap_err();

    let session = store.create_session(user.id, "fresh", expires).await.unwrap();
    assert!(session.is_valid);
}

#[tokio::test]
async fn test_reopening_store_skips_applied_migrations() {
    let db_path =
        std::env::temp_dir().join(format!("authkeep-store-test-{}.db", uuid::Uuid::new_v4()));
    let url = format!("sqlite:{}", db_path.display());

    let store = Store::new(&url).await.unwrap();
    store
        .create_user(new_user("alice", "alice@example.com"))
        .await
        .unwrap();
    drop(store);

    let reopened = Store::new(&url).await.unwrap();
    assert!(reopened.migrate().await.unwrap().is_empty());

    let alice = reopened.get_user_by_username("alice").await.unwrap().unwrap();
    assert!(alice.is_active);
    assert!(!alice.is_admin);
}
