//! Session issue/validate/revoke against a real database.

use pocket_db::test_fixtures::TestDatabase;
use pocket_db::{SessionRepository, UserRepository};

/// Load `.env` so `DATABASE_URL` can live there, then open a fixture.
async fn test_database() -> TestDatabase {
    dotenvy::dotenv().ok();
    TestDatabase::new().await
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_session_lifecycle() {
    let test_db = test_database().await;
    let db = &test_db.db;

    let issued = db.sessions.create(test_db.user_id, 1).await.unwrap();
    let session = db.sessions.validate(&issued.token).await.unwrap().unwrap();
    assert_eq!(session.user_id, test_db.user_id);

    db.sessions.revoke(&issued.token).await.unwrap();
    assert!(db.sessions.validate(&issued.token).await.unwrap().is_none());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_expired_session_is_invalid() {
    let test_db = test_database().await;
    let db = &test_db.db;

    let issued = db.sessions.create(test_db.user_id, -1).await.unwrap();
    assert!(db.sessions.validate(&issued.token).await.unwrap().is_none());
    assert!(db.sessions.purge_expired().await.unwrap() >= 1);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_duplicate_email_conflicts() {
    let test_db = test_database().await;
    let db = &test_db.db;

    let user = db.users.get(test_db.user_id).await.unwrap().unwrap();
    let err = db
        .users
        .create(pocket_db::NewUser {
            name: "dup".to_string(),
            email: user.email.clone(),
            password_hash: "x".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, pocket_db::Error::Conflict(_)));

    let found = db.users.find_by_email(&user.email).await.unwrap().unwrap();
    assert_eq!(found.id, user.id);

    test_db.cleanup().await;
}
