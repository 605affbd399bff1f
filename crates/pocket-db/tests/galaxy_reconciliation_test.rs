//! Folder reconciliation against a real database.
//!
//! Covers find-or-create races, moving planets and images between galaxies,
//! and removal of galaxies left empty.

use std::sync::Arc;

use pocket_db::test_fixtures::TestDatabase;
use pocket_db::{
    GalaxyRepository, ImageRepository, NewImage, PlanetRepository, Error,
};

/// Load `.env` so `DATABASE_URL` can live there, then open a fixture.
async fn test_database() -> TestDatabase {
    dotenvy::dotenv().ok();
    TestDatabase::new().await
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_find_or_create_is_idempotent_under_concurrency() {
    let test_db = test_database().await;
    let user_id = test_db.user_id;
    let db = Arc::new(test_db.db.clone());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = db.clone();
            tokio::spawn(async move { db.galaxies.find_or_create(user_id, " Travel ").await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1, "all callers must converge on one galaxy");

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM galaxy WHERE user_id = $1 AND name = 'Travel'")
            .bind(user_id)
            .fetch_one(&test_db.pool)
            .await
            .unwrap();
    assert_eq!(count, 1);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_attach_moves_planet_and_drops_empty_galaxy() {
    let test_db = test_database().await;
    let user_id = test_db.user_id;
    let db = &test_db.db;

    let work = db.galaxies.find_or_create(user_id, "Work").await.unwrap();
    let planet = db
        .planets
        .create(user_id, "quarterly report", Some(work.id))
        .await
        .unwrap();

    let target = db
        .planets
        .attach_to_galaxy(user_id, planet.id, "Reports")
        .await
        .unwrap();
    assert_eq!(target.name, "Reports");

    let links: Vec<uuid::Uuid> =
        sqlx::query_scalar("SELECT galaxy_id FROM galaxy_planet WHERE planet_id = $1")
            .bind(planet.id)
            .fetch_all(&test_db.pool)
            .await
            .unwrap();
    assert_eq!(links, vec![target.id]);

    assert!(db.galaxies.get(user_id, work.id).await.unwrap().is_none());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_attach_keeps_unrelated_empty_galaxy() {
    let test_db = test_database().await;
    let user_id = test_db.user_id;
    let db = &test_db.db;

    let fresh = db.galaxies.find_or_create(user_id, "Someday").await.unwrap();
    let planet = db.planets.create(user_id, "loose note", None).await.unwrap();

    db.planets
        .attach_to_galaxy(user_id, planet.id, "Ideas")
        .await
        .unwrap();

    assert!(db.galaxies.get(user_id, fresh.id).await.unwrap().is_some());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_deleting_last_planet_removes_galaxy() {
    let test_db = test_database().await;
    let user_id = test_db.user_id;
    let db = &test_db.db;

    let galaxy = db.galaxies.find_or_create(user_id, "Groceries").await.unwrap();
    let a = db.planets.create(user_id, "milk", Some(galaxy.id)).await.unwrap();
    let b = db.planets.create(user_id, "eggs", Some(galaxy.id)).await.unwrap();

    db.planets.delete(user_id, a.id).await.unwrap();
    assert!(db.galaxies.get(user_id, galaxy.id).await.unwrap().is_some());

    db.planets.delete(user_id, b.id).await.unwrap();
    assert!(db.galaxies.get(user_id, galaxy.id).await.unwrap().is_none());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_galaxy_with_image_survives_planet_delete() {
    let test_db = test_database().await;
    let user_id = test_db.user_id;
    let db = &test_db.db;

    let galaxy = db.galaxies.find_or_create(user_id, "Trips").await.unwrap();
    let planet = db.planets.create(user_id, "packing list", Some(galaxy.id)).await.unwrap();
    let image = db
        .images
        .create(
            NewImage {
                user_id,
                bucket: "user-images".to_string(),
                object_key: format!("{}/trips/{}.png", user_id, uuid::Uuid::new_v4()),
                content_type: "image/png".to_string(),
                size_bytes: 4,
                checksum_sha256: "00".repeat(32),
                is_public: false,
            },
            Some(galaxy.id),
        )
        .await
        .unwrap();

    db.planets.delete(user_id, planet.id).await.unwrap();
    assert!(db.galaxies.get(user_id, galaxy.id).await.unwrap().is_some());

    let deleted = db.images.delete(user_id, image.id).await.unwrap();
    assert_eq!(deleted.object_key, image.object_key);
    assert!(db.galaxies.get(user_id, galaxy.id).await.unwrap().is_none());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_dashboard_contents_include_orphans() {
    let test_db = test_database().await;
    let user_id = test_db.user_id;
    let db = &test_db.db;

    let galaxy = db.galaxies.find_or_create(user_id, "Books").await.unwrap();
    db.planets.create(user_id, "Dune", Some(galaxy.id)).await.unwrap();
    let orphan = db.planets.create(user_id, "stray thought", None).await.unwrap();

    let folders = db.galaxies.list_with_contents(user_id).await.unwrap();
    assert_eq!(folders.len(), 2);

    let books = folders.iter().find(|f| f.name == "Books").unwrap();
    assert_eq!(books.planet_count, 1);
    assert!(!books.is_virtual);

    let virtual_folder = folders.last().unwrap();
    assert!(virtual_folder.is_virtual);
    assert_eq!(virtual_folder.planets[0].id, orphan.id);

    let orphans = db.planets.list_orphans(user_id).await.unwrap();
    assert_eq!(orphans.len(), 1);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_rename_conflict_and_scoping() {
    let test_db = test_database().await;
    let user_id = test_db.user_id;
    let other = test_db.another_user().await;
    let db = &test_db.db;

    let a = db.galaxies.find_or_create(user_id, "Alpha").await.unwrap();
    db.galaxies.find_or_create(user_id, "Beta").await.unwrap();

    let err = db.galaxies.rename(user_id, a.id, "Beta").await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let err = db.galaxies.rename(other, a.id, "Gamma").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    // Same name is fine for a different user.
    let theirs = db.galaxies.find_or_create(other, "Alpha").await.unwrap();
    assert_ne!(theirs.id, a.id);

    let _ = sqlx::query("DELETE FROM app_user WHERE id = $1")
        .bind(other)
        .execute(&test_db.pool)
        .await;
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_attach_image_moves_between_galaxies() {
    let test_db = test_database().await;
    let user_id = test_db.user_id;
    let db = &test_db.db;

    let from = db.galaxies.find_or_create(user_id, "Inbox").await.unwrap();
    let image = db
        .images
        .create(
            NewImage {
                user_id,
                bucket: "user-images".to_string(),
                object_key: format!("{}/inbox/{}.jpg", user_id, uuid::Uuid::new_v4()),
                content_type: "image/jpeg".to_string(),
                size_bytes: 10,
                checksum_sha256: "ab".repeat(32),
                is_public: false,
            },
            Some(from.id),
        )
        .await
        .unwrap();

    let to = db
        .images
        .attach_to_galaxy(user_id, image.id, "Photos")
        .await
        .unwrap();

    assert_eq!(to.name, "Photos");
    assert!(db.galaxies.get(user_id, from.id).await.unwrap().is_none());

    test_db.cleanup().await;
}
