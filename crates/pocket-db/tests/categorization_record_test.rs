//! Categorization audit records against a real database.

use pocket_db::test_fixtures::TestDatabase;
use pocket_db::{
    CategorizationRepository, GalaxyRepository, NewCategorization, PlanetRepository, WriteTier,
};

/// Load `.env` so `DATABASE_URL` can live there, then open a fixture.
async fn test_database() -> TestDatabase {
    dotenvy::dotenv().ok();
    TestDatabase::new().await
}

fn record(
    user_id: uuid::Uuid,
    planet_id: uuid::Uuid,
    folder_id: uuid::Uuid,
    preview: &str,
    folder: &str,
) -> NewCategorization {
    NewCategorization {
        user_id,
        planet_id: Some(planet_id),
        folder_id,
        content_preview: preview.to_string(),
        suggested_folder: folder.to_string(),
        accepted_folder: folder.to_string(),
        confidence: 0.8,
        reasoning: "matches existing folder".to_string(),
        alternatives: vec!["Misc".to_string()],
    }
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_record_uses_typed_insert_on_migrated_schema() {
    let test_db = test_database().await;
    let user_id = test_db.user_id;
    let db = &test_db.db;

    let galaxy = db.galaxies.find_or_create(user_id, "Groceries").await.unwrap();
    let planet = db.planets.create(user_id, "buy milk", Some(galaxy.id)).await.unwrap();

    let outcome = db
        .categorizations
        .record(record(user_id, planet.id, galaxy.id, "buy milk", "Groceries"))
        .await;

    assert!(outcome.saved());
    assert_eq!(outcome.tier, Some(WriteTier::Typed));
    assert!(outcome.review_id.is_some());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_corrections_only_include_overrides() {
    let test_db = test_database().await;
    let user_id = test_db.user_id;
    let db = &test_db.db;

    let galaxy = db.galaxies.find_or_create(user_id, "Work").await.unwrap();
    let kept = db.planets.create(user_id, "standup notes", Some(galaxy.id)).await.unwrap();
    let moved = db.planets.create(user_id, "dentist   at 3pm", Some(galaxy.id)).await.unwrap();

    db.categorizations
        .record(record(user_id, kept.id, galaxy.id, "standup notes", "Work"))
        .await;
    db.categorizations
        .record(record(user_id, moved.id, galaxy.id, "dentist   at 3pm", "Work"))
        .await;

    let target = db
        .planets
        .attach_to_galaxy(user_id, moved.id, "Health")
        .await
        .unwrap();
    let updated = db
        .categorizations
        .mark_accepted(user_id, moved.id, &target.name)
        .await
        .unwrap();
    assert!(updated);

    let corrections = db.categorizations.recent_corrections(user_id, 50).await.unwrap();
    assert_eq!(corrections.len(), 1);
    assert_eq!(corrections[0].suggested_folder, "Work");
    assert_eq!(corrections[0].accepted_folder, "Health");
    assert_eq!(corrections[0].original_content, "dentist at 3pm");

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_mark_accepted_without_record_is_noop() {
    let test_db = test_database().await;
    let user_id = test_db.user_id;
    let db = &test_db.db;

    let planet = db.planets.create(user_id, "no review", None).await.unwrap();
    let updated = db
        .categorizations
        .mark_accepted(user_id, planet.id, "Anywhere")
        .await
        .unwrap();
    assert!(!updated);

    test_db.cleanup().await;
}
