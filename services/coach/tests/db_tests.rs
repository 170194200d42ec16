//! services/coach/tests/db_tests.rs

use assert_matches::assert_matches;
use coach_lib::adapters::SqliteRecordStore;
use photo_coach_core::ports::{PortError, RecordStore};
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

async fn store() -> SqliteRecordStore {
    // One connection, or every checkout would see a fresh in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = SqliteRecordStore::new(pool);
    store.run_migrations().await.unwrap();
    store
}

async fn add_photo(store: &SqliteRecordStore) -> Uuid {
    let id = Uuid::new_v4();
    store
        .create_photo(id, &format!("{}.jpg", id), &format!("{}_thumb.jpg", id))
        .await
        .unwrap();
    id
}

#[tokio::test]
async fn photos_round_trip_newest_first() {
    let store = store().await;
    let first = add_photo(&store).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = add_photo(&store).await;

    let photo = store.get_photo(first).await.unwrap();
    assert_eq!(photo.image_path, format!("{}.jpg", first));
    assert_eq!(photo.thumbnail_path, format!("{}_thumb.jpg", first));

    let ids: Vec<Uuid> = store.list_photos().await.unwrap().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![second, first]);
}

#[tokio::test]
async fn unknown_photo_is_not_found() {
    let store = store().await;
    assert_matches!(store.get_photo(Uuid::new_v4()).await, Err(PortError::NotFound(_)));
}

#[tokio::test]
async fn feedback_is_one_per_photo() {
    let store = store().await;
    let photo_id = add_photo(&store).await;

    let created = store.create_feedback(photo_id).await.unwrap();
    assert_eq!(created.content, "");
    assert!(!created.is_complete);
    assert_eq!(created.turn_handle, None);

    let again = store.create_feedback(photo_id).await.unwrap();
    assert_eq!(again.id, created.id);
}

#[tokio::test]
async fn update_persists_content_and_handle() {
    let store = store().await;
    let photo_id = add_photo(&store).await;
    let feedback = store.create_feedback(photo_id).await.unwrap();

    store
        .update_feedback(feedback.id, "Nice light.", true, Some("resp_1"))
        .await
        .unwrap();

    let stored = store.fetch_feedback(photo_id).await.unwrap().unwrap();
    assert_eq!(stored.content, "Nice light.");
    assert!(stored.is_complete);
    assert_eq!(stored.turn_handle.as_deref(), Some("resp_1"));
    assert_eq!(stored.completed_content(), Some("Nice light."));

    store
        .update_feedback(feedback.id, "Nice light.\n\nMore.", true, None)
        .await
        .unwrap();
    let stored = store.fetch_feedback(photo_id).await.unwrap().unwrap();
    assert_eq!(stored.turn_handle, None);
}

#[tokio::test]
async fn updating_missing_feedback_is_not_found() {
    let store = store().await;
    let result = store.update_feedback(Uuid::new_v4(), "x", true, None).await;
    assert_matches!(result, Err(PortError::NotFound(_)));
}

#[tokio::test]
async fn deleting_a_photo_removes_its_feedback() {
    let store = store().await;
    let photo_id = add_photo(&store).await;
    store.create_feedback(photo_id).await.unwrap();

    store.delete_photo(photo_id).await.unwrap();

    assert_matches!(store.get_photo(photo_id).await, Err(PortError::NotFound(_)));
    assert_eq!(store.fetch_feedback(photo_id).await.unwrap(), None);
    assert!(store.list_photos().await.unwrap().is_empty());
}
