//! crates/photo_coach_core/src/memory.rs
//!
//! In-memory implementations of the storage ports. Used by tests and by
//! anything that needs a working store without touching the disk.

use crate::domain::{Feedback, Photo};
use crate::ports::{MediaStore, PortError, PortResult, RecordStore, SecretStore};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

fn poisoned<T>(_: T) -> PortError {
    PortError::Unexpected("in-memory store lock poisoned".to_string())
}

//=========================================================================================
// Secret Store
//=========================================================================================

#[derive(Default)]
pub struct InMemorySecretStore {
    key: Mutex<Option<String>>,
}

impl InMemorySecretStore {
    pub fn with_key(key: &str) -> Self {
        Self {
            key: Mutex::new(Some(key.to_string())),
        }
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get_api_key(&self) -> PortResult<Option<String>> {
        Ok(self.key.lock().map_err(poisoned)?.clone())
    }

    async fn set_api_key(&self, key: &str) -> PortResult<()> {
        *self.key.lock().map_err(poisoned)? = Some(key.to_string());
        Ok(())
    }

    async fn delete_api_key(&self) -> PortResult<()> {
        *self.key.lock().map_err(poisoned)? = None;
        Ok(())
    }
}

//=========================================================================================
// Media Store
//=========================================================================================

/// Keeps image bytes in a map. Transport loads return the stored bytes unchanged.
#[derive(Default)]
pub struct InMemoryMediaStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
    transport_loads: AtomicUsize,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `load_bytes_for_transport` has been called.
    pub fn transport_load_count(&self) -> usize {
        self.transport_loads.load(Ordering::SeqCst)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files
            .lock()
            .map(|files| files.contains_key(path))
            .unwrap_or(false)
    }

    /// Drops the stored bytes for a path, simulating a missing artifact.
    pub fn remove(&self, path: &str) {
        if let Ok(mut files) = self.files.lock() {
            files.remove(path);
        }
    }

    fn read(&self, path: &str) -> PortResult<Vec<u8>> {
        self.files
            .lock()
            .map_err(poisoned)?
            .get(path)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Media {} not found", path)))
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn save_photo(&self, id: Uuid, image_data: &[u8]) -> PortResult<(String, String)> {
        let image_path = format!("{}.jpg", id);
        let thumbnail_path = format!("{}_thumb.jpg", id);

        let mut files = self.files.lock().map_err(poisoned)?;
        files.insert(image_path.clone(), image_data.to_vec());
        files.insert(thumbnail_path.clone(), image_data.to_vec());
        Ok((image_path, thumbnail_path))
    }

    async fn load_image(&self, image_path: &str) -> PortResult<Vec<u8>> {
        self.read(image_path)
    }

    async fn load_thumbnail(&self, thumbnail_path: &str) -> PortResult<Vec<u8>> {
        self.read(thumbnail_path)
    }

    async fn delete_photo(&self, image_path: &str, thumbnail_path: &str) -> PortResult<()> {
        let mut files = self.files.lock().map_err(poisoned)?;
        files.remove(image_path);
        files.remove(thumbnail_path);
        Ok(())
    }

    async fn load_bytes_for_transport(
        &self,
        image_path: &str,
        _max_dimension: u32,
    ) -> Option<Vec<u8>> {
        self.transport_loads.fetch_add(1, Ordering::SeqCst);
        self.read(image_path).ok()
    }
}

//=========================================================================================
// Record Store
//=========================================================================================

#[derive(Default)]
struct Records {
    photos: HashMap<Uuid, Photo>,
    feedback: HashMap<Uuid, Feedback>,
}

/// A record store backed by two maps. Feedback is keyed by photo, so the
/// one-feedback-per-photo rule holds structurally.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: Mutex<Records>,
    updates: AtomicUsize,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `update_feedback` has been called.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Inserts a feedback row as-is, replacing any row for the same photo.
    pub fn insert_feedback(&self, feedback: Feedback) {
        if let Ok(mut records) = self.records.lock() {
            records.feedback.insert(feedback.photo_id, feedback);
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create_photo(
        &self,
        id: Uuid,
        image_path: &str,
        thumbnail_path: &str,
    ) -> PortResult<Photo> {
        let photo = Photo {
            id,
            captured_at: Utc::now(),
            image_path: image_path.to_string(),
            thumbnail_path: thumbnail_path.to_string(),
        };
        self.records
            .lock()
            .map_err(poisoned)?
            .photos
            .insert(id, photo.clone());
        Ok(photo)
    }

    async fn get_photo(&self, photo_id: Uuid) -> PortResult<Photo> {
        self.records
            .lock()
            .map_err(poisoned)?
            .photos
            .get(&photo_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Photo {} not found", photo_id)))
    }

    async fn list_photos(&self) -> PortResult<Vec<Photo>> {
        let records = self.records.lock().map_err(poisoned)?;
        let mut photos: Vec<Photo> = records.photos.values().cloned().collect();
        photos.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
        Ok(photos)
    }

    async fn delete_photo(&self, photo_id: Uuid) -> PortResult<()> {
        let mut records = self.records.lock().map_err(poisoned)?;
        records.photos.remove(&photo_id);
        records.feedback.remove(&photo_id);
        Ok(())
    }

    async fn create_feedback(&self, photo_id: Uuid) -> PortResult<Feedback> {
        let mut records = self.records.lock().map_err(poisoned)?;
        let feedback = records
            .feedback
            .entry(photo_id)
            .or_insert_with(|| Feedback {
                id: Uuid::new_v4(),
                photo_id,
                content: String::new(),
                is_complete: false,
                created_at: Utc::now(),
                turn_handle: None,
            });
        Ok(feedback.clone())
    }

    async fn fetch_feedback(&self, photo_id: Uuid) -> PortResult<Option<Feedback>> {
        Ok(self
            .records
            .lock()
            .map_err(poisoned)?
            .feedback
            .get(&photo_id)
            .cloned())
    }

    async fn update_feedback(
        &self,
        feedback_id: Uuid,
        content: &str,
        is_complete: bool,
        turn_handle: Option<&str>,
    ) -> PortResult<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);

        let mut records = self.records.lock().map_err(poisoned)?;
        let feedback = records
            .feedback
            .values_mut()
            .find(|f| f.id == feedback_id)
            .ok_or_else(|| PortError::NotFound(format!("Feedback {} not found", feedback_id)))?;

        feedback.content = content.to_string();
        feedback.is_complete = is_complete;
        feedback.turn_handle = turn_handle.map(str::to_string);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn secret_store_round_trip() {
        let store = InMemorySecretStore::default();
        assert!(!store.has_api_key().await.unwrap());

        store.set_api_key("sk-test").await.unwrap();
        assert_eq!(store.get_api_key().await.unwrap().as_deref(), Some("sk-test"));

        store.delete_api_key().await.unwrap();
        assert!(!store.has_api_key().await.unwrap());
    }

    #[tokio::test]
    async fn create_feedback_is_idempotent_per_photo() {
        let store = InMemoryRecordStore::new();
        let photo_id = Uuid::new_v4();

        let first = store.create_feedback(photo_id).await.unwrap();
        let second = store.create_feedback(photo_id).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn deleting_photo_removes_its_feedback() {
        let store = InMemoryRecordStore::new();
        let photo = store.create_photo(Uuid::new_v4(), "a.jpg", "a_thumb.jpg").await.unwrap();
        store.create_feedback(photo.id).await.unwrap();

        store.delete_photo(photo.id).await.unwrap();
        assert!(store.fetch_feedback(photo.id).await.unwrap().is_none());
        assert!(matches!(store.get_photo(photo.id).await, Err(PortError::NotFound(_))));
    }

    #[tokio::test]
    async fn media_delete_removes_both_artifacts() {
        let store = InMemoryMediaStore::new();
        let (image, thumb) = store.save_photo(Uuid::new_v4(), b"jpeg").await.unwrap();
        assert!(store.contains(&image) && store.contains(&thumb));

        store.delete_photo(&image, &thumb).await.unwrap();
        assert!(!store.contains(&image));
        assert!(!store.contains(&thumb));
    }
}
