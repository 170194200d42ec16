//! crates/photo_coach_core/src/library.rs
//!
//! Photo lifecycle: capture, listing and deletion across the media and record stores.

use crate::domain::Photo;
use crate::ports::{MediaStore, PortResult, RecordStore};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct PhotoLibrary {
    records: Arc<dyn RecordStore>,
    media: Arc<dyn MediaStore>,
}

impl PhotoLibrary {
    pub fn new(records: Arc<dyn RecordStore>, media: Arc<dyn MediaStore>) -> Self {
        Self { records, media }
    }

    /// Stores a freshly captured image and opens an empty feedback row for it.
    pub async fn capture(&self, image_data: &[u8]) -> PortResult<Photo> {
        let id = Uuid::new_v4();
        let (image_path, thumbnail_path) = self.media.save_photo(id, image_data).await?;

        let photo = match self
            .records
            .create_photo(id, &image_path, &thumbnail_path)
            .await
        {
            Ok(photo) => photo,
            Err(e) => {
                // Don't leave orphaned artifacts behind.
                if let Err(cleanup) = self.media.delete_photo(&image_path, &thumbnail_path).await {
                    warn!("Failed to clean up media for photo {}: {}", id, cleanup);
                }
                return Err(e);
            }
        };

        self.records.create_feedback(photo.id).await?;
        info!("Captured photo {}.", photo.id);
        Ok(photo)
    }

    pub async fn get(&self, photo_id: Uuid) -> PortResult<Photo> {
        self.records.get_photo(photo_id).await
    }

    /// All photos, newest first.
    pub async fn photos(&self) -> PortResult<Vec<Photo>> {
        self.records.list_photos().await
    }

    pub async fn thumbnail(&self, photo: &Photo) -> PortResult<Vec<u8>> {
        self.media.load_thumbnail(&photo.thumbnail_path).await
    }

    /// Removes the photo, its feedback and both image artifacts.
    ///
    /// Rows go first. A failed file removal only leaves orphaned files behind.
    pub async fn delete(&self, photo: &Photo) -> PortResult<()> {
        self.records.delete_photo(photo.id).await?;
        if let Err(e) = self
            .media
            .delete_photo(&photo.image_path, &photo.thumbnail_path)
            .await
        {
            warn!("Failed to remove media for photo {}: {}", photo.id, e);
        }
        info!("Deleted photo {}.", photo.id);
        Ok(())
    }
}
