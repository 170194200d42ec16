//! services/coach/src/adapters/media.rs
//!
//! Filesystem implementation of the `MediaStore` port. Full images and
//! thumbnails live in two sibling directories, named after the photo id.

use async_trait::async_trait;
use image::{imageops::FilterType, DynamicImage, ImageOutputFormat};
use photo_coach_core::ports::{MediaStore, PortError, PortResult};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

const THUMBNAIL_SIZE: u32 = 200;
const THUMBNAIL_QUALITY: u8 = 70;
const TRANSPORT_QUALITY: u8 = 80;

#[derive(Clone, Debug)]
pub struct FsMediaStore {
    photos_dir: PathBuf,
    thumbnails_dir: PathBuf,
}

impl FsMediaStore {
    /// Opens a store rooted at `root`, creating its directories if needed.
    pub async fn open(root: &Path) -> io::Result<Self> {
        let photos_dir = root.join("Photos");
        let thumbnails_dir = root.join("Thumbnails");
        tokio::fs::create_dir_all(&photos_dir).await?;
        tokio::fs::create_dir_all(&thumbnails_dir).await?;
        Ok(Self {
            photos_dir,
            thumbnails_dir,
        })
    }

    async fn read(path: PathBuf) -> PortResult<Vec<u8>> {
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => PortError::NotFound(format!("{} not found", path.display())),
            _ => PortError::Unexpected(e.to_string()),
        })
    }

    async fn remove(path: PathBuf) -> PortResult<()> {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Unexpected(e.to_string())),
        }
    }
}

//=========================================================================================
// Image Processing (blocking)
//=========================================================================================

fn encode_jpeg(image: &DynamicImage, quality: u8) -> image::ImageResult<Vec<u8>> {
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut buffer = Cursor::new(Vec::new());
    rgb.write_to(&mut buffer, ImageOutputFormat::Jpeg(quality))?;
    Ok(buffer.into_inner())
}

fn make_thumbnail(image_data: &[u8]) -> image::ImageResult<Vec<u8>> {
    let image = image::load_from_memory(image_data)?;
    encode_jpeg(&image.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE), THUMBNAIL_QUALITY)
}

/// Re-encodes as JPEG, shrinking so neither side exceeds `max_dimension`.
pub fn downscale_for_transport(image_data: &[u8], max_dimension: u32) -> image::ImageResult<Vec<u8>> {
    let image = image::load_from_memory(image_data)?;
    let image = if image.width() > max_dimension || image.height() > max_dimension {
        image.resize(max_dimension, max_dimension, FilterType::Triangle)
    } else {
        image
    };
    encode_jpeg(&image, TRANSPORT_QUALITY)
}

async fn run_blocking<T, F>(work: F) -> PortResult<T>
where
    F: FnOnce() -> image::ImageResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?
        .map_err(|e| PortError::Unexpected(format!("Image processing failed: {}", e)))
}

//=========================================================================================
// `MediaStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn save_photo(&self, id: Uuid, image_data: &[u8]) -> PortResult<(String, String)> {
        let image_path = format!("{}.jpg", id);
        let thumbnail_path = format!("{}_thumb.jpg", id);

        let source = image_data.to_vec();
        let thumbnail = run_blocking(move || make_thumbnail(&source)).await?;

        tokio::fs::write(self.photos_dir.join(&image_path), image_data)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        tokio::fs::write(self.thumbnails_dir.join(&thumbnail_path), thumbnail)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok((image_path, thumbnail_path))
    }

    async fn load_image(&self, image_path: &str) -> PortResult<Vec<u8>> {
        Self::read(self.photos_dir.join(image_path)).await
    }

    async fn load_thumbnail(&self, thumbnail_path: &str) -> PortResult<Vec<u8>> {
        Self::read(self.thumbnails_dir.join(thumbnail_path)).await
    }

    async fn delete_photo(&self, image_path: &str, thumbnail_path: &str) -> PortResult<()> {
        let image = Self::remove(self.photos_dir.join(image_path)).await;
        let thumbnail = Self::remove(self.thumbnails_dir.join(thumbnail_path)).await;
        image.and(thumbnail)
    }

    async fn load_bytes_for_transport(
        &self,
        image_path: &str,
        max_dimension: u32,
    ) -> Option<Vec<u8>> {
        let original = match self.load_image(image_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Could not read {}: {}", image_path, e);
                return None;
            }
        };

        match run_blocking(move || downscale_for_transport(&original, max_dimension)).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Could not prepare {} for upload: {}", image_path, e);
                None
            }
        }
    }
}
