//! services/coach/tests/media_tests.rs

use assert_matches::assert_matches;
use coach_lib::adapters::FsMediaStore;
use image::{ImageOutputFormat, RgbImage};
use photo_coach_core::ports::{MediaStore, PortError};
use std::io::Cursor;
use uuid::Uuid;

fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageOutputFormat::Png)
        .unwrap();
    buffer.into_inner()
}

#[tokio::test]
async fn save_writes_image_and_small_thumbnail() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsMediaStore::open(dir.path()).await.unwrap();
    let id = Uuid::new_v4();
    let original = png(800, 400);

    let (image_path, thumbnail_path) = store.save_photo(id, &original).await.unwrap();
    assert_eq!(image_path, format!("{}.jpg", id));
    assert_eq!(thumbnail_path, format!("{}_thumb.jpg", id));

    assert_eq!(store.load_image(&image_path).await.unwrap(), original);

    let thumbnail = image::load_from_memory(&store.load_thumbnail(&thumbnail_path).await.unwrap()).unwrap();
    assert_eq!((thumbnail.width(), thumbnail.height()), (200, 100));
}

#[tokio::test]
async fn transport_bytes_are_downscaled_jpeg() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsMediaStore::open(dir.path()).await.unwrap();
    let (image_path, _) = store.save_photo(Uuid::new_v4(), &png(2000, 1000)).await.unwrap();

    let bytes = store.load_bytes_for_transport(&image_path, 1024).await.unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Jpeg);

    let prepared = image::load_from_memory(&bytes).unwrap();
    assert_eq!((prepared.width(), prepared.height()), (1024, 512));
}

#[tokio::test]
async fn small_images_keep_their_size() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsMediaStore::open(dir.path()).await.unwrap();
    let (image_path, _) = store.save_photo(Uuid::new_v4(), &png(300, 200)).await.unwrap();

    let bytes = store.load_bytes_for_transport(&image_path, 1024).await.unwrap();
    let prepared = image::load_from_memory(&bytes).unwrap();
    assert_eq!((prepared.width(), prepared.height()), (300, 200));
}

#[tokio::test]
async fn missing_image_yields_nothing_for_transport() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsMediaStore::open(dir.path()).await.unwrap();

    assert_eq!(store.load_bytes_for_transport("gone.jpg", 1024).await, None);
    assert_matches!(store.load_image("gone.jpg").await, Err(PortError::NotFound(_)));
}

#[tokio::test]
async fn undecodable_bytes_are_rejected_on_save() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsMediaStore::open(dir.path()).await.unwrap();

    let result = store.save_photo(Uuid::new_v4(), b"not an image").await;
    assert_matches!(result, Err(PortError::Unexpected(_)));
}

#[tokio::test]
async fn delete_removes_both_files_and_tolerates_repeats() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsMediaStore::open(dir.path()).await.unwrap();
    let (image_path, thumbnail_path) = store.save_photo(Uuid::new_v4(), &png(64, 64)).await.unwrap();

    store.delete_photo(&image_path, &thumbnail_path).await.unwrap();
    assert_matches!(store.load_image(&image_path).await, Err(PortError::NotFound(_)));
    assert_matches!(store.load_thumbnail(&thumbnail_path).await, Err(PortError::NotFound(_)));

    store.delete_photo(&image_path, &thumbnail_path).await.unwrap();
}
