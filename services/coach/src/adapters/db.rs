//! services/coach/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `RecordStore` port from the `core` crate. It handles all interactions
//! with the local SQLite database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use photo_coach_core::domain::{Feedback, Photo};
use photo_coach_core::ports::{PortError, PortResult, RecordStore};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `RecordStore` port.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Creates a new `SqliteRecordStore`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database file behind `database_url`.
    pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct PhotoRecord {
    id: Uuid,
    captured_at: DateTime<Utc>,
    image_path: String,
    thumbnail_path: String,
}
impl PhotoRecord {
    fn to_domain(self) -> Photo {
        Photo {
            id: self.id,
            captured_at: self.captured_at,
            image_path: self.image_path,
            thumbnail_path: self.thumbnail_path,
        }
    }
}

#[derive(FromRow)]
struct FeedbackRecord {
    id: Uuid,
    photo_id: Uuid,
    content: String,
    is_complete: bool,
    created_at: DateTime<Utc>,
    turn_handle: Option<String>,
}
impl FeedbackRecord {
    fn to_domain(self) -> Feedback {
        Feedback {
            id: self.id,
            photo_id: self.photo_id,
            content: self.content,
            is_complete: self.is_complete,
            created_at: self.created_at,
            turn_handle: self.turn_handle,
        }
    }
}

const PHOTO_COLUMNS: &str = "id, captured_at, image_path, thumbnail_path";
const FEEDBACK_COLUMNS: &str = "id, photo_id, content, is_complete, created_at, turn_handle";

//=========================================================================================
// `RecordStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn create_photo(
        &self,
        id: Uuid,
        image_path: &str,
        thumbnail_path: &str,
    ) -> PortResult<Photo> {
        let record = sqlx::query_as::<_, PhotoRecord>(&format!(
            "INSERT INTO photos (id, captured_at, image_path, thumbnail_path) VALUES (?, ?, ?, ?) RETURNING {}",
            PHOTO_COLUMNS
        ))
        .bind(id)
        .bind(Utc::now())
        .bind(image_path)
        .bind(thumbnail_path)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_photo(&self, photo_id: Uuid) -> PortResult<Photo> {
        let record = sqlx::query_as::<_, PhotoRecord>(&format!(
            "SELECT {} FROM photos WHERE id = ?",
            PHOTO_COLUMNS
        ))
        .bind(photo_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Photo {} not found", photo_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn list_photos(&self) -> PortResult<Vec<Photo>> {
        let records = sqlx::query_as::<_, PhotoRecord>(&format!(
            "SELECT {} FROM photos ORDER BY captured_at DESC",
            PHOTO_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let photos = records.into_iter().map(|r| r.to_domain()).collect();
        Ok(photos)
    }

    async fn delete_photo(&self, photo_id: Uuid) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query("DELETE FROM feedback WHERE photo_id = ?")
            .bind(photo_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        sqlx::query("DELETE FROM photos WHERE id = ?")
            .bind(photo_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn create_feedback(&self, photo_id: Uuid) -> PortResult<Feedback> {
        sqlx::query(
            "INSERT INTO feedback (id, photo_id, content, is_complete, created_at) VALUES (?, ?, '', FALSE, ?) ON CONFLICT (photo_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(photo_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        self.fetch_feedback(photo_id)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("Feedback for photo {} not found", photo_id)))
    }

    async fn fetch_feedback(&self, photo_id: Uuid) -> PortResult<Option<Feedback>> {
        let record = sqlx::query_as::<_, FeedbackRecord>(&format!(
            "SELECT {} FROM feedback WHERE photo_id = ?",
            FEEDBACK_COLUMNS
        ))
        .bind(photo_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn update_feedback(
        &self,
        feedback_id: Uuid,
        content: &str,
        is_complete: bool,
        turn_handle: Option<&str>,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE feedback SET content = ?, is_complete = ?, turn_handle = ? WHERE id = ?",
        )
        .bind(content)
        .bind(is_complete)
        .bind(turn_handle)
        .bind(feedback_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Feedback {} not found", feedback_id)));
        }
        Ok(())
    }
}
