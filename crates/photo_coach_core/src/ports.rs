//! crates/photo_coach_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use crate::domain::{Feedback, Photo};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use tokio::sync::oneshot;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
///
/// The display strings double as the messages shown to the user when a turn fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("No API key configured. Please add your OpenAI API key in Settings.")]
    NoCredential,
    #[error("Invalid response from API.")]
    InvalidResponse,
    /// A non-success HTTP status. Carries the server's error body verbatim.
    #[error("{0}")]
    RemoteError(String),
    #[error("No conversation context. Please get a photo analysis first.")]
    NoSessionContext,
    #[error("Could not load photo.")]
    StorageUnavailable,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Streaming Turn Types
//=========================================================================================

/// The text fragments of one turn, in wire order.
pub type DeltaStream = Pin<Box<dyn Stream<Item = PortResult<String>> + Send>>;

/// The server-assigned id of a turn, available once its delta stream has been drained.
#[derive(Debug)]
pub struct TurnHandle {
    receiver: oneshot::Receiver<Option<String>>,
}

impl TurnHandle {
    /// Creates a pending handle and the sender that resolves it.
    pub fn pending() -> (oneshot::Sender<Option<String>>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver })
    }

    /// Creates a handle that is already resolved.
    pub fn ready(handle: Option<String>) -> Self {
        let (sender, this) = Self::pending();
        let _ = sender.send(handle);
        this
    }

    /// Waits for the handle. A stream dropped before completion yields `None`.
    pub async fn resolve(self) -> Option<String> {
        self.receiver.await.ok().flatten()
    }
}

/// One in-flight model turn: the fragment stream plus its deferred turn handle.
pub struct TurnStream {
    pub deltas: DeltaStream,
    pub turn_handle: TurnHandle,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_api_key(&self) -> PortResult<Option<String>>;

    async fn set_api_key(&self, key: &str) -> PortResult<()>;

    async fn delete_api_key(&self) -> PortResult<()>;

    async fn has_api_key(&self) -> PortResult<bool> {
        Ok(self.get_api_key().await?.is_some())
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persists an encoded image and its thumbnail, returning both artifact paths.
    async fn save_photo(&self, id: Uuid, image_data: &[u8]) -> PortResult<(String, String)>;

    async fn load_image(&self, image_path: &str) -> PortResult<Vec<u8>>;

    async fn load_thumbnail(&self, thumbnail_path: &str) -> PortResult<Vec<u8>>;

    /// Removes the image and its thumbnail together.
    async fn delete_photo(&self, image_path: &str, thumbnail_path: &str) -> PortResult<()>;

    /// Loads the image downscaled so neither side exceeds `max_dimension`.
    async fn load_bytes_for_transport(&self, image_path: &str, max_dimension: u32)
        -> Option<Vec<u8>>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    // --- Photo Management ---
    async fn create_photo(
        &self,
        id: Uuid,
        image_path: &str,
        thumbnail_path: &str,
    ) -> PortResult<Photo>;

    async fn get_photo(&self, photo_id: Uuid) -> PortResult<Photo>;

    /// All photos, newest capture first.
    async fn list_photos(&self) -> PortResult<Vec<Photo>>;

    /// Deletes the photo together with its feedback.
    async fn delete_photo(&self, photo_id: Uuid) -> PortResult<()>;

    // --- Feedback Management ---
    /// Creates the empty, incomplete feedback row for a photo. Returns the
    /// existing row if the photo already has one.
    async fn create_feedback(&self, photo_id: Uuid) -> PortResult<Feedback>;

    async fn fetch_feedback(&self, photo_id: Uuid) -> PortResult<Option<Feedback>>;

    async fn update_feedback(
        &self,
        feedback_id: Uuid,
        content: &str,
        is_complete: bool,
        turn_handle: Option<&str>,
    ) -> PortResult<()>;
}

#[async_trait]
pub trait FeedbackTransport: Send + Sync {
    /// Starts a photo analysis turn, optionally chained to a previous turn.
    async fn stream_initial(
        &self,
        image_data: &[u8],
        prior_turn_handle: Option<&str>,
    ) -> PortResult<TurnStream>;

    /// Asks a follow-up question chained to a previous turn.
    async fn stream_followup(
        &self,
        question: &str,
        prior_turn_handle: &str,
    ) -> PortResult<TurnStream>;
}
