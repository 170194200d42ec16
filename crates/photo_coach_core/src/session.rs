//! crates/photo_coach_core/src/session.rs
//!
//! The feedback session engine. Drives one photo's turns against the transport,
//! folds streamed fragments into an observable state, and checkpoints finished
//! turns to the record store.

use crate::domain::{Feedback, FeedbackState, Photo};
use crate::ports::{FeedbackTransport, MediaStore, PortError, PortResult, RecordStore, TurnStream};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Largest side, in pixels, of an image submitted for analysis.
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// Minimum spacing between two `Streaming` updates.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(100);

/// Tuning knobs for a `FeedbackSession`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_dimension: u32,
    pub update_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            update_interval: DEFAULT_UPDATE_INTERVAL,
        }
    }
}

/// Renders the transcript prefix shown while a follow-up answer streams in.
pub fn followup_prefix(prior: &str, question: &str) -> String {
    format!("{}\n\n---\n\n**Q:** {}\n\n", prior, question)
}

/// The state machine behind one photo's feedback view.
///
/// A session has a single owner. Calls for the same photo must not overlap;
/// callers gate their triggers on `FeedbackState::is_busy`.
pub struct FeedbackSession {
    records: Arc<dyn RecordStore>,
    media: Arc<dyn MediaStore>,
    transport: Arc<dyn FeedbackTransport>,
    config: SessionConfig,
    /// The last completed turn and the photo it belongs to.
    turn_handle: Option<(Uuid, String)>,
    state: watch::Sender<FeedbackState>,
}

impl FeedbackSession {
    pub fn new(
        records: Arc<dyn RecordStore>,
        media: Arc<dyn MediaStore>,
        transport: Arc<dyn FeedbackTransport>,
        config: SessionConfig,
    ) -> Self {
        let (state, _) = watch::channel(FeedbackState::Idle);
        Self {
            records,
            media,
            transport,
            config,
            turn_handle: None,
            state,
        }
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> FeedbackState {
        self.state.borrow().clone()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<FeedbackState> {
        self.state.subscribe()
    }

    /// The handle a follow-up would be chained to.
    pub fn turn_handle(&self) -> Option<&str> {
        self.turn_handle.as_ref().map(|(_, handle)| handle.as_str())
    }

    //=====================================================================================
    // Public Operations
    //=====================================================================================

    /// Restores a previously finished analysis without touching the network.
    pub async fn load_existing(&mut self, photo: &Photo) {
        self.forget_other_photos(photo);
        if let Some(feedback) = self.stored_completion(photo).await {
            self.adopt(feedback);
        }
    }

    /// Produces feedback for a photo, streaming a fresh turn unless a finished
    /// one is already stored.
    pub async fn fetch_feedback(&mut self, photo: &Photo) {
        self.forget_other_photos(photo);
        if let Some(feedback) = self.stored_completion(photo).await {
            debug!("Photo {} already has complete feedback.", photo.id);
            self.adopt(feedback);
            return;
        }

        let Some(image_data) = self
            .media
            .load_bytes_for_transport(&photo.image_path, self.config.max_dimension)
            .await
        else {
            self.fail(photo, PortError::StorageUnavailable);
            return;
        };

        self.publish(FeedbackState::Loading);
        info!("Starting feedback turn for photo {}.", photo.id);

        if let Err(e) = self.run_initial_turn(photo, &image_data).await {
            self.fail(photo, e);
        }
    }

    /// Starts over with a brand new turn.
    pub async fn retry(&mut self, photo: &Photo) {
        self.reset_state();
        self.fetch_feedback(photo).await;
    }

    /// Asks a follow-up question chained to the last completed turn.
    ///
    /// Blank questions are ignored.
    pub async fn send_followup(&mut self, question: &str, photo: &Photo) {
        let question = question.trim();
        if question.is_empty() {
            debug!("Ignoring blank follow-up for photo {}.", photo.id);
            return;
        }

        let Some(prior_handle) = self.handle_for(photo).map(str::to_string) else {
            self.fail(photo, PortError::NoSessionContext);
            return;
        };

        let prefix = followup_prefix(&self.transcript_base(photo).await, question);

        self.publish(FeedbackState::Loading);
        info!("Sending follow-up for photo {}.", photo.id);

        if let Err(e) = self.run_followup_turn(photo, question, &prior_handle, &prefix).await {
            self.fail(photo, e);
        }
    }

    /// Returns to `Idle` and forgets the chainable handle. Storage is untouched.
    pub fn reset_state(&mut self) {
        self.turn_handle = None;
        self.publish(FeedbackState::Idle);
    }

    //=====================================================================================
    // Turn Execution
    //=====================================================================================

    async fn run_initial_turn(&mut self, photo: &Photo, image_data: &[u8]) -> PortResult<()> {
        // A photo always starts its own top-level turn.
        let turn = self.transport.stream_initial(image_data, None).await?;
        let (text, handle) = self.consume(turn, "").await?;
        self.finish_turn(photo, text, handle).await
    }

    async fn run_followup_turn(
        &mut self,
        photo: &Photo,
        question: &str,
        prior_handle: &str,
        prefix: &str,
    ) -> PortResult<()> {
        let turn = self.transport.stream_followup(question, prior_handle).await?;
        let (transcript, handle) = self.consume(turn, prefix).await?;
        self.finish_turn(photo, transcript, handle).await
    }

    /// Drains a turn, publishing throttled `Streaming` updates, and returns the
    /// full text (prefix included) plus the turn's handle.
    async fn consume(
        &mut self,
        turn: TurnStream,
        prefix: &str,
    ) -> PortResult<(String, Option<String>)> {
        let TurnStream {
            mut deltas,
            turn_handle,
        } = turn;

        let mut accumulated = String::new();
        let mut last_update: Option<Instant> = None;

        while let Some(fragment) = deltas.next().await {
            accumulated.push_str(&fragment?);

            let now = Instant::now();
            let due = last_update
                .map_or(true, |at| now.duration_since(at) >= self.config.update_interval);
            if due {
                self.publish(FeedbackState::Streaming(format!("{}{}", prefix, accumulated)));
                last_update = Some(now);
            }
        }
        drop(deltas);

        if accumulated.is_empty() {
            return Err(PortError::InvalidResponse);
        }

        let handle = turn_handle.resolve().await;
        Ok((format!("{}{}", prefix, accumulated), handle))
    }

    async fn finish_turn(
        &mut self,
        photo: &Photo,
        content: String,
        handle: Option<String>,
    ) -> PortResult<()> {
        self.publish(FeedbackState::Complete(content.clone()));
        self.persist(photo, &content, handle.as_deref()).await?;
        self.turn_handle = handle.map(|handle| (photo.id, handle));
        info!(
            "Feedback turn for photo {} complete ({} chars).",
            photo.id,
            content.len()
        );
        Ok(())
    }

    //=====================================================================================
    // Helpers
    //=====================================================================================

    async fn persist(&self, photo: &Photo, content: &str, handle: Option<&str>) -> PortResult<()> {
        let feedback = match self.records.fetch_feedback(photo.id).await? {
            Some(feedback) => feedback,
            None => self.records.create_feedback(photo.id).await?,
        };
        self.records
            .update_feedback(feedback.id, content, true, handle)
            .await
    }

    async fn stored_completion(&self, photo: &Photo) -> Option<Feedback> {
        match self.records.fetch_feedback(photo.id).await {
            Ok(Some(feedback)) if feedback.completed_content().is_some() => Some(feedback),
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to read feedback for photo {}: {}", photo.id, e);
                None
            }
        }
    }

    fn handle_for(&self, photo: &Photo) -> Option<&str> {
        match &self.turn_handle {
            Some((photo_id, handle)) if *photo_id == photo.id => Some(handle),
            _ => None,
        }
    }

    /// Drops a handle left over from a different photo.
    fn forget_other_photos(&mut self, photo: &Photo) {
        if self.turn_handle.is_some() && self.handle_for(photo).is_none() {
            debug!("Dropping turn handle from another photo before working on {}.", photo.id);
            self.turn_handle = None;
        }
    }

    /// The text a follow-up transcript builds on.
    async fn transcript_base(&self, photo: &Photo) -> String {
        if let Some(feedback) = self.stored_completion(photo).await {
            return feedback.content;
        }
        // The visible result only counts when it came from this photo's own turn.
        match self.state() {
            FeedbackState::Complete(text) if self.handle_for(photo).is_some() => text,
            _ => String::new(),
        }
    }

    fn adopt(&mut self, feedback: Feedback) {
        self.turn_handle = feedback
            .turn_handle
            .map(|handle| (feedback.photo_id, handle));
        self.publish(FeedbackState::Complete(feedback.content));
    }

    fn fail(&mut self, photo: &Photo, error: PortError) {
        warn!("Feedback turn for photo {} failed: {}", photo.id, error);
        self.publish(FeedbackState::Error(error.to_string()));
    }

    fn publish(&self, state: FeedbackState) {
        self.state.send_replace(state);
    }
}
