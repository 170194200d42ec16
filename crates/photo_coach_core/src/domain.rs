//! crates/photo_coach_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A captured photograph. Immutable once created, except for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub id: Uuid,
    pub captured_at: DateTime<Utc>,
    pub image_path: String,
    pub thumbnail_path: String,
}

/// The coaching feedback attached to a single photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub id: Uuid,
    pub photo_id: Uuid,
    pub content: String,
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
    /// Server-issued id of the last completed turn, used to chain follow-ups.
    pub turn_handle: Option<String>,
}

impl Feedback {
    /// Returns the stored text if this feedback finished successfully.
    pub fn completed_content(&self) -> Option<&str> {
        if self.is_complete && !self.content.is_empty() {
            Some(&self.content)
        } else {
            None
        }
    }
}

/// The observable state of a feedback session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FeedbackState {
    #[default]
    Idle,
    Loading,
    Streaming(String),
    Complete(String),
    Error(String),
}

impl FeedbackState {
    /// The text a view should render for this state.
    pub fn display_text(&self) -> &str {
        match self {
            FeedbackState::Idle | FeedbackState::Loading => "",
            FeedbackState::Streaming(text)
            | FeedbackState::Complete(text)
            | FeedbackState::Error(text) => text,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, FeedbackState::Loading)
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, FeedbackState::Streaming(_))
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, FeedbackState::Complete(_))
    }

    pub fn has_error(&self) -> bool {
        matches!(self, FeedbackState::Error(_))
    }

    /// True while a turn is in flight. Presentation disables its triggers on this.
    pub fn is_busy(&self) -> bool {
        self.is_loading() || self.is_streaming()
    }
}
