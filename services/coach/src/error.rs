//! services/coach/src/error.rs
//!
//! Defines the primary error type for the coach service.

use crate::config::ConfigError;
use photo_coach_core::ports::PortError;

/// The primary error type for the `coach` service.
#[derive(Debug, thiserror::Error)]
pub enum CoachError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure while applying the embedded migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., reading an image file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The feedback session ended in its error state.
    #[error("Feedback failed: {0}")]
    Feedback(String),

    /// Represents bad command-line usage.
    #[error("{0}")]
    Usage(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
