pub mod domain;
pub mod library;
pub mod memory;
pub mod ports;
pub mod protocol;
pub mod session;

pub use domain::{Feedback, FeedbackState, Photo};
pub use library::PhotoLibrary;
pub use ports::{
    DeltaStream, FeedbackTransport, MediaStore, PortError, PortResult, RecordStore, SecretStore,
    TurnHandle, TurnStream,
};
pub use session::{FeedbackSession, SessionConfig};
