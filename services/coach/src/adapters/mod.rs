pub mod db;
pub mod media;
pub mod responses;
pub mod secrets;

pub use db::SqliteRecordStore;
pub use media::FsMediaStore;
pub use responses::{OpenAiResponsesAdapter, ResponsesSettings};
pub use secrets::FileSecretStore;
