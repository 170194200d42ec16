//! Shared fixtures for the core integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::{stream, StreamExt};
use photo_coach_core::memory::{InMemoryMediaStore, InMemoryRecordStore};
use photo_coach_core::{
    FeedbackSession, FeedbackTransport, Photo, PhotoLibrary, PortError, PortResult,
    SessionConfig, TurnHandle, TurnStream,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the scripted transport does for one turn.
pub enum Script {
    Reply {
        fragments: Vec<&'static str>,
        handle: Option<&'static str>,
        delay: Duration,
    },
    /// Fails before any fragment is produced.
    Reject(PortError),
    /// Yields some fragments, then fails.
    Break {
        fragments: Vec<&'static str>,
        error: PortError,
    },
}

impl Script {
    pub fn reply(fragments: Vec<&'static str>, handle: &'static str) -> Self {
        Script::Reply {
            fragments,
            handle: Some(handle),
            delay: Duration::ZERO,
        }
    }
}

/// One recorded transport invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Initial { image: Vec<u8>, prior: Option<String> },
    Followup { question: String, prior: String },
}

#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next_turn(&self) -> PortResult<TurnStream> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| PortError::Unexpected("no scripted turn left".into()))?;

        match script {
            Script::Reply {
                fragments,
                handle,
                delay,
            } => {
                let deltas = stream::iter(fragments).then(move |fragment| async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    Ok::<_, PortError>(fragment.to_string())
                });
                Ok(TurnStream {
                    deltas: Box::pin(deltas),
                    turn_handle: TurnHandle::ready(handle.map(str::to_string)),
                })
            }
            Script::Reject(error) => Err(error),
            Script::Break { fragments, error } => {
                let items = fragments
                    .into_iter()
                    .map(|f| Ok(f.to_string()))
                    .chain(std::iter::once(Err(error)));
                Ok(TurnStream {
                    deltas: Box::pin(stream::iter(items)),
                    turn_handle: TurnHandle::ready(None),
                })
            }
        }
    }
}

#[async_trait]
impl FeedbackTransport for ScriptedTransport {
    async fn stream_initial(
        &self,
        image_data: &[u8],
        prior_turn_handle: Option<&str>,
    ) -> PortResult<TurnStream> {
        self.calls.lock().unwrap().push(Call::Initial {
            image: image_data.to_vec(),
            prior: prior_turn_handle.map(str::to_string),
        });
        self.next_turn()
    }

    async fn stream_followup(
        &self,
        question: &str,
        prior_turn_handle: &str,
    ) -> PortResult<TurnStream> {
        self.calls.lock().unwrap().push(Call::Followup {
            question: question.to_string(),
            prior: prior_turn_handle.to_string(),
        });
        self.next_turn()
    }
}

/// A session wired to in-memory stores and a scripted transport.
pub struct Harness {
    pub records: Arc<InMemoryRecordStore>,
    pub media: Arc<InMemoryMediaStore>,
    pub transport: Arc<ScriptedTransport>,
    pub library: PhotoLibrary,
    pub session: FeedbackSession,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        let records = Arc::new(InMemoryRecordStore::new());
        let media = Arc::new(InMemoryMediaStore::new());
        let transport = Arc::new(ScriptedTransport::default());
        let library = PhotoLibrary::new(records.clone(), media.clone());
        let session = FeedbackSession::new(records.clone(), media.clone(), transport.clone(), config);
        Self {
            records,
            media,
            transport,
            library,
            session,
        }
    }

    pub async fn capture(&self, image: &[u8]) -> Photo {
        self.library.capture(image).await.unwrap()
    }
}
