//! crates/photo_coach_core/src/protocol.rs
//!
//! Decoding for the server-sent-event stream returned by the feedback API.
//! The transport feeds raw body chunks in; the engine only ever sees text fragments.

use crate::ports::{PortResult, TurnHandle, TurnStream};
use futures::{Stream, StreamExt};
use serde_json::Value;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

//=========================================================================================
// Line Framing
//=========================================================================================

/// Splits an arbitrarily chunked byte stream into complete text lines.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(Self::decode(&raw[..raw.len() - 1]));
        }
        lines
    }

    /// Returns the trailing unterminated line, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buffer);
        Some(Self::decode(&raw))
    }

    fn decode(raw: &[u8]) -> String {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        String::from_utf8_lossy(raw).into_owned()
    }
}

//=========================================================================================
// Event Interpretation
//=========================================================================================

/// What a single body line means to the consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum SseLine {
    /// Not a data line, or a data line whose payload is not JSON.
    Ignored,
    /// The stream terminator.
    Done,
    Event(Value),
}

pub fn classify_line(line: &str) -> SseLine {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return SseLine::Ignored;
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload).trim_end();

    if payload == DONE_SENTINEL {
        return SseLine::Done;
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(value) if value.is_object() => SseLine::Event(value),
        _ => SseLine::Ignored,
    }
}

/// Pulls the text out of one event.
///
/// Handles both encodings the API uses: a top-level `delta` string, or a full
/// `output[].content[].text` tree.
pub fn extract_fragments(event: &Value) -> Vec<String> {
    if let Some(delta) = event.get("delta").and_then(Value::as_str) {
        return vec![delta.to_string()];
    }

    let Some(output) = event.get("output").and_then(Value::as_array) else {
        return Vec::new();
    };

    output
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter_map(|content| content.get("text").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// The turn id carried by an event, if any.
///
/// Typed events (`response.created`) nest it under `response.id`.
pub fn extract_turn_handle(event: &Value) -> Option<String> {
    event
        .get("id")
        .and_then(Value::as_str)
        .or_else(|| {
            event
                .get("response")
                .and_then(|response| response.get("id"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
}

/// Remembers the first turn id seen in a stream.
#[derive(Debug, Default)]
pub struct TurnHandleCapture {
    captured: Option<String>,
}

impl TurnHandleCapture {
    pub fn observe(&mut self, event: &Value) {
        if self.captured.is_none() {
            self.captured = extract_turn_handle(event);
        }
    }

    pub fn into_inner(self) -> Option<String> {
        self.captured
    }
}

//=========================================================================================
// Body to Turn
//=========================================================================================

/// Turns a raw response body into a fragment stream plus its deferred turn handle.
///
/// The handle resolves only after the terminator (or end of body) has been read.
/// A body error ends the stream with that error and leaves the handle unresolved.
pub fn turn_from_body<S, B>(body: S) -> TurnStream
where
    S: Stream<Item = PortResult<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let (sender, turn_handle) = TurnHandle::pending();

    let deltas = async_stream::stream! {
        let mut body = Box::pin(body);
        let mut decoder = SseLineDecoder::new();
        let mut capture = TurnHandleCapture::default();
        let mut done = false;

        while !done {
            let lines = match body.next().await {
                Some(Ok(chunk)) => decoder.push(chunk.as_ref()),
                Some(Err(e)) => {
                    yield Err(e);
                    return;
                }
                None => {
                    done = true;
                    decoder.finish().into_iter().collect()
                }
            };

            for line in lines {
                match classify_line(&line) {
                    SseLine::Ignored => {}
                    SseLine::Done => {
                        done = true;
                        break;
                    }
                    SseLine::Event(event) => {
                        capture.observe(&event);
                        for fragment in extract_fragments(&event) {
                            yield Ok(fragment);
                        }
                    }
                }
            }
        }

        let _ = sender.send(capture.into_inner());
    };

    TurnStream {
        deltas: Box::pin(deltas),
        turn_handle,
    }
}
