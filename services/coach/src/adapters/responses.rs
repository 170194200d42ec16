//! services/coach/src/adapters/responses.rs
//!
//! This module contains the adapter for the streaming Responses API.
//! It implements the `FeedbackTransport` port from the `core` crate.

pub const DEFAULT_INSTRUCTIONS: &str = r#"You are a photography teacher coaching a beginning photographer to improve their skills. Use a direct, technical tone to give feedback. Analyze the photo and provide actionable feedback.

The student is taking photos on their phone, so focus on things they can control, like composition, lighting, and subject. Note phones control focus, exposure and white balance automatically.

Be concise and specific in your feedback. Start with what works well, then give 2-3 specific improvements. Use plain language, not jargon. Keep response under 250 words.
If themes show up across multiple photos in a session, feel free to call them out."#;

const INITIAL_PROMPT: &str = "Please analyze this photo and provide coaching feedback.";

use async_openai::config::{Config, OpenAIConfig};
use async_trait::async_trait;
use base64::Engine;
use futures::StreamExt;
use photo_coach_core::ports::{
    FeedbackTransport, PortError, PortResult, SecretStore, TurnStream,
};
use photo_coach_core::protocol::turn_from_body;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

//=========================================================================================
// Request Payload Structs
//=========================================================================================

#[derive(Serialize)]
struct ResponseRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    input: Vec<InputMessage<'a>>,
    max_output_tokens: u32,
    store: bool,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_response_id: Option<&'a str>,
}

#[derive(Serialize)]
struct InputMessage<'a> {
    role: &'static str,
    content: Vec<InputContent<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputContent<'a> {
    InputText { text: &'a str },
    InputImage { image_url: String },
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Everything about the remote model that is a deployment choice rather than a contract.
#[derive(Clone, Debug)]
pub struct ResponsesSettings {
    pub api_base: String,
    pub model: String,
    pub instructions: String,
    pub max_output_tokens: u32,
}

/// An adapter that implements `FeedbackTransport` against an OpenAI-compatible
/// `/responses` endpoint with server-side streaming.
#[derive(Clone)]
pub struct OpenAiResponsesAdapter {
    http: reqwest::Client,
    secrets: Arc<dyn SecretStore>,
    settings: ResponsesSettings,
}

impl OpenAiResponsesAdapter {
    /// Creates a new `OpenAiResponsesAdapter`.
    pub fn new(http: reqwest::Client, secrets: Arc<dyn SecretStore>, settings: ResponsesSettings) -> Self {
        Self {
            http,
            secrets,
            settings,
        }
    }

    fn request<'a>(
        &'a self,
        content: Vec<InputContent<'a>>,
        previous_response_id: Option<&'a str>,
    ) -> ResponseRequest<'a> {
        ResponseRequest {
            model: &self.settings.model,
            instructions: &self.settings.instructions,
            input: vec![InputMessage {
                role: "user",
                content,
            }],
            max_output_tokens: self.settings.max_output_tokens,
            store: true,
            stream: true,
            previous_response_id,
        }
    }

    /// Sends one turn and hands back its event stream.
    async fn send(&self, request: &ResponseRequest<'_>) -> PortResult<TurnStream> {
        let api_key = self
            .secrets
            .get_api_key()
            .await?
            .filter(|key| !key.trim().is_empty())
            .ok_or(PortError::NoCredential)?;

        let openai_config = OpenAIConfig::new()
            .with_api_base(&self.settings.api_base)
            .with_api_key(api_key);

        debug!(
            "Sending turn to {} (chained: {}).",
            openai_config.url("/responses"),
            request.previous_response_id.is_some()
        );

        let response = self
            .http
            .post(openai_config.url("/responses"))
            .headers(openai_config.headers())
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // The error body is plain JSON, not a stream. Read all of it.
            let body = response
                .text()
                .await
                .map_err(|e| PortError::Network(e.to_string()))?;
            warn!("Feedback API returned {}.", status);
            return Err(PortError::RemoteError(format!(
                "API error ({}): {}",
                status.as_u16(),
                body
            )));
        }

        if status != StatusCode::OK || !is_event_stream(response.headers()) {
            warn!("Feedback API returned an unexpected {} response.", status);
            return Err(PortError::InvalidResponse);
        }

        info!("Feedback stream opened.");
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| PortError::Network(e.to_string())));
        Ok(turn_from_body(body))
    }
}

fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map_or(true, |value| value.starts_with("text/event-stream"))
}

/// Embeds an encoded image as a data URI.
fn image_data_uri(image_data: &[u8]) -> String {
    format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(image_data)
    )
}

//=========================================================================================
// `FeedbackTransport` Trait Implementation
//=========================================================================================

#[async_trait]
impl FeedbackTransport for OpenAiResponsesAdapter {
    async fn stream_initial(
        &self,
        image_data: &[u8],
        prior_turn_handle: Option<&str>,
    ) -> PortResult<TurnStream> {
        let content = vec![
            InputContent::InputText {
                text: INITIAL_PROMPT,
            },
            InputContent::InputImage {
                image_url: image_data_uri(image_data),
            },
        ];
        let request = self.request(content, prior_turn_handle);
        self.send(&request).await
    }

    async fn stream_followup(
        &self,
        question: &str,
        prior_turn_handle: &str,
    ) -> PortResult<TurnStream> {
        let content = vec![InputContent::InputText { text: question }];
        let request = self.request(content, Some(prior_turn_handle));
        self.send(&request).await
    }
}
