//! SSE stream adapter for `streamGenerateContent`.
//!
//! The streaming endpoint (`?alt=sse`) emits one SSE event per response
//! chunk, each carrying the same JSON shape as a non-streaming response.
//! This module maps those chunks to the engine-agnostic
//! [`GenerationChunk`] stream: one `Fragment` per content part, a
//! terminal `Final` with the assembled turn on success, or an error item.
//!
//! Safety blocks and in-body API errors abort the stream with the
//! matching `EngineError`; the session manager then commits nothing.

use std::pin::Pin;
use std::sync::Arc;

use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};

use parley_core::session::StreamAssembler;
use parley_types::error::EngineError;
use parley_types::generation::GenerationChunk;

use super::client::{classify_api_error, classify_status, classify_transport};
use super::types::{GenerateContentRequest, GenerateContentResponse, model_turn};

/// Open a streaming generation call and adapt it to `GenerationChunk`s.
pub fn create_gemini_stream(
    client: reqwest::Client,
    url: String,
    body: GenerateContentRequest,
    api_key: Arc<SecretString>,
) -> Pin<Box<dyn Stream<Item = Result<GenerationChunk, EngineError>> + Send + 'static>> {
    Box::pin(async_stream::try_stream! {
        let response = client
            .post(&url)
            .header("x-goog-api-key", api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            Err(classify_status(status.as_u16(), &error_body))?;
            return;
        }

        let mut events = response.bytes_stream().eventsource();
        let mut assembler = StreamAssembler::new();

        while let Some(event) = events.next().await {
            let event = event
                .map_err(|e| EngineError::Unavailable(format!("stream interrupted: {e}")))?;
            // Events that are not generateContent payloads (keepalives) are skipped.
            let Ok(chunk) = serde_json::from_str::<GenerateContentResponse>(&event.data) else {
                continue;
            };

            if let Some(error) = &chunk.error {
                Err(classify_api_error(error))?;
            }
            if let Some(feedback) = &chunk.prompt_feedback
                && let Some(reason) = &feedback.block_reason
            {
                Err(EngineError::SafetyBlocked(format!("prompt blocked: {reason}")))?;
            }
            if chunk.finish_reason() == Some("SAFETY") {
                Err(EngineError::SafetyBlocked(
                    "response blocked by safety settings".to_string(),
                ))?;
            }

            for part in chunk.candidate_parts() {
                assembler.absorb(&part);
                yield GenerationChunk::Fragment(part);
            }
        }

        if assembler.is_empty() {
            Err(EngineError::Unknown("stream produced no content".to_string()))?;
        }
        yield GenerationChunk::Final(model_turn(assembler.into_parts()));
    })
}
