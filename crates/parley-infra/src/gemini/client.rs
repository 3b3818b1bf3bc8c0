//! GeminiEngine -- concrete [`GenerationEngine`] implementation for the
//! Google Generative Language API.
//!
//! Sends requests to `models/{model}:generateContent` (and its streaming
//! sibling) authenticated with the `x-goog-api-key` header. The API key
//! is wrapped in [`secrecy::SecretString`] and is never logged or
//! included in `Debug` output.
//!
//! The adapter never retries; failures are classified into the engine
//! error taxonomy and propagate unchanged. Calls never mutate handles, so
//! a failed call leaves the conversation context usable for the next one.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::Stream;
use secrecy::{ExposeSecret, SecretString};
use tracing::Instrument;

use parley_core::engine::{EngineHandle, GenerationEngine, GenerationRequest};
use parley_types::content::Message;
use parley_types::error::EngineError;
use parley_types::generation::GenerationChunk;

use super::streaming::create_gemini_stream;
use super::types::{
    ApiError, GenerateContentRequest, GenerateContentResponse, WireGenerationConfig, model_turn,
    wire_contents,
};

/// Gemini generation engine.
pub struct GeminiEngine {
    client: reqwest::Client,
    api_key: Arc<SecretString>,
    base_url: String,
}

impl GeminiEngine {
    /// Create a new engine.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Generative Language API key wrapped in SecretString
    pub fn new(api_key: SecretString) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300)) // 5 min timeout for long generations
            .build()
            .map_err(|e| EngineError::Unknown(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: Arc::new(api_key),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        })
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn model_path(model: &str) -> String {
        if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        }
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!("{}/{}:{method}", self.base_url, Self::model_path(model))
    }

    fn build_body(request: &GenerationRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: wire_contents(&request.contents),
            generation_config: request.params.config.as_ref().map(WireGenerationConfig::from),
            safety_settings: if request.params.safety_settings.is_empty() {
                None
            } else {
                Some(request.params.safety_settings.clone())
            },
        }
    }

    async fn call_generate(&self, request: &GenerationRequest) -> Result<Message, EngineError> {
        let body = Self::build_body(request);
        let url = self.url(&request.model_name, "generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &error_body));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Unknown(format!("failed to parse response: {e}")))?;

        response_to_turn(parsed)
    }
}

// GeminiEngine intentionally does NOT derive Debug so the wrapped API key
// can never reach logs through formatting.

impl GenerationEngine for GeminiEngine {
    fn initialize(
        &self,
        model_name: &str,
        history: Vec<Message>,
    ) -> Result<EngineHandle, EngineError> {
        if model_name.trim().is_empty() {
            return Err(EngineError::InvalidArgument(
                "model name must not be empty".to_string(),
            ));
        }
        Ok(EngineHandle::new(model_name, history))
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Message, EngineError> {
        let span = tracing::info_span!(
            "generate_content",
            gen_ai.operation.name = "chat",
            gen_ai.provider.name = "gemini",
            gen_ai.request.model = %request.model_name,
        );
        self.call_generate(request).instrument(span).await
    }

    fn generate_streaming(
        &self,
        request: GenerationRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<GenerationChunk, EngineError>> + Send + 'static>> {
        let body = Self::build_body(&request);
        let url = self.url(&request.model_name, "streamGenerateContent?alt=sse");
        create_gemini_stream(self.client.clone(), url, body, self.api_key.clone())
    }
}

/// Classify a reqwest transport failure.
pub(super) fn classify_transport(err: reqwest::Error) -> EngineError {
    if err.is_timeout() || err.is_connect() {
        EngineError::Unavailable(err.to_string())
    } else {
        EngineError::Unknown(err.to_string())
    }
}

/// Classify a non-success HTTP status.
pub(super) fn classify_status(status: u16, body: &str) -> EngineError {
    match status {
        400 | 404 => EngineError::InvalidArgument(format!("HTTP {status}: {body}")),
        429 | 500..=599 => EngineError::Unavailable(format!("HTTP {status}: {body}")),
        _ => EngineError::Unknown(format!("HTTP {status}: {body}")),
    }
}

/// Classify an in-body API error object.
pub(super) fn classify_api_error(error: &ApiError) -> EngineError {
    match error.status.as_deref() {
        Some("INVALID_ARGUMENT") | Some("NOT_FOUND") => {
            EngineError::InvalidArgument(error.message.clone())
        }
        Some("RESOURCE_EXHAUSTED") | Some("UNAVAILABLE") | Some("DEADLINE_EXCEEDED") => {
            EngineError::Unavailable(error.message.clone())
        }
        _ => EngineError::Unknown(error.message.clone()),
    }
}

/// Turn a parsed response into the model's turn, surfacing safety blocks.
pub(super) fn response_to_turn(response: GenerateContentResponse) -> Result<Message, EngineError> {
    if let Some(error) = &response.error {
        return Err(classify_api_error(error));
    }
    if let Some(feedback) = &response.prompt_feedback
        && let Some(reason) = &feedback.block_reason
    {
        return Err(EngineError::SafetyBlocked(format!("prompt blocked: {reason}")));
    }
    if response.finish_reason() == Some("SAFETY") {
        return Err(EngineError::SafetyBlocked(
            "response blocked by safety settings".to_string(),
        ));
    }

    let parts = response.candidate_parts();
    if parts.is_empty() {
        return Err(EngineError::Unknown("no content in response".to_string()));
    }
    Ok(model_turn(parts))
}
