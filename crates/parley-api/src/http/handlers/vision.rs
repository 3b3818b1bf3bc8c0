//! One-shot vision generation endpoint.
//!
//! POST /api/v1/vision/generate
//!
//! Stateless single-turn generation over an image plus an optional text
//! prompt. The image arrives base64-encoded in the JSON body; no session
//! is created and nothing is persisted.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use parley_types::content::{InlineData, Message, Part};
use parley_types::generation::{GenerationConfig, GenerationParams, SafetySetting};

use crate::http::error::AppError;
use crate::state::AppState;

/// Base64-encoded image payload.
#[derive(Debug, Deserialize)]
pub struct ImagePayload {
    pub mime_type: String,
    /// Base64-encoded bytes.
    pub data: String,
}

/// Request body for one-shot vision generation.
#[derive(Debug, Deserialize)]
pub struct GenerateWithImageRequest {
    /// Vision-capable model; falls back to the configured default.
    pub model_name: Option<String>,
    /// Text prompt to accompany the image.
    pub text_prompt: Option<String>,
    pub image: ImagePayload,
    pub generation_config: Option<GenerationConfig>,
    pub safety_settings: Option<Vec<SafetySetting>>,
}

#[derive(Debug, Serialize)]
pub struct VisionResponse {
    /// Concatenated text of the generated turn.
    pub generated_text: String,
    /// The full generated message, parts in presentation order.
    pub response: Message,
}

/// POST /api/v1/vision/generate
pub async fn generate(
    State(state): State<AppState>,
    Json(body): Json<GenerateWithImageRequest>,
) -> Result<Json<VisionResponse>, AppError> {
    if !body.image.mime_type.starts_with("image/") {
        return Err(AppError::Validation(format!(
            "unsupported image mime type: '{}'",
            body.image.mime_type
        )));
    }

    let inline = InlineData {
        mime_type: body.image.mime_type,
        data: body.image.data,
    };
    if inline.decode().is_err() {
        return Err(AppError::Validation(
            "image data is not valid base64".to_string(),
        ));
    }

    let mut parts = Vec::new();
    if let Some(prompt) = body.text_prompt.filter(|p| !p.is_empty()) {
        parts.push(Part::text(prompt));
    }
    parts.push(Part::InlineData(inline));

    let model_name = body
        .model_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| state.config.default_model.clone());
    let params = GenerationParams::from_request(body.generation_config, body.safety_settings);

    let turn = state
        .sessions
        .generate_content(&model_name, parts, params)
        .await?;

    Ok(Json(VisionResponse {
        generated_text: turn.text(),
        response: turn,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserialization() {
        let json = serde_json::json!({
            "text_prompt": "what is this?",
            "image": { "mime_type": "image/png", "data": "aGVsbG8=" },
        });
        let body: GenerateWithImageRequest = serde_json::from_value(json).unwrap();
        assert_eq!(body.image.mime_type, "image/png");
        assert!(body.model_name.is_none());
    }

    #[test]
    fn test_vision_response_serialization() {
        let response = VisionResponse {
            generated_text: "a cat".to_string(),
            response: Message::model_text("a cat"),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["generated_text"], "a cat");
        assert_eq!(json["response"]["role"], "model");
    }
}
