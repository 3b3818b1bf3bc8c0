//! Chat session endpoints.
//!
//! - `POST /api/v1/chat/start_session` -- create a session
//! - `POST /api/v1/chat/send_message` -- full turn, or NDJSON stream when
//!   `stream: true`
//! - `GET /api/v1/chat/history/{session_id}` -- committed history
//! - `PATCH /api/v1/chat/session/{session_id}` -- rebind model / metadata
//! - `DELETE /api/v1/chat/session/{session_id}` -- delete
//!
//! Streaming responses are newline-delimited JSON, one
//! [`StreamedMessagePart`] per line: zero or more chunk lines, then a
//! single terminal line that is either the final chunk (carrying the full
//! assembled response) or an error.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use parley_core::session::SendEvent;
use parley_types::content::{Message, Part};
use parley_types::generation::{GenerationConfig, GenerationParams, SafetySetting};
use parley_types::session::SessionRecord;

use crate::http::error::AppError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response DTOs
// ---------------------------------------------------------------------------

/// Request body for starting a session.
#[derive(Debug, Deserialize)]
pub struct StartChatRequest {
    /// Model to bind; falls back to the configured default.
    pub model_name: Option<String>,
    /// Optional seed history for the conversation.
    #[serde(default)]
    pub initial_history: Vec<Message>,
    pub generation_config: Option<GenerationConfig>,
    pub safety_settings: Option<Vec<SafetySetting>>,
    /// Opaque caller annotations stored with the session.
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct StartChatResponse {
    pub session_id: Uuid,
    pub history: Vec<Message>,
}

/// Request body for sending a message.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub session_id: Uuid,
    pub message: Message,
    pub generation_config: Option<GenerationConfig>,
    pub safety_settings: Option<Vec<SafetySetting>>,
    #[serde(default)]
    pub stream: bool,
}

/// Non-streaming send response: the model turn plus the appended pair.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub session_id: Uuid,
    pub response: Message,
    pub updated_history: Vec<Message>,
}

/// One NDJSON line of a streaming send response.
#[derive(Debug, Serialize)]
pub struct StreamedMessagePart {
    pub session_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_text: Option<String>,
    /// Non-text fragment (e.g., inline data), delivered whole.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_part: Option<Part>,
    pub is_final_chunk: bool,
    /// The committed turn; present only on the final chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_response: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamedMessagePart {
    fn blank(session_id: Uuid) -> Self {
        Self {
            session_id,
            chunk_text: None,
            chunk_part: None,
            is_final_chunk: false,
            full_response: None,
            error: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GetHistoryResponse {
    pub session_id: Uuid,
    pub history: Vec<Message>,
}

/// Request body for the session update endpoint.
#[derive(Debug, Deserialize)]
pub struct UpdateSessionRequest {
    pub model_name: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub model_name: String,
    pub history: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Map<String, Value>,
}

impl From<SessionRecord> for SessionResponse {
    fn from(record: SessionRecord) -> Self {
        Self {
            session_id: record.id,
            model_name: record.model_name,
            history: record.history,
            created_at: record.created_at,
            updated_at: record.updated_at,
            metadata: record.metadata,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteSessionResponse {
    pub session_id: Uuid,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/chat/start_session
pub async fn start_session(
    State(state): State<AppState>,
    Json(body): Json<StartChatRequest>,
) -> Result<Json<StartChatResponse>, AppError> {
    let model_name = body
        .model_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| state.config.default_model.clone());

    // Request-level generation defaults are kept with the session as
    // caller annotations, mirroring the persisted record layout.
    let mut metadata = body.metadata.unwrap_or_default();
    if let Some(config) = &body.generation_config {
        metadata.insert(
            "generation_config".to_string(),
            serde_json::to_value(config).unwrap_or(Value::Null),
        );
    }
    if let Some(safety) = &body.safety_settings {
        metadata.insert(
            "safety_settings".to_string(),
            serde_json::to_value(safety).unwrap_or(Value::Null),
        );
    }

    let record = state
        .sessions
        .start_session(&model_name, body.initial_history, metadata)
        .await?;

    Ok(Json(StartChatResponse {
        session_id: record.id,
        history: record.history,
    }))
}

/// POST /api/v1/chat/send_message
pub async fn send_message(
    State(state): State<AppState>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Response, AppError> {
    let params = GenerationParams::from_request(body.generation_config, body.safety_settings);
    let session_id = body.session_id;

    if body.stream {
        let stream = state
            .sessions
            .send_message_streaming(session_id, body.message, params)
            .await?;

        let ndjson = async_stream::stream! {
            let mut stream = stream;
            while let Some(event) = stream.next().await {
                let part = match event {
                    SendEvent::Fragment(Part::Text(text)) => StreamedMessagePart {
                        chunk_text: Some(text),
                        ..StreamedMessagePart::blank(session_id)
                    },
                    SendEvent::Fragment(fragment) => StreamedMessagePart {
                        chunk_part: Some(fragment),
                        ..StreamedMessagePart::blank(session_id)
                    },
                    SendEvent::Final(turn) => StreamedMessagePart {
                        is_final_chunk: true,
                        full_response: Some(turn),
                        ..StreamedMessagePart::blank(session_id)
                    },
                    SendEvent::Error(err) => StreamedMessagePart {
                        error: Some(err.to_string()),
                        ..StreamedMessagePart::blank(session_id)
                    },
                };
                let mut line = serde_json::to_string(&part).unwrap_or_else(|_| "{}".to_string());
                line.push('\n');
                yield Ok::<_, Infallible>(Bytes::from(line));
            }
        };

        let response = Response::builder()
            .header(header::CONTENT_TYPE, "application/x-ndjson")
            .body(Body::from_stream(ndjson))
            .map_err(|e| AppError::Validation(e.to_string()))?;
        Ok(response)
    } else {
        let user_message = body.message.clone();
        let turn = state
            .sessions
            .send_message(session_id, body.message, params)
            .await?;

        Ok(Json(MessageResponse {
            session_id,
            response: turn.clone(),
            updated_history: vec![user_message, turn],
        })
        .into_response())
    }
}

/// GET /api/v1/chat/history/{session_id}
pub async fn get_history(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<GetHistoryResponse>, AppError> {
    let history = state.sessions.get_history(session_id).await?;
    Ok(Json(GetHistoryResponse {
        session_id,
        history,
    }))
}

/// PATCH /api/v1/chat/session/{session_id}
pub async fn update_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<UpdateSessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let record = state
        .sessions
        .update_session(session_id, body.model_name, body.metadata)
        .await?;
    Ok(Json(record.into()))
}

/// DELETE /api/v1/chat/session/{session_id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<DeleteSessionResponse>, AppError> {
    state.sessions.delete_session(session_id).await?;
    Ok(Json(DeleteSessionResponse {
        session_id,
        message: format!("Session {session_id} deleted successfully"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::content::Role;

    #[test]
    fn test_start_request_minimal_body() {
        let body: StartChatRequest = serde_json::from_str("{}").unwrap();
        assert!(body.model_name.is_none());
        assert!(body.initial_history.is_empty());
        assert!(body.metadata.is_none());
    }

    #[test]
    fn test_send_request_defaults_to_non_streaming() {
        let json = serde_json::json!({
            "session_id": Uuid::now_v7(),
            "message": { "role": "user", "parts": [{"text": "hi"}] },
        });
        let body: SendMessageRequest = serde_json::from_value(json).unwrap();
        assert!(!body.stream);
        assert_eq!(body.message.role, Role::User);
    }

    #[test]
    fn test_streamed_part_serialization_omits_absent_fields() {
        let part = StreamedMessagePart {
            chunk_text: Some("Hel".to_string()),
            ..StreamedMessagePart::blank(Uuid::now_v7())
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["chunk_text"], "Hel");
        assert_eq!(json["is_final_chunk"], false);
        assert!(json.get("full_response").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_final_streamed_part_carries_full_response() {
        let part = StreamedMessagePart {
            is_final_chunk: true,
            full_response: Some(Message::model_text("Hello")),
            ..StreamedMessagePart::blank(Uuid::now_v7())
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["is_final_chunk"], true);
        assert_eq!(json["full_response"]["parts"][0]["text"], "Hello");
    }
}
