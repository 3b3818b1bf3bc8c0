//! Wire types for the Generative Language API.
//!
//! Request and response bodies use camelCase field names on the wire.
//! Conversions to and from the domain types live here so the client and
//! streaming modules deal only in domain shapes.

use serde::{Deserialize, Serialize};

use parley_types::content::{InlineData, Message, Part, Role};
use parley_types::generation::{GenerationConfig, SafetySetting};

/// `generateContent` / `streamGenerateContent` request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<WireGenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_settings: Option<Vec<SafetySetting>>,
}

/// One conversation turn on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<WirePart>,
}

impl From<&Message> for WireContent {
    fn from(message: &Message) -> Self {
        Self {
            role: Some(message.role.to_string()),
            parts: message.parts.iter().map(WirePart::from).collect(),
        }
    }
}

/// One content part on the wire; exactly one field populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<WireInlineData>,
}

impl From<&Part> for WirePart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text(text) => WirePart {
                text: Some(text.clone()),
                inline_data: None,
            },
            Part::InlineData(inline) => WirePart {
                text: None,
                inline_data: Some(WireInlineData {
                    mime_type: inline.mime_type.clone(),
                    data: inline.data.clone(),
                }),
            },
        }
    }
}

impl WirePart {
    /// Convert back into a domain part. Returns `None` for parts this
    /// gateway does not model (and for empty text deltas).
    pub fn into_part(self) -> Option<Part> {
        if let Some(inline) = self.inline_data {
            return Some(Part::InlineData(InlineData {
                mime_type: inline.mime_type,
                data: inline.data,
            }));
        }
        match self.text {
            Some(text) if !text.is_empty() => Some(Part::Text(text)),
            _ => None,
        }
    }
}

/// Inline binary payload on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireInlineData {
    pub mime_type: String,
    pub data: String,
}

/// Sampling configuration on the wire (camelCase counterpart of the
/// domain `GenerationConfig`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

impl From<&GenerationConfig> for WireGenerationConfig {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            candidate_count: config.candidate_count,
            stop_sequences: config.stop_sequences.clone(),
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
        }
    }
}

/// `generateContent` response body (also the shape of each SSE chunk).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    pub candidates: Option<Vec<Candidate>>,
    pub prompt_feedback: Option<PromptFeedback>,
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<WirePart>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub code: Option<i64>,
    pub message: String,
    pub status: Option<String>,
}

impl GenerateContentResponse {
    /// Parts of the first candidate, converted to domain parts.
    pub fn candidate_parts(&self) -> Vec<Part> {
        self.candidates
            .as_ref()
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .cloned()
                    .filter_map(WirePart::into_part)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First candidate's finish reason, if any.
    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates
            .as_ref()
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.finish_reason.as_deref())
    }
}

/// Build the wire conversation for a domain message list.
pub fn wire_contents(messages: &[Message]) -> Vec<WireContent> {
    messages.iter().map(WireContent::from).collect()
}

/// Build a model turn from response parts, defaulting to the model role.
pub fn model_turn(parts: Vec<Part>) -> Message {
    Message::new(Role::Model, parts)
}
