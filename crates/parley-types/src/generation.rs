//! Generation parameters and the incremental output shape of the
//! generation engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::content::{Message, Part};

/// Sampling configuration for one generation request.
///
/// Immutable per request; every field is optional and engine defaults
/// apply where a field is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
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

/// Harm category a safety threshold applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

impl fmt::Display for HarmCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HarmCategory::Unspecified => "HARM_CATEGORY_UNSPECIFIED",
            HarmCategory::Harassment => "HARM_CATEGORY_HARASSMENT",
            HarmCategory::HateSpeech => "HARM_CATEGORY_HATE_SPEECH",
            HarmCategory::SexuallyExplicit => "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            HarmCategory::DangerousContent => "HARM_CATEGORY_DANGEROUS_CONTENT",
        };
        write!(f, "{s}")
    }
}

impl FromStr for HarmCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HARM_CATEGORY_UNSPECIFIED" => Ok(HarmCategory::Unspecified),
            "HARM_CATEGORY_HARASSMENT" => Ok(HarmCategory::Harassment),
            "HARM_CATEGORY_HATE_SPEECH" => Ok(HarmCategory::HateSpeech),
            "HARM_CATEGORY_SEXUALLY_EXPLICIT" => Ok(HarmCategory::SexuallyExplicit),
            "HARM_CATEGORY_DANGEROUS_CONTENT" => Ok(HarmCategory::DangerousContent),
            other => Err(format!("invalid harm category: '{other}'")),
        }
    }
}

/// Blocking threshold for a harm category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockThreshold {
    #[serde(rename = "HARM_BLOCK_THRESHOLD_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "BLOCK_LOW_AND_ABOVE")]
    BlockLowAndAbove,
    #[serde(rename = "BLOCK_MEDIUM_AND_ABOVE")]
    BlockMediumAndAbove,
    #[serde(rename = "BLOCK_ONLY_HIGH")]
    BlockOnlyHigh,
    #[serde(rename = "BLOCK_NONE")]
    BlockNone,
}

/// One safety threshold: a harm category paired with a blocking level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: BlockThreshold,
}

/// Everything a caller may tune on a single generation request:
/// sampling configuration plus per-category safety thresholds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<GenerationConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub safety_settings: Vec<SafetySetting>,
}

impl GenerationParams {
    /// Combine optional sampling config and safety settings from a request.
    pub fn from_request(
        config: Option<GenerationConfig>,
        safety_settings: Option<Vec<SafetySetting>>,
    ) -> Self {
        Self {
            config,
            safety_settings: safety_settings.unwrap_or_default(),
        }
    }
}

/// One item of a streaming generation call.
///
/// Fragments carry incremental output: text arrives in deltas, while a
/// non-text part is always delivered as a single whole fragment. The
/// stream terminates with `Final` carrying the fully assembled model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationChunk {
    Fragment(Part),
    Final(Message),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harm_category_roundtrip() {
        for category in [
            HarmCategory::Unspecified,
            HarmCategory::Harassment,
            HarmCategory::HateSpeech,
            HarmCategory::SexuallyExplicit,
            HarmCategory::DangerousContent,
        ] {
            let s = category.to_string();
            let parsed: HarmCategory = s.parse().unwrap();
            assert_eq!(category, parsed);
        }
    }

    #[test]
    fn test_safety_setting_serde_wire_shape() {
        let setting = SafetySetting {
            category: HarmCategory::Harassment,
            threshold: BlockThreshold::BlockOnlyHigh,
        };
        let json = serde_json::to_value(setting).unwrap();
        assert_eq!(json["category"], "HARM_CATEGORY_HARASSMENT");
        assert_eq!(json["threshold"], "BLOCK_ONLY_HIGH");
    }

    #[test]
    fn test_generation_config_skips_absent_fields() {
        let config = GenerationConfig {
            temperature: Some(0.7),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, "{\"temperature\":0.7}");
    }

    #[test]
    fn test_generation_params_from_request() {
        let params = GenerationParams::from_request(None, None);
        assert!(params.config.is_none());
        assert!(params.safety_settings.is_empty());

        let params = GenerationParams::from_request(
            Some(GenerationConfig {
                max_output_tokens: Some(1024),
                ..Default::default()
            }),
            Some(vec![SafetySetting {
                category: HarmCategory::HateSpeech,
                threshold: BlockThreshold::BlockNone,
            }]),
        );
        assert_eq!(params.config.unwrap().max_output_tokens, Some(1024));
        assert_eq!(params.safety_settings.len(), 1);
    }
}
