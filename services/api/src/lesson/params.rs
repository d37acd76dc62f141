//! services/api/src/lesson/params.rs
//!
//! Validation of caller-supplied lesson parameters into the single
//! `GenerationRequest` struct that every generator receives. The request is
//! built once per lesson call and shared by all fan-out tasks; generators
//! never see (or mutate) the raw HTTP payload.

use lingua_core::ports::{PortError, PortResult};
use serde::Deserialize;
use utoipa::ToSchema;

/// Word counts for the named length buckets.
const SHORT_WORDS: u32 = 100;
const MEDIUM_WORDS: u32 = 150;
const LONG_WORDS: u32 = 200;

/// Bounds for the `custom` length option (inclusive).
const CUSTOM_MIN: i64 = 20;
const CUSTOM_MAX: i64 = 500;

/// Raw lesson parameters as submitted by the caller.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonParams {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub formality: String,
    pub style: Option<String>,
    pub language: Option<String>,
    pub writing_type: Option<String>,
    pub length_option: Option<String>,
    pub length: Option<i64>,
}

/// The validated, per-skill parameter struct handed to every generator.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub topic: String,
    pub level: String,
    pub formality: String,
    pub style: String,
    pub language: String,
    pub writing_type: Option<String>,
    /// Target passage/task length, resolved from the length option.
    pub word_count: u32,
}

impl GenerationRequest {
    /// Validates raw parameters and resolves the length specification.
    ///
    /// Fails with `InvalidInput` when topic/level/formality/language are
    /// absent, when a custom length is non-positive or outside 20..=500
    /// words, or when a named length bucket is unrecognized.
    pub fn new(params: LessonParams) -> PortResult<Self> {
        let language = params
            .language
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| "german".to_string());

        for (field, value) in [
            ("topic", &params.topic),
            ("level", &params.level),
            ("formality", &params.formality),
        ] {
            if value.trim().is_empty() {
                return Err(PortError::InvalidInput(format!(
                    "Missing required field: {}",
                    field
                )));
            }
        }

        let length_option = params
            .length_option
            .unwrap_or_else(|| "medium".to_string())
            .to_lowercase();

        let word_count = match length_option.as_str() {
            "short" => SHORT_WORDS,
            "medium" => MEDIUM_WORDS,
            "long" => LONG_WORDS,
            "custom" => {
                let length = params.length.ok_or_else(|| {
                    PortError::InvalidInput("Custom length must be a positive number.".to_string())
                })?;
                if length <= 0 {
                    return Err(PortError::InvalidInput(
                        "Custom length must be a positive number.".to_string(),
                    ));
                }
                if !(CUSTOM_MIN..=CUSTOM_MAX).contains(&length) {
                    return Err(PortError::InvalidInput(format!(
                        "Custom length must be between {} and {} words.",
                        CUSTOM_MIN, CUSTOM_MAX
                    )));
                }
                length as u32
            }
            other => {
                return Err(PortError::InvalidInput(format!(
                    "Invalid length option '{}'. Use short, medium, long, or custom.",
                    other
                )))
            }
        };

        Ok(GenerationRequest {
            topic: params.topic,
            level: params.level,
            formality: params.formality,
            style: params
                .style
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "defaultStyle".to_string()),
            language,
            writing_type: params.writing_type,
            word_count,
        })
    }
}
