// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Strict parsing of structured model responses.
//!
//! Models are asked for a single JSON object, optionally inside a fenced
//! code block. Anything that does not deserialize into the expected shape
//! is rejected; no field is ever guessed.

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("response contains no JSON object")]
    NoJson,

    #[error("response does not match the expected schema: {0}")]
    Schema(String),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("response is empty")]
    Empty,
}

/// Locate the JSON payload: a ```json fence, then any fence, then the
/// outermost `{ ... }` span.
pub fn extract_json(text: &str) -> Option<&str> {
    for marker in ["```json", "```"] {
        if let Some(start) = text.find(marker) {
            let content_start = start + marker.len();
            if let Some(end_offset) = text[content_start..].find("```") {
                let content = text[content_start..content_start + end_offset].trim();
                if !content.is_empty() {
                    return Some(content);
                }
            }
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    let payload = extract_json(text).ok_or(ParseError::NoJson)?;
    serde_json::from_str(payload).map_err(|e| ParseError::Schema(e.to_string()))
}

/// A finite score. Values outside `[0, 1]` are clamped; NaN and infinities
/// are rejected.
pub fn unit_score(field: &'static str, value: f64) -> Result<f64, ParseError> {
    if !value.is_finite() {
        return Err(ParseError::InvalidValue {
            field,
            reason: format!("{} is not a finite number", value),
        });
    }
    Ok(value.clamp(0.0, 1.0))
}

/// Trimmed free text that must not be empty.
pub fn non_empty(field: &'static str, value: &str) -> Result<String, ParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ParseError::InvalidValue {
            field,
            reason: "must not be empty".into(),
        });
    }
    Ok(trimmed.to_string())
}
