//! Request parameter resolution
//!
//! Turns the raw JSON `input` object of a generation request into typed
//! [`ResolvedParameters`]. Mandatory fields are checked first, in a fixed
//! order, so the reported field is always the first one missing.

use serde_json::{Map, Value};
use talkgen_common::config::RequestDefaults;
use thiserror::Error;

/// Mandatory request fields, in the order they are checked
pub const MANDATORY_FIELDS: [&str; 2] = ["image", "audio"];

/// Request validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Request input is not a JSON object
    #[error("Request input must be a JSON object")]
    NotAnObject,

    /// Mandatory field absent (or null)
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Field present but unusable
    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Typed generation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParameters {
    /// Image payload (base64 or engine-side file name), passed through untouched
    pub image: String,
    /// Audio payload (base64 or engine-side file name), passed through untouched
    pub audio: String,
    pub text_prompt: String,
    /// Seconds
    pub video_length: u32,
    pub frame_rate: u32,
    pub width: u32,
    pub height: u32,
}

impl ResolvedParameters {
    /// Number of frames to generate: `frame_rate * video_length`
    ///
    /// Computed in 64 bits so the product of two `u32` values is always exact.
    pub fn total_frames(&self) -> u64 {
        u64::from(self.frame_rate) * u64::from(self.video_length)
    }

    /// End marker for the audio crop, formatted `m:ss`
    pub fn audio_end_timestamp(&self) -> String {
        format!("{}:{:02}", self.video_length / 60, self.video_length % 60)
    }
}

/// Resolve a raw request `input` object
///
/// Optional fields fall back to `defaults`. Numeric fields accept JSON
/// integers, integral floats, and strings holding an integer; all must be
/// positive and fit in `u32`.
pub fn resolve(
    input: &Value,
    defaults: &RequestDefaults,
) -> Result<ResolvedParameters, ValidationError> {
    let fields = input.as_object().ok_or(ValidationError::NotAnObject)?;

    // Presence first, so a missing audio is never masked by a malformed image
    for field in MANDATORY_FIELDS {
        if present(fields, field).is_none() {
            return Err(ValidationError::MissingField(field));
        }
    }

    let image = required_string(fields, "image")?;
    let audio = required_string(fields, "audio")?;

    let text_prompt = match present(fields, "text_prompt") {
        None => defaults.text_prompt.clone(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(ValidationError::InvalidField {
                field: "text_prompt",
                reason: "expected a string".to_string(),
            })
        }
    };

    Ok(ResolvedParameters {
        image,
        audio,
        text_prompt,
        video_length: optional_count(fields, "video_length", defaults.video_length)?,
        frame_rate: optional_count(fields, "frame_rate", defaults.frame_rate)?,
        width: optional_count(fields, "width", defaults.width)?,
        height: optional_count(fields, "height", defaults.height)?,
    })
}

/// Field value, treating JSON null as absent
fn present<'a>(fields: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    fields.get(field).filter(|v| !v.is_null())
}

fn required_string(
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<String, ValidationError> {
    match present(fields, field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ValidationError::InvalidField {
            field,
            reason: "expected a string".to_string(),
        }),
        None => Err(ValidationError::MissingField(field)),
    }
}

fn optional_count(
    fields: &Map<String, Value>,
    field: &'static str,
    default: u32,
) -> Result<u32, ValidationError> {
    match present(fields, field) {
        None => Ok(default),
        Some(value) => coerce_count(field, value),
    }
}

/// Coerce a JSON value to a positive `u32`
fn coerce_count(field: &'static str, value: &Value) -> Result<u32, ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidField { field, reason };

    let parsed: i128 = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i128::from(i)
            } else if let Some(u) = n.as_u64() {
                i128::from(u)
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                if !f.is_finite() || f.fract() != 0.0 || f.abs() > 1e15 {
                    return Err(invalid(format!("{} is not an integer", n)));
                }
                f as i128
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i128>()
            .map_err(|_| invalid(format!("{:?} is not an integer", s)))?,
        other => return Err(invalid(format!("expected an integer, got {}", type_name(other)))),
    };

    u32::try_from(parsed)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| invalid(format!("{} must be between 1 and {}", parsed, u32::MAX)))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
