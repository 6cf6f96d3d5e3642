// crates/shadowkeep-core/src/core/encoding.rs
// ============================================================================
// Module: Shadow Value Encoding
// Description: Type-directed encodings of field values for shadow sort keys.
// Purpose: Make lexicographic key order match the natural order of each type.
// Dependencies: serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! Each sortable field type maps a JSON value to a string whose byte order
//! matches the value order:
//! - `string`: verbatim, case preserved.
//! - `number`: non-negative integer, zero-padded to [`NUMBER_WIDTH`] digits.
//! - `datetime`: UTC, fixed-width ISO-8601 with millisecond precision.
//! - `boolean`: `"0"` or `"1"`.
//!
//! `null` encodes to nothing (no shadow). Any other mismatch is an error.
//!
//! Before an encoded value is embedded in a sort key it passes through
//! [`escape_key_component`], which escapes the two lowest code points and
//! appends [`KEY_COMPONENT_TERMINATOR`]. The terminator sorts below every
//! escaped character, so a value always orders before its own extensions
//! (`"News"` before `"News Today"`), and the first terminator in a key always
//! marks the end of the value regardless of any `#` it contains.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use time::UtcOffset;
use time::format_description::FormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

use crate::core::schema::FieldType;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fixed digit width of encoded numbers (fits every `u64`).
pub const NUMBER_WIDTH: usize = 20;

/// Terminator appended to every escaped key component.
pub const KEY_COMPONENT_TERMINATOR: &str = "\u{1}\u{1}";

/// Escape marker; also the first character of the terminator.
const KEY_ESCAPE: char = '\u{1}';

/// Canonical UTC timestamp layout used in shadow keys.
const DATETIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

/// Nanoseconds per millisecond.
const NANOS_PER_MILLI: i128 = 1_000_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Value encoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The JSON value kind does not match the declared type.
    #[error("expected {expected} value, found {found}")]
    TypeMismatch {
        /// Declared field type.
        expected: FieldType,
        /// JSON kind found.
        found: &'static str,
    },
    /// Number cannot be represented in the ordered encoding.
    #[error("number {0} is not a non-negative integer")]
    NumberOutOfRange(String),
    /// Datetime could not be parsed or normalized.
    #[error("invalid datetime {value}: {message}")]
    InvalidDatetime {
        /// Offending value.
        value: String,
        /// Parser message.
        message: String,
    },
}

// ============================================================================
// SECTION: Encoding
// ============================================================================

/// Encodes a field value for use in a shadow sort key.
///
/// Returns `Ok(None)` for `null`, which produces no shadow.
///
/// # Errors
///
/// Returns [`EncodeError`] when the value does not fit the declared type.
pub fn encode_value(field_type: FieldType, value: &Value) -> Result<Option<String>, EncodeError> {
    if value.is_null() {
        return Ok(None);
    }
    let encoded = match field_type {
        FieldType::String => encode_string(value)?,
        FieldType::Number => encode_number(value)?,
        FieldType::Datetime => encode_datetime(value)?,
        FieldType::Boolean => encode_boolean(value)?,
    };
    Ok(Some(encoded))
}

/// Encodes a string value verbatim.
fn encode_string(value: &Value) -> Result<String, EncodeError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        other => Err(mismatch(FieldType::String, other)),
    }
}

/// Encodes a non-negative integer as a zero-padded decimal string.
fn encode_number(value: &Value) -> Result<String, EncodeError> {
    let Value::Number(number) = value else {
        return Err(mismatch(FieldType::Number, value));
    };
    number
        .as_u64()
        .map(|n| format!("{n:0width$}", width = NUMBER_WIDTH))
        .ok_or_else(|| EncodeError::NumberOutOfRange(number.to_string()))
}

/// Normalizes an RFC 3339 string or epoch-millisecond integer to UTC.
fn encode_datetime(value: &Value) -> Result<String, EncodeError> {
    let parsed = match value {
        Value::String(text) => {
            OffsetDateTime::parse(text, &Rfc3339).map_err(|err| EncodeError::InvalidDatetime {
                value: text.clone(),
                message: err.to_string(),
            })?
        }
        Value::Number(number) => {
            let millis = number.as_i64().ok_or_else(|| EncodeError::InvalidDatetime {
                value: number.to_string(),
                message: "epoch milliseconds must be an integer".to_string(),
            })?;
            OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * NANOS_PER_MILLI)
                .map_err(|err| EncodeError::InvalidDatetime {
                    value: number.to_string(),
                    message: err.to_string(),
                })?
        }
        other => return Err(mismatch(FieldType::Datetime, other)),
    };
    parsed.to_offset(UtcOffset::UTC).format(DATETIME_FORMAT).map_err(|err| {
        EncodeError::InvalidDatetime {
            value: value.to_string(),
            message: err.to_string(),
        }
    })
}

/// Encodes a boolean as `"0"` or `"1"`.
fn encode_boolean(value: &Value) -> Result<String, EncodeError> {
    match value {
        Value::Bool(true) => Ok("1".to_string()),
        Value::Bool(false) => Ok("0".to_string()),
        other => Err(mismatch(FieldType::Boolean, other)),
    }
}

/// Escapes an encoded value and appends [`KEY_COMPONENT_TERMINATOR`].
///
/// `U+0000` becomes `U+0001 U+0002` and `U+0001` becomes `U+0001 U+0003`, so an
/// escaped marker is never followed by another marker. Byte order of escaped
/// components matches the byte order of the raw values.
#[must_use]
pub fn escape_key_component(encoded: &str) -> String {
    let mut escaped = String::with_capacity(encoded.len() + KEY_COMPONENT_TERMINATOR.len());
    for ch in encoded.chars() {
        match ch {
            '\u{0}' => {
                escaped.push(KEY_ESCAPE);
                escaped.push('\u{2}');
            }
            KEY_ESCAPE => {
                escaped.push(KEY_ESCAPE);
                escaped.push('\u{3}');
            }
            other => escaped.push(other),
        }
    }
    escaped.push_str(KEY_COMPONENT_TERMINATOR);
    escaped
}

/// Builds a type mismatch error for a JSON value.
const fn mismatch(expected: FieldType, found: &Value) -> EncodeError {
    EncodeError::TypeMismatch {
        expected,
        found: json_kind(found),
    }
}

/// Returns the JSON kind label of a value.
const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
