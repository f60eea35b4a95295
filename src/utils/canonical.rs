//! Canonical payload encoding, version 1.
//!
//! Both endpoints sign and verify over these bytes, so the format is part of
//! the wire protocol and any change to it is a new protocol version:
//!
//! - compact JSON: no whitespace, `,` between members and `:` after keys
//! - keys in alphabetical order: `actionType`, `quantity`, `subjectId`, `transactionId`
//! - `quantity` as a plain base-10 integer, at most 2^53 - 1
//! - strings in UTF-8; only `"`, `\` and U+0000..=U+001F are escaped
//!   (`\b \f \n \r \t` short forms, lowercase `\u00xx` otherwise).
//!   Everything else, including U+007F and all non-ASCII, is emitted raw
//!
//! The received body's byte layout is never trusted: the verifier rebuilds
//! these bytes from the parsed fields.

use crate::models::RewardEvent;
use serde::Serialize;
use serde_json::{Map, Value};

/// Largest quantity every JSON runtime represents exactly (2^53 - 1)
pub const MAX_CANONICAL_QUANTITY: u64 = (1 << 53) - 1;

/// Error returned when an event cannot be put in canonical form
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("quantity {0} exceeds the largest exactly representable integer (2^53 - 1)")]
    QuantityOutOfRange(u64),

    #[error("payload must be a JSON object")]
    NotAnObject,

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    #[error("unexpected field `{0}`")]
    UnexpectedField(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

// Declaration order is the canonical key order.
#[derive(Serialize)]
struct CanonicalFields<'a> {
    #[serde(rename = "actionType")]
    action_type: &'a str,
    quantity: u64,
    #[serde(rename = "subjectId")]
    subject_id: &'a str,
    #[serde(rename = "transactionId")]
    transaction_id: &'a str,
}

/// Canonical bytes of `event`
pub fn canonicalize(event: &RewardEvent) -> Result<Vec<u8>, EncodingError> {
    if event.quantity > MAX_CANONICAL_QUANTITY {
        return Err(EncodingError::QuantityOutOfRange(event.quantity));
    }

    let fields = CanonicalFields {
        action_type: &event.action_type,
        quantity: event.quantity,
        subject_id: &event.subject_id,
        transaction_id: &event.transaction_id,
    };

    serde_json::to_vec(&fields).map_err(|e| EncodingError::Serialization(e.to_string()))
}

/// Rebuild an event from an untyped JSON payload, with precise errors for
/// every field that cannot be represented canonically.
pub fn event_from_value(value: &Value) -> Result<RewardEvent, EncodingError> {
    let object = value.as_object().ok_or(EncodingError::NotAnObject)?;

    if let Some(unexpected) = object.keys().find(|key| {
        !matches!(
            key.as_str(),
            "transactionId" | "subjectId" | "quantity" | "actionType"
        )
    }) {
        return Err(EncodingError::UnexpectedField(unexpected.clone()));
    }

    let quantity = match object.get("quantity") {
        None => return Err(EncodingError::MissingField("quantity")),
        Some(Value::Number(n)) => n.as_u64().ok_or(EncodingError::InvalidField {
            field: "quantity",
            expected: "a non-negative integer",
        })?,
        Some(_) => {
            return Err(EncodingError::InvalidField {
                field: "quantity",
                expected: "a non-negative integer",
            });
        }
    };

    Ok(RewardEvent {
        transaction_id: string_field(object, "transactionId")?,
        subject_id: string_field(object, "subjectId")?,
        quantity,
        action_type: string_field(object, "actionType")?,
    })
}

/// Canonical bytes of an untyped JSON payload
pub fn canonicalize_value(value: &Value) -> Result<Vec<u8>, EncodingError> {
    canonicalize(&event_from_value(value)?)
}

fn string_field(object: &Map<String, Value>, field: &'static str) -> Result<String, EncodingError> {
    match object.get(field) {
        None => Err(EncodingError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(EncodingError::InvalidField {
            field,
            expected: "a string",
        }),
    }
}
