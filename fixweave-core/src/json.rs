/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! JSON interchange format for cross-process message submission.
//!
//! A message serializes as `{"type": <msg-type>, "fields": [[tag, value],
//! ...]}`. Values that are valid UTF-8 travel as JSON strings; anything else
//! is wrapped as `{"b64": "<base64>"}` so raw data fields survive transport.

use crate::error::DecodeError;
use crate::fieldmap::GroupTemplate;
use crate::message::{Message, MsgType};
use crate::tags;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Serialize, Deserialize)]
struct JsonMessage {
    #[serde(rename = "type")]
    msg_type: String,
    fields: Vec<(u32, JsonValue)>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum JsonValue {
    Text(String),
    Number(i64),
    Binary {
        b64: String,
    },
}

/// Serializes a message to the interchange JSON.
///
/// The message type travels in `"type"`; tag 35 is not repeated in the
/// field list.
///
/// # Errors
/// Returns `serde_json::Error` if serialization fails.
pub fn to_json(message: &Message) -> Result<String, serde_json::Error> {
    let fields = message
        .fields()
        .flat_fields()
        .into_iter()
        .filter(|f| f.tag() != tags::MSG_TYPE)
        .map(|f| {
            let value = match std::str::from_utf8(f.value()) {
                Ok(s) => JsonValue::Text(s.to_string()),
                Err(_) => JsonValue::Binary {
                    b64: BASE64.encode(f.value()),
                },
            };
            (f.tag(), value)
        })
        .collect();

    serde_json::to_string(&JsonMessage {
        msg_type: message.msg_type().as_str().to_string(),
        fields,
    })
}

/// Deserializes a message from the interchange JSON, without group
/// templates (untemplated groups land in list form).
///
/// # Errors
/// Returns `DecodeError::InvalidFieldValue` on malformed JSON or base64.
pub fn from_json(json: &str) -> Result<Message, DecodeError> {
    from_json_with(json, &HashMap::new())
}

/// Deserializes a message from the interchange JSON using the given group
/// templates (keyed by count tag).
///
/// # Errors
/// Returns `DecodeError::InvalidFieldValue` on malformed JSON or base64.
pub fn from_json_with(
    json: &str,
    templates: &HashMap<u32, GroupTemplate>,
) -> Result<Message, DecodeError> {
    let parsed: JsonMessage =
        serde_json::from_str(json).map_err(|e| DecodeError::InvalidFieldValue {
            tag: 0,
            reason: format!("invalid interchange json: {e}"),
        })?;

    let msg_type: MsgType = parsed.msg_type.parse().unwrap_or_default();

    let mut pairs = Vec::with_capacity(parsed.fields.len());
    for (tag, value) in parsed.fields {
        if tag == tags::MSG_TYPE {
            continue;
        }
        let bytes = match value {
            JsonValue::Text(s) => Bytes::from(s.into_bytes()),
            JsonValue::Number(n) => Bytes::from(n.to_string().into_bytes()),
            JsonValue::Binary { b64 } => Bytes::from(BASE64.decode(b64.as_bytes()).map_err(
                |e| DecodeError::InvalidFieldValue {
                    tag,
                    reason: format!("invalid base64: {e}"),
                },
            )?),
        };
        pairs.push((tag, bytes));
    }

    Ok(Message::from_fields(msg_type, pairs, templates))
}
