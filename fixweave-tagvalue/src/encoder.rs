/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! FIX wire encoder.
//!
//! Serializes a [`Message`] in the canonical order: `8`, `9`, `35`, the
//! session header tags, the body, then `10`. BodyLength is computed after
//! body serialization and CheckSum over the final buffer.

use crate::checksum::{checksum, encode_checksum};
use crate::decoder::SOH;
use bytes::{BufMut, BytesMut};
use fixweave_core::error::EncodeError;
use fixweave_core::message::Message;
use fixweave_core::tags;

/// Header tags the encoder writes in canonical positions; occurrences in the
/// field map are skipped during the body pass.
const MANAGED_TAGS: [u32; 8] = [
    tags::BEGIN_STRING,
    tags::BODY_LENGTH,
    tags::CHECK_SUM,
    tags::MSG_TYPE,
    tags::MSG_SEQ_NUM,
    tags::SENDER_COMP_ID,
    tags::SENDING_TIME,
    tags::TARGET_COMP_ID,
];

/// FIX wire encoder bound to one BeginString.
#[derive(Debug, Clone)]
pub struct Encoder {
    begin_string: String,
}

impl Encoder {
    /// Creates an encoder for the given FIX version string.
    #[must_use]
    pub fn new(begin_string: impl Into<String>) -> Self {
        Self {
            begin_string: begin_string.into(),
        }
    }

    /// Returns the configured BeginString.
    #[must_use]
    pub fn begin_string(&self) -> &str {
        &self.begin_string
    }

    /// Encodes a message to wire bytes.
    ///
    /// Writes `35`, then `34`, `49`, `52`, `56` when the message carries
    /// them, then the remaining fields in insertion order, and finally wraps
    /// everything in the `8`/`9` header and `10` trailer.
    ///
    /// # Errors
    /// Currently infallible in practice; the `Result` mirrors the trait
    /// shape used by typed message encoders.
    pub fn encode(&self, message: &Message) -> Result<BytesMut, EncodeError> {
        let mut body = BytesMut::with_capacity(256);

        put_field(&mut body, tags::MSG_TYPE, message.msg_type().as_str().as_bytes());
        for tag in [
            tags::MSG_SEQ_NUM,
            tags::SENDER_COMP_ID,
            tags::SENDING_TIME,
            tags::TARGET_COMP_ID,
        ] {
            if let Some(field) = message.get(tag) {
                put_field(&mut body, tag, field.value());
            }
        }

        for field in message.fields().flat_fields() {
            if MANAGED_TAGS.contains(&field.tag()) {
                continue;
            }
            put_field(&mut body, field.tag(), field.value());
        }

        let mut wire = BytesMut::with_capacity(body.len() + 32);
        wire.put_slice(b"8=");
        wire.put_slice(self.begin_string.as_bytes());
        wire.put_u8(SOH);
        wire.put_slice(b"9=");
        let mut len_buf = itoa::Buffer::new();
        wire.put_slice(len_buf.format(body.len()).as_bytes());
        wire.put_u8(SOH);
        wire.put_slice(&body);

        let sum = checksum(&wire);
        wire.put_slice(b"10=");
        wire.put_slice(&encode_checksum(sum));
        wire.put_u8(SOH);

        Ok(wire)
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new("FIX.4.4")
    }
}

#[inline]
fn put_field(buf: &mut BytesMut, tag: u32, value: &[u8]) {
    let mut tag_buf = itoa::Buffer::new();
    buf.put_slice(tag_buf.format(tag).as_bytes());
    buf.put_u8(b'=');
    buf.put_slice(value);
    buf.put_u8(SOH);
}
