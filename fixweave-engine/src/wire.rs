/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Wire processor: the boundary between bytes and messages.
//!
//! Inbound it decodes framed bytes into [`Message`]s, answering protocol
//! errors (missing tags, short groups) with a session-level Reject so the
//! session keeps running. Outbound it stamps the session header fields and
//! encodes to wire bytes.

use crate::context::EngineContext;
use async_trait::async_trait;
use fixweave_core::error::DecodeError;
use fixweave_core::message::Message;
use fixweave_core::tags;
use fixweave_core::types::UtcTimestamp;
use fixweave_pipeline::{Envelope, Processor, ProcessorError};
use fixweave_tagvalue::{decoder::peek_field, Decoder, Encoder};
use tracing::warn;

/// Converts between raw frames and parsed messages.
#[derive(Debug)]
pub struct WireProcessor {
    ctx: EngineContext,
    decoder: Decoder,
    encoder: Encoder,
}

impl WireProcessor {
    /// Creates the processor from the engine context.
    #[must_use]
    pub fn new(ctx: EngineContext) -> Self {
        let decoder = Decoder::with_registry(ctx.templates.clone());
        let encoder = Encoder::new(ctx.config.begin_string.clone());
        Self {
            ctx,
            decoder,
            encoder,
        }
    }

    /// Maps a recoverable decode error to the Reject it earns.
    fn reject_for(error: &DecodeError, raw: &[u8]) -> Option<Message> {
        let ref_seq = peek_field(raw, tags::MSG_SEQ_NUM)
            .and_then(|v| std::str::from_utf8(v).ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let ref_tag = match error {
            DecodeError::MissingField { tag }
            | DecodeError::UnknownTag { tag }
            | DecodeError::InvalidFieldValue { tag, .. } => Some(*tag),
            DecodeError::GroupParseError { count_tag, .. } => Some(*count_tag),
            _ => return None,
        };
        Some(Message::reject(ref_seq, ref_tag, &error.to_string()))
    }
}

#[async_trait]
impl Processor for WireProcessor {
    fn name(&self) -> &str {
        "wire"
    }

    async fn on_receive(&self, envelope: Envelope) -> Result<Option<Envelope>, ProcessorError> {
        let Envelope::Raw(bytes) = envelope else {
            // Already parsed: a buffered message re-entering after gap fill.
            return Ok(Some(envelope));
        };

        match self.decoder.decode(&bytes) {
            Ok((message, _consumed)) => Ok(Some(Envelope::Parsed(message))),
            Err(error) => match Self::reject_for(&error, &bytes) {
                Some(reject) => {
                    warn!(error = %error, "rejecting undecodable message");
                    self.ctx.handle.send(reject);
                    Ok(None)
                }
                // Framing errors should have been stopped by the frame
                // codec; reaching here means the stream is unusable.
                None => Err(error.into()),
            },
        }
    }

    async fn on_send(&self, envelope: Envelope) -> Result<Option<Envelope>, ProcessorError> {
        let Envelope::Parsed(mut message) = envelope else {
            return Ok(Some(envelope));
        };

        if message.get(tags::SENDER_COMP_ID).is_none() {
            message
                .set(tags::SENDER_COMP_ID, self.ctx.config.sender_comp_id.as_bytes().to_vec())
                .map_err(ProcessorError::from)?;
        }
        if message.get(tags::TARGET_COMP_ID).is_none() {
            message
                .set(tags::TARGET_COMP_ID, self.ctx.config.target_comp_id.as_bytes().to_vec())
                .map_err(ProcessorError::from)?;
        }
        message
            .set(tags::SENDING_TIME, UtcTimestamp::now().to_wire().into_bytes())
            .map_err(ProcessorError::from)?;

        let wire = self
            .encoder
            .encode(&message)
            .map_err(|e| ProcessorError::Fix(e.into()))?;
        Ok(Some(Envelope::Raw(wire.freeze())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::test_context;
    use fixweave_core::message::MsgType;

    fn encode_frame(body: &str) -> bytes::Bytes {
        let mut msg = format!("8=FIX.4.4\x019={}\x01{}", body.len(), body).into_bytes();
        let sum = fixweave_tagvalue::checksum(&msg);
        msg.extend_from_slice(b"10=");
        msg.extend_from_slice(&fixweave_tagvalue::encode_checksum(sum));
        msg.push(0x01);
        bytes::Bytes::from(msg)
    }

    #[tokio::test]
    async fn decodes_inbound_frames() {
        let (ctx, _wiring) = test_context();
        let wire = WireProcessor::new(ctx);

        let frame = encode_frame("35=0\x0134=2\x0149=BROKER\x0156=CLIENT\x01");
        let out = wire.on_receive(Envelope::Raw(frame)).await.unwrap().unwrap();
        let msg = out.message().unwrap();
        assert_eq!(*msg.msg_type(), MsgType::Heartbeat);
        assert_eq!(msg.seq_num(), Some(2));
    }

    #[tokio::test]
    async fn rejects_message_without_msg_type() {
        let (ctx, mut wiring) = test_context();
        let wire = WireProcessor::new(ctx);

        let frame = encode_frame("34=7\x0149=BROKER\x01");
        let out = wire.on_receive(Envelope::Raw(frame)).await.unwrap();
        assert!(out.is_none());

        let reject = wiring.try_next_outbound().unwrap().into_message().unwrap();
        assert_eq!(*reject.msg_type(), MsgType::Reject);
        assert_eq!(reject.get(tags::REF_SEQ_NUM).unwrap().as_u64().unwrap(), 7);
        assert_eq!(reject.get(tags::REF_TAG_ID).unwrap().as_u64().unwrap(), 35);
    }

    #[tokio::test]
    async fn outbound_gets_header_and_frames() {
        let (ctx, _wiring) = test_context();
        let wire = WireProcessor::new(ctx);

        let mut msg = Message::heartbeat(None);
        msg.set_seq_num(4);
        let out = wire.on_send(Envelope::Parsed(msg)).await.unwrap().unwrap();

        let bytes = out.bytes().unwrap();
        let text = String::from_utf8_lossy(bytes);
        assert!(text.starts_with("8=FIX.4.4\x01"));
        assert!(text.contains("49=CLIENT\x01"));
        assert!(text.contains("56=BROKER\x01"));
        assert!(text.contains("52="));
        assert!(text.contains("34=4\x01"));

        // The emitted frame decodes cleanly.
        let decoder = Decoder::new();
        decoder.decode(bytes).unwrap();
    }

    #[tokio::test]
    async fn parsed_envelopes_pass_straight_through() {
        let (ctx, _wiring) = test_context();
        let wire = WireProcessor::new(ctx);

        let msg = Message::heartbeat(None);
        let out = wire
            .on_receive(Envelope::Parsed(msg))
            .await
            .unwrap()
            .unwrap();
        assert!(out.message().is_some());
    }
}
