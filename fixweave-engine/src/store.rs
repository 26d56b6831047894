/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Store processor: records raw traffic in both directions.
//!
//! Sits between the wire codec and the transport so every record is the
//! exact bytes that crossed (or will cross) the socket. Outbound records
//! land before the transport writes them, which is what lets a resend
//! replay exactly what the counterparty should have seen.

use crate::context::EngineContext;
use async_trait::async_trait;
use bytes::Bytes;
use fixweave_core::tags;
use fixweave_core::types::UtcTimestamp;
use fixweave_pipeline::{Envelope, Processor, ProcessorError};
use fixweave_store::Direction;
use fixweave_tagvalue::decoder::peek_field;
use tracing::warn;

/// Persists raw frames keyed by direction and sequence number.
#[derive(Debug)]
pub struct StoreProcessor {
    ctx: EngineContext,
}

impl StoreProcessor {
    /// Creates the processor from the engine context.
    #[must_use]
    pub const fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    async fn record(&self, direction: Direction, raw: &Bytes) -> Result<(), ProcessorError> {
        let Some(seq) = peek_field(raw, tags::MSG_SEQ_NUM)
            .and_then(|v| std::str::from_utf8(v).ok())
            .and_then(|s| s.parse().ok())
        else {
            // Nothing to key the record by; the session layer will deal
            // with the missing tag.
            warn!(%direction, "frame without MsgSeqNum not recorded");
            return Ok(());
        };

        let sending_time = peek_field(raw, tags::SENDING_TIME)
            .and_then(|v| std::str::from_utf8(v).ok())
            .and_then(|s| UtcTimestamp::parse(s).ok())
            .unwrap_or_else(UtcTimestamp::now);

        self.ctx
            .store
            .put(direction, seq, raw.clone(), sending_time)
            .await
            .map_err(ProcessorError::from)
    }
}

#[async_trait]
impl Processor for StoreProcessor {
    fn name(&self) -> &str {
        "store"
    }

    async fn on_receive(&self, envelope: Envelope) -> Result<Option<Envelope>, ProcessorError> {
        if let Envelope::Raw(raw) = &envelope {
            self.record(Direction::Received, raw).await?;
        }
        Ok(Some(envelope))
    }

    async fn on_send(&self, envelope: Envelope) -> Result<Option<Envelope>, ProcessorError> {
        if let Envelope::Raw(raw) = &envelope {
            self.record(Direction::Sent, raw).await?;
        }
        Ok(Some(envelope))
    }
}
