/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! The processor contract.
//!
//! Every stage of the pipeline implements [`Processor`]. Inbound messages
//! climb from the transport toward the application; outbound messages fall
//! the other way. A stage forwards a message by returning it, swallows it by
//! returning `None`, and kills the pipeline by returning an error.

use async_trait::async_trait;
use bytes::Bytes;
use fixweave_core::error::{DecodeError, FixError, SessionError, StoreError};
use fixweave_core::message::Message;
use thiserror::Error;

/// What travels through the pipeline.
///
/// Below the wire processor a message is raw frame bytes; above it, a parsed
/// [`Message`]. Stages that only care about one representation pass the
/// other through untouched.
#[derive(Debug, Clone)]
pub enum Envelope {
    /// Raw frame bytes (between the transport and the wire codec).
    Raw(Bytes),
    /// A decoded message (between the wire codec and the application).
    Parsed(Message),
}

impl Envelope {
    /// Returns the parsed message, if this envelope holds one.
    #[must_use]
    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::Parsed(msg) => Some(msg),
            Self::Raw(_) => None,
        }
    }

    /// Unwraps into the parsed message, if this envelope holds one.
    #[must_use]
    pub fn into_message(self) -> Option<Message> {
        match self {
            Self::Parsed(msg) => Some(msg),
            Self::Raw(_) => None,
        }
    }

    /// Returns the raw bytes, if this envelope holds them.
    #[must_use]
    pub fn bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Raw(bytes) => Some(bytes),
            Self::Parsed(_) => None,
        }
    }
}

impl From<Message> for Envelope {
    fn from(msg: Message) -> Self {
        Self::Parsed(msg)
    }
}

impl From<Bytes> for Envelope {
    fn from(bytes: Bytes) -> Self {
        Self::Raw(bytes)
    }
}

/// A fatal processor failure. Any error returned from a handler stops the
/// pipeline; a stage that merely wants to drop a message returns `Ok(None)`.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// An engine-layer error bubbled out of a handler.
    #[error(transparent)]
    Fix(#[from] FixError),

    /// A failure specific to the processor itself.
    #[error("processor failure: {0}")]
    Failed(String),
}

impl From<DecodeError> for ProcessorError {
    fn from(e: DecodeError) -> Self {
        Self::Fix(e.into())
    }
}

impl From<SessionError> for ProcessorError {
    fn from(e: SessionError) -> Self {
        Self::Fix(e.into())
    }
}

impl From<StoreError> for ProcessorError {
    fn from(e: StoreError) -> Self {
        Self::Fix(e.into())
    }
}

/// One stage in the pipeline.
///
/// Stages run on the pipeline's workers: at most one inbound and one
/// outbound handler execute at a time, so implementations need interior
/// mutability only for state the two directions share.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Short identifier used in logs and the registry.
    fn name(&self) -> &str;

    /// Called when the pipeline starts, bottom-up. Spawn long-lived tasks
    /// here and keep their handles for [`stop`](Processor::stop).
    async fn start(&self) -> Result<(), ProcessorError> {
        Ok(())
    }

    /// Called when the pipeline stops, top-down. Cancel tasks and timers;
    /// errors are collected, not fatal to the remaining stops.
    async fn stop(&self) -> Result<(), ProcessorError> {
        Ok(())
    }

    /// Inbound traversal. Return the (possibly replaced) envelope to keep it
    /// moving toward the application, `None` to stop propagation.
    async fn on_receive(&self, envelope: Envelope) -> Result<Option<Envelope>, ProcessorError> {
        Ok(Some(envelope))
    }

    /// Outbound traversal. Return the envelope to keep it moving toward the
    /// wire, `None` to stop propagation (the message is not transmitted).
    async fn on_send(&self, envelope: Envelope) -> Result<Option<Envelope>, ProcessorError> {
        Ok(Some(envelope))
    }
}
