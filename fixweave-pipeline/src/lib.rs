/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! # fixweave-pipeline
//!
//! The bidirectional processor pipeline for the fixweave FIX engine.
//!
//! This crate provides:
//! - **Processor trait**: lifecycle hooks plus `on_receive` / `on_send`
//! - **Envelope**: raw bytes below the wire codec, parsed messages above it
//! - **Dispatcher**: static per-MsgType handler tables
//! - **Pipeline**: per-direction serial workers, bottom-up start, top-down
//!   stop with a stored cause

pub mod dispatcher;
pub mod pipeline;
pub mod processor;

pub use dispatcher::{Dispatched, Dispatcher, Handler, HandlerFuture};
pub use pipeline::{Pipeline, PipelineHandle, PipelineWiring, StopCause};
pub use processor::{Envelope, Processor, ProcessorError};
