/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! # fixweave-engine
//!
//! The concrete FIX client engine: session processors, the processor
//! registry, and the runner.
//!
//! This crate provides:
//! - **Session processors**: heartbeat, authentication, sequence numbers,
//!   wire codec, store, transport
//! - **Broker seam**: [`BrokerLink`] pub/sub bridging
//! - **Registry**: `pipeline_apps` identifiers → processors
//! - **Runner**: [`Engine`] lifecycle and the exit-code contract
//!
//! The default pipeline, top to bottom:
//!
//! ```text
//! heartbeat → authentication → seqnum → wire → store → transport
//! ```
//!
//! Inbound messages climb that chain, outbound messages descend it.

pub mod auth;
pub mod broker;
pub mod context;
pub mod heartbeat;
pub mod registry;
pub mod runner;
pub mod seqnum;
pub mod store;
pub mod transport;
pub mod wire;

pub use auth::AuthProcessor;
pub use broker::{BrokerLink, BrokerProcessor, ChannelBroker, ChannelBrokerRemote};
pub use context::EngineContext;
pub use heartbeat::HeartbeatProcessor;
pub use registry::build_processors;
pub use runner::{exit_code_for, init_tracing, Engine, ExitCode};
pub use seqnum::SeqNumProcessor;
pub use store::StoreProcessor;
pub use transport::TransportProcessor;
pub use wire::WireProcessor;
