/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! # fixweave-session
//!
//! Session layer state for the fixweave FIX engine.
//!
//! This crate provides:
//! - **Configuration**: [`SessionConfig`] with the recognized session keys
//! - **State machine**: [`SessionStatus`] and the shared [`SessionCore`]
//! - **Sequence numbers**: [`SequenceManager`] with inbound classification
//! - **Heartbeat timing**: [`HeartbeatMonitor`] with a configurable grace
//!   ratio
//! - **Identity**: the `.sid` file handling in [`sid`]

pub mod config;
pub mod heartbeat;
pub mod sequence;
pub mod sid;
pub mod state;

pub use config::{SessionConfig, StoreSelector};
pub use heartbeat::{HeartbeatAction, HeartbeatMonitor};
pub use sequence::{SeqCheck, SequenceManager};
pub use sid::{SessionIdentity, SidFile};
pub use state::{SessionCore, SessionStatus};
