/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! # fixweave-store
//!
//! Message persistence for the fixweave FIX engine.
//!
//! This crate provides:
//! - **Trait**: [`MessageStore`], keyed by [`Direction`] and sequence number
//! - **Memory backend**: [`MemoryStore`] for tests and reset-on-logon
//!   sessions
//! - **File backend**: [`FileStore`], an append-only JSON-lines store that
//!   survives restarts

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use traits::{Direction, MessageStore, StoredMessage};
