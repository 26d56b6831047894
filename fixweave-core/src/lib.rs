/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! # fixweave-core
//!
//! Message model and error types for the fixweave FIX engine.
//!
//! This crate provides the fundamental building blocks used across all
//! fixweave crates:
//! - **Error types**: layered `thiserror` enums under [`FixError`]
//! - **Fields**: owned [`Field`] with typed views and cross-representation
//!   equality
//! - **Field maps**: [`FieldMap`] with dict and list forms, repeating
//!   [`Group`]s and [`GroupTemplate`]s
//! - **Messages**: [`Message`] with typed admin constructors and the generic
//!   factory
//! - **Tag dictionary**: static name↔number table in [`tags`]
//! - **JSON interchange**: the `{"type", "fields"}` format in [`json`]

pub mod error;
pub mod field;
pub mod fieldmap;
pub mod json;
pub mod message;
pub mod tags;
pub mod types;

pub use error::{ConfigError, DecodeError, EncodeError, FixError, Result, SessionError, StoreError};
pub use field::Field;
pub use fieldmap::{Entry, FieldMap, Group, GroupTemplate};
pub use message::{Message, MsgType};
pub use types::{CompId, UtcTimestamp};
