/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! # fixweave-tagvalue
//!
//! tag=value wire codec for the fixweave FIX engine.
//!
//! This crate provides:
//! - **Decoder**: framing validation and group-aware message parsing
//! - **Encoder**: canonical-order serialization with computed BodyLength and
//!   CheckSum
//! - **Templates**: the repeating-group registry keyed by message type
//! - **Checksum**: the mod-256 trailer arithmetic

pub mod checksum;
pub mod decoder;
pub mod encoder;
pub mod template;

pub use checksum::{checksum, decode_checksum, encode_checksum};
pub use decoder::{peek_field, resync, Decoder, SOH};
pub use encoder::Encoder;
pub use template::TemplateRegistry;
