/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Message store interface.
//!
//! The store keeps raw message bytes keyed by direction and sequence number
//! so gap-fill processing can replay what was actually sent, and so sequence
//! numbers survive process restarts.

use async_trait::async_trait;
use bytes::Bytes;
use fixweave_core::error::StoreError;
use fixweave_core::types::UtcTimestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the session a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Messages we transmitted.
    Sent,
    /// Messages the counterparty transmitted.
    Received,
}

impl Direction {
    /// Returns the lowercase key form used in persisted layouts.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Received => "received",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored message record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    /// MsgSeqNum of the record.
    pub seq_num: u64,
    /// The raw wire bytes.
    pub raw: Bytes,
    /// SendingTime at the moment the record was written.
    pub sending_time: UtcTimestamp,
}

/// Abstract message persistence keyed by (direction, sequence number).
///
/// A single writer (the session) performs all read-modify-write sequences, so
/// implementations only need interior mutability, not transactional locking.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Writes a record, replacing any previous record at the same key.
    ///
    /// # Errors
    /// Returns `StoreError` if the record cannot be persisted.
    async fn put(
        &self,
        direction: Direction,
        seq_num: u64,
        raw: Bytes,
        sending_time: UtcTimestamp,
    ) -> Result<(), StoreError>;

    /// Reads the record at (direction, seq_num), if any.
    ///
    /// # Errors
    /// Returns `StoreError` on backend failure; a missing record is `None`.
    async fn get(&self, direction: Direction, seq_num: u64)
        -> Result<Option<StoredMessage>, StoreError>;

    /// Reads records in `[lo, hi]` in ascending sequence order.
    /// `hi == 0` means "to the highest stored number".
    ///
    /// # Errors
    /// Returns `StoreError` on backend failure.
    async fn range(
        &self,
        direction: Direction,
        lo: u64,
        hi: u64,
    ) -> Result<Vec<StoredMessage>, StoreError>;

    /// Returns the highest sequence number stored for a direction, or 0.
    async fn current_seq(&self, direction: Direction) -> Result<u64, StoreError>;

    /// Removes every record for a direction.
    ///
    /// # Errors
    /// Returns `StoreError` if the reset fails.
    async fn reset(&self, direction: Direction) -> Result<(), StoreError>;
}
