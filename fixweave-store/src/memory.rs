/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! In-memory message store.
//!
//! BTreeMaps per direction give ordered range scans for gap-fill replay. Not
//! persistent; suited to tests and sessions that reset sequence numbers on
//! every logon.

use crate::traits::{Direction, MessageStore, StoredMessage};
use async_trait::async_trait;
use bytes::Bytes;
use fixweave_core::error::StoreError;
use fixweave_core::types::UtcTimestamp;
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct Shelves {
    sent: BTreeMap<u64, StoredMessage>,
    received: BTreeMap<u64, StoredMessage>,
}

impl Shelves {
    fn shelf(&self, direction: Direction) -> &BTreeMap<u64, StoredMessage> {
        match direction {
            Direction::Sent => &self.sent,
            Direction::Received => &self.received,
        }
    }

    fn shelf_mut(&mut self, direction: Direction) -> &mut BTreeMap<u64, StoredMessage> {
        match direction {
            Direction::Sent => &mut self.sent,
            Direction::Received => &mut self.received,
        }
    }
}

/// In-memory [`MessageStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    shelves: RwLock<Shelves>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held for a direction.
    #[must_use]
    pub fn len(&self, direction: Direction) -> usize {
        self.shelves.read().shelf(direction).len()
    }

    /// Returns true if a direction holds no records.
    #[must_use]
    pub fn is_empty(&self, direction: Direction) -> bool {
        self.len(direction) == 0
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn put(
        &self,
        direction: Direction,
        seq_num: u64,
        raw: Bytes,
        sending_time: UtcTimestamp,
    ) -> Result<(), StoreError> {
        self.shelves.write().shelf_mut(direction).insert(
            seq_num,
            StoredMessage {
                seq_num,
                raw,
                sending_time,
            },
        );
        Ok(())
    }

    async fn get(
        &self,
        direction: Direction,
        seq_num: u64,
    ) -> Result<Option<StoredMessage>, StoreError> {
        Ok(self.shelves.read().shelf(direction).get(&seq_num).cloned())
    }

    async fn range(
        &self,
        direction: Direction,
        lo: u64,
        hi: u64,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let hi = if hi == 0 { u64::MAX } else { hi };
        Ok(self
            .shelves
            .read()
            .shelf(direction)
            .range(lo..=hi)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn current_seq(&self, direction: Direction) -> Result<u64, StoreError> {
        Ok(self
            .shelves
            .read()
            .shelf(direction)
            .last_key_value()
            .map_or(0, |(&seq, _)| seq))
    }

    async fn reset(&self, direction: Direction) -> Result<(), StoreError> {
        self.shelves.write().shelf_mut(direction).clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(seq: u64) -> (u64, Bytes, UtcTimestamp) {
        (
            seq,
            Bytes::from(format!("8=FIX.4.4\x0134={seq}\x01")),
            UtcTimestamp::from_millis(1_000 * seq as i64),
        )
    }

    #[tokio::test]
    async fn put_get_per_direction() {
        let store = MemoryStore::new();
        let (seq, raw, ts) = record(5);
        store.put(Direction::Sent, seq, raw.clone(), ts).await.unwrap();

        let found = store.get(Direction::Sent, 5).await.unwrap().unwrap();
        assert_eq!(found.raw, raw);
        assert_eq!(found.sending_time, ts);

        // Directions are independent keyspaces.
        assert!(store.get(Direction::Received, 5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn range_is_ordered_and_bounded() {
        let store = MemoryStore::new();
        for seq in [3, 1, 5, 2] {
            let (seq, raw, ts) = record(seq);
            store.put(Direction::Sent, seq, raw, ts).await.unwrap();
        }

        let records = store.range(Direction::Sent, 2, 3).await.unwrap();
        let seqs: Vec<u64> = records.iter().map(|r| r.seq_num).collect();
        assert_eq!(seqs, vec![2, 3]);

        // hi == 0 reads to the end.
        let records = store.range(Direction::Sent, 2, 0).await.unwrap();
        let seqs: Vec<u64> = records.iter().map(|r| r.seq_num).collect();
        assert_eq!(seqs, vec![2, 3, 5]);
    }

    #[tokio::test]
    async fn current_seq_tracks_highest() {
        let store = MemoryStore::new();
        assert_eq!(store.current_seq(Direction::Sent).await.unwrap(), 0);

        for seq in [1, 4, 2] {
            let (seq, raw, ts) = record(seq);
            store.put(Direction::Sent, seq, raw, ts).await.unwrap();
        }
        assert_eq!(store.current_seq(Direction::Sent).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn reset_clears_one_direction() {
        let store = MemoryStore::new();
        let (seq, raw, ts) = record(1);
        store.put(Direction::Sent, seq, raw.clone(), ts).await.unwrap();
        store.put(Direction::Received, seq, raw, ts).await.unwrap();

        store.reset(Direction::Sent).await.unwrap();
        assert!(store.is_empty(Direction::Sent));
        assert_eq!(store.len(Direction::Received), 1);
    }
}
