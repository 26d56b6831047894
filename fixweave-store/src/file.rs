/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Append-only file-backed message store.
//!
//! Each record is one JSON line; replaying the file on open rebuilds the
//! in-memory index, so sequence numbers and sent messages survive process
//! restarts. Later lines win, which makes overwrites and resets cheap
//! appends or rewrites without an external database.

use crate::memory::MemoryStore;
use crate::traits::{Direction, MessageStore, StoredMessage};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use fixweave_core::error::StoreError;
use fixweave_core::types::UtcTimestamp;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    direction: Direction,
    seq_num: u64,
    sending_time: UtcTimestamp,
    raw: String,
}

impl Record {
    fn from_stored(direction: Direction, stored: &StoredMessage) -> Self {
        Self {
            direction,
            seq_num: stored.seq_num,
            sending_time: stored.sending_time,
            raw: BASE64.encode(&stored.raw),
        }
    }

    fn into_stored(self) -> Result<(Direction, StoredMessage), StoreError> {
        let raw = BASE64
            .decode(self.raw.as_bytes())
            .map_err(|e| StoreError::Corrupted {
                reason: format!("bad base64 at seq {}: {e}", self.seq_num),
            })?;
        Ok((
            self.direction,
            StoredMessage {
                seq_num: self.seq_num,
                raw: Bytes::from(raw),
                sending_time: self.sending_time,
            },
        ))
    }
}

/// File-backed [`MessageStore`].
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    cache: MemoryStore,
    writer: Mutex<File>,
}

impl FileStore {
    /// Opens (or creates) the store at `path`, replaying existing records.
    ///
    /// # Errors
    /// Returns `StoreError::Io` on filesystem failure or
    /// `StoreError::Corrupted` when a line cannot be parsed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let cache = MemoryStore::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                for line in contents.lines().filter(|l| !l.trim().is_empty()) {
                    let record: Record =
                        serde_json::from_str(line).map_err(|e| StoreError::Corrupted {
                            reason: format!("bad record line: {e}"),
                        })?;
                    let (direction, stored) = record.into_stored()?;
                    cache
                        .put(direction, stored.seq_num, stored.raw, stored.sending_time)
                        .await?;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::Io(e.to_string())),
        }

        let writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(Self {
            path,
            cache,
            writer: Mutex::new(writer),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, record: &Record) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record).map_err(|e| StoreError::Io(e.to_string()))?;
        line.push('\n');
        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    /// Rewrites the file from the cache; used after a reset so dropped
    /// records do not come back on the next replay.
    async fn rewrite(&self) -> Result<(), StoreError> {
        let mut contents = String::new();
        for direction in [Direction::Sent, Direction::Received] {
            for stored in self.cache.range(direction, 1, 0).await? {
                let record = Record::from_stored(direction, &stored);
                contents.push_str(
                    &serde_json::to_string(&record).map_err(|e| StoreError::Io(e.to_string()))?,
                );
                contents.push('\n');
            }
        }

        let mut writer = self.writer.lock().await;
        let file = File::create(&self.path)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        *writer = file;
        writer
            .write_all(contents.as_bytes())
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| StoreError::Io(e.to_string()))
    }
}

#[async_trait]
impl MessageStore for FileStore {
    async fn put(
        &self,
        direction: Direction,
        seq_num: u64,
        raw: Bytes,
        sending_time: UtcTimestamp,
    ) -> Result<(), StoreError> {
        self.cache
            .put(direction, seq_num, raw.clone(), sending_time)
            .await?;
        let record = Record::from_stored(
            direction,
            &StoredMessage {
                seq_num,
                raw,
                sending_time,
            },
        );
        self.append(&record).await
    }

    async fn get(
        &self,
        direction: Direction,
        seq_num: u64,
    ) -> Result<Option<StoredMessage>, StoreError> {
        self.cache.get(direction, seq_num).await
    }

    async fn range(
        &self,
        direction: Direction,
        lo: u64,
        hi: u64,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        self.cache.range(direction, lo, hi).await
    }

    async fn current_seq(&self, direction: Direction) -> Result<u64, StoreError> {
        self.cache.current_seq(direction).await
    }

    async fn reset(&self, direction: Direction) -> Result<(), StoreError> {
        self.cache.reset(direction).await?;
        self.rewrite().await
    }
}
