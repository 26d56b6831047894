/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Session identity persistence.
//!
//! A short `{connection_name}.sid` file names the current session. On start
//! we either resume it (sequence numbers then come from the message store)
//! or mint a new id and start sequences from 1.

use std::io;
use std::path::{Path, PathBuf};

/// Result of resolving the session identity on startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    /// The session id now in effect.
    pub sid: String,
    /// True when an existing session was resumed.
    pub resumed: bool,
}

/// The sid file for one connection.
#[derive(Debug, Clone)]
pub struct SidFile {
    path: PathBuf,
}

impl SidFile {
    /// Creates a handle for the sid file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves the session identity.
    ///
    /// An existing sid is resumed unless `reset` is set; otherwise (or when
    /// no file exists) a fresh id is written.
    ///
    /// # Errors
    /// Returns `io::Error` on filesystem failure.
    pub fn load_or_create(&self, reset: bool) -> io::Result<SessionIdentity> {
        if !reset
            && let Ok(existing) = std::fs::read_to_string(&self.path)
        {
            let sid = existing.trim().to_string();
            if !sid.is_empty() {
                tracing::info!(sid = %sid, "resuming existing session");
                return Ok(SessionIdentity { sid, resumed: true });
            }
        }

        let sid = uuid::Uuid::new_v4().simple().to_string();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, format!("{sid}\n"))?;
        tracing::info!(sid = %sid, "created new session");
        Ok(SessionIdentity { sid, resumed: false })
    }

    /// Deletes the sid file, forcing a new session on the next start.
    ///
    /// # Errors
    /// Returns `io::Error` on filesystem failure other than the file being
    /// absent already.
    pub fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
