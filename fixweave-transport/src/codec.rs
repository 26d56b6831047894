/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Frame splitter for the FIX byte stream.
//!
//! [`FrameCodec`] cuts complete `8=...10=NNN<SOH>` frames out of a buffered
//! byte stream, validating BodyLength and CheckSum before the bytes enter
//! the pipeline. After a framing error the owner calls [`FrameCodec::resync`]
//! to skip to the next `8=` marker; the gap this leaves surfaces later as a
//! sequence-number jump, which the session recovers through a ResendRequest.

use bytes::BytesMut;
use fixweave_tagvalue::checksum::{checksum, decode_checksum};
use memchr::{memchr, memmem};
use thiserror::Error;
use tokio_util::codec::Decoder;

/// SOH delimiter.
const SOH: u8 = 0x01;
/// `10=NNN<SOH>`.
const TRAILER_LEN: usize = 7;
/// Smallest frame worth attempting: `8=F\x019=1\x0135=0\x0110=000\x01`.
const MIN_FRAME: usize = 20;

/// Framing failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The buffer does not open with `8=`.
    #[error("frame does not start with 8=")]
    BadBeginString,

    /// Tag 9 is missing or its value is not an integer.
    #[error("missing or invalid body length")]
    BadBodyLength,

    /// The trailer is not where BodyLength says it should be.
    #[error("body length points past the checksum field")]
    BodyLengthMismatch,

    /// The trailer checksum does not match the frame bytes.
    #[error("checksum mismatch: calculated {calculated}, declared {declared}")]
    ChecksumMismatch {
        /// Checksum computed over the frame.
        calculated: u8,
        /// Checksum declared in the trailer.
        declared: u8,
    },

    /// The declared frame exceeds the configured maximum.
    #[error("frame of {size} bytes exceeds maximum {max_size}")]
    TooLarge {
        /// Declared frame size.
        size: usize,
        /// Configured maximum.
        max_size: usize,
    },

    /// I/O failure from the underlying stream.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for FrameError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Stateless frame splitter implementing [`tokio_util::codec::Decoder`].
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_message_size: usize,
    validate_checksum: bool,
}

impl FrameCodec {
    /// Creates a codec with a 1 MiB frame limit and checksum validation on.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_message_size: 1024 * 1024,
            validate_checksum: true,
        }
    }

    /// Sets the maximum accepted frame size.
    #[must_use]
    pub const fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }

    /// Enables or disables checksum validation.
    #[must_use]
    pub const fn with_checksum_validation(mut self, validate: bool) -> Self {
        self.validate_checksum = validate;
        self
    }

    /// Discards bytes up to the next `8=` marker after a framing error.
    ///
    /// Returns true when a marker was found (decoding can continue) and
    /// false when the buffer was exhausted and cleared.
    pub fn resync(src: &mut BytesMut) -> bool {
        if let Some(pos) = memmem::find(&src[..], b"\x018=") {
            let _ = src.split_to(pos + 1);
            true
        } else {
            src.clear();
            false
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < MIN_FRAME {
            return Ok(None);
        }
        if &src[..2] != b"8=" {
            return Err(FrameError::BadBeginString);
        }

        let Some(begin_end) = memchr(SOH, src) else {
            return Ok(None);
        };

        let len_start = begin_end + 1;
        if src.len() < len_start + 2 {
            return Ok(None);
        }
        if &src[len_start..len_start + 2] != b"9=" {
            return Err(FrameError::BadBodyLength);
        }
        let Some(len_soh) = memchr(SOH, &src[len_start..]) else {
            return Ok(None);
        };
        let len_soh = len_start + len_soh;
        let body_length: usize = std::str::from_utf8(&src[len_start + 2..len_soh])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(FrameError::BadBodyLength)?;

        let body_start = len_soh + 1;
        let total = body_start + body_length + TRAILER_LEN;
        if total > self.max_message_size {
            return Err(FrameError::TooLarge {
                size: total,
                max_size: self.max_message_size,
            });
        }
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let trailer_start = total - TRAILER_LEN;
        if &src[trailer_start..trailer_start + 3] != b"10=" || src[total - 1] != SOH {
            return Err(FrameError::BodyLengthMismatch);
        }

        if self.validate_checksum {
            let declared = decode_checksum(&src[trailer_start + 3..trailer_start + 6])
                .ok_or(FrameError::BodyLengthMismatch)?;
            let calculated = checksum(&src[..trailer_start]);
            if calculated != declared {
                return Err(FrameError::ChecksumMismatch {
                    calculated,
                    declared,
                });
            }
        }

        Ok(Some(src.split_to(total)))
    }
}
