/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Core value types shared across the engine.
//!
//! This module provides:
//! - [`CompId`]: bounded component identifier (SenderCompID / TargetCompID)
//! - [`UtcTimestamp`]: FIX UTCTimestamp with parse and format support

use crate::error::DecodeError;
use arrayvec::ArrayString;
use chrono::{DateTime, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length for CompID strings in bytes.
pub const COMP_ID_MAX_LEN: usize = 32;

/// Component identifier for FIX sessions (tags 49 and 56).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct CompId(ArrayString<COMP_ID_MAX_LEN>);

impl CompId {
    /// Creates a new CompId, or `None` if `s` exceeds [`COMP_ID_MAX_LEN`].
    #[must_use]
    pub fn new(s: &str) -> Option<Self> {
        ArrayString::from(s).ok().map(Self)
    }

    /// Returns the identifier as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the identifier bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl AsRef<str> for CompId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for CompId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CompId {
    type Err = arrayvec::CapacityError<()>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArrayString::try_from(s)
            .map(Self)
            .map_err(|_| arrayvec::CapacityError::new(()))
    }
}

/// The wire formats accepted for UTCTimestamp values.
const FORMAT_MILLIS: &str = "%Y%m%d-%H:%M:%S%.3f";
const FORMAT_SECONDS: &str = "%Y%m%d-%H:%M:%S";

/// A FIX UTCTimestamp: `YYYYMMDD-HH:MM:SS` with optional `.sss` milliseconds.
///
/// Encoding uses millisecond precision when the value carries sub-second
/// data, second precision otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct UtcTimestamp(DateTime<Utc>);

impl UtcTimestamp {
    /// Returns the current UTC time.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Wraps an existing `DateTime<Utc>`.
    #[inline]
    #[must_use]
    pub const fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Creates a timestamp from milliseconds since the Unix epoch.
    #[must_use]
    pub fn from_millis(millis: i64) -> Self {
        Self(Utc.timestamp_millis_opt(millis).single().unwrap_or_default())
    }

    /// Returns the wrapped `DateTime<Utc>`.
    #[inline]
    #[must_use]
    pub const fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Parses a FIX UTCTimestamp string.
    ///
    /// Accepts both `YYYYMMDD-HH:MM:SS` and `YYYYMMDD-HH:MM:SS.sss`.
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidFieldValue` if neither format matches.
    pub fn parse(s: &str) -> Result<Self, DecodeError> {
        NaiveDateTime::parse_from_str(s, FORMAT_MILLIS)
            .or_else(|_| NaiveDateTime::parse_from_str(s, FORMAT_SECONDS))
            .map(|naive| Self(Utc.from_utc_datetime(&naive)))
            .map_err(|_| DecodeError::InvalidFieldValue {
                tag: 52,
                reason: format!("'{s}' is not a UTCTimestamp"),
            })
    }

    /// Formats the timestamp for the wire.
    ///
    /// Millisecond precision when the value has sub-second data, otherwise
    /// second precision.
    #[must_use]
    pub fn to_wire(&self) -> String {
        if self.0.nanosecond() == 0 {
            self.0.format(FORMAT_SECONDS).to_string()
        } else {
            self.0.format(FORMAT_MILLIS).to_string()
        }
    }
}

impl fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_wire())
    }
}

impl From<DateTime<Utc>> for UtcTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}
