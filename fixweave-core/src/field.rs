/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Owned FIX field: a (tag, value) pair with typed views.
//!
//! Values are byte strings on the wire. [`Field`] keeps the bytes and exposes
//! them as text, integers, decimals, booleans, and timestamps on demand, so a
//! field parsed once can be read in whichever representation a consumer needs.

use crate::error::DecodeError;
use crate::types::UtcTimestamp;
use bytes::Bytes;
use rust_decimal::Decimal;
use std::fmt;

/// The FIX "null" sentinel; a value equal to this string means "absent".
pub const NULL_SENTINEL: &[u8] = b"-2147483648";

/// An atomic (tag, value) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    tag: u32,
    value: Bytes,
}

impl Field {
    /// Creates a field from a tag and raw value bytes.
    #[must_use]
    pub fn new(tag: u32, value: impl Into<Bytes>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// Creates a field from any value with a canonical string form.
    #[must_use]
    pub fn from_display(tag: u32, value: impl fmt::Display) -> Self {
        Self::new(tag, value.to_string().into_bytes())
    }

    /// Creates a Y/N boolean field.
    #[must_use]
    pub fn bool(tag: u32, value: bool) -> Self {
        Self::new(tag, if value { &b"Y"[..] } else { &b"N"[..] })
    }

    /// Creates an unsigned integer field.
    #[must_use]
    pub fn uint(tag: u32, value: u64) -> Self {
        let mut buf = itoa::Buffer::new();
        Self::new(tag, buf.format(value).as_bytes().to_vec())
    }

    /// Creates a timestamp field in wire format.
    #[must_use]
    pub fn timestamp(tag: u32, value: UtcTimestamp) -> Self {
        Self::new(tag, value.to_wire().into_bytes())
    }

    /// Returns the tag number.
    #[inline]
    #[must_use]
    pub const fn tag(&self) -> u32 {
        self.tag
    }

    /// Returns the raw value bytes.
    #[inline]
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Returns a cheap clone of the value bytes.
    #[inline]
    #[must_use]
    pub fn value_bytes(&self) -> Bytes {
        self.value.clone()
    }

    /// Returns true if the value is the FIX null sentinel.
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.value.as_ref() == NULL_SENTINEL
    }

    /// Returns the value as text.
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidUtf8` if the bytes are not valid UTF-8.
    pub fn as_str(&self) -> Result<&str, DecodeError> {
        std::str::from_utf8(&self.value).map_err(DecodeError::from)
    }

    /// Parses the value as the given type via its `FromStr` impl.
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidFieldValue` if parsing fails.
    pub fn parse<T: std::str::FromStr>(&self) -> Result<T, DecodeError> {
        let s = self.as_str()?;
        s.parse().map_err(|_| DecodeError::InvalidFieldValue {
            tag: self.tag,
            reason: format!("cannot parse '{}' as {}", s, std::any::type_name::<T>()),
        })
    }

    /// Returns the value as a `u64`.
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidFieldValue` for non-integer values.
    pub fn as_u64(&self) -> Result<u64, DecodeError> {
        self.parse()
    }

    /// Returns the value as an `i64`.
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidFieldValue` for non-integer values.
    pub fn as_i64(&self) -> Result<i64, DecodeError> {
        self.parse()
    }

    /// Returns the value as a `Decimal`.
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidFieldValue` for non-decimal values.
    pub fn as_decimal(&self) -> Result<Decimal, DecodeError> {
        self.parse()
    }

    /// Returns the value as a boolean: `Y` is true, `N` is false.
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidFieldValue` for any other value.
    pub fn as_bool(&self) -> Result<bool, DecodeError> {
        match self.value.as_ref() {
            b"Y" => Ok(true),
            b"N" => Ok(false),
            _ => Err(DecodeError::InvalidFieldValue {
                tag: self.tag,
                reason: "expected 'Y' or 'N'".to_string(),
            }),
        }
    }

    /// Returns the value as a UTCTimestamp.
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidFieldValue` if the format does not match.
    pub fn as_timestamp(&self) -> Result<UtcTimestamp, DecodeError> {
        UtcTimestamp::parse(self.as_str()?)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.tag, String::from_utf8_lossy(&self.value))
    }
}

// A field compares equal to any representation whose canonical string form
// matches the field's text.

impl PartialEq<str> for Field {
    fn eq(&self, other: &str) -> bool {
        self.value.as_ref() == other.as_bytes()
    }
}

impl PartialEq<&str> for Field {
    fn eq(&self, other: &&str) -> bool {
        self.value.as_ref() == other.as_bytes()
    }
}

impl PartialEq<[u8]> for Field {
    fn eq(&self, other: &[u8]) -> bool {
        self.value.as_ref() == other
    }
}

impl PartialEq<u64> for Field {
    fn eq(&self, other: &u64) -> bool {
        let mut buf = itoa::Buffer::new();
        self.value.as_ref() == buf.format(*other).as_bytes()
    }
}

impl PartialEq<i64> for Field {
    fn eq(&self, other: &i64) -> bool {
        let mut buf = itoa::Buffer::new();
        self.value.as_ref() == buf.format(*other).as_bytes()
    }
}

impl PartialEq<bool> for Field {
    fn eq(&self, other: &bool) -> bool {
        self.value.as_ref() == if *other { b"Y" } else { b"N" }
    }
}
