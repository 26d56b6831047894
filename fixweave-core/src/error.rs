/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Error types for the fixweave FIX engine.
//!
//! Every layer defines its own `thiserror` enum; [`FixError`] unifies them so
//! callers can bubble any failure up with `?` and decide at the top whether it
//! is recoverable.

use thiserror::Error;

/// Result type alias using [`FixError`] as the error type.
pub type Result<T> = std::result::Result<T, FixError>;

/// Top-level error type covering all engine layers.
#[derive(Debug, Error)]
pub enum FixError {
    /// Error while decoding wire bytes.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Error while encoding a message.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Session-layer protocol violation.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Message store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid or incomplete configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O failure from the transport or filesystem.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while decoding FIX wire data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer does not yet contain a complete message.
    #[error("need more data")]
    Incomplete,

    /// The framing tags (8=, 9=, 10=) are missing or garbled.
    #[error("malformed framing: {0}")]
    MalformedFraming(String),

    /// BodyLength (9) does not match the actual body size.
    #[error("body length mismatch: declared {declared}, actual {actual}")]
    BodyLengthMismatch {
        /// Length declared in tag 9.
        declared: usize,
        /// Length measured on the wire.
        actual: usize,
    },

    /// CheckSum (10) does not match the computed value.
    #[error("checksum mismatch: calculated {calculated}, declared {declared}")]
    CheckSumMismatch {
        /// Checksum computed over the received bytes.
        calculated: u8,
        /// Checksum declared in tag 10.
        declared: u8,
    },

    /// A tag outside the known dictionary was seen in strict mode.
    #[error("unknown tag {tag}")]
    UnknownTag {
        /// The offending tag number.
        tag: u32,
    },

    /// A tag name that is not in the dictionary.
    #[error("unknown tag name: {0}")]
    UnknownTagName(String),

    /// A repeating group did not parse against its template.
    #[error("group parse error for count tag {count_tag}: expected {expected} instances, found {actual}")]
    GroupParseError {
        /// The count tag that introduced the group.
        count_tag: u32,
        /// Instances declared by the count field.
        expected: usize,
        /// Instances actually present.
        actual: usize,
    },

    /// A tag number is outside the assignable ranges.
    #[error("invalid tag {tag}")]
    InvalidTag {
        /// The offending tag number.
        tag: u32,
    },

    /// A required field is absent.
    #[error("missing field: tag {tag}")]
    MissingField {
        /// The tag number of the missing field.
        tag: u32,
    },

    /// A field value could not be converted to the requested type.
    #[error("invalid value for tag {tag}: {reason}")]
    InvalidFieldValue {
        /// The tag number of the field.
        tag: u32,
        /// Why the conversion failed.
        reason: String,
    },

    /// A string view was requested for non-UTF-8 bytes.
    #[error("invalid utf-8 in field value: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The framed message exceeds the configured maximum.
    #[error("message too large: {size} bytes exceeds maximum {max_size}")]
    MessageTooLarge {
        /// Size of the framed message.
        size: usize,
        /// Configured maximum.
        max_size: usize,
    },
}

/// Errors raised while encoding a message to wire bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// A field the canonical header requires is absent.
    #[error("missing required field: tag {tag}")]
    MissingRequiredField {
        /// The tag number of the missing field.
        tag: u32,
    },

    /// A field value cannot be represented on the wire.
    #[error("invalid value for tag {tag}: {reason}")]
    InvalidFieldValue {
        /// The tag number of the field.
        tag: u32,
        /// Why the value is invalid.
        reason: String,
    },
}

/// Session-layer protocol errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A state transition that the machine does not permit.
    #[error("invalid session transition: {from} -> {to}")]
    InvalidTransition {
        /// State the session was in.
        from: String,
        /// State that was requested.
        to: String,
    },

    /// The counterparty rejected our Logon.
    #[error("logon rejected: {reason}")]
    LogonRejected {
        /// Text supplied by the counterparty, if any.
        reason: String,
    },

    /// A Logon echo field does not match what we sent.
    #[error("logon mismatch on {field}: sent {sent}, received {received}")]
    LogonMismatch {
        /// Human name of the mismatched parameter.
        field: String,
        /// Value we sent.
        sent: String,
        /// Value the counterparty echoed.
        received: String,
    },

    /// No response to an outstanding TestRequest in time.
    #[error("heartbeat timeout after {elapsed_ms} ms of inbound silence")]
    HeartbeatTimeout {
        /// Milliseconds since the last inbound message.
        elapsed_ms: u64,
    },

    /// Inbound sequence number below expected without PossDupFlag.
    #[error("sequence too low: expected {expected}, received {received}")]
    SequenceTooLow {
        /// Next sequence number we would accept.
        expected: u64,
        /// Sequence number actually received.
        received: u64,
    },

    /// Inbound CompID does not match the configured session identity.
    #[error("comp id mismatch on tag {tag}: expected {expected}, received {received}")]
    CompIdMismatch {
        /// Tag that failed validation (49 or 56).
        tag: u32,
        /// Configured value.
        expected: String,
        /// Received value.
        received: String,
    },

    /// A session operation did not complete within its deadline.
    #[error("{what} timed out after {timeout_ms} ms")]
    Timeout {
        /// The operation that expired (logon, logout, test request).
        what: String,
        /// The deadline in milliseconds.
        timeout_ms: u64,
    },
}

/// Message store errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record for the requested direction and sequence number.
    #[error("no {direction} record for seq {seq_num}")]
    NotFound {
        /// "sent" or "received".
        direction: String,
        /// The requested sequence number.
        seq_num: u64,
    },

    /// A persisted record could not be read back.
    #[error("store corrupted: {reason}")]
    Corrupted {
        /// Description of the corruption.
        reason: String,
    },

    /// Underlying I/O failure.
    #[error("store io error: {0}")]
    Io(String),
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required key has no value.
    #[error("missing configuration key: {0}")]
    MissingKey(String),

    /// A key has a value that cannot be used.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// The configuration key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// `pipeline_apps` names a processor the registry does not know.
    #[error("unknown pipeline processor: {0}")]
    UnknownProcessor(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_display() {
        let err = DecodeError::BodyLengthMismatch {
            declared: 100,
            actual: 96,
        };
        assert_eq!(err.to_string(), "body length mismatch: declared 100, actual 96");
    }

    #[test]
    fn fix_error_from_layers() {
        let err: FixError = DecodeError::Incomplete.into();
        assert!(matches!(err, FixError::Decode(DecodeError::Incomplete)));

        let err: FixError = SessionError::SequenceTooLow {
            expected: 3,
            received: 2,
        }
        .into();
        assert!(matches!(err, FixError::Session(_)));
    }

    #[test]
    fn session_error_display() {
        let err = SessionError::CompIdMismatch {
            tag: 49,
            expected: "BROKER".into(),
            received: "OTHER".into(),
        };
        assert_eq!(
            err.to_string(),
            "comp id mismatch on tag 49: expected BROKER, received OTHER"
        );
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::UnknownProcessor("nope".into());
        assert_eq!(err.to_string(), "unknown pipeline processor: nope");
    }
}
