/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! FIX wire decoder.
//!
//! Turns a byte buffer into a [`Message`] plus the number of bytes consumed,
//! enforcing the `8=` / `9=` / `10=` framing invariants and nesting repeating
//! groups against the [`TemplateRegistry`].

use crate::checksum::{checksum, decode_checksum};
use crate::template::TemplateRegistry;
use bytes::Bytes;
use fixweave_core::error::DecodeError;
use fixweave_core::message::{Message, MsgType};
use fixweave_core::tags;
use fixweave_core::fieldmap::GroupTemplate;
use memchr::{memchr, memmem};
use smallvec::SmallVec;
use std::collections::HashMap;

/// SOH field delimiter.
pub const SOH: u8 = 0x01;

/// Length of the `10=NNN<SOH>` trailer.
const TRAILER_LEN: usize = 7;

/// A borrowed (tag, value) pair produced by the field scanner.
type RawPair<'a> = (u32, &'a [u8]);

/// FIX wire decoder.
///
/// The decoder is stateless between calls; incomplete input is reported via
/// [`DecodeError::Incomplete`] so the caller can buffer more bytes.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    registry: TemplateRegistry,
    strict: bool,
}

impl Decoder {
    /// Creates a decoder with no group templates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a decoder using the given template registry.
    #[must_use]
    pub fn with_registry(registry: TemplateRegistry) -> Self {
        Self {
            registry,
            strict: false,
        }
    }

    /// Enables strict mode: tags outside the assignable ranges fail with
    /// [`DecodeError::UnknownTag`].
    #[must_use]
    pub const fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Decodes one message from the front of `input`.
    ///
    /// # Returns
    /// The decoded message and the number of bytes consumed.
    ///
    /// # Errors
    /// - [`DecodeError::Incomplete`] when more bytes are needed
    /// - [`DecodeError::MalformedFraming`] for garbled `8=` / `9=` / `10=`
    /// - [`DecodeError::BodyLengthMismatch`] / [`DecodeError::CheckSumMismatch`]
    ///   when the framing check values are wrong; the input is not consumed
    /// - [`DecodeError::GroupParseError`] when a templated group is short
    /// - [`DecodeError::UnknownTag`] in strict mode
    pub fn decode(&self, input: &[u8]) -> Result<(Message, usize), DecodeError> {
        // BeginString must open the buffer.
        let (begin_tag, _, after_begin) =
            next_pair(input, 0).ok_or(DecodeError::Incomplete)?;
        if begin_tag != tags::BEGIN_STRING {
            return Err(DecodeError::MalformedFraming(format!(
                "expected tag 8 first, found {begin_tag}"
            )));
        }

        // BodyLength must follow immediately.
        let (len_tag, len_value, body_start) =
            next_pair(input, after_begin).ok_or(DecodeError::Incomplete)?;
        if len_tag != tags::BODY_LENGTH {
            return Err(DecodeError::MalformedFraming(format!(
                "expected tag 9 second, found {len_tag}"
            )));
        }
        let declared: usize = std::str::from_utf8(len_value)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| DecodeError::MalformedFraming("unparseable body length".into()))?;

        let trailer_start = body_start + declared;

        // The trailer must sit exactly where BodyLength says it does.
        if input.len() >= trailer_start + 3 && &input[trailer_start..trailer_start + 3] == b"10=" {
            if input.len() < trailer_start + TRAILER_LEN {
                return Err(DecodeError::Incomplete);
            }
        } else {
            return match memmem::find(&input[body_start..], b"\x0110=") {
                Some(p) => Err(DecodeError::BodyLengthMismatch {
                    declared,
                    actual: p + 1,
                }),
                None if input.len() < trailer_start + TRAILER_LEN => Err(DecodeError::Incomplete),
                None => Err(DecodeError::MalformedFraming("checksum field not found".into())),
            };
        }

        if input[trailer_start + 6] != SOH {
            return Err(DecodeError::MalformedFraming("unterminated checksum".into()));
        }
        let declared_sum = decode_checksum(&input[trailer_start + 3..trailer_start + 6])
            .ok_or_else(|| DecodeError::MalformedFraming("non-numeric checksum".into()))?;
        let calculated = checksum(&input[..trailer_start]);
        if calculated != declared_sum {
            return Err(DecodeError::CheckSumMismatch {
                calculated,
                declared: declared_sum,
            });
        }

        // Scan the body into raw pairs.
        let mut pairs: SmallVec<[RawPair<'_>; 32]> = SmallVec::new();
        let mut offset = body_start;
        while offset < trailer_start {
            let (tag, value, next) = next_pair(input, offset).ok_or_else(|| {
                DecodeError::MalformedFraming(format!("garbled field at offset {offset}"))
            })?;
            if next > trailer_start {
                return Err(DecodeError::MalformedFraming(
                    "field crosses into trailer".into(),
                ));
            }
            pairs.push((tag, value));
            offset = next;
        }

        // MsgType leads the body.
        let msg_type: MsgType = match pairs.first() {
            Some(&(tags::MSG_TYPE, value)) => std::str::from_utf8(value)
                .map_err(DecodeError::from)?
                .parse()
                .unwrap_or_default(),
            _ => return Err(DecodeError::MissingField { tag: tags::MSG_TYPE }),
        };

        if self.strict {
            for &(tag, _) in &pairs {
                if !tags::is_assignable(tag) {
                    return Err(DecodeError::UnknownTag { tag });
                }
            }
        }

        let body: Vec<(u32, Bytes)> = pairs[1..]
            .iter()
            .map(|&(tag, value)| (tag, Bytes::copy_from_slice(value)))
            .collect();

        let templates = self.registry.for_msg_type(&msg_type);
        validate_groups(&body, &templates)?;

        let message = Message::from_fields(msg_type, body, &templates);
        Ok((message, trailer_start + TRAILER_LEN))
    }
}

/// Scans one `tag=value<SOH>` pair starting at `offset`.
///
/// Returns the tag, the value slice, and the offset just past the SOH, or
/// `None` when the buffer ends before the pair does.
fn next_pair(input: &[u8], offset: usize) -> Option<(u32, &[u8], usize)> {
    let remaining = input.get(offset..)?;
    let eq = memchr(b'=', remaining)?;
    let tag = parse_tag(&remaining[..eq])?;
    let soh = memchr(SOH, &remaining[eq + 1..])?;
    let value = &remaining[eq + 1..eq + 1 + soh];
    Some((tag, value, offset + eq + 1 + soh + 1))
}

/// Parses an ASCII tag number; rejects empty, oversized, and non-digit input.
fn parse_tag(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || bytes.len() > 5 {
        return None;
    }
    let mut tag: u32 = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            return None;
        }
        tag = tag * 10 + u32::from(b - b'0');
    }
    Some(tag)
}

/// Checks every templated count tag against the instances that follow it.
fn validate_groups(
    pairs: &[(u32, Bytes)],
    templates: &HashMap<u32, GroupTemplate>,
) -> Result<(), DecodeError> {
    let mut i = 0;
    while i < pairs.len() {
        let (tag, value) = &pairs[i];
        let Some(template) = templates.get(tag) else {
            i += 1;
            continue;
        };
        let declared: usize = std::str::from_utf8(value)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| DecodeError::InvalidFieldValue {
                tag: *tag,
                reason: "group count is not an integer".into(),
            })?;
        i += 1;

        let mut found = 0;
        while found < declared {
            if i >= pairs.len() || pairs[i].0 != template.delimiter() {
                break;
            }
            i += 1;
            while i < pairs.len()
                && pairs[i].0 != template.delimiter()
                && template.is_member(pairs[i].0)
            {
                i += 1;
            }
            found += 1;
        }
        if found != declared {
            return Err(DecodeError::GroupParseError {
                count_tag: *tag,
                expected: declared,
                actual: found,
            });
        }
    }
    Ok(())
}

/// Returns the first value for `tag` in a raw buffer, without framing
/// validation. Used where a full decode would be wasted, e.g. pulling
/// MsgSeqNum out of bytes headed for the store.
#[must_use]
pub fn peek_field(input: &[u8], tag: u32) -> Option<&[u8]> {
    let mut offset = 0;
    while let Some((t, value, next)) = next_pair(input, offset) {
        if t == tag {
            return Some(value);
        }
        offset = next;
    }
    None
}

/// Finds the start of the next `8=` marker after the first byte, for
/// resynchronization after a framing error. Returns the offset of the `8`.
#[must_use]
pub fn resync(input: &[u8]) -> Option<usize> {
    memmem::find(input.get(1..)?, b"\x018=").map(|p| p + 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::encode_checksum;

    /// Frames `body` with a correct BodyLength and CheckSum.
    pub(crate) fn frame(body: &str) -> Vec<u8> {
        let mut msg = format!("8=FIX.4.4\x019={}\x01{}", body.len(), body).into_bytes();
        let sum = checksum(&msg);
        msg.extend_from_slice(b"10=");
        msg.extend_from_slice(&encode_checksum(sum));
        msg.push(SOH);
        msg
    }

    #[test]
    fn decode_heartbeat() {
        let wire = frame("35=0\x0134=2\x0149=CLIENT\x0156=BROKER\x01");
        let decoder = Decoder::new();

        let (msg, consumed) = decoder.decode(&wire).unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(*msg.msg_type(), MsgType::Heartbeat);
        assert_eq!(msg.seq_num(), Some(2));
        assert_eq!(msg.sender_comp_id(), Some("CLIENT"));
        assert_eq!(msg.target_comp_id(), Some("BROKER"));
    }

    #[test]
    fn decode_reports_incomplete() {
        let wire = frame("35=0\x0134=2\x01");
        let decoder = Decoder::new();

        for cut in [1, 5, 12, wire.len() - 1] {
            assert_eq!(
                decoder.decode(&wire[..cut]).unwrap_err(),
                DecodeError::Incomplete,
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn decode_consumes_one_message_of_many() {
        let first = frame("35=0\x0134=2\x01");
        let second = frame("35=1\x0134=3\x01112=probe\x01");
        let mut wire = first.clone();
        wire.extend_from_slice(&second);

        let decoder = Decoder::new();
        let (msg, consumed) = decoder.decode(&wire).unwrap();
        assert_eq!(*msg.msg_type(), MsgType::Heartbeat);
        assert_eq!(consumed, first.len());

        let (msg, _) = decoder.decode(&wire[consumed..]).unwrap();
        assert_eq!(*msg.msg_type(), MsgType::TestRequest);
        assert_eq!(msg.get_str(112), Some("probe"));
    }

    #[test]
    fn decode_rejects_bad_body_length() {
        let mut wire = frame("35=0\x0134=2\x01");
        // Corrupt the declared length: 9=N -> 9=N+1 keeps digits valid.
        let pos = memmem::find(&wire, b"\x019=").unwrap() + 3;
        wire[pos] += 1;

        let decoder = Decoder::new();
        assert!(matches!(
            decoder.decode(&wire),
            Err(DecodeError::BodyLengthMismatch { .. })
        ));
    }

    #[test]
    fn decode_rejects_bad_checksum() {
        let mut wire = frame("35=0\x0134=2\x01");
        let len = wire.len();
        wire[len - 2] = if wire[len - 2] == b'9' { b'0' } else { b'9' };

        let decoder = Decoder::new();
        assert!(matches!(
            decoder.decode(&wire),
            Err(DecodeError::CheckSumMismatch { .. })
        ));
    }

    #[test]
    fn decode_rejects_missing_begin_string() {
        let decoder = Decoder::new();
        let err = decoder.decode(b"9=5\x0135=0\x0110=000\x01x").unwrap_err();
        assert!(matches!(err, DecodeError::MalformedFraming(_)));
    }

    #[test]
    fn decode_requires_msg_type() {
        let wire = frame("34=2\x0149=CLIENT\x01");
        let decoder = Decoder::new();
        assert_eq!(
            decoder.decode(&wire).unwrap_err(),
            DecodeError::MissingField { tag: 35 }
        );
    }

    #[test]
    fn strict_mode_rejects_unknown_tags() {
        let wire = frame("35=0\x0134=2\x011999=x\x01");
        let lenient = Decoder::new();
        assert!(lenient.decode(&wire).is_ok());

        let strict = Decoder::new().strict(true);
        assert_eq!(
            strict.decode(&wire).unwrap_err(),
            DecodeError::UnknownTag { tag: 1999 }
        );
    }

    #[test]
    fn decode_nests_templated_group() {
        let mut registry = TemplateRegistry::new();
        registry.register(
            MsgType::ExecutionReport,
            GroupTemplate::new(136, 137, [137, 138, 139]),
        );
        let decoder = Decoder::with_registry(registry);

        let wire = frame("35=8\x0134=9\x01136=2\x01137=1.5\x01139=4\x01137=0.25\x01138=USD\x0158=ok\x01");
        let (msg, _) = decoder.decode(&wire).unwrap();

        assert!(msg.fields().is_dict());
        let group = msg.fields().group(136).unwrap();
        assert_eq!(group.size(), 2);
        assert_eq!(group.instance(0).unwrap().get_str(139), Some("4"));
        assert_eq!(group.instance(1).unwrap().get_str(138), Some("USD"));
        assert_eq!(msg.get_str(58), Some("ok"));
    }

    #[test]
    fn decode_short_group_errors() {
        let mut registry = TemplateRegistry::new();
        registry.register(
            MsgType::ExecutionReport,
            GroupTemplate::new(136, 137, [137, 138, 139]),
        );
        let decoder = Decoder::with_registry(registry);

        let wire = frame("35=8\x0134=9\x01136=3\x01137=1.5\x01137=0.25\x01");
        assert_eq!(
            decoder.decode(&wire).unwrap_err(),
            DecodeError::GroupParseError {
                count_tag: 136,
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn decode_untemplated_group_stays_flat() {
        let decoder = Decoder::new();
        let wire = frame("35=W\x0134=9\x01268=2\x01269=0\x01270=1.1\x01269=1\x01270=1.2\x01");
        let (msg, _) = decoder.decode(&wire).unwrap();

        assert!(!msg.fields().is_dict());
        assert_eq!(msg.get_str(268), Some("2"));
    }

    #[test]
    fn peek_field_scans_without_validation() {
        let wire = frame("35=0\x0134=17\x01");
        assert_eq!(peek_field(&wire, 34), Some(&b"17"[..]));
        assert_eq!(peek_field(&wire, 112), None);
    }

    #[test]
    fn resync_finds_next_message() {
        let good = frame("35=0\x0134=2\x01");
        let mut wire = b"garbage\x01more".to_vec();
        wire.push(SOH);
        let skip = wire.len();
        wire.extend_from_slice(&good);

        assert_eq!(resync(&wire), Some(skip));
        let decoder = Decoder::new();
        assert!(decoder.decode(&wire[skip..]).is_ok());
    }

    #[test]
    fn resync_none_without_marker() {
        assert_eq!(resync(b"no markers here"), None);
    }
}
