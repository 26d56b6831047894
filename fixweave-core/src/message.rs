/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! FIX message type and constructors.
//!
//! A [`Message`] is a [`FieldMap`] plus derived header accessors. Typed
//! constructors cover the administrative set; [`Message::from_fields`] is the
//! generic factory that picks dict or list form depending on whether every
//! repeating group is templated.

use crate::error::DecodeError;
use crate::field::Field;
use crate::fieldmap::{FieldMap, Group, GroupTemplate};
use crate::tags;
use crate::types::UtcTimestamp;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// FIX message type (tag 35).
///
/// Covers the administrative set plus the application types this engine's
/// tests and examples exercise; anything else is `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MsgType {
    /// Heartbeat (0).
    #[default]
    Heartbeat,
    /// Test Request (1).
    TestRequest,
    /// Resend Request (2).
    ResendRequest,
    /// Reject (3).
    Reject,
    /// Sequence Reset (4).
    SequenceReset,
    /// Logout (5).
    Logout,
    /// Execution Report (8).
    ExecutionReport,
    /// Logon (A).
    Logon,
    /// News (B).
    News,
    /// New Order Single (D).
    NewOrderSingle,
    /// Order Cancel Request (F).
    OrderCancelRequest,
    /// Business Message Reject (j).
    BusinessMessageReject,
    /// Market Data Request (V).
    MarketDataRequest,
    /// Market Data Snapshot/Full Refresh (W).
    MarketDataSnapshotFullRefresh,
    /// Market Data Incremental Refresh (X).
    MarketDataIncrementalRefresh,
    /// Any other message type.
    Custom(String),
}

impl std::str::FromStr for MsgType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "0" => Self::Heartbeat,
            "1" => Self::TestRequest,
            "2" => Self::ResendRequest,
            "3" => Self::Reject,
            "4" => Self::SequenceReset,
            "5" => Self::Logout,
            "8" => Self::ExecutionReport,
            "A" => Self::Logon,
            "B" => Self::News,
            "D" => Self::NewOrderSingle,
            "F" => Self::OrderCancelRequest,
            "j" => Self::BusinessMessageReject,
            "V" => Self::MarketDataRequest,
            "W" => Self::MarketDataSnapshotFullRefresh,
            "X" => Self::MarketDataIncrementalRefresh,
            other => Self::Custom(other.to_string()),
        })
    }
}

impl MsgType {
    /// Returns the wire value of this message type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Heartbeat => "0",
            Self::TestRequest => "1",
            Self::ResendRequest => "2",
            Self::Reject => "3",
            Self::SequenceReset => "4",
            Self::Logout => "5",
            Self::ExecutionReport => "8",
            Self::Logon => "A",
            Self::News => "B",
            Self::NewOrderSingle => "D",
            Self::OrderCancelRequest => "F",
            Self::BusinessMessageReject => "j",
            Self::MarketDataRequest => "V",
            Self::MarketDataSnapshotFullRefresh => "W",
            Self::MarketDataIncrementalRefresh => "X",
            Self::Custom(s) => s.as_str(),
        }
    }

    /// Returns true for session-level administrative messages.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            Self::Heartbeat
                | Self::TestRequest
                | Self::ResendRequest
                | Self::Reject
                | Self::SequenceReset
                | Self::Logout
                | Self::Logon
        )
    }

    /// Returns true for application-level messages.
    #[must_use]
    pub fn is_app(&self) -> bool {
        !self.is_admin()
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A FIX message: an ordered field map plus derived header accessors.
///
/// The framing tags (8, 9, 10) and the session-managed header tags (34, 49,
/// 52, 56) are stamped by the codec and the session processors; user code
/// only supplies the body.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    msg_type: MsgType,
    fields: FieldMap,
}

impl Message {
    /// Creates an empty dict-form message of the given type.
    #[must_use]
    pub fn new(msg_type: MsgType) -> Self {
        Self {
            msg_type,
            fields: FieldMap::dict(),
        }
    }

    /// Generic factory from (tag, value) pairs.
    ///
    /// Builds a dict-form map, nesting repeating groups when `templates`
    /// covers them (keyed by count tag). A duplicate tag that no template
    /// explains means an untemplated group: the whole message falls back to
    /// list form with the fields left flat.
    #[must_use]
    pub fn from_fields(
        msg_type: MsgType,
        pairs: Vec<(u32, Bytes)>,
        templates: &HashMap<u32, GroupTemplate>,
    ) -> Self {
        let mut map = FieldMap::dict();
        let mut iter = pairs.iter().peekable();
        let mut fell_back = false;

        'build: while let Some((tag, value)) = iter.next() {
            if let Some(template) = templates.get(tag) {
                let declared = std::str::from_utf8(value)
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(0);
                let mut group = Group::new(template.clone());
                while group.size() < declared {
                    let mut instance = FieldMap::dict();
                    // Instance runs from the delimiter until a non-member
                    // tag or the next delimiter.
                    while let Some((next_tag, next_value)) = iter.peek() {
                        let starts_new = *next_tag == template.delimiter() && !instance.is_empty();
                        if starts_new || !template.is_member(*next_tag) {
                            break;
                        }
                        let (t, v) = (*next_tag, next_value.clone());
                        iter.next();
                        if instance.insert_raw(Field::new(t, v)).is_err() {
                            fell_back = true;
                            break 'build;
                        }
                    }
                    if group.push_instance(instance).is_err() {
                        fell_back = true;
                        break 'build;
                    }
                }
                map.set_group(group);
            } else if map.insert_raw(Field::new(*tag, value.clone())).is_err() {
                // A duplicate no template explains: untemplated group.
                fell_back = true;
                break 'build;
            }
        }

        if fell_back {
            let mut list = FieldMap::list();
            for (tag, value) in &pairs {
                let _ = list.insert_raw(Field::new(*tag, value.clone()));
            }
            return Self {
                msg_type,
                fields: list,
            };
        }

        Self {
            msg_type,
            fields: map,
        }
    }

    /// Returns the message type.
    #[inline]
    #[must_use]
    pub fn msg_type(&self) -> &MsgType {
        &self.msg_type
    }

    /// Returns the underlying field map.
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Returns the field map for mutation.
    #[inline]
    pub fn fields_mut(&mut self) -> &mut FieldMap {
        &mut self.fields
    }

    /// MsgSeqNum (34), if present.
    #[must_use]
    pub fn seq_num(&self) -> Option<u64> {
        self.fields.get(tags::MSG_SEQ_NUM).and_then(|f| f.as_u64().ok())
    }

    /// Stamps MsgSeqNum (34).
    pub fn set_seq_num(&mut self, seq: u64) {
        let _ = self.fields.set(tags::MSG_SEQ_NUM, seq.to_string().into_bytes());
    }

    /// SenderCompID (49), if present.
    #[must_use]
    pub fn sender_comp_id(&self) -> Option<&str> {
        self.fields.get_str(tags::SENDER_COMP_ID)
    }

    /// TargetCompID (56), if present.
    #[must_use]
    pub fn target_comp_id(&self) -> Option<&str> {
        self.fields.get_str(tags::TARGET_COMP_ID)
    }

    /// SendingTime (52), if present and well formed.
    #[must_use]
    pub fn sending_time(&self) -> Option<UtcTimestamp> {
        self.fields
            .get(tags::SENDING_TIME)
            .and_then(|f| f.as_timestamp().ok())
    }

    /// PossDupFlag (43): true only when present and set to `Y`.
    #[must_use]
    pub fn poss_dup(&self) -> bool {
        self.fields
            .get(tags::POSS_DUP_FLAG)
            .and_then(|f| f.as_bool().ok())
            .unwrap_or(false)
    }

    /// Convenience passthrough to [`FieldMap::set`].
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidTag` for unassignable tags.
    pub fn set(&mut self, tag: u32, value: impl Into<Bytes>) -> Result<(), DecodeError> {
        self.fields.set(tag, value)
    }

    /// Convenience passthrough to [`FieldMap::get`].
    #[must_use]
    pub fn get(&self, tag: u32) -> Option<&Field> {
        self.fields.get(tag)
    }

    /// Convenience passthrough to [`FieldMap::get_str`].
    #[must_use]
    pub fn get_str(&self, tag: u32) -> Option<&str> {
        self.fields.get_str(tag)
    }

    // --- typed administrative constructors -------------------------------

    /// Logon (A) with EncryptMethod=0 and the given credentials.
    #[must_use]
    pub fn logon(
        username: &str,
        password: &str,
        heartbeat_secs: u64,
        reset_seq_num: bool,
    ) -> Self {
        let mut msg = Self::new(MsgType::Logon);
        let _ = msg.set(tags::ENCRYPT_METHOD, &b"0"[..]);
        let _ = msg.set(tags::HEART_BT_INT, heartbeat_secs.to_string().into_bytes());
        let _ = msg.set(tags::USERNAME, username.as_bytes().to_vec());
        let _ = msg.set(tags::PASSWORD, password.as_bytes().to_vec());
        if reset_seq_num {
            let _ = msg.set(tags::RESET_SEQ_NUM_FLAG, &b"Y"[..]);
        }
        msg
    }

    /// Logout (5), with optional Text (58).
    #[must_use]
    pub fn logout(text: Option<&str>) -> Self {
        let mut msg = Self::new(MsgType::Logout);
        if let Some(text) = text {
            let _ = msg.set(tags::TEXT, text.as_bytes().to_vec());
        }
        msg
    }

    /// Heartbeat (0), echoing a TestReqID (112) when answering a TestRequest.
    #[must_use]
    pub fn heartbeat(test_req_id: Option<&str>) -> Self {
        let mut msg = Self::new(MsgType::Heartbeat);
        if let Some(id) = test_req_id {
            let _ = msg.set(tags::TEST_REQ_ID, id.as_bytes().to_vec());
        }
        msg
    }

    /// TestRequest (1) with the given TestReqID (112).
    #[must_use]
    pub fn test_request(test_req_id: &str) -> Self {
        let mut msg = Self::new(MsgType::TestRequest);
        let _ = msg.set(tags::TEST_REQ_ID, test_req_id.as_bytes().to_vec());
        msg
    }

    /// ResendRequest (2) for `[begin, end]`; `end == 0` means "to infinity".
    #[must_use]
    pub fn resend_request(begin: u64, end: u64) -> Self {
        let mut msg = Self::new(MsgType::ResendRequest);
        let _ = msg.set(tags::BEGIN_SEQ_NO, begin.to_string().into_bytes());
        let _ = msg.set(tags::END_SEQ_NO, end.to_string().into_bytes());
        msg
    }

    /// SequenceReset (4) to `new_seq_no`; gap-fill mode sets GapFillFlag=Y.
    #[must_use]
    pub fn sequence_reset(new_seq_no: u64, gap_fill: bool) -> Self {
        let mut msg = Self::new(MsgType::SequenceReset);
        if gap_fill {
            let _ = msg.set(tags::GAP_FILL_FLAG, &b"Y"[..]);
        }
        let _ = msg.set(tags::NEW_SEQ_NO, new_seq_no.to_string().into_bytes());
        msg
    }

    /// Reject (3) referencing the offending message and tag.
    #[must_use]
    pub fn reject(ref_seq_num: u64, ref_tag_id: Option<u32>, text: &str) -> Self {
        let mut msg = Self::new(MsgType::Reject);
        let _ = msg.set(tags::REF_SEQ_NUM, ref_seq_num.to_string().into_bytes());
        if let Some(tag) = ref_tag_id {
            let _ = msg.set(tags::REF_TAG_ID, tag.to_string().into_bytes());
        }
        let _ = msg.set(tags::TEXT, text.as_bytes().to_vec());
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msg_type_roundtrip() {
        assert_eq!("A".parse::<MsgType>().unwrap(), MsgType::Logon);
        assert_eq!(MsgType::Logon.as_str(), "A");
        assert_eq!("0".parse::<MsgType>().unwrap(), MsgType::Heartbeat);

        let custom: MsgType = "AB".parse().unwrap();
        assert_eq!(custom.as_str(), "AB");
    }

    #[test]
    fn admin_classification() {
        assert!(MsgType::Logon.is_admin());
        assert!(MsgType::SequenceReset.is_admin());
        assert!(MsgType::NewOrderSingle.is_app());
        assert!(MsgType::ExecutionReport.is_app());
    }

    #[test]
    fn logon_constructor() {
        let msg = Message::logon("user", "pass", 30, true);
        assert_eq!(*msg.msg_type(), MsgType::Logon);
        assert_eq!(msg.get_str(98), Some("0"));
        assert_eq!(msg.get(108).unwrap().as_u64().unwrap(), 30);
        assert_eq!(msg.get_str(553), Some("user"));
        assert_eq!(msg.get_str(554), Some("pass"));
        assert!(msg.get(141).unwrap().as_bool().unwrap());

        let msg = Message::logon("user", "pass", 30, false);
        assert!(msg.get(141).is_none());
    }

    #[test]
    fn resend_request_constructor() {
        let msg = Message::resend_request(2, 4);
        assert_eq!(msg.get(7).unwrap().as_u64().unwrap(), 2);
        assert_eq!(msg.get(16).unwrap().as_u64().unwrap(), 4);
    }

    #[test]
    fn sequence_reset_constructor() {
        let msg = Message::sequence_reset(4, true);
        assert_eq!(msg.get_str(123), Some("Y"));
        assert_eq!(msg.get(36).unwrap().as_u64().unwrap(), 4);

        let msg = Message::sequence_reset(9, false);
        assert!(msg.get(123).is_none());
    }

    #[test]
    fn reject_constructor() {
        let msg = Message::reject(7, Some(49), "comp id mismatch");
        assert_eq!(msg.get(45).unwrap().as_u64().unwrap(), 7);
        assert_eq!(msg.get(371).unwrap().as_u64().unwrap(), 49);
        assert_eq!(msg.get_str(58), Some("comp id mismatch"));
    }

    #[test]
    fn header_accessors() {
        let mut msg = Message::heartbeat(None);
        msg.set_seq_num(12);
        msg.set(49, &b"CLIENT"[..]).unwrap();
        msg.set(56, &b"BROKER"[..]).unwrap();
        msg.set(52, &b"20240115-13:45:10"[..]).unwrap();

        assert_eq!(msg.seq_num(), Some(12));
        assert_eq!(msg.sender_comp_id(), Some("CLIENT"));
        assert_eq!(msg.target_comp_id(), Some("BROKER"));
        assert_eq!(msg.sending_time().unwrap().to_wire(), "20240115-13:45:10");
        assert!(!msg.poss_dup());

        msg.set(43, &b"Y"[..]).unwrap();
        assert!(msg.poss_dup());
    }

    fn pairs(raw: &[(u32, &str)]) -> Vec<(u32, Bytes)> {
        raw.iter()
            .map(|&(t, v)| (t, Bytes::copy_from_slice(v.as_bytes())))
            .collect()
    }

    #[test]
    fn factory_builds_dict_with_templated_group() {
        let mut templates = HashMap::new();
        templates.insert(136, GroupTemplate::new(136, 137, [137, 138, 139]));

        let msg = Message::from_fields(
            MsgType::ExecutionReport,
            pairs(&[
                (55, "EURUSD"),
                (136, "2"),
                (137, "1.5"),
                (139, "4"),
                (137, "0.25"),
                (138, "USD"),
                (58, "done"),
            ]),
            &templates,
        );

        assert!(msg.fields().is_dict());
        let group = msg.fields().group(136).unwrap();
        assert_eq!(group.size(), 2);
        assert_eq!(group.instance(1).unwrap().get_str(138), Some("USD"));
        assert_eq!(msg.get_str(58), Some("done"));
    }

    #[test]
    fn factory_falls_back_to_list_without_template() {
        let templates = HashMap::new();
        let msg = Message::from_fields(
            MsgType::MarketDataSnapshotFullRefresh,
            pairs(&[(268, "2"), (269, "0"), (270, "1.1"), (269, "1"), (270, "1.2")]),
            &templates,
        );

        assert!(!msg.fields().is_dict());
        assert_eq!(msg.fields().len(), 5);
        assert_eq!(msg.get_str(268), Some("2"));
    }
}
