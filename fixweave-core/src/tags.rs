/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Static FIX tag dictionary.
//!
//! Tag numbers used on the hot path are plain constants; name-based field
//! access goes through a hash lookup built once from [`STANDARD_TAGS`].

use std::collections::HashMap;
use std::sync::OnceLock;

/// BeginString.
pub const BEGIN_STRING: u32 = 8;
/// BodyLength.
pub const BODY_LENGTH: u32 = 9;
/// CheckSum.
pub const CHECK_SUM: u32 = 10;
/// BeginSeqNo (ResendRequest).
pub const BEGIN_SEQ_NO: u32 = 7;
/// EndSeqNo (ResendRequest).
pub const END_SEQ_NO: u32 = 16;
/// MsgSeqNum.
pub const MSG_SEQ_NUM: u32 = 34;
/// MsgType.
pub const MSG_TYPE: u32 = 35;
/// NewSeqNo (SequenceReset).
pub const NEW_SEQ_NO: u32 = 36;
/// PossDupFlag.
pub const POSS_DUP_FLAG: u32 = 43;
/// RefSeqNum (Reject).
pub const REF_SEQ_NUM: u32 = 45;
/// SenderCompID.
pub const SENDER_COMP_ID: u32 = 49;
/// SendingTime.
pub const SENDING_TIME: u32 = 52;
/// TargetCompID.
pub const TARGET_COMP_ID: u32 = 56;
/// Text.
pub const TEXT: u32 = 58;
/// EncryptMethod (Logon).
pub const ENCRYPT_METHOD: u32 = 98;
/// HeartBtInt (Logon).
pub const HEART_BT_INT: u32 = 108;
/// TestReqID.
pub const TEST_REQ_ID: u32 = 112;
/// OrigSendingTime.
pub const ORIG_SENDING_TIME: u32 = 122;
/// GapFillFlag (SequenceReset).
pub const GAP_FILL_FLAG: u32 = 123;
/// ResetSeqNumFlag (Logon).
pub const RESET_SEQ_NUM_FLAG: u32 = 141;
/// NoMiscFees group count.
pub const NO_MISC_FEES: u32 = 136;
/// RefTagID (Reject).
pub const REF_TAG_ID: u32 = 371;
/// RefMsgType (Reject).
pub const REF_MSG_TYPE: u32 = 372;
/// SessionRejectReason (Reject).
pub const SESSION_REJECT_REASON: u32 = 373;
/// TestMessageIndicator (Logon).
pub const TEST_MESSAGE_INDICATOR: u32 = 464;
/// Username (Logon).
pub const USERNAME: u32 = 553;
/// Password (Logon).
pub const PASSWORD: u32 = 554;

/// Highest tag number recognized by the standard FIX 4.4 dictionary.
pub const MAX_STANDARD_TAG: u32 = 955;
/// First tag of the user-defined range.
pub const USER_TAG_MIN: u32 = 5000;
/// Last tag of the user-defined range.
pub const USER_TAG_MAX: u32 = 9999;

/// Standard tag names, in tag-number order.
///
/// This is the subset of the FIX 4.4 dictionary the session layer touches,
/// plus the common application tags that show up in tests and examples.
pub const STANDARD_TAGS: &[(u32, &str)] = &[
    (1, "Account"),
    (6, "AvgPx"),
    (7, "BeginSeqNo"),
    (8, "BeginString"),
    (9, "BodyLength"),
    (10, "CheckSum"),
    (11, "ClOrdID"),
    (14, "CumQty"),
    (16, "EndSeqNo"),
    (17, "ExecID"),
    (31, "LastPx"),
    (32, "LastQty"),
    (34, "MsgSeqNum"),
    (35, "MsgType"),
    (36, "NewSeqNo"),
    (37, "OrderID"),
    (38, "OrderQty"),
    (39, "OrdStatus"),
    (40, "OrdType"),
    (43, "PossDupFlag"),
    (44, "Price"),
    (45, "RefSeqNum"),
    (49, "SenderCompID"),
    (52, "SendingTime"),
    (54, "Side"),
    (55, "Symbol"),
    (56, "TargetCompID"),
    (58, "Text"),
    (60, "TransactTime"),
    (98, "EncryptMethod"),
    (108, "HeartBtInt"),
    (112, "TestReqID"),
    (122, "OrigSendingTime"),
    (123, "GapFillFlag"),
    (136, "NoMiscFees"),
    (137, "MiscFeeAmt"),
    (138, "MiscFeeCurr"),
    (139, "MiscFeeType"),
    (141, "ResetSeqNumFlag"),
    (146, "NoRelatedSym"),
    (150, "ExecType"),
    (151, "LeavesQty"),
    (262, "MDReqID"),
    (263, "SubscriptionRequestType"),
    (264, "MarketDepth"),
    (267, "NoMDEntryTypes"),
    (268, "NoMDEntries"),
    (269, "MDEntryType"),
    (270, "MDEntryPx"),
    (271, "MDEntrySize"),
    (371, "RefTagID"),
    (372, "RefMsgType"),
    (373, "SessionRejectReason"),
    (464, "TestMessageIndicator"),
    (553, "Username"),
    (554, "Password"),
];

fn name_index() -> &'static HashMap<&'static str, u32> {
    static INDEX: OnceLock<HashMap<&'static str, u32>> = OnceLock::new();
    INDEX.get_or_init(|| STANDARD_TAGS.iter().map(|&(tag, name)| (name, tag)).collect())
}

fn tag_index() -> &'static HashMap<u32, &'static str> {
    static INDEX: OnceLock<HashMap<u32, &'static str>> = OnceLock::new();
    INDEX.get_or_init(|| STANDARD_TAGS.iter().copied().collect())
}

/// Looks up a tag number by its dictionary name.
#[must_use]
pub fn tag_for_name(name: &str) -> Option<u32> {
    name_index().get(name).copied()
}

/// Looks up the dictionary name for a tag number.
#[must_use]
pub fn name_for_tag(tag: u32) -> Option<&'static str> {
    tag_index().get(&tag).copied()
}

/// Returns true if `tag` may be assigned to a field.
///
/// Assignable ranges are the standard dictionary [1, 955] and the
/// user-defined range [5000, 9999].
#[must_use]
pub fn is_assignable(tag: u32) -> bool {
    (1..=MAX_STANDARD_TAG).contains(&tag) || (USER_TAG_MIN..=USER_TAG_MAX).contains(&tag)
}

/// Returns true if `tag` is in the user-defined range.
#[must_use]
pub fn is_user_defined(tag: u32) -> bool {
    (USER_TAG_MIN..=USER_TAG_MAX).contains(&tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_lookup() {
        assert_eq!(tag_for_name("MsgSeqNum"), Some(34));
        assert_eq!(tag_for_name("TestReqID"), Some(112));
        assert_eq!(tag_for_name("NoSuchTag"), None);
    }

    #[test]
    fn tag_lookup() {
        assert_eq!(name_for_tag(8), Some("BeginString"));
        assert_eq!(name_for_tag(554), Some("Password"));
        assert_eq!(name_for_tag(4242), None);
    }

    #[test]
    fn assignable_ranges() {
        assert!(is_assignable(1));
        assert!(is_assignable(955));
        assert!(!is_assignable(956));
        assert!(!is_assignable(4999));
        assert!(is_assignable(5000));
        assert!(is_assignable(9999));
        assert!(!is_assignable(10000));
        assert!(!is_assignable(0));
    }

    #[test]
    fn user_defined_range() {
        assert!(is_user_defined(5000));
        assert!(!is_user_defined(955));
    }
}
