//! Illustrative BGP-4 message catalog built from the field archetypes.
//!
//! Every message is an ordinary field tree: lengths are derived leaves, so a
//! mutation anywhere below keeps the enclosing length fields honest unless
//! the length itself has been tampered with.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

pub mod attributes;
pub mod message;
pub mod template;

pub use attributes::{AsPathSegment, PathAttribute};
pub use message::{OpenHandle, UpdateHandle};
pub use template::{Capability, MessageTemplate, NotificationTemplate, OpenTemplate, UpdateTemplate};

pub const MARKER_LEN: usize = 16;
pub const HEADER_LEN: usize = 19;
pub const BGP_VERSION: u8 = 4;
/// Placeholder carried in the 2-octet My AS field by 4-octet speakers.
///
/// RFC 6793 §9
pub const AS_TRANS: u16 = 23456;

/// BGP Message types.
///
/// Ref: RFC 4271 §4.1
#[derive(Debug, Eq, PartialEq, Copy, Clone, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum MessageType {
    Open = 1,
    Update = 2,
    Notification = 3,
    KeepAlive = 4,
}

pub mod path_attribute_flags {
    pub const OPTIONAL: u8 = 0b10000000;
    pub const TRANSITIVE: u8 = 0b01000000;
    pub const PARTIAL: u8 = 0b00100000;
    pub const EXTENDED_LENGTH: u8 = 0b00010000;
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PathAttributeTypeCode {
    /// RFC 4271
    Origin = 1,
    AsPath = 2,
    NextHop = 3,
    MultiExitDisc = 4,
    LocalPref = 5,
    AtomicAggregate = 6,
    Aggregator = 7,

    /// RFC 1997
    Communities = 8,
}

#[derive(
    Debug,
    PartialEq,
    Eq,
    Copy,
    Clone,
    TryFromPrimitive,
    IntoPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    Igp = 0,
    Egp = 1,
    Incomplete = 2,
}

#[derive(
    Debug,
    PartialEq,
    Eq,
    Copy,
    Clone,
    TryFromPrimitive,
    IntoPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
#[serde(rename_all = "kebab-case")]
pub enum AsPathSegmentType {
    AsSet = 1,
    AsSequence = 2,
}

/// Ref: RFC 4271 §4.2, RFC 5492
#[derive(Debug, PartialEq, Eq, Copy, Clone, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum OptionalParameterType {
    /// Deprecated by RFC 5492.
    Authentication = 1,
    Capabilities = 2,
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum CapabilityCode {
    /// RFC 2858
    MultiprotocolExtensions = 1,

    /// RFC 2918
    RouteRefresh = 2,

    /// RFC 8950
    ExtendedNextHopEncoding = 5,

    /// RFC 4724
    GracefulRestart = 64,

    /// RFC 6793
    FourOctetAs = 65,

    /// RFC 7911
    AddPath = 69,

    /// RFC 7313
    EnhancedRouteRefresh = 70,
}

/// Classifies raw bytes received from a peer. Returns `None` unless they
/// start with a full header carrying the all-ones marker and a known type.
pub fn message_type_of(bytes: &[u8]) -> Option<MessageType> {
    if bytes.len() < HEADER_LEN || bytes[..MARKER_LEN].iter().any(|b| *b != 0xff) {
        return None;
    }
    MessageType::try_from(bytes[HEADER_LEN - 1]).ok()
}

/// Splits a read buffer into the messages it carries, using each header's
/// length field.
///
/// Walking stops at a header that is short, lacks the marker or declares a
/// length below the header size. A length running past the end of the buffer
/// yields the truncated remainder as the last message.
pub fn framed_messages(bytes: &[u8]) -> Vec<&[u8]> {
    let mut messages = Vec::new();
    let mut rest = bytes;
    while rest.len() >= HEADER_LEN && rest[..MARKER_LEN].iter().all(|b| *b == 0xff) {
        let length = usize::from(u16::from_be_bytes([rest[MARKER_LEN], rest[MARKER_LEN + 1]]));
        if length < HEADER_LEN {
            break;
        }
        let (message, tail) = rest.split_at(length.min(rest.len()));
        messages.push(message);
        rest = tail;
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_received_messages() {
        let mut keepalive = vec![0xff; MARKER_LEN];
        keepalive.extend_from_slice(&[0, 19, 4]);
        assert_eq!(message_type_of(&keepalive), Some(MessageType::KeepAlive));

        keepalive[HEADER_LEN - 1] = 9;
        assert_eq!(message_type_of(&keepalive), None);
        keepalive[0] = 0;
        keepalive[HEADER_LEN - 1] = 3;
        assert_eq!(message_type_of(&keepalive), None);
        assert_eq!(message_type_of(&[0xff; 4]), None);
    }

    fn framed(typ: u8, body: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0xff; MARKER_LEN];
        bytes.extend_from_slice(&((HEADER_LEN + body.len()) as u16).to_be_bytes());
        bytes.push(typ);
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn splits_back_to_back_messages() {
        let keepalive = framed(4, &[]);
        let notification = framed(3, &[6, 2]);
        let buffer = [keepalive.clone(), notification.clone()].concat();
        assert_eq!(
            framed_messages(&buffer),
            vec![keepalive.as_slice(), notification.as_slice()]
        );

        let truncated = &buffer[..buffer.len() - 1];
        let messages = framed_messages(truncated);
        assert_eq!(messages.len(), 2);
        assert_eq!(message_type_of(messages[1]), Some(MessageType::Notification));
    }

    #[test]
    fn stops_on_bogus_headers() {
        let mut bogus = framed(4, &[]);
        bogus[MARKER_LEN + 1] = 3;
        let buffer = [framed(4, &[]), bogus, framed(3, &[1, 1])].concat();
        assert_eq!(framed_messages(&buffer).len(), 1);
        assert!(framed_messages(&[0xff; 10]).is_empty());
        assert!(framed_messages(&[0u8; 40]).is_empty());
    }

    #[test]
    fn codes_convert_both_ways() {
        assert_eq!(u8::from(PathAttributeTypeCode::Communities), 8);
        assert_eq!(CapabilityCode::try_from(65).ok(), Some(CapabilityCode::FourOctetAs));
        assert!(Origin::try_from(7).is_err());
    }
}
