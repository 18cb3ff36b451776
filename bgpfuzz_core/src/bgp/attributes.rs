//! UPDATE path attributes.
//!
//! Ref: RFC 4271 §4.3, §5

use super::{AsPathSegmentType, Origin, PathAttributeTypeCode, path_attribute_flags};
use crate::codec;
use crate::tree::{FieldError, FieldTree, NodeId};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsPathSegment {
    #[serde(rename = "type")]
    pub typ: AsPathSegmentType,
    pub asns: Vec<u32>,
}

/// Seed description of one path attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PathAttribute {
    Origin { value: Origin },
    AsPath { segments: Vec<AsPathSegment> },
    NextHop { address: IpAddr },
    MultiExitDisc { value: u32 },
    LocalPref { value: u32 },
    AtomicAggregate,
    Aggregator { asn: u32, address: Ipv4Addr },
    Communities { values: Vec<u32> },
}

impl PathAttribute {
    pub fn type_code(&self) -> PathAttributeTypeCode {
        match self {
            PathAttribute::Origin { .. } => PathAttributeTypeCode::Origin,
            PathAttribute::AsPath { .. } => PathAttributeTypeCode::AsPath,
            PathAttribute::NextHop { .. } => PathAttributeTypeCode::NextHop,
            PathAttribute::MultiExitDisc { .. } => PathAttributeTypeCode::MultiExitDisc,
            PathAttribute::LocalPref { .. } => PathAttributeTypeCode::LocalPref,
            PathAttribute::AtomicAggregate => PathAttributeTypeCode::AtomicAggregate,
            PathAttribute::Aggregator { .. } => PathAttributeTypeCode::Aggregator,
            PathAttribute::Communities { .. } => PathAttributeTypeCode::Communities,
        }
    }

    /// Attribute flags as a well-behaved speaker would send them.
    pub fn flags(&self) -> u8 {
        use path_attribute_flags::{OPTIONAL, TRANSITIVE};
        match self {
            PathAttribute::MultiExitDisc { .. } => OPTIONAL,
            PathAttribute::Aggregator { .. } | PathAttribute::Communities { .. } => {
                OPTIONAL | TRANSITIVE
            }
            _ => TRANSITIVE,
        }
    }

    pub fn build(&self, tree: &mut FieldTree) -> Result<NodeId, FieldError> {
        let value = self.value(tree)?;
        attribute(tree, self.flags(), self.type_code().into(), value)
    }

    fn value(&self, tree: &mut FieldTree) -> Result<NodeId, FieldError> {
        match self {
            PathAttribute::Origin { value } => Ok(tree.uint("origin", u8::from(*value).into(), 1)),
            PathAttribute::AsPath { segments } => {
                let segments = segments
                    .iter()
                    .map(|segment| as_path_segment(tree, segment))
                    .collect::<Result<Vec<_>, _>>()?;
                tree.list("as_path", Some("as_path_segment"), segments)
            }
            PathAttribute::NextHop { address } => Ok(tree.addr("next_hop", *address)),
            PathAttribute::MultiExitDisc { value } => Ok(tree.uint("med", (*value).into(), 4)),
            PathAttribute::LocalPref { value } => Ok(tree.uint("local_pref", (*value).into(), 4)),
            PathAttribute::AtomicAggregate => Ok(tree.bytes("atomic_aggregate", Vec::new())),
            PathAttribute::Aggregator { asn, address } => {
                let asn = tree.uint("asn", (*asn).into(), 4);
                let address = tree.addr("address", (*address).into());
                tree.composite("aggregator", vec![("asn", asn), ("address", address)], &[])
            }
            PathAttribute::Communities { values } => {
                let values = values
                    .iter()
                    .map(|v| tree.uint("community", (*v).into(), 4))
                    .collect();
                tree.list("communities", Some("community"), values)
            }
        }
    }
}

/// `[type, count, asns]`. The ASN count is a plain value, so list mutations
/// below it are free to make it lie.
fn as_path_segment(tree: &mut FieldTree, segment: &AsPathSegment) -> Result<NodeId, FieldError> {
    let typ = tree.uint("segment_type", u8::from(segment.typ).into(), 1);
    let count = tree.uint("segment_count", segment.asns.len() as u128, 1);
    let asns = segment
        .asns
        .iter()
        .map(|asn| tree.uint("asn", (*asn).into(), 4))
        .collect();
    let asns = tree.list("asns", Some("asn"), asns)?;
    tree.composite(
        "as_path_segment",
        vec![("segment_type", typ), ("segment_count", count), ("asns", asns)],
        &[],
    )
}

/// Wraps a value node as `[flags, type_code, length, value]`.
///
/// The length is one octet unless the value is longer than 255 bytes or the
/// caller already asked for the extended length flag.
pub fn attribute(
    tree: &mut FieldTree,
    flags: u8,
    type_code: u8,
    value: NodeId,
) -> Result<NodeId, FieldError> {
    let extended = flags & path_attribute_flags::EXTENDED_LENGTH != 0
        || tree.byte_length(value)? > usize::from(u8::MAX);
    let (flags, width) = match extended {
        true => (flags | path_attribute_flags::EXTENDED_LENGTH, 2),
        false => (flags, 1),
    };
    let flags = tree.bits("flags", codec::bytes_to_bits(&[flags]), 8)?;
    let type_code = tree.uint("type_code", type_code.into(), 1);
    let length = tree.length("length", width, false);
    tree.composite(
        "path_attribute",
        vec![
            ("flags", flags),
            ("type_code", type_code),
            ("length", length),
            ("value", value),
        ],
        &[("length", "value")],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tree() -> FieldTree {
        FieldTree::new(crate::log::discard())
    }

    #[test]
    fn origin_attribute_wire_format() {
        let mut t = tree();
        let attr = PathAttribute::Origin { value: Origin::Igp }
            .build(&mut t)
            .unwrap();
        assert_eq!(t.encode(attr).unwrap(), vec![0x40, 1, 1, 0]);
    }

    #[test]
    fn as_path_attribute_wire_format() {
        let mut t = tree();
        let attr = PathAttribute::AsPath {
            segments: vec![AsPathSegment {
                typ: AsPathSegmentType::AsSequence,
                asns: vec![65000, 65001],
            }],
        }
        .build(&mut t)
        .unwrap();
        assert_eq!(
            t.encode(attr).unwrap(),
            vec![0x40, 2, 10, 2, 2, 0, 0, 0xfd, 0xe8, 0, 0, 0xfd, 0xe9]
        );
    }

    #[test]
    fn long_values_use_extended_length() {
        let mut t = tree();
        let attr = PathAttribute::Communities {
            values: (0..70).collect(),
        }
        .build(&mut t)
        .unwrap();
        let bytes = t.encode(attr).unwrap();
        assert_eq!(bytes[..4], [0xd0, 8, 0x01, 0x18]);
        assert_eq!(bytes.len(), 4 + 280);
    }

    #[test]
    fn attribute_length_tracks_value_changes() {
        let mut t = tree();
        let attr = PathAttribute::NextHop {
            address: Ipv4Addr::new(192, 0, 2, 1).into(),
        }
        .build(&mut t)
        .unwrap();
        let value = t.resolve(attr, "value").unwrap();
        t.set_addr(value, IpAddr::V6(std::net::Ipv6Addr::LOCALHOST))
            .unwrap();
        assert_eq!(t.encode(attr).unwrap()[..3], [0x40, 3, 16]);
    }

    #[test]
    fn flags_follow_the_attribute_category() {
        assert_eq!(PathAttribute::AtomicAggregate.flags(), 0x40);
        assert_eq!(PathAttribute::MultiExitDisc { value: 0 }.flags(), 0x80);
        assert_eq!(
            PathAttribute::Aggregator {
                asn: 1,
                address: Ipv4Addr::LOCALHOST
            }
            .flags(),
            0xc0
        );
    }
}
