//! Message framing and the four RFC 4271 message bodies.

use super::attributes::PathAttribute;
use super::{
    AS_TRANS, BGP_VERSION, CapabilityCode, MARKER_LEN, MessageType, OptionalParameterType, Origin,
    PathAttributeTypeCode,
};
use crate::fields::IpPrefix;
use crate::tree::{FieldError, FieldTree, NodeId};
use std::net::{IpAddr, Ipv4Addr};

/// `[marker, length, type, body]` with a length that covers the whole
/// message, itself included.
pub fn message(
    tree: &mut FieldTree,
    typ: MessageType,
    body: NodeId,
) -> Result<NodeId, FieldError> {
    let marker = tree.bytes("marker", vec![0xff; MARKER_LEN]);
    let length = tree.length("length", 2, true);
    let typ = tree.uint("message_type", u8::from(typ).into(), 1);
    tree.composite(
        "message",
        vec![
            ("marker", marker),
            ("length", length),
            ("type", typ),
            ("body", body),
        ],
        &[("length", "marker"), ("length", "type"), ("length", "body")],
    )
}

pub fn keepalive(tree: &mut FieldTree) -> Result<NodeId, FieldError> {
    let body = tree.composite("keepalive", vec![], &[])?;
    message(tree, MessageType::KeepAlive, body)
}

pub fn notification(
    tree: &mut FieldTree,
    code: u8,
    subcode: u8,
    data: Vec<u8>,
) -> Result<NodeId, FieldError> {
    let code = tree.uint("error_code", code.into(), 1);
    let subcode = tree.uint("error_subcode", subcode.into(), 1);
    let data = tree.bytes("data", data);
    let body = tree.composite(
        "notification",
        vec![("error_code", code), ("error_subcode", subcode), ("data", data)],
        &[],
    )?;
    message(tree, MessageType::Notification, body)
}

/// `[code, length, value]` capability TLV.
pub fn capability(tree: &mut FieldTree, code: u8, value: NodeId) -> Result<NodeId, FieldError> {
    let code = tree.uint("capability_code", code.into(), 1);
    let length = tree.length("length", 1, false);
    tree.composite(
        "capability",
        vec![("code", code), ("length", length), ("value", value)],
        &[("length", "value")],
    )
}

/// Wraps one capability in a Capabilities optional parameter.
pub fn optional_parameter(tree: &mut FieldTree, capability: NodeId) -> Result<NodeId, FieldError> {
    let typ = tree.uint(
        "parameter_type",
        u8::from(OptionalParameterType::Capabilities).into(),
        1,
    );
    let length = tree.length("length", 1, false);
    tree.composite(
        "optional_parameter",
        vec![("type", typ), ("length", length), ("value", capability)],
        &[("length", "value")],
    )
}

/// OPEN message. `asn` values beyond 16 bits are sent as AS_TRANS; the real
/// number belongs in a 4-octet AS capability.
pub fn open(
    tree: &mut FieldTree,
    asn: u32,
    hold_time: u16,
    bgp_id: Ipv4Addr,
    parameters: Vec<NodeId>,
) -> Result<NodeId, FieldError> {
    let version = tree.uint("version", BGP_VERSION.into(), 1);
    let my_as = tree.uint("my_as", two_octet_asn(asn).into(), 2);
    let hold_time = tree.uint("hold_time", hold_time.into(), 2);
    let bgp_id = tree.addr("bgp_id", bgp_id.into());
    let parameters_len = tree.length("length", 1, false);
    let parameters = tree.list("optional_parameters", Some("optional_parameter"), parameters)?;
    let body = tree.composite(
        "open",
        vec![
            ("version", version),
            ("my_as", my_as),
            ("hold_time", hold_time),
            ("bgp_id", bgp_id),
            ("optional_parameters_length", parameters_len),
            ("optional_parameters", parameters),
        ],
        &[("optional_parameters_length", "optional_parameters")],
    )?;
    message(tree, MessageType::Open, body)
}

fn two_octet_asn(asn: u32) -> u16 {
    u16::try_from(asn).unwrap_or(AS_TRANS)
}

/// UPDATE message from already built prefixes and path attributes.
pub fn update(
    tree: &mut FieldTree,
    withdrawn: Vec<NodeId>,
    attributes: Vec<NodeId>,
    nlri: Vec<NodeId>,
) -> Result<NodeId, FieldError> {
    let withdrawn_len = tree.length("length", 2, false);
    let withdrawn = tree.list("withdrawn_routes", Some("prefix"), withdrawn)?;
    let attributes_len = tree.length("length", 2, false);
    let attributes = tree.list("path_attributes", Some("path_attribute"), attributes)?;
    let nlri = tree.list("nlri", Some("prefix"), nlri)?;
    let body = tree.composite(
        "update",
        vec![
            ("withdrawn_routes_length", withdrawn_len),
            ("withdrawn_routes", withdrawn),
            ("path_attributes_length", attributes_len),
            ("path_attributes", attributes),
            ("nlri", nlri),
        ],
        &[
            ("withdrawn_routes_length", "withdrawn_routes"),
            ("path_attributes_length", "path_attributes"),
        ],
    )?;
    message(tree, MessageType::Update, body)
}

/// Typed access to the interesting parts of an UPDATE tree.
///
/// Holds plain node handles, so one handle serves every clone of the tree it
/// was resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateHandle {
    pub root: NodeId,
    pub withdrawn: NodeId,
    pub attributes: NodeId,
    pub nlri: NodeId,
}

impl UpdateHandle {
    pub fn new(tree: &FieldTree, root: NodeId) -> Result<Self, FieldError> {
        Ok(Self {
            root,
            withdrawn: tree.resolve(root, "body/withdrawn_routes")?,
            attributes: tree.resolve(root, "body/path_attributes")?,
            nlri: tree.resolve(root, "body/nlri")?,
        })
    }

    /// First path attribute carrying `code`.
    pub fn attribute(
        &self,
        tree: &FieldTree,
        code: PathAttributeTypeCode,
    ) -> Result<Option<NodeId>, FieldError> {
        for (_, attr) in tree.children(self.attributes)? {
            let found = match tree.child(attr, "type_code") {
                Some(type_code) => tree.uint_value(type_code)?,
                None => None,
            };
            if found == Some(u8::from(code).into()) {
                return Ok(Some(attr));
            }
        }
        Ok(None)
    }

    /// Sets the value of attribute `attr`, adding the attribute when missing.
    fn set_attribute<F>(
        &self,
        tree: &mut FieldTree,
        attr: PathAttribute,
        set: F,
    ) -> Result<(), FieldError>
    where
        F: FnOnce(&mut FieldTree, NodeId) -> Result<(), FieldError>,
    {
        match self.attribute(tree, attr.type_code())? {
            Some(existing) => {
                let value = tree.resolve(existing, "value")?;
                set(tree, value)
            }
            None => {
                let built = attr.build(tree)?;
                tree.push_element(self.attributes, built).map(|_| ())
            }
        }
    }

    pub fn set_next_hop(&self, tree: &mut FieldTree, address: IpAddr) -> Result<(), FieldError> {
        self.set_attribute(tree, PathAttribute::NextHop { address }, |tree, value| {
            tree.set_addr(value, address)
        })
    }

    pub fn set_origin(&self, tree: &mut FieldTree, origin: Origin) -> Result<(), FieldError> {
        self.set_attribute(tree, PathAttribute::Origin { value: origin }, |tree, value| {
            tree.set_uint(value, u8::from(origin).into())
        })
    }

    pub fn push_nlri(&self, tree: &mut FieldTree, prefix: IpPrefix) -> Result<String, FieldError> {
        let prefix = tree.ip_prefix("prefix", prefix);
        tree.push_element(self.nlri, prefix)
    }

    pub fn push_withdrawn(
        &self,
        tree: &mut FieldTree,
        prefix: IpPrefix,
    ) -> Result<String, FieldError> {
        let prefix = tree.ip_prefix("prefix", prefix);
        tree.push_element(self.withdrawn, prefix)
    }
}

/// Typed access to an OPEN tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenHandle {
    pub root: NodeId,
    pub my_as: NodeId,
    pub hold_time: NodeId,
    pub bgp_id: NodeId,
    pub parameters: NodeId,
}

impl OpenHandle {
    pub fn new(tree: &FieldTree, root: NodeId) -> Result<Self, FieldError> {
        Ok(Self {
            root,
            my_as: tree.resolve(root, "body/my_as")?,
            hold_time: tree.resolve(root, "body/hold_time")?,
            bgp_id: tree.resolve(root, "body/bgp_id")?,
            parameters: tree.resolve(root, "body/optional_parameters")?,
        })
    }

    pub fn set_hold_time(&self, tree: &mut FieldTree, hold_time: u16) -> Result<(), FieldError> {
        tree.set_uint(self.hold_time, hold_time.into())
    }

    /// Sets My AS, and the 4-octet AS capability when the message has one.
    pub fn set_asn(&self, tree: &mut FieldTree, asn: u32) -> Result<(), FieldError> {
        tree.set_uint(self.my_as, two_octet_asn(asn).into())?;
        if let Some(value) = self.capability_value(tree, CapabilityCode::FourOctetAs)? {
            tree.set_uint(value, asn.into())?;
        }
        Ok(())
    }

    /// Value node of the first capability advertising `code`.
    pub fn capability_value(
        &self,
        tree: &FieldTree,
        code: CapabilityCode,
    ) -> Result<Option<NodeId>, FieldError> {
        for (_, parameter) in tree.children(self.parameters)? {
            let Ok(value) = tree.resolve(parameter, "value/value") else {
                continue;
            };
            let found = tree.uint_value(tree.resolve(parameter, "value/code")?)?;
            if found == Some(u8::from(code).into()) {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    pub fn push_capability(&self, tree: &mut FieldTree, capability: NodeId) -> Result<String, FieldError> {
        let parameter = optional_parameter(tree, capability)?;
        tree.push_element(self.parameters, parameter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgp::AsPathSegment;
    use crate::bgp::AsPathSegmentType;
    use crate::codec;
    use pretty_assertions::assert_eq;

    fn tree() -> FieldTree {
        FieldTree::new(crate::log::discard())
    }

    fn header_length(tree: &FieldTree, root: NodeId) -> u128 {
        let length = tree.resolve(root, "length").unwrap();
        codec::decode_uint(&tree.encode(length).unwrap()).unwrap()
    }

    fn sample_update(t: &mut FieldTree) -> NodeId {
        let attributes = [
            PathAttribute::Origin { value: Origin::Igp },
            PathAttribute::AsPath {
                segments: vec![AsPathSegment {
                    typ: AsPathSegmentType::AsSequence,
                    asns: vec![65000],
                }],
            },
            PathAttribute::NextHop {
                address: Ipv4Addr::new(192, 0, 2, 1).into(),
            },
        ]
        .iter()
        .map(|a| a.build(t))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
        let nlri = vec![t.ip_prefix("prefix", "10.0.0.0/8".parse().unwrap())];
        update(t, vec![], attributes, nlri).unwrap()
    }

    #[test]
    fn keepalive_is_a_bare_header() {
        let mut t = tree();
        let root = keepalive(&mut t).unwrap();
        let mut expected = vec![0xff; 16];
        expected.extend_from_slice(&[0x00, 0x13, 0x04]);
        assert_eq!(t.encode(root).unwrap(), expected);
    }

    #[test]
    fn notification_wire_format() {
        let mut t = tree();
        let root = notification(&mut t, 6, 2, vec![0xab]).unwrap();
        let bytes = t.encode(root).unwrap();
        assert_eq!(bytes[16..], [0x00, 22, 3, 6, 2, 0xab]);
    }

    #[test]
    fn update_lengths_are_derived() {
        let mut t = tree();
        let root = sample_update(&mut t);
        let bytes = t.encode(root).unwrap();
        // origin 4 + as_path 9 + next_hop 7
        let attributes_len = 4 + 9 + 7;
        assert_eq!(bytes[19..21], [0, 0]);
        assert_eq!(bytes[21..23], [0, attributes_len as u8]);
        assert_eq!(bytes[23 + attributes_len..], [8, 10]);
        assert_eq!(header_length(&t, root), bytes.len() as u128);
        assert_eq!(bytes.len(), 19 + 2 + 2 + attributes_len + 2);
    }

    #[test]
    fn next_hop_change_ripples_to_every_length() {
        let mut t = tree();
        let root = sample_update(&mut t);
        let handle = UpdateHandle::new(&t, root).unwrap();
        let before = t.byte_length(root).unwrap();

        handle
            .set_next_hop(&mut t, "2001:db8::1".parse().unwrap())
            .unwrap();
        let hop = handle
            .attribute(&t, PathAttributeTypeCode::NextHop)
            .unwrap()
            .unwrap();
        assert_eq!(t.encode(hop).unwrap()[2], 16);
        let attributes_len = t.resolve(root, "body/path_attributes_length").unwrap();
        assert_eq!(t.encode(attributes_len).unwrap(), vec![0, 32]);
        assert_eq!(t.byte_length(root).unwrap(), before + 12);
        assert_eq!(header_length(&t, root), before as u128 + 12);
    }

    #[test]
    fn missing_attributes_are_appended() {
        let mut t = tree();
        let root = update(&mut t, vec![], vec![], vec![]).unwrap();
        let handle = UpdateHandle::new(&t, root).unwrap();
        assert_eq!(header_length(&t, root), 23);

        handle.set_origin(&mut t, Origin::Incomplete).unwrap();
        handle.set_origin(&mut t, Origin::Egp).unwrap();
        assert_eq!(t.children(handle.attributes).unwrap().len(), 1);
        assert_eq!(t.encode(handle.attributes).unwrap(), vec![0x40, 1, 1, 1]);
        assert_eq!(header_length(&t, root), 27);
    }

    #[test]
    fn pushed_prefixes_grow_the_message() {
        let mut t = tree();
        let root = update(&mut t, vec![], vec![], vec![]).unwrap();
        let handle = UpdateHandle::new(&t, root).unwrap();
        handle
            .push_withdrawn(&mut t, "192.0.2.0/24".parse().unwrap())
            .unwrap();
        assert_eq!(handle.push_nlri(&mut t, "10.1.0.0/16".parse().unwrap()).unwrap(), "prefix_0");
        let bytes = t.encode(root).unwrap();
        assert_eq!(bytes[19..], [0, 4, 24, 192, 0, 2, 0, 0, 16, 10, 1]);
        assert_eq!(header_length(&t, root), bytes.len() as u128);
    }

    #[test]
    fn open_with_four_octet_asn() {
        let mut t = tree();
        let asn = t.uint("asn", 4_200_000_000, 4);
        let capability = capability(&mut t, CapabilityCode::FourOctetAs.into(), asn).unwrap();
        let parameter = optional_parameter(&mut t, capability).unwrap();
        let root = open(&mut t, 4_200_000_000, 90, Ipv4Addr::new(10, 0, 0, 1), vec![parameter]).unwrap();
        let bytes = t.encode(root).unwrap();
        assert_eq!(
            bytes[19..],
            [4, 0x5b, 0xa0, 0, 90, 10, 0, 0, 1, 8, 2, 6, 65, 4, 0xfa, 0x56, 0xea, 0x00]
        );
        assert_eq!(header_length(&t, root), 37);

        let handle = OpenHandle::new(&t, root).unwrap();
        handle.set_asn(&mut t, 65001).unwrap();
        handle.set_hold_time(&mut t, 3).unwrap();
        let bytes = t.encode(root).unwrap();
        assert_eq!(bytes[20..25], [0xfd, 0xe9, 0, 3, 10]);
        assert_eq!(bytes[33..], [0, 0, 0xfd, 0xe9]);
    }

    #[test]
    fn pushed_capability_updates_parameter_length() {
        let mut t = tree();
        let root = open(&mut t, 65000, 180, Ipv4Addr::LOCALHOST, vec![]).unwrap();
        assert_eq!(header_length(&t, root), 29);
        let handle = OpenHandle::new(&t, root).unwrap();
        let empty = t.bytes("capability_value", vec![]);
        let capability = capability(&mut t, CapabilityCode::RouteRefresh.into(), empty).unwrap();
        handle.push_capability(&mut t, capability).unwrap();
        let length = t.resolve(root, "body/optional_parameters_length").unwrap();
        assert_eq!(t.encode(length).unwrap(), vec![4]);
        assert_eq!(header_length(&t, root), 33);
        assert_eq!(
            handle
                .capability_value(&t, CapabilityCode::RouteRefresh)
                .unwrap(),
            Some(empty)
        );
    }
}
