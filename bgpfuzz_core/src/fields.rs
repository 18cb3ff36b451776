//! Field archetypes built on the tree engine: value leaves, derived length
//! leaves, homogeneous lists and composites, plus their typed setters.

use crate::codec;
use crate::mutation::{self, MutationOp};
use crate::tree::{FieldError, FieldTree, Node, NodeId, SetterKind};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use slog::{debug, warn};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// An IP prefix as carried in BGP NLRI and withdrawn routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpPrefix {
    pub addr: IpAddr,
    pub length: u8,
}

impl IpPrefix {
    pub fn new(addr: IpAddr, length: u8) -> Self {
        Self { addr, length }
    }

    /// Longest meaningful prefix length for the address family.
    pub fn max_length(&self) -> u8 {
        match self.addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        }
    }

    /// One length octet followed by the `ceil(length / 8)` leading address
    /// octets. Lengths beyond the address are padded with zero octets.
    pub fn to_nlri(&self) -> Vec<u8> {
        let octets = match self.addr {
            IpAddr::V4(a) => a.octets().to_vec(),
            IpAddr::V6(a) => a.octets().to_vec(),
        };
        let needed = usize::from(self.length).div_ceil(8);
        let mut out = Vec::with_capacity(needed + 1);
        out.push(self.length);
        out.extend(octets.iter().copied().chain(std::iter::repeat(0)).take(needed));
        out
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.length)
    }
}

impl FromStr for IpPrefix {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FieldError::InvalidPrefix(s.to_string());
        let (addr, length) = s.split_once('/').ok_or_else(invalid)?;
        let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
        let length: u8 = length.parse().map_err(|_| invalid())?;
        let prefix = IpPrefix::new(addr, length);
        if length > prefix.max_length() {
            return Err(invalid());
        }
        Ok(prefix)
    }
}

impl Serialize for IpPrefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IpPrefix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Domain value held by a value leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafValue {
    /// Unsigned integer, big-endian in `width` bytes.
    Uint { value: u128, width: usize },
    Bytes(Vec<u8>),
    /// Fixed-width bit list, most significant bit first.
    Bits(Vec<bool>),
    Addr(IpAddr),
    Prefix(IpPrefix),
}

impl LeafValue {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            LeafValue::Uint { value, width } => codec::uint_to_bytes(*value, *width),
            LeafValue::Bytes(bytes) => bytes.clone(),
            LeafValue::Bits(bits) => codec::pack_bits(bits),
            LeafValue::Addr(IpAddr::V4(a)) => a.octets().to_vec(),
            LeafValue::Addr(IpAddr::V6(a)) => a.octets().to_vec(),
            LeafValue::Prefix(prefix) => prefix.to_nlri(),
        }
    }
}

/// A numeric leaf whose value is the summed byte length of its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthField {
    pub value: u128,
    pub width: usize,
    /// Add the field's own width to the total.
    pub count_self: bool,
}

/// The closed set of node shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Value(LeafValue),
    Length(LengthField),
    /// Ordered children; `element` restricts them to one type name.
    List { element: Option<&'static str> },
    Composite,
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Value(LeafValue::Uint { .. }) => "uint",
            FieldKind::Value(LeafValue::Bytes(_)) => "bytes",
            FieldKind::Value(LeafValue::Bits(_)) => "bits",
            FieldKind::Value(LeafValue::Addr(_)) => "addr",
            FieldKind::Value(LeafValue::Prefix(_)) => "prefix",
            FieldKind::Length(_) => "length",
            FieldKind::List { .. } => "list",
            FieldKind::Composite => "composite",
        }
    }

    /// Mutation operators registered for this shape.
    pub fn operators(&self) -> &'static [MutationOp] {
        mutation::operators_for(self)
    }

    /// Encoding of a leaf, `None` for containers.
    pub(crate) fn leaf_encoding(&self) -> Option<Vec<u8>> {
        match self {
            FieldKind::Value(value) => Some(value.encode()),
            FieldKind::Length(length) => Some(codec::uint_to_bytes(length.value, length.width)),
            FieldKind::List { .. } | FieldKind::Composite => None,
        }
    }
}

impl FieldTree {
    // Constructors

    fn leaf(&mut self, type_name: &'static str, value: LeafValue) -> NodeId {
        self.add_node(Node::new(type_name, FieldKind::Value(value)))
    }

    /// Unsigned integer leaf; out-of-range values are wrapped with a warning.
    pub fn uint(&mut self, type_name: &'static str, value: u128, width: usize) -> NodeId {
        let value = self.wrap_logged(type_name, value, width);
        self.leaf(type_name, LeafValue::Uint { value, width })
    }

    pub fn bytes(&mut self, type_name: &'static str, bytes: Vec<u8>) -> NodeId {
        self.leaf(type_name, LeafValue::Bytes(bytes))
    }

    /// Bit-list leaf of exactly `width` bits; `width` must be whole octets.
    pub fn bits(
        &mut self,
        type_name: &'static str,
        bits: Vec<bool>,
        width: usize,
    ) -> Result<NodeId, FieldError> {
        if width % 8 != 0 {
            return Err(codec::CodecError::BitLength(width).into());
        }
        if bits.len() != width {
            return Err(FieldError::BitWidth {
                expected: width,
                found: bits.len(),
            });
        }
        Ok(self.leaf(type_name, LeafValue::Bits(bits)))
    }

    pub fn bitstring(
        &mut self,
        type_name: &'static str,
        bits: &str,
        width: usize,
    ) -> Result<NodeId, FieldError> {
        let bits = codec::parse_bitstring(bits)?;
        self.bits(type_name, bits, width)
    }

    pub fn addr(&mut self, type_name: &'static str, addr: IpAddr) -> NodeId {
        self.leaf(type_name, LeafValue::Addr(addr))
    }

    pub fn ip_prefix(&mut self, type_name: &'static str, prefix: IpPrefix) -> NodeId {
        self.leaf(type_name, LeafValue::Prefix(prefix))
    }

    /// Derived length leaf. Its value is filled in once the parent declares
    /// its dependencies.
    pub fn length(&mut self, type_name: &'static str, width: usize, count_self: bool) -> NodeId {
        let length = LengthField {
            value: 0,
            width,
            count_self,
        };
        self.add_node(Node::new(type_name, FieldKind::Length(length)))
    }

    /// Homogeneous list. Items get keys `<type-name>_<n>`; when `element` is
    /// set every item must carry that type name.
    pub fn list(
        &mut self,
        type_name: &'static str,
        element: Option<&'static str>,
        items: Vec<NodeId>,
    ) -> Result<NodeId, FieldError> {
        let id = self.add_node(Node::new(type_name, FieldKind::List { element }));
        if let Err(e) = self.link_items(id, items) {
            self.release_unfinished(id)?;
            return Err(e);
        }
        self.detach_according_to_children(id)?;
        self.finalize(id)?;
        Ok(id)
    }

    /// Composite with fixed, named children in wire order. `dependencies`
    /// holds `(dependent, dependency)` key pairs among those children.
    pub fn composite(
        &mut self,
        type_name: &'static str,
        children: Vec<(&str, NodeId)>,
        dependencies: &[(&str, &str)],
    ) -> Result<NodeId, FieldError> {
        let id = self.add_node(Node::new(type_name, FieldKind::Composite));
        if let Err(e) = self.link_members(id, children, dependencies) {
            self.release_unfinished(id)?;
            return Err(e);
        }
        self.detach_according_to_children(id)?;
        self.finalize(id)?;
        Ok(id)
    }

    fn link_items(&mut self, list: NodeId, items: Vec<NodeId>) -> Result<(), FieldError> {
        for (position, item) in items.into_iter().enumerate() {
            let key = self.next_key(list, self.type_name(item)?)?;
            self.link_child(list, position, &key, item)?;
        }
        Ok(())
    }

    fn link_members(
        &mut self,
        composite: NodeId,
        children: Vec<(&str, NodeId)>,
        dependencies: &[(&str, &str)],
    ) -> Result<(), FieldError> {
        for (position, (key, child)) in children.into_iter().enumerate() {
            self.link_child(composite, position, key, child)?;
        }
        for (dependent, dependency) in dependencies {
            self.link_dependency(composite, dependent, dependency)?;
        }
        Ok(())
    }

    // Accessors

    pub fn leaf_value(&self, id: NodeId) -> Result<Option<&LeafValue>, FieldError> {
        match &self.node(id)?.kind {
            FieldKind::Value(value) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// Current numeric value of an integer leaf or derived length.
    pub fn uint_value(&self, id: NodeId) -> Result<Option<u128>, FieldError> {
        match &self.node(id)?.kind {
            FieldKind::Value(LeafValue::Uint { value, .. }) => Ok(Some(*value)),
            FieldKind::Length(length) => Ok(Some(length.value)),
            _ => Ok(None),
        }
    }

    /// Byte width of an integer leaf or derived length.
    pub fn uint_width(&self, id: NodeId) -> Result<Option<usize>, FieldError> {
        match &self.node(id)?.kind {
            FieldKind::Value(LeafValue::Uint { width, .. }) => Ok(Some(*width)),
            FieldKind::Length(length) => Ok(Some(length.width)),
            _ => Ok(None),
        }
    }

    // Domain setters

    fn mismatch(&self, id: NodeId, op: &'static str) -> FieldError {
        match self.node(id) {
            Ok(node) => FieldError::KindMismatch {
                op,
                type_name: node.type_name,
                kind: node.kind.name(),
            },
            Err(e) => e,
        }
    }

    fn wrap_logged(&self, type_name: &'static str, value: u128, width: usize) -> u128 {
        let (wrapped, overflowed) = codec::wrap_uint(value, width);
        if overflowed {
            warn!(self.log(), "value wrapped to field width";
                "field" => type_name,
                "value" => %value,
                "width" => width,
                "wrapped" => %wrapped,
            );
        }
        wrapped
    }

    /// Sets an integer leaf, or pins a derived length to a fixed value.
    pub fn set_uint(&mut self, id: NodeId, value: u128) -> Result<(), FieldError> {
        let width = self
            .uint_width(id)?
            .ok_or_else(|| self.mismatch(id, "set_uint"))?;
        let value = self.wrap_logged(self.type_name(id)?, value, width);
        self.run_setter(id, SetterKind::Domain, |tree| {
            match &mut tree.node_mut(id)?.kind {
                FieldKind::Value(LeafValue::Uint { value: v, .. }) => *v = value,
                FieldKind::Length(length) => length.value = value,
                _ => {}
            }
            Ok(())
        })
    }

    pub fn set_bytes(&mut self, id: NodeId, bytes: Vec<u8>) -> Result<(), FieldError> {
        if !matches!(self.kind(id)?, FieldKind::Value(LeafValue::Bytes(_))) {
            return Err(self.mismatch(id, "set_bytes"));
        }
        self.set_leaf(id, LeafValue::Bytes(bytes))
    }

    /// Replaces a bit-list leaf; the new list must keep the declared width.
    pub fn set_bits(&mut self, id: NodeId, bits: Vec<bool>) -> Result<(), FieldError> {
        match self.kind(id)? {
            FieldKind::Value(LeafValue::Bits(current)) if current.len() == bits.len() => {}
            FieldKind::Value(LeafValue::Bits(current)) => {
                return Err(FieldError::BitWidth {
                    expected: current.len(),
                    found: bits.len(),
                });
            }
            _ => return Err(self.mismatch(id, "set_bits")),
        }
        self.set_leaf(id, LeafValue::Bits(bits))
    }

    pub fn set_bitstring(&mut self, id: NodeId, bits: &str) -> Result<(), FieldError> {
        let bits = codec::parse_bitstring(bits)?;
        self.set_bits(id, bits)
    }

    /// Sets an address leaf. Switching family is allowed and yields a field
    /// of unexpected width.
    pub fn set_addr(&mut self, id: NodeId, addr: IpAddr) -> Result<(), FieldError> {
        if !matches!(self.kind(id)?, FieldKind::Value(LeafValue::Addr(_))) {
            return Err(self.mismatch(id, "set_addr"));
        }
        self.set_leaf(id, LeafValue::Addr(addr))
    }

    pub fn set_ip_prefix(&mut self, id: NodeId, prefix: IpPrefix) -> Result<(), FieldError> {
        if !matches!(self.kind(id)?, FieldKind::Value(LeafValue::Prefix(_))) {
            return Err(self.mismatch(id, "set_ip_prefix"));
        }
        self.set_leaf(id, LeafValue::Prefix(prefix))
    }

    fn set_leaf(&mut self, id: NodeId, value: LeafValue) -> Result<(), FieldError> {
        self.run_setter(id, SetterKind::Domain, |tree| {
            tree.node_mut(id)?.kind = FieldKind::Value(value);
            Ok(())
        })
    }

    fn list_len(&self, id: NodeId, op: &'static str) -> Result<usize, FieldError> {
        let node = self.node(id)?;
        match node.kind {
            FieldKind::List { .. } => Ok(node.children.len()),
            _ => Err(self.mismatch(id, op)),
        }
    }

    /// Appends an element to a list, re-deriving any length that covers it.
    pub fn push_element(&mut self, list: NodeId, item: NodeId) -> Result<String, FieldError> {
        self.list_len(list, "push_element")?;
        self.append_child(list, item)
    }

    /// Inserts a deep copy of the element at `index` right after it.
    pub fn duplicate_element(&mut self, list: NodeId, index: usize) -> Result<(), FieldError> {
        let len = self.list_len(list, "duplicate_element")?;
        if index >= len {
            debug!(self.log(), "no element to duplicate"; "list" => %list, "index" => index);
            return Ok(());
        }
        let original = self.node(list)?.children[index].1;
        self.run_setter(list, SetterKind::Domain, |tree| {
            let copy = tree.clone_subtree(original)?;
            let key = tree.next_key(list, tree.type_name(copy)?)?;
            tree.link_child(list, index + 1, &key, copy)
        })
    }

    /// Removes the element at `index` together with its subtree.
    pub fn drop_element(&mut self, list: NodeId, index: usize) -> Result<(), FieldError> {
        let len = self.list_len(list, "drop_element")?;
        if index >= len {
            debug!(self.log(), "no element to drop"; "list" => %list, "index" => index);
            return Ok(());
        }
        let mut orphaned = Vec::new();
        self.run_setter(list, SetterKind::Domain, |tree| {
            orphaned = tree.unlink_child_at(list, index)?;
            Ok(())
        })?;
        for dependent in orphaned {
            self.update(dependent)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecError;
    use pretty_assertions::assert_eq;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn tree() -> FieldTree {
        FieldTree::new(crate::log::discard())
    }

    #[test]
    fn list_of_uints_concatenates_and_grows() {
        let mut t = tree();
        let items = (1..=3).map(|v| t.uint("u16", v, 2)).collect();
        let list = t.list("list", Some("u16"), items).unwrap();
        assert_eq!(t.encode(list).unwrap(), vec![0, 1, 0, 2, 0, 3]);

        let four = t.uint("u16", 4, 2);
        assert_eq!(t.push_element(list, four).unwrap(), "u16_3");
        let encoded = t.encode(list).unwrap();
        assert_eq!(encoded.len(), 8);
        assert_eq!(encoded[6..], [0x00, 0x04]);
    }

    #[test]
    fn typed_lists_reject_foreign_elements() {
        let mut t = tree();
        let list = t.list("list", Some("u16"), vec![]).unwrap();
        let other = t.uint("u8", 1, 1);
        assert_eq!(
            t.push_element(list, other),
            Err(FieldError::ElementMismatch {
                expected: "u16",
                found: "u8"
            })
        );

        let stray = t.uint("u8", 1, 1);
        assert!(matches!(
            t.list("list", Some("u16"), vec![stray]),
            Err(FieldError::ElementMismatch { .. })
        ));
    }

    #[test]
    fn overwrite_precedence_on_a_value_leaf() {
        let mut t = tree();
        let leaf = t.uint("u8", 0x07, 1);
        t.set_prefix(leaf, vec![0xaa]).unwrap();
        assert_eq!(t.encode(leaf).unwrap(), vec![0xaa, 0x07]);
        t.set_raw(leaf, vec![0x99]).unwrap();
        assert_eq!(t.encode(leaf).unwrap(), vec![0x99]);
        t.set_uint(leaf, 9).unwrap();
        assert_eq!(t.encode(leaf).unwrap(), vec![0x09]);
    }

    #[test]
    fn wrappers_survive_domain_setters_but_not_raw() {
        let mut t = tree();
        let leaf = t.uint("u8", 1, 1);
        t.set_raw(leaf, vec![0x55]).unwrap();
        t.set_suffix(leaf, vec![0xee]).unwrap();
        assert_eq!(t.encode(leaf).unwrap(), vec![0x55, 0xee]);
        t.set_uint(leaf, 2).unwrap();
        assert_eq!(t.encode(leaf).unwrap(), vec![0x02, 0xee]);
        t.set_raw(leaf, vec![0x66]).unwrap();
        assert_eq!(t.encode(leaf).unwrap(), vec![0x66]);
    }

    #[derive(Debug, Clone, Copy)]
    enum Setter {
        Raw(u8),
        Prefix(u8),
        Suffix(u8),
        Domain(u8),
    }

    fn apply(t: &mut FieldTree, leaf: NodeId, setter: Setter) {
        let result = match setter {
            Setter::Raw(b) => t.set_raw(leaf, vec![b]),
            Setter::Prefix(b) => t.set_prefix(leaf, vec![b]),
            Setter::Suffix(b) => t.set_suffix(leaf, vec![b]),
            Setter::Domain(v) => t.set_uint(leaf, v.into()),
        };
        result.unwrap();
    }

    #[test]
    fn every_pair_of_setters_follows_the_precedence_table() {
        use Setter::*;
        let cases = [
            (Raw(0x11), Raw(0x22), vec![0x22]),
            (Raw(0x11), Suffix(0xee), vec![0x11, 0xee]),
            (Raw(0x11), Domain(9), vec![0x09]),
            (Prefix(0xaa), Raw(0x22), vec![0x22]),
            (Prefix(0xaa), Suffix(0xee), vec![0xaa, 0x07, 0xee]),
            (Prefix(0xaa), Domain(9), vec![0xaa, 0x09]),
            (Domain(5), Raw(0x22), vec![0x22]),
            (Domain(5), Suffix(0xee), vec![0x05, 0xee]),
            (Domain(5), Domain(9), vec![0x09]),
        ];
        for (first, second, expected) in cases {
            let mut t = tree();
            let leaf = t.uint("u8", 0x07, 1);
            apply(&mut t, leaf, first);
            apply(&mut t, leaf, second);
            assert_eq!(t.encode(leaf).unwrap(), expected, "{first:?} then {second:?}");
        }

        let mut t = tree();
        let leaf = t.uint("u8", 0x07, 1);
        for setter in [Prefix(0xaa), Domain(5), Domain(9)] {
            apply(&mut t, leaf, setter);
        }
        assert_eq!(t.encode(leaf).unwrap(), vec![0xaa, 0x09]);
    }

    #[test]
    fn out_of_range_uints_wrap() {
        let mut t = tree();
        let leaf = t.uint("u8", 0x1ff, 1);
        assert_eq!(t.encode(leaf).unwrap(), vec![0xff]);
        t.set_uint(leaf, 0x100).unwrap();
        assert_eq!(t.uint_value(leaf).unwrap(), Some(0));
    }

    #[test]
    fn bit_fields_enforce_their_width() {
        let mut t = tree();
        assert_eq!(
            t.bitstring("flags", "0100", 8),
            Err(FieldError::BitWidth {
                expected: 8,
                found: 4
            })
        );
        assert_eq!(
            t.bits("flags", vec![true; 4], 4),
            Err(FieldError::Codec(CodecError::BitLength(4)))
        );
        let flags = t.bitstring("flags", "01000000", 8).unwrap();
        assert_eq!(t.encode(flags).unwrap(), vec![0x40]);
        assert_eq!(
            t.set_bits(flags, vec![true; 9]),
            Err(FieldError::BitWidth {
                expected: 8,
                found: 9
            })
        );
        t.set_bitstring(flags, "10010000").unwrap();
        assert_eq!(t.encode(flags).unwrap(), vec![0x90]);
    }

    #[test]
    fn setters_check_the_leaf_kind() {
        let mut t = tree();
        let leaf = t.bytes("data", vec![1]);
        assert!(matches!(
            t.set_uint(leaf, 1),
            Err(FieldError::KindMismatch { op: "set_uint", .. })
        ));
        assert!(matches!(
            t.set_addr(leaf, IpAddr::V4(Ipv4Addr::LOCALHOST)),
            Err(FieldError::KindMismatch { .. })
        ));
        assert!(!t.is_detached(leaf).unwrap());
    }

    #[test]
    fn address_leaf_can_switch_family() {
        let mut t = tree();
        let hop = t.addr("next_hop", IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
        assert_eq!(t.encode(hop).unwrap(), vec![192, 0, 2, 1]);
        t.set_addr(hop, IpAddr::V6(Ipv6Addr::LOCALHOST)).unwrap();
        assert_eq!(t.byte_length(hop).unwrap(), 16);
    }

    #[test]
    fn prefixes_encode_as_nlri() {
        let p: IpPrefix = "10.1.0.0/16".parse().unwrap();
        assert_eq!(p.to_nlri(), vec![16, 10, 1]);
        let p: IpPrefix = "192.0.2.0/25".parse().unwrap();
        assert_eq!(p.to_nlri(), vec![25, 192, 0, 2, 0]);
        assert_eq!(IpPrefix::new(p.addr, 0).to_nlri(), vec![0]);
        assert_eq!(IpPrefix::new(p.addr, 40).to_nlri(), vec![40, 192, 0, 2, 0, 0]);
        assert!("10.0.0.0/33".parse::<IpPrefix>().is_err());
        assert!("10.0.0.0".parse::<IpPrefix>().is_err());
        assert_eq!(
            "2001:db8::/32".parse::<IpPrefix>().unwrap().to_nlri(),
            vec![32, 0x20, 0x01, 0x0d, 0xb8]
        );
    }

    #[test]
    fn duplicate_and_drop_elements_update_lengths() {
        let mut t = tree();
        let items = vec![t.uint("u16", 1, 2), t.uint("u16", 2, 2)];
        let list = t.list("list", Some("u16"), items).unwrap();
        let len = t.length("length", 1, false);
        let msg = t
            .composite("msg", vec![("len", len), ("items", list)], &[("len", "items")])
            .unwrap();
        assert_eq!(t.encode(msg).unwrap(), vec![4, 0, 1, 0, 2]);

        t.duplicate_element(list, 0).unwrap();
        assert_eq!(t.encode(msg).unwrap(), vec![6, 0, 1, 0, 1, 0, 2]);
        assert_eq!(t.children(list).unwrap().len(), 3);

        t.drop_element(list, 2).unwrap();
        t.drop_element(list, 7).unwrap();
        assert_eq!(t.encode(msg).unwrap(), vec![4, 0, 1, 0, 1]);
    }

    #[test]
    fn dropping_a_counted_element_shrinks_sibling_lengths() {
        let mut t = tree();
        let items = vec![
            t.length("length", 1, false),
            t.bytes("data", vec![1; 3]),
            t.bytes("data", vec![2; 5]),
        ];
        let list = t.list("list", None, items).unwrap();
        t.declare_dependency(list, "length_0", "data_0").unwrap();
        t.declare_dependency(list, "length_0", "data_1").unwrap();
        let len = t.resolve(list, "length_0").unwrap();
        assert_eq!(t.encode(len).unwrap(), vec![8]);

        t.drop_element(list, 2).unwrap();
        assert_eq!(t.dependencies(len).unwrap().len(), 1);
        assert_eq!(t.encode(len).unwrap(), vec![3]);
        assert_eq!(t.encode(list).unwrap(), vec![3, 1, 1, 1]);
    }

    #[test]
    fn failed_construction_releases_children() {
        let mut t = tree();
        let a = t.uint("uint", 1, 1);
        let b = t.uint("uint", 2, 1);
        assert!(matches!(
            t.composite("pair", vec![("a", a), ("b", b)], &[("a", "missing")]),
            Err(FieldError::MissingChild { key, .. }) if key == "missing"
        ));
        assert_eq!(t.len(), 2);
        assert_eq!(t.parent(a).unwrap(), None);
        assert!(t.dependencies(a).unwrap().is_empty());

        let c = t.bytes("data", vec![3]);
        assert!(matches!(
            t.list("uints", Some("uint"), vec![a, c]),
            Err(FieldError::ElementMismatch { .. })
        ));
        assert_eq!(t.len(), 3);
        assert_eq!(t.parent(a).unwrap(), None);

        let list = t.list("uints", Some("uint"), vec![a, b]).unwrap();
        assert_eq!(t.encode(list).unwrap(), vec![1, 2]);
    }

    #[test]
    fn length_over_a_list_follows_appends() {
        let mut t = tree();
        let list = t.list("list", None, vec![]).unwrap();
        let len = t.length("length", 2, false);
        let msg = t
            .composite("msg", vec![("len", len), ("items", list)], &[("len", "items")])
            .unwrap();
        let item = t.bytes("data", vec![0; 300]);
        t.push_element(list, item).unwrap();
        assert_eq!(t.encode(msg).unwrap()[..2], [0x01, 0x2c]);
        assert!(!t.is_detached(msg).unwrap());
    }
}
