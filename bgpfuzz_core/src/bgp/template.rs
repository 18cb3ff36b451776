//! Seed message descriptions, as found under `[message]` in the fuzzer
//! configuration.

use super::attributes::{AsPathSegment, PathAttribute};
use super::{AsPathSegmentType, CapabilityCode, MessageType, Origin, message};
use crate::fields::IpPrefix;
use crate::tree::{FieldError, FieldTree, NodeId};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MessageTemplate {
    Keepalive,
    Open(OpenTemplate),
    Update(UpdateTemplate),
    Notification(NotificationTemplate),
}

impl Default for MessageTemplate {
    fn default() -> Self {
        MessageTemplate::Update(UpdateTemplate::default())
    }
}

impl MessageTemplate {
    pub fn message_type(&self) -> MessageType {
        match self {
            MessageTemplate::Keepalive => MessageType::KeepAlive,
            MessageTemplate::Open(_) => MessageType::Open,
            MessageTemplate::Update(_) => MessageType::Update,
            MessageTemplate::Notification(_) => MessageType::Notification,
        }
    }

    /// Builds the message into `tree` and returns its root.
    pub fn build(&self, tree: &mut FieldTree) -> Result<NodeId, FieldError> {
        match self {
            MessageTemplate::Keepalive => message::keepalive(tree),
            MessageTemplate::Open(open) => open.build(tree),
            MessageTemplate::Update(update) => update.build(tree),
            MessageTemplate::Notification(n) => {
                message::notification(tree, n.code, n.subcode, n.data.clone())
            }
        }
    }
}

/// A capability advertised in an OPEN message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Capability {
    Multiprotocol {
        afi: u16,
        safi: u8,
    },
    RouteRefresh,
    /// Carries the OPEN's own AS number.
    FourOctetAs,
    Other {
        code: u8,
        #[serde(default)]
        value: Vec<u8>,
    },
}

impl Capability {
    pub fn code(&self) -> u8 {
        match self {
            Capability::Multiprotocol { .. } => CapabilityCode::MultiprotocolExtensions.into(),
            Capability::RouteRefresh => CapabilityCode::RouteRefresh.into(),
            Capability::FourOctetAs => CapabilityCode::FourOctetAs.into(),
            Capability::Other { code, .. } => *code,
        }
    }

    pub fn build(&self, tree: &mut FieldTree, asn: u32) -> Result<NodeId, FieldError> {
        let value = match self {
            Capability::Multiprotocol { afi, safi } => {
                let afi = tree.uint("afi", (*afi).into(), 2);
                let reserved = tree.uint("reserved", 0, 1);
                let safi = tree.uint("safi", (*safi).into(), 1);
                tree.composite(
                    "multiprotocol",
                    vec![("afi", afi), ("reserved", reserved), ("safi", safi)],
                    &[],
                )?
            }
            Capability::RouteRefresh => tree.bytes("capability_value", Vec::new()),
            Capability::FourOctetAs => tree.uint("asn", asn.into(), 4),
            Capability::Other { value, .. } => tree.bytes("capability_value", value.clone()),
        };
        message::capability(tree, self.code(), value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OpenTemplate {
    pub asn: u32,
    pub hold_time: u16,
    pub bgp_id: Ipv4Addr,
    pub capabilities: Vec<Capability>,
}

impl Default for OpenTemplate {
    fn default() -> Self {
        Self {
            asn: 65000,
            hold_time: 90,
            bgp_id: Ipv4Addr::new(10, 0, 0, 1),
            capabilities: vec![
                Capability::Multiprotocol { afi: 1, safi: 1 },
                Capability::RouteRefresh,
                Capability::FourOctetAs,
            ],
        }
    }
}

impl OpenTemplate {
    pub fn build(&self, tree: &mut FieldTree) -> Result<NodeId, FieldError> {
        let parameters = self
            .capabilities
            .iter()
            .map(|c| {
                let capability = c.build(tree, self.asn)?;
                message::optional_parameter(tree, capability)
            })
            .collect::<Result<Vec<_>, _>>()?;
        message::open(tree, self.asn, self.hold_time, self.bgp_id, parameters)
    }

    /// OPEN followed by KEEPALIVE, the bytes a peer expects before anything
    /// else on a fresh session.
    pub fn session_preamble(&self, log: Logger) -> Result<Vec<u8>, FieldError> {
        let mut tree = FieldTree::new(log);
        let open = self.build(&mut tree)?;
        let keepalive = message::keepalive(&mut tree)?;
        let mut bytes = tree.encode(open)?;
        bytes.extend(tree.encode(keepalive)?);
        Ok(bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UpdateTemplate {
    pub withdrawn: Vec<IpPrefix>,
    pub attributes: Vec<PathAttribute>,
    pub nlri: Vec<IpPrefix>,
}

impl Default for UpdateTemplate {
    fn default() -> Self {
        Self {
            withdrawn: Vec::new(),
            attributes: vec![
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
            ],
            nlri: vec![IpPrefix::new(Ipv4Addr::new(198, 51, 100, 0).into(), 24)],
        }
    }
}

impl UpdateTemplate {
    pub fn build(&self, tree: &mut FieldTree) -> Result<NodeId, FieldError> {
        let withdrawn = self
            .withdrawn
            .iter()
            .map(|p| tree.ip_prefix("prefix", *p))
            .collect();
        let attributes = self
            .attributes
            .iter()
            .map(|a| a.build(tree))
            .collect::<Result<Vec<_>, _>>()?;
        let nlri = self
            .nlri
            .iter()
            .map(|p| tree.ip_prefix("prefix", *p))
            .collect();
        message::update(tree, withdrawn, attributes, nlri)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NotificationTemplate {
    pub code: u8,
    pub subcode: u8,
    pub data: Vec<u8>,
}

impl Default for NotificationTemplate {
    fn default() -> Self {
        // Cease, administrative shutdown.
        Self {
            code: 6,
            subcode: 2,
            data: Vec::new(),
        }
    }
}
