use crate::models::*;
use ipnet::IpNet;
use smallvec::SmallVec;
use std::net::IpAddr;

/// MPLS label stack of a labeled NLRI. Most routes carry a single label.
pub type LabelStack = SmallVec<[u32; 2]>;

/// Content of an `MP_REACH_NLRI` or `MP_UNREACH_NLRI` attribute.
#[derive(Debug, PartialEq, Clone, Eq)]
pub struct MpNlri {
    pub afi: u16,
    pub safi: u8,
    /// First address of the next hop field, only for reachable NLRI.
    pub next_hop: Option<IpAddr>,
    pub prefixes: Vec<NlriPrefix>,
}

/// One NLRI entry, decoded according to its address family.
#[derive(Debug, PartialEq, Clone, Eq)]
pub enum NlriPrefix {
    /// IPv4/IPv6 unicast (RFC 4760)
    Unicast(NetworkPrefix),
    /// Labeled unicast (RFC 8277)
    Labeled {
        prefix: NetworkPrefix,
        labels: LabelStack,
    },
    /// VPN-IPv4/VPN-IPv6 (RFC 4364, RFC 4659)
    LabeledVpn {
        prefix: NetworkPrefix,
        labels: LabelStack,
        rd: RouteDistinguisher,
    },
    /// EVPN route type 5 (RFC 9136)
    EvpnIpPrefix(EvpnIpPrefixRoute),
    /// A family or EVPN route type we do not decode. The remaining NLRI of the attribute are
    /// skipped when the family is unknown, as their encoding cannot be guessed.
    Unsupported { afi: u16, safi: u8 },
}

/// EVPN IP Prefix route
///
/// ```text
/// +---------------------------------------+
/// |      RD (8 octets)                    |
/// +---------------------------------------+
/// |Ethernet Segment Identifier (10 octets)|
/// +---------------------------------------+
/// |  Ethernet Tag ID (4 octets)           |
/// +---------------------------------------+
/// |  IP Prefix Length (1 octet, 0 to 32)  |
/// +---------------------------------------+
/// |  IP Prefix (4 or 16 octets)           |
/// +---------------------------------------+
/// |  GW IP Address (4 or 16 octets)       |
/// +---------------------------------------+
/// |  MPLS Label (3 octets)                |
/// +---------------------------------------+
/// ```
#[derive(Debug, PartialEq, Clone, Eq)]
pub struct EvpnIpPrefixRoute {
    pub path_id: Option<u32>,
    pub rd: RouteDistinguisher,
    pub esi: [u8; 10],
    pub ethernet_tag: u32,
    pub prefix: IpNet,
    pub gateway: IpAddr,
    pub label: u32,
}
