use crate::models::*;
use crate::parser::bmp::error::ParserBmpError;
use crate::parser::ReadUtils;
use bytes::{Buf, Bytes};
use num_enum::{FromPrimitive, IntoPrimitive};
use std::fmt::{Display, Formatter};
use std::net::{IpAddr, Ipv4Addr};

/// The only BMP version this collector speaks (RFC 7854).
pub const BMP_VERSION: u8 = 3;
pub const BMP_COMMON_HEADER_LEN: usize = 6;
pub const BMP_PER_PEER_HEADER_LEN: usize = 42;

/// BMP message type enum.
///
/// ```text
///    o  Message Type (1 byte): This identifies the type of the BMP
///       message.  A BMP implementation MUST ignore unrecognized message
///       types upon receipt.
///
///       *  Type = 0: Route Monitoring
///       *  Type = 1: Statistics Report
///       *  Type = 2: Peer Down Notification
///       *  Type = 3: Peer Up Notification
///       *  Type = 4: Initiation Message
///       *  Type = 5: Termination Message
///       *  Type = 6: Route Mirroring Message
/// ```
#[derive(Debug, FromPrimitive, IntoPrimitive, PartialEq, Eq, Hash, Clone, Copy)]
#[repr(u8)]
pub enum BmpMsgType {
    RouteMonitoring = 0,
    StatisticsReport = 1,
    PeerDownNotification = 2,
    PeerUpNotification = 3,
    InitiationMessage = 4,
    TerminationMessage = 5,
    RouteMirroringMessage = 6,
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl BmpMsgType {
    /// Whether a per-peer header follows the common header.
    pub const fn has_per_peer_header(&self) -> bool {
        !matches!(
            self,
            BmpMsgType::InitiationMessage | BmpMsgType::TerminationMessage | BmpMsgType::Unknown(_)
        )
    }
}

impl Display for BmpMsgType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BmpMsgType::RouteMonitoring => "route-monitoring",
            BmpMsgType::StatisticsReport => "statistics-report",
            BmpMsgType::PeerDownNotification => "peer-down-notification",
            BmpMsgType::PeerUpNotification => "peer-up-notification",
            BmpMsgType::InitiationMessage => "initiation",
            BmpMsgType::TerminationMessage => "termination",
            BmpMsgType::RouteMirroringMessage => "route-mirroring",
            BmpMsgType::Unknown(_) => "unknown",
        };
        f.write_str(label)
    }
}

/// BMP Common Header
///
/// ```text
///       0                   1                   2                   3
///       0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///      +-+-+-+-+-+-+-+-+
///      |    Version    |
///      +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///      |                        Message Length                         |
///      +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///      |   Msg. Type   |
///      +---------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BmpCommonHeader {
    pub version: u8,
    /// Length of the whole message, common header included.
    pub msg_len: u32,
    pub msg_type: BmpMsgType,
}

pub fn parse_bmp_common_header(data: &mut Bytes) -> Result<BmpCommonHeader, ParserBmpError> {
    let version = data.read_u8()?;
    if version != BMP_VERSION {
        // has to be 3 per rfc7854
        return Err(ParserBmpError::UnsupportedBmpVersion(version));
    }

    let msg_len = data.read_u32()?;
    if (msg_len as usize) < BMP_COMMON_HEADER_LEN {
        return Err(ParserBmpError::InvalidMessageLength(msg_len));
    }

    let msg_type = BmpMsgType::from(data.read_u8()?);
    Ok(BmpCommonHeader {
        version,
        msg_len,
        msg_type,
    })
}

/// BMP Per-peer Header
///
/// ```text
///       0                   1                   2                   3
///       0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///      +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///      |   Peer Type   |  Peer Flags   |
///      +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///      |         Peer Distinguisher (present based on peer type)       |
///      |                                                               |
///      +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///      |                 Peer Address (16 bytes)                       |
///      ~                                                               ~
///      +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///      |                           Peer AS                             |
///      +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///      |                         Peer BGP ID                           |
///      +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///      |                    Timestamp (seconds)                        |
///      +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///      |                  Timestamp (microseconds)                     |
///      +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BmpPerPeerHeader {
    pub peer_type: PeerType,
    pub peer_flags: u8,
    pub peer_distinguisher: RouteDistinguisher,
    pub peer_ip: IpAddr,
    pub peer_asn: u32,
    pub peer_bgp_id: Ipv4Addr,
    pub timestamp: f64,
    pub afi: Afi,
    pub asn_len: AsnLength,
}

impl BmpPerPeerHeader {
    /// Peers of an RD instance carry VPN routes whose RD is checked per prefix.
    pub fn is_l3vpn(&self) -> bool {
        self.peer_type == PeerType::RD
    }
}

#[derive(Debug, FromPrimitive, IntoPrimitive, PartialEq, Eq, Hash, Clone, Copy)]
#[repr(u8)]
pub enum PeerType {
    Global = 0,
    RD = 1,
    Local = 2,
    /// RFC 9069
    LocalRib = 3,
    #[num_enum(catch_all)]
    Unknown(u8),
}

pub fn parse_per_peer_header(data: &mut Bytes) -> Result<BmpPerPeerHeader, ParserBmpError> {
    data.has_n_remaining(BMP_PER_PEER_HEADER_LEN)?;
    let peer_type = PeerType::from(data.read_u8()?);

    let peer_flags = data.read_u8()?;

    let peer_distinguisher = data.read_route_distinguisher()?;

    let (is_router_ipv6, is_2byte_asn) = (peer_flags & 0x80 > 0, peer_flags & 0x20 > 0);

    let afi = match is_router_ipv6 {
        true => Afi::Ipv6,
        false => Afi::Ipv4,
    };

    let asn_len = match is_2byte_asn {
        true => AsnLength::Bits16,
        false => AsnLength::Bits32,
    };

    let peer_ip = data.read_padded_address(is_router_ipv6)?;

    // the peer AS field is always 4 bytes long
    let peer_asn: u32 = if is_2byte_asn {
        data.advance(2);
        data.read_u16()? as u32
    } else {
        data.read_u32()?
    };

    let peer_bgp_id = data.read_ipv4_address()?;

    let t_sec = data.read_u32()?;
    let t_usec = data.read_u32()?;
    let timestamp = t_sec as f64 + (t_usec as f64) / 1_000_000.0;

    Ok(BmpPerPeerHeader {
        peer_type,
        peer_flags,
        peer_distinguisher,
        peer_ip,
        peer_asn,
        peer_bgp_id,
        timestamp,
        afi,
        asn_len,
    })
}
