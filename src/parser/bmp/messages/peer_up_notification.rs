use crate::models::*;
use crate::parser::bgp::parse_bgp_message;
use crate::parser::bmp::error::ParserBmpError;
use crate::parser::ReadUtils;
use crate::ParserError;
use bytes::Bytes;
use std::net::IpAddr;

/// Peer Up notification. Trailing information TLVs are not decoded.
///
/// Either OPEN message may be missing from a truncated notification.
///
/// <https://www.rfc-editor.org/rfc/rfc7854#section-4.10>
#[derive(Debug, PartialEq, Clone)]
pub struct PeerUpNotification {
    pub local_addr: IpAddr,
    pub local_port: u16,
    pub remote_port: u16,
    /// OPEN message sent by the monitored router.
    pub sent_open: Option<BgpOpenMessage>,
    /// OPEN message received from the peer.
    pub received_open: Option<BgpOpenMessage>,
}

impl PeerUpNotification {
    /// Families for which the peer's routes carry an ADD-PATH path identifier, when both OPEN
    /// messages are present.
    pub fn add_path_options(&self) -> Option<AddPathOptions> {
        match (&self.sent_open, &self.received_open) {
            (Some(sent), Some(received)) => Some(AddPathOptions::negotiate(sent, received)),
            _ => None,
        }
    }
}

fn parse_open(
    data: &mut Bytes,
    asn_len: &AsnLength,
) -> Result<Option<BgpOpenMessage>, ParserBmpError> {
    if data.is_empty() {
        return Ok(None);
    }
    match parse_bgp_message(data, &AddPathOptions::default(), asn_len)? {
        BgpMessage::Open(open) => Ok(Some(open)),
        other => Err(ParserError::ParseError(format!(
            "expected BGP OPEN message in peer up notification, found {:?}",
            other
        ))
        .into()),
    }
}

pub fn parse_peer_up_notification(
    data: &mut Bytes,
    afi: &Afi,
    asn_len: &AsnLength,
) -> Result<PeerUpNotification, ParserBmpError> {
    let local_addr = data.read_padded_address(*afi == Afi::Ipv6)?;
    let local_port = data.read_u16()?;
    let remote_port = data.read_u16()?;

    let sent_open = parse_open(data, asn_len)?;
    let received_open = parse_open(data, asn_len)?;

    Ok(PeerUpNotification {
        local_addr,
        local_port,
        remote_port,
        sent_open,
        received_open,
    })
}
