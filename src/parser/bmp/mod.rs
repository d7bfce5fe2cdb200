/*!
Provides parsing for BMP messages received from monitored routers.
*/
use crate::models::AddPathOptions;
use crate::parser::bmp::error::ParserBmpError;
use crate::parser::bmp::messages::*;
use bytes::Bytes;

pub mod codec;
pub mod error;
pub mod messages;

pub use codec::{BmpCodec, BmpFrame};

/// Parse the body of a BMP message once its per-peer header, if any, has been consumed.
///
/// `add_path` holds the families for which the peer's UPDATE messages carry path identifiers.
pub fn parse_bmp_body(
    msg_type: BmpMsgType,
    per_peer_header: Option<&BmpPerPeerHeader>,
    data: &mut Bytes,
    add_path: &AddPathOptions,
) -> Result<MessageBody, ParserBmpError> {
    let body = match (msg_type, per_peer_header) {
        (BmpMsgType::InitiationMessage, _) => {
            MessageBody::InitiationMessage(parse_initiation_message(data)?)
        }
        (BmpMsgType::TerminationMessage, _) => {
            MessageBody::TerminationMessage(parse_termination_message(data)?)
        }
        (BmpMsgType::RouteMonitoring, Some(peer)) => MessageBody::RouteMonitoring(
            parse_route_monitoring(data, add_path, &peer.asn_len)?,
        ),
        (BmpMsgType::PeerUpNotification, Some(peer)) => MessageBody::PeerUpNotification(
            parse_peer_up_notification(data, &peer.afi, &peer.asn_len)?,
        ),
        (BmpMsgType::PeerDownNotification, Some(_)) => {
            MessageBody::PeerDownNotification(parse_peer_down_notification(data)?)
        }
        (BmpMsgType::RouteMonitoring, None)
        | (BmpMsgType::PeerUpNotification, None)
        | (BmpMsgType::PeerDownNotification, None) => {
            return Err(ParserBmpError::CorruptedBmpMessage)
        }
        _ => MessageBody::Ignored,
    };
    Ok(body)
}
