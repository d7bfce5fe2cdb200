use crate::models::*;
use bytes::{Buf, Bytes};

use crate::error::ParserError;
use crate::parser::bgp::attributes::AttributeParser;
use crate::parser::{parse_nlri_list, ReadUtils};
use log::{debug, warn};

const BGP_HEADER_LEN: u16 = 19;
const BGP_MAX_MESSAGE_LEN: u16 = 4096;
const OPT_PARAM_CAPABILITY: u8 = 2;
/// RFC 9072 extended optional parameters length marker
const OPT_PARAM_EXTENDED: u8 = 255;

/// BGP message
///
/// Format:
/// ```text
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// +                                                               +
/// |                                                               |
/// +                                                               +
/// |                           Marker                              |
/// +                                                               +
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |          Length               |      Type     |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Exactly one message is consumed from `data`; BMP Peer Up notifications carry two OPEN
/// messages back to back.
pub fn parse_bgp_message(
    data: &mut Bytes,
    add_path: &AddPathOptions,
    asn_len: &AsnLength,
) -> Result<BgpMessage, ParserError> {
    // https://tools.ietf.org/html/rfc4271#section-4
    // 16 (4 x 4 bytes) octets marker
    data.has_n_remaining(BGP_HEADER_LEN as usize)?;
    data.advance(16);
    /*
     This 2-octet unsigned integer indicates the total length of the
     message, including the header in octets.  Thus, it allows one
     to locate the (Marker field of the) next message in the TCP
     stream.  The value of the Length field MUST always be at least
     19 and no greater than 4096, and MAY be further constrained,
     depending on the message type.
    */
    let length = data.read_u16()?;
    if !(BGP_HEADER_LEN..=BGP_MAX_MESSAGE_LEN).contains(&length) {
        return Err(ParserError::ParseError(format!(
            "invalid BGP message length {}",
            length
        )));
    }
    let msg_type = BgpMessageType::try_from(data.read_u8()?)?;

    let bgp_msg_length = (length - BGP_HEADER_LEN) as usize;
    if data.remaining() < bgp_msg_length {
        return Err(ParserError::TruncatedMsg(format!(
            "Truncated message: {} bytes available, {} bytes to read",
            data.remaining(),
            bgp_msg_length
        )));
    }
    // make sure we don't read over the bound
    let msg_data = data.split_to(bgp_msg_length);

    Ok(match msg_type {
        BgpMessageType::OPEN => BgpMessage::Open(parse_bgp_open_message(msg_data)?),
        BgpMessageType::UPDATE => {
            BgpMessage::Update(parse_bgp_update_message(msg_data, add_path, asn_len)?)
        }
        BgpMessageType::NOTIFICATION => {
            BgpMessage::Notification(parse_bgp_notification_message(msg_data)?)
        }
        BgpMessageType::KEEPALIVE => BgpMessage::KeepAlive,
    })
}

pub fn parse_bgp_notification_message(
    mut input: Bytes,
) -> Result<BgpNotificationMessage, ParserError> {
    let error_code = input.read_u8()?;
    let error_subcode = input.read_u8()?;
    Ok(BgpNotificationMessage {
        error_code,
        error_subcode,
    })
}

pub fn parse_bgp_open_message(mut input: Bytes) -> Result<BgpOpenMessage, ParserError> {
    let version = input.read_u8()?;
    let mut asn = input.read_u16()? as u32;
    let hold_time = input.read_u16()?;
    let bgp_identifier = input.read_ipv4_address()?;
    let mut opt_params_len = input.read_u8()? as usize;

    // https://datatracker.ietf.org/doc/html/rfc9072#section-2
    let mut extended_length = false;
    if opt_params_len == OPT_PARAM_EXTENDED as usize
        && input.first() == Some(&OPT_PARAM_EXTENDED)
    {
        input.advance(1);
        opt_params_len = input.read_u16()? as usize;
        extended_length = true;
    }
    input.has_n_remaining(opt_params_len)?;
    let mut params = input.split_to(opt_params_len);

    let mut capabilities = vec![];
    while params.has_remaining() {
        let param_type = params.read_u8()?;
        let param_length = match extended_length {
            true => params.read_u16()? as usize,
            false => params.read_u8()? as usize,
        };
        params.has_n_remaining(param_length)?;
        let mut param_value = params.split_to(param_length);

        // https://tools.ietf.org/html/rfc3392
        if param_type != OPT_PARAM_CAPABILITY {
            debug!("skipping OPEN optional parameter type {}", param_type);
            continue;
        }
        // one parameter may hold several capabilities
        while param_value.has_remaining() {
            let code = param_value.read_u8()?;
            let len = param_value.read_u8()? as usize;
            param_value.has_n_remaining(len)?;
            let value = param_value.split_to(len);
            match Capability::parse(code, value) {
                Ok(capability) => capabilities.push(capability),
                Err(e) => warn!("ignoring malformed capability {}: {}", code, e),
            }
        }
    }

    for capability in &capabilities {
        if let Capability::FourOctetAs(four_octet_asn) = capability {
            asn = *four_octet_asn;
        }
    }

    Ok(BgpOpenMessage {
        version,
        asn,
        hold_time,
        bgp_identifier,
        capabilities,
    })
}

/// read nlri portion of a bgp update message.
fn read_nlri(input: Bytes, afi: &Afi, add_path: bool) -> Result<Vec<NetworkPrefix>, ParserError> {
    let length = input.len();
    if length == 0 {
        return Ok(vec![]);
    }
    if length == 1 {
        // 1 byte does not make sense
        warn!("seeing strange one-byte NLRI field");
        return Ok(vec![]);
    }

    parse_nlri_list(input, add_path, afi)
}

/// read bgp update message.
pub fn parse_bgp_update_message(
    mut input: Bytes,
    add_path: &AddPathOptions,
    asn_len: &AsnLength,
) -> Result<BgpUpdateMessage, ParserError> {
    // AFI for routes out side attributes are IPv4 ONLY.
    let afi = Afi::Ipv4;
    let ipv4_add_path = add_path.contains(Afi::Ipv4, Safi::Unicast);

    // parse withdrawn prefixes nlri
    let withdrawn_bytes_length = input.read_u16()? as usize;
    input.has_n_remaining(withdrawn_bytes_length)?;
    let withdrawn_bytes = input.split_to(withdrawn_bytes_length);
    let withdrawn_prefixes = read_nlri(withdrawn_bytes, &afi, ipv4_add_path)?;

    // parse attributes
    let attribute_length = input.read_u16()? as usize;
    let attr_parser = AttributeParser::new(add_path);
    input.has_n_remaining(attribute_length)?;
    let attr_data_slice = input.split_to(attribute_length);
    let attributes = attr_parser.parse_attributes(attr_data_slice, asn_len)?;

    // parse announced prefixes nlri.
    // the remaining bytes are announced prefixes.
    let announced_prefixes = read_nlri(input, &afi, ipv4_add_path)?;

    Ok(BgpUpdateMessage {
        withdrawn_prefixes,
        attributes,
        announced_prefixes,
    })
}
