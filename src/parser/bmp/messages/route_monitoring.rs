use crate::models::*;
use crate::parser::bgp::messages::parse_bgp_message;
use crate::parser::bmp::error::ParserBmpError;
use bytes::Bytes;

#[derive(Debug)]
pub struct RouteMonitoring {
    pub bgp_message: BgpMessage,
}

pub fn parse_route_monitoring(
    data: &mut Bytes,
    add_path: &AddPathOptions,
    asn_len: &AsnLength,
) -> Result<RouteMonitoring, ParserBmpError> {
    let bgp_message = parse_bgp_message(data, add_path, asn_len)?;
    Ok(RouteMonitoring { bgp_message })
}
