use crate::models::*;
use crate::parser::ReadUtils;
use crate::ParserError;
use bytes::{Buf, Bytes};
use std::net::IpAddr;

pub fn parse_next_hop(mut input: Bytes) -> Result<AttributeValue, ParserError> {
    let next_hop: IpAddr = match input.len() {
        4 => input.read_ipv4_address()?.into(),
        16 => input.read_ipv6_address()?.into(),
        v => {
            return Err(ParserError::ParseError(format!(
                "Invalid next hop length found: {v}"
            )))
        }
    };
    Ok(AttributeValue::NextHop(next_hop))
}

/// Parse the next hop field of an `MP_REACH_NLRI` attribute.
///
/// Only the first address is kept. VPN next hops are prefixed with a route distinguisher that
/// is always zero (RFC 4364, RFC 4659) and is skipped.
pub fn parse_mp_next_hop(mut input: Bytes) -> Result<Option<IpAddr>, ParserError> {
    let output = match input.len() {
        0 => None,
        4 => Some(input.read_ipv4_address()?.into()),
        // global + link-local
        16 | 32 => Some(input.read_ipv6_address()?.into()),
        12 => {
            input.advance(8);
            Some(input.read_ipv4_address()?.into())
        }
        24 | 48 => {
            input.advance(8);
            Some(input.read_ipv6_address()?.into())
        }
        v => {
            return Err(ParserError::ParseError(format!(
                "Invalid next hop length found: {v}"
            )));
        }
    };
    Ok(output)
}
