use crate::models::*;
use crate::parser::bgp::attributes::attr_03_next_hop::parse_mp_next_hop;
use crate::parser::{parse_nlri_list, ReadUtils};
use crate::ParserError;
use bytes::{Buf, Bytes};
use log::{debug, warn};

/// EVPN route type carrying an IP prefix (RFC 9136).
const EVPN_IP_PREFIX_ROUTE: u8 = 5;
const EVPN_IP_PREFIX_V4_LEN: usize = 34;
const EVPN_IP_PREFIX_V6_LEN: usize = 58;

///
/// <https://datatracker.ietf.org/doc/html/rfc4760#section-3>
/// The attribute is encoded as shown below:
/// +---------------------------------------------------------+
/// | Address Family Identifier (2 octets)                    |
/// +---------------------------------------------------------+
/// | Subsequent Address Family Identifier (1 octet)          |
/// +---------------------------------------------------------+
/// | Length of Next Hop Network Address (1 octet)            |
/// +---------------------------------------------------------+
/// | Network Address of Next Hop (variable)                  |
/// +---------------------------------------------------------+
/// | Reserved (1 octet)                                      |
/// +---------------------------------------------------------+
/// | Network Layer Reachability Information (variable)       |
/// +---------------------------------------------------------+
///
/// `MP_UNREACH_NLRI` has the same layout without the next hop and reserved fields.
pub fn parse_nlri(
    mut input: Bytes,
    reachable: bool, // whether the NLRI is announcements or withdrawals
    add_path: &AddPathOptions,
) -> Result<AttributeValue, ParserError> {
    let afi = input.read_u16()?;
    let safi = input.read_u8()?;

    let mut next_hop = None;
    if reachable {
        let next_hop_length = input.read_u8()? as usize;
        input.has_n_remaining(next_hop_length)?;
        let next_hop_bytes = input.split_to(next_hop_length);
        next_hop = parse_mp_next_hop(next_hop_bytes)?;

        // skip reserved byte for reachable NRLI
        if input.read_u8()? != 0 {
            warn!("NRLI reserved byte not 0");
        }
    }

    let prefixes = parse_mp_prefixes(input, afi, safi, add_path.contains_raw(afi, safi))?;
    let nlri = MpNlri {
        afi,
        safi,
        next_hop,
        prefixes,
    };
    match reachable {
        true => Ok(AttributeValue::MpReachNlri(nlri)),
        false => Ok(AttributeValue::MpUnreachNlri(nlri)),
    }
}

fn parse_mp_prefixes(
    mut input: Bytes,
    afi: u16,
    safi: u8,
    add_path: bool,
) -> Result<Vec<NlriPrefix>, ParserError> {
    let family = match (Afi::try_from(afi), Safi::try_from(safi)) {
        (Ok(afi), Ok(safi)) => RouteFamily::from_afi_safi(afi, safi),
        _ => None,
    };
    let Some(family) = family else {
        // the encoding of the remaining bytes is unknown, keep a marker so the family is counted
        debug!("skipping NLRI of {}", family_label(afi, safi));
        return Ok(match input.has_remaining() {
            true => vec![NlriPrefix::Unsupported { afi, safi }],
            false => vec![],
        });
    };

    let ip_afi = family.afi();
    let mut prefixes = vec![];
    match family {
        RouteFamily::Ipv4Unicast | RouteFamily::Ipv6Unicast => {
            prefixes.extend(
                parse_nlri_list(input, add_path, &ip_afi)?
                    .into_iter()
                    .map(NlriPrefix::Unicast),
            );
        }
        RouteFamily::Ipv4LabeledUnicast | RouteFamily::Ipv6LabeledUnicast => {
            while input.has_remaining() {
                let path_id = read_path_id(&mut input, add_path)?;
                let bit_len = input.read_u8()?;
                let (labels, consumed) = input.read_label_stack(bit_len)?;
                let prefix = input.read_prefix_bits(&ip_afi, remaining_bits(bit_len, consumed)?)?;
                prefixes.push(NlriPrefix::Labeled {
                    prefix: NetworkPrefix::new(prefix, path_id),
                    labels,
                });
            }
        }
        RouteFamily::Ipv4Vpn | RouteFamily::Ipv6Vpn => {
            while input.has_remaining() {
                let path_id = read_path_id(&mut input, add_path)?;
                let bit_len = input.read_u8()?;
                let (labels, consumed) = input.read_label_stack(bit_len)?;
                let rd = input.read_route_distinguisher()?;
                let prefix_len = remaining_bits(remaining_bits(bit_len, consumed)?, 64)?;
                let prefix = input.read_prefix_bits(&ip_afi, prefix_len)?;
                prefixes.push(NlriPrefix::LabeledVpn {
                    prefix: NetworkPrefix::new(prefix, path_id),
                    labels,
                    rd,
                });
            }
        }
        RouteFamily::Evpn => {
            while input.has_remaining() {
                let path_id = read_path_id(&mut input, add_path)?;
                let route_type = input.read_u8()?;
                let length = input.read_u8()? as usize;
                input.has_n_remaining(length)?;
                let route = input.split_to(length);
                match route_type {
                    EVPN_IP_PREFIX_ROUTE => prefixes.push(NlriPrefix::EvpnIpPrefix(
                        parse_evpn_ip_prefix(route, path_id)?,
                    )),
                    _ => {
                        debug!("skipping EVPN route type {}", route_type);
                        prefixes.push(NlriPrefix::Unsupported { afi, safi });
                    }
                }
            }
        }
    }
    Ok(prefixes)
}

#[inline]
fn read_path_id(input: &mut Bytes, add_path: bool) -> Result<Option<u32>, ParserError> {
    match add_path {
        true => Ok(Some(input.read_u32()?)),
        false => Ok(None),
    }
}

#[inline]
fn remaining_bits(bit_len: u8, consumed: u8) -> Result<u8, ParserError> {
    bit_len.checked_sub(consumed).ok_or_else(|| {
        ParserError::ParseError(format!(
            "NLRI length {} shorter than its {} bits of labels and RD",
            bit_len, consumed
        ))
    })
}

fn parse_evpn_ip_prefix(
    mut input: Bytes,
    path_id: Option<u32>,
) -> Result<EvpnIpPrefixRoute, ParserError> {
    let afi = match input.len() {
        EVPN_IP_PREFIX_V4_LEN => Afi::Ipv4,
        EVPN_IP_PREFIX_V6_LEN => Afi::Ipv6,
        v => {
            return Err(ParserError::ParseError(format!(
                "Invalid EVPN IP prefix route length: {v}"
            )))
        }
    };
    let rd = input.read_route_distinguisher()?;
    let mut esi = [0u8; 10];
    input.has_n_remaining(esi.len())?;
    input.copy_to_slice(&mut esi);
    let ethernet_tag = input.read_u32()?;
    let bit_len = input.read_u8()?;
    let (prefix, gateway) = match afi {
        Afi::Ipv4 => {
            let mut addr = input.split_to(4);
            let prefix = addr.read_prefix_bits(&afi, bit_len)?;
            (prefix, input.read_ipv4_address()?.into())
        }
        _ => {
            let mut addr = input.split_to(16);
            let prefix = addr.read_prefix_bits(&afi, bit_len)?;
            (prefix, input.read_ipv6_address()?.into())
        }
    };
    let label = input.read_u24()? >> 4;
    Ok(EvpnIpPrefixRoute {
        path_id,
        rd,
        esi,
        ethernet_tag,
        prefix,
        gateway,
        label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_parsing_nlri_simple() {
        let test_bytes = Bytes::from(vec![
            0x00, 0x01, // address family: IPv4
            0x01, // safi: unicast
            0x04, // next hop length: 4
            0xC0, 0x00, 0x02, 0x01, // next hop: 192.0.2.1
            0x00, // reserved
            // NLRI
            0x18, // 24 bits prefix length
            0xC0, 0x00, 0x02, // 192.0.2
        ]);
        let res = parse_nlri(test_bytes, true, &AddPathOptions::default()).unwrap();
        let AttributeValue::MpReachNlri(nlri) = res else {
            panic!("Unexpected result: {:?}", res);
        };
        assert_eq!(nlri.afi, 1);
        assert_eq!(nlri.safi, 1);
        assert_eq!(
            nlri.next_hop,
            Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)))
        );
        assert_eq!(
            nlri.prefixes,
            vec![NlriPrefix::Unicast(NetworkPrefix::new(
                "192.0.2.0/24".parse().unwrap(),
                None
            ))]
        );
    }

    #[test]
    fn test_parsing_unreach_add_path() {
        let test_bytes = Bytes::from(vec![
            0x00, 0x02, // address family: IPv6
            0x01, // safi: unicast
            0x00, 0x00, 0x00, 0x07, // path id
            0x20, // 32 bits prefix length
            0x20, 0x01, 0x0d, 0xb8,
        ]);
        let mut add_path = AddPathOptions::default();
        add_path.insert(Afi::Ipv6, Safi::Unicast);
        let res = parse_nlri(test_bytes, false, &add_path).unwrap();
        let AttributeValue::MpUnreachNlri(nlri) = res else {
            panic!("Unexpected result: {:?}", res);
        };
        assert_eq!(nlri.next_hop, None);
        assert_eq!(
            nlri.prefixes,
            vec![NlriPrefix::Unicast(NetworkPrefix::new(
                "2001:db8::/32".parse().unwrap(),
                Some(7)
            ))]
        );
    }

    #[test]
    fn test_parsing_vpn_nlri() {
        let mut buf = BytesMut::new();
        buf.put_u16(1); // IPv4
        buf.put_u8(128); // MPLS VPN
        buf.put_u8(12);
        buf.put_u64(0); // next hop RD
        buf.put_slice(&[192, 0, 2, 1]);
        buf.put_u8(0);
        buf.put_u8(24 + 64 + 24); // label + RD + /24
        buf.put_slice(&[0x00, 0x10, 0x01]); // label 256, bottom of stack
        buf.put_u16(0);
        buf.put_u16(65017);
        buf.put_u32(104);
        buf.put_slice(&[10, 1, 2]);

        let res = parse_nlri(buf.freeze(), true, &AddPathOptions::default()).unwrap();
        let AttributeValue::MpReachNlri(nlri) = res else {
            panic!("Unexpected result: {:?}", res);
        };
        assert_eq!(
            nlri.next_hop,
            Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)))
        );
        let NlriPrefix::LabeledVpn { prefix, labels, rd } = &nlri.prefixes[0] else {
            panic!("Unexpected prefix: {:?}", nlri.prefixes);
        };
        assert_eq!(prefix.prefix, "10.1.2.0/24".parse().unwrap());
        assert_eq!(labels.as_slice(), &[256]);
        assert_eq!(rd.to_string(), "65017:104");
    }

    #[test]
    fn test_parsing_labeled_withdraw() {
        let mut buf = BytesMut::new();
        buf.put_u16(2); // IPv6
        buf.put_u8(4); // labeled unicast
        buf.put_u8(24 + 48);
        buf.put_slice(&[0x80, 0x00, 0x00]); // withdrawal label
        buf.put_slice(&[0x20, 0x01, 0x0d, 0xb8, 0x00, 0x01]);

        let res = parse_nlri(buf.freeze(), false, &AddPathOptions::default()).unwrap();
        let AttributeValue::MpUnreachNlri(nlri) = res else {
            panic!("Unexpected result: {:?}", res);
        };
        assert_eq!(
            nlri.prefixes,
            vec![NlriPrefix::Labeled {
                prefix: NetworkPrefix::new("2001:db8:1::/48".parse().unwrap(), None),
                labels: LabelStack::new(),
            }]
        );
    }

    #[test]
    fn test_parsing_evpn() {
        let mut buf = BytesMut::new();
        buf.put_u16(25); // L2VPN
        buf.put_u8(70); // EVPN
        buf.put_u8(4);
        buf.put_slice(&[192, 0, 2, 1]);
        buf.put_u8(0);
        // type 5, IPv4
        buf.put_u8(5);
        buf.put_u8(34);
        buf.put_u16(1);
        buf.put_slice(&[192, 0, 2, 1]);
        buf.put_u16(7);
        buf.put_slice(&[0; 10]); // ESI
        buf.put_u32(0); // ethernet tag
        buf.put_u8(24);
        buf.put_slice(&[198, 51, 100, 0]);
        buf.put_slice(&[0, 0, 0, 0]); // gateway
        buf.put_slice(&[0x00, 0x06, 0x41]); // label 100
        // type 2, not decoded
        buf.put_u8(2);
        buf.put_u8(3);
        buf.put_slice(&[1, 2, 3]);

        let res = parse_nlri(buf.freeze(), true, &AddPathOptions::default()).unwrap();
        let AttributeValue::MpReachNlri(nlri) = res else {
            panic!("Unexpected result: {:?}", res);
        };
        assert_eq!(nlri.prefixes.len(), 2);
        let NlriPrefix::EvpnIpPrefix(route) = &nlri.prefixes[0] else {
            panic!("Unexpected prefix: {:?}", nlri.prefixes);
        };
        assert_eq!(route.rd.to_string(), "192.0.2.1:7");
        assert_eq!(route.prefix, "198.51.100.0/24".parse().unwrap());
        assert_eq!(route.label, 100);
        assert_eq!(
            nlri.prefixes[1],
            NlriPrefix::Unsupported { afi: 25, safi: 70 }
        );
    }

    #[test]
    fn test_parsing_unknown_family() {
        let test_bytes = Bytes::from(vec![0x00, 0x01, 0x02, 0x00, 0x00, 0x18, 10, 0, 0]);
        let res = parse_nlri(test_bytes, true, &AddPathOptions::default()).unwrap();
        let AttributeValue::MpReachNlri(nlri) = res else {
            panic!("Unexpected result: {:?}", res);
        };
        assert_eq!(
            nlri.prefixes,
            vec![NlriPrefix::Unsupported { afi: 1, safi: 2 }]
        );
    }
}
