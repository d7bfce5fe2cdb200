/*!
Provides IO utility functions for read bytes of different length and converting to corresponding structs.
*/
use ipnet::IpNet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::models::*;
use bytes::{Buf, Bytes};
use log::debug;

use crate::error::ParserError;
use crate::ParserError::IoNotEnoughBytes;

impl ReadUtils for Bytes {}

/// MPLS label value signalling a withdrawal (RFC 8277, Section 2.4).
const WITHDRAWN_LABEL: u32 = 0x800000;

// Allow reading IPs from Reads
pub trait ReadUtils: Buf {
    #[inline]
    fn has_n_remaining(&self, n: usize) -> Result<(), ParserError> {
        if self.remaining() < n {
            Err(IoNotEnoughBytes())
        } else {
            Ok(())
        }
    }

    #[inline]
    fn read_u8(&mut self) -> Result<u8, ParserError> {
        self.has_n_remaining(1)?;
        Ok(self.get_u8())
    }

    #[inline]
    fn read_u16(&mut self) -> Result<u16, ParserError> {
        self.has_n_remaining(2)?;
        Ok(self.get_u16())
    }

    #[inline]
    fn read_u24(&mut self) -> Result<u32, ParserError> {
        self.has_n_remaining(3)?;
        Ok(self.get_uint(3) as u32)
    }

    #[inline]
    fn read_u32(&mut self) -> Result<u32, ParserError> {
        self.has_n_remaining(4)?;
        Ok(self.get_u32())
    }

    #[inline]
    fn read_u64(&mut self) -> Result<u64, ParserError> {
        self.has_n_remaining(8)?;
        Ok(self.get_u64())
    }

    fn read_ipv4_address(&mut self) -> Result<Ipv4Addr, ParserError> {
        let addr = self.read_u32()?;
        Ok(Ipv4Addr::from(addr))
    }

    fn read_ipv6_address(&mut self) -> Result<Ipv6Addr, ParserError> {
        self.has_n_remaining(16)?;
        let buf = self.get_u128();
        Ok(Ipv6Addr::from(buf))
    }

    /// Read a 16-byte address field where IPv4 addresses are stored in the last 4 bytes.
    fn read_padded_address(&mut self, is_ipv6: bool) -> Result<IpAddr, ParserError> {
        match is_ipv6 {
            true => Ok(self.read_ipv6_address()?.into()),
            false => {
                self.has_n_remaining(16)?;
                self.advance(12);
                Ok(self.read_ipv4_address()?.into())
            }
        }
    }

    fn read_route_distinguisher(&mut self) -> Result<RouteDistinguisher, ParserError> {
        self.read_u64().map(RouteDistinguisher)
    }

    fn read_asns(&mut self, as_length: &AsnLength, count: usize) -> Result<Vec<u32>, ParserError> {
        self.has_n_remaining(count * as_length.bytes())?;
        let mut path = Vec::with_capacity(count);
        for _ in 0..count {
            path.push(match as_length {
                AsnLength::Bits16 => self.get_u16() as u32,
                AsnLength::Bits32 => self.get_u32(),
            });
        }
        Ok(path)
    }

    fn read_afi(&mut self) -> Result<Afi, ParserError> {
        Afi::try_from(self.read_u16()?).map_err(ParserError::from)
    }

    fn read_safi(&mut self) -> Result<Safi, ParserError> {
        Safi::try_from(self.read_u8()?).map_err(ParserError::from)
    }

    fn read_n_bytes(&mut self, n_bytes: usize) -> Result<Vec<u8>, ParserError> {
        self.has_n_remaining(n_bytes)?;
        Ok(self.copy_to_bytes(n_bytes).into())
    }

    fn read_n_bytes_to_string(&mut self, n_bytes: usize) -> Result<String, ParserError> {
        let buffer = self.read_n_bytes(n_bytes)?;
        Ok(buffer
            .into_iter()
            .map(|x: u8| x as char)
            .collect::<String>())
    }

    /// Read the address bytes of a prefix whose length in bits is already known.
    ///
    /// Only `(bit_len + 7) / 8` bytes are present on the wire; the rest is zero.
    fn read_prefix_bits(&mut self, afi: &Afi, bit_len: u8) -> Result<IpNet, ParserError> {
        let byte_len: usize = (bit_len as usize).div_ceil(8);
        let addr: IpAddr = match afi {
            Afi::Ipv4 => {
                if byte_len > 4 {
                    return Err(ParserError::ParseError(format!(
                        "Invalid byte length for IPv4 prefix. byte_len: {}, bit_len: {}",
                        byte_len, bit_len
                    )));
                }
                self.has_n_remaining(byte_len)?;
                let mut buff = [0; 4];
                self.copy_to_slice(&mut buff[..byte_len]);
                IpAddr::V4(Ipv4Addr::from(buff))
            }
            Afi::Ipv6 => {
                if byte_len > 16 {
                    return Err(ParserError::ParseError(format!(
                        "Invalid byte length for IPv6 prefix. byte_len: {}, bit_len: {}",
                        byte_len, bit_len
                    )));
                }
                self.has_n_remaining(byte_len)?;
                let mut buff = [0; 16];
                self.copy_to_slice(&mut buff[..byte_len]);
                IpAddr::V6(Ipv6Addr::from(buff))
            }
            Afi::L2vpn => {
                return Err(ParserError::ParseError(
                    "L2VPN is not an IP address family".to_string(),
                ))
            }
        };
        Ok(IpNet::new(addr, bit_len)?)
    }

    /// Read announced/withdrawn prefix.
    ///
    /// The length in bits is 1 byte, and then based on the IP version it reads different number of bytes.
    /// If the `add_path` is true, it will also first read a 4-byte path id first.
    fn read_nlri_prefix(&mut self, afi: &Afi, add_path: bool) -> Result<NetworkPrefix, ParserError> {
        let path_id = match add_path {
            true => Some(self.read_u32()?),
            false => None,
        };
        let bit_len = self.read_u8()?;
        let prefix = self.read_prefix_bits(afi, bit_len)?;
        Ok(NetworkPrefix::new(prefix, path_id))
    }

    /// Read an MPLS label stack, returning the labels and the number of bits consumed.
    ///
    /// The stack ends with the bottom-of-stack bit, or with the withdrawal label.
    fn read_label_stack(&mut self, max_bits: u8) -> Result<(LabelStack, u8), ParserError> {
        let mut labels = LabelStack::new();
        let mut consumed: u8 = 0;
        while consumed as u16 + 24 <= max_bits as u16 {
            let raw = self.read_u24()?;
            consumed += 24;
            if raw == WITHDRAWN_LABEL || raw == 0 {
                break;
            }
            labels.push(raw >> 4);
            if raw & 1 == 1 {
                break;
            }
        }
        Ok((labels, consumed))
    }
}

/// Parse a list of plain prefixes, as found in the Withdrawn Routes and NLRI fields of an
/// UPDATE message.
pub fn parse_nlri_list(
    mut input: Bytes,
    add_path: bool,
    afi: &Afi,
) -> Result<Vec<NetworkPrefix>, ParserError> {
    let mut prefixes = vec![];
    while input.remaining() > 0 {
        let prefix = input.read_nlri_prefix(afi, add_path)?;
        prefixes.push(prefix);
    }
    debug!("parsed {} prefixes", prefixes.len());
    Ok(prefixes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};

    #[test]
    fn test_read_fixed_sizes() {
        let mut data = Bytes::from_static(&[1, 0, 2, 0, 0, 3, 0, 0, 0, 4, 9]);
        assert_eq!(data.read_u8().unwrap(), 1);
        assert_eq!(data.read_u16().unwrap(), 2);
        assert_eq!(data.read_u24().unwrap(), 3);
        assert_eq!(data.read_u32().unwrap(), 4);
        assert!(data.read_u16().is_err());
    }

    #[test]
    fn test_read_padded_address() {
        let mut buf = BytesMut::new();
        buf.put_slice(&[0; 12]);
        buf.put_slice(&[192, 0, 2, 1]);
        let mut data = buf.freeze();
        assert_eq!(
            data.read_padded_address(false).unwrap(),
            IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))
        );
        assert_eq!(data.remaining(), 0);
    }

    #[test]
    fn test_parse_nlri_list() {
        // 192.168.144.0/21 and 10.0.0.0/8 with path ids
        let data = Bytes::from_static(&[0, 0, 0, 1, 21, 192, 168, 144, 0, 0, 0, 2, 8, 10]);
        let prefixes = parse_nlri_list(data, true, &Afi::Ipv4).unwrap();
        assert_eq!(
            prefixes,
            vec![
                NetworkPrefix::new("192.168.144.0/21".parse().unwrap(), Some(1)),
                NetworkPrefix::new("10.0.0.0/8".parse().unwrap(), Some(2)),
            ]
        );

        let data = Bytes::from_static(&[33, 10, 0, 0, 0, 0]);
        assert!(parse_nlri_list(data, false, &Afi::Ipv4).is_err());
    }

    #[test]
    fn test_read_label_stack() {
        // two labels, 16 and 17 with bottom-of-stack on the second
        let mut data = Bytes::from_static(&[0, 1, 0, 0, 1, 0x11]);
        let (labels, consumed) = data.read_label_stack(64).unwrap();
        assert_eq!(labels.as_slice(), &[16, 17]);
        assert_eq!(consumed, 48);

        let mut data = Bytes::from_static(&[0x80, 0, 0]);
        let (labels, consumed) = data.read_label_stack(64).unwrap();
        assert!(labels.is_empty());
        assert_eq!(consumed, 24);
    }
}
