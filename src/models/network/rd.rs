use crate::error::ParserError;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Route Distinguisher, kept in its 8-byte wire form.
///
/// ```text
///  +-------+-------------------------------+
///  | Type  |            Value              |
///  |  (2)  |             (6)               |
///  +-------+-------------------------------+
///   type 0: 2-octet ASN (2) + 4-octet index
///   type 1: IPv4 address (4) + 2-octet index
///   type 2: 4-octet ASN (4) + 2-octet index
/// ```
///
/// Zero is the global, non-VPN space.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteDistinguisher(pub u64);

impl RouteDistinguisher {
    pub const fn rd_type(&self) -> u16 {
        (self.0 >> 48) as u16
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for RouteDistinguisher {
    fn from(value: u64) -> Self {
        RouteDistinguisher(value)
    }
}

impl From<[u8; 8]> for RouteDistinguisher {
    fn from(value: [u8; 8]) -> Self {
        RouteDistinguisher(u64::from_be_bytes(value))
    }
}

fn rd_error(input: &str, what: &str) -> ParserError {
    ParserError::ParseError(format!("cannot parse RD {:?} as {}", input, what))
}

impl FromStr for RouteDistinguisher {
    type Err = ParserError;

    /// Accepts `asn:index`, `a.b.c.d:index`, `type:admin:index` or a bare 64-bit integer.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let elems: Vec<&str> = s.split(':').collect();
        let (rd_type, admin, index) = match elems.as_slice() {
            [value] => {
                return value
                    .parse::<u64>()
                    .map(RouteDistinguisher)
                    .map_err(|_| rd_error(s, "a 64-bit number"));
            }
            [admin, index] => (None, *admin, *index),
            [rd_type, admin, index] => {
                let rd_type = rd_type
                    .parse::<u8>()
                    .ok()
                    .filter(|t| *t <= 2)
                    .ok_or_else(|| rd_error(s, "a known RD type"))?;
                (Some(rd_type), *admin, *index)
            }
            _ => return Err(rd_error(s, "a route distinguisher")),
        };

        if rd_type == Some(1) || (rd_type.is_none() && admin.contains('.')) {
            let ip = admin
                .parse::<Ipv4Addr>()
                .map_err(|_| rd_error(s, "IPv4 address + index"))?;
            let index = index
                .parse::<u16>()
                .map_err(|_| rd_error(s, "IPv4 address + index"))?;
            return Ok(RouteDistinguisher(
                (1 << 48) | ((u32::from(ip) as u64) << 16) | index as u64,
            ));
        }

        let asn = admin
            .parse::<u32>()
            .map_err(|_| rd_error(s, "ASN + index"))?;
        let index = index
            .parse::<u32>()
            .map_err(|_| rd_error(s, "ASN + index"))?;
        if rd_type == Some(0) && asn > 65535 {
            return Err(rd_error(s, "ASN2 + index"));
        }
        if asn <= 65535 && rd_type != Some(2) {
            return Ok(RouteDistinguisher(((asn as u64) << 32) | index as u64));
        }
        if index > 65535 {
            return Err(rd_error(s, "ASN4 + index"));
        }
        Ok(RouteDistinguisher(
            (2 << 48) | ((asn as u64) << 16) | index as u64,
        ))
    }
}

impl Display for RouteDistinguisher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let remaining = self.0 & 0xffff_ffff_ffff;
        match self.rd_type() {
            0 => write!(f, "{}:{}", (remaining >> 32) & 0xffff, remaining & 0xffff_ffff),
            1 => write!(
                f,
                "{}:{}",
                Ipv4Addr::from(((remaining >> 16) & 0xffff_ffff) as u32),
                remaining & 0xffff
            ),
            2 => {
                let asn = (remaining >> 16) & 0xffff_ffff;
                if asn <= 65535 {
                    write!(f, "2:{}:{}", asn, remaining & 0xffff)
                } else {
                    write!(f, "{}:{}", asn, remaining & 0xffff)
                }
            }
            other => write!(f, "{}:{:#x}", other, remaining),
        }
    }
}

struct RouteDistinguisherVisitor;

impl Visitor<'_> for RouteDistinguisherVisitor {
    type Value = RouteDistinguisher;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a route distinguisher as a string or a 64-bit integer")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(RouteDistinguisher(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map(RouteDistinguisher)
            .map_err(|_| E::custom(format!("negative route distinguisher {}", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for RouteDistinguisher {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RouteDistinguisherVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_route_distinguisher() {
        // (input, expected value, canonical form)
        let cases = [
            ("0", 0, "0:0"),
            ("100", 100, "0:100"),
            ("51324:65201", 220434901565105, "51324:65201"),
            ("51324:65536", 220434901565440, "51324:65536"),
            ("65535:0", 281470681743360, "65535:0"),
            ("0:65535:0", 281470681743360, "65535:0"),
            ("65536:0", 562954248388608, "65536:0"),
            ("65536:3", 562954248388611, "65536:3"),
            ("2:65535:0", 562954248323072, "2:65535:0"),
            ("1.1.1.1:0", 282578800148480, "1.1.1.1:0"),
            ("1:1.1.1.1:0", 282578800148480, "1.1.1.1:0"),
        ];
        for (input, expected, canonical) in cases {
            let rd: RouteDistinguisher = input.parse().unwrap();
            assert_eq!(rd.0, expected, "{}", input);
            assert_eq!(rd.to_string(), canonical, "{}", input);
        }
    }

    #[test]
    fn test_parse_route_distinguisher_errors() {
        for input in [
            "gfjkgjkf",
            "18446744073709551616",
            "65536:65536",
            "0:65536:0",
            "2:65536:65536",
            "1:1897:0",
            "2:1897:65536",
            "2:1.1.1.1:0",
            "0:1.1.1.1:0",
            "3:1:1",
            "1:2:3:4",
        ] {
            assert!(input.parse::<RouteDistinguisher>().is_err(), "{}", input);
        }
    }

    #[test]
    fn test_route_distinguisher_from_wire() {
        // type 2, 4-octet ASN 100, index 200
        let rd = RouteDistinguisher::from([0, 2, 0, 0, 0, 100, 0, 200]);
        assert_eq!(rd.to_string(), "2:100:200");
        let rd = RouteDistinguisher::from([0, 2, 0, 1, 0x01, 0xd0, 0, 200]);
        assert_eq!(rd.to_string(), "66000:200");
        let rd = RouteDistinguisher::from([0, 0, 0, 120, 0, 0, 0, 200]);
        assert_eq!(rd.to_string(), "120:200");
        let rd = RouteDistinguisher::from([0, 1, 2, 2, 2, 2, 0, 30]);
        assert_eq!(rd.to_string(), "2.2.2.2:30");
    }

    #[test]
    fn test_deserialize_route_distinguisher() {
        #[derive(Deserialize)]
        struct Wrapper {
            rds: Vec<RouteDistinguisher>,
        }
        let parsed: Wrapper = serde_json::from_str(r#"{"rds": ["65017:104", 100]}"#).unwrap();
        assert_eq!(
            parsed.rds,
            vec!["65017:104".parse().unwrap(), RouteDistinguisher(100)]
        );
    }
}
