//! BGP attribute structs
mod aspath;
mod nlri;

use crate::models::*;
use bitflags::bitflags;
use num_enum::{FromPrimitive, IntoPrimitive};
use std::net::IpAddr;

pub use aspath::*;
pub use nlri::*;

bitflags! {
    /// The high-order bit (bit 0) of the Attribute Flags octet is the
    /// Optional bit.  It defines whether the attribute is optional (if
    /// set to 1) or well-known (if set to 0).
    ///
    /// The third high-order bit (bit 2) of the Attribute Flags octet
    /// is the Partial bit.  It defines whether the information
    /// contained in the optional transitive attribute is partial (if
    /// set to 1) or complete (if set to 0).
    ///
    /// The fourth high-order bit (bit 3) of the Attribute Flags octet
    /// is the Extended Length bit.  It defines whether the Attribute
    /// Length is one octet (if set to 0) or two octets (if set to 1).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AttrFlags: u8 {
        const OPTIONAL   = 0b10000000;
        const TRANSITIVE = 0b01000000;
        const PARTIAL    = 0b00100000;
        const EXTENDED   = 0b00010000;
    }
}

/// Attribute types the collector looks at. Everything else is skipped by length.
///
/// <https://www.iana.org/assignments/bgp-parameters/bgp-parameters.xhtml#bgp-parameters-2>
#[allow(non_camel_case_types)]
#[derive(Debug, FromPrimitive, IntoPrimitive, PartialEq, Eq, Hash, Copy, Clone)]
#[repr(u8)]
pub enum AttrType {
    ORIGIN = 1,
    AS_PATH = 2,
    NEXT_HOP = 3,
    MULTI_EXIT_DISCRIMINATOR = 4,
    LOCAL_PREFERENCE = 5,
    COMMUNITIES = 8,
    /// <https://tools.ietf.org/html/rfc4760>
    MP_REACHABLE_NLRI = 14,
    MP_UNREACHABLE_NLRI = 15,
    EXTENDED_COMMUNITIES = 16,
    AS4_PATH = 17,
    /// <https://datatracker.ietf.org/doc/html/rfc8092>
    LARGE_COMMUNITIES = 32,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Decoded value of one path attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    AsPath { path: AsPath, is_as4: bool },
    NextHop(IpAddr),
    Communities(Vec<u32>),
    LargeCommunities(Vec<LargeCommunity>),
    MpReachNlri(MpNlri),
    MpUnreachNlri(MpNlri),
}

/// The path attributes of one UPDATE message that the collector keeps.
///
/// Attributes that failed to decode are left out and their types recorded in `malformed`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attributes {
    inner: Vec<AttributeValue>,
    malformed: Vec<AttrType>,
}

impl Attributes {
    pub fn iter(&self) -> impl Iterator<Item = &AttributeValue> {
        self.inner.iter()
    }

    pub fn push(&mut self, value: AttributeValue) {
        self.inner.push(value);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn push_malformed(&mut self, attr_type: AttrType) {
        self.malformed.push(attr_type);
    }

    /// Types of the attributes skipped because they could not be decoded.
    pub fn malformed(&self) -> &[AttrType] {
        &self.malformed
    }

    /// Next hop carried by the `NEXT_HOP` attribute.
    pub fn next_hop(&self) -> Option<IpAddr> {
        self.inner.iter().find_map(|x| match x {
            AttributeValue::NextHop(ip) => Some(*ip),
            _ => None,
        })
    }

    /// AS path, with `AS4_PATH` merged in when the speaker used 2-octet ASNs.
    pub fn as_path(&self) -> Option<AsPath> {
        let mut as_path = None;
        let mut as4_path = None;
        for value in &self.inner {
            if let AttributeValue::AsPath { path, is_as4 } = value {
                match is_as4 {
                    false => as_path = Some(path),
                    true => as4_path = Some(path),
                }
            }
        }
        match (as_path, as4_path) {
            (Some(path), Some(path4)) => Some(AsPath::merge_aspath_as4path(path, path4)),
            (Some(path), None) => Some(path.clone()),
            (None, Some(path4)) => Some(path4.clone()),
            (None, None) => None,
        }
    }

    pub fn communities(&self) -> Option<&[u32]> {
        self.inner.iter().find_map(|x| match x {
            AttributeValue::Communities(c) => Some(c.as_slice()),
            _ => None,
        })
    }

    pub fn large_communities(&self) -> Option<&[LargeCommunity]> {
        self.inner.iter().find_map(|x| match x {
            AttributeValue::LargeCommunities(c) => Some(c.as_slice()),
            _ => None,
        })
    }

    pub fn mp_reach(&self) -> Option<&MpNlri> {
        self.inner.iter().find_map(|x| match x {
            AttributeValue::MpReachNlri(n) => Some(n),
            _ => None,
        })
    }

    pub fn mp_unreach(&self) -> Option<&MpNlri> {
        self.inner.iter().find_map(|x| match x {
            AttributeValue::MpUnreachNlri(n) => Some(n),
            _ => None,
        })
    }
}

impl From<Vec<AttributeValue>> for Attributes {
    fn from(inner: Vec<AttributeValue>) -> Self {
        Attributes {
            inner,
            malformed: vec![],
        }
    }
}
