use crate::models::network::{Afi, Safi};
use crate::models::BgpOpenMessage;
use crate::parser::ReadUtils;
use crate::ParserError;
use bytes::{Buf, Bytes};
use itertools::Itertools;
use log::warn;
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

#[allow(non_camel_case_types)]
#[derive(Debug, FromPrimitive, IntoPrimitive, PartialEq, Eq, Hash, Copy, Clone)]
#[repr(u8)]
pub enum BgpCapabilityType {
    MULTIPROTOCOL_EXTENSIONS_FOR_BGP_4 = 1,
    ROUTE_REFRESH_CAPABILITY_FOR_BGP_4 = 2,
    EXTENDED_NEXT_HOP_ENCODING = 5,
    GRACEFUL_RESTART_CAPABILITY = 64,
    SUPPORT_FOR_4_OCTET_AS_NUMBER_CAPABILITY = 65,
    ADD_PATH_CAPABILITY = 69,

    /// Catch-all type for any capability the collector does not interpret
    #[num_enum(catch_all)]
    Unknown(u8),
}

/// A capability announced in the optional parameters of an OPEN message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    AddPath(AddPathCapability),
    FourOctetAs(u32),
    Other { code: BgpCapabilityType, value: Bytes },
}

impl Capability {
    /// Decode the value of a capability given its code.
    pub fn parse(code: u8, value: Bytes) -> Result<Capability, ParserError> {
        let code = BgpCapabilityType::from(code);
        match code {
            BgpCapabilityType::ADD_PATH_CAPABILITY => {
                AddPathCapability::parse(value).map(Capability::AddPath)
            }
            BgpCapabilityType::SUPPORT_FOR_4_OCTET_AS_NUMBER_CAPABILITY => {
                let mut value = value;
                value.read_u32().map(Capability::FourOctetAs)
            }
            _ => Ok(Capability::Other { code, value }),
        }
    }
}

/// ADD-PATH send/receive mode - RFC 7911, Section 4
#[derive(Debug, TryFromPrimitive, IntoPrimitive, PartialEq, Eq, Hash, Copy, Clone)]
#[repr(u8)]
pub enum AddPathMode {
    Receive = 1,
    Send = 2,
    SendReceive = 3,
}

impl AddPathMode {
    pub const fn can_send(&self) -> bool {
        matches!(self, AddPathMode::Send | AddPathMode::SendReceive)
    }

    pub const fn can_receive(&self) -> bool {
        matches!(self, AddPathMode::Receive | AddPathMode::SendReceive)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddPathEntry {
    pub afi: u16,
    pub safi: u8,
    pub mode: AddPathMode,
}

/// ADD-PATH capability - RFC 7911, Section 4
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddPathCapability {
    pub entries: Vec<AddPathEntry>,
}

impl AddPathCapability {
    /// Parse ADD-PATH capability from raw bytes.
    ///
    /// Format: series of 4-byte entries, each containing AFI (2 bytes), SAFI (1 byte) and the
    /// Send/Receive mode (1 byte). Entries with an unknown mode are skipped.
    pub fn parse(mut data: Bytes) -> Result<Self, ParserError> {
        if data.len() % 4 != 0 {
            return Err(ParserError::ParseError(format!(
                "ADD-PATH capability length {} is not divisible by 4",
                data.len()
            )));
        }

        let mut entries = Vec::with_capacity(data.len() / 4);
        while data.remaining() >= 4 {
            let afi = data.read_u16()?;
            let safi = data.read_u8()?;
            let mode = data.read_u8()?;
            match AddPathMode::try_from(mode) {
                Ok(mode) => entries.push(AddPathEntry { afi, safi, mode }),
                Err(_) => warn!("skipping ADD-PATH entry with unknown mode {}", mode),
            }
        }
        Ok(AddPathCapability { entries })
    }
}

/// Address families for which NLRI are decoded with a path identifier.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddPathOptions {
    families: BTreeSet<(u16, u8)>,
}

impl AddPathOptions {
    /// Derive decoding options from both OPEN messages of a monitored session.
    ///
    /// The monitored router only receives several paths for a family when the peer announced it
    /// can send them and the router announced it can receive them.
    pub fn negotiate(sent: &BgpOpenMessage, received: &BgpOpenMessage) -> AddPathOptions {
        let received_modes: Vec<&AddPathEntry> = received.add_path_entries().collect();
        let families = sent
            .add_path_entries()
            .filter(|sent| sent.mode.can_receive())
            .filter(|sent| {
                received_modes.iter().any(|r| {
                    r.afi == sent.afi && r.safi == sent.safi && r.mode.can_send()
                })
            })
            .map(|sent| (sent.afi, sent.safi))
            .collect();
        AddPathOptions { families }
    }

    pub fn insert(&mut self, afi: Afi, safi: Safi) {
        self.families.insert((afi.into(), safi.into()));
    }

    pub fn contains(&self, afi: Afi, safi: Safi) -> bool {
        self.families.contains(&(afi.into(), safi.into()))
    }

    /// Same as [AddPathOptions::contains], for AFI/SAFI values we may not know.
    pub fn contains_raw(&self, afi: u16, safi: u8) -> bool {
        self.families.contains(&(afi, safi))
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

impl Display for AddPathOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let families = self
            .families
            .iter()
            .map(|(afi, safi)| crate::models::family_label(*afi, *safi))
            .join(",");
        write!(f, "[{}]", families)
    }
}
