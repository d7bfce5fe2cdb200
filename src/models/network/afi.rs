use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt::{Display, Formatter};
use std::net::IpAddr;

/// AFI -- Address Family Identifier
///
/// <https://www.iana.org/assignments/address-family-numbers/address-family-numbers.xhtml>
#[derive(Debug, PartialEq, TryFromPrimitive, IntoPrimitive, Clone, Copy, Eq, Hash)]
#[repr(u16)]
pub enum Afi {
    Ipv4 = 1,
    Ipv6 = 2,
    L2vpn = 25,
}

impl From<IpAddr> for Afi {
    #[inline]
    fn from(value: IpAddr) -> Self {
        match value {
            IpAddr::V4(_) => Afi::Ipv4,
            IpAddr::V6(_) => Afi::Ipv6,
        }
    }
}

/// SAFI -- Subsequent Address Family Identifier
///
/// <https://www.iana.org/assignments/safi-namespace/safi-namespace.xhtml>
#[derive(Debug, PartialEq, TryFromPrimitive, IntoPrimitive, Clone, Copy, Eq, Hash)]
#[repr(u8)]
pub enum Safi {
    Unicast = 1,
    Multicast = 2,
    /// RFC 8277
    MplsLabel = 4,
    /// RFC 7432
    Evpn = 70,
    /// RFC 4364
    MplsVpn = 128,
}

/// Address families the RIB knows how to store.
///
/// Every NLRI is normalized into one of these before it is interned, so the family is part of
/// the route identity: the same prefix received as unicast and as labeled unicast makes two
/// routes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RouteFamily {
    #[default]
    Ipv4Unicast,
    Ipv6Unicast,
    Ipv4LabeledUnicast,
    Ipv6LabeledUnicast,
    Ipv4Vpn,
    Ipv6Vpn,
    Evpn,
}

impl RouteFamily {
    /// Map an AFI/SAFI pair to a supported family.
    pub const fn from_afi_safi(afi: Afi, safi: Safi) -> Option<RouteFamily> {
        match (afi, safi) {
            (Afi::Ipv4, Safi::Unicast) => Some(RouteFamily::Ipv4Unicast),
            (Afi::Ipv6, Safi::Unicast) => Some(RouteFamily::Ipv6Unicast),
            (Afi::Ipv4, Safi::MplsLabel) => Some(RouteFamily::Ipv4LabeledUnicast),
            (Afi::Ipv6, Safi::MplsLabel) => Some(RouteFamily::Ipv6LabeledUnicast),
            (Afi::Ipv4, Safi::MplsVpn) => Some(RouteFamily::Ipv4Vpn),
            (Afi::Ipv6, Safi::MplsVpn) => Some(RouteFamily::Ipv6Vpn),
            (Afi::L2vpn, Safi::Evpn) => Some(RouteFamily::Evpn),
            _ => None,
        }
    }

    pub const fn afi(&self) -> Afi {
        match self {
            RouteFamily::Ipv4Unicast | RouteFamily::Ipv4LabeledUnicast | RouteFamily::Ipv4Vpn => {
                Afi::Ipv4
            }
            RouteFamily::Ipv6Unicast | RouteFamily::Ipv6LabeledUnicast | RouteFamily::Ipv6Vpn => {
                Afi::Ipv6
            }
            RouteFamily::Evpn => Afi::L2vpn,
        }
    }

    pub const fn safi(&self) -> Safi {
        match self {
            RouteFamily::Ipv4Unicast | RouteFamily::Ipv6Unicast => Safi::Unicast,
            RouteFamily::Ipv4LabeledUnicast | RouteFamily::Ipv6LabeledUnicast => Safi::MplsLabel,
            RouteFamily::Ipv4Vpn | RouteFamily::Ipv6Vpn => Safi::MplsVpn,
            RouteFamily::Evpn => Safi::Evpn,
        }
    }
}

impl Display for RouteFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RouteFamily::Ipv4Unicast => "ipv4-unicast",
            RouteFamily::Ipv6Unicast => "ipv6-unicast",
            RouteFamily::Ipv4LabeledUnicast => "ipv4-labelled-unicast",
            RouteFamily::Ipv6LabeledUnicast => "ipv6-labelled-unicast",
            RouteFamily::Ipv4Vpn => "l3vpn-ipv4-unicast",
            RouteFamily::Ipv6Vpn => "l3vpn-ipv6-unicast",
            RouteFamily::Evpn => "l2vpn-evpn",
        };
        write!(f, "{}", name)
    }
}

/// Label used when counting NLRI of a family we do not store.
pub fn family_label(afi: u16, safi: u8) -> String {
    match (Afi::try_from(afi), Safi::try_from(safi)) {
        (Ok(afi), Ok(safi)) => match RouteFamily::from_afi_safi(afi, safi) {
            Some(family) => family.to_string(),
            None => format!("{:?}-{:?}", afi, safi).to_lowercase(),
        },
        _ => format!("afi-{}-safi-{}", afi, safi),
    }
}
