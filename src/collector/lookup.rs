use super::Collector;
use crate::error::LookupError;
use crate::models::LargeCommunity;
use crate::rib::mapped_addr;
use serde::Serialize;
use std::net::IpAddr;

/// Routing information attached to a flow.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LookupResult {
    pub asn: u32,
    pub as_path: Vec<u32>,
    pub communities: Vec<u32>,
    pub large_communities: Vec<LargeCommunity>,
    /// Length of the matching prefix, in the address family of the looked up address.
    pub net_mask: u8,
    /// Next hop of the selected route. `None` on an empty result.
    pub next_hop: Option<IpAddr>,
}

impl Collector {
    /// Find the route for `ip`, preferring the one going through `next_hop`.
    ///
    /// This is approximate: the exporter may not use the route selected here. An empty result
    /// is returned when nothing is collected or when no exporter ever connected. `_agent` is the
    /// address of the flow exporter; it is not used to select a route.
    pub fn lookup(
        &self,
        ip: IpAddr,
        next_hop: IpAddr,
        _agent: IpAddr,
    ) -> Result<LookupResult, LookupError> {
        if !self.config.collects_anything() || !self.is_active() {
            return Ok(LookupResult::default());
        }
        let ip = ip.to_canonical();

        self.read_state(|state| {
            let rib = &state.rib;
            let route = rib
                .lookup(mapped_addr(ip), mapped_addr(next_hop))
                .ok_or(LookupError::NoRouteFound)?;
            let attributes = rib.attributes(route);
            let net_mask = match ip {
                IpAddr::V4(_) => attributes.plen.saturating_sub(96),
                IpAddr::V6(_) => attributes.plen,
            };
            Ok(LookupResult {
                asn: attributes.asn,
                as_path: attributes.as_path.clone(),
                communities: attributes.communities.clone(),
                large_communities: attributes.large_communities.clone(),
                net_mask,
                next_hop: Some(IpAddr::V6(rib.next_hop(route)).to_canonical()),
            })
        })
    }
}
