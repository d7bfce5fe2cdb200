/*!
In-memory routing information base.

Prefixes live in a [PrefixMap] mapping each prefix to a small index. The routes of a prefix
are stored in a flat map under keys combining that index with a slot number; slots of a prefix
are contiguous from 0. NLRI, next hops and route attributes are interned, as many routes share
them.
*/
pub mod intern;

use crate::models::{LargeCommunity, RouteDistinguisher, RouteFamily};
use ipnet::{IpNet, Ipv6Net, PrefixLenError};
use prefix_trie::PrefixMap;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::net::{IpAddr, Ipv6Addr};

pub use intern::{InternPool, Reference};

/// Address in the RIB space: IPv4 addresses become IPv4-mapped IPv6 addresses.
pub fn mapped_addr(addr: IpAddr) -> Ipv6Addr {
    match addr {
        IpAddr::V4(addr) => addr.to_ipv6_mapped(),
        IpAddr::V6(addr) => addr,
    }
}

/// Prefix in the RIB space: IPv4 prefixes are mapped and their length grows by 96.
pub fn mapped_prefix(prefix: IpNet) -> Result<Ipv6Net, PrefixLenError> {
    match prefix {
        IpNet::V4(net) => Ipv6Net::new(net.network().to_ipv6_mapped(), net.prefix_len() + 96),
        IpNet::V6(net) => Ok(net.trunc()),
    }
}

/// Peer reference allocated by the peer state manager.
pub type PeerRef = u32;

type PrefixIndex = u32;
type RouteKey = u64;

#[inline]
const fn route_key(prefix: PrefixIndex, slot: u32) -> RouteKey {
    ((prefix as u64) << 32) | slot as u64
}

/// Identity of a route within a prefix, together with the peer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nlri {
    pub family: RouteFamily,
    pub path_id: u32,
    pub rd: RouteDistinguisher,
}

/// Next hop, IPv4 addresses being stored as IPv4-mapped IPv6 addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NextHop(pub Ipv6Addr);

impl Default for NextHop {
    fn default() -> Self {
        NextHop(Ipv6Addr::UNSPECIFIED)
    }
}

/// Attributes kept for a route. `plen` is the prefix length in the IPv6 space.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct RouteAttributes {
    pub asn: u32,
    pub as_path: Vec<u32>,
    pub communities: Vec<u32>,
    pub large_communities: Vec<LargeCommunity>,
    pub plen: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub peer: PeerRef,
    pub nlri: Reference<Nlri>,
    pub next_hop: Reference<NextHop>,
    pub attributes: Reference<RouteAttributes>,
}

pub struct Rib {
    tree: PrefixMap<Ipv6Net, PrefixIndex>,
    routes: HashMap<RouteKey, Route>,
    pub nlris: InternPool<Nlri>,
    pub next_hops: InternPool<NextHop>,
    pub rtas: InternPool<RouteAttributes>,
    next_prefix_id: PrefixIndex,
    free_prefix_ids: Vec<PrefixIndex>,
}

impl Debug for Rib {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rib")
            .field("prefixes", &self.tree.len())
            .field("routes", &self.routes.len())
            .field("nlris", &self.nlris)
            .field("next_hops", &self.next_hops)
            .field("rtas", &self.rtas)
            .finish()
    }
}

impl Default for Rib {
    fn default() -> Self {
        Rib::new()
    }
}

impl Rib {
    pub fn new() -> Rib {
        Rib {
            tree: PrefixMap::new(),
            routes: HashMap::new(),
            nlris: InternPool::new(),
            next_hops: InternPool::new(),
            rtas: InternPool::new(),
            // 0 is never allocated
            next_prefix_id: 1,
            free_prefix_ids: vec![],
        }
    }

    /// Number of routes stored.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Number of distinct prefixes stored.
    pub fn prefixes(&self) -> usize {
        self.tree.len()
    }

    fn new_prefix_index(&mut self) -> PrefixIndex {
        match self.free_prefix_ids.pop() {
            Some(index) => index,
            None => {
                let index = self.next_prefix_id;
                self.next_prefix_id += 1;
                index
            }
        }
    }

    fn release(&mut self, route: &Route) {
        self.nlris.take(route.nlri);
        self.next_hops.take(route.next_hop);
        self.rtas.take(route.attributes);
    }

    /// Routes stored for a prefix index, in slot order.
    fn routes_of(&self, prefix: PrefixIndex) -> impl Iterator<Item = &Route> {
        (0u32..).map_while(move |slot| self.routes.get(&route_key(prefix, slot)))
    }

    /// Remove the routes of a prefix matching `should_remove` and close the gaps between the
    /// remaining slots. With `once`, stop after the first removal.
    ///
    /// Returns the number of removed routes and whether the prefix has no route left.
    fn remove_routes<F>(&mut self, prefix: PrefixIndex, should_remove: F, once: bool) -> (usize, bool)
    where
        F: Fn(&Route) -> bool,
    {
        let mut removed = 0;
        let mut check_slot = 0u32;
        let mut next_slot = 0u32;
        let mut skip = false;

        while let Some(route) = self.routes.get(&route_key(prefix, check_slot)).copied() {
            if !skip && should_remove(&route) {
                self.release(&route);
                self.routes.remove(&route_key(prefix, check_slot));
                removed += 1;
                skip = once;
            } else {
                if check_slot != next_slot {
                    self.routes.remove(&route_key(prefix, check_slot));
                    self.routes.insert(route_key(prefix, next_slot), route);
                }
                next_slot += 1;
            }
            check_slot += 1;
        }

        (removed, next_slot == 0)
    }

    /// Add or replace the route of `route.peer` for `route.nlri` on `prefix`.
    ///
    /// The route's interned references are owned by the RIB from now on. Returns 1 when the route
    /// is new, 0 when it replaced an existing one.
    pub fn add_prefix(&mut self, prefix: Ipv6Net, route: Route) -> usize {
        let prefix = prefix.trunc();
        let index = match self.tree.get(&prefix) {
            Some(index) => *index,
            None => {
                let index = self.new_prefix_index();
                self.tree.insert(prefix, index);
                index
            }
        };

        let mut slot = 0u32;
        loop {
            let key = route_key(index, slot);
            match self.routes.get_mut(&key) {
                None => {
                    self.routes.insert(key, route);
                    return 1;
                }
                Some(existing) if existing.peer == route.peer && existing.nlri == route.nlri => {
                    let old = std::mem::replace(existing, route);
                    // the NLRI is the same value, referenced twice now
                    self.nlris.take(old.nlri);
                    self.next_hops.take(old.next_hop);
                    self.rtas.take(old.attributes);
                    return 0;
                }
                Some(_) => slot += 1,
            }
        }
    }

    /// Remove the route of `peer` for `nlri` on `prefix`. Returns the number of removed routes.
    ///
    /// `nlri` is only compared, its reference count is left untouched.
    pub fn remove_prefix(&mut self, prefix: Ipv6Net, peer: PeerRef, nlri: Reference<Nlri>) -> usize {
        let prefix = prefix.trunc();
        let Some(&index) = self.tree.get(&prefix) else {
            return 0;
        };
        let (removed, empty) =
            self.remove_routes(index, |r| r.peer == peer && r.nlri == nlri, true);
        if empty {
            self.free_prefix_ids.push(index);
            self.tree.remove(&prefix);
        }
        removed
    }

    /// Remove every route of `peer`. Returns the number of removed routes.
    ///
    /// The trie is left alone during the scan and rebuilt afterwards when prefixes were emptied.
    pub fn flush_peer(&mut self, peer: PeerRef) -> usize {
        let entries: Vec<(Ipv6Net, PrefixIndex)> =
            self.tree.iter().map(|(prefix, index)| (*prefix, *index)).collect();

        let mut removed_total = 0;
        let mut emptied = vec![];
        for (_prefix, index) in &entries {
            let (removed, empty) = self.remove_routes(*index, |r| r.peer == peer, false);
            removed_total += removed;
            if empty {
                self.free_prefix_ids.push(*index);
                emptied.push(*index);
            }
        }

        if !emptied.is_empty() {
            let mut tree = PrefixMap::new();
            for (prefix, index) in entries {
                if !emptied.contains(&index) {
                    tree.insert(prefix, index);
                }
            }
            self.tree = tree;
        }
        removed_total
    }

    /// Longest prefix match on `ip`, preferring the route whose next hop is `next_hop`.
    ///
    /// Without a route through `next_hop`, the first route of the prefix is returned.
    pub fn lookup(&self, ip: Ipv6Addr, next_hop: Ipv6Addr) -> Option<&Route> {
        let (_, index) = self.tree.get_lpm(&Ipv6Net::from(ip))?;
        let preferred = self.next_hops.ref_of(&NextHop(next_hop));
        let mut first = None;
        for route in self.routes_of(*index) {
            if Some(route.next_hop) == preferred {
                return Some(route);
            }
            first.get_or_insert(route);
        }
        first
    }

    pub fn attributes(&self, route: &Route) -> &RouteAttributes {
        self.rtas.get(route.attributes)
    }

    pub fn next_hop(&self, route: &Route) -> Ipv6Addr {
        self.next_hops.get(route.next_hop).0
    }

    pub fn nlri(&self, route: &Route) -> &Nlri {
        self.nlris.get(route.nlri)
    }
}
