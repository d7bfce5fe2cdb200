//! Effect of BMP events on peers and routes.
use super::{Collector, PeerKey, RemovalReason};
use crate::models::*;
use crate::parser::bmp::messages::PeerUpNotification;
use crate::rib::{mapped_addr, mapped_prefix, NextHop, Nlri, Route, RouteAttributes};
use ipnet::{IpNet, Ipv6Net};
use log::{debug, info, warn};
use std::net::{Ipv6Addr, SocketAddr};
use std::sync::atomic::Ordering;
use tokio::time::Instant;

/// An NLRI mapped into the RIB space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RibPrefix {
    prefix: Ipv6Net,
    nlri: Nlri,
}

/// Result of normalizing one NLRI entry.
#[derive(Debug, PartialEq, Eq)]
enum Normalized {
    Prefix(RibPrefix),
    /// Family we do not store, with its label.
    Ignored(String),
}

#[derive(Debug)]
enum RouteChange {
    Announce(RibPrefix, Ipv6Addr),
    Withdraw(RibPrefix),
}

fn rib_prefix(
    prefix: IpNet,
    family: RouteFamily,
    path_id: Option<u32>,
    rd: RouteDistinguisher,
) -> Option<RibPrefix> {
    match mapped_prefix(prefix) {
        Ok(prefix) => Some(RibPrefix {
            prefix,
            nlri: Nlri {
                family,
                path_id: path_id.unwrap_or_default(),
                rd,
            },
        }),
        Err(_) => {
            warn!("cannot map prefix {} into the RIB", prefix);
            None
        }
    }
}

/// Normalize one MP NLRI entry of family `afi`/`safi`. Unicast and labeled routes take the RD of
/// the peer, VPN and EVPN routes carry their own.
fn normalize(
    entry: &NlriPrefix,
    afi: u16,
    safi: u8,
    peer_rd: RouteDistinguisher,
) -> Option<Normalized> {
    if let NlriPrefix::Unsupported { afi, safi } = entry {
        return Some(Normalized::Ignored(family_label(*afi, *safi)));
    }
    let family = match (Afi::try_from(afi), Safi::try_from(safi)) {
        (Ok(afi), Ok(safi)) => RouteFamily::from_afi_safi(afi, safi),
        _ => None,
    };
    let Some(family) = family else {
        return Some(Normalized::Ignored(family_label(afi, safi)));
    };
    let (prefix, path_id, rd) = match entry {
        NlriPrefix::Unicast(p) | NlriPrefix::Labeled { prefix: p, .. } => {
            (p.prefix, p.path_id, peer_rd)
        }
        NlriPrefix::LabeledVpn { prefix: p, rd, .. } => (p.prefix, p.path_id, *rd),
        NlriPrefix::EvpnIpPrefix(route) => (route.prefix, route.path_id, route.rd),
        NlriPrefix::Unsupported { .. } => return None,
    };
    rib_prefix(prefix, family, path_id, rd).map(Normalized::Prefix)
}

impl Collector {
    /// A new connection from `exporter`.
    pub(crate) fn handle_connection_up(&self, exporter: SocketAddr) {
        // creates the gauges of the exporter
        self.metrics.exporter(exporter.ip());
    }

    /// Connection down or terminated: keep the routes of the exporter for a while.
    pub(crate) fn handle_connection_down(&self, exporter: SocketAddr) {
        let until = Instant::now() + self.config.keep_duration();
        self.mark_exporter_stale(exporter, until);
    }

    pub(crate) fn handle_peer_up(&self, key: &PeerKey, notification: &PeerUpNotification) {
        let Some(add_path) = notification.add_path_options() else {
            return;
        };
        let exporter = key.exporter.ip().to_canonical();
        let peer = key.ip.to_canonical();
        self.with_state(|state| {
            if state.peers.contains_key(key) {
                info!("received extra peer up from exporter {} for peer {}", exporter, peer);
            } else {
                self.metrics
                    .exporter(exporter)
                    .peers
                    .fetch_add(1, Ordering::Relaxed);
                self.add_peer(state, key.clone());
            }
            if let Some(info) = state.peers.get_mut(key) {
                debug!(
                    "new peer {} from exporter {} (add-path: {})",
                    peer, exporter, add_path
                );
                info.add_path = add_path;
            }
        })
    }

    pub(crate) fn handle_peer_down(&self, key: &PeerKey) {
        self.with_state(|state| {
            if !state.peers.contains_key(key) {
                info!(
                    "received peer down from exporter {} for peer {}, but no peer up",
                    key.exporter.ip().to_canonical(),
                    key.ip.to_canonical()
                );
                return;
            }
            self.remove_peer(state, key, RemovalReason::Down);
        })
    }

    /// Attributes stored with the routes of an UPDATE, according to what is collected.
    fn route_attributes(&self, key: &PeerKey, attributes: &Attributes) -> RouteAttributes {
        let config = &self.config;
        let mut rta = RouteAttributes::default();
        if config.collect_asns || config.collect_as_paths {
            if let Some(path) = attributes.as_path() {
                rta.as_path = path.flatten();
            }
        }
        if config.collect_communities {
            if let Some(communities) = attributes.communities() {
                rta.communities = communities.to_vec();
            }
            if let Some(communities) = attributes.large_communities() {
                rta.large_communities = communities.to_vec();
            }
        }
        if config.collect_asns {
            // without AS path, the route originates from the peer
            rta.asn = rta.as_path.last().copied().unwrap_or(key.asn);
        }
        if !config.collect_as_paths {
            rta.as_path = Vec::new();
        }
        rta
    }

    /// Translate the NLRI of an UPDATE into RIB changes, in message order.
    fn route_changes(&self, key: &PeerKey, update: &BgpUpdateMessage) -> Vec<RouteChange> {
        let metrics = self.metrics.exporter(key.exporter.ip());
        let l3vpn = key.is_l3vpn();
        let mut next_hop = update
            .attributes
            .next_hop()
            .map(mapped_addr)
            .unwrap_or(Ipv6Addr::UNSPECIFIED);
        let mut changes = vec![];

        // NLRI and withdrawn routes fields are IPv4 unicast, within the RD of the peer
        if l3vpn || self.is_accepted_rd(RouteDistinguisher::default()) {
            let family = match l3vpn {
                true => RouteFamily::Ipv4Vpn,
                false => RouteFamily::Ipv4Unicast,
            };
            for p in &update.announced_prefixes {
                if let Some(prefix) = rib_prefix(p.prefix, family, p.path_id, key.rd) {
                    changes.push(RouteChange::Announce(prefix, next_hop));
                }
            }
            for p in &update.withdrawn_prefixes {
                if let Some(prefix) = rib_prefix(p.prefix, family, p.path_id, key.rd) {
                    changes.push(RouteChange::Withdraw(prefix));
                }
            }
        }

        for attribute in update.attributes.iter() {
            let (mp, reachable) = match attribute {
                AttributeValue::MpReachNlri(mp) => {
                    if let Some(mp_next_hop) = mp.next_hop {
                        next_hop = mapped_addr(mp_next_hop);
                    }
                    (mp, true)
                }
                AttributeValue::MpUnreachNlri(mp) => (mp, false),
                _ => continue,
            };
            for entry in &mp.prefixes {
                let prefix = match normalize(entry, mp.afi, mp.safi, key.rd) {
                    Some(Normalized::Prefix(prefix)) => prefix,
                    Some(Normalized::Ignored(family)) => {
                        metrics.nlri_ignored(&family);
                        continue;
                    }
                    None => continue,
                };
                if !l3vpn && !self.is_accepted_rd(prefix.nlri.rd) {
                    continue;
                }
                changes.push(match reachable {
                    true => RouteChange::Announce(prefix, next_hop),
                    false => RouteChange::Withdraw(prefix),
                });
            }
        }
        changes
    }

    pub(crate) fn handle_route_monitoring(&self, key: &PeerKey, update: &BgpUpdateMessage) {
        // routes of a VPN instance we do not keep
        if key.is_l3vpn() && !self.is_accepted_rd(key.rd) {
            return;
        }
        let exporter = key.exporter.ip().to_canonical();
        let metrics = self.metrics.exporter(exporter);
        for attr_type in update.attributes.malformed() {
            metrics.error(&format!("cannot parse attribute {}", u8::from(*attr_type)));
        }
        let attributes = self.route_attributes(key, &update.attributes);
        let changes = self.route_changes(key, update);

        let (added, removed) = self.with_state(|state| {
            let known = state.peers.get(key).map(|info| info.reference);
            let reference = match known {
                Some(reference) => reference,
                None => {
                    info!(
                        "received route monitoring from exporter {} for peer {}, but no peer up",
                        exporter,
                        key.ip.to_canonical()
                    );
                    metrics.peers.fetch_add(1, Ordering::Relaxed);
                    self.add_peer(state, key.clone()).reference
                }
            };

            let rib = &mut state.rib;
            let (mut added, mut removed) = (0, 0);
            for change in &changes {
                match change {
                    RouteChange::Announce(prefix, next_hop) => {
                        let route = Route {
                            peer: reference,
                            nlri: rib.nlris.put(prefix.nlri),
                            next_hop: rib.next_hops.put(NextHop(*next_hop)),
                            attributes: rib.rtas.put(RouteAttributes {
                                plen: prefix.prefix.prefix_len(),
                                ..attributes.clone()
                            }),
                        };
                        added += rib.add_prefix(prefix.prefix, route);
                    }
                    RouteChange::Withdraw(prefix) => {
                        if let Some(nlri) = rib.nlris.ref_of(&prefix.nlri) {
                            removed += rib.remove_prefix(prefix.prefix, reference, nlri);
                        }
                    }
                }
            }
            (added, removed)
        });
        metrics.add_routes(added as i64 - removed as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::peers::tests::peer_key;
    use crate::collector::CollectorConfig;
    use crate::parser::bmp::messages::PeerType;
    use smallvec::smallvec;
    use std::net::{IpAddr, Ipv4Addr};

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn prefix(s: &str, path_id: Option<u32>) -> NetworkPrefix {
        NetworkPrefix::new(s.parse().unwrap(), path_id)
    }

    fn vpn_prefix(s: &str, rd: &str) -> NlriPrefix {
        NlriPrefix::LabeledVpn {
            prefix: prefix(s, None),
            labels: smallvec![100],
            rd: rd.parse().unwrap(),
        }
    }

    fn update(
        announced: Vec<NetworkPrefix>,
        withdrawn: Vec<NetworkPrefix>,
        mut attributes: Vec<AttributeValue>,
    ) -> BgpUpdateMessage {
        attributes.insert(
            0,
            AttributeValue::AsPath {
                path: AsPath::from_sequence([65001, 65002]),
                is_as4: false,
            },
        );
        attributes.push(AttributeValue::NextHop(ip("198.51.100.1")));
        attributes.push(AttributeValue::Communities(vec![0xfde9_0001]));
        attributes.push(AttributeValue::LargeCommunities(vec![LargeCommunity::new(
            65001,
            [1, 2],
        )]));
        BgpUpdateMessage {
            withdrawn_prefixes: withdrawn,
            attributes: Attributes::from(attributes),
            announced_prefixes: announced,
        }
    }

    fn active_collector(config: CollectorConfig) -> Collector {
        let collector = Collector::new(config);
        collector.set_active();
        collector
    }

    fn lookup(collector: &Collector, addr: &str) -> Option<crate::collector::LookupResult> {
        let any = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        collector.lookup(ip(addr), any, any).ok()
    }

    #[test]
    fn test_route_monitoring_announce_withdraw() {
        let collector = active_collector(CollectorConfig::default());
        let key = peer_key("192.0.2.1:4000", [10, 0, 0, 1]);

        let msg = update(
            vec![prefix("192.0.2.0/24", None), prefix("198.51.100.0/24", None)],
            vec![],
            vec![],
        );
        collector.handle_route_monitoring(&key, &msg);
        // unknown peers are created on the fly
        assert_eq!(collector.peers(), 1);
        assert_eq!(collector.routes(), 2);

        let result = lookup(&collector, "192.0.2.10").unwrap();
        assert_eq!(result.asn, 65002);
        assert_eq!(result.as_path, vec![65001, 65002]);
        assert_eq!(result.communities, vec![0xfde9_0001]);
        assert_eq!(result.large_communities, vec![LargeCommunity::new(65001, [1, 2])]);
        assert_eq!(result.net_mask, 24);
        assert_eq!(result.next_hop, Some(ip("198.51.100.1")));

        // same routes again: updates only
        collector.handle_route_monitoring(&key, &msg);
        assert_eq!(collector.routes(), 2);

        let msg = update(vec![], vec![prefix("192.0.2.0/24", None)], vec![]);
        collector.handle_route_monitoring(&key, &msg);
        assert_eq!(collector.routes(), 1);
        assert!(lookup(&collector, "192.0.2.10").is_none());

        let snapshot = collector.metrics().snapshot();
        let exporter = &snapshot.exporters[&ip("192.0.2.1")];
        assert_eq!(exporter.routes, 1);
        assert_eq!(exporter.peers, 1);
    }

    #[test]
    fn test_route_monitoring_add_path() {
        let collector = active_collector(CollectorConfig::default());
        let key = peer_key("192.0.2.1:4000", [10, 0, 0, 1]);
        let msg = update(
            vec![prefix("192.0.2.0/24", Some(1)), prefix("192.0.2.0/24", Some(2))],
            vec![],
            vec![],
        );
        collector.handle_route_monitoring(&key, &msg);
        assert_eq!(collector.routes(), 2);
        let msg = update(vec![], vec![prefix("192.0.2.0/24", Some(2))], vec![]);
        collector.handle_route_monitoring(&key, &msg);
        assert_eq!(collector.routes(), 1);
    }

    #[test]
    fn test_route_monitoring_mp_families() {
        let collector = active_collector(CollectorConfig::default());
        let key = peer_key("192.0.2.1:4000", [10, 0, 0, 1]);
        let msg = update(
            vec![],
            vec![],
            vec![
                AttributeValue::MpReachNlri(MpNlri {
                    afi: 2,
                    safi: 1,
                    next_hop: Some(ip("2001:db8::ffff")),
                    prefixes: vec![NlriPrefix::Unicast(prefix("2001:db8:1::/48", None))],
                }),
                AttributeValue::MpUnreachNlri(MpNlri {
                    afi: 1,
                    safi: 2,
                    next_hop: None,
                    prefixes: vec![NlriPrefix::Unsupported { afi: 1, safi: 2 }],
                }),
            ],
        );
        collector.handle_route_monitoring(&key, &msg);
        assert_eq!(collector.routes(), 1);
        let result = lookup(&collector, "2001:db8:1::1").unwrap();
        assert_eq!(result.net_mask, 48);
        assert_eq!(result.next_hop, Some(ip("2001:db8::ffff")));

        let snapshot = collector.metrics().snapshot();
        let exporter = &snapshot.exporters[&ip("192.0.2.1")];
        assert_eq!(exporter.ignored_nlri["ipv4-multicast"], 1);

        let msg = update(
            vec![],
            vec![],
            vec![AttributeValue::MpUnreachNlri(MpNlri {
                afi: 2,
                safi: 1,
                next_hop: None,
                prefixes: vec![NlriPrefix::Unicast(prefix("2001:db8:1::/48", None))],
            })],
        );
        collector.handle_route_monitoring(&key, &msg);
        assert_eq!(collector.routes(), 0);
    }

    #[test]
    fn test_route_monitoring_evpn_and_labeled() {
        let collector = active_collector(CollectorConfig::default());
        let key = peer_key("192.0.2.1:4000", [10, 0, 0, 1]);
        let evpn = EvpnIpPrefixRoute {
            path_id: None,
            rd: "65000:10".parse().unwrap(),
            esi: [0; 10],
            ethernet_tag: 0,
            prefix: "203.0.113.0/24".parse().unwrap(),
            gateway: ip("0.0.0.0"),
            label: 10,
        };
        let msg = update(
            vec![],
            vec![],
            vec![
                AttributeValue::MpReachNlri(MpNlri {
                    afi: 25,
                    safi: 70,
                    next_hop: Some(ip("192.0.2.254")),
                    prefixes: vec![
                        NlriPrefix::EvpnIpPrefix(evpn),
                        NlriPrefix::Unsupported { afi: 25, safi: 70 },
                    ],
                }),
                AttributeValue::MpReachNlri(MpNlri {
                    afi: 1,
                    safi: 4,
                    next_hop: Some(ip("192.0.2.253")),
                    prefixes: vec![NlriPrefix::Labeled {
                        prefix: prefix("10.0.0.0/8", None),
                        labels: smallvec![16],
                    }],
                }),
            ],
        );
        collector.handle_route_monitoring(&key, &msg);
        assert_eq!(collector.routes(), 2);
        let result = lookup(&collector, "203.0.113.1").unwrap();
        assert_eq!(result.net_mask, 24);
        assert_eq!(result.next_hop, Some(ip("192.0.2.254")));
        let result = lookup(&collector, "10.1.1.1").unwrap();
        assert_eq!(result.net_mask, 8);
        assert_eq!(result.next_hop, Some(ip("192.0.2.253")));

        let snapshot = collector.metrics().snapshot();
        let exporter = &snapshot.exporters[&ip("192.0.2.1")];
        assert_eq!(exporter.ignored_nlri["l2vpn-evpn"], 1);
    }

    #[test]
    fn test_route_monitoring_rd_allow_list() {
        let collector = active_collector(CollectorConfig {
            rds: vec!["65017:104".parse().unwrap()],
            ..Default::default()
        });
        let global = peer_key("192.0.2.1:4000", [10, 0, 0, 1]);
        let msg = update(
            vec![prefix("192.0.2.0/24", None)],
            vec![],
            vec![AttributeValue::MpReachNlri(MpNlri {
                afi: 1,
                safi: 128,
                next_hop: Some(ip("192.0.2.254")),
                prefixes: vec![
                    vpn_prefix("198.51.100.0/24", "65017:104"),
                    vpn_prefix("203.0.113.0/24", "65017:105"),
                    vpn_prefix("233.252.0.0/24", "0:0"),
                ],
            })],
        );
        collector.handle_route_monitoring(&global, &msg);
        assert_eq!(collector.routes(), 1);
        assert!(lookup(&collector, "192.0.2.1").is_none());
        assert!(lookup(&collector, "198.51.100.1").is_some());
        assert!(lookup(&collector, "203.0.113.1").is_none());
        assert!(lookup(&collector, "233.252.0.1").is_none());

        // VPN peers are filtered on their own RD
        let mut vpn_peer = peer_key("192.0.2.1:4000", [10, 0, 0, 2]);
        vpn_peer.peer_type = PeerType::RD;
        vpn_peer.rd = "65017:105".parse().unwrap();
        let msg = update(vec![prefix("192.0.2.0/24", None)], vec![], vec![]);
        collector.handle_route_monitoring(&vpn_peer, &msg);
        assert_eq!(collector.routes(), 1);
        assert!(lookup(&collector, "192.0.2.1").is_none());

        vpn_peer.rd = "65017:104".parse().unwrap();
        collector.handle_route_monitoring(&vpn_peer, &msg);
        assert_eq!(collector.routes(), 2);
        assert!(lookup(&collector, "192.0.2.1").is_some());
    }

    #[test]
    fn test_route_attributes_toggles() {
        let key = peer_key("192.0.2.1:4000", [10, 0, 0, 1]);
        let msg = update(vec![prefix("192.0.2.0/24", None)], vec![], vec![]);

        let collector = active_collector(CollectorConfig {
            collect_as_paths: false,
            collect_communities: false,
            ..Default::default()
        });
        collector.handle_route_monitoring(&key, &msg);
        let result = lookup(&collector, "192.0.2.1").unwrap();
        assert_eq!(result.asn, 65002);
        assert!(result.as_path.is_empty());
        assert!(result.communities.is_empty());
        assert!(result.large_communities.is_empty());

        // empty AS path: the peer is the origin
        let collector = active_collector(CollectorConfig::default());
        let msg = BgpUpdateMessage {
            attributes: Attributes::from(vec![AttributeValue::NextHop(ip("198.51.100.1"))]),
            announced_prefixes: vec![prefix("192.0.2.0/24", None)],
            ..Default::default()
        };
        collector.handle_route_monitoring(&key, &msg);
        assert_eq!(lookup(&collector, "192.0.2.1").unwrap().asn, 65000);
    }

    fn peer_up(add_path_sent: u8, add_path_received: u8) -> PeerUpNotification {
        let open = |mode: u8| BgpOpenMessage {
            version: 4,
            asn: 65000,
            hold_time: 180,
            bgp_identifier: Ipv4Addr::new(10, 0, 0, 1),
            capabilities: vec![Capability::AddPath(AddPathCapability {
                entries: vec![AddPathEntry {
                    afi: 1,
                    safi: 1,
                    mode: AddPathMode::try_from(mode).unwrap(),
                }],
            })],
        };
        PeerUpNotification {
            local_addr: ip("10.0.0.254"),
            local_port: 179,
            remote_port: 40000,
            sent_open: Some(open(add_path_sent)),
            received_open: Some(open(add_path_received)),
        }
    }

    #[test]
    fn test_peer_up_down() {
        let collector = active_collector(CollectorConfig::default());
        let key = peer_key("192.0.2.1:4000", [10, 0, 0, 1]);

        collector.handle_peer_up(&key, &peer_up(1, 2));
        assert_eq!(collector.peers(), 1);
        let add_path = collector.read_state(|state| state.peers[&key].add_path.clone());
        assert!(add_path.contains(Afi::Ipv4, Safi::Unicast));

        let msg = update(vec![prefix("192.0.2.0/24", Some(1))], vec![], vec![]);
        collector.handle_route_monitoring(&key, &msg);
        assert_eq!(collector.routes(), 1);

        // a second peer up keeps the routes
        collector.handle_peer_up(&key, &peer_up(1, 1));
        assert_eq!(collector.peers(), 1);
        assert_eq!(collector.routes(), 1);
        let add_path = collector.read_state(|state| state.peers[&key].add_path.clone());
        assert!(add_path.is_empty());

        // missing OPEN: ignored
        let other = peer_key("192.0.2.1:4000", [10, 0, 0, 2]);
        let mut incomplete = peer_up(3, 3);
        incomplete.received_open = None;
        collector.handle_peer_up(&other, &incomplete);
        assert_eq!(collector.peers(), 1);

        collector.handle_peer_down(&other);
        assert_eq!(collector.peers(), 1);
        collector.handle_peer_down(&key);
        assert_eq!(collector.peers(), 0);
        assert_eq!(collector.routes(), 0);

        let snapshot = collector.metrics().snapshot();
        let exporter = &snapshot.exporters[&ip("192.0.2.1")];
        assert_eq!(exporter.peers, 0);
        assert_eq!(exporter.routes, 0);
        assert_eq!(exporter.peer_removals["down"], 1);
    }

    #[test]
    fn test_normalize() {
        let peer_rd = RouteDistinguisher::from(42);
        let Some(Normalized::Prefix(p)) = normalize(
            &NlriPrefix::Unicast(prefix("192.0.2.0/24", Some(7))),
            1,
            1,
            peer_rd,
        ) else {
            panic!("not normalized");
        };
        assert_eq!(p.prefix, "::ffff:192.0.2.0/120".parse::<Ipv6Net>().unwrap());
        assert_eq!(
            p.nlri,
            Nlri {
                family: RouteFamily::Ipv4Unicast,
                path_id: 7,
                rd: peer_rd
            }
        );

        let Some(Normalized::Prefix(p)) =
            normalize(&vpn_prefix("2001:db8::/32", "65017:104"), 2, 128, peer_rd)
        else {
            panic!("not normalized");
        };
        assert_eq!(p.nlri.family, RouteFamily::Ipv6Vpn);
        assert_eq!(p.nlri.rd.to_string(), "65017:104");

        assert_eq!(
            normalize(&NlriPrefix::Unsupported { afi: 1, safi: 5 }, 1, 5, peer_rd),
            Some(Normalized::Ignored("afi-1-safi-5".to_string()))
        );
    }
}
