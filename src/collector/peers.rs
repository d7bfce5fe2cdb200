//! Peer identities and stale peer removal.
use super::{Collector, CollectorState, RemovalReason};
use crate::models::{AddPathOptions, RouteDistinguisher};
use crate::parser::bmp::messages::{BmpPerPeerHeader, PeerType};
use crate::rib::PeerRef;
use log::{debug, error, info};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::time::Instant;

/// A monitored BGP peer, as seen through one exporter connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerKey {
    /// Exporter address and source port.
    pub exporter: SocketAddr,
    pub ip: IpAddr,
    pub peer_type: PeerType,
    pub rd: RouteDistinguisher,
    pub asn: u32,
    pub bgp_id: Ipv4Addr,
}

impl PeerKey {
    pub fn new(exporter: SocketAddr, header: &BmpPerPeerHeader) -> PeerKey {
        PeerKey {
            exporter,
            ip: header.peer_ip,
            peer_type: header.peer_type,
            rd: header.peer_distinguisher,
            asn: header.peer_asn,
            bgp_id: header.peer_bgp_id,
        }
    }

    pub fn is_l3vpn(&self) -> bool {
        self.peer_type == PeerType::RD
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    /// Stands for the peer in the RIB.
    pub reference: PeerRef,
    /// Set when the exporter connection went down.
    pub stale_until: Option<Instant>,
    /// Families decoded with ADD-PATH path identifiers.
    pub add_path: AddPathOptions,
}

impl Collector {
    /// Register a new peer. The caller holds the write lock.
    pub(crate) fn add_peer<'a>(
        &self,
        state: &'a mut CollectorState,
        key: PeerKey,
    ) -> &'a mut PeerInfo {
        state.last_peer_reference = state.last_peer_reference.wrapping_add(1);
        if state.last_peer_reference == 0 {
            // route ownership can no longer be told apart
            error!("too many peer up events, stopping");
            self.stop();
        }
        let info = PeerInfo {
            reference: state.last_peer_reference,
            stale_until: None,
            add_path: AddPathOptions::default(),
        };
        state.peers.entry(key).insert_entry(info).into_mut()
    }

    /// Remove a peer and all its routes. The caller holds the write lock.
    pub(crate) fn remove_peer(
        &self,
        state: &mut CollectorState,
        key: &PeerKey,
        reason: RemovalReason,
    ) {
        let exporter = key.exporter.ip().to_canonical();
        info!(
            "remove peer {} for exporter {} (reason: {})",
            key.ip.to_canonical(),
            exporter,
            reason.as_str()
        );
        let Some(info) = state.peers.remove(key) else {
            return;
        };
        let removed = state.rib.flush_peer(info.reference);
        let metrics = self.metrics.exporter(exporter);
        metrics.add_routes(-(removed as i64));
        metrics
            .peers
            .fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
        metrics.peer_removed(reason);
    }

    /// Mark every peer of `exporter` as stale until `until`.
    pub fn mark_exporter_stale(&self, exporter: SocketAddr, until: Instant) {
        self.with_state(|state| {
            for (_, info) in state.peers.iter_mut().filter(|(k, _)| k.exporter == exporter) {
                info.stale_until = Some(until);
            }
            self.schedule_stale_removal(state);
        })
    }

    /// Re-arm the stale timer to the earliest stale deadline, or disarm it.
    fn schedule_stale_removal(&self, state: &CollectorState) {
        let next = state.peers.values().filter_map(|info| info.stale_until).min();
        match next {
            Some(next) => debug!(
                "next removal for stale peer scheduled in {:?}",
                next.saturating_duration_since(Instant::now())
            ),
            None => debug!("no stale peer"),
        }
        self.stale_deadline.send_replace(next);
    }

    /// Remove the peers whose stale deadline is not after `now`.
    pub fn remove_stale_peers(&self, now: Instant) {
        debug!("remove stale peers");
        self.with_state(|state| {
            let expired: Vec<PeerKey> = state
                .peers
                .iter()
                .filter(|(_, info)| matches!(info.stale_until, Some(until) if until <= now))
                .map(|(key, _)| key.clone())
                .collect();
            for key in &expired {
                self.remove_peer(state, key, RemovalReason::Stale);
            }
            self.schedule_stale_removal(state);
        })
    }

    /// Sleep until the earliest stale deadline and sweep, until the collector stops.
    pub(crate) async fn run_stale_timer(self: Arc<Self>) {
        let mut deadline = self.stale_deadline.subscribe();
        loop {
            let next = *deadline.borrow_and_update();
            let expired = async {
                match next {
                    Some(next) => tokio::time::sleep_until(next).await,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                changed = deadline.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = expired => self.remove_stale_peers(Instant::now()),
            }
        }
    }
}
