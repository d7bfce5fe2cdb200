//! Counters kept per exporter, readable through [Metrics::snapshot].
use crate::parser::bmp::messages::BmpMsgType;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const MESSAGE_TYPES: [BmpMsgType; 8] = [
    BmpMsgType::RouteMonitoring,
    BmpMsgType::StatisticsReport,
    BmpMsgType::PeerDownNotification,
    BmpMsgType::PeerUpNotification,
    BmpMsgType::InitiationMessage,
    BmpMsgType::TerminationMessage,
    BmpMsgType::RouteMirroringMessage,
    BmpMsgType::Unknown(u8::MAX),
];

fn message_slot(msg_type: BmpMsgType) -> usize {
    match msg_type {
        BmpMsgType::RouteMonitoring => 0,
        BmpMsgType::StatisticsReport => 1,
        BmpMsgType::PeerDownNotification => 2,
        BmpMsgType::PeerUpNotification => 3,
        BmpMsgType::InitiationMessage => 4,
        BmpMsgType::TerminationMessage => 5,
        BmpMsgType::RouteMirroringMessage => 6,
        BmpMsgType::Unknown(_) => 7,
    }
}

/// Why a peer was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    Down,
    Stale,
}

impl RemovalReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RemovalReason::Down => "down",
            RemovalReason::Stale => "stale",
        }
    }
}

#[derive(Debug, Default)]
pub struct ExporterMetrics {
    pub opened_connections: AtomicU64,
    pub closed_connections: AtomicU64,
    pub peers: AtomicI64,
    pub routes: AtomicI64,
    pub panics: AtomicU64,
    pub receive_buffer_size: AtomicU64,
    messages: [AtomicU64; 8],
    peer_removals: [AtomicU64; 2],
    ignored_nlri: Mutex<BTreeMap<String, u64>>,
    errors: Mutex<BTreeMap<String, u64>>,
}

impl ExporterMetrics {
    pub fn message_received(&self, msg_type: BmpMsgType) {
        self.messages[message_slot(msg_type)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages(&self, msg_type: BmpMsgType) -> u64 {
        self.messages[message_slot(msg_type)].load(Ordering::Relaxed)
    }

    pub fn peer_removed(&self, reason: RemovalReason) {
        let slot = match reason {
            RemovalReason::Down => 0,
            RemovalReason::Stale => 1,
        };
        self.peer_removals[slot].fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_routes(&self, delta: i64) {
        self.routes.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn nlri_ignored(&self, family: &str) {
        *self.ignored_nlri.lock().entry(family.to_string()).or_default() += 1;
    }

    pub fn error(&self, reason: &str) {
        *self.errors.lock().entry(reason.to_string()).or_default() += 1;
    }

    pub fn errors(&self, reason: &str) -> u64 {
        self.errors.lock().get(reason).copied().unwrap_or_default()
    }

    pub fn snapshot(&self) -> ExporterSnapshot {
        ExporterSnapshot {
            opened_connections: self.opened_connections.load(Ordering::Relaxed),
            closed_connections: self.closed_connections.load(Ordering::Relaxed),
            peers: self.peers.load(Ordering::Relaxed),
            routes: self.routes.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
            receive_buffer_size: self.receive_buffer_size.load(Ordering::Relaxed),
            messages: MESSAGE_TYPES
                .iter()
                .map(|t| (t.to_string(), self.messages(*t)))
                .filter(|(_, count)| *count > 0)
                .collect(),
            peer_removals: [RemovalReason::Down, RemovalReason::Stale]
                .iter()
                .enumerate()
                .map(|(i, reason)| {
                    (
                        reason.as_str().to_string(),
                        self.peer_removals[i].load(Ordering::Relaxed),
                    )
                })
                .filter(|(_, count)| *count > 0)
                .collect(),
            ignored_nlri: self.ignored_nlri.lock().clone(),
            errors: self.errors.lock().clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ExporterSnapshot {
    pub opened_connections: u64,
    pub closed_connections: u64,
    pub peers: i64,
    pub routes: i64,
    pub panics: u64,
    pub receive_buffer_size: u64,
    pub messages: BTreeMap<String, u64>,
    pub peer_removals: BTreeMap<String, u64>,
    pub ignored_nlri: BTreeMap<String, u64>,
    pub errors: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub exporters: BTreeMap<IpAddr, ExporterSnapshot>,
    pub rib_lock_acquisitions: u64,
    pub rib_locked_micros: u64,
}

/// All collector metrics.
#[derive(Debug, Default)]
pub struct Metrics {
    exporters: Mutex<HashMap<IpAddr, Arc<ExporterMetrics>>>,
    rib_lock_acquisitions: AtomicU64,
    rib_locked_micros: AtomicU64,
}

impl Metrics {
    /// Metrics of one exporter, created on first use. IPv4-mapped addresses are unmapped.
    pub fn exporter(&self, exporter: IpAddr) -> Arc<ExporterMetrics> {
        let exporter = exporter.to_canonical();
        self.exporters.lock().entry(exporter).or_default().clone()
    }

    pub fn rib_locked(&self, elapsed: Duration) {
        self.rib_lock_acquisitions.fetch_add(1, Ordering::Relaxed);
        self.rib_locked_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let exporters = self
            .exporters
            .lock()
            .iter()
            .map(|(ip, metrics)| (*ip, metrics.snapshot()))
            .collect();
        MetricsSnapshot {
            exporters,
            rib_lock_acquisitions: self.rib_lock_acquisitions.load(Ordering::Relaxed),
            rib_locked_micros: self.rib_locked_micros.load(Ordering::Relaxed),
        }
    }
}
