/*!
BMP collector: accepts exporter connections, keeps the routes they send in a [Rib] and answers
lookups for flow enrichment.

A single [Collector] is shared behind an [Arc](std::sync::Arc) by the accept loop, every
exporter session, the stale peer timer and the lookup callers. RIB mutations happen under the
write side of one [RwLock], lookups under its read side.

```no_run
use bmp_rib::collector::{Collector, CollectorConfig};
use std::sync::Arc;

# async fn example() -> Result<(), bmp_rib::CollectorError> {
let collector = Arc::new(Collector::new(CollectorConfig::default()));
let listener = collector.listen().await?;
tokio::spawn(collector.clone().serve(listener));

let _result = collector.lookup(
    "192.0.2.10".parse().unwrap(),
    "198.51.100.1".parse().unwrap(),
    "203.0.113.1".parse().unwrap(),
);
# Ok(())
# }
```
*/
mod config;
mod events;
mod lookup;
mod metrics;
mod peers;
mod server;

pub use config::CollectorConfig;
pub use lookup::LookupResult;
pub use metrics::{ExporterMetrics, ExporterSnapshot, Metrics, MetricsSnapshot, RemovalReason};
pub use peers::{PeerInfo, PeerKey};

use crate::models::RouteDistinguisher;
use crate::rib::{PeerRef, Rib};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Everything guarded by the collector lock.
#[derive(Debug, Default)]
pub(crate) struct CollectorState {
    pub(crate) rib: Rib,
    pub(crate) peers: HashMap<PeerKey, PeerInfo>,
    pub(crate) last_peer_reference: PeerRef,
}

#[derive(Debug)]
pub struct Collector {
    config: CollectorConfig,
    accepted_rds: HashSet<RouteDistinguisher>,
    state: RwLock<CollectorState>,
    metrics: Metrics,
    /// Set once the first exporter connected.
    active: AtomicBool,
    /// Earliest pending stale deadline, watched by the stale timer.
    stale_deadline: watch::Sender<Option<Instant>>,
    cancel: CancellationToken,
}

impl Collector {
    pub fn new(config: CollectorConfig) -> Collector {
        let accepted_rds = config.rds.iter().copied().collect();
        let (stale_deadline, _) = watch::channel(None);
        Collector {
            config,
            accepted_rds,
            state: RwLock::new(CollectorState::default()),
            metrics: Metrics::default(),
            active: AtomicBool::new(false),
            stale_deadline,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Token cancelled when the collector stops.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop accepting connections, close every session and stop the stale timer.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub(crate) fn set_active(&self) {
        self.active.store(true, Ordering::Relaxed);
    }

    /// Whether routes with `rd` are kept. An empty allow-list accepts everything.
    pub fn is_accepted_rd(&self, rd: RouteDistinguisher) -> bool {
        self.accepted_rds.is_empty() || self.accepted_rds.contains(&rd)
    }

    /// Number of known peers.
    pub fn peers(&self) -> usize {
        self.state.read().peers.len()
    }

    /// Number of routes in the RIB.
    pub fn routes(&self) -> usize {
        self.state.read().rib.len()
    }

    /// Run `f` with the write lock held, accounting for the time spent.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut CollectorState) -> R) -> R {
        let start = std::time::Instant::now();
        let result = {
            let mut state = self.state.write();
            f(&mut state)
        };
        self.metrics.rib_locked(start.elapsed());
        result
    }

    pub(crate) fn read_state<R>(&self, f: impl FnOnce(&CollectorState) -> R) -> R {
        f(&self.state.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_rds() {
        let collector = Collector::new(CollectorConfig::default());
        assert!(collector.is_accepted_rd(RouteDistinguisher(0)));
        assert!(collector.is_accepted_rd("65017:104".parse().unwrap()));

        let collector = Collector::new(CollectorConfig {
            rds: vec!["65017:104".parse().unwrap()],
            ..Default::default()
        });
        assert!(!collector.is_accepted_rd(RouteDistinguisher(0)));
        assert!(collector.is_accepted_rd("65017:104".parse().unwrap()));
        assert!(!collector.is_accepted_rd("65017:105".parse().unwrap()));
    }

    #[test]
    fn test_with_state_counts_lock() {
        let collector = Collector::new(CollectorConfig::default());
        assert!(!collector.is_active());
        collector.with_state(|state| state.last_peer_reference += 1);
        assert_eq!(collector.read_state(|state| state.last_peer_reference), 1);
        assert_eq!(collector.metrics().snapshot().rib_lock_acquisitions, 1);
    }
}
