//! Periodic liveness probing of the other view members.
//!
//! One failed probe is enough to evict a peer: there is no retry, quorum or
//! back-off, so a transient hiccup also removes it.

use futures_util::future::join_all;
use tokio::{
    select,
    sync::watch,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{debug, info, warn};

use crate::{node::Node, view::ReplicaAddress};

pub struct FailureDetector {
    node: Node,
}

impl FailureDetector {
    pub fn new(node: Node) -> Self {
        Self { node }
    }

    /// Probes every `probe_interval`, starting one interval from now, until
    /// `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let period = self.node.config().probe_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                _ = ticker.tick() => {
                    self.probe_round().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("failure detector stopped");
    }

    /// Probes all peers concurrently, evicts the ones that failed and returns
    /// their addresses.
    pub async fn probe_round(&self) -> Vec<ReplicaAddress> {
        let peers = self.node.view().peers(self.node.address());
        let client = self.node.peer_client();
        let results = join_all(peers.iter().map(|addr| client.probe(addr))).await;

        let failed: Vec<ReplicaAddress> = peers
            .into_iter()
            .zip(results)
            .filter_map(|(addr, result)| match result {
                Ok(()) => {
                    debug!(peer = %addr, "probe ok");
                    None
                }
                Err(err) => {
                    warn!(peer = %addr, error = ?err, "probe failed");
                    Some(addr)
                }
            })
            .collect();

        if !failed.is_empty() {
            self.node.evict(&failed);
        }
        failed
    }
}
