//! Best-effort fan-out to the rest of the view.
//!
//! Each delivery runs on its own detached tokio task. Delivery is at most
//! once: a failure is logged and forgotten, and a peer that misses an update
//! only catches up through a later bootstrap sync.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    message::{ReplicaMessage, ViewBody},
    peer::PeerClient,
    view::{ReplicaAddress, View},
};

#[derive(Debug, Clone)]
pub struct Replicator {
    peers: PeerClient,
    view: Arc<View>,
    self_addr: ReplicaAddress,
}

impl Replicator {
    pub fn new(peers: PeerClient, view: Arc<View>, self_addr: ReplicaAddress) -> Self {
        Self {
            peers,
            view,
            self_addr,
        }
    }

    pub fn peer_client(&self) -> &PeerClient {
        &self.peers
    }

    /// Forwards a local mutation to every other member of the current view.
    pub fn propagate(&self, message: ReplicaMessage) {
        let message = Arc::new(message);
        for addr in self.view.peers(&self.self_addr) {
            let peers = self.peers.clone();
            let message = Arc::clone(&message);
            tokio::spawn(async move {
                match peers.replicate(&addr, &message).await {
                    Ok(()) => debug!(
                        peer = %addr,
                        key = %message.key,
                        version = message.version,
                        "replicated"
                    ),
                    Err(err) => warn!(
                        peer = %addr,
                        key = %message.key,
                        version = message.version,
                        error = ?err,
                        "replication dropped"
                    ),
                }
            });
        }
    }

    /// Pushes the full current view to every other member, including any
    /// member that just joined.
    pub fn broadcast_view(&self) {
        let body = Arc::new(ViewBody {
            view: self.view.snapshot(),
        });
        let targets: Vec<ReplicaAddress> = body
            .view
            .iter()
            .filter(|addr| **addr != self.self_addr)
            .cloned()
            .collect();
        for addr in targets {
            let peers = self.peers.clone();
            let body = Arc::clone(&body);
            tokio::spawn(async move {
                match peers.push_view(&addr, &body).await {
                    Ok(()) => debug!(peer = %addr, "view update sent"),
                    Err(err) => warn!(peer = %addr, error = ?err, "view update dropped"),
                }
            });
        }
    }
}
