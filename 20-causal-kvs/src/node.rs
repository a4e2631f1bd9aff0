//! Process-wide replica state shared by request handlers and background tasks.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::{
    causal::CausalToken,
    config::NodeConfig,
    error::KvsError,
    message::ReplicaMessage,
    peer::PeerClient,
    replicator::Replicator,
    store::{Deleted, Read, Store, Written},
    view::{JoinOutcome, ReplicaAddress, View},
};

/// Cheap-to-clone handle on one replica's store, view and replicator.
#[derive(Debug, Clone)]
pub struct Node {
    config: Arc<NodeConfig>,
    store: Arc<Store>,
    view: Arc<View>,
    replicator: Replicator,
}

impl Node {
    pub fn new(config: NodeConfig) -> reqwest::Result<Self> {
        let peers = PeerClient::new(&config)?;
        let view = Arc::new(View::new(config.initial_view()));
        let replicator = Replicator::new(peers, Arc::clone(&view), config.address.clone());
        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(Store::new()),
            view,
            replicator,
        })
    }

    pub fn address(&self) -> &str {
        &self.config.address
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn peer_client(&self) -> &PeerClient {
        self.replicator.peer_client()
    }

    /// Client read of `key`, gated on what `token` says the client has seen.
    pub fn get(&self, key: &str, token: &CausalToken) -> Result<Read, KvsError> {
        self.store.read(key, token.dependency(key))
    }

    /// Client write of `key`. On success the mutation is sent to the other
    /// members without waiting for them.
    pub fn put(&self, key: &str, value: Value, token: &CausalToken) -> Result<Written, KvsError> {
        let written = self
            .store
            .put(key, value.clone(), token.dependency(key))?;
        debug!(key, version = written.version, created = written.created, "stored");
        self.replicator
            .propagate(ReplicaMessage::put(key, value, written.version));
        Ok(written)
    }

    pub fn delete(&self, key: &str, token: &CausalToken) -> Result<Deleted, KvsError> {
        let deleted = self.store.delete(key, token.dependency(key))?;
        debug!(key, version = deleted.version, "deleted");
        self.replicator
            .propagate(ReplicaMessage::delete(key, deleted.version));
        Ok(deleted)
    }

    /// Adds `addr` to the view and broadcasts the result if it was new.
    pub fn join(&self, addr: &str) -> JoinOutcome {
        let outcome = self.view.join(addr);
        if outcome == JoinOutcome::Added {
            info!(member = %addr, "replica joined view");
            self.replicator.broadcast_view();
        }
        outcome
    }

    /// Removes `addr` from the view and broadcasts the result.
    pub fn leave(&self, addr: &str) -> Result<(), KvsError> {
        self.view.leave(addr)?;
        info!(member = %addr, "replica removed from view");
        self.replicator.broadcast_view();
        Ok(())
    }

    /// Takes a view pushed by a peer as-is.
    pub fn accept_view(&self, members: Vec<ReplicaAddress>) {
        debug!(?members, "view replaced");
        self.view.replace(members);
    }

    /// Drops every address in `failed` that is still a member and broadcasts
    /// once if anything changed. Returns how many were removed.
    pub fn evict(&self, failed: &[ReplicaAddress]) -> usize {
        let mut removed = 0;
        for addr in failed {
            if self.view.leave(addr).is_ok() {
                info!(member = %addr, "replica unresponsive, evicted from view");
                removed += 1;
            }
        }
        if removed > 0 {
            self.replicator.broadcast_view();
        }
        removed
    }
}
