//! Startup catch-up: adopt a live peer's view and store, then announce self.
//!
//! Runs once before the server accepts requests, so merging the fetched
//! snapshot over local state needs no reconciliation.

use tracing::{info, warn};

use crate::{node::Node, view::ReplicaAddress};

/// Where bootstrap got its state from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub view_source: Option<ReplicaAddress>,
    pub store_source: Option<ReplicaAddress>,
    pub announced_to: Vec<ReplicaAddress>,
}

pub async fn bootstrap(node: &Node) -> BootstrapReport {
    let mut report = BootstrapReport::default();
    let client = node.peer_client();
    let me = node.address();

    for addr in node.view().peers(me) {
        match client.fetch_view(&addr).await {
            Ok(members) => {
                info!(peer = %addr, ?members, "adopted view from peer");
                node.view().replace(members);
                report.view_source = Some(addr);
                break;
            }
            Err(err) => warn!(peer = %addr, error = ?err, "could not fetch view"),
        }
    }
    // The fetched view may predate this node; it always lists itself.
    node.view().join(me);

    for addr in node.view().peers(me) {
        match client.fetch_snapshot(&addr).await {
            Ok(snapshot) => {
                info!(peer = %addr, keys = snapshot.kvs.len(), "synced store from peer");
                node.store().merge(snapshot);
                report.store_source = Some(addr);
                break;
            }
            Err(err) => warn!(peer = %addr, error = ?err, "could not fetch store snapshot"),
        }
    }

    for addr in node.view().peers(me) {
        let client = client.clone();
        let me = me.to_string();
        report.announced_to.push(addr.clone());
        tokio::spawn(async move {
            match client.announce(&addr, &me).await {
                Ok(()) => info!(peer = %addr, "announced self"),
                Err(err) => warn!(peer = %addr, error = ?err, "announce failed"),
            }
        });
    }

    report
}
