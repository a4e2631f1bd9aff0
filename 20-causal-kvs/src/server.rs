use std::{future::Future, net::SocketAddr};

use anyhow::{Context, Result};
use tokio::{net::TcpListener, sync::watch};
use tracing::{info, warn};

use crate::{
    api, bootstrap::bootstrap, config::NodeConfig, detector::FailureDetector, node::Node,
};

/// One replica: an HTTP listener plus its shared [`Node`].
pub struct Server {
    listener: TcpListener,
    node: Node,
}

impl Server {
    pub fn new(listener: TcpListener, config: NodeConfig) -> Result<Self> {
        let node = Node::new(config).context("failed to build peer http client")?;
        Ok(Self { listener, node })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Bootstraps from peers, then serves requests and runs the failure
    /// detector until `shutdown` resolves.
    ///
    /// Replication tasks still in flight at shutdown are dropped with the
    /// runtime.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Server { listener, node } = self;

        let report = bootstrap(&node).await;
        info!(
            view_source = ?report.view_source,
            store_source = ?report.store_source,
            announced_to = ?report.announced_to,
            view = ?node.view().snapshot(),
            "bootstrap finished"
        );

        let (stop_tx, stop_rx) = watch::channel(false);
        let detector = tokio::spawn(FailureDetector::new(node.clone()).run(stop_rx));

        info!(address = %node.address(), "replica serving");
        let served = axum::serve(listener, api::router(node))
            .with_graceful_shutdown(shutdown)
            .await
            .context("http server failed");

        let _ = stop_tx.send(true);
        if let Err(err) = detector.await {
            warn!(error = ?err, "failure detector task ended abnormally");
        }
        info!("replica stopped");

        served
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}
