//! Harness for running real replicas on localhost.

#![allow(dead_code)]

use std::time::Duration;

use anyhow::{Result, anyhow};
use causal_kvs::{config::NodeConfig, node::Node, server::Server};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle, time::sleep};

pub const WAIT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(25);
/// Long enough that the detector never fires during a test.
pub const QUIET: Duration = Duration::from_secs(3600);

pub struct Replica {
    pub addr: String,
    pub node: Node,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl Replica {
    /// Starts a replica whose view is `seeds` plus itself.
    pub async fn start(seeds: &[&str], probe_interval: Duration) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Self::start_on(listener, seeds, probe_interval).await
    }

    pub async fn start_on(
        listener: TcpListener,
        seeds: &[&str],
        probe_interval: Duration,
    ) -> Result<Self> {
        let addr = listener.local_addr()?.to_string();
        let config = NodeConfig::new(addr.clone())
            .with_seeds(seeds.iter().copied())
            .with_probe_interval(probe_interval);
        let server = Server::new(listener, config)?;
        let node = server.node().clone();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(server.run_until(async move {
            let _ = shutdown_rx.await;
        }));

        let replica = Self {
            addr,
            node,
            shutdown: Some(shutdown_tx),
            task,
        };
        replica.wait_healthy().await?;
        Ok(replica)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn wait_healthy(&self) -> Result<()> {
        let client = reqwest::Client::new();
        let url = self.url("/health");
        wait_for("replica to serve /health", || {
            let request = client.get(&url).send();
            async move { matches!(request.await, Ok(resp) if resp.status().is_success()) }
        })
        .await
    }

    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task.await?
    }
}

/// Polls `check` until it holds or [`WAIT`] elapses.
pub async fn wait_for<F, Fut>(what: &str, mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        if check().await {
            return Ok(());
        }
        if tokio::time::Instant::now() > deadline {
            return Err(anyhow!("timed out waiting for {what}"));
        }
        sleep(POLL).await;
    }
}

/// An address nothing is listening on.
pub async fn dead_addr() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    Ok(listener.local_addr()?.to_string())
}

pub fn sorted<S: AsRef<str>>(addrs: &[S]) -> Vec<String> {
    let mut addrs: Vec<String> = addrs.iter().map(|a| a.as_ref().to_string()).collect();
    addrs.sort();
    addrs
}
