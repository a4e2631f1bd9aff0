//! Outbound HTTP calls to other replicas.
//!
//! Every call has a bounded timeout and redirects are never followed. Any
//! transport error or non-2xx answer comes back as a [`PeerError`].

use std::time::Duration;

use reqwest::{RequestBuilder, Response, redirect};
use serde::de::DeserializeOwned;

use crate::{
    config::NodeConfig,
    error::PeerError,
    message::{MemberBody, ReplicaMessage, SyncBody, ViewBody},
    view::ReplicaAddress,
};

#[derive(Debug, Clone)]
pub struct PeerClient {
    http: reqwest::Client,
    probe_timeout: Duration,
    sync_timeout: Duration,
}

impl PeerClient {
    pub fn new(config: &NodeConfig) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(config.replication_timeout)
            .build()?;
        Ok(Self {
            http,
            probe_timeout: config.probe_timeout,
            sync_timeout: config.sync_timeout,
        })
    }

    /// `PUT /replica`
    pub async fn replicate(&self, addr: &str, message: &ReplicaMessage) -> Result<(), PeerError> {
        let request = self.http.put(url(addr, "/replica")).json(message);
        send(addr, request).await.map(drop)
    }

    /// `PUT /view/update`
    pub async fn push_view(&self, addr: &str, view: &ViewBody) -> Result<(), PeerError> {
        let request = self.http.put(url(addr, "/view/update")).json(view);
        send(addr, request).await.map(drop)
    }

    /// `PUT /view` asking `addr` to add `member` to its view.
    pub async fn announce(&self, addr: &str, member: &str) -> Result<(), PeerError> {
        let body = MemberBody {
            socket_address: member.to_string(),
        };
        let request = self.http.put(url(addr, "/view")).json(&body);
        send(addr, request).await.map(drop)
    }

    /// `GET /health`
    pub async fn probe(&self, addr: &str) -> Result<(), PeerError> {
        let request = self
            .http
            .get(url(addr, "/health"))
            .timeout(self.probe_timeout);
        send(addr, request).await.map(drop)
    }

    /// `GET /view`
    pub async fn fetch_view(&self, addr: &str) -> Result<Vec<ReplicaAddress>, PeerError> {
        let request = self.http.get(url(addr, "/view")).timeout(self.sync_timeout);
        let body: ViewBody = decode(addr, send(addr, request).await?).await?;
        Ok(body.view)
    }

    /// `GET /kvs/sync`
    pub async fn fetch_snapshot(&self, addr: &str) -> Result<SyncBody, PeerError> {
        let request = self
            .http
            .get(url(addr, "/kvs/sync"))
            .timeout(self.sync_timeout);
        decode(addr, send(addr, request).await?).await
    }
}

fn url(addr: &str, path: &str) -> String {
    format!("http://{addr}{path}")
}

async fn send(addr: &str, request: RequestBuilder) -> Result<Response, PeerError> {
    let response = request.send().await.map_err(|source| PeerError::Request {
        addr: addr.to_string(),
        source,
    })?;
    let status = response.status();
    if !status.is_success() {
        return Err(PeerError::Status {
            addr: addr.to_string(),
            status,
        });
    }
    Ok(response)
}

async fn decode<T: DeserializeOwned>(addr: &str, response: Response) -> Result<T, PeerError> {
    response.json().await.map_err(|source| PeerError::Decode {
        addr: addr.to_string(),
        source,
    })
}
