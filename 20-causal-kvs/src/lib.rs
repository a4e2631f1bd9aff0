//! Replicated in-memory key-value store with per-key causal versions.
//!
//! Every replica serves reads and writes on its own and forwards each local
//! mutation to the rest of the view on a best-effort basis. Clients carry a
//! `causal-metadata` map between calls so a replica never serves them a value
//! older than one they have already seen, nor lets them overwrite one.
//!
//! - [`store`] holds values and versions behind one lock.
//! - [`causal`] is the dependency gate applied to client operations.
//! - [`view`] is the membership set.
//! - [`replicator`] fans mutations and view changes out to peers.
//! - [`detector`] probes peers and evicts the ones that stop answering.
//! - [`bootstrap`] pulls view and store from a live peer at startup.
//! - [`api`] and [`server`] expose it all over HTTP/JSON.

pub mod api;
pub mod bootstrap;
pub mod causal;
pub mod cli;
pub mod config;
pub mod detector;
pub mod error;
pub mod message;
pub mod node;
pub mod peer;
pub mod replicator;
pub mod server;
pub mod store;
pub mod view;
