//! Per-key causal dependency checking.
//!
//! A client carries a [`CausalToken`] between calls: the version it last saw
//! for each key. Before a client operation touches a key, the store asks the
//! [`Dependency`] extracted from that token whether the local version is
//! acceptable.
//!
//! This is a per-key scalar check, not a vector clock. It stops a client from
//! reading behind or overwriting a version it has already observed, but it
//! only orders keys across each other if the client keeps sending the whole
//! map back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::KvsError;

/// Key to version map exchanged with clients as `causal-metadata`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CausalToken(BTreeMap<String, u64>);

impl CausalToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a token from arbitrary client JSON.
    ///
    /// Anything that is not an object yields an empty token, and entries
    /// whose value is not a non-negative integer are dropped.
    pub fn from_json(value: &Value) -> Self {
        let Some(entries) = value.as_object() else {
            return Self::default();
        };
        entries
            .iter()
            .filter_map(|(key, version)| version.as_u64().map(|v| (key.clone(), v)))
            .collect()
    }

    /// Version the client last saw for `key`, if any.
    pub fn get(&self, key: &str) -> Option<u64> {
        self.0.get(key).copied()
    }

    /// Records `version` for `key`, replacing any earlier entry.
    pub fn insert(&mut self, key: impl Into<String>, version: u64) {
        self.0.insert(key.into(), version);
    }

    /// What this token requires of `key` before an operation may proceed.
    pub fn dependency(&self, key: &str) -> Dependency {
        Dependency::from(self.get(key))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &u64)> {
        self.0.iter()
    }
}

impl FromIterator<(String, u64)> for CausalToken {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// What a client claims to have seen of a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dependency {
    /// No entry for the key: proceed unconditionally.
    #[default]
    None,
    /// The client last saw this version of the key.
    Observed(u64),
}

impl From<Option<u64>> for Dependency {
    fn from(version: Option<u64>) -> Self {
        match version {
            Some(v) => Dependency::Observed(v),
            None => Dependency::None,
        }
    }
}

impl Dependency {
    /// Reads are served unless the client has seen a version this replica
    /// does not have yet.
    pub fn check_read(self, key: &str, current: u64) -> Result<(), KvsError> {
        match self {
            Dependency::Observed(expected) if expected > current => {
                Err(not_satisfied(key, expected, current))
            }
            _ => Ok(()),
        }
    }

    /// Writes require the client to be exactly at the current version. Being
    /// ahead is rejected as well as being behind.
    pub fn check_write(self, key: &str, current: u64) -> Result<(), KvsError> {
        match self {
            Dependency::Observed(expected) if expected != current => {
                Err(not_satisfied(key, expected, current))
            }
            _ => Ok(()),
        }
    }
}

fn not_satisfied(key: &str, expected: u64, current: u64) -> KvsError {
    KvsError::CausalNotSatisfied {
        key: key.to_string(),
        expected,
        current,
    }
}
