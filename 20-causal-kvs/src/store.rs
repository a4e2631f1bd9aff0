//! In-memory key-value storage with per-key versions.
//!
//! Values and versions live in one [`Entries`] behind a single mutex, so a
//! reader always sees a value together with the version it was written at.
//! Client operations take the caller's [`Dependency`] and run the causal check
//! inside the same critical section as the mutation.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::{
    causal::{CausalToken, Dependency},
    error::KvsError,
    message::{ReplicaMessage, ReplicaMethod, SyncBody},
};

pub const MAX_KEY_LEN: usize = 50;

/// Rejects keys longer than [`MAX_KEY_LEN`] characters.
pub fn validate_key(key: &str) -> Result<(), KvsError> {
    if key.chars().count() > MAX_KEY_LEN {
        return Err(KvsError::KeyTooLong);
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Entries {
    values: BTreeMap<String, Value>,
    // Outlives the value on delete so later checks keep comparing against it.
    versions: BTreeMap<String, u64>,
}

impl Entries {
    fn version(&self, key: &str) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    /// Next version of `key`. A peer may hand us `u64::MAX`; the counter
    /// then stays there instead of wrapping back to zero.
    fn bump(&mut self, key: &str) -> u64 {
        let version = self.versions.entry(key.to_string()).or_insert(0);
        *version = version.saturating_add(1);
        *version
    }

    /// Every known version, including those of deleted keys.
    fn token(&self) -> CausalToken {
        self.versions
            .iter()
            .map(|(key, version)| (key.clone(), *version))
            .collect()
    }
}

/// Current state of one key.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub value: Option<Value>,
    pub version: u64,
}

impl Lookup {
    /// `true` when the key currently holds a value.
    pub fn found(&self) -> bool {
        self.value.is_some()
    }
}

/// A successful client read: the value plus the token to hand back.
#[derive(Debug, Clone, PartialEq)]
pub struct Read {
    pub value: Value,
    pub token: CausalToken,
}

/// A successful client write.
#[derive(Debug, Clone, PartialEq)]
pub struct Written {
    pub version: u64,
    /// `false` when an existing value was replaced.
    pub created: bool,
    pub token: CausalToken,
}

/// A successful client delete. `version` is the key's new version.
#[derive(Debug, Clone, PartialEq)]
pub struct Deleted {
    pub version: u64,
    pub token: CausalToken,
}

/// Process-wide key-value store shared by handlers and bootstrap.
///
/// A plain `Mutex` is enough: every critical section is a few map operations
/// with no `.await` inside, and both maps must change together. `BTreeMap`
/// keeps snapshots and tokens in key order.
#[derive(Debug, Default)]
pub struct Store {
    entries: Mutex<Entries>,
}

impl Store {
    /// Creates an empty store; every key starts at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // Every critical section leaves both maps consistent, so a panic
        // elsewhere does not invalidate the data.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Value and version of `key`, without any causal check.
    pub fn get(&self, key: &str) -> Lookup {
        let entries = self.lock();
        Lookup {
            value: entries.values.get(key).cloned(),
            version: entries.version(key),
        }
    }

    /// Serves a client read once `dependency` is satisfied.
    ///
    /// The gate runs before the existence check, so a key this replica has not
    /// caught up on yields [`KvsError::CausalNotSatisfied`] rather than
    /// [`KvsError::KeyNotFound`].
    pub fn read(&self, key: &str, dependency: Dependency) -> Result<Read, KvsError> {
        validate_key(key)?;
        let entries = self.lock();
        dependency.check_read(key, entries.version(key))?;
        let value = entries
            .values
            .get(key)
            .cloned()
            .ok_or(KvsError::KeyNotFound)?;
        Ok(Read {
            value,
            token: entries.token(),
        })
    }

    /// Inserts or replaces `key` and bumps its version by one.
    ///
    /// `dependency` must match the current version exactly; otherwise nothing
    /// changes.
    pub fn put(
        &self,
        key: &str,
        value: Value,
        dependency: Dependency,
    ) -> Result<Written, KvsError> {
        validate_key(key)?;
        let mut entries = self.lock();
        dependency.check_write(key, entries.version(key))?;
        let created = entries.values.insert(key.to_string(), value).is_none();
        let version = entries.bump(key);
        Ok(Written {
            version,
            created,
            token: entries.token(),
        })
    }

    /// Removes the value of `key` and bumps its version by one.
    ///
    /// The version survives the delete, so a later put starts from it.
    pub fn delete(&self, key: &str, dependency: Dependency) -> Result<Deleted, KvsError> {
        validate_key(key)?;
        let mut entries = self.lock();
        dependency.check_write(key, entries.version(key))?;
        if entries.values.remove(key).is_none() {
            return Err(KvsError::KeyNotFound);
        }
        let version = entries.bump(key);
        Ok(Deleted {
            version,
            token: entries.token(),
        })
    }

    /// Applies a mutation received from a peer.
    ///
    /// The carried version overwrites the local one without comparison, so a
    /// late message for an older version rolls the key back. Peers deliver
    /// independently with their own timeouts, which makes that reordering
    /// possible.
    pub fn apply_replicated(&self, message: &ReplicaMessage) {
        let mut entries = self.lock();
        entries
            .versions
            .insert(message.key.clone(), message.version);
        match message.method {
            ReplicaMethod::Put => {
                entries
                    .values
                    .insert(message.key.clone(), message.value.clone());
            }
            ReplicaMethod::Delete => {
                entries.values.remove(&message.key);
            }
        }
    }

    /// Copy of every value and version, taken under one lock.
    pub fn snapshot(&self) -> SyncBody {
        let entries = self.lock();
        SyncBody {
            kvs: entries.values.clone(),
            causal_metadata: entries.token(),
        }
    }

    /// Overwrites local entries with those in `snapshot`. Keys absent from the
    /// snapshot are left alone.
    pub fn merge(&self, snapshot: SyncBody) {
        let mut entries = self.lock();
        entries.values.extend(snapshot.kvs);
        for (key, version) in snapshot.causal_metadata.iter() {
            entries.versions.insert(key.clone(), *version);
        }
    }

    /// Number of keys that currently hold a value.
    pub fn len(&self) -> usize {
        self.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
