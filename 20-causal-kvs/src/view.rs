//! Cluster membership as this replica currently believes it.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::KvsError;

/// `host:port` of a replica. Only ever compared and used as a destination.
pub type ReplicaAddress = String;

/// Result of [`View::join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Added,
    AlreadyPresent,
}

/// The set of replicas believed to be live.
///
/// Every read and write goes through one mutex. [`View::replace`] overwrites
/// the whole set: a join or leave that lands between a peer taking its
/// snapshot and this replica accepting it is lost.
#[derive(Debug, Default)]
pub struct View {
    members: Mutex<BTreeSet<ReplicaAddress>>,
}

impl View {
    /// Creates a view holding `members`, duplicates collapsed.
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ReplicaAddress>,
    {
        Self {
            members: Mutex::new(members.into_iter().map(Into::into).collect()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<ReplicaAddress>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `addr`. Joining an existing member changes nothing.
    pub fn join(&self, addr: &str) -> JoinOutcome {
        if self.lock().insert(addr.to_string()) {
            JoinOutcome::Added
        } else {
            JoinOutcome::AlreadyPresent
        }
    }

    /// Removes `addr`, or fails with [`KvsError::ReplicaNotFound`] if it is
    /// not a member.
    pub fn leave(&self, addr: &str) -> Result<(), KvsError> {
        if self.lock().remove(addr) {
            Ok(())
        } else {
            Err(KvsError::ReplicaNotFound)
        }
    }

    /// Last writer wins; no merge with the current membership.
    pub fn replace<I, S>(&self, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<ReplicaAddress>,
    {
        let members = members.into_iter().map(Into::into).collect();
        *self.lock() = members;
    }

    /// Current members in sorted order, copied under the lock.
    pub fn snapshot(&self) -> Vec<ReplicaAddress> {
        self.lock().iter().cloned().collect()
    }

    /// Every member except `self_addr`.
    pub fn peers(&self, self_addr: &str) -> Vec<ReplicaAddress> {
        self.lock()
            .iter()
            .filter(|addr| addr.as_str() != self_addr)
            .cloned()
            .collect()
    }

    /// Whether `addr` is currently a member.
    pub fn contains(&self, addr: &str) -> bool {
        self.lock().contains(addr)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
