use std::time::Duration;

use crate::view::ReplicaAddress;

/// Timeout for a single replication or view broadcast call.
pub const REPLICATION_TIMEOUT: Duration = Duration::from_millis(750);
/// Timeout for a single health probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(750);
/// Timeout for each bootstrap fetch (view or full store).
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(2);
/// Pause between failure detector rounds.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(5);
/// Shortest pause the detector accepts; a zero period cannot drive a timer.
pub const MIN_PROBE_INTERVAL: Duration = Duration::from_millis(1);

/// Settings for one replica process.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// This replica's own `host:port`, as other members know it.
    pub address: ReplicaAddress,
    /// Initial membership. The node's own address is added if missing.
    pub seeds: Vec<ReplicaAddress>,
    pub replication_timeout: Duration,
    pub probe_timeout: Duration,
    pub sync_timeout: Duration,
    pub probe_interval: Duration,
}

impl NodeConfig {
    pub fn new(address: impl Into<ReplicaAddress>) -> Self {
        Self {
            address: address.into(),
            seeds: Vec::new(),
            replication_timeout: REPLICATION_TIMEOUT,
            probe_timeout: PROBE_TIMEOUT,
            sync_timeout: SYNC_TIMEOUT,
            probe_interval: PROBE_INTERVAL,
        }
    }

    pub fn with_seeds<I, S>(mut self, seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ReplicaAddress>,
    {
        self.seeds = seeds.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the detector period, raised to [`MIN_PROBE_INTERVAL`] if shorter.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval.max(MIN_PROBE_INTERVAL);
        self
    }

    /// Seeds plus this node's own address, deduplicated.
    pub fn initial_view(&self) -> Vec<ReplicaAddress> {
        let mut members: Vec<ReplicaAddress> = self
            .seeds
            .iter()
            .filter(|addr| !addr.is_empty())
            .cloned()
            .collect();
        members.push(self.address.clone());
        members.sort();
        members.dedup();
        members
    }
}

/// Splits a comma-separated address list such as the `VIEW` variable.
pub fn parse_seeds(raw: &str) -> Vec<ReplicaAddress> {
    raw.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .collect()
}
