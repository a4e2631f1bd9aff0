use std::{net::SocketAddr, time::Duration};

use clap::Parser;

use crate::config::{NodeConfig, PROBE_INTERVAL, parse_seeds};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// This replica's own address, as peers reach it.
    #[arg(long, env = "SOCKET_ADDRESS")]
    pub address: String,

    /// Address to bind. Defaults to `--address`.
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// Comma-separated addresses of the initial cluster members.
    #[arg(long, env = "VIEW", default_value = "")]
    pub view: String,

    /// Milliseconds between failure detector rounds. Must be at least 1.
    #[arg(
        long,
        value_parser = clap::value_parser!(u64).range(1..),
        default_value_t = PROBE_INTERVAL.as_millis() as u64
    )]
    pub probe_interval_ms: u64,
}

impl Cli {
    pub fn bind_addr(&self) -> String {
        match self.listen {
            Some(addr) => addr.to_string(),
            None => self.address.clone(),
        }
    }

    pub fn node_config(&self) -> NodeConfig {
        NodeConfig::new(self.address.clone())
            .with_seeds(parse_seeds(&self.view))
            .with_probe_interval(Duration::from_millis(self.probe_interval_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_build_node_config() {
        let cli = Cli::try_parse_from([
            "causal_kvs",
            "--address",
            "10.10.0.2:8090",
            "--view",
            "10.10.0.2:8090,10.10.0.3:8090",
            "--probe-interval-ms",
            "250",
        ])
        .unwrap();

        assert_eq!(cli.bind_addr(), "10.10.0.2:8090");
        let config = cli.node_config();
        assert_eq!(config.address, "10.10.0.2:8090");
        assert_eq!(config.seeds.len(), 2);
        assert_eq!(config.probe_interval, Duration::from_millis(250));
    }

    #[test]
    fn listen_overrides_bind_address() {
        let cli = Cli::try_parse_from([
            "causal_kvs",
            "--address",
            "10.10.0.2:8090",
            "--listen",
            "0.0.0.0:8090",
        ])
        .unwrap();
        assert_eq!(cli.bind_addr(), "0.0.0.0:8090");
        assert_eq!(cli.node_config().address, "10.10.0.2:8090");
    }

    #[test]
    fn zero_probe_interval_is_rejected() {
        let parsed = Cli::try_parse_from([
            "causal_kvs",
            "--address",
            "10.10.0.2:8090",
            "--probe-interval-ms",
            "0",
        ]);
        assert!(parsed.is_err());

        let cli = Cli::try_parse_from(["causal_kvs", "--address", "10.10.0.2:8090"]).unwrap();
        assert_eq!(cli.node_config().probe_interval, PROBE_INTERVAL);
    }
}
