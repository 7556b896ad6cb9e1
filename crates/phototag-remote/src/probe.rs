//! TCP-based network availability probe
//!
//! Opening a TCP connection to a well-known address (a public DNS resolver
//! by default) is a cheap, portable stand-in for the platform's
//! "network available" signal. The connection is dropped immediately.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpStream;
use tracing::trace;

use phototag_core::config::Config;
use phototag_core::ports::INetworkProbe;

/// Network probe that attempts a TCP connect with a timeout
#[derive(Debug, Clone)]
pub struct TcpNetworkProbe {
    address: SocketAddr,
    timeout: Duration,
}

impl TcpNetworkProbe {
    /// Creates a probe for `address`
    pub fn new(address: SocketAddr, timeout: Duration) -> Self {
        Self { address, timeout }
    }

    /// Builds a probe from the `network` section of the configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let address = config
            .network
            .probe_address
            .parse()
            .with_context(|| format!("Invalid probe address {}", config.network.probe_address))?;
        Ok(Self::new(address, config.probe_timeout()))
    }
}

#[async_trait::async_trait]
impl INetworkProbe for TcpNetworkProbe {
    async fn has_network(&self) -> bool {
        let up = matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect(self.address)).await,
            Ok(Ok(_))
        );
        trace!(address = %self.address, up, "Network probe");
        up
    }
}
