//! Worker connection pool
//!
//! Opens one gRPC channel per worker address up front. Addresses that fail
//! to connect are dropped from the pool and kept as diagnostics; only a pool
//! with no live worker is an error.

use crate::error::{ConnectionError, ConnectionResult};
use crate::proto::build_service_client::BuildServiceClient;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info, warn};

/// Default per-address connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum gRPC message size in either direction
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = i32::MAX as usize;

/// Connection options applied to every worker
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    pub connect_timeout: Duration,
    pub max_message_size: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// A connected worker
#[derive(Debug, Clone)]
pub struct WorkerEndpoint {
    address: String,
    client: BuildServiceClient<Channel>,
}

impl WorkerEndpoint {
    /// Worker address as `host:port`
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Client handle for this worker; clones share the underlying channel
    pub fn client(&self) -> BuildServiceClient<Channel> {
        self.client.clone()
    }
}

/// Live worker connections, in the order their addresses were given
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<WorkerEndpoint>,
    failures: Vec<ConnectionError>,
}

impl WorkerPool {
    /// Connect to every address
    ///
    /// Fails with [`ConnectionError::NoLiveWorkers`] only when no address
    /// could be connected.
    pub async fn connect<S: AsRef<str>>(addresses: &[S], options: PoolOptions) -> ConnectionResult<Self> {
        let mut workers = Vec::with_capacity(addresses.len());
        let mut failures = Vec::new();

        for address in addresses {
            let address = address.as_ref();
            match connect_one(address, options).await {
                Ok(client) => {
                    debug!(worker = %address, "Connected to worker");
                    workers.push(WorkerEndpoint {
                        address: address.to_string(),
                        client,
                    });
                }
                Err(e) => {
                    warn!(worker = %address, error = %e, "Worker connection failed");
                    failures.push(e);
                }
            }
        }

        if workers.is_empty() {
            return Err(ConnectionError::NoLiveWorkers {
                attempted: addresses.len(),
            });
        }

        info!(
            live = workers.len(),
            failed = failures.len(),
            "Worker pool connected"
        );

        Ok(Self { workers, failures })
    }

    /// Number of live workers
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// The i-th live worker
    pub fn get(&self, index: usize) -> Option<&WorkerEndpoint> {
        self.workers.get(index)
    }

    /// Addresses of live workers
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.workers.iter().map(|w| w.address())
    }

    /// Per-address failures seen while connecting
    pub fn failures(&self) -> &[ConnectionError] {
        &self.failures
    }
}

async fn connect_one(address: &str, options: PoolOptions) -> ConnectionResult<BuildServiceClient<Channel>> {
    let endpoint = Endpoint::from_shared(format!("http://{}", address))
        .map_err(|e| ConnectionError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })?
        .connect_timeout(options.connect_timeout);

    let channel = endpoint
        .connect()
        .await
        .map_err(|e| ConnectionError::ConnectFailed {
            address: address.to_string(),
            reason: e.to_string(),
        })?;

    Ok(BuildServiceClient::new(channel)
        .max_decoding_message_size(options.max_message_size)
        .max_encoding_message_size(options.max_message_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_port_address() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);
        address
    }

    #[tokio::test]
    async fn test_all_addresses_fail() {
        let addresses = vec![closed_port_address(), closed_port_address()];
        let options = PoolOptions {
            connect_timeout: Duration::from_secs(2),
            ..PoolOptions::default()
        };

        let err = WorkerPool::connect(&addresses, options).await.unwrap_err();
        assert!(matches!(err, ConnectionError::NoLiveWorkers { attempted: 2 }));
    }

    #[tokio::test]
    async fn test_empty_address_list() {
        let addresses: Vec<String> = Vec::new();
        let err = WorkerPool::connect(&addresses, PoolOptions::default()).await.unwrap_err();
        assert!(matches!(err, ConnectionError::NoLiveWorkers { attempted: 0 }));
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let err = connect_one("bad host:1", PoolOptions::default()).await.unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidAddress { .. }));
    }

    #[test]
    fn test_default_options() {
        let options = PoolOptions::default();
        assert_eq!(options.connect_timeout, Duration::from_secs(10));
        assert_eq!(options.max_message_size, 2_147_483_647);
    }
}
