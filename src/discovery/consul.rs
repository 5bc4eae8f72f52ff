//! Consul-backed worker lookup

use crate::error::{DiscoveryError, DiscoveryResult};
use indexmap::IndexSet;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::{debug, info};

/// Port of the Consul HTTP API
pub const DEFAULT_CONSUL_PORT: u16 = 8500;

/// Port build workers listen on
pub const DEFAULT_WORKER_PORT: u16 = 39090;

/// Minimum free space on a worker's compile disk
pub const DEFAULT_MIN_DISK_GB: u64 = 500;

/// Timeout for each catalog request
const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

/// Disks checked for capacity, in order of preference
const COMPILE_DISKS: [&str; 2] = ["/home", "/"];

#[derive(Debug, Deserialize)]
struct PassingCheck {
    #[serde(rename = "ServiceName", default)]
    service_name: String,
}

#[derive(Debug, Deserialize)]
struct CatalogService {
    #[serde(rename = "ServiceAddress", default)]
    address: String,
    #[serde(rename = "ServiceMeta", default)]
    meta: ServiceMeta,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceMeta {
    /// JSON-encoded list of disks, e.g. `[{"name":"/home","size":"800 GB"}]`
    #[serde(default)]
    disks: String,
}

#[derive(Debug, Deserialize)]
struct Disk {
    name: String,
    size: String,
}

/// Resource policy applied to discovered workers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskPolicy {
    /// Minimum compile disk size in GB
    pub min_gb: u64,
}

impl Default for DiskPolicy {
    fn default() -> Self {
        Self {
            min_gb: DEFAULT_MIN_DISK_GB,
        }
    }
}

impl DiskPolicy {
    pub fn new(min_gb: u64) -> Self {
        Self { min_gb }
    }

    /// Check a worker's advertised disks against the policy
    ///
    /// The compile disk is `/home` when present, otherwise `/`. Sizes are
    /// `"<n> GB"` (accepted when `n >= min_gb`) or `"<n> TB"` (always
    /// accepted). Anything unparsable is rejected.
    pub fn accepts(&self, disks_json: &str) -> bool {
        let Ok(disks) = serde_json::from_str::<Vec<Disk>>(disks_json) else {
            return false;
        };

        let Some(disk) = COMPILE_DISKS
            .iter()
            .find_map(|name| disks.iter().find(|d| d.name == *name))
        else {
            return false;
        };

        let mut parts = disk.size.split(' ');
        match (parts.next(), parts.next()) {
            (Some(amount), Some("GB")) => amount.parse::<u64>().is_ok_and(|gb| gb >= self.min_gb),
            (Some(_), Some("TB")) => true,
            _ => false,
        }
    }
}

/// Client for a Consul agent's catalog API
#[derive(Debug, Clone)]
pub struct ConsulDiscovery {
    client: reqwest::Client,
    base_url: String,
    policy: DiskPolicy,
    worker_port: u16,
}

impl ConsulDiscovery {
    /// Create a client for the given Consul base URL (e.g. `http://10.0.0.5:8500`)
    pub fn new(base_url: impl Into<String>, policy: DiskPolicy, worker_port: u16) -> DiscoveryResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| DiscoveryError::Unreachable {
                url: base_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url,
            policy,
            worker_port,
        })
    }

    /// Create a client for the Consul agent at `ip` on the default port
    pub fn for_agent(ip: IpAddr, policy: DiskPolicy, worker_port: u16) -> DiscoveryResult<Self> {
        let agent = SocketAddr::new(ip, DEFAULT_CONSUL_PORT);
        Self::new(format!("http://{}", agent), policy, worker_port)
    }

    /// Look up worker addresses (`host:port`), first seen order, no duplicates
    pub async fn lookup(&self) -> DiscoveryResult<Vec<String>> {
        let services = self.passing_services().await?;
        debug!(services = ?services, "Passing services");

        let mut addresses = IndexSet::new();
        for service in &services {
            addresses.extend(self.service_addresses(service).await?);
        }

        if addresses.is_empty() {
            return Err(DiscoveryError::NoWorkers);
        }

        info!(workers = addresses.len(), "Discovered workers");
        Ok(addresses.into_iter().collect())
    }

    async fn passing_services(&self) -> DiscoveryResult<Vec<String>> {
        let checks: Vec<PassingCheck> = self.get_json("/v1/health/state/passing").await?;

        let mut names = IndexSet::new();
        for check in checks {
            if !check.service_name.is_empty() {
                names.insert(check.service_name);
            }
        }
        Ok(names.into_iter().collect())
    }

    async fn service_addresses(&self, service: &str) -> DiscoveryResult<Vec<String>> {
        let instances: Vec<CatalogService> = self
            .get_json(&format!("/v1/catalog/service/{}", service))
            .await?;

        let addresses = instances
            .into_iter()
            .filter_map(|instance| {
                let ip: IpAddr = instance.address.parse().ok()?;
                if !self.policy.accepts(&instance.meta.disks) {
                    debug!(service, address = %ip, "Worker rejected by disk policy");
                    return None;
                }
                Some(SocketAddr::new(ip, self.worker_port).to_string())
            })
            .collect();

        Ok(addresses)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> DiscoveryResult<T> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DiscoveryError::Unreachable {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::BadStatus {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| DiscoveryError::Unreachable {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        serde_json::from_slice(&body).map_err(|e| DiscoveryError::InvalidResponse {
            url,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn disks(entries: &[(&str, &str)]) -> String {
        let list: Vec<_> = entries
            .iter()
            .map(|(name, size)| serde_json::json!({"name": name, "size": size}))
            .collect();
        serde_json::to_string(&list).unwrap()
    }

    fn instance(address: &str, disks_json: &str) -> serde_json::Value {
        serde_json::json!({
            "ServiceAddress": address,
            "ServiceMeta": {"CreationTime": "0", "cpu": "64", "disks": disks_json, "memory": "256 GB"}
        })
    }

    #[test]
    fn test_policy_gb_threshold() {
        let policy = DiskPolicy::default();
        assert!(policy.accepts(&disks(&[("/home", "500 GB")])));
        assert!(policy.accepts(&disks(&[("/home", "1800 GB")])));
        assert!(!policy.accepts(&disks(&[("/home", "499 GB")])));
        assert!(DiskPolicy::new(100).accepts(&disks(&[("/home", "120 GB")])));
    }

    #[test]
    fn test_policy_tb_always_enough() {
        assert!(DiskPolicy::default().accepts(&disks(&[("/", "1 TB")])));
    }

    #[test]
    fn test_policy_prefers_home_over_root() {
        let policy = DiskPolicy::default();
        assert!(!policy.accepts(&disks(&[("/", "2 TB"), ("/home", "100 GB")])));
        assert!(policy.accepts(&disks(&[("/", "900 GB"), ("/data", "10 GB")])));
    }

    #[test]
    fn test_policy_rejects_unknown() {
        let policy = DiskPolicy::default();
        assert!(!policy.accepts(""));
        assert!(!policy.accepts("not json"));
        assert!(!policy.accepts(&disks(&[("/data", "10 TB")])));
        assert!(!policy.accepts(&disks(&[("/home", "900 MB")])));
        assert!(!policy.accepts(&disks(&[("/home", "900GB")])));
        assert!(!policy.accepts(&disks(&[("/home", "lots GB")])));
    }

    #[tokio::test]
    async fn test_lookup_filters_and_deduplicates() {
        let mut server = Server::new_async().await;
        let big = disks(&[("/home", "800 GB")]);
        let small = disks(&[("/home", "200 GB")]);

        let passing = server
            .mock("GET", "/v1/health/state/passing")
            .with_status(200)
            .with_body(
                serde_json::json!([
                    {"ServiceName": ""},
                    {"ServiceName": "builder-a"},
                    {"ServiceName": "builder-b"},
                    {"ServiceName": "builder-a"}
                ])
                .to_string(),
            )
            .create_async()
            .await;
        let builder_a = server
            .mock("GET", "/v1/catalog/service/builder-a")
            .with_status(200)
            .with_body(
                serde_json::json!([
                    instance("10.0.0.1", &big),
                    instance("not-an-ip", &big),
                    instance("10.0.0.2", &small)
                ])
                .to_string(),
            )
            .create_async()
            .await;
        let builder_b = server
            .mock("GET", "/v1/catalog/service/builder-b")
            .with_status(200)
            .with_body(
                serde_json::json!([
                    instance("10.0.0.3", &disks(&[("/", "4 TB")])),
                    instance("10.0.0.1", &big)
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let discovery = ConsulDiscovery::new(server.url(), DiskPolicy::default(), DEFAULT_WORKER_PORT).unwrap();
        let addresses = discovery.lookup().await.unwrap();

        assert_eq!(addresses, vec!["10.0.0.1:39090", "10.0.0.3:39090"]);
        passing.assert_async().await;
        builder_a.assert_async().await;
        builder_b.assert_async().await;
    }

    #[tokio::test]
    async fn test_lookup_no_eligible_workers() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v1/health/state/passing")
            .with_status(200)
            .with_body(r#"[{"ServiceName":"builder"}]"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v1/catalog/service/builder")
            .with_status(200)
            .with_body(serde_json::json!([instance("10.0.0.9", &disks(&[("/home", "10 GB")]))]).to_string())
            .create_async()
            .await;

        let discovery = ConsulDiscovery::new(server.url(), DiskPolicy::default(), DEFAULT_WORKER_PORT).unwrap();
        let err = discovery.lookup().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::NoWorkers));
    }

    #[tokio::test]
    async fn test_lookup_bad_status() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v1/health/state/passing")
            .with_status(500)
            .create_async()
            .await;

        let discovery = ConsulDiscovery::new(server.url(), DiskPolicy::default(), DEFAULT_WORKER_PORT).unwrap();
        let err = discovery.lookup().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::BadStatus { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_lookup_invalid_body() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v1/health/state/passing")
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let discovery = ConsulDiscovery::new(server.url(), DiskPolicy::default(), DEFAULT_WORKER_PORT).unwrap();
        let err = discovery.lookup().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_lookup_unreachable() {
        // Reserved port on localhost with nothing listening
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let discovery = ConsulDiscovery::new(url, DiskPolicy::default(), DEFAULT_WORKER_PORT).unwrap();
        let err = discovery.lookup().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Unreachable { .. }));
    }

    #[test]
    fn test_for_agent_url() {
        let discovery = ConsulDiscovery::for_agent(
            "10.1.2.3".parse().unwrap(),
            DiskPolicy::default(),
            DEFAULT_WORKER_PORT,
        )
        .unwrap();
        assert_eq!(discovery.base_url, "http://10.1.2.3:8500");
    }
}
