//! Worker discovery
//!
//! Looks up live build workers in a Consul catalog and filters them by a
//! resource policy before they are handed to the worker pool.
//!
//! # Lookup flow
//!
//! ```text
//! GET /v1/health/state/passing        -> service names with passing checks
//!   └─ for each service
//!      GET /v1/catalog/service/<name> -> instances + ServiceMeta.disks
//!         └─ keep valid IPs whose compile disk satisfies DiskPolicy
//!            -> "ip:worker_port"
//! ```

mod consul;

pub use consul::{ConsulDiscovery, DiskPolicy, DEFAULT_CONSUL_PORT, DEFAULT_MIN_DISK_GB, DEFAULT_WORKER_PORT};
