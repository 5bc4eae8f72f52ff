//! Request identifiers
//!
//! Ids combine a host identifier, a second-granularity timestamp, a
//! per-session counter and a short random suffix:
//! `buildhost-1718000000-3-9f2c1a7e`.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Host identifier used when none can be determined
const FALLBACK_HOST: &str = "localhost";

/// Generates request ids for one dispatch session
#[derive(Debug)]
pub struct RequestIdGenerator {
    host: String,
    counter: AtomicU64,
}

impl RequestIdGenerator {
    /// Generator for the local host
    pub fn new() -> Self {
        Self::with_host(local_host_id())
    }

    /// Generator with an explicit host identifier
    pub fn with_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Next request id
    pub fn next_id(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{}-{}-{}",
            self.host,
            Utc::now().timestamp(),
            seq,
            &suffix[..8]
        )
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable identifier of this machine
fn local_host_id() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| FALLBACK_HOST.to_string())
}
