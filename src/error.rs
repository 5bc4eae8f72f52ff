//! Error types for build-relay
//!
//! This module defines the error hierarchy for a dispatch run:
//! - Worker discovery errors
//! - Compile descriptor and include-path resolution errors
//! - Worker connection, transfer, and integrity errors
//! - Configuration and CLI errors
//!
//! Every kind is fatal for the run. The only tolerated failure is a
//! partial connection failure inside the worker pool, which is reported
//! as a diagnostic rather than an error.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the build-relay application
#[derive(Error, Debug)]
pub enum RelayError {
    /// Worker discovery errors
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Compile descriptor errors
    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    /// Include path expansion errors
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Worker pool errors
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Stream and local file transfer errors
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Checksum mismatches
    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Interrupted by signal
    #[error("Operation interrupted by signal")]
    Interrupted,
}

/// Worker discovery errors
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Discovery service could not be reached
    #[error("Failed to reach discovery service at '{url}': {reason}")]
    Unreachable { url: String, reason: String },

    /// Discovery service answered with a non-success status
    #[error("Discovery service returned status {status} for '{url}'")]
    BadStatus { url: String, status: u16 },

    /// Response body could not be decoded
    #[error("Invalid discovery response from '{url}': {reason}")]
    InvalidResponse { url: String, reason: String },

    /// No worker satisfied the resource policy
    #[error("No workers available that satisfy the resource policy")]
    NoWorkers,
}

/// Compile descriptor errors
#[derive(Error, Debug)]
pub enum DescriptorError {
    /// Descriptor file missing or unreadable
    #[error("Failed to open compile descriptor '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Descriptor content is not the expected JSON shape
    #[error("Failed to decode compile descriptor '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Compilation database extraction failed
    #[error("Failed to extract compilation database from '{path}': {reason}")]
    Compdb { path: PathBuf, reason: String },

    /// Nothing to dispatch
    #[error("No build units to process")]
    NoUnits,
}

/// Include path expansion errors
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// Include path does not exist
    #[error("Path not found: '{path}'")]
    NotFound { path: PathBuf },

    /// Stat failed for a reason other than not-found
    #[error("Failed to stat '{path}': {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory listing failed
    #[error("Failed to read directory '{path}': {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Path cannot be expressed relative to the workspace root
    #[error("Path '{path}' is not inside workspace '{root}'")]
    OutsideWorkspace { path: PathBuf, root: PathBuf },

    /// Path name is not valid UTF-8 and cannot be sent to a worker
    #[error("Path '{}' is not valid UTF-8", path.display())]
    NonUtf8Path { path: PathBuf },
}

/// Worker pool errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Worker address is not a valid endpoint
    #[error("Invalid worker address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Connecting to a single worker failed
    #[error("Failed to connect to worker '{address}': {reason}")]
    ConnectFailed { address: String, reason: String },

    /// Every address failed to connect
    #[error("Failed to connect to any of {attempted} worker address(es)")]
    NoLiveWorkers { attempted: usize },
}

/// Stream and local file transfer errors
#[derive(Error, Debug)]
pub enum TransferError {
    /// Opening the build stream failed
    #[error("Failed to open build stream to '{worker}': {reason}")]
    OpenStream { worker: String, reason: String },

    /// Receiving a reply message failed
    #[error("Failed to receive reply from '{worker}': {reason}")]
    Receive { worker: String, reason: String },

    /// A unit source file could not be read
    #[error("Failed to read source file '{path}': {source}")]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A produced target could not be written
    #[error("Failed to write target '{path}': {source}")]
    WriteTarget {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Worker sent a target outside the workspace
    #[error("Refusing to write target outside workspace: '{path}'")]
    UnsafeTargetPath { path: String },

    /// Batch deadline expired
    #[error("Dispatch deadline of {seconds}s exceeded")]
    DeadlineExceeded { seconds: u64 },
}

/// Checksum mismatches
#[derive(Error, Debug)]
pub enum IntegrityError {
    /// A received target does not match the checksum the worker sent
    #[error("Checksum mismatch for target '{path}': expected {expected}, got {actual}")]
    TargetMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// A source file changed while it was being packaged
    #[error("Source file '{path}' changed while being read")]
    SourceChanged { path: PathBuf },
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Workspace path unusable
    #[error("Invalid workspace path '{path}': {reason}")]
    InvalidWorkspace { path: PathBuf, reason: String },

    /// Compile descriptor name missing
    #[error("Invalid compile file: {0}")]
    InvalidCompileFile(String),

    /// Discovery service address is not an IP address
    #[error("Invalid discovery service address '{0}': expected an IP address")]
    InvalidDiscoveryAddress(String),

    /// Neither discovery nor static workers configured
    #[error("No worker source: set --consul (or CONSUL_SERVICE) or pass --worker")]
    NoWorkerSource,

    /// Static worker address malformed
    #[error("Invalid worker address '{address}': {reason}")]
    InvalidWorkerAddress { address: String, reason: String },

    /// Timeout out of range
    #[error("Invalid timeout {0}s: must be greater than zero")]
    InvalidTimeout(u64),

    /// Plan input missing or ambiguous
    #[error("Invalid plan input: {0}")]
    InvalidPlanInput(String),
}

/// Result type alias for RelayError
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type alias for DiscoveryError
pub type DiscoveryResult<T> = std::result::Result<T, DiscoveryError>;

/// Result type alias for DescriptorError
pub type DescriptorResult<T> = std::result::Result<T, DescriptorError>;

/// Result type alias for ResolutionError
pub type ResolutionResult<T> = std::result::Result<T, ResolutionError>;

/// Result type alias for ConnectionError
pub type ConnectionResult<T> = std::result::Result<T, ConnectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let err = IntegrityError::TargetMismatch {
            path: "out/bin".into(),
            expected: "deadbeef".into(),
            actual: "cafef00d".into(),
        };
        let relay_err: RelayError = err.into();
        assert!(matches!(relay_err, RelayError::Integrity(_)));
    }

    #[test]
    fn test_error_messages() {
        let err = ConnectionError::NoLiveWorkers { attempted: 3 };
        assert_eq!(
            err.to_string(),
            "Failed to connect to any of 3 worker address(es)"
        );

        let err: RelayError = ResolutionError::NotFound {
            path: PathBuf::from("/ws/inc"),
        }
        .into();
        assert_eq!(err.to_string(), "Resolution error: Path not found: '/ws/inc'");
    }
}
