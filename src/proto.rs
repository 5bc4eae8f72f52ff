//! gRPC protocol definitions for dispatcher-worker communication
//!
//! Generated from `proto/build.proto`. Each build unit travels over its own
//! bidirectional `SendBuild` stream:
//!
//! - Dispatcher sends: one `BuildRequest` (rule, files, expected targets)
//! - Worker sends: zero or more `BuildReply` messages carrying produced
//!   targets, then closes the stream
//!
//! Every `FilePayload` carries the SHA-256 of its data as 64 lowercase hex
//! characters.

#![allow(missing_docs)]

/// Generated protobuf and gRPC code for the build protocol
pub mod build {
    /// Version 1 of the build protocol
    pub mod v1 {
        tonic::include_proto!("buildrelay.v1");
    }
}

pub use build::v1::*;
