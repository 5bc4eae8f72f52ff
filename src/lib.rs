//! build-relay - Distributed Compilation Dispatcher
//!
//! Turns a build system's compile descriptor into self-contained build
//! units, ships each unit's sources to a remote build worker and writes the
//! produced targets back into the workspace.
//!
//! # Features
//!
//! - **Symlink-aware include expansion**: include directories are walked
//!   through symbolic links, naming files by their alias path.
//!
//! - **Worker discovery**: live workers are looked up in Consul and
//!   filtered by advertised disk capacity, or given statically.
//!
//! - **Round-robin dispatch**: unit `i` goes to worker `i % W` over a
//!   bidirectional gRPC stream, under one deadline for the whole batch.
//!
//! - **Integrity checks**: every file carries a SHA-256 checksum, verified
//!   on sources before sending and on targets after writing.
//!
//! # Architecture
//!
//! ```text
//!   <workspace>/out/<descriptor>.json         Consul catalog
//!                 │                                  │
//!                 ▼                                  ▼
//! ┌──────────────────────────────┐    ┌──────────────────────────────┐
//! │ TaskResolver                 │    │ ConsulDiscovery + DiskPolicy │
//! │  normalize_rule              │    └──────────────┬───────────────┘
//! │  SymlinkWalker (includes)    │                   │ host:port
//! └──────────────┬───────────────┘                   ▼
//!                │ BuildUnit[]        ┌──────────────────────────────┐
//!                └───────────────────▶│ WorkerPool (tonic channels)  │
//!                                     └──────────────┬───────────────┘
//!                                                    │
//!                                                    ▼
//!                                     ┌──────────────────────────────┐
//!                                     │ DispatchEngine               │
//!                                     │  SendBuild stream per unit   │
//!                                     │  checksum in / checksum out  │
//!                                     └──────────────┬───────────────┘
//!                                                    ▼
//!                                          <workspace>/<targets>
//! ```
//!
//! # Example
//!
//! ```bash
//! # Dispatch using Consul discovery
//! build-relay dispatch -w ~/src/tree -c compile_commands.json --consul 10.0.0.5
//!
//! # Inspect the resolved units without dispatching
//! build-relay plan -w ~/src/tree -c compile_commands.json
//! ```

pub mod config;
pub mod content;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod progress;
pub mod proto;
pub mod task;
pub mod walker;

pub use config::{CliArgs, DispatchConfig, PlanConfig, WorkerSource};
pub use discovery::{ConsulDiscovery, DiskPolicy};
pub use dispatch::{DispatchEngine, DispatchStats, WorkerPool};
pub use error::{RelayError, Result};
pub use task::{BuildUnit, TaskResolver};
