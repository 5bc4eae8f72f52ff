//! Build dispatch
//!
//! # Architecture
//!
//! ```text
//!  BuildUnit[0..N]
//!        │
//!        ▼
//! ┌────────────────┐  i % W   ┌──────────────────────────┐
//! │ DispatchEngine │─────────▶│ WorkerPool               │
//! │ (one deadline) │          │ W0 ─ W1 ─ ... ─ W(W-1)   │
//! └───────┬────────┘          └────────────┬─────────────┘
//!         │ BuildRequest (files + checksums)│
//!         │◀──────── BuildReply* ───────────┘
//!         ▼
//!   workspace/<target>  (written, read back, checksum verified)
//! ```

pub mod engine;
pub mod pool;
pub mod request;

pub use engine::{worker_index, DispatchEngine, DispatchProgress, DispatchStats, DEFAULT_DEADLINE};
pub use pool::{PoolOptions, WorkerEndpoint, WorkerPool, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_MESSAGE_SIZE};
pub use request::RequestIdGenerator;
