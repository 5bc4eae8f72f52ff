//! Include path walker
//!
//! This module expands include directories into the flat file lists that
//! are shipped to workers.
//!
//! # Architecture
//!
//! ```text
//!   include "inc"                       workspace
//!        │                         ┌──────────────────┐
//!        ▼                         │ inc/a.h          │
//! ┌──────────────┐   lstat/read    │ inc/lib ──┐ link │
//! │ SymlinkWalker│────────────────▶│           ▼      │
//! │ frame stack  │                 │ vendor/lib/x.h   │
//! └──────┬───────┘                 └──────────────────┘
//!        │
//!        ▼
//!   ["inc/a.h", "inc/lib/x.h"]   (alias names, first seen wins)
//! ```

pub mod symlink;

pub use symlink::{resolve_symlink, FileSet, SymlinkWalker};
