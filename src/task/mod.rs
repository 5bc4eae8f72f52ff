//! Build task resolution
//!
//! Converts build-system output into [`BuildUnit`]s:
//! - `descriptor`: the compile descriptor JSON written by the build
//! - `resolver`: rule normalization and include expansion
//! - `compdb`: units from a ninja compilation database

pub mod compdb;
pub mod descriptor;
pub mod resolver;

pub use compdb::{CompdbExtractor, CompdbUnit};
pub use descriptor::{CompileCommandEntry, CompileDescriptor};
pub use resolver::{normalize_rule, BuildUnit, TaskResolver};
