//! Task resolver
//!
//! Turns a compile descriptor into dispatch-ready build units: one unit per
//! descriptor command, in descriptor order. Unit order decides worker
//! assignment downstream, so it is never changed here.

use crate::error::{DescriptorError, ResolutionResult, Result};
use crate::task::descriptor::{CompileCommandEntry, CompileDescriptor};
use crate::walker::{FileSet, SymlinkWalker};
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

/// Versioned clang toolchain path; only the binary name survives normalization
static CLANG_TOOLCHAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\S*/)?clang/host/linux-x86/clang-[a-zA-Z0-9]+/bin/(clang\+\+|clang)")
        .expect("Invalid clang toolchain regex")
});

/// A dispatch-ready compilation job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildUnit {
    /// Normalized build rule (compiler command line)
    pub rule: String,

    /// Input files relative to the workspace root, deduplicated
    pub files: Vec<String>,

    /// Artifacts the worker is expected to produce
    pub targets: Vec<String>,
}

/// Normalize a compiler command for execution on a worker
///
/// clang invocations through a versioned host toolchain are rewritten to
/// the bare `clang`/`clang++` binary name, since workers carry their own
/// toolchain. Other commands pass through unchanged.
pub fn normalize_rule(command: &str, compiler_type: &str) -> String {
    match compiler_type {
        "clang" | "clang++" => CLANG_TOOLCHAIN_REGEX.replace_all(command, "$1").into_owned(),
        _ => command.to_string(),
    }
}

/// Expands compile descriptors into build units
#[derive(Debug, Clone)]
pub struct TaskResolver {
    walker: SymlinkWalker,
}

impl TaskResolver {
    /// Create a resolver for a workspace root
    pub fn new(workspace: impl AsRef<Path>) -> Self {
        Self {
            walker: SymlinkWalker::new(workspace),
        }
    }

    /// Load `<workspace>/out/<descriptor_name>` and resolve every command
    pub fn resolve(&self, descriptor_name: &str) -> Result<Vec<BuildUnit>> {
        let path = CompileDescriptor::path_in(self.walker.root(), descriptor_name);
        info!("Compile descriptor: {}", path.display());

        let descriptor = CompileDescriptor::load(&path)?;
        let units = self.resolve_descriptor(&descriptor)?;

        if units.is_empty() {
            return Err(DescriptorError::NoUnits.into());
        }

        info!(units = units.len(), "Resolved build units");
        Ok(units)
    }

    /// Resolve an already parsed descriptor
    pub fn resolve_descriptor(&self, descriptor: &CompileDescriptor) -> ResolutionResult<Vec<BuildUnit>> {
        descriptor
            .commands
            .iter()
            .map(|entry| self.resolve_entry(entry))
            .collect()
    }

    /// Resolve a single compiler invocation
    pub fn resolve_entry(&self, entry: &CompileCommandEntry) -> ResolutionResult<BuildUnit> {
        let rule = normalize_rule(&entry.command, &entry.compiler_type);

        let mut files: FileSet = entry.input_files.iter().cloned().collect();
        for include in &entry.includes {
            self.walker.expand_include(include, &mut files)?;
        }

        let targets = if entry.output_file.is_empty() {
            Vec::new()
        } else {
            vec![entry.output_file.clone()]
        };

        debug!(
            rule = %rule,
            files = files.len(),
            targets = targets.len(),
            "Resolved command"
        );

        Ok(BuildUnit {
            rule,
            files: files.into_iter().collect(),
            targets,
        })
    }
}
