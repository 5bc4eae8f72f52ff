//! Compile descriptor file model
//!
//! The descriptor is a JSON document produced by the build system, found at
//! `<workspace>/out/<name>`:
//!
//! ```json
//! {
//!   "commands": [
//!     {
//!       "command": "gcc -c a.c -o a.o",
//!       "compilerType": "gcc",
//!       "inputFiles": ["a.c"],
//!       "outputFile": "a.o",
//!       "includes": ["inc"],
//!       "module": "libfoo"
//!     }
//!   ]
//! }
//! ```

use crate::error::{DescriptorError, DescriptorResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory under the workspace root holding compile descriptors
pub const DESCRIPTOR_DIR: &str = "out";

/// One compiler invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileCommandEntry {
    /// Full compiler command line
    pub command: String,

    /// Compiler front end (gcc, clang, clang++, ...)
    #[serde(default, deserialize_with = "null_as_default")]
    pub compiler_type: String,

    /// Explicit inputs, relative to the workspace root (order matters)
    #[serde(default, deserialize_with = "null_as_default")]
    pub input_files: Vec<String>,

    /// Produced artifact; empty when the command has none
    #[serde(default, deserialize_with = "null_as_default")]
    pub output_file: String,

    /// Include paths to expand, relative to the workspace root
    #[serde(default, deserialize_with = "null_as_default")]
    pub includes: Vec<String>,

    /// Owning module (informational)
    #[serde(default, deserialize_with = "null_as_default")]
    pub module: String,
}

/// Treat an explicit `null` like an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parsed compile descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileDescriptor {
    pub commands: Vec<CompileCommandEntry>,
}

impl CompileDescriptor {
    /// Location of a named descriptor inside a workspace
    pub fn path_in(workspace: &Path, name: &str) -> PathBuf {
        workspace.join(DESCRIPTOR_DIR).join(name)
    }

    /// Load and decode a descriptor file
    pub fn load(path: &Path) -> DescriptorResult<Self> {
        let data = fs::read(path).map_err(|source| DescriptorError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_slice(&data).map_err(|source| DescriptorError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }
}
