//! Compilation database extractor
//!
//! Reads a ninja build graph through `ninja -t compdb` and maps each entry
//! onto the same [`BuildUnit`] shape the task resolver produces. Units
//! extracted this way keep the working directory ninja reports, since
//! compdb commands are relative to it.

use crate::error::{DescriptorError, DescriptorResult};
use crate::task::resolver::BuildUnit;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// Executable used to export the compilation database
const NINJA_EXECUTABLE: &str = "ninja";

/// One entry of a compilation database
#[derive(Debug, Clone, Deserialize)]
struct CompdbEntry {
    directory: String,
    command: String,
    file: String,
    #[serde(default)]
    output: String,
}

/// A build unit together with the directory its command runs in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompdbUnit {
    pub directory: PathBuf,
    pub unit: BuildUnit,
}

/// Extracts build units from a ninja build file
#[derive(Debug, Clone)]
pub struct CompdbExtractor {
    file: PathBuf,
}

impl CompdbExtractor {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    /// Ensure the ninja file exists
    pub fn check(&self) -> DescriptorResult<()> {
        if !self.file.exists() {
            return Err(self.error("build file does not exist"));
        }
        Ok(())
    }

    /// Run ninja and parse its compilation database
    pub fn load(&self) -> DescriptorResult<Vec<CompdbUnit>> {
        self.check()?;

        let output = Command::new(NINJA_EXECUTABLE)
            .arg("-f")
            .arg(&self.file)
            .args(["-t", "compdb"])
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => self.error("ninja executable not found in PATH"),
                _ => self.error(&format!("failed to run ninja: {}", e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.error(&format!(
                "ninja exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let units = Self::parse(&output.stdout).map_err(|e| self.error(&e.to_string()))?;
        info!(units = units.len(), file = %self.file.display(), "Loaded compilation database");
        Ok(units)
    }

    /// Parse compilation database JSON
    pub fn parse(data: &[u8]) -> Result<Vec<CompdbUnit>, serde_json::Error> {
        let entries: Vec<CompdbEntry> = serde_json::from_slice(data)?;

        Ok(entries
            .into_iter()
            .map(|entry| {
                let targets = if entry.output.is_empty() {
                    Vec::new()
                } else {
                    vec![entry.output]
                };
                CompdbUnit {
                    directory: PathBuf::from(entry.directory),
                    unit: BuildUnit {
                        rule: entry.command,
                        files: vec![entry.file],
                        targets,
                    },
                }
            })
            .collect())
    }

    fn error(&self, reason: &str) -> DescriptorError {
        DescriptorError::Compdb {
            path: self.file.clone(),
            reason: reason.to_string(),
        }
    }

    /// The ninja file this extractor reads
    pub fn file(&self) -> &Path {
        &self.file
    }
}
