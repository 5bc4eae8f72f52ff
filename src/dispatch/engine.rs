//! Dispatch engine
//!
//! Sends build units to workers one at a time and materializes the targets
//! they stream back. Unit `i` always goes to worker `i % pool.size()`.
//!
//! Per unit:
//! 1. Read and checksum every input file, package a `BuildRequest`
//! 2. Open a `SendBuild` stream, send the request, close the send side
//! 3. Drain replies; write each target under the workspace, read it back
//!    and compare checksums
//!
//! The whole batch runs under one deadline. Any error aborts the batch;
//! targets already written stay on disk.

use crate::content::{checksum, checksum_file, verify};
use crate::dispatch::pool::{WorkerEndpoint, WorkerPool};
use crate::dispatch::request::RequestIdGenerator;
use crate::error::{ConnectionError, DescriptorError, IntegrityError, Result, TransferError};
use crate::proto::{BuildRequest, FilePayload};
use crate::task::BuildUnit;
use std::fs::Permissions;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tracing::{debug, info};

/// Default batch deadline
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30 * 60);

/// Mode applied to written targets
const TARGET_MODE: u32 = 0o755;

/// Worker assigned to a unit position
///
/// A pure function of position so repeated runs route identically.
/// `workers` must be non-zero.
pub fn worker_index(unit: usize, workers: usize) -> usize {
    unit % workers
}

/// Cumulative dispatch progress
#[derive(Debug, Clone, Default)]
pub struct DispatchProgress {
    /// Index of the unit in flight
    pub unit: usize,
    pub total_units: usize,
    /// Address of the worker handling the current unit
    pub worker: String,
    pub files_sent: u64,
    pub bytes_sent: u64,
    pub targets_received: u64,
    pub bytes_received: u64,
}

/// Totals for a completed batch
#[derive(Debug, Clone, Default)]
pub struct DispatchStats {
    pub units: usize,
    pub files_sent: u64,
    pub bytes_sent: u64,
    pub targets_received: u64,
    pub bytes_received: u64,
    pub duration: Duration,
}

/// Drives build units through a worker pool
#[derive(Debug)]
pub struct DispatchEngine {
    workspace: PathBuf,
    ids: RequestIdGenerator,
}

impl DispatchEngine {
    /// Create an engine rooted at the workspace
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            ids: RequestIdGenerator::new(),
        }
    }

    /// Use a specific request id generator
    pub fn with_request_ids(mut self, ids: RequestIdGenerator) -> Self {
        self.ids = ids;
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Dispatch every unit, failing the batch on the first error
    pub async fn dispatch(&self, units: &[BuildUnit], pool: &WorkerPool, deadline: Duration) -> Result<DispatchStats> {
        self.dispatch_with_progress(units, pool, deadline, |_| {}).await
    }

    /// Dispatch every unit, reporting progress after each file batch and target
    pub async fn dispatch_with_progress<F>(
        &self,
        units: &[BuildUnit],
        pool: &WorkerPool,
        deadline: Duration,
        mut on_progress: F,
    ) -> Result<DispatchStats>
    where
        F: FnMut(&DispatchProgress),
    {
        if units.is_empty() {
            return Err(DescriptorError::NoUnits.into());
        }

        let start = Instant::now();
        let mut progress = DispatchProgress {
            total_units: units.len(),
            ..Default::default()
        };

        let batch = async {
            for (index, unit) in units.iter().enumerate() {
                let worker = pool
                    .get(worker_index(index, pool.size()))
                    .ok_or(ConnectionError::NoLiveWorkers {
                        attempted: pool.size(),
                    })?;

                progress.unit = index;
                progress.worker = worker.address().to_string();
                self.dispatch_unit(unit, worker, &mut progress, &mut on_progress)
                    .await?;
            }
            Ok::<(), crate::error::RelayError>(())
        };

        match tokio::time::timeout(deadline, batch).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(TransferError::DeadlineExceeded {
                    seconds: deadline.as_secs(),
                }
                .into())
            }
        }

        let stats = DispatchStats {
            units: units.len(),
            files_sent: progress.files_sent,
            bytes_sent: progress.bytes_sent,
            targets_received: progress.targets_received,
            bytes_received: progress.bytes_received,
            duration: start.elapsed(),
        };

        info!(
            units = stats.units,
            targets = stats.targets_received,
            elapsed_ms = stats.duration.as_millis() as u64,
            "Dispatch complete"
        );

        Ok(stats)
    }

    async fn dispatch_unit<F>(
        &self,
        unit: &BuildUnit,
        worker: &WorkerEndpoint,
        progress: &mut DispatchProgress,
        on_progress: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&DispatchProgress),
    {
        let request = self.build_request(unit).await?;
        let request_id = request.request_id.clone();

        info!(
            unit = progress.unit,
            worker = %worker.address(),
            request_id = %request_id,
            files = request.files.len(),
            "Dispatching unit"
        );

        progress.files_sent += request.files.len() as u64;
        progress.bytes_sent += request.files.iter().map(|f| f.data.len() as u64).sum::<u64>();
        on_progress(progress);

        // A single-item stream: the send side closes after the request
        let mut client = worker.client();
        let response = client
            .send_build(tokio_stream::once(request))
            .await
            .map_err(|status| TransferError::OpenStream {
                worker: worker.address().to_string(),
                reason: status.to_string(),
            })?;

        let mut inbound = response.into_inner();
        while let Some(reply) = inbound
            .message()
            .await
            .map_err(|status| TransferError::Receive {
                worker: worker.address().to_string(),
                reason: status.to_string(),
            })?
        {
            for target in &reply.targets {
                let written = self.write_target(target).await?;
                progress.targets_received += 1;
                progress.bytes_received += written;
                on_progress(progress);
            }
        }

        debug!(unit = progress.unit, request_id = %request_id, "Unit complete");
        Ok(())
    }

    /// Package a unit's files into a request
    async fn build_request(&self, unit: &BuildUnit) -> Result<BuildRequest> {
        let mut files = Vec::with_capacity(unit.files.len());

        for file in &unit.files {
            let path = self.workspace.join(file);
            let data = fs::read(&path)
                .await
                .map_err(|source| TransferError::ReadSource {
                    path: path.clone(),
                    source,
                })?;

            let digest = checksum(&data);
            let on_disk = file_checksum(path.clone())
                .await
                .map_err(|source| TransferError::ReadSource {
                    path: path.clone(),
                    source,
                })?;
            if on_disk != digest {
                return Err(IntegrityError::SourceChanged { path }.into());
            }

            debug!(file = %file, bytes = data.len(), "Packaged source");
            files.push(FilePayload {
                path: file.clone(),
                data,
                checksum: digest,
            });
        }

        Ok(BuildRequest {
            request_id: self.ids.next_id(),
            files,
            rule: unit.rule.clone(),
            base_path: self.workspace.to_string_lossy().into_owned(),
            targets: unit.targets.clone(),
        })
    }

    /// Write a received target and confirm it landed intact
    async fn write_target(&self, target: &FilePayload) -> Result<u64> {
        let relative = safe_target_path(&target.path)?;
        let path = self.workspace.join(relative);
        let write_error = |source: io::Error| TransferError::WriteTarget {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(write_error)?;
        }
        fs::write(&path, &target.data).await.map_err(write_error)?;
        fs::set_permissions(&path, Permissions::from_mode(TARGET_MODE))
            .await
            .map_err(write_error)?;

        let written = fs::read(&path).await.map_err(write_error)?;
        if !verify(&target.checksum, &written) {
            return Err(IntegrityError::TargetMismatch {
                path: target.path.clone(),
                expected: target.checksum.clone(),
                actual: checksum(&written),
            }
            .into());
        }

        debug!(target = %target.path, bytes = written.len(), "Wrote target");
        Ok(written.len() as u64)
    }
}

/// Reject target paths that would land outside the workspace
fn safe_target_path(path: &str) -> std::result::Result<&Path, TransferError> {
    let candidate = Path::new(path);
    let components_ok = candidate
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    let names_file = candidate
        .components()
        .any(|c| matches!(c, Component::Normal(_)));

    if components_ok && names_file {
        Ok(candidate)
    } else {
        Err(TransferError::UnsafeTargetPath {
            path: path.to_string(),
        })
    }
}

async fn file_checksum(path: PathBuf) -> io::Result<String> {
    tokio::task::spawn_blocking(move || checksum_file(&path))
        .await
        .map_err(io::Error::other)?
}
