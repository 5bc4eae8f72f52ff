//! Configuration types for build-relay
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Validated runtime configuration for the `dispatch` and `plan` commands
//! - Worker address parsing

use crate::discovery::{DiskPolicy, DEFAULT_MIN_DISK_GB, DEFAULT_WORKER_PORT};
use crate::dispatch::PoolOptions;
use crate::error::ConfigError;
use clap::{Args, Parser, Subcommand};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Distributed compilation dispatcher
#[derive(Parser, Debug, Clone)]
#[command(
    name = "build-relay",
    version,
    about = "Distributed compilation dispatcher",
    long_about = "Resolves a compile descriptor into build units, ships each unit's sources to a \
                  remote build worker over gRPC and writes the produced targets back into the \
                  workspace.\n\n\
                  Every file is checksummed in both directions; any mismatch aborts the run.",
    after_help = "EXAMPLES:\n    \
        build-relay dispatch -w ~/src/tree -c compile_commands.json --consul 10.0.0.5\n    \
        build-relay dispatch -w . -c compile_commands.json --worker 10.0.0.7:39090 --worker 10.0.0.8:39090\n    \
        build-relay plan -w . -c compile_commands.json\n    \
        build-relay plan --compdb out/build.ninja"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Resolve build units and dispatch them to workers
    Dispatch(DispatchArgs),

    /// Resolve build units and print them as JSON without dispatching
    Plan(PlanArgs),
}

/// Arguments for `dispatch`
#[derive(Args, Debug, Clone)]
pub struct DispatchArgs {
    /// Workspace root; sources are read from and targets written under it
    #[arg(short = 'w', long, value_name = "DIR")]
    pub workspace_path: PathBuf,

    /// Compile descriptor file name under <workspace>/out/
    #[arg(short = 'c', long, value_name = "NAME")]
    pub compile_file: String,

    /// IP address of the Consul agent used for worker discovery
    #[arg(long, env = "CONSUL_SERVICE", value_name = "IP")]
    pub consul: Option<String>,

    /// Static worker address, bypasses discovery (can be repeated)
    #[arg(long = "worker", value_name = "HOST:PORT", action = clap::ArgAction::Append)]
    pub workers: Vec<String>,

    /// Deadline for the whole batch in seconds
    #[arg(long, default_value = "1800", value_name = "SECS")]
    pub timeout: u64,

    /// Per-worker connect timeout in seconds
    #[arg(long, default_value = "10", value_name = "SECS")]
    pub connect_timeout: u64,

    /// Maximum gRPC message size in bytes, both directions
    #[arg(long, default_value_t = i32::MAX as usize, value_name = "BYTES")]
    pub max_message_size: usize,

    /// Port discovered workers listen on
    #[arg(long, default_value_t = DEFAULT_WORKER_PORT, value_name = "PORT")]
    pub worker_port: u16,

    /// Minimum compile disk size (GB) a discovered worker must advertise
    #[arg(long, default_value_t = DEFAULT_MIN_DISK_GB, value_name = "GB")]
    pub min_disk_gb: u64,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

/// Arguments for `plan`
#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Workspace root
    #[arg(short = 'w', long, value_name = "DIR", conflicts_with = "compdb")]
    pub workspace_path: Option<PathBuf>,

    /// Compile descriptor file name under <workspace>/out/
    #[arg(short = 'c', long, value_name = "NAME", conflicts_with = "compdb")]
    pub compile_file: Option<String>,

    /// Ninja build file to read a compilation database from
    #[arg(long, value_name = "FILE")]
    pub compdb: Option<PathBuf>,
}

/// Where dispatch gets its worker addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerSource {
    /// Look workers up through the Consul agent at this address
    Discovery(IpAddr),
    /// Use these `host:port` addresses as given
    Static(Vec<String>),
}

/// Validated configuration for `dispatch`
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Canonical workspace root
    pub workspace: PathBuf,

    /// Descriptor file name
    pub compile_file: String,

    pub worker_source: WorkerSource,

    /// Batch deadline
    pub deadline: Duration,

    /// Connection options for every worker
    pub pool: PoolOptions,

    /// Port discovered workers listen on
    pub worker_port: u16,

    /// Resource policy for discovered workers
    pub disk_policy: DiskPolicy,

    /// Show progress indicator
    pub show_progress: bool,
}

impl DispatchConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: DispatchArgs) -> Result<Self, ConfigError> {
        let workspace = validate_workspace(&args.workspace_path)?;

        let compile_file = args.compile_file.trim().to_string();
        if compile_file.is_empty() {
            return Err(ConfigError::InvalidCompileFile(
                "compile file name must not be empty".to_string(),
            ));
        }

        // Static workers win over discovery when both are given
        let worker_source = if !args.workers.is_empty() {
            for address in &args.workers {
                validate_worker_address(address)?;
            }
            WorkerSource::Static(args.workers)
        } else {
            let consul = args
                .consul
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or(ConfigError::NoWorkerSource)?;
            let ip = consul
                .parse::<IpAddr>()
                .map_err(|_| ConfigError::InvalidDiscoveryAddress(consul.to_string()))?;
            WorkerSource::Discovery(ip)
        };

        if args.timeout == 0 {
            return Err(ConfigError::InvalidTimeout(args.timeout));
        }
        if args.connect_timeout == 0 {
            return Err(ConfigError::InvalidTimeout(args.connect_timeout));
        }

        Ok(Self {
            workspace,
            compile_file,
            worker_source,
            deadline: Duration::from_secs(args.timeout),
            pool: PoolOptions {
                connect_timeout: Duration::from_secs(args.connect_timeout),
                max_message_size: args.max_message_size,
            },
            worker_port: args.worker_port,
            disk_policy: DiskPolicy::new(args.min_disk_gb),
            show_progress: !args.quiet,
        })
    }
}

/// Input for `plan`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanConfig {
    /// Resolve a compile descriptor in a workspace
    Descriptor { workspace: PathBuf, compile_file: String },
    /// Extract units from a ninja build file
    Compdb(PathBuf),
}

impl PlanConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: PlanArgs) -> Result<Self, ConfigError> {
        match (args.compdb, args.workspace_path, args.compile_file) {
            (Some(file), None, None) => Ok(Self::Compdb(file)),
            (None, Some(workspace), Some(compile_file)) => {
                let compile_file = compile_file.trim().to_string();
                if compile_file.is_empty() {
                    return Err(ConfigError::InvalidCompileFile(
                        "compile file name must not be empty".to_string(),
                    ));
                }
                Ok(Self::Descriptor {
                    workspace: validate_workspace(&workspace)?,
                    compile_file,
                })
            }
            (Some(_), _, _) => Err(ConfigError::InvalidPlanInput(
                "--compdb cannot be combined with --workspace-path/--compile-file".to_string(),
            )),
            _ => Err(ConfigError::InvalidPlanInput(
                "expected --workspace-path with --compile-file, or --compdb".to_string(),
            )),
        }
    }
}

fn validate_workspace(path: &Path) -> Result<PathBuf, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidWorkspace {
        path: path.to_path_buf(),
        reason,
    };

    let canonical = path.canonicalize().map_err(|e| invalid(e.to_string()))?;
    if !canonical.is_dir() {
        return Err(invalid("not a directory".to_string()));
    }
    Ok(canonical)
}

/// Check a `host:port` worker address
pub fn validate_worker_address(address: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidWorkerAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    };

    let (host, port) = address.rsplit_once(':').ok_or_else(|| invalid("expected host:port"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(invalid("missing or malformed host"));
    }
    match port.parse::<u16>() {
        Ok(p) if p > 0 => Ok(()),
        _ => Err(invalid("port must be a number between 1 and 65535")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(args).unwrap()
    }

    fn dispatch_args(args: &[&str]) -> DispatchArgs {
        match parse(args).command {
            Command::Dispatch(d) => d,
            other => panic!("expected dispatch, got {other:?}"),
        }
    }

    #[test]
    fn test_dispatch_defaults() {
        let dir = tempdir().unwrap();
        let ws = dir.path().to_str().unwrap();
        let args = dispatch_args(&[
            "build-relay", "dispatch", "-w", ws, "-c", "compile.json", "--consul", "10.0.0.5",
        ]);
        let config = DispatchConfig::from_args(args).unwrap();

        assert_eq!(config.workspace, dir.path().canonicalize().unwrap());
        assert_eq!(config.compile_file, "compile.json");
        assert_eq!(config.worker_source, WorkerSource::Discovery("10.0.0.5".parse().unwrap()));
        assert_eq!(config.deadline, Duration::from_secs(1800));
        assert_eq!(config.pool.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.pool.max_message_size, i32::MAX as usize);
        assert_eq!(config.worker_port, 39090);
        assert_eq!(config.disk_policy.min_gb, 500);
        assert!(config.show_progress);
    }

    #[test]
    fn test_static_workers_win() {
        let dir = tempdir().unwrap();
        let ws = dir.path().to_str().unwrap();
        let args = dispatch_args(&[
            "build-relay", "dispatch", "-w", ws, "-c", "c.json", "--consul", "10.0.0.5",
            "--worker", "10.0.0.7:39090", "--worker", "builder:4000", "-q",
        ]);
        let config = DispatchConfig::from_args(args).unwrap();

        assert_eq!(
            config.worker_source,
            WorkerSource::Static(vec!["10.0.0.7:39090".into(), "builder:4000".into()])
        );
        assert!(!config.show_progress);
    }

    #[test]
    fn test_verbose_is_global() {
        let dir = tempdir().unwrap();
        let ws = dir.path().to_str().unwrap();
        let args = parse(&["build-relay", "dispatch", "-w", ws, "-c", "c.json", "-v"]);
        assert!(args.verbose);
    }

    #[test]
    fn test_invalid_consul_address() {
        let dir = tempdir().unwrap();
        let ws = dir.path().to_str().unwrap();
        let args = dispatch_args(&[
            "build-relay", "dispatch", "-w", ws, "-c", "c.json", "--consul", "consul.local",
        ]);
        let err = DispatchConfig::from_args(args).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDiscoveryAddress(_)));
    }

    #[test]
    fn test_missing_worker_source() {
        let dir = tempdir().unwrap();
        let mut args = dispatch_args(&[
            "build-relay", "dispatch", "-w", dir.path().to_str().unwrap(), "-c", "c.json",
        ]);
        // CONSUL_SERVICE may be set in the test environment
        args.consul = None;
        let err = DispatchConfig::from_args(args).unwrap_err();
        assert!(matches!(err, ConfigError::NoWorkerSource));
    }

    #[test]
    fn test_invalid_workspace() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, "").unwrap();

        for ws in [dir.path().join("missing"), file] {
            let args = dispatch_args(&[
                "build-relay", "dispatch", "-w", ws.to_str().unwrap(), "-c", "c.json",
                "--worker", "h:1",
            ]);
            let err = DispatchConfig::from_args(args).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidWorkspace { .. }));
        }
    }

    #[test]
    fn test_zero_timeout() {
        let dir = tempdir().unwrap();
        let ws = dir.path().to_str().unwrap();
        let args = dispatch_args(&[
            "build-relay", "dispatch", "-w", ws, "-c", "c.json", "--worker", "h:1", "--timeout", "0",
        ]);
        let err = DispatchConfig::from_args(args).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout(0)));
    }

    #[test]
    fn test_empty_compile_file() {
        let dir = tempdir().unwrap();
        let ws = dir.path().to_str().unwrap();
        let args = dispatch_args(&["build-relay", "dispatch", "-w", ws, "-c", " ", "--worker", "h:1"]);
        let err = DispatchConfig::from_args(args).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCompileFile(_)));
    }

    #[test]
    fn test_worker_address_validation() {
        assert!(validate_worker_address("10.0.0.1:39090").is_ok());
        assert!(validate_worker_address("builder.local:80").is_ok());
        assert!(validate_worker_address("[::1]:39090").is_ok());

        assert!(validate_worker_address("10.0.0.1").is_err());
        assert!(validate_worker_address(":39090").is_err());
        assert!(validate_worker_address("host:0").is_err());
        assert!(validate_worker_address("host:http").is_err());
        assert!(validate_worker_address("bad host:1").is_err());
    }

    #[test]
    fn test_plan_inputs() {
        let dir = tempdir().unwrap();
        let ws = dir.path().to_str().unwrap();

        let descriptor = match parse(&["build-relay", "plan", "-w", ws, "-c", "c.json"]).command {
            Command::Plan(p) => PlanConfig::from_args(p).unwrap(),
            _ => unreachable!(),
        };
        assert_eq!(
            descriptor,
            PlanConfig::Descriptor {
                workspace: dir.path().canonicalize().unwrap(),
                compile_file: "c.json".into(),
            }
        );

        let compdb = match parse(&["build-relay", "plan", "--compdb", "build.ninja"]).command {
            Command::Plan(p) => PlanConfig::from_args(p).unwrap(),
            _ => unreachable!(),
        };
        assert_eq!(compdb, PlanConfig::Compdb(PathBuf::from("build.ninja")));

        let missing = match parse(&["build-relay", "plan", "-w", ws]).command {
            Command::Plan(p) => PlanConfig::from_args(p).unwrap_err(),
            _ => unreachable!(),
        };
        assert!(matches!(missing, ConfigError::InvalidPlanInput(_)));
    }

    #[test]
    fn test_plan_conflicting_inputs_rejected_by_parser() {
        assert!(CliArgs::try_parse_from([
            "build-relay", "plan", "-w", ".", "--compdb", "build.ninja"
        ])
        .is_err());
    }
}
