//! Global configuration parsing, validation, and sink construction.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::codec::MAX_LINE_BYTES;
use crate::sink::{BroadcastLineSink, FileLineSink, LineFormat, LineSink, StreamLineSink};
use crate::supervisor::LaunchConfig;
use crate::{AppError, Result};

/// Environment variables passed to the child when no allowlist is given.
pub const DEFAULT_ENV_ALLOWLIST: &[&str] = &[
    "PATH",
    "HOME",
    "RUST_LOG",
    "LANG",
    // Windows-specific variables.
    "USERPROFILE",
    "SystemRoot",
    "TEMP",
    "TMP",
    "COMSPEC",
];

fn default_env_allowlist() -> Vec<String> {
    DEFAULT_ENV_ALLOWLIST.iter().map(|&s| s.to_owned()).collect()
}

fn default_max_line_bytes() -> usize {
    MAX_LINE_BYTES
}

fn default_shutdown_grace_seconds() -> u64 {
    5
}

fn default_daily_prefix() -> String {
    "output".into()
}

/// The external process whose output is broadcast.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ProcessConfig {
    /// Program to launch.
    pub program: String,
    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory; defaults to the current directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Variables inherited from this process's environment.
    #[serde(default = "default_env_allowlist")]
    pub env_allowlist: Vec<String>,
    /// Maximum accepted line length in bytes.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    /// Time the child gets to exit after SIGTERM before it is killed.
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,
}

/// One destination of the broadcast.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Append to a single file.
    File {
        /// File path, created with its parent directories.
        path: PathBuf,
        /// Line layout.
        #[serde(default)]
        format: LineFormat,
    },
    /// Append to daily-rotating files in a directory.
    Daily {
        /// Directory holding the rotated files.
        dir: PathBuf,
        /// File name prefix.
        #[serde(default = "default_daily_prefix")]
        prefix: String,
        /// Line layout.
        #[serde(default)]
        format: LineFormat,
    },
    /// This process's standard output.
    Stdout,
    /// This process's standard error.
    Stderr,
    /// A TCP line forwarder.
    Tcp {
        /// `host:port` to connect to.
        address: String,
    },
}

impl SinkConfig {
    /// Open the destination described by this entry.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if a file cannot be opened or a socket
    /// cannot connect.
    pub fn open(&self) -> Result<Box<dyn LineSink>> {
        let sink: Box<dyn LineSink> = match self {
            Self::File { path, format } => {
                Box::new(FileLineSink::open(path.clone())?.with_format(*format))
            }
            Self::Daily {
                dir,
                prefix,
                format,
            } => Box::new(FileLineSink::daily(dir.clone(), prefix.clone())?.with_format(*format)),
            Self::Stdout => Box::new(StreamLineSink::stdout()),
            Self::Stderr => Box::new(StreamLineSink::stderr()),
            Self::Tcp { address } => Box::new(StreamLineSink::connect_tcp(address)?),
        };
        Ok(sink)
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::File { path, .. } if path.as_os_str().is_empty() => {
                Err(AppError::Config("file sink path must not be empty".into()))
            }
            Self::Daily { prefix, .. } if prefix.trim().is_empty() => {
                Err(AppError::Config("daily sink prefix must not be empty".into()))
            }
            Self::Tcp { address } if address.trim().is_empty() => {
                Err(AppError::Config("tcp sink address must not be empty".into()))
            }
            _ => Ok(()),
        }
    }
}

/// Global configuration parsed from a TOML file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// The process to supervise.
    pub process: ProcessConfig,
    /// Destinations receiving every output line.
    pub sinks: Vec<SinkConfig>,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the configured command with `command` (program then args).
    ///
    /// An empty `command` leaves the configuration untouched.
    pub fn override_command(&mut self, command: &[String]) {
        if let Some((program, args)) = command.split_first() {
            self.process.program.clone_from(program);
            self.process.args = args.to_vec();
        }
    }

    /// Launch parameters for the supervisor.
    #[must_use]
    pub fn launch_config(&self) -> LaunchConfig {
        LaunchConfig {
            program: self.process.program.clone(),
            args: self.process.args.clone(),
            working_dir: self.process.working_dir.clone(),
            env_allowlist: self.process.env_allowlist.clone(),
            extra_env: Vec::new(),
            max_line_bytes: self.process.max_line_bytes,
            shutdown_grace: Duration::from_secs(self.process.shutdown_grace_seconds),
        }
    }

    /// Open every configured destination and combine them into a broadcast.
    ///
    /// # Errors
    ///
    /// Returns the first destination that fails to open; destinations
    /// opened before it are closed again.
    pub fn build_sinks(&self) -> Result<BroadcastLineSink> {
        let mut opened: Vec<Box<dyn LineSink>> = Vec::with_capacity(self.sinks.len());
        for entry in &self.sinks {
            match entry.open() {
                Ok(sink) => opened.push(sink),
                Err(err) => {
                    for sink in &opened {
                        sink.close().ok();
                    }
                    return Err(err);
                }
            }
        }
        info!(count = opened.len(), "output sinks opened");
        Ok(BroadcastLineSink::new(opened).with_name("output"))
    }

    fn validate(&mut self) -> Result<()> {
        if self.process.program.trim().is_empty() {
            return Err(AppError::Config("process.program must not be empty".into()));
        }

        if self.process.max_line_bytes == 0 {
            return Err(AppError::Config(
                "process.max_line_bytes must be greater than zero".into(),
            ));
        }

        if self.sinks.is_empty() {
            return Err(AppError::Config("at least one sink must be configured".into()));
        }

        for sink in &self.sinks {
            sink.validate()?;
        }

        if let Some(dir) = &self.process.working_dir {
            let canonical = dir
                .canonicalize()
                .map_err(|err| AppError::Config(format!("process.working_dir invalid: {err}")))?;
            self.process.working_dir = Some(canonical);
        }

        Ok(())
    }
}
