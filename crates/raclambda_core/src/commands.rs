//! Argument layouts for the two external command-line collaborators.
//!
//! Both tools are treated as black boxes; this module only decides what they
//! are asked to do, never how they are spawned.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    Parquet,
    Aws,
}

impl OutputMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "parquet" => Some(Self::Parquet),
            "aws" => Some(Self::Aws),
            _ => None,
        }
    }

    pub fn flag(self) -> &'static str {
        match self {
            Self::Parquet => "-parquet",
            Self::Aws => "-aws",
        }
    }
}

/// One end of a sync adapter copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncLocation {
    Local(PathBuf),
    Remote { remote: String, bucket: String },
}

impl SyncLocation {
    pub fn remote(remote: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self::Remote {
            remote: remote.into(),
            bucket: bucket.into(),
        }
    }

    fn to_arg(&self) -> OsString {
        match self {
            Self::Local(path) => path.clone().into_os_string(),
            Self::Remote { remote, bucket } => format!("{remote}:{bucket}").into(),
        }
    }
}

impl fmt::Display for SyncLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote { remote, bucket } => write!(f, "{remote}:{bucket}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCommand {
    pub config_path: PathBuf,
    pub source: SyncLocation,
    pub destination: SyncLocation,
    /// Skip files whose size already matches at the destination.
    pub size_only: bool,
}

impl SyncCommand {
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--config".into(),
            self.config_path.clone().into_os_string(),
            "copy".into(),
            self.source.to_arg(),
            self.destination.to_arg(),
        ];
        if self.size_only {
            args.push("--size-only".into());
        }
        args
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionCommand {
    /// Directory the tool creates and fills with outputs.
    pub project_dir: PathBuf,
    pub dregs_dir: PathBuf,
    pub mode: OutputMode,
    pub inputs: Vec<PathBuf>,
}

impl ConversionCommand {
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            self.mode.flag().into(),
            "-project".into(),
            self.project_dir.clone().into_os_string(),
            "-dregs".into(),
            self.dregs_dir.clone().into_os_string(),
        ];
        args.extend(self.inputs.iter().map(|path| path.clone().into_os_string()));
        args
    }
}

/// Exit status of an external tool, independent of how it was spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessExit {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ProcessExit {
    pub const SUCCESS: Self = Self { code: Some(0) };

    pub fn with_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ProcessExit {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}
