use std::path::PathBuf;

use raclambda_core::commands::{ProcessExit, SyncCommand};

use crate::adapters::process::run_captured;

/// Mirrors files between a local directory and a remote bucket.
pub trait RemoteSync {
    fn copy(&self, command: &SyncCommand) -> Result<ProcessExit, String>;
}

/// Sync adapter backed by the `rclone` executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcloneSync {
    pub binary: PathBuf,
}

impl RcloneSync {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl RemoteSync for RcloneSync {
    fn copy(&self, command: &SyncCommand) -> Result<ProcessExit, String> {
        run_captured("sync_adapter", &self.binary, &command.to_args())
    }
}
