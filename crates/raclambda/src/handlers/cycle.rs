use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use raclambda_core::commands::{ConversionCommand, SyncCommand, SyncLocation};
use raclambda_core::config::HandlerConfig;
use raclambda_core::contract::{
    cycle_fingerprint, CycleReport, CycleRequest, CycleStatus, REPORT_SCHEMA_VERSION,
};
use raclambda_core::delta::{new_names, snapshot_names};
use raclambda_core::error::CycleError;
use tempfile::TempDir;
use tracing::{error, info};

use crate::adapters::conversion::ConversionTool;
use crate::adapters::object_store::ObjectFetcher;
use crate::adapters::parameter_store::ParameterStore;
use crate::adapters::sync::RemoteSync;

const COMPONENT: &str = "reconciliation_handler";
const SYNC_CONFIG_FILE: &str = "rclone.conf";

/// External collaborators of one cycle.
#[derive(Clone, Copy)]
pub struct CycleDependencies<'a> {
    pub fetcher: &'a dyn ObjectFetcher,
    pub parameters: &'a dyn ParameterStore,
    pub sync: &'a dyn RemoteSync,
    pub tool: &'a dyn ConversionTool,
}

/// Per-cycle scratch directory, removed when dropped.
pub struct StagingArea {
    root: TempDir,
}

impl StagingArea {
    pub fn create(staging_root: &Path) -> Result<Self, CycleError> {
        fs::create_dir_all(staging_root)
            .map_err(|source| CycleError::staging("creating staging root", source))?;
        let root = tempfile::Builder::new()
            .prefix("rac_")
            .tempdir_in(staging_root)
            .map_err(|source| CycleError::staging("creating staging area", source))?;

        let area = Self { root };
        for dir in [area.input_dir(), area.dregs_dir(), area.output_dir()] {
            fs::create_dir_all(&dir).map_err(|source| {
                CycleError::staging(format!("creating '{}'", dir.display()), source)
            })?;
        }
        Ok(area)
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn input_dir(&self) -> PathBuf {
        self.path().join("input")
    }

    pub fn dregs_dir(&self) -> PathBuf {
        self.path().join("dregs")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path().join("output")
    }

    pub fn sync_config_path(&self) -> PathBuf {
        self.path().join(SYNC_CONFIG_FILE)
    }
}

/// Runs one reconciliation cycle for `request`.
///
/// Inputs are staged, remote dregs are synced down, the conversion tool runs,
/// and only after it exits cleanly are outputs and then dregs pushed back.
/// The staging area is removed on every exit path.
pub fn run_cycle(
    request: &CycleRequest,
    config: &HandlerConfig,
    deps: CycleDependencies<'_>,
    event_time: &str,
) -> Result<CycleReport, CycleError> {
    let fingerprint = cycle_fingerprint(request);

    let (bucket, keys) = match request {
        CycleRequest::NoOp { bucket } => {
            info!(
                component = COMPONENT,
                event = "no_work",
                fingerprint = %fingerprint,
                bucket = %bucket
            );
            return Ok(CycleReport::no_op(request, event_time));
        }
        CycleRequest::Proceed { bucket, keys } => (bucket.as_str(), keys.as_slice()),
    };

    let started_at = Instant::now();
    info!(
        component = COMPONENT,
        event = "cycle_started",
        fingerprint = %fingerprint,
        bucket = %bucket,
        keys = keys.len()
    );

    match reconcile(bucket, keys, config, deps) {
        Ok(outcome) => {
            info!(
                component = COMPONENT,
                event = "cycle_completed",
                fingerprint = %fingerprint,
                staged_keys = keys.len(),
                prior_dregs = outcome.prior_dregs.len(),
                new_dregs = outcome.new_dregs.len(),
                output_files = outcome.output_files,
                duration_ms = started_at.elapsed().as_millis() as u64
            );
            Ok(CycleReport {
                status: CycleStatus::Completed,
                fingerprint,
                input_bucket: bucket.to_string(),
                staged_keys: keys.len(),
                prior_dregs: outcome.prior_dregs,
                new_dregs: outcome.new_dregs,
                output_files: outcome.output_files,
                event_time: event_time.to_string(),
                schema_version: REPORT_SCHEMA_VERSION.to_string(),
            })
        }
        Err(cycle_error) => {
            error!(
                component = COMPONENT,
                event = "cycle_failed",
                fingerprint = %fingerprint,
                kind = cycle_error.kind(),
                error = %cycle_error,
                duration_ms = started_at.elapsed().as_millis() as u64
            );
            Err(cycle_error)
        }
    }
}

struct ReconcileOutcome {
    prior_dregs: Vec<String>,
    new_dregs: Vec<String>,
    output_files: usize,
}

fn reconcile(
    bucket: &str,
    keys: &[String],
    config: &HandlerConfig,
    deps: CycleDependencies<'_>,
) -> Result<ReconcileOutcome, CycleError> {
    let staging = StagingArea::create(&config.staging_root)?;
    let dregs_dir = staging.dregs_dir();
    let output_dir = staging.output_dir();

    let sync_config = fetch_sync_config(deps.parameters, config, &staging)?;

    let inputs = stage_objects(deps.fetcher, bucket, &staging.input_dir(), keys)?;
    info!(component = COMPONENT, event = "inputs_staged", count = inputs.len());

    let dregs_remote = SyncLocation::remote(&config.sync_remote, &config.dregs_bucket);
    run_sync(
        deps.sync,
        &SyncCommand {
            config_path: sync_config.clone(),
            source: dregs_remote.clone(),
            destination: SyncLocation::Local(dregs_dir.clone()),
            size_only: true,
        },
    )?;

    let before = snapshot(&dregs_dir)?;
    info!(component = COMPONENT, event = "dregs_staged", count = before.len());

    invoke_tool(
        deps.tool,
        &ConversionCommand {
            project_dir: output_dir.join(&config.project),
            dregs_dir: dregs_dir.clone(),
            mode: config.output_mode,
            inputs,
        },
    )?;

    let after = snapshot(&dregs_dir)?;
    let delta = new_names(&before, &after);
    let output_files = snapshot(&output_dir)?.len();
    info!(
        component = COMPONENT,
        event = "conversion_completed",
        new_dregs = ?delta,
        output_files
    );

    run_sync(
        deps.sync,
        &SyncCommand {
            config_path: sync_config.clone(),
            source: SyncLocation::Local(output_dir),
            destination: SyncLocation::remote(&config.sync_remote, &config.output_bucket),
            size_only: false,
        },
    )?;

    run_sync(
        deps.sync,
        &SyncCommand {
            config_path: sync_config,
            source: SyncLocation::Local(dregs_dir),
            destination: dregs_remote,
            size_only: true,
        },
    )?;

    Ok(ReconcileOutcome {
        prior_dregs: before.into_iter().collect(),
        new_dregs: delta.into_iter().collect(),
        output_files,
    })
}

/// Downloads each key below `destination`, keeping the key's relative path.
///
/// Stops at the first failed fetch; files already written stay in place until
/// the staging area is dropped.
pub fn stage_objects(
    fetcher: &dyn ObjectFetcher,
    bucket: &str,
    destination: &Path,
    keys: &[String],
) -> Result<Vec<PathBuf>, CycleError> {
    let mut staged = Vec::with_capacity(keys.len());
    for key in keys {
        let path = destination.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| {
                CycleError::staging(format!("creating '{}'", parent.display()), source)
            })?;
        }

        let body = fetcher.fetch_object(bucket, key).map_err(|error| {
            CycleError::storage(format!("failed to fetch s3://{bucket}/{key}: {error}"))
        })?;
        fs::write(&path, body).map_err(|source| {
            CycleError::staging(format!("writing '{}'", path.display()), source)
        })?;
        staged.push(path);
    }
    Ok(staged)
}

fn fetch_sync_config(
    parameters: &dyn ParameterStore,
    config: &HandlerConfig,
    staging: &StagingArea,
) -> Result<PathBuf, CycleError> {
    let contents = parameters
        .get_secure_parameter(&config.sync_config_parameter)
        .map_err(|error| {
            CycleError::storage(format!(
                "failed to read sync config parameter '{}': {error}",
                config.sync_config_parameter
            ))
        })?;

    let path = staging.sync_config_path();
    write_private(&path, contents.as_bytes())
        .map_err(|source| CycleError::staging("writing sync config", source))?;
    Ok(path)
}

/// Writes `contents` to a new file readable only by the owner.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)?.write_all(contents)
}

fn run_sync(sync: &dyn RemoteSync, command: &SyncCommand) -> Result<(), CycleError> {
    let exit = sync.copy(command).map_err(|error| {
        CycleError::storage(format!(
            "sync {} -> {} could not run: {error}",
            command.source, command.destination
        ))
    })?;
    if !exit.success() {
        return Err(CycleError::storage(format!(
            "sync {} -> {} exited with {:?}",
            command.source, command.destination, exit.code
        )));
    }

    info!(
        component = COMPONENT,
        event = "sync_completed",
        source = %command.source,
        destination = %command.destination,
        size_only = command.size_only
    );
    Ok(())
}

fn invoke_tool(tool: &dyn ConversionTool, command: &ConversionCommand) -> Result<(), CycleError> {
    let exit = tool
        .invoke(command)
        .map_err(|message| CycleError::ConversionToolFailure {
            code: None,
            message,
        })?;
    if !exit.success() {
        return Err(CycleError::ConversionToolFailure {
            code: exit.code,
            message: format!(
                "conversion of {} input file(s) did not complete",
                command.inputs.len()
            ),
        });
    }
    Ok(())
}

fn snapshot(dir: &Path) -> Result<BTreeSet<String>, CycleError> {
    snapshot_names(dir)
        .map_err(|source| CycleError::staging(format!("listing '{}'", dir.display()), source))
}
