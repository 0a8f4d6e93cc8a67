use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use raclambda_core::commands::{
    ConversionCommand, OutputMode, ProcessExit, SyncCommand, SyncLocation,
};
use raclambda_core::config::HandlerConfig;
use raclambda_core::delta::snapshot_names;

use crate::adapters::conversion::ConversionTool;
use crate::adapters::object_store::ObjectFetcher;
use crate::adapters::parameter_store::ParameterStore;
use crate::adapters::sync::RemoteSync;

pub fn sample_config(staging_root: &Path) -> HandlerConfig {
    HandlerConfig {
        project: "rac-project".to_string(),
        dregs_bucket: "rac-dregs-bucket".to_string(),
        output_bucket: "rac-output-bucket".to_string(),
        sync_config_parameter: "rclone-config".to_string(),
        input_bucket: "rac-bucket".to_string(),
        conversion_binary: "./rac".into(),
        sync_binary: "rclone".into(),
        sync_remote: "S3".to_string(),
        output_mode: OutputMode::Parquet,
        staging_root: staging_root.to_path_buf(),
    }
}

pub struct RecordingFetcher {
    objects: HashMap<(String, String), Vec<u8>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl RecordingFetcher {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_object(mut self, bucket: &str, key: &str, body: &[u8]) -> Self {
        self.objects
            .insert((bucket.to_string(), key.to_string()), body.to_vec());
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().expect("poisoned mutex").clone()
    }
}

impl ObjectFetcher for RecordingFetcher {
    fn fetch_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, String> {
        self.calls
            .lock()
            .expect("poisoned mutex")
            .push((bucket.to_string(), key.to_string()));
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| "NoSuchKey".to_string())
    }
}

pub struct StaticParameters {
    value: Option<String>,
    calls: Mutex<usize>,
}

impl StaticParameters {
    pub fn new(value: &str) -> Self {
        Self {
            value: Some(value.to_string()),
            calls: Mutex::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            value: None,
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().expect("poisoned mutex")
    }
}

impl ParameterStore for StaticParameters {
    fn get_secure_parameter(&self, name: &str) -> Result<String, String> {
        *self.calls.lock().expect("poisoned mutex") += 1;
        self.value
            .clone()
            .ok_or_else(|| format!("ParameterNotFound: {name}"))
    }
}

type Buckets = BTreeMap<String, BTreeMap<String, Vec<u8>>>;

/// Remote buckets held in memory, honouring size-only copy semantics.
pub struct InMemoryRemote {
    buckets: Mutex<Buckets>,
    commands: Mutex<Vec<SyncCommand>>,
    config_contents: Mutex<Vec<String>>,
    transfers: Mutex<Vec<(String, String)>>,
    failing_bucket: Option<String>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(BTreeMap::new()),
            commands: Mutex::new(Vec::new()),
            config_contents: Mutex::new(Vec::new()),
            transfers: Mutex::new(Vec::new()),
            failing_bucket: None,
        }
    }

    pub fn with_object(self, bucket: &str, key: &str, body: &[u8]) -> Self {
        self.buckets
            .lock()
            .expect("poisoned mutex")
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), body.to_vec());
        self
    }

    pub fn failing_for(mut self, bucket: &str) -> Self {
        self.failing_bucket = Some(bucket.to_string());
        self
    }

    pub fn commands(&self) -> Vec<SyncCommand> {
        self.commands.lock().expect("poisoned mutex").clone()
    }

    pub fn config_contents(&self) -> Vec<String> {
        self.config_contents.lock().expect("poisoned mutex").clone()
    }

    pub fn bucket(&self, bucket: &str) -> BTreeMap<String, Vec<u8>> {
        self.buckets
            .lock()
            .expect("poisoned mutex")
            .get(bucket)
            .cloned()
            .unwrap_or_default()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.bucket(bucket).into_keys().collect()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.bucket(bucket).get(key).cloned()
    }

    /// Keys written into `bucket` by uploads, sorted.
    pub fn transferred_to(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .transfers
            .lock()
            .expect("poisoned mutex")
            .iter()
            .filter(|(target, _)| target == bucket)
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    fn download(&self, bucket: &str, dir: &Path, size_only: bool) -> Result<(), String> {
        let objects = self.bucket(bucket);
        for (key, body) in objects {
            let path = dir.join(&key);
            if size_only && same_size(&path, body.len()) {
                continue;
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|error| error.to_string())?;
            }
            fs::write(&path, body).map_err(|error| error.to_string())?;
        }
        Ok(())
    }

    fn upload(&self, dir: &Path, bucket: &str, size_only: bool) -> Result<(), String> {
        let names = snapshot_names(dir).map_err(|error| error.to_string())?;
        let mut buckets = self.buckets.lock().expect("poisoned mutex");
        let objects = buckets.entry(bucket.to_string()).or_default();
        for name in names {
            let body = fs::read(dir.join(&name)).map_err(|error| error.to_string())?;
            let unchanged = objects
                .get(&name)
                .map(|existing| existing.len() == body.len())
                .unwrap_or(false);
            if size_only && unchanged {
                continue;
            }
            self.transfers
                .lock()
                .expect("poisoned mutex")
                .push((bucket.to_string(), name.clone()));
            objects.insert(name, body);
        }
        Ok(())
    }
}

fn same_size(path: &Path, len: usize) -> bool {
    fs::metadata(path)
        .map(|metadata| metadata.len() == len as u64)
        .unwrap_or(false)
}

impl RemoteSync for InMemoryRemote {
    fn copy(&self, command: &SyncCommand) -> Result<ProcessExit, String> {
        self.commands
            .lock()
            .expect("poisoned mutex")
            .push(command.clone());
        let contents = fs::read_to_string(&command.config_path)
            .map_err(|error| format!("sync config unreadable: {error}"))?;
        self.config_contents
            .lock()
            .expect("poisoned mutex")
            .push(contents);

        let touches_failing_bucket = |location: &SyncLocation| match location {
            SyncLocation::Remote { bucket, .. } => self.failing_bucket.as_ref() == Some(bucket),
            SyncLocation::Local(_) => false,
        };
        if touches_failing_bucket(&command.source) || touches_failing_bucket(&command.destination)
        {
            return Ok(ProcessExit::with_code(1));
        }

        match (&command.source, &command.destination) {
            (SyncLocation::Remote { bucket, .. }, SyncLocation::Local(dir)) => {
                self.download(bucket, dir, command.size_only)?
            }
            (SyncLocation::Local(dir), SyncLocation::Remote { bucket, .. }) => {
                self.upload(dir, bucket, command.size_only)?
            }
            _ => return Err("unsupported copy direction".to_string()),
        }
        Ok(ProcessExit::SUCCESS)
    }
}

/// Conversion tool double: one `<stem>.parquet` per input, derived from the
/// input bytes, plus any configured dregs files.
pub struct StubTool {
    dregs: Vec<(String, Vec<u8>)>,
    exit: ProcessExit,
    spawn_fails: bool,
    commands: Mutex<Vec<ConversionCommand>>,
    dregs_seen: Mutex<Vec<Vec<String>>>,
}

impl StubTool {
    pub fn new() -> Self {
        Self {
            dregs: Vec::new(),
            exit: ProcessExit::SUCCESS,
            spawn_fails: false,
            commands: Mutex::new(Vec::new()),
            dregs_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn writing_dregs(mut self, name: &str, body: &[u8]) -> Self {
        self.dregs.push((name.to_string(), body.to_vec()));
        self
    }

    pub fn exiting_with(mut self, exit: ProcessExit) -> Self {
        self.exit = exit;
        self
    }

    pub fn failing_to_spawn(mut self) -> Self {
        self.spawn_fails = true;
        self
    }

    pub fn commands(&self) -> Vec<ConversionCommand> {
        self.commands.lock().expect("poisoned mutex").clone()
    }

    /// Dregs directory contents observed at the start of each invocation.
    pub fn dregs_seen(&self) -> Vec<Vec<String>> {
        self.dregs_seen.lock().expect("poisoned mutex").clone()
    }
}

impl ConversionTool for StubTool {
    fn invoke(&self, command: &ConversionCommand) -> Result<ProcessExit, String> {
        self.commands
            .lock()
            .expect("poisoned mutex")
            .push(command.clone());
        if self.spawn_fails {
            return Err("failed to spawn './rac': No such file or directory".to_string());
        }

        let seen = snapshot_names(&command.dregs_dir).map_err(|error| error.to_string())?;
        self.dregs_seen
            .lock()
            .expect("poisoned mutex")
            .push(seen.into_iter().collect());

        fs::create_dir_all(&command.project_dir).map_err(|error| error.to_string())?;
        for input in &command.inputs {
            let body = fs::read(input).map_err(|error| error.to_string())?;
            let stem = input
                .file_stem()
                .and_then(|stem| stem.to_str())
                .ok_or_else(|| "input without file name".to_string())?;
            let mut converted = b"converted:".to_vec();
            converted.extend_from_slice(&body);
            fs::write(command.project_dir.join(format!("{stem}.parquet")), converted)
                .map_err(|error| error.to_string())?;
        }

        for (name, body) in &self.dregs {
            fs::write(command.dregs_dir.join(name), body).map_err(|error| error.to_string())?;
        }

        Ok(self.exit)
    }
}
