use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use raclambda_core::commands::ProcessExit;
use tracing::{debug, warn};

const STDERR_TAIL_BYTES: usize = 4_096;

/// Runs `program` to completion, capturing its output.
///
/// Only a failure to spawn is an `Err`; a non-zero exit is reported through
/// the returned [`ProcessExit`] so callers decide how to classify it.
pub fn run_captured(
    component: &str,
    program: &Path,
    args: &[OsString],
) -> Result<ProcessExit, String> {
    debug!(
        component,
        event = "process_started",
        program = %program.display(),
        args = ?args
    );

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|error| format!("failed to spawn '{}': {error}", program.display()))?;

    let exit = ProcessExit::from(output.status);
    if !exit.success() {
        warn!(
            component,
            event = "process_failed",
            program = %program.display(),
            exit_code = ?exit.code,
            stderr = %stderr_tail(&output.stderr)
        );
    }
    Ok(exit)
}

fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}

/// Writes an executable shell script into `dir` that exits 0 only when
/// called with exactly `expected` (space-joined), and 3 otherwise.
#[cfg(all(test, unix))]
pub(crate) fn argument_checking_script(dir: &Path, expected: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("expect-args.sh");
    let script = format!(
        "#!/bin/sh\n[ \"$*\" = \"{expected}\" ] || {{ echo \"unexpected args: $*\" >&2; exit 3; }}\n"
    );
    std::fs::write(&path, script).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod script");
    path
}
