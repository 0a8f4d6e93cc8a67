//! Auxiliary-state ("dregs") change detection.
//!
//! File identity is the path relative to the dregs directory; contents are
//! never compared. A file rewritten in place under the same name is not part
//! of the delta, which is why the final upload re-syncs the whole directory
//! by size instead of relying on this set alone.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

/// Lists regular files below `dir` as `/`-separated relative paths.
///
/// A directory that does not exist yet has an empty snapshot.
pub fn snapshot_names(dir: &Path) -> io::Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    if !dir.exists() {
        return Ok(names);
    }
    collect_files(dir, "", &mut names)?;
    Ok(names)
}

fn collect_files(dir: &Path, prefix: &str, names: &mut BTreeSet<String>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let relative = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&entry.path(), &relative, names)?;
        } else if file_type.is_file() {
            names.insert(relative);
        }
    }
    Ok(())
}

/// Names present after the tool ran that were absent before it.
pub fn new_names(before: &BTreeSet<String>, after: &BTreeSet<String>) -> BTreeSet<String> {
    after.difference(before).cloned().collect()
}
