//! Naming convention for the files exchanged between map and reduce tasks,
//! plus an atomic write helper.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Name of the file holding what map task `map_id` routed to reduce task `reduce_id`.
pub fn intermediate_name(map_id: u32, reduce_id: u32) -> String {
    format!("mr-{map_id}-{reduce_id}")
}

/// Name of the final output file of reduce task `reduce_id`.
pub fn output_name(reduce_id: u32) -> String {
    format!("mr-out-{reduce_id}")
}

pub fn intermediate_path(dir: &Path, map_id: u32, reduce_id: u32) -> PathBuf {
    dir.join(intermediate_name(map_id, reduce_id))
}

pub fn output_path(dir: &Path, reduce_id: u32) -> PathBuf {
    dir.join(output_name(reduce_id))
}

/// Write `data` to `path` so that readers only ever see the old file or the
/// complete new one.
///
/// The data goes to a temporary file in the same directory, which is then
/// renamed over `path`. Two writers racing on one path each publish a whole file.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
    tmp.write_all(data)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("failed to move temporary file to {}", path.display()))?;

    Ok(())
}
