//! Sequential MapReduce.
//!
//! Runs a workload over its inputs in a single process, with no coordinator,
//! partitioning or intermediate files. The result is what a distributed run
//! of the same job must produce, with every key in one file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use bytes::{BufMut, Bytes, BytesMut};

use common::{KeyValue, Workload};

/// Expand glob patterns into the input files they match, in a stable order.
/// Patterns without wildcards must name an existing file.
pub fn expand_inputs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let matches = glob::glob(pattern)
            .with_context(|| format!("invalid input pattern `{pattern}`"))?
            .collect::<Result<Vec<_>, _>>()?;
        if matches.is_empty() {
            return Err(anyhow!("no input files match `{pattern}`"));
        }
        files.extend(matches);
    }
    Ok(files)
}

/// Run `workload` over `files`, returning one `(key, result)` pair per
/// distinct key in ascending key order.
pub fn run(workload: Workload, files: &[PathBuf]) -> Result<Vec<KeyValue>> {
    let mut groups: BTreeMap<Bytes, Vec<Bytes>> = BTreeMap::new();

    for file in files {
        let contents =
            std::fs::read(file).with_context(|| format!("cannot read {}", file.display()))?;
        let input = KeyValue::new(file.to_string_lossy().into_owned(), contents);
        for kv in (workload.map_fn)(input)? {
            let kv = kv?;
            groups.entry(kv.key).or_default().push(kv.value);
        }
    }

    groups
        .into_iter()
        .map(|(key, values)| -> Result<KeyValue> {
            let result = (workload.reduce_fn)(key.clone(), Box::new(values.into_iter()))?;
            Ok(KeyValue::new(key, result))
        })
        .collect()
}

/// Render results as `<key> <value>` lines.
pub fn render(results: &[KeyValue]) -> Bytes {
    let mut out = BytesMut::new();
    for kv in results {
        out.put_slice(&kv.key);
        out.put_u8(b' ');
        out.put_slice(&kv.value);
        out.put_u8(b'\n');
    }
    out.freeze()
}

/// Run `workload` and write the rendered results to `output`.
pub fn run_to_file(workload: Workload, files: &[PathBuf], output: &Path) -> Result<usize> {
    let results = run(workload, files)?;
    common::files::write_atomic(output, &render(&results))?;
    Ok(results.len())
}
