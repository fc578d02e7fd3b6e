use std::path::Path;

use anyhow::{ensure, Context, Result};
use bytes::BytesMut;
use tracing::{debug, info};

use common::codec::encode_record;
use common::files::{intermediate_path, write_atomic};
use common::{partition, KeyValue, Workload};

/// A map task as handed out by the coordinator.
#[derive(Debug, Clone)]
pub struct MapTask {
    pub id: u32,
    pub filename: String,
    pub n_reduce: u32,
}

/// Run the application's map function over one input file and write its
/// output to one intermediate file per reduce task.
///
/// All `n_reduce` files are written, empty ones included, before this returns.
pub fn perform_map(task: &MapTask, workload: Workload, dir: &Path) -> Result<()> {
    ensure!(task.n_reduce > 0, "map task {} has no reduce partitions", task.id);
    info!("Starting map task {} on `{}`", task.id, task.filename);

    let contents = std::fs::read(&task.filename)
        .with_context(|| format!("cannot read {}", task.filename))?;

    let input = KeyValue::new(task.filename.clone(), contents);
    let output = (workload.map_fn)(input)
        .with_context(|| format!("map function failed on {}", task.filename))?;

    let mut buckets = vec![BytesMut::new(); task.n_reduce as usize];
    let mut emitted = 0usize;
    for kv in output {
        let kv = kv.with_context(|| format!("map function failed on {}", task.filename))?;
        let bucket = partition(&kv.key, task.n_reduce) as usize;
        encode_record(&kv, &mut buckets[bucket]);
        emitted += 1;
    }

    for (reduce_id, bucket) in buckets.iter().enumerate() {
        let path = intermediate_path(dir, task.id, reduce_id as u32);
        write_atomic(&path, bucket)?;
    }

    debug!("Map task {} emitted {} pairs", task.id, emitted);
    Ok(())
}
