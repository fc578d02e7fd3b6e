use std::path::Path;

use anyhow::{Context, Result};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::{info, warn};

use common::codec::decode_records;
use common::files::{intermediate_path, output_path, write_atomic};
use common::{KeyValue, ReduceFn, Workload};

/// A reduce task as handed out by the coordinator.
#[derive(Debug, Clone)]
pub struct ReduceTask {
    pub id: u32,
    pub n_map: u32,
}

/// Gather this task's partition from every map task, sort it by key, and
/// write one `<key> <result>` line per distinct key to the output file.
pub fn perform_reduce(task: &ReduceTask, workload: Workload, dir: &Path) -> Result<()> {
    info!("Starting reduce task {}", task.id);

    let mut pairs = Vec::new();
    for map_id in 0..task.n_map {
        let path = intermediate_path(dir, map_id, task.id);
        let data = std::fs::read(&path).with_context(|| format!("cannot open {}", path.display()))?;
        pairs.extend(decode_records(&data));
    }

    sort_by_key(&mut pairs);
    let output = reduce_sorted(&pairs, workload.reduce_fn)?;

    write_atomic(&output_path(dir, task.id), &output)?;
    Ok(())
}

/// Order pairs by key. Grouping depends on this, not on the partition hash.
pub fn sort_by_key(pairs: &mut [KeyValue]) {
    pairs.sort_by(|a, b| a.key.cmp(&b.key));
}

/// Call `reduce_fn` once per run of equal keys in the key-sorted `pairs`,
/// rendering each result as a `<key> <result>\n` line.
pub fn reduce_sorted(pairs: &[KeyValue], reduce_fn: ReduceFn) -> Result<Bytes> {
    let mut out = BytesMut::new();

    let mut start = 0;
    while start < pairs.len() {
        let key = &pairs[start].key;
        let end = pairs[start..]
            .iter()
            .position(|kv| kv.key != *key)
            .map_or(pairs.len(), |len| start + len);

        let values = pairs[start..end].iter().map(KeyValue::value);
        let result = reduce_fn(key.clone(), Box::new(values)).with_context(|| {
            format!("reduce function failed on key {}", String::from_utf8_lossy(key))
        })?;

        out.put_slice(key);
        out.put_u8(b' ');
        out.put_slice(&result);
        out.put_u8(b'\n');

        start = end;
    }

    Ok(out.freeze())
}

/// Delete the intermediate files a finished reduce task consumed.
/// Failures are logged and otherwise ignored.
pub async fn cleanup(task: &ReduceTask, dir: &Path) {
    for map_id in 0..task.n_map {
        let path = intermediate_path(dir, map_id, task.id);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("failed to remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use common::codec::encode_records;
    use common::files::output_name;

    /// Joins the values so tests can see exactly what one call received.
    fn join_values(_key: Bytes, values: Box<dyn Iterator<Item = Bytes> + '_>) -> Result<Bytes> {
        let mut values: Vec<_> = values.map(|v| String::from_utf8_lossy(&v).into_owned()).collect();
        values.sort();
        Ok(Bytes::from(values.join(",")))
    }

    static CALLS: AtomicUsize = AtomicUsize::new(0);

    fn counting(key: Bytes, values: Box<dyn Iterator<Item = Bytes> + '_>) -> Result<Bytes> {
        CALLS.fetch_add(1, Ordering::SeqCst);
        join_values(key, values)
    }

    #[test]
    fn one_call_per_distinct_key() {
        let mut pairs = vec![
            KeyValue::new("b", "2"),
            KeyValue::new("a", "1"),
            KeyValue::new("b", "3"),
            KeyValue::new("c", "4"),
            KeyValue::new("a", "5"),
        ];
        sort_by_key(&mut pairs);

        let out = reduce_sorted(&pairs, counting).unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 3);
        assert_eq!(out, "a 1,5\nb 2,3\nc 4\n");
    }

    #[test]
    fn no_pairs_no_lines() {
        assert!(reduce_sorted(&[], join_values).unwrap().is_empty());
    }

    fn write_partition(dir: &Path, map_id: u32, reduce_id: u32, data: &[u8]) {
        std::fs::write(intermediate_path(dir, map_id, reduce_id), data).unwrap();
    }

    #[test]
    fn merges_partitions_from_every_map_task() {
        let dir = tempfile::tempdir().unwrap();
        write_partition(
            dir.path(),
            0,
            1,
            &encode_records(&[KeyValue::new("y", "1"), KeyValue::new("x", "1")]),
        );

        // The second map's file ends in a torn record, which is dropped.
        let mut torn = encode_records(&[KeyValue::new("x", "1")]).to_vec();
        torn.extend_from_slice(b"eno");
        write_partition(dir.path(), 1, 1, &torn);

        let task = ReduceTask { id: 1, n_map: 2 };
        perform_reduce(&task, workload::try_named("wc").unwrap(), dir.path()).unwrap();

        let out = std::fs::read_to_string(dir.path().join(output_name(1))).unwrap();
        assert_eq!(out, "x 2\ny 1\n");
    }

    #[test]
    fn missing_partition_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_partition(dir.path(), 0, 0, b"");

        let task = ReduceTask { id: 0, n_map: 2 };
        assert!(perform_reduce(&task, workload::try_named("wc").unwrap(), dir.path()).is_err());
        assert!(!dir.path().join(output_name(0)).exists());
    }

    #[tokio::test]
    async fn cleanup_removes_consumed_files_only() {
        let dir = tempfile::tempdir().unwrap();
        for map_id in 0..2 {
            for reduce_id in 0..2 {
                write_partition(dir.path(), map_id, reduce_id, b"");
            }
        }

        cleanup(&ReduceTask { id: 0, n_map: 2 }, dir.path()).await;

        for map_id in 0..2 {
            assert!(!intermediate_path(dir.path(), map_id, 0).exists());
            assert!(intermediate_path(dir.path(), map_id, 1).exists());
        }
    }
}
