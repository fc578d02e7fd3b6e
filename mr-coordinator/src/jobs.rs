use std::time::Duration;

use anyhow::{ensure, Result};

use crate::args::Args;

/// Default time a task may stay assigned before it is handed out again.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(10);

/// The batch job a coordinator runs. Immutable once the coordinator starts.
#[derive(Debug, Clone)]
pub struct Job {
    /// Input files. Map task `i` reads `files[i]`.
    files: Vec<String>,

    /// Number of reduce tasks.
    n_reduce: u32,

    /// Timeout allowed before an assigned task is handed out again.
    timeout: Duration,
}

impl Job {
    pub fn new(files: Vec<String>, n_reduce: u32, timeout: Duration) -> Result<Self> {
        ensure!(n_reduce > 0, "the job needs at least one reduce task");
        ensure!(
            u32::try_from(files.len()).is_ok(),
            "too many input files ({})",
            files.len()
        );

        Ok(Self {
            files,
            n_reduce,
            timeout,
        })
    }

    /// Build the job described on the command line.
    pub fn from_args(args: &Args) -> Result<Self> {
        let files = args
            .files
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        Self::new(files, args.n_reduce, Duration::from_secs(args.timeout))
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Input file of map task `id`.
    pub fn file(&self, id: u32) -> Option<&str> {
        self.files.get(id as usize).map(String::as_str)
    }

    pub fn n_map(&self) -> u32 {
        self.files.len() as u32
    }

    pub fn n_reduce(&self) -> u32 {
        self.n_reduce
    }

    /// Get task timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
