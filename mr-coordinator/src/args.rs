use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// The port for the server to run on.
    #[arg(short, long, default_value = "8030")]
    pub port: u16,

    /// Number of reduce tasks (and output files).
    #[arg(short = 'r', long, default_value = "10")]
    pub n_reduce: u32,

    /// Seconds a worker may hold a task before it is handed out again.
    #[arg(short, long, default_value = "10")]
    pub timeout: u64,

    /// Input files, one map task each.
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,
}
