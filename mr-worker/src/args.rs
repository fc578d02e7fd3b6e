use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// The address of the coordinator server
    #[arg(short = 'j', long = "join", default_value = "http://[::1]:8030")]
    pub address: String,

    /// Name of the MapReduce application to run.
    #[arg(short, long, default_value = "wc")]
    pub workload: String,

    /// Directory for intermediate and output files.
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    /// Milliseconds to wait before asking again when there is no work yet.
    #[arg(long, default_value = "10")]
    pub poll_interval_ms: u64,
}
