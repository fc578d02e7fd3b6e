use std::path::PathBuf;

use clap::Parser;

/// Run a MapReduce application sequentially, in one process.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Name of the MapReduce application to run.
    #[arg(short, long, default_value = "wc")]
    workload: String,

    /// Output file.
    #[arg(short, long, default_value = "mr-out-0")]
    output: PathBuf,

    /// Input files or glob patterns.
    #[arg(value_name = "FILE", required = true)]
    inputs: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let workload = workload::try_named(&args.workload)
        .ok_or_else(|| anyhow::anyhow!("The workload `{}` is not a known workload", args.workload))?;
    let files = standalone::expand_inputs(&args.inputs)?;

    let keys = standalone::run_to_file(workload, &files, &args.output)?;
    println!("{} keys written to {}", keys, args.output.display());

    Ok(())
}
