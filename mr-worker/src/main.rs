use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use mr_worker::args::Args;
use mr_worker::MRWorker;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let workload = match workload::try_named(&args.workload) {
        Some(wl) => wl,
        None => {
            return Err(format!(
                "The workload `{}` is not a known workload (expected one of {})",
                args.workload,
                workload::NAMES.join(", ")
            )
            .into())
        }
    };

    let mut worker = MRWorker::connect(args.address.clone(), workload, args.dir)
        .await?
        .with_poll_interval(Duration::from_millis(args.poll_interval_ms));
    info!("Worker joined coordinator at {}", args.address);

    if let Err(e) = worker.run().await {
        error!("Fatal error encountered: {:#}", e);
        return Err(e.into());
    }

    Ok(())
}
