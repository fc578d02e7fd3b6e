use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use mr_coordinator::args::Args;
use mr_coordinator::{serve, Job, MRCoordinator};

/// How often the driver checks whether the job has finished.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Time left for workers to pick up the final `DONE` reply before the server stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // Every argument has a default except the input files.
    let args = Args::parse();
    let job = Job::from_args(&args)?;
    info!(
        "Starting job with {} map tasks and {} reduce tasks (task timeout {:?})",
        job.n_map(),
        job.n_reduce(),
        job.timeout()
    );
    debug!("Input files: {:?}", job.files());

    let addr: SocketAddr = format!("[::1]:{}", args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    let coordinator = MRCoordinator::new(job);
    let shutdown = CancellationToken::new();
    let server = {
        let shutdown = shutdown.clone();
        tokio::spawn(serve(coordinator.clone(), listener, async move {
            shutdown.cancelled().await
        }))
    };

    while !coordinator.is_done() {
        if server.is_finished() {
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    tokio::time::sleep(SHUTDOWN_GRACE).await;
    shutdown.cancel();
    server.await??;

    info!("Coordinator exited...");
    Ok(())
}
