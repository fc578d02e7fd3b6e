//! MapReduce coordinator.
//!
//! Splits a job into map and reduce tasks, hands them to workers that poll
//! over gRPC, and hands a task out again when its worker goes quiet for
//! longer than the job's timeout.

use std::future::Future;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::info;

use common::rpc::CoordinatorServer;

pub mod args;
pub mod core;
pub mod jobs;
pub mod ledger;
pub mod monitor;

pub use crate::core::MRCoordinator;
pub use crate::jobs::Job;

/// Serve `coordinator` on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(
    coordinator: MRCoordinator,
    listener: TcpListener,
    shutdown: F,
) -> Result<(), tonic::transport::Error>
where
    F: Future<Output = ()>,
{
    if let Ok(addr) = listener.local_addr() {
        info!("CoordinatorServer listening on {}", addr);
    }

    Server::builder()
        .add_service(CoordinatorServer::new(coordinator))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await
}
