use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tonic::transport::Channel;
use tracing::{debug, info};

use common::rpc::{
    CoordinatorClient, GetTaskRequest, GetTaskResponse, ReplyCode, ReportTaskSuccessRequest,
    TaskPhase,
};
use common::utils::unix_timestamp;
use common::Workload;

use crate::map::{self, MapTask};
use crate::reduce::{self, ReduceTask};

/// How long to back off when the coordinator has no work yet.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A worker process. Pulls tasks from the coordinator until the job is done.
#[derive(Debug)]
pub struct MRWorker {
    client: CoordinatorClient<Channel>,
    workload: Workload,

    /// Where intermediate and output files live.
    dir: PathBuf,
    poll_interval: Duration,
}

impl MRWorker {
    /// Connect to the coordinator at `address`, e.g. `http://[::1]:8030`.
    pub async fn connect(
        address: impl Into<String>,
        workload: Workload,
        dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let address = address.into();
        let client = CoordinatorClient::connect(address.clone())
            .await
            .with_context(|| format!("cannot reach coordinator at {address}"))?;

        Ok(Self {
            client,
            workload,
            dir: dir.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Ask for work, do it, report it, until the coordinator says the job is done.
    ///
    /// Any RPC failure or task error ends the loop with an error; the
    /// coordinator hands the abandoned task to someone else after its timeout.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let request = GetTaskRequest {
                timestamp: unix_timestamp(),
            };
            let reply = self
                .client
                .get_task(request)
                .await
                .context("request task from coordinator failed")?
                .into_inner();

            match reply.code() {
                ReplyCode::Wait => tokio::time::sleep(self.poll_interval).await,
                ReplyCode::Done => {
                    info!("Job finished, worker exiting");
                    return Ok(());
                }
                ReplyCode::MapTask => self.run_map(reply).await?,
                ReplyCode::ReduceTask => self.run_reduce(reply).await?,
            }
        }
    }

    async fn run_map(&mut self, reply: GetTaskResponse) -> Result<()> {
        let task = MapTask {
            id: reply.task_id,
            filename: reply.filename,
            n_reduce: reply.n_reduce,
        };

        let workload = self.workload;
        let dir = self.dir.clone();
        let finished = task.clone();
        tokio::task::spawn_blocking(move || map::perform_map(&task, workload, &dir))
            .await
            .context("map task panicked")??;

        self.report(TaskPhase::Map, finished.id, reply.token).await?;
        info!("Map task {} finished", finished.id);
        Ok(())
    }

    async fn run_reduce(&mut self, reply: GetTaskResponse) -> Result<()> {
        let task = ReduceTask {
            id: reply.task_id,
            n_map: reply.n_map,
        };

        let workload = self.workload;
        let dir = self.dir.clone();
        let blocking_task = task.clone();
        tokio::task::spawn_blocking(move || reduce::perform_reduce(&blocking_task, workload, &dir))
            .await
            .context("reduce task panicked")??;

        self.complete_reduce(&task, reply.token).await?;
        info!("Reduce task {} finished", task.id);
        Ok(())
    }

    /// Report a finished reduce task under `token`. If this attempt is the one
    /// the coordinator counted, delete the intermediate files it consumed.
    ///
    /// Returns whether the report was accepted.
    pub async fn complete_reduce(&mut self, task: &ReduceTask, token: u64) -> Result<bool> {
        let accepted = self.report(TaskPhase::Reduce, task.id, token).await?;

        // A superseded attempt leaves the files to the attempt that counted.
        if accepted {
            reduce::cleanup(task, &self.dir).await;
        }
        Ok(accepted)
    }

    /// Report success, returning whether the coordinator counted this attempt.
    async fn report(&mut self, phase: TaskPhase, task_id: u32, token: u64) -> Result<bool> {
        let request = ReportTaskSuccessRequest {
            phase: phase as i32,
            task_id,
            token,
        };
        let accepted = self
            .client
            .report_task_success(request)
            .await
            .with_context(|| format!("reporting {} task {} failed", phase.label(), task_id))?
            .into_inner()
            .accepted;

        if !accepted {
            debug!("{} task {} was already finished elsewhere", phase.label(), task_id);
        }
        Ok(accepted)
    }
}
