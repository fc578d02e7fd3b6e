use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use common::rpc::{
    Coordinator, GetTaskRequest, GetTaskResponse, ReplyCode, ReportTaskSuccessRequest,
    ReportTaskSuccessResponse, TaskPhase,
};

use crate::jobs::Job;
use crate::ledger::{Assignment, Claim, Ledger, ReportOutcome};
use crate::monitor;

/// The coordinator service. Cheap to clone; clones share all state.
#[derive(Debug, Clone)]
pub struct MRCoordinator {
    job: Arc<Job>,
    ledger: Arc<Ledger>,

    /// Cancelled once, when the last reduce task is done.
    done: CancellationToken,
}

impl MRCoordinator {
    pub fn new(job: Job) -> Self {
        let ledger = Ledger::new(job.n_map(), job.n_reduce());
        Self {
            job: Arc::new(job),
            ledger: Arc::new(ledger),
            done: CancellationToken::new(),
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Whether every reduce task is done. Never blocks.
    pub fn is_done(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Resolves once every reduce task is done.
    pub async fn wait_done(&self) {
        self.done.cancelled().await
    }

    /// Decide what a polling worker should do next.
    ///
    /// Map work comes first. Reduce work is only handed out once every map
    /// task is done, which is what keeps reducers from reading partial input.
    pub async fn next_task(&self) -> GetTaskResponse {
        if let Claim::Assigned(assignment) = self.ledger.claim(TaskPhase::Map).await {
            self.start_deadline(assignment);
            return GetTaskResponse {
                code: ReplyCode::MapTask as i32,
                task_id: assignment.id,
                filename: self.job.file(assignment.id).unwrap_or_default().to_string(),
                n_map: self.job.n_map(),
                n_reduce: self.job.n_reduce(),
                token: assignment.token,
            };
        }

        // Every map id has been handed out, but not all of them are done yet.
        if self.ledger.success_count(TaskPhase::Map).await < self.job.n_map() as usize {
            return GetTaskResponse::wait();
        }

        if let Claim::Assigned(assignment) = self.ledger.claim(TaskPhase::Reduce).await {
            self.start_deadline(assignment);
            return GetTaskResponse {
                code: ReplyCode::ReduceTask as i32,
                task_id: assignment.id,
                filename: String::new(),
                n_map: self.job.n_map(),
                n_reduce: self.job.n_reduce(),
                token: assignment.token,
            };
        }

        if self.ledger.success_count(TaskPhase::Reduce).await < self.job.n_reduce() as usize {
            return GetTaskResponse::wait();
        }

        GetTaskResponse::done()
    }

    /// Record that a worker finished `id` of `phase` under `token`.
    ///
    /// Returns whether the report moved the task to done. Duplicate and
    /// superseded reports are acknowledged but change nothing.
    pub async fn task_success(&self, phase: TaskPhase, id: u32, token: u64) -> Result<bool, Status> {
        let outcome = self
            .ledger
            .report(phase, id, token)
            .await
            .map_err(|e| Status::invalid_argument(e.to_string()))?;

        match outcome {
            ReportOutcome::Accepted { phase_complete } => {
                info!("{} task {} done", phase.label(), id);
                if phase_complete {
                    match phase {
                        TaskPhase::Map => info!("All map tasks done, starting reduce phase"),
                        TaskPhase::Reduce => {
                            info!("All reduce tasks done, job complete");
                            self.done.cancel();
                        }
                    }
                }
                Ok(true)
            }
            ReportOutcome::Duplicate => {
                debug!(
                    "{} task {} was already done, ignoring report ({} received)",
                    phase.label(),
                    id,
                    self.ledger.reports(phase, id).await.unwrap_or_default()
                );
                Ok(false)
            }
            ReportOutcome::Stale => {
                warn!(
                    "{} task {} reported with superseded token {}, ignoring ({} received)",
                    phase.label(),
                    id,
                    token,
                    self.ledger.reports(phase, id).await.unwrap_or_default()
                );
                Ok(false)
            }
        }
    }

    fn start_deadline(&self, assignment: Assignment) {
        debug!(
            "Assigned {} task {} (token {})",
            assignment.phase.label(),
            assignment.id,
            assignment.token
        );
        monitor::watch(self.ledger.clone(), assignment, self.job.timeout());
    }
}

#[tonic::async_trait]
impl Coordinator for MRCoordinator {
    /// Worker asks for work.
    async fn get_task(
        &self,
        request: Request<GetTaskRequest>,
    ) -> Result<Response<GetTaskResponse>, Status> {
        debug!(
            "Got a task request from {:?} (sent at {})",
            request.remote_addr(),
            request.get_ref().timestamp
        );

        Ok(Response::new(self.next_task().await))
    }

    /// Worker reports a finished task.
    async fn report_task_success(
        &self,
        request: Request<ReportTaskSuccessRequest>,
    ) -> Result<Response<ReportTaskSuccessResponse>, Status> {
        let request = request.into_inner();
        let phase = TaskPhase::try_from(request.phase)
            .map_err(|_| Status::invalid_argument(format!("unknown task phase {}", request.phase)))?;

        let accepted = self
            .task_success(phase, request.task_id, request.token)
            .await?;

        Ok(Response::new(ReportTaskSuccessResponse { accepted }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn coordinator(files: &[&str], n_reduce: u32, timeout: Duration) -> MRCoordinator {
        let files = files.iter().map(|f| f.to_string()).collect();
        MRCoordinator::new(Job::new(files, n_reduce, timeout).unwrap())
    }

    fn code(reply: &GetTaskResponse) -> ReplyCode {
        reply.code()
    }

    #[tokio::test]
    async fn two_files_one_reducer_runs_to_completion() {
        let c = coordinator(&["a.txt", "b.txt"], 1, Duration::from_secs(10));

        let first = c.next_task().await;
        let second = c.next_task().await;
        assert_eq!(code(&first), ReplyCode::MapTask);
        assert_eq!(code(&second), ReplyCode::MapTask);
        assert_eq!(first.n_map, 2);
        assert_eq!(first.n_reduce, 1);

        let mut files = vec![first.filename.clone(), second.filename.clone()];
        files.sort();
        assert_eq!(files, ["a.txt", "b.txt"]);

        // Maps handed out but not done: barrier holds.
        assert_eq!(code(&c.next_task().await), ReplyCode::Wait);

        assert!(c.task_success(TaskPhase::Map, first.task_id, first.token).await.unwrap());
        assert_eq!(code(&c.next_task().await), ReplyCode::Wait);
        assert!(c.task_success(TaskPhase::Map, second.task_id, second.token).await.unwrap());

        let reduce = c.next_task().await;
        assert_eq!(code(&reduce), ReplyCode::ReduceTask);
        assert_eq!(reduce.task_id, 0);
        assert!(reduce.filename.is_empty());

        assert_eq!(code(&c.next_task().await), ReplyCode::Wait);
        assert!(!c.is_done());

        assert!(c.task_success(TaskPhase::Reduce, 0, reduce.token).await.unwrap());
        assert!(c.is_done());
        assert_eq!(code(&c.next_task().await), ReplyCode::Done);
        c.wait_done().await;
    }

    #[tokio::test]
    async fn duplicate_report_does_not_release_barrier() {
        let c = coordinator(&["a.txt", "b.txt"], 1, Duration::from_secs(10));
        let first = c.next_task().await;
        let _second = c.next_task().await;

        assert!(c.task_success(TaskPhase::Map, first.task_id, first.token).await.unwrap());
        assert!(!c.task_success(TaskPhase::Map, first.task_id, first.token).await.unwrap());

        assert_eq!(c.ledger().success_count(TaskPhase::Map).await, 1);
        assert_eq!(code(&c.next_task().await), ReplyCode::Wait);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_map_task_is_reassigned() {
        let timeout = Duration::from_secs(10);
        let c = coordinator(&["a.txt"], 1, timeout);

        let stalled = c.next_task().await;
        assert_eq!(code(&stalled), ReplyCode::MapTask);
        assert_eq!(code(&c.next_task().await), ReplyCode::Wait);

        tokio::time::sleep(timeout + Duration::from_millis(1)).await;

        let retry = c.next_task().await;
        assert_eq!(code(&retry), ReplyCode::MapTask);
        assert_eq!(retry.task_id, stalled.task_id);
        assert_eq!(retry.filename, "a.txt");

        // The stalled worker wakes up late; its report no longer counts.
        assert!(!c.task_success(TaskPhase::Map, stalled.task_id, stalled.token).await.unwrap());
        assert!(c.task_success(TaskPhase::Map, retry.task_id, retry.token).await.unwrap());
        assert_eq!(code(&c.next_task().await), ReplyCode::ReduceTask);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_reduce_task_is_reassigned() {
        let timeout = Duration::from_secs(10);
        let c = coordinator(&["a.txt"], 1, timeout);

        let map = c.next_task().await;
        assert!(c.task_success(TaskPhase::Map, map.task_id, map.token).await.unwrap());

        let stalled = c.next_task().await;
        assert_eq!(code(&stalled), ReplyCode::ReduceTask);
        assert_eq!(code(&c.next_task().await), ReplyCode::Wait);

        tokio::time::sleep(timeout + Duration::from_millis(1)).await;

        let retry = c.next_task().await;
        assert_eq!(code(&retry), ReplyCode::ReduceTask);
        assert_eq!(retry.task_id, stalled.task_id);
        assert_ne!(retry.token, stalled.token);

        assert!(c.task_success(TaskPhase::Reduce, retry.task_id, retry.token).await.unwrap());
        assert!(c.is_done());

        // The stalled reducer's report arrives after the job finished.
        assert!(!c.task_success(TaskPhase::Reduce, stalled.task_id, stalled.token).await.unwrap());
        assert_eq!(c.ledger().success_count(TaskPhase::Reduce).await, 1);
        assert_eq!(c.ledger().reports(TaskPhase::Reduce, stalled.task_id).await, Some(2));
        assert_eq!(code(&c.next_task().await), ReplyCode::Done);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn reduce_never_dispatched_before_maps_are_done() {
        let files: Vec<String> = (0..8).map(|i| format!("in-{i}.txt")).collect();
        let refs: Vec<&str> = files.iter().map(String::as_str).collect();
        let c = coordinator(&refs, 4, Duration::from_secs(10));

        let mut workers = Vec::new();
        for _ in 0..6 {
            let c = c.clone();
            workers.push(tokio::spawn(async move {
                let mut reduces = 0;
                loop {
                    let reply = c.next_task().await;
                    match reply.code() {
                        ReplyCode::MapTask => {
                            tokio::task::yield_now().await;
                            c.task_success(TaskPhase::Map, reply.task_id, reply.token)
                                .await
                                .unwrap();
                        }
                        ReplyCode::ReduceTask => {
                            assert_eq!(c.ledger().success_count(TaskPhase::Map).await, 8);
                            reduces += 1;
                            c.task_success(TaskPhase::Reduce, reply.task_id, reply.token)
                                .await
                                .unwrap();
                        }
                        ReplyCode::Wait => tokio::task::yield_now().await,
                        ReplyCode::Done => return reduces,
                    }
                }
            }));
        }

        let mut total_reduces = 0;
        for worker in workers {
            total_reduces += worker.await.unwrap();
        }
        assert_eq!(total_reduces, 4);
        assert!(c.is_done());
    }

    #[tokio::test]
    async fn bad_reports_are_invalid_argument() {
        let c = coordinator(&["a.txt"], 1, Duration::from_secs(10));

        let unknown_phase = Request::new(ReportTaskSuccessRequest {
            phase: 7,
            task_id: 0,
            token: 1,
        });
        let err = c.report_task_success(unknown_phase).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);

        let out_of_range = Request::new(ReportTaskSuccessRequest {
            phase: TaskPhase::Reduce as i32,
            task_id: 3,
            token: 1,
        });
        let err = c.report_task_success(out_of_range).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }
}
