//! Task ledger and phase queues.
//!
//! All mutable coordinator state lives here, behind one lock. Callers only
//! get the operations below; they never hold the queues or counters.

use std::collections::VecDeque;

use anyhow::{anyhow, Result};
use tokio::sync::Mutex;

use common::rpc::TaskPhase;

/// Lifecycle of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Waiting in its phase queue.
    Pending,

    /// Handed to a worker, not yet reported done.
    Assigned,

    /// A success report was accepted.
    Done,
}

/// One claim of a task by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub phase: TaskPhase,
    pub id: u32,

    /// Unique per claim. Only a report carrying the latest token counts.
    pub token: u64,
}

/// Result of trying to take work from a phase queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    Assigned(Assignment),

    /// Nothing queued right now; tasks may still come back after a timeout.
    Empty,

    /// Every task of the phase is done. No further claims will succeed.
    Exhausted,
}

/// Result of a success report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The task moved to done. `phase_complete` is set on the report that
    /// finished the last task of the phase.
    Accepted { phase_complete: bool },

    /// The task was already done; nothing changed.
    Duplicate,

    /// The report came from an attempt that has since been superseded.
    Stale,
}

#[derive(Debug, Clone)]
struct TaskRecord {
    status: TaskStatus,

    /// Token of the latest claim, zero if never claimed.
    token: u64,

    /// Success reports received, counting duplicates and stale ones.
    reports: u32,
}

#[derive(Debug)]
struct PhaseQueue {
    pending: VecDeque<u32>,
    tasks: Vec<TaskRecord>,
    succeeded: usize,
    exhausted: bool,
}

impl PhaseQueue {
    fn new(count: u32) -> Self {
        Self {
            pending: (0..count).collect(),
            tasks: vec![
                TaskRecord {
                    status: TaskStatus::Pending,
                    token: 0,
                    reports: 0,
                };
                count as usize
            ],
            succeeded: 0,
            exhausted: count == 0,
        }
    }

    fn record_mut(&mut self, id: u32) -> Result<&mut TaskRecord> {
        let total = self.tasks.len();
        self.tasks
            .get_mut(id as usize)
            .ok_or_else(|| anyhow!("task id {id} out of range (phase has {total} tasks)"))
    }
}

#[derive(Debug)]
struct LedgerState {
    map: PhaseQueue,
    reduce: PhaseQueue,
    next_token: u64,
}

impl LedgerState {
    fn phase(&self, phase: TaskPhase) -> &PhaseQueue {
        match phase {
            TaskPhase::Map => &self.map,
            TaskPhase::Reduce => &self.reduce,
        }
    }

    fn phase_mut(&mut self, phase: TaskPhase) -> &mut PhaseQueue {
        match phase {
            TaskPhase::Map => &mut self.map,
            TaskPhase::Reduce => &mut self.reduce,
        }
    }
}

/// Record of every map and reduce task of the job.
#[derive(Debug)]
pub struct Ledger {
    state: Mutex<LedgerState>,
}

impl Ledger {
    pub fn new(n_map: u32, n_reduce: u32) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                map: PhaseQueue::new(n_map),
                reduce: PhaseQueue::new(n_reduce),
                next_token: 1,
            }),
        }
    }

    /// Take one pending task of `phase`, marking it assigned under a fresh token.
    ///
    /// Ids that reached done while queued are dropped instead of handed out.
    /// Never blocks on an empty queue.
    pub async fn claim(&self, phase: TaskPhase) -> Claim {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let token = state.next_token;

        let queue = match phase {
            TaskPhase::Map => &mut state.map,
            TaskPhase::Reduce => &mut state.reduce,
        };
        if queue.exhausted {
            return Claim::Exhausted;
        }

        while let Some(id) = queue.pending.pop_front() {
            let record = &mut queue.tasks[id as usize];
            if record.status == TaskStatus::Done {
                continue;
            }
            record.status = TaskStatus::Assigned;
            record.token = token;
            state.next_token += 1;
            return Claim::Assigned(Assignment { phase, id, token });
        }

        Claim::Empty
    }

    /// Record a success report for task `id` of `phase`.
    ///
    /// Only the first accepted report per task counts towards the phase
    /// total. Out-of-range ids are an error.
    pub async fn report(&self, phase: TaskPhase, id: u32, token: u64) -> Result<ReportOutcome> {
        let mut state = self.state.lock().await;
        let queue = state.phase_mut(phase);
        let record = queue.record_mut(id)?;
        record.reports += 1;

        if record.status == TaskStatus::Done {
            return Ok(ReportOutcome::Duplicate);
        }
        if record.token == 0 || record.token != token {
            return Ok(ReportOutcome::Stale);
        }

        record.status = TaskStatus::Done;
        queue.succeeded += 1;

        let phase_complete = queue.succeeded == queue.tasks.len();
        if phase_complete {
            queue.exhausted = true;
            queue.pending.clear();
        }

        Ok(ReportOutcome::Accepted { phase_complete })
    }

    /// Put an assignment's task back in its queue if it is still held by that
    /// same assignment. Returns whether the task was re-queued.
    pub async fn requeue_if_stalled(&self, assignment: Assignment) -> bool {
        let mut state = self.state.lock().await;
        let queue = state.phase_mut(assignment.phase);
        let Some(record) = queue.tasks.get_mut(assignment.id as usize) else {
            return false;
        };

        if record.status != TaskStatus::Assigned || record.token != assignment.token {
            return false;
        }

        record.status = TaskStatus::Pending;
        queue.pending.push_back(assignment.id);
        true
    }

    /// Number of task ids currently waiting to be claimed.
    pub async fn pending_count(&self, phase: TaskPhase) -> usize {
        self.state.lock().await.phase(phase).pending.len()
    }

    /// Number of distinct tasks of `phase` that are done.
    pub async fn success_count(&self, phase: TaskPhase) -> usize {
        self.state.lock().await.phase(phase).succeeded
    }

    pub async fn total(&self, phase: TaskPhase) -> usize {
        self.state.lock().await.phase(phase).tasks.len()
    }

    #[cfg(test)]
    pub async fn status(&self, phase: TaskPhase, id: u32) -> Option<TaskStatus> {
        let state = self.state.lock().await;
        state.phase(phase).tasks.get(id as usize).map(|r| r.status)
    }

    /// Success reports received for a task, duplicates and stale ones included.
    pub async fn reports(&self, phase: TaskPhase, id: u32) -> Option<u32> {
        let state = self.state.lock().await;
        state.phase(phase).tasks.get(id as usize).map(|r| r.reports)
    }
}
