//! gRPC stubs generated from `protos/coordinator.proto`.

pub mod coordinator {
    tonic::include_proto!("coordinator");
}

pub use coordinator::coordinator_client::CoordinatorClient;
pub use coordinator::coordinator_server::{Coordinator, CoordinatorServer};
pub use coordinator::{
    GetTaskRequest, GetTaskResponse, ReplyCode, ReportTaskSuccessRequest,
    ReportTaskSuccessResponse, TaskPhase,
};

impl TaskPhase {
    /// Lower-case name used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            TaskPhase::Map => "map",
            TaskPhase::Reduce => "reduce",
        }
    }
}

impl GetTaskResponse {
    /// Reply telling the worker to back off and ask again.
    pub fn wait() -> Self {
        Self {
            code: ReplyCode::Wait as i32,
            ..Default::default()
        }
    }

    /// Reply telling the worker the job is finished.
    pub fn done() -> Self {
        Self {
            code: ReplyCode::Done as i32,
            ..Default::default()
        }
    }
}
