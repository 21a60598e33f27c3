use thiserror::Error;
use whatsweb_core_types::TaskId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("task {0} not found")]
    NotFound(TaskId),
    #[error("task {0} already started")]
    AlreadyStarted(TaskId),
}
