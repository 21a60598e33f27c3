//! Error handling module
//!
//! Library-level failures of the client. The binary wraps these in `anyhow`.

use cdp_adapter::AdapterError;
use thiserror::Error;
use whatsweb_core_types::ValidationError;
use whatsweb_scheduler::SchedulerError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("browser error: {0}")]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("client already started")]
    AlreadyStarted,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
