//! Error types for the send protocol

use std::time::Duration;

use cdp_adapter::AdapterError;
use thiserror::Error;

/// A bounded wait gave up before its condition held.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("timed out after {timeout:?} waiting for {what}")]
pub struct WaitTimeout {
    pub what: String,
    pub timeout: Duration,
}

/// Failures of a single send, one per protocol step.
///
/// Recorded on the message by the task runner; none of them is retried.
#[derive(Debug, Error, Clone)]
pub enum SendError {
    /// The web client rejected the number, now or on an earlier attempt
    #[error("invalid phone number")]
    InvalidPhoneNumber,

    /// The chat page never reached a stable state after navigation
    #[error("invalid request: {0}")]
    RequestInvalid(WaitTimeout),

    #[error("unable to open chat")]
    UnableToOpenChat,

    #[error("chat input box not found")]
    InputNotFound,

    #[error("clip button not found")]
    ClipButtonNotFound,

    #[error("file selection input not found")]
    FileInputNotFound,

    #[error("file rejected by the page: {path} ({reason})")]
    FileRejected { path: String, reason: String },

    /// No preview appeared after the file was injected
    #[error("file upload failed")]
    FileUploadFailed,

    #[error("send button not found")]
    SendButtonNotFound,

    /// No new outgoing row appeared after clicking send
    #[error("unable to send message")]
    UnableToSendMessage,

    #[error("malformed message id: {0:?}")]
    MalformedMessageId(String),

    #[error("message content does not match: expected {expected:?}, actual {actual:?}")]
    ContentMismatch { expected: String, actual: String },

    #[error("browser error: {0}")]
    Adapter(#[from] AdapterError),
}
