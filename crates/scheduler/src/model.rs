use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use whatsweb_core_types::{Chat, Message, TaskId};

use crate::metrics;

#[derive(Clone, Debug)]
pub enum TaskKind {
    SendMessage {
        chat: Arc<Chat>,
        message: Arc<Message>,
    },
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::SendMessage { .. } => "send_message",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TaskState {
    Pending,
    InProgress,
    Done,
    Cancelled,
}

/// One scheduled unit of work.
///
/// Identity and schedule are fixed at construction. The state only moves
/// forward: `Pending -> InProgress -> Done`, or `Pending -> Cancelled`.
#[derive(Debug)]
pub struct Task {
    id: TaskId,
    kind: TaskKind,
    priority: i32,
    not_before: DateTime<Utc>,
    state: Mutex<TaskState>,
}

impl Task {
    pub fn new(kind: TaskKind, priority: i32, not_before: DateTime<Utc>) -> Self {
        Self {
            id: TaskId::new(),
            kind,
            priority,
            not_before,
            state: Mutex::new(TaskState::Pending),
        }
    }

    /// Send task due immediately at default priority.
    pub fn send_message(chat: Arc<Chat>, message: Arc<Message>) -> Self {
        Self::new(TaskKind::SendMessage { chat, message }, 0, Utc::now())
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn state(&self) -> TaskState {
        *self.state.lock()
    }

    pub fn message(&self) -> Option<&Arc<Message>> {
        match &self.kind {
            TaskKind::SendMessage { message, .. } => Some(message),
        }
    }

    pub fn chat(&self) -> Option<&Arc<Chat>> {
        match &self.kind {
            TaskKind::SendMessage { chat, .. } => Some(chat),
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now
    }

    pub fn is_in_progress(&self) -> bool {
        self.state() == TaskState::InProgress
    }

    /// Finished one way or another; the queue may drop it.
    pub fn is_done(&self) -> bool {
        matches!(self.state(), TaskState::Done | TaskState::Cancelled)
    }

    /// Claims the task for execution. Only the first caller wins.
    pub fn try_start(&self) -> bool {
        let mut state = self.state.lock();
        if *state != TaskState::Pending {
            return false;
        }
        *state = TaskState::InProgress;
        metrics::record_started();
        true
    }

    /// Marks a running task done. Returns `false` if it was not running.
    pub fn finish(&self) -> bool {
        let mut state = self.state.lock();
        if *state != TaskState::InProgress {
            return false;
        }
        *state = TaskState::Done;
        let failed = self.message().is_some_and(|m| m.error().is_some());
        metrics::record_finished(failed);
        true
    }

    pub(crate) fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        if *state != TaskState::Pending {
            return false;
        }
        *state = TaskState::Cancelled;
        metrics::record_cancelled();
        true
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Task({})({})({})",
            self.kind.name(),
            self.priority,
            self.not_before.format("%Y-%m-%d %H:%M:%S")
        )?;
        if let TaskKind::SendMessage { chat, message } = &self.kind {
            write!(f, "({chat})({message})")?;
        }
        Ok(())
    }
}
