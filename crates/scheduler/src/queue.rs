use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;
use whatsweb_core_types::TaskId;

use crate::error::SchedulerError;
use crate::metrics;
use crate::model::Task;

#[derive(Default)]
struct QueueState {
    tasks: Vec<Arc<Task>>,
    current: Option<Arc<Task>>,
}

/// Pending tasks plus the one currently handed out.
///
/// At most one task is in flight: [`TaskQueue::next_due`] keeps returning the
/// same task until it is done.
#[derive(Default)]
pub struct TaskQueue {
    inner: Mutex<QueueState>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, task: Arc<Task>) {
        debug!(target: "scheduler", task = %task.id(), "task enqueued");
        metrics::record_enqueued();
        self.inner.lock().tasks.push(task);
    }

    pub fn next_due(&self) -> Option<Arc<Task>> {
        self.next_due_at(Utc::now())
    }

    /// Returns the in-flight task if it is not done. Otherwise drops it and
    /// picks the highest priority task whose time has come; ties go to the
    /// earliest `not_before`, then to insertion order.
    pub fn next_due_at(&self, now: DateTime<Utc>) -> Option<Arc<Task>> {
        let mut state = self.inner.lock();

        if let Some(current) = state.current.take() {
            if !current.is_done() {
                state.current = Some(Arc::clone(&current));
                return Some(current);
            }
            state.tasks.retain(|task| !Arc::ptr_eq(task, &current));
        }

        let mut best: Option<&Arc<Task>> = None;
        for task in state.tasks.iter().filter(|t| t.is_due(now) && !t.is_done()) {
            best = match best {
                Some(chosen)
                    if (chosen.priority(), std::cmp::Reverse(chosen.not_before()))
                        >= (task.priority(), std::cmp::Reverse(task.not_before())) =>
                {
                    Some(chosen)
                }
                _ => Some(task),
            };
        }
        let next = best.cloned();
        state.current = next.clone();
        next
    }

    /// Removes a task that has not started yet.
    pub fn cancel(&self, id: &TaskId) -> Result<Arc<Task>, SchedulerError> {
        let mut state = self.inner.lock();
        let index = state
            .tasks
            .iter()
            .position(|task| task.id() == id)
            .ok_or_else(|| SchedulerError::NotFound(id.clone()))?;
        if !state.tasks[index].cancel() {
            return Err(SchedulerError::AlreadyStarted(id.clone()));
        }
        let task = state.tasks.remove(index);
        if state
            .current
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &task))
        {
            state.current = None;
        }
        Ok(task)
    }

    pub fn current(&self) -> Option<Arc<Task>> {
        self.inner.lock().current.clone()
    }

    /// Tasks not yet finished, in insertion order.
    pub fn pending(&self) -> Vec<Arc<Task>> {
        self.inner
            .lock()
            .tasks
            .iter()
            .filter(|task| !task.is_done())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
