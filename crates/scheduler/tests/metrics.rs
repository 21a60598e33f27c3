//! Counters are process-wide, so this binary holds a single test.

use std::sync::Arc;

use chrono::Utc;
use whatsweb_core_types::{Chat, Message};
use whatsweb_scheduler::{metrics, SchedulerMetricsSnapshot, Task, TaskKind, TaskQueue};

fn send(text: &str) -> Arc<Task> {
    let kind = TaskKind::SendMessage {
        chat: Arc::new(Chat::parse("905551112233").unwrap()),
        message: Arc::new(Message::text(text).unwrap()),
    };
    Arc::new(Task::new(kind, 0, Utc::now()))
}

#[test]
fn lifecycle_is_counted() {
    let queue = TaskQueue::new();
    let ok = send("ok");
    let failing = send("fails");
    let dropped = send("dropped");
    for task in [&ok, &failing, &dropped] {
        queue.add(Arc::clone(task));
    }

    queue.cancel(dropped.id()).unwrap();
    assert!(ok.try_start());
    assert!(ok.finish());
    assert!(failing.try_start());
    failing.message().unwrap().record_error("send button not found");
    assert!(failing.finish());
    // Neither a second start nor a second finish counts.
    assert!(!ok.try_start());
    assert!(!ok.finish());

    assert_eq!(
        metrics::snapshot(),
        SchedulerMetricsSnapshot {
            enqueued: 3,
            started: 2,
            completed: 2,
            failed: 1,
            cancelled: 1,
        }
    );
}
