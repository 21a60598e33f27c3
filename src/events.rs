//! Lifecycle events published on the client's bus

use std::fmt;
use std::sync::Arc;

use whatsweb_core_types::Notification;
use whatsweb_scheduler::Task;

#[derive(Clone, Debug)]
pub enum ClientEvent {
    BrowserCreated,
    Started,
    /// One poll tick began.
    Updated,
    Stopped,
    Error(String),
    /// QR reference to scan with the phone.
    QrCode(String),
    LoginRequired,
    LoggedIn,
    /// The login screen came back after a logged-in session.
    LoggedOut,
    TaskStarted(Arc<Task>),
    TaskCompleted(Arc<Task>),
    Notification(Notification),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::BrowserCreated => "browser_created",
            ClientEvent::Started => "start",
            ClientEvent::Updated => "update",
            ClientEvent::Stopped => "stop",
            ClientEvent::Error(_) => "error",
            ClientEvent::QrCode(_) => "qr_code",
            ClientEvent::LoginRequired => "login_required",
            ClientEvent::LoggedIn => "logged_in",
            ClientEvent::LoggedOut => "logged_out",
            ClientEvent::TaskStarted(_) => "task_started",
            ClientEvent::TaskCompleted(_) => "task_completed",
            ClientEvent::Notification(_) => "notification",
        }
    }
}

impl fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientEvent::Error(message) => write!(f, "error: {message}"),
            ClientEvent::TaskStarted(task) | ClientEvent::TaskCompleted(task) => {
                write!(f, "{}: {task}", self.name())
            }
            ClientEvent::Notification(n) => {
                write!(f, "notification from {}: {}", n.phone_number, n.body)
            }
            other => f.write_str(other.name()),
        }
    }
}
