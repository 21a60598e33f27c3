//! whatsweb library
//!
//! Drives WhatsApp Web in a browser: a poll loop infers the page phase,
//! emits lifecycle events and hands due send tasks to the send protocol one
//! at a time.

pub mod client;
pub mod config;
pub mod errors;
pub mod events;
mod poll;
pub mod qr;
pub mod report;

pub use client::{Client, ScheduleOptions};
pub use config::ClientConfig;
pub use errors::{ClientError, ClientResult};
pub use events::ClientEvent;

pub use whatsweb_core_types::{Chat, Message, MessageInput, Notification, SendRecord};
pub use whatsweb_scheduler::{SchedulerMetricsSnapshot, Task, TaskState};
