use std::fmt;

use thiserror::Error;
use uuid::Uuid;

pub mod chat;
pub mod message;

pub use chat::Chat;
pub use message::{Attachment, AttachmentKind, Message, MessageInput, SendRecord};

/// Construction-time validation failures. These are never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid phone number: {0:?}")]
    InvalidPhoneNumber(String),
    #[error("message must have content, file or media")]
    EmptyMessage,
    #[error("message cannot have both file and media")]
    FileAndMedia,
    #[error("message cannot have both content and an attachment")]
    ContentAndAttachment,
    #[error("{kind} does not exist: {path}")]
    MissingFile { kind: AttachmentKind, path: String },
    #[error("unable to resolve path {path}: {reason}")]
    UnresolvablePath { path: String, reason: String },
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalise a phone-like string the way the web client renders it: spaces
/// removed, an optional leading `+` dropped, leading zeros collapsed.
///
/// Returns `None` when anything other than ASCII digits remains.
pub fn normalize_digits(raw: &str) -> Option<String> {
    let compact: String = raw.chars().filter(|c| *c != ' ').collect();
    let digits = compact.strip_prefix('+').unwrap_or(&compact);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let trimmed = digits.trim_start_matches('0');
    Some(if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    })
}

/// Target address of a conversation. Always holds digits only.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        normalize_digits(raw)
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidPhoneNumber(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Handle to a rendered message row, expressed as a selector the browser can
/// resolve again later.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ElementRef(pub String);

impl ElementRef {
    /// Selector addressing the row carrying `data-testid=<testid>`.
    pub fn for_testid(testid: &str) -> Self {
        let escaped = testid.replace('\\', "\\\\").replace('"', "\\\"");
        Self(format!("[data-testid=\"{escaped}\"]"))
    }

    pub fn selector(&self) -> &str {
        &self.0
    }

    /// Selector for a descendant of this element.
    pub fn child(&self, selector: &str) -> String {
        format!("{} {}", self.0, selector)
    }
}

/// Incoming notification surfaced by the page's Notification hook.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notification {
    pub phone_number: String,
    pub body: String,
}

impl Notification {
    /// Build from the raw `tag` (`<phone>@<server>`) and `body` fields.
    pub fn from_raw(tag: &str, body: &str) -> Self {
        let phone_number = tag.split('@').next().unwrap_or_default().to_string();
        Self {
            phone_number,
            body: body.to_string(),
        }
    }
}

/// Delivery state reported by the status marker of a sent message.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeliveryStatus {
    Sending,
    Delivered,
    Read,
}

impl DeliveryStatus {
    pub fn from_testid(testid: &str) -> Option<Self> {
        match testid {
            "msg-time" => Some(Self::Sending),
            "msg-check" => Some(Self::Delivered),
            "msg-dblcheck" => Some(Self::Read),
            _ => None,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered | Self::Read)
    }
}
