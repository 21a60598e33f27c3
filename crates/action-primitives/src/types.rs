//! Core data types for the send protocol

use std::time::Duration;

use perceiver_structural::LOOP_INTERVAL;
use serde::{Deserialize, Serialize};

use crate::errors::SendError;

/// Bounds and settle delays applied while sending.
///
/// The defaults follow what the web client needs on a regular connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendTimings {
    /// Navigation until "no popup, or a popup with an OK button"
    pub popup_settle: Duration,
    /// Popup until its OK button shows up
    pub popup_ok: Duration,
    /// Navigation until the header shows the target chat
    pub chat_open: Duration,
    /// Header click until the contact-info drawer is open
    pub chat_info: Duration,
    /// File injection until the preview caption appears
    pub upload_preview: Duration,
    /// Send click until a new outgoing row appears
    pub message_id: Duration,
    /// Best-effort wait for the delivered marker
    pub delivery: Duration,
    pub after_typing: Duration,
    pub after_send: Duration,
    /// Pause after acknowledging a popup
    pub settle: Duration,
}

impl Default for SendTimings {
    fn default() -> Self {
        Self {
            popup_settle: Duration::from_secs(30),
            popup_ok: Duration::from_secs(10),
            chat_open: Duration::from_secs(10),
            chat_info: Duration::from_secs(10),
            upload_preview: Duration::from_secs(10),
            message_id: Duration::from_secs(20),
            delivery: Duration::from_secs(30),
            after_typing: Duration::from_millis(100),
            after_send: Duration::from_millis(200),
            settle: LOOP_INTERVAL,
        }
    }
}

/// Identity the web client gives an outgoing row:
/// `<direction>_<jid>_<message id>[_...]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessageId {
    pub from_me: bool,
    pub jid: String,
    pub message_id: String,
    /// Full `data-testid` of the row.
    pub raw: String,
}

impl SentMessageId {
    pub fn parse(raw: &str) -> Result<Self, SendError> {
        let mut parts = raw.split('_');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(direction), Some(jid), Some(message_id))
                if !jid.is_empty() && !message_id.is_empty() =>
            {
                Ok(Self {
                    from_me: direction.ends_with("true"),
                    jid: jid.to_string(),
                    message_id: message_id.to_string(),
                    raw: raw.to_string(),
                })
            }
            _ => Err(SendError::MalformedMessageId(raw.to_string())),
        }
    }
}
