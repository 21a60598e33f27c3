//! Outgoing message payload and the record filled in once it has been sent.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::{ElementRef, ValidationError};

const DIRECTIONAL_MARKS: [char; 3] = ['\u{202a}', '\u{202b}', '\u{202c}'];

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttachmentKind {
    /// Sent through the document picker.
    Document,
    /// Sent through the photo/video picker.
    Media,
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentKind::Document => f.write_str("file"),
            AttachmentKind::Media => f.write_str("media"),
        }
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    /// Absolute path of an existing file.
    pub path: PathBuf,
}

/// Raw caller input. Validated by [`Message::new`].
#[derive(Clone, Debug, Default)]
pub struct MessageInput {
    pub content: Option<String>,
    pub file: Option<String>,
    pub media: Option<String>,
    pub nonce: Option<String>,
}

/// Fields populated after a send attempt.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SendRecord {
    pub id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub element: Option<ElementRef>,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct Message {
    content: Option<String>,
    attachment: Option<Attachment>,
    nonce: String,
    record: Mutex<SendRecord>,
}

impl Message {
    pub fn new(input: MessageInput) -> Result<Self, ValidationError> {
        let content = non_blank(input.content);
        let file = non_blank(input.file);
        let media = non_blank(input.media);

        if content.is_none() && file.is_none() && media.is_none() {
            return Err(ValidationError::EmptyMessage);
        }
        if file.is_some() && media.is_some() {
            return Err(ValidationError::FileAndMedia);
        }
        if content.is_some() && (file.is_some() || media.is_some()) {
            return Err(ValidationError::ContentAndAttachment);
        }

        let attachment = match (file, media) {
            (Some(raw), None) => Some(resolve_attachment(AttachmentKind::Document, &raw)?),
            (None, Some(raw)) => Some(resolve_attachment(AttachmentKind::Media, &raw)?),
            _ => None,
        };

        Ok(Self {
            content,
            attachment,
            nonce: input.nonce.unwrap_or_else(default_nonce),
            record: Mutex::new(SendRecord::default()),
        })
    }

    /// Text-only convenience constructor.
    pub fn text(content: impl Into<String>) -> Result<Self, ValidationError> {
        Self::new(MessageInput {
            content: Some(content.into()),
            ..MessageInput::default()
        })
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn record(&self) -> SendRecord {
        self.record.lock().clone()
    }

    pub fn id(&self) -> Option<String> {
        self.record.lock().id.clone()
    }

    pub fn element(&self) -> Option<ElementRef> {
        self.record.lock().element.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.record.lock().error.clone()
    }

    pub fn is_sent(&self) -> bool {
        self.record.lock().element.is_some()
    }

    /// Binds the identity the web client assigned to this message.
    pub fn bind_sent(&self, id: impl Into<String>, sent_at: DateTime<Utc>, element: ElementRef) {
        let mut record = self.record.lock();
        record.id = Some(id.into());
        record.sent_at = Some(sent_at);
        record.element = Some(element);
    }

    pub fn record_error(&self, error: impl fmt::Display) {
        self.record.lock().error = Some(error.to_string());
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.record.lock();
        let mut parts = Vec::new();
        if let Some(id) = &record.id {
            parts.push(format!("id={id}"));
        }
        if let Some(content) = &self.content {
            parts.push(format!("content={content}"));
        }
        if let Some(attachment) = &self.attachment {
            parts.push(format!("{}={}", attachment.kind, attachment.path.display()));
        }
        if let Some(sent_at) = &record.sent_at {
            parts.push(format!("time={}", sent_at.format("%d/%m/%Y %H:%M:%S")));
        }
        parts.push(format!("nonce={}", self.nonce));
        if let Some(error) = &record.error {
            parts.push(format!("error={error}"));
        }
        write!(f, "Message({})", parts.join(", "))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn default_nonce() -> String {
    let now = Utc::now();
    format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros())
}

fn resolve_attachment(kind: AttachmentKind, raw: &str) -> Result<Attachment, ValidationError> {
    let cleaned: String = raw.chars().filter(|c| !DIRECTIONAL_MARKS.contains(c)).collect();
    let cleaned = cleaned.trim();
    let path = Path::new(cleaned);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|err| ValidationError::UnresolvablePath {
                path: cleaned.to_string(),
                reason: err.to_string(),
            })?
            .join(path)
    };
    if !absolute.is_file() {
        return Err(ValidationError::MissingFile {
            kind,
            path: absolute.display().to_string(),
        });
    }
    Ok(Attachment {
        kind,
        path: absolute,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "payload").unwrap();
        file
    }

    #[test]
    fn whitespace_content_is_treated_as_absent() {
        let err = Message::new(MessageInput {
            content: Some("   ".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err, ValidationError::EmptyMessage);

        let file = temp_file();
        let message = Message::new(MessageInput {
            content: Some(" ".into()),
            file: Some(file.path().display().to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(message.content(), None);
    }

    #[test]
    fn payload_kinds_are_exclusive() {
        let file = temp_file();
        let err = Message::new(MessageInput {
            content: Some("caption".into()),
            file: Some(file.path().display().to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err, ValidationError::ContentAndAttachment);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(
            Message::new(MessageInput::default()).unwrap_err(),
            ValidationError::EmptyMessage
        );
    }

    #[test]
    fn file_and_media_are_exclusive() {
        let file = temp_file();
        let path = file.path().display().to_string();
        let err = Message::new(MessageInput {
            file: Some(path.clone()),
            media: Some(path),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err, ValidationError::FileAndMedia);
    }

    #[test]
    fn attachment_path_is_cleaned_and_checked() {
        let file = temp_file();
        let raw = format!("\u{202a} {} \u{202c}", file.path().display());
        let message = Message::new(MessageInput {
            media: Some(raw),
            ..Default::default()
        })
        .unwrap();
        let attachment = message.attachment().unwrap();
        assert_eq!(attachment.kind, AttachmentKind::Media);
        assert_eq!(attachment.path, file.path());
        assert!(attachment.path.is_absolute());
    }

    #[test]
    fn missing_file_fails_construction() {
        let err = Message::new(MessageInput {
            file: Some("/definitely/not/here.pdf".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingFile {
                kind: AttachmentKind::Document,
                ..
            }
        ));
    }

    #[test]
    fn nonce_defaults_to_timestamp() {
        let message = Message::text("hi").unwrap();
        let (secs, micros) = message.nonce().split_once('.').unwrap();
        assert!(secs.parse::<i64>().unwrap() > 0);
        assert_eq!(micros.len(), 6);

        let tagged = Message::new(MessageInput {
            content: Some("hi".into()),
            nonce: Some("order-42".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(tagged.nonce(), "order-42");
    }

    #[test]
    fn send_record_transitions() {
        let message = Message::text("hello").unwrap();
        assert!(!message.is_sent());
        message.bind_sent("ABC", Utc::now(), ElementRef::for_testid("conv-msg-true_1@c.us_ABC"));
        assert!(message.is_sent());
        assert_eq!(message.id().as_deref(), Some("ABC"));
        message.record_error("boom");
        assert_eq!(message.error().as_deref(), Some("boom"));
        assert!(message.to_string().contains("error=boom"));
    }
}
