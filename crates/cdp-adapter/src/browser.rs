use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::AdapterError;

/// Snapshot of a DOM element at probe time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementProbe {
    pub text: String,
    pub attributes: BTreeMap<String, String>,
}

impl ElementProbe {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Payload pushed by the page's `Notification` hook.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawNotification {
    pub title: String,
    pub tag: String,
    pub body: String,
}

/// The browser session the kernel drives.
///
/// Probes (`find`, `find_all`, `current_url`, `screenshot`,
/// `pop_notification`) never fail: absence and I/O errors both read as
/// "nothing there". Interactions return [`AdapterError`].
///
/// Scripts passed to [`Browser::execute`] are function bodies: they `return`
/// a value and read their inputs from `arguments[i]`.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), AdapterError>;

    async fn current_url(&self) -> Option<String>;

    async fn find(&self, selector: &str) -> Option<ElementProbe>;

    async fn find_all(&self, selector: &str) -> Vec<ElementProbe>;

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, AdapterError>;

    async fn click(&self, selector: &str) -> Result<(), AdapterError>;

    async fn clear(&self, selector: &str) -> Result<(), AdapterError>;

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), AdapterError>;

    /// Makes the file input interactable and injects `path` into it.
    async fn set_file_input(&self, selector: &str, path: &Path) -> Result<(), AdapterError>;

    async fn screenshot(&self, path: &Path) -> bool;

    /// Pops the oldest queued page notification.
    async fn pop_notification(&self) -> Option<RawNotification>;

    async fn is_alive(&self) -> bool;

    fn is_closed(&self) -> bool;

    async fn close(&self) -> Result<(), AdapterError>;

    async fn has(&self, selector: &str) -> bool {
        self.find(selector).await.is_some()
    }
}
