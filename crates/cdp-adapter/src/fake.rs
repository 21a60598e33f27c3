//! Scriptable in-memory [`Browser`] for tests.
//!
//! The fake keeps a selector → elements table instead of a DOM. Selectors are
//! matched verbatim, so tests insert exactly the selectors the code under test
//! asks for. Interactions are recorded and may trigger [`FakeEffect`]s, which
//! is how a test makes "clicking send" produce a new message row.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::browser::{Browser, ElementProbe, RawNotification};
use crate::error::{AdapterError, AdapterErrorKind};

#[derive(Clone, Debug)]
pub enum FakeEffect {
    Insert(String, ElementProbe),
    Remove(String),
    Respond(String, Value),
    SetUrl(String),
}

#[derive(Default)]
struct FakeState {
    url: String,
    alive: bool,
    closed: bool,
    elements: HashMap<String, Vec<ElementProbe>>,
    responses: Vec<(String, Value)>,
    notifications: VecDeque<RawNotification>,
    click_effects: HashMap<String, Vec<FakeEffect>>,
    navigate_effects: Vec<FakeEffect>,
    reject_uploads: bool,
    navigations: Vec<String>,
    clicks: Vec<String>,
    cleared: Vec<String>,
    typed: Vec<(String, String)>,
    uploads: Vec<(String, PathBuf)>,
    scripts: Vec<(String, Vec<Value>)>,
    screenshots: Vec<PathBuf>,
}

impl FakeState {
    fn apply(&mut self, effects: Vec<FakeEffect>) {
        for effect in effects {
            match effect {
                FakeEffect::Insert(selector, probe) => {
                    self.elements.insert(selector, vec![probe]);
                }
                FakeEffect::Remove(selector) => {
                    self.elements.remove(&selector);
                }
                FakeEffect::Respond(needle, value) => self.set_response(needle, value),
                FakeEffect::SetUrl(url) => self.url = url,
            }
        }
    }

    fn set_response(&mut self, needle: String, value: Value) {
        self.responses.retain(|(existing, _)| *existing != needle);
        self.responses.push((needle, value));
    }
}

pub struct FakeBrowser {
    state: Mutex<FakeState>,
}

impl FakeBrowser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                url: "about:blank".to_string(),
                alive: true,
                ..FakeState::default()
            }),
        })
    }

    pub fn set_url(&self, url: impl Into<String>) {
        self.state.lock().url = url.into();
    }

    /// Makes `selector` resolve to exactly one element.
    pub fn insert(&self, selector: impl Into<String>, probe: ElementProbe) {
        self.state.lock().elements.insert(selector.into(), vec![probe]);
    }

    /// Adds one more element under `selector`.
    pub fn push(&self, selector: impl Into<String>, probe: ElementProbe) {
        self.state
            .lock()
            .elements
            .entry(selector.into())
            .or_default()
            .push(probe);
    }

    pub fn remove(&self, selector: &str) {
        self.state.lock().elements.remove(selector);
    }

    /// `execute` returns `value` for any script containing `needle`.
    pub fn respond(&self, needle: impl Into<String>, value: Value) {
        self.state.lock().set_response(needle.into(), value);
    }

    pub fn on_click(&self, selector: impl Into<String>, effects: Vec<FakeEffect>) {
        self.state
            .lock()
            .click_effects
            .entry(selector.into())
            .or_default()
            .extend(effects);
    }

    pub fn on_navigate(&self, effects: Vec<FakeEffect>) {
        self.state.lock().navigate_effects.extend(effects);
    }

    pub fn reject_uploads(&self, reject: bool) {
        self.state.lock().reject_uploads = reject;
    }

    pub fn queue_notification(&self, notification: RawNotification) {
        self.state.lock().notifications.push_back(notification);
    }

    /// Makes liveness probes fail without closing the session.
    pub fn set_alive(&self, alive: bool) {
        self.state.lock().alive = alive;
    }

    /// Simulates the user closing the window.
    pub fn kill(&self) {
        let mut state = self.state.lock();
        state.alive = false;
        state.closed = true;
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().navigations.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().clicks.clone()
    }

    pub fn cleared(&self) -> Vec<String> {
        self.state.lock().cleared.clone()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.state.lock().typed.clone()
    }

    pub fn uploads(&self) -> Vec<(String, PathBuf)> {
        self.state.lock().uploads.clone()
    }

    pub fn scripts(&self) -> Vec<(String, Vec<Value>)> {
        self.state.lock().scripts.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.state.lock().screenshots.clone()
    }

    fn require(&self, selector: &str) -> Result<(), AdapterError> {
        let state = self.state.lock();
        if state.closed {
            return Err(AdapterError::session_closed());
        }
        if !state.elements.contains_key(selector) {
            return Err(AdapterError::target_not_found(selector));
        }
        Ok(())
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn navigate(&self, url: &str) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(AdapterError::session_closed());
        }
        state.navigations.push(url.to_string());
        state.url = url.to_string();
        let effects = std::mem::take(&mut state.navigate_effects);
        state.apply(effects);
        Ok(())
    }

    async fn current_url(&self) -> Option<String> {
        let state = self.state.lock();
        (!state.closed).then(|| state.url.clone())
    }

    async fn find(&self, selector: &str) -> Option<ElementProbe> {
        self.state
            .lock()
            .elements
            .get(selector)
            .and_then(|found| found.first().cloned())
    }

    async fn find_all(&self, selector: &str) -> Vec<ElementProbe> {
        self.state
            .lock()
            .elements
            .get(selector)
            .cloned()
            .unwrap_or_default()
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, AdapterError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(AdapterError::session_closed());
        }
        state.scripts.push((script.to_string(), args));
        Ok(state
            .responses
            .iter()
            .find(|(needle, _)| script.contains(needle.as_str()))
            .map(|(_, value)| value.clone())
            .unwrap_or(Value::Null))
    }

    async fn click(&self, selector: &str) -> Result<(), AdapterError> {
        self.require(selector)?;
        let mut state = self.state.lock();
        state.clicks.push(selector.to_string());
        let effects = state.click_effects.remove(selector).unwrap_or_default();
        state.apply(effects);
        Ok(())
    }

    async fn clear(&self, selector: &str) -> Result<(), AdapterError> {
        self.require(selector)?;
        self.state.lock().cleared.push(selector.to_string());
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), AdapterError> {
        self.require(selector)?;
        self.state
            .lock()
            .typed
            .push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn set_file_input(&self, selector: &str, path: &Path) -> Result<(), AdapterError> {
        self.require(selector)?;
        let mut state = self.state.lock();
        if state.reject_uploads {
            return Err(AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!("file {} rejected", path.display())));
        }
        state.uploads.push((selector.to_string(), path.to_path_buf()));
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> bool {
        if self.state.lock().closed {
            return false;
        }
        if std::fs::write(path, b"").is_err() {
            return false;
        }
        self.state.lock().screenshots.push(path.to_path_buf());
        true
    }

    async fn pop_notification(&self) -> Option<RawNotification> {
        self.state.lock().notifications.pop_front()
    }

    async fn is_alive(&self) -> bool {
        self.state.lock().alive
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    async fn close(&self) -> Result<(), AdapterError> {
        self.kill();
        Ok(())
    }
}
