use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::browser::{Browser, ElementProbe, RawNotification};
use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};

/// Installed on every new document: queues page notifications on
/// `window.notifications` instead of showing them.
pub const NOTIFICATION_HOOK: &str = r#"
window.notifications = [];
window.Notification = class Notify extends window.Notification {
    constructor(...args) {
        const title = args[0];
        const options = { title, ...args[1] };
        window.notifications.push(options);
    }
};
"#;

const PROBE_ONE: &str = r#"
const el = document.querySelector(arguments[0]);
if (!el) return null;
return {
    text: el.innerText ?? el.textContent ?? "",
    attributes: Object.fromEntries(Array.from(el.attributes).map(a => [a.name, a.value])),
};
"#;

const PROBE_ALL: &str = r#"
return Array.from(document.querySelectorAll(arguments[0])).map(el => ({
    text: el.innerText ?? el.textContent ?? "",
    attributes: Object.fromEntries(Array.from(el.attributes).map(a => [a.name, a.value])),
}));
"#;

const CLEAR_INPUT: &str = r#"
const el = document.querySelector(arguments[0]);
if (!el) return false;
el.focus();
if (el.isContentEditable || el.closest('[contenteditable=true]')) {
    document.execCommand('selectAll', false, null);
    document.execCommand('delete', false, null);
} else if ('value' in el) {
    el.value = '';
} else {
    el.textContent = '';
}
return true;
"#;

const REVEAL_INPUT: &str = r#"
const el = document.querySelector(arguments[0]);
if (!el) return false;
el.style.display = 'block';
return true;
"#;

const POP_NOTIFICATION: &str = "return window.notifications?.shift() ?? null;";

const LIVENESS_TIMEOUT: Duration = Duration::from_secs(5);

/// Chromium session driven over CDP through chromiumoxide. Owns a single tab.
pub struct ChromiumBrowser {
    browser: Mutex<CdpBrowser>,
    page: Page,
    closed: Arc<AtomicBool>,
}

impl ChromiumBrowser {
    pub async fn launch(cfg: &CdpConfig) -> Result<Self, AdapterError> {
        let config = Self::browser_config(cfg)?;
        let (browser, mut handler) = CdpBrowser::launch(config).await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::Launch)
                .with_hint(format!("failed to launch chromium: {err}"))
                .with_data(json!({
                    "executable": cfg.executable,
                    "hint": "Set WHATSWEB_CHROME to the full path of chrome/chromium."
                }))
        })?;

        let closed = Arc::new(AtomicBool::new(false));
        let handler_closed = Arc::clone(&closed);
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(target: "cdp-adapter", "handler event error: {err}");
                }
            }
            handler_closed.store(true, Ordering::Release);
            info!(target: "cdp-adapter", "browser handler finished");
        });

        let page = browser.new_page("about:blank").await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!("failed to open tab: {err}"))
        })?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(NOTIFICATION_HOOK))
            .await
            .map_err(|err| {
                AdapterError::new(AdapterErrorKind::CdpIo)
                    .with_hint(format!("failed to install notification hook: {err}"))
            })?;

        info!(target: "cdp-adapter", headless = cfg.headless, "chromium launched");
        Ok(Self {
            browser: Mutex::new(browser),
            page,
            closed,
        })
    }

    fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
        if !cfg.executable.as_os_str().is_empty() && !cfg.executable.exists() {
            return Err(AdapterError::new(AdapterErrorKind::Launch).with_hint(format!(
                "chrome executable not found at {}",
                cfg.executable.display()
            )));
        }

        let profile_dir = if cfg.user_data_dir.is_absolute() {
            cfg.user_data_dir.clone()
        } else {
            std::env::current_dir()
                .map_err(|err| {
                    AdapterError::new(AdapterErrorKind::Internal)
                        .with_hint(format!("failed to resolve cwd for user-data-dir: {err}"))
                })?
                .join(&cfg.user_data_dir)
        };
        std::fs::create_dir_all(&profile_dir).map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("failed to ensure user-data-dir: {err}"))
        })?;

        let (width, height) = cfg.window_size();
        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile_dir)
            .window_size(width, height)
            .request_timeout(Duration::from_millis(cfg.request_timeout_ms))
            .launch_timeout(Duration::from_millis(cfg.launch_timeout_ms))
            .arg("--disable-popup-blocking")
            .arg("--disable-infobars")
            .arg("--disable-extensions")
            .arg("--enable-features=WebNotifications");

        if !cfg.headless {
            builder = builder.with_head();
        }
        if cfg.no_sandbox {
            builder = builder.no_sandbox();
        }
        if !cfg.executable.as_os_str().is_empty() {
            builder = builder.chrome_executable(&cfg.executable);
        }

        builder.build().map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("browser config error: {err}"))
        })
    }

    fn ensure_open(&self) -> Result<(), AdapterError> {
        if self.is_closed() {
            return Err(AdapterError::session_closed());
        }
        Ok(())
    }

    fn wrap(script: &str, args: &[Value]) -> String {
        let args = Value::Array(args.to_vec());
        format!("(function() {{ {script} }}).apply(null, {args})")
    }

    async fn probe<T: serde::de::DeserializeOwned + Default>(&self, script: &str, selector: &str) -> T {
        match self.execute(script, vec![json!(selector)]).await {
            Ok(value) => serde_json::from_value(value).unwrap_or_default(),
            Err(err) => {
                debug!(target: "cdp-adapter", selector, "probe failed: {err}");
                T::default()
            }
        }
    }
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn navigate(&self, url: &str) -> Result<(), AdapterError> {
        self.ensure_open()?;
        self.page.goto(url).await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::Navigation)
                .with_hint(format!("{url}: {err}"))
        })?;
        Ok(())
    }

    async fn current_url(&self) -> Option<String> {
        if self.is_closed() {
            return None;
        }
        self.page.url().await.ok().flatten()
    }

    async fn find(&self, selector: &str) -> Option<ElementProbe> {
        self.probe::<Option<ElementProbe>>(PROBE_ONE, selector).await
    }

    async fn find_all(&self, selector: &str) -> Vec<ElementProbe> {
        self.probe::<Vec<ElementProbe>>(PROBE_ALL, selector).await
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, AdapterError> {
        self.ensure_open()?;
        let result = self
            .page
            .evaluate(Self::wrap(script, &args))
            .await
            .map_err(|err| {
                AdapterError::new(AdapterErrorKind::Script).with_hint(err.to_string())
            })?;
        // `undefined` has no JSON form.
        Ok(result.into_value::<Value>().unwrap_or(Value::Null))
    }

    async fn click(&self, selector: &str) -> Result<(), AdapterError> {
        self.ensure_open()?;
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| AdapterError::target_not_found(selector))?;
        element.click().await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::CdpIo).with_hint(format!("click {selector}: {err}"))
        })?;
        Ok(())
    }

    async fn clear(&self, selector: &str) -> Result<(), AdapterError> {
        match self.execute(CLEAR_INPUT, vec![json!(selector)]).await? {
            Value::Bool(true) => Ok(()),
            _ => Err(AdapterError::target_not_found(selector)),
        }
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), AdapterError> {
        self.ensure_open()?;
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| AdapterError::target_not_found(selector))?;
        element
            .click()
            .await
            .map_err(|err| {
                AdapterError::new(AdapterErrorKind::CdpIo).with_hint(format!("focus {selector}: {err}"))
            })?
            .type_str(text)
            .await
            .map_err(|err| {
                AdapterError::new(AdapterErrorKind::CdpIo).with_hint(format!("type into {selector}: {err}"))
            })?;
        Ok(())
    }

    async fn set_file_input(&self, selector: &str, path: &Path) -> Result<(), AdapterError> {
        if self.execute(REVEAL_INPUT, vec![json!(selector)]).await? != Value::Bool(true) {
            return Err(AdapterError::target_not_found(selector));
        }
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| AdapterError::target_not_found(selector))?;
        let mut params = SetFileInputFilesParams::new(vec![path.display().to_string()]);
        params.backend_node_id = Some(element.backend_node_id);
        self.page.execute(params).await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!("file {} rejected: {err}", path.display()))
        })?;
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> bool {
        if self.is_closed() {
            return false;
        }
        match self
            .page
            .save_screenshot(ScreenshotParams::builder().build(), path)
            .await
        {
            Ok(_) => true,
            Err(err) => {
                warn!(target: "cdp-adapter", path = %path.display(), "screenshot failed: {err}");
                false
            }
        }
    }

    async fn pop_notification(&self) -> Option<RawNotification> {
        let value = self.execute(POP_NOTIFICATION, Vec::new()).await.ok()?;
        if value.is_null() {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    async fn is_alive(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        // Browser-level call: page contexts come and go during navigation.
        let browser = self.browser.lock().await;
        matches!(
            tokio::time::timeout(LIVENESS_TIMEOUT, browser.version()).await,
            Ok(Ok(_))
        )
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) -> Result<(), AdapterError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut browser = self.browser.lock().await;
        browser.close().await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::CdpIo).with_hint(format!("close failed: {err}"))
        })?;
        if let Err(err) = browser.wait().await {
            debug!(target: "cdp-adapter", "browser wait after close: {err}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_are_wrapped_as_functions() {
        let wrapped = ChromiumBrowser::wrap("return arguments[0] + 1;", &[json!(41)]);
        assert_eq!(wrapped, "(function() { return arguments[0] + 1; }).apply(null, [41])");
    }

    #[test]
    fn missing_executable_is_reported_before_launch() {
        let cfg = CdpConfig {
            executable: "/nonexistent/chrome".into(),
            ..CdpConfig::default()
        };
        let err = ChromiumBrowser::browser_config(&cfg).unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::Launch);
    }
}
