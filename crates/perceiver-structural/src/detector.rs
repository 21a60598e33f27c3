use std::sync::Arc;
use std::time::Duration;

use cdp_adapter::Browser;
use serde_json::{json, Value};
use tracing::{debug, info};
use whatsweb_core_types::{normalize_digits, DeliveryStatus, ElementRef};

use crate::checks::{Check, CheckRegistry, OneShotFlags};
use crate::selectors;
use crate::LOOP_INTERVAL;

/// Layered view of the web client's current phase.
///
/// All queries are probes: a missing element or a failed script reads as
/// "false" / "nothing", so the detector can be polled against a half-loaded
/// page forever.
pub struct PhaseDetector {
    browser: Arc<dyn Browser>,
    registry: CheckRegistry,
    flags: OneShotFlags,
    settle: Duration,
}

impl PhaseDetector {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self::with_registry(browser, CheckRegistry::standard())
    }

    pub fn with_registry(browser: Arc<dyn Browser>, registry: CheckRegistry) -> Self {
        Self {
            browser,
            registry,
            flags: OneShotFlags::new(),
            settle: LOOP_INTERVAL,
        }
    }

    /// Pause after clicks that re-render part of the page.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn browser(&self) -> &Arc<dyn Browser> {
        &self.browser
    }

    pub fn flags(&self) -> &OneShotFlags {
        &self.flags
    }

    pub async fn is(&self, check: Check) -> bool {
        self.registry
            .evaluate(self.browser.as_ref(), &self.flags, check, false)
            .await
    }

    pub async fn first_time(&self, check: Check) -> bool {
        self.registry
            .evaluate(self.browser.as_ref(), &self.flags, check, true)
            .await
    }

    pub fn clear(&self, check: Check) {
        self.flags.clear(check);
    }

    /// No popup, or a popup that can be acknowledged.
    pub async fn popup_settled(&self) -> bool {
        self.is(Check::ConfirmPopupOk).await || !self.is(Check::ConfirmPopup).await
    }

    pub async fn confirm_popup_content(&self) -> String {
        if !self.is(Check::ConfirmPopup).await {
            return String::new();
        }
        self.text_of(selectors::CONFIRM_POPUP_CONTENTS).await.unwrap_or_default()
    }

    /// Loading progress in `0..=100`.
    pub async fn loading_percent(&self) -> f64 {
        if !self.is(Check::LoadingScreen).await {
            return 0.0;
        }
        let Some(progress) = self.browser.find(selectors::LOADING_PROGRESS).await else {
            return 0.0;
        };
        let parse = |name: &str| progress.attribute(name).and_then(|v| v.trim().parse::<f64>().ok());
        match (parse("value"), parse("max")) {
            (Some(value), Some(max)) if max > 0.0 => (value / max * 100.0).clamp(0.0, 100.0),
            _ => 0.0,
        }
    }

    /// QR reference string; refreshes a stale code before reading it.
    pub async fn qr_payload(&self) -> Option<String> {
        if !self.is(Check::QrReady).await {
            return None;
        }
        if self.is(Check::QrRefresh).await {
            self.refresh_qr().await;
        }
        let code = self.browser.find(selectors::QR_CODE).await?;
        code.attribute("data-ref").map(str::to_string)
    }

    /// Clicks the refresh control of an expired QR code. Re-arms the QR
    /// one-shot flags so the fresh code is reported again.
    pub async fn refresh_qr(&self) -> bool {
        if !self.is(Check::QrRefresh).await {
            return false;
        }
        info!(target: "perceiver", "refreshing QR code");
        if let Err(err) = self.browser.click(selectors::QR_REFRESH).await {
            debug!(target: "perceiver", "qr refresh click failed: {err}");
            return false;
        }
        tokio::time::sleep(self.settle).await;
        self.flags.clear(Check::QrRefresh);
        self.flags.clear(Check::QrReady);
        true
    }

    pub async fn chat_title(&self) -> String {
        self.text_of(selectors::CHAT_TITLE).await.unwrap_or_default()
    }

    /// The contact-info drawer is open and belongs to the current chat.
    pub async fn is_chat_info_open(&self) -> bool {
        if !self.is(Check::ChatScreen).await || !self.browser.has(selectors::CHAT_INFO_DRAWER).await
        {
            return false;
        }
        match self.chat_info_title().await {
            Some(title) => title == self.chat_title().await,
            None => false,
        }
    }

    pub async fn chat_info_title(&self) -> Option<String> {
        self.text_of(selectors::CHAT_INFO_TITLE).await
    }

    pub async fn chat_info_subtitle(&self) -> Option<String> {
        self.text_of(selectors::CHAT_INFO_SUBTITLE).await
    }

    /// The header title shows `digits` directly.
    pub async fn chat_title_matches(&self, digits: &str) -> bool {
        comparable(&self.chat_title().await) == digits
    }

    /// Rewrites the header title so later checks match without the drawer.
    pub async fn pin_chat_title(&self, digits: &str) -> bool {
        matches!(
            self.browser
                .execute(
                    selectors::SET_CHAT_TITLE,
                    vec![json!(selectors::CHAT_TITLE), json!(digits)],
                )
                .await,
            Ok(Value::Bool(true))
        )
    }

    /// `data-testid` of the newest outgoing message row.
    pub async fn last_sent_message_id(&self) -> Option<String> {
        match self
            .browser
            .execute(selectors::LAST_SENT_MESSAGE_ID, Vec::new())
            .await
        {
            Ok(Value::String(id)) if !id.is_empty() => Some(id),
            Ok(_) => None,
            Err(err) => {
                debug!(target: "perceiver", "last sent message probe failed: {err}");
                None
            }
        }
    }

    pub async fn message_text(&self, element: &ElementRef) -> Option<String> {
        self.text_of(&element.child(selectors::MESSAGE_CONTENT)).await
    }

    pub async fn message_status(&self, element: &ElementRef) -> Option<DeliveryStatus> {
        let marker = self
            .browser
            .find(&element.child(selectors::MESSAGE_STATUS))
            .await?;
        marker.attribute("data-testid").and_then(DeliveryStatus::from_testid)
    }

    async fn text_of(&self, selector: &str) -> Option<String> {
        self.browser.find(selector).await.map(|probe| probe.text)
    }
}

/// Digits-only form of a title when it is a phone number, the raw title
/// otherwise.
pub fn comparable(title: &str) -> String {
    normalize_digits(title).unwrap_or_else(|| title.to_string())
}
