//! Named DOM predicates and their one-shot state.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_recursion::async_recursion;
use cdp_adapter::Browser;
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::errors::PerceiverError;
use crate::selectors;
use crate::WHATSAPP_URL;

/// Every phase predicate the detector knows about.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Check {
    WhatsappUrl,
    AppReady,
    ConfirmPopup,
    ConfirmPopupOk,
    ConfirmPopupCancel,
    ConfirmPopupButton,
    LoadingScreen,
    LoginScreen,
    QrReady,
    QrRefresh,
    LoggedIn,
    MainScreen,
    ChatScreen,
}

/// The extra condition a check adds on top of its parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    UrlPrefix(&'static str),
    Present(&'static str),
    AnyOf(Vec<Check>),
}

impl Check {
    pub const ALL: [Check; 13] = [
        Check::WhatsappUrl,
        Check::AppReady,
        Check::ConfirmPopup,
        Check::ConfirmPopupOk,
        Check::ConfirmPopupCancel,
        Check::ConfirmPopupButton,
        Check::LoadingScreen,
        Check::LoginScreen,
        Check::QrReady,
        Check::QrRefresh,
        Check::LoggedIn,
        Check::MainScreen,
        Check::ChatScreen,
    ];

    pub fn parent(self) -> Option<Check> {
        match self {
            Check::WhatsappUrl => None,
            Check::AppReady => Some(Check::WhatsappUrl),
            Check::ConfirmPopup | Check::LoadingScreen | Check::LoginScreen | Check::LoggedIn => {
                Some(Check::AppReady)
            }
            Check::ConfirmPopupOk | Check::ConfirmPopupCancel | Check::ConfirmPopupButton => {
                Some(Check::ConfirmPopup)
            }
            Check::QrReady => Some(Check::LoginScreen),
            Check::QrRefresh => Some(Check::QrReady),
            Check::MainScreen | Check::ChatScreen => Some(Check::LoggedIn),
        }
    }

    pub fn condition(self) -> Condition {
        match self {
            Check::WhatsappUrl => Condition::UrlPrefix(WHATSAPP_URL),
            Check::AppReady => Condition::Present(selectors::APP),
            Check::ConfirmPopup => Condition::Present(selectors::CONFIRM_POPUP),
            Check::ConfirmPopupOk => Condition::Present(selectors::CONFIRM_POPUP_OK),
            Check::ConfirmPopupCancel => Condition::Present(selectors::CONFIRM_POPUP_CANCEL),
            Check::ConfirmPopupButton => {
                Condition::AnyOf(vec![Check::ConfirmPopupCancel, Check::ConfirmPopupOk])
            }
            Check::LoadingScreen => Condition::Present(selectors::LOADING_SCREEN),
            Check::LoginScreen => Condition::Present(selectors::LINK_WITH_PHONE),
            Check::QrReady => Condition::Present(selectors::QR_CODE),
            Check::QrRefresh => Condition::Present(selectors::QR_REFRESH),
            Check::LoggedIn => Condition::Present(selectors::MIDDLE_DRAWER),
            Check::MainScreen => Condition::Present(selectors::INTRO_TITLE),
            Check::ChatScreen => Condition::Present(selectors::CONVERSATION_PANEL),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Check::WhatsappUrl => "whatsapp_url",
            Check::AppReady => "whatsapp_ready",
            Check::ConfirmPopup => "confirm_popup",
            Check::ConfirmPopupOk => "confirm_popup_ok",
            Check::ConfirmPopupCancel => "confirm_popup_cancel",
            Check::ConfirmPopupButton => "confirm_popup_button",
            Check::LoadingScreen => "loading_screen",
            Check::LoginScreen => "login_screen",
            Check::QrReady => "qr_ready",
            Check::QrRefresh => "qr_refresh",
            Check::LoggedIn => "logged_in",
            Check::MainScreen => "main_screen",
            Check::ChatScreen => "chat_screen",
        }
    }

    /// Root-first chain ending with `self`.
    pub fn lineage(self) -> Vec<Check> {
        let mut chain = vec![self];
        let mut current = self;
        while let Some(parent) = current.parent() {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// "Seen true once" flags, scoped to one session.
#[derive(Debug, Default)]
pub struct OneShotFlags {
    fired: Mutex<HashSet<Check>>,
}

impl OneShotFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self, check: Check) -> bool {
        self.fired.lock().contains(&check)
    }

    /// Returns `true` only when the flag was not set before.
    pub fn set(&self, check: Check) -> bool {
        self.fired.lock().insert(check)
    }

    pub fn clear(&self, check: Check) {
        self.fired.lock().remove(&check);
    }
}

pub type ErrorSink = Arc<dyn Fn(&PerceiverError) + Send + Sync>;

/// Maps checks to their conditions and evaluates them against a browser.
pub struct CheckRegistry {
    conditions: HashMap<Check, Condition>,
    on_error: Option<ErrorSink>,
}

impl CheckRegistry {
    pub fn empty() -> Self {
        Self {
            conditions: HashMap::new(),
            on_error: None,
        }
    }

    /// Registry with every check bound to its standard condition.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for check in Check::ALL {
            registry.register(check, check.condition());
        }
        registry
    }

    pub fn with_error_sink(mut self, sink: ErrorSink) -> Self {
        self.on_error = Some(sink);
        self
    }

    pub fn register(&mut self, check: Check, condition: Condition) -> Option<Condition> {
        self.conditions.insert(check, condition)
    }

    pub fn unregister(&mut self, check: Check) -> Option<Condition> {
        self.conditions.remove(&check)
    }

    pub fn is_registered(&self, check: Check) -> bool {
        self.conditions.contains_key(&check)
    }

    /// Current value of `check`; with `first_time` it is true at most once
    /// until the flag is cleared. Never fails.
    pub async fn evaluate(
        &self,
        browser: &dyn Browser,
        flags: &OneShotFlags,
        check: Check,
        first_time: bool,
    ) -> bool {
        if first_time && flags.is_set(check) {
            return false;
        }
        let value = self.holds(browser, check).await;
        if first_time && value {
            return flags.set(check);
        }
        value
    }

    #[async_recursion]
    async fn holds(&self, browser: &dyn Browser, check: Check) -> bool {
        let Some(condition) = self.conditions.get(&check) else {
            self.report(PerceiverError::UnregisteredCheck(check));
            return false;
        };
        if let Some(parent) = check.parent() {
            if !self.holds(browser, parent).await {
                return false;
            }
        }
        let value = match condition {
            Condition::UrlPrefix(prefix) => browser
                .current_url()
                .await
                .map(|url| url.starts_with(prefix))
                .unwrap_or(false),
            Condition::Present(selector) => browser.has(selector).await,
            Condition::AnyOf(options) => {
                let mut any = false;
                for option in options {
                    if self.holds(browser, *option).await {
                        any = true;
                        break;
                    }
                }
                any
            }
        };
        debug!(target: "perceiver", check = %check, value, "check evaluated");
        value
    }

    fn report(&self, err: PerceiverError) {
        error!(target: "perceiver", "{err}");
        if let Some(sink) = &self.on_error {
            sink(&err);
        }
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
