//! CSS selectors for the web client's DOM.
//!
//! These track one revision of the client markup; when it changes, this is
//! the only table that should need updating.

pub const APP: &str = "div#app";

pub const CONFIRM_POPUP: &str = concat!("div#app", " [data-testid=confirm-popup][role=dialog] div");
pub const CONFIRM_POPUP_CONTENTS: &str = concat!(
    "div#app [data-testid=confirm-popup][role=dialog] div",
    " [data-testid=popup-contents]"
);
pub const CONFIRM_POPUP_OK: &str = concat!(
    "div#app [data-testid=confirm-popup][role=dialog] div",
    " [data-testid=popup-controls-ok]"
);
pub const CONFIRM_POPUP_CANCEL: &str = concat!(
    "div#app [data-testid=confirm-popup][role=dialog] div",
    " [data-testid=popup-controls-cancel]"
);

pub const LOADING_SCREEN: &str = concat!("div#app", " div[data-testid=wa-web-loading-screen]");
pub const LOADING_PROGRESS: &str =
    concat!("div#app div[data-testid=wa-web-loading-screen]", " progress");

pub const LANDING_WINDOW: &str = concat!("div#app", " div.landing-window");
pub const LINK_WITH_PHONE: &str = concat!(
    "div#app div.landing-window",
    " [data-testid=link-device-qrcode-alt-linking-hint]"
);
pub const QR_CODE: &str = concat!("div#app div.landing-window", " [data-testid=qrcode]");
pub const QR_REFRESH: &str = concat!(
    "div#app div.landing-window [data-testid=qrcode]",
    " [data-testid=refresh-large]"
);

pub const MIDDLE_DRAWER: &str = concat!("div#app", " [data-testid=drawer-middle]");
pub const RIGHT_DRAWER: &str = concat!("div#app", " [data-testid=drawer-right]");
pub const CHAT_INFO_DRAWER: &str =
    concat!("div#app [data-testid=drawer-right]", " [data-testid=chat-info-drawer]");

pub const INTRO_TITLE: &str = concat!("div#app", " [data-testid=intro-title]");
pub const CONVERSATION_PANEL: &str = concat!("div#app", " [data-testid=conversation-panel-wrapper]");

pub const CHAT_INPUT: &str = concat!(
    "div#app [data-testid=conversation-panel-wrapper]",
    " div[data-testid=conversation-compose-box-input] p"
);
pub const MEDIA_CAPTION: &str = concat!("div#app", " div[data-testid=media-caption-input-container] p");
pub const CLIP_BUTTON: &str = concat!(
    "div#app [data-testid=conversation-panel-wrapper]",
    " [data-testid=conversation-clip] [role=button]"
);
pub const DOCUMENT_INPUT: &str = concat!("div#app", " [data-testid=attach-document]+input");
pub const MEDIA_INPUT: &str = concat!("div#app", " [data-testid=attach-image]+input");
pub const SEND_BUTTON: &str = concat!("div#app", " span[data-testid=send]");

pub const CHAT_TITLE: &str = concat!(
    "div#app [data-testid=conversation-panel-wrapper]",
    " [data-testid=conversation-info-header-chat-title]"
);
pub const CHAT_INFO_TITLE: &str = concat!(
    "div#app [data-testid=drawer-right] [data-testid=chat-info-drawer]",
    " [data-testid=contact-info-subtitle]"
);
pub const CHAT_INFO_SUBTITLE: &str = concat!(
    "div#app [data-testid=drawer-right] [data-testid=chat-info-drawer]",
    " span>span"
);

/// Relative to a message row.
pub const MESSAGE_CONTENT: &str = "span.copyable-text";
pub const MESSAGE_STATUS: &str = "div[data-testid=msg-meta] div span";

/// Newest outgoing row's `data-testid`, `conv-msg-true_<jid>_<id>`.
pub const LAST_SENT_MESSAGE_ID: &str = r#"return Array.from(document.querySelectorAll("[data-testid^=conv-msg-true_]")).reverse()[0]?.getAttribute("data-testid") ?? null;"#;

/// Sets the innerText of `arguments[0]` to `arguments[1]`.
pub const SET_CHAT_TITLE: &str = r#"const el = document.querySelector(arguments[0]); if (el) el.innerText = arguments[1]; return !!el;"#;
