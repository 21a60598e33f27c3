//! Chat primitive - Make the target conversation the current one

use perceiver_structural::{comparable, phone_url, selectors, Check, PhaseDetector};
use tracing::{debug, info};
use whatsweb_core_types::Chat;

use crate::{
    errors::SendError,
    primitives::confirm_popup,
    types::SendTimings,
    waiting::wait_until,
};

/// Whether the conversation on screen belongs to `chat`.
///
/// Contacts saved under a name do not show their number in the header. In
/// that case the contact-info drawer is opened and its subtitle compared;
/// on a match the header title is rewritten to the digits so the next check
/// is a plain comparison.
pub async fn is_chat_open(detector: &PhaseDetector, chat: &Chat, timings: &SendTimings) -> bool {
    if !detector.is(Check::ChatScreen).await {
        debug!(%chat, "not on a chat screen");
        return false;
    }

    let digits = chat.phone().as_str();
    if detector.chat_title_matches(digits).await {
        return true;
    }

    let browser = detector.browser();
    if !browser.has(selectors::CHAT_TITLE).await {
        debug!(%chat, "chat header has no title");
        return false;
    }

    if !detector.is_chat_info_open().await {
        if let Err(err) = browser.click(selectors::CHAT_TITLE).await {
            debug!(%chat, "chat title click failed: {err}");
            return false;
        }
        if wait_until("chat info drawer", timings.chat_info, move || {
            detector.is_chat_info_open()
        })
        .await
        .is_err()
        {
            debug!(%chat, "chat info drawer did not open");
            return false;
        }
    }

    let Some(subtitle) = detector.chat_info_subtitle().await else {
        debug!(%chat, "chat info has no subtitle");
        return false;
    };
    if comparable(&subtitle) != digits {
        debug!(%chat, subtitle = %subtitle, "chat info belongs to another contact");
        return false;
    }

    detector.pin_chat_title(digits).await;
    true
}

/// Navigates to the deep link of `chat` and waits until it is on screen.
///
/// A popup with only an OK button means the number was rejected: it is
/// acknowledged and the chat is marked invalid for good.
pub async fn open_chat(
    detector: &PhaseDetector,
    chat: &Chat,
    timings: &SendTimings,
) -> Result<(), SendError> {
    let url = phone_url(chat.phone().as_str());
    info!(%chat, %url, "opening chat");
    detector.browser().navigate(&url).await?;

    wait_until("popup to settle", timings.popup_settle, move || {
        detector.popup_settled()
    })
    .await
    .map_err(SendError::RequestInvalid)?;
    debug!(%chat, "chat page loaded");

    if detector.is(Check::ConfirmPopupOk).await {
        let reason = detector.confirm_popup_content().await;
        confirm_popup(detector, timings).await;
        chat.mark_invalid();
        info!(%chat, reason = %reason, "phone number rejected");
        return Err(SendError::InvalidPhoneNumber);
    }

    wait_until("chat to open", timings.chat_open, move || {
        is_chat_open(detector, chat, timings)
    })
    .await
    .map_err(|_| SendError::UnableToOpenChat)
}
