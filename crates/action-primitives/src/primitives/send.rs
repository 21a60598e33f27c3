//! Send primitive - Deliver one message to one chat

use chrono::Utc;
use perceiver_structural::{selectors, PhaseDetector};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use whatsweb_core_types::{Attachment, AttachmentKind, Chat, ElementRef, Message};

use crate::{
    errors::SendError,
    primitives::{is_chat_open, open_chat},
    types::{SendTimings, SentMessageId},
    waiting::wait_until,
};

/// Execute the send protocol
///
/// On success the message is bound to its row (`id`, `sent_at`, element)
/// and the parsed row id is returned. The caller records failures on the
/// message; nothing here retries.
///
/// Steps:
/// 1. Fail fast on a chat already known to be invalid
/// 2. Open the chat unless it is already on screen
/// 3. Locate the input and remember the newest outgoing row
/// 4. Type the text, or attach the file
/// 5. Click send and wait for a new outgoing row
/// 6. Bind the row and verify the rendered text
/// 7. Wait for the delivered marker, best effort
pub async fn send_message(
    detector: &PhaseDetector,
    chat: &Chat,
    message: &Message,
    timings: &SendTimings,
) -> Result<SentMessageId, SendError> {
    let browser = detector.browser();

    info!(%chat, nonce = message.nonce(), "Executing send");

    // 1. Known-bad number
    if chat.is_invalid() {
        return Err(SendError::InvalidPhoneNumber);
    }

    // 2. Open the chat
    if !is_chat_open(detector, chat, timings).await {
        debug!(%chat, "chat is not open, opening it to send");
        open_chat(detector, chat, timings).await?;
    }

    // 3. Input and baseline
    if !browser.has(selectors::CHAT_INPUT).await {
        return Err(SendError::InputNotFound);
    }
    let baseline = detector.last_sent_message_id().await;
    debug!(%chat, baseline = ?baseline, "last sent message before send");

    // 4. Payload
    browser.clear(selectors::CHAT_INPUT).await?;
    if let Some(content) = message.content() {
        debug!(%chat, "typing message content");
        browser.type_text(selectors::CHAT_INPUT, content).await?;
        sleep(timings.after_typing).await;
    }
    if let Some(attachment) = message.attachment() {
        attach(detector, attachment, timings).await?;
    }

    // 5. Send and wait for the new row
    if !browser.has(selectors::SEND_BUTTON).await {
        return Err(SendError::SendButtonNotFound);
    }
    browser.click(selectors::SEND_BUTTON).await?;
    sleep(timings.after_send).await;

    debug!(%chat, %message, "waiting for message to be sent");
    let baseline = baseline.as_ref();
    wait_until("new outgoing message", timings.message_id, move || async move {
        matches!(detector.last_sent_message_id().await, Some(id) if Some(&id) != baseline)
    })
    .await
    .map_err(|_| SendError::UnableToSendMessage)?;

    // 6. Bind and verify
    let raw = detector
        .last_sent_message_id()
        .await
        .ok_or(SendError::UnableToSendMessage)?;
    let sent = SentMessageId::parse(&raw)?;
    debug!(
        %chat,
        from_me = sent.from_me,
        jid = %sent.jid,
        message_id = %sent.message_id,
        "message row assigned"
    );
    let element = ElementRef::for_testid(&raw);
    message.bind_sent(sent.message_id.clone(), Utc::now(), element.clone());

    if let Some(expected) = message.content() {
        let actual = detector.message_text(&element).await.unwrap_or_default();
        if actual != expected {
            return Err(SendError::ContentMismatch {
                expected: expected.to_string(),
                actual,
            });
        }
    }

    // 7. Delivery
    let element = &element;
    let delivered = wait_until("delivery marker", timings.delivery, move || async move {
        detector
            .message_status(element)
            .await
            .is_some_and(|status| status.is_delivered())
    })
    .await;

    match delivered {
        Ok(()) => info!(%chat, %message, "message sent"),
        Err(_) => warn!(
            %chat,
            %message,
            "message not confirmed in time; it may still have been sent"
        ),
    }

    Ok(sent)
}

async fn attach(
    detector: &PhaseDetector,
    attachment: &Attachment,
    timings: &SendTimings,
) -> Result<(), SendError> {
    let browser = detector.browser();

    if !browser.has(selectors::CLIP_BUTTON).await {
        return Err(SendError::ClipButtonNotFound);
    }
    browser.click(selectors::CLIP_BUTTON).await?;

    let input = match attachment.kind {
        AttachmentKind::Document => selectors::DOCUMENT_INPUT,
        AttachmentKind::Media => selectors::MEDIA_INPUT,
    };
    if !browser.has(input).await {
        return Err(SendError::FileInputNotFound);
    }

    info!(kind = %attachment.kind, path = %attachment.path.display(), "uploading attachment");
    browser
        .set_file_input(input, &attachment.path)
        .await
        .map_err(|err| SendError::FileRejected {
            path: attachment.path.display().to_string(),
            reason: err.to_string(),
        })?;

    wait_until("attachment preview", timings.upload_preview, move || {
        browser.has(selectors::MEDIA_CAPTION)
    })
    .await
    .map_err(|_| SendError::FileUploadFailed)
}
