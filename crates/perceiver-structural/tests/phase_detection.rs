use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cdp_adapter::fake::{FakeBrowser, FakeEffect};
use cdp_adapter::{Browser, ElementProbe};
use perceiver_structural::{
    selectors, Check, CheckRegistry, PerceiverError, PhaseDetector, WHATSAPP_URL,
};
use serde_json::json;
use whatsweb_core_types::{DeliveryStatus, ElementRef};

fn ready_browser() -> Arc<FakeBrowser> {
    let browser = FakeBrowser::new();
    browser.set_url(format!("{WHATSAPP_URL}/"));
    browser.insert(selectors::APP, ElementProbe::default());
    browser
}

fn detector(browser: &Arc<FakeBrowser>) -> PhaseDetector {
    let dyn_browser: Arc<dyn Browser> = browser.clone();
    PhaseDetector::new(dyn_browser).with_settle(Duration::ZERO)
}

#[tokio::test]
async fn first_time_fires_once_while_condition_holds() {
    let browser = ready_browser();
    browser.insert(selectors::MIDDLE_DRAWER, ElementProbe::default());
    let detector = detector(&browser);

    assert!(detector.first_time(Check::LoggedIn).await);
    assert!(!detector.first_time(Check::LoggedIn).await);
    assert!(detector.is(Check::LoggedIn).await);

    detector.clear(Check::LoggedIn);
    assert!(detector.first_time(Check::LoggedIn).await);
}

#[tokio::test]
async fn first_time_does_not_latch_while_false() {
    let browser = ready_browser();
    let detector = detector(&browser);

    assert!(!detector.first_time(Check::LoginScreen).await);
    browser.insert(selectors::LINK_WITH_PHONE, ElementProbe::default());
    assert!(detector.first_time(Check::LoginScreen).await);
    browser.remove(selectors::LINK_WITH_PHONE);
    browser.insert(selectors::LINK_WITH_PHONE, ElementProbe::default());
    assert!(!detector.first_time(Check::LoginScreen).await);
}

#[tokio::test]
async fn higher_layers_imply_their_ancestors() {
    let every_selector = [
        selectors::APP,
        selectors::CONFIRM_POPUP,
        selectors::CONFIRM_POPUP_OK,
        selectors::CONFIRM_POPUP_CANCEL,
        selectors::LOADING_SCREEN,
        selectors::LINK_WITH_PHONE,
        selectors::QR_CODE,
        selectors::QR_REFRESH,
        selectors::MIDDLE_DRAWER,
        selectors::INTRO_TITLE,
        selectors::CONVERSATION_PANEL,
    ];

    // Walk every subset of present elements on and off the app URL.
    for on_url in [true, false] {
        for mask in 0u32..(1 << every_selector.len()) {
            let browser = FakeBrowser::new();
            browser.set_url(if on_url { WHATSAPP_URL } else { "https://example.com" });
            for (bit, selector) in every_selector.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    browser.insert(*selector, ElementProbe::default());
                }
            }
            let detector = detector(&browser);
            for check in Check::ALL {
                if detector.is(check).await {
                    for ancestor in check.lineage() {
                        assert!(
                            detector.is(ancestor).await,
                            "{check} true but {ancestor} false (mask {mask:#b}, on_url {on_url})"
                        );
                    }
                }
            }
        }
    }
}

#[tokio::test]
async fn popup_button_is_either_control() {
    let browser = ready_browser();
    let detector = detector(&browser);
    assert!(detector.popup_settled().await);

    browser.insert(selectors::CONFIRM_POPUP, ElementProbe::default());
    assert!(!detector.is(Check::ConfirmPopupButton).await);
    assert!(!detector.popup_settled().await);

    browser.insert(selectors::CONFIRM_POPUP_CANCEL, ElementProbe::default());
    assert!(detector.is(Check::ConfirmPopupButton).await);
    assert!(!detector.popup_settled().await);

    browser.insert(
        selectors::CONFIRM_POPUP_CONTENTS,
        ElementProbe::with_text("Phone number shared via url is invalid."),
    );
    browser.insert(selectors::CONFIRM_POPUP_OK, ElementProbe::default());
    assert!(detector.popup_settled().await);
    assert_eq!(
        detector.confirm_popup_content().await,
        "Phone number shared via url is invalid."
    );
}

#[tokio::test]
async fn unregistered_checks_report_and_read_false() {
    let browser = ready_browser();
    browser.insert(selectors::MIDDLE_DRAWER, ElementProbe::default());

    let reported = Arc::new(AtomicUsize::new(0));
    let sink_count = Arc::clone(&reported);
    let mut registry = CheckRegistry::standard().with_error_sink(Arc::new(move |err: &PerceiverError| {
        assert_eq!(*err, PerceiverError::UnregisteredCheck(Check::LoggedIn));
        sink_count.fetch_add(1, Ordering::SeqCst);
    }));
    registry.unregister(Check::LoggedIn);

    let dyn_browser: Arc<dyn Browser> = browser.clone();
    let detector = PhaseDetector::with_registry(dyn_browser, registry);
    assert!(!detector.is(Check::LoggedIn).await);
    assert!(!detector.first_time(Check::LoggedIn).await);
    // Children inherit the failure through their parent.
    browser.insert(selectors::INTRO_TITLE, ElementProbe::default());
    assert!(!detector.is(Check::MainScreen).await);
    assert_eq!(reported.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn loading_percent_guards_against_zero_max() {
    let browser = ready_browser();
    let detector = detector(&browser);
    assert_eq!(detector.loading_percent().await, 0.0);

    browser.insert(selectors::LOADING_SCREEN, ElementProbe::default());
    browser.insert(
        selectors::LOADING_PROGRESS,
        ElementProbe::default().attr("value", "5").attr("max", "0"),
    );
    assert_eq!(detector.loading_percent().await, 0.0);

    browser.insert(
        selectors::LOADING_PROGRESS,
        ElementProbe::default().attr("value", "50").attr("max", "200"),
    );
    assert_eq!(detector.loading_percent().await, 25.0);

    browser.insert(
        selectors::LOADING_PROGRESS,
        ElementProbe::default().attr("value", "abc").attr("max", "100"),
    );
    assert_eq!(detector.loading_percent().await, 0.0);
}

#[tokio::test]
async fn stale_qr_is_refreshed_before_reading() {
    let browser = ready_browser();
    browser.insert(selectors::LINK_WITH_PHONE, ElementProbe::default());
    browser.insert(selectors::QR_CODE, ElementProbe::default().attr("data-ref", "stale"));
    browser.insert(selectors::QR_REFRESH, ElementProbe::default());
    browser.on_click(
        selectors::QR_REFRESH,
        vec![
            FakeEffect::Remove(selectors::QR_REFRESH.into()),
            FakeEffect::Insert(
                selectors::QR_CODE.into(),
                ElementProbe::default().attr("data-ref", "fresh"),
            ),
        ],
    );
    let detector = detector(&browser);
    assert!(detector.first_time(Check::QrReady).await);

    assert_eq!(detector.qr_payload().await.as_deref(), Some("fresh"));
    assert_eq!(browser.clicks(), vec![selectors::QR_REFRESH.to_string()]);
    // The refresh re-arms the QR flag so the new code is announced.
    assert!(detector.first_time(Check::QrReady).await);
}

#[tokio::test]
async fn qr_payload_is_absent_off_the_login_screen() {
    let browser = ready_browser();
    browser.insert(selectors::QR_CODE, ElementProbe::default().attr("data-ref", "x"));
    let detector = detector(&browser);
    assert_eq!(detector.qr_payload().await, None);
}

#[tokio::test]
async fn message_probes_read_ids_text_and_status() {
    let browser = ready_browser();
    let detector = detector(&browser);
    assert_eq!(detector.last_sent_message_id().await, None);

    browser.respond(
        selectors::LAST_SENT_MESSAGE_ID,
        json!("conv-msg-true_905551112233@c.us_3EB0"),
    );
    assert_eq!(
        detector.last_sent_message_id().await.as_deref(),
        Some("conv-msg-true_905551112233@c.us_3EB0")
    );

    let row = ElementRef::for_testid("conv-msg-true_905551112233@c.us_3EB0");
    browser.insert(row.child(selectors::MESSAGE_CONTENT), ElementProbe::with_text("hello"));
    browser.insert(
        row.child(selectors::MESSAGE_STATUS),
        ElementProbe::default().attr("data-testid", "msg-check"),
    );
    assert_eq!(detector.message_text(&row).await.as_deref(), Some("hello"));
    assert_eq!(detector.message_status(&row).await, Some(DeliveryStatus::Delivered));
}

#[tokio::test]
async fn chat_title_comparison_ignores_formatting() {
    let browser = ready_browser();
    browser.insert(selectors::MIDDLE_DRAWER, ElementProbe::default());
    browser.insert(selectors::CONVERSATION_PANEL, ElementProbe::default());
    browser.insert(selectors::CHAT_TITLE, ElementProbe::with_text("+90 555 111 22 33"));
    let detector = detector(&browser);

    assert!(detector.chat_title_matches("905551112233").await);
    assert!(!detector.chat_title_matches("905551112234").await);
    assert!(!detector.is_chat_info_open().await);

    browser.insert(selectors::CHAT_INFO_DRAWER, ElementProbe::default());
    browser.insert(selectors::CHAT_INFO_TITLE, ElementProbe::with_text("+90 555 111 22 33"));
    assert!(detector.is_chat_info_open().await);
}
