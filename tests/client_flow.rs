use std::sync::{Arc, Mutex};
use std::time::Duration;

use cdp_adapter::fake::{FakeBrowser, FakeEffect};
use cdp_adapter::{Browser, ElementProbe, RawNotification};
use perceiver_structural::{selectors, WHATSAPP_URL};
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};
use whatsweb_cli::{
    Client, ClientConfig, ClientError, ClientEvent, MessageInput, ScheduleOptions, TaskState,
};
use whatsweb_core_types::ElementRef;

const PHONE: &str = "905551112233";
const ROW_ID: &str = "conv-msg-true_905551112233@c.us_3EB0A1";

fn config(debug_dir: &std::path::Path) -> ClientConfig {
    ClientConfig {
        print_qr: false,
        debug_dir: debug_dir.to_path_buf(),
        ..ClientConfig::default()
    }
}

fn app_browser() -> Arc<FakeBrowser> {
    let browser = FakeBrowser::new();
    browser.set_url(format!("{WHATSAPP_URL}/"));
    browser.insert(selectors::APP, ElementProbe::default());
    browser
}

fn logged_in_browser() -> Arc<FakeBrowser> {
    let browser = app_browser();
    browser.insert(selectors::MIDDLE_DRAWER, ElementProbe::default());
    browser
}

/// Chat header and panel for `PHONE`, without the compose box.
fn show_chat_header(browser: &FakeBrowser) {
    browser.insert(selectors::CONVERSATION_PANEL, ElementProbe::default());
    browser.insert(selectors::CHAT_TITLE, ElementProbe::with_text("+90 555 111 22 33"));
}

fn show_chat(browser: &FakeBrowser) {
    show_chat_header(browser);
    browser.insert(selectors::CHAT_INPUT, ElementProbe::default());
    browser.insert(selectors::SEND_BUTTON, ElementProbe::default());
}

fn on_send_render(browser: &FakeBrowser, rendered: &str) {
    let row = ElementRef::for_testid(ROW_ID);
    browser.on_click(
        selectors::SEND_BUTTON,
        vec![
            FakeEffect::Respond(selectors::LAST_SENT_MESSAGE_ID.into(), json!(ROW_ID)),
            FakeEffect::Insert(
                row.child(selectors::MESSAGE_CONTENT),
                ElementProbe::with_text(rendered),
            ),
            FakeEffect::Insert(
                row.child(selectors::MESSAGE_STATUS),
                ElementProbe::default().attr("data-testid", "msg-check"),
            ),
        ],
    );
}

fn text(content: &str) -> MessageInput {
    MessageInput {
        content: Some(content.to_string()),
        ..MessageInput::default()
    }
}

/// Every event name, in publish order.
fn record(client: &Client) -> Arc<Mutex<Vec<&'static str>>> {
    let names = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&names);
    client.on(move |event| sink.lock().unwrap().push(event.name()));
    names
}

async fn wait_for<F>(events: &mut broadcast::Receiver<ClientEvent>, mut matches: F) -> ClientEvent
where
    F: FnMut(&ClientEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(120), async {
        loop {
            match events.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("event did not arrive")
}

#[tokio::test(start_paused = true)]
async fn login_flow_reports_qr_then_login() {
    let dir = tempfile::tempdir().unwrap();
    let browser = app_browser();
    browser.insert(selectors::LINK_WITH_PHONE, ElementProbe::default());
    browser.insert(
        selectors::QR_CODE,
        ElementProbe::default().attr("data-ref", "2@ref,key,secret"),
    );
    let client = Client::with_browser(browser.clone(), config(dir.path()));
    let mut events = client.subscribe();

    client.start().await.unwrap();
    wait_for(&mut events, |e| matches!(e, ClientEvent::LoginRequired)).await;
    let qr = wait_for(&mut events, |e| matches!(e, ClientEvent::QrCode(_))).await;
    assert!(matches!(qr, ClientEvent::QrCode(payload) if payload == "2@ref,key,secret"));
    assert!(!client.is_logged_in());

    // Phone scanned the code.
    browser.remove(selectors::LINK_WITH_PHONE);
    browser.remove(selectors::QR_CODE);
    browser.insert(selectors::MIDDLE_DRAWER, ElementProbe::default());
    wait_for(&mut events, |e| matches!(e, ClientEvent::LoggedIn)).await;

    assert!(client.is_logged_in());
    assert!(browser.navigations().is_empty());
    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn start_opens_the_web_client_once() {
    let dir = tempfile::tempdir().unwrap();
    let browser = FakeBrowser::new();
    let client = Client::with_browser(browser.clone(), config(dir.path()));
    let names = record(&client);

    client.start().await.unwrap();
    assert!(matches!(client.start().await, Err(ClientError::AlreadyStarted)));

    assert_eq!(browser.navigations(), vec![WHATSAPP_URL.to_string()]);
    assert_eq!(names.lock().unwrap()[..2], ["browser_created", "start"]);
    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn due_message_is_sent_after_login() {
    let dir = tempfile::tempdir().unwrap();
    let browser = logged_in_browser();
    show_chat(&browser);
    on_send_render(&browser, "hello");
    let client = Client::with_browser(browser.clone(), config(dir.path()));
    let names = record(&client);
    let mut events = client.subscribe();

    let task = client
        .send_message(PHONE, text("hello"), ScheduleOptions::default())
        .unwrap();
    client.start().await.unwrap();
    wait_for(&mut events, |e| matches!(e, ClientEvent::TaskCompleted(_))).await;

    let message = task.message().unwrap();
    assert_eq!(task.state(), TaskState::Done);
    assert_eq!(message.id().as_deref(), Some("3EB0A1"));
    assert_eq!(message.error(), None);
    assert!(client.pending().is_empty());

    let names = names.lock().unwrap().clone();
    let logged_in = names.iter().position(|n| *n == "logged_in").unwrap();
    let started = names.iter().position(|n| *n == "task_started").unwrap();
    assert!(logged_in < started);
    assert!(!names.contains(&"error"));
    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failed_send_is_recorded_and_the_task_still_finishes() {
    let dir = tempfile::tempdir().unwrap();
    let browser = logged_in_browser();
    show_chat(&browser);
    browser.respond(selectors::LAST_SENT_MESSAGE_ID, json!("conv-msg-true_1@c.us_OLD"));
    let client = Client::with_browser(browser.clone(), config(dir.path()));
    let mut events = client.subscribe();

    let task = client
        .send_message(PHONE, text("lost"), ScheduleOptions::default())
        .unwrap();
    client.start().await.unwrap();
    let error = wait_for(&mut events, |e| matches!(e, ClientEvent::Error(_))).await;
    wait_for(&mut events, |e| matches!(e, ClientEvent::TaskCompleted(_))).await;

    let ClientEvent::Error(reason) = error else {
        unreachable!()
    };
    assert!(reason.starts_with("[Chat(905551112233)]"), "{reason}");
    assert_eq!(task.state(), TaskState::Done);
    assert!(task.message().unwrap().error().is_some());
    assert!(!task.message().unwrap().is_sent());
    // No screenshots outside debug mode.
    assert!(browser.screenshots().is_empty());
    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn higher_priority_runs_first() {
    let dir = tempfile::tempdir().unwrap();
    let browser = logged_in_browser();
    // No compose box: each send fails fast with InputNotFound.
    show_chat_header(&browser);
    let client = Client::with_browser(browser.clone(), config(dir.path()));
    let mut events = client.subscribe();

    let low = client
        .send_message(PHONE, text("a"), ScheduleOptions::default().with_priority(1))
        .unwrap();
    let high = client
        .send_message(PHONE, text("b"), ScheduleOptions::default().with_priority(5))
        .unwrap();
    client.start().await.unwrap();

    let mut started = Vec::new();
    while started.len() < 2 {
        if let ClientEvent::TaskStarted(task) =
            wait_for(&mut events, |e| matches!(e, ClientEvent::TaskStarted(_))).await
        {
            started.push(task.id().clone());
        }
    }
    assert_eq!(started, vec![high.id().clone(), low.id().clone()]);
    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn delayed_message_waits_for_its_time() {
    let dir = tempfile::tempdir().unwrap();
    let browser = logged_in_browser();
    show_chat_header(&browser);
    let client = Client::with_browser(browser.clone(), config(dir.path()));
    let names = record(&client);

    let task = client
        .send_message(
            PHONE,
            text("later"),
            ScheduleOptions::after(Duration::from_secs(3600)),
        )
        .unwrap();
    client.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(names.lock().unwrap().contains(&"logged_in"));
    assert!(!names.lock().unwrap().contains(&"task_started"));
    assert_eq!(task.state(), TaskState::Pending);
    assert_eq!(client.pending().len(), 1);

    let cancelled = client.cancel(task.id()).unwrap();
    assert_eq!(cancelled.state(), TaskState::Cancelled);
    assert!(client.pending().is_empty());
    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn loading_screen_blocks_login_detection() {
    let dir = tempfile::tempdir().unwrap();
    let browser = logged_in_browser();
    browser.insert(selectors::LOADING_SCREEN, ElementProbe::default());
    browser.insert(
        selectors::LOADING_PROGRESS,
        ElementProbe::default().attr("value", "40").attr("max", "100"),
    );
    let client = Client::with_browser(browser.clone(), config(dir.path()));
    let names = record(&client);
    let mut events = client.subscribe();

    client.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(names.lock().unwrap().contains(&"update"));
    assert!(!names.lock().unwrap().contains(&"logged_in"));

    browser.remove(selectors::LOADING_SCREEN);
    wait_for(&mut events, |e| matches!(e, ClientEvent::LoggedIn)).await;
    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn login_screen_after_login_reports_logout() {
    let dir = tempfile::tempdir().unwrap();
    let browser = app_browser();
    browser.insert(selectors::LINK_WITH_PHONE, ElementProbe::default());
    browser.insert(
        selectors::QR_CODE,
        ElementProbe::default().attr("data-ref", "first"),
    );
    let client = Client::with_browser(browser.clone(), config(dir.path()));
    let mut events = client.subscribe();

    client.start().await.unwrap();
    let qr = wait_for(&mut events, |e| matches!(e, ClientEvent::QrCode(_))).await;
    assert!(matches!(qr, ClientEvent::QrCode(payload) if payload == "first"));

    browser.remove(selectors::LINK_WITH_PHONE);
    browser.remove(selectors::QR_CODE);
    browser.insert(selectors::MIDDLE_DRAWER, ElementProbe::default());
    wait_for(&mut events, |e| matches!(e, ClientEvent::LoggedIn)).await;
    // Let the login watcher re-arm the login screen check.
    tokio::time::sleep(Duration::from_secs(2)).await;

    // Phone unlinked: the login screen returns with a new code.
    browser.remove(selectors::MIDDLE_DRAWER);
    browser.insert(selectors::LINK_WITH_PHONE, ElementProbe::default());
    browser.insert(
        selectors::QR_CODE,
        ElementProbe::default().attr("data-ref", "second"),
    );
    wait_for(&mut events, |e| matches!(e, ClientEvent::LoggedOut)).await;
    wait_for(&mut events, |e| matches!(e, ClientEvent::LoginRequired)).await;
    assert!(!client.is_logged_in());
    let qr = wait_for(&mut events, |e| matches!(e, ClientEvent::QrCode(_))).await;
    assert!(matches!(qr, ClientEvent::QrCode(payload) if payload == "second"));

    browser.remove(selectors::LINK_WITH_PHONE);
    browser.remove(selectors::QR_CODE);
    browser.insert(selectors::MIDDLE_DRAWER, ElementProbe::default());
    wait_for(&mut events, |e| matches!(e, ClientEvent::LoggedIn)).await;
    assert!(client.is_logged_in());
    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn notifications_are_forwarded_with_the_sender() {
    let dir = tempfile::tempdir().unwrap();
    let browser = logged_in_browser();
    browser.queue_notification(RawNotification {
        title: "Alice".into(),
        tag: "905551112233@c.us".into(),
        body: "are you there?".into(),
    });
    let client = Client::with_browser(browser.clone(), config(dir.path()));
    let mut events = client.subscribe();

    client.start().await.unwrap();
    let event = wait_for(&mut events, |e| matches!(e, ClientEvent::Notification(_))).await;

    let ClientEvent::Notification(notification) = event else {
        unreachable!()
    };
    assert_eq!(notification.phone_number, PHONE);
    assert_eq!(notification.body, "are you there?");
    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let browser = logged_in_browser();
    let client = Client::with_browser(browser.clone(), config(dir.path()));
    let names = record(&client);

    client.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    client.stop().await;
    client.stop().await;

    let stops = names.lock().unwrap().iter().filter(|n| **n == "stop").count();
    assert_eq!(stops, 1);
    assert!(client.is_stopped());
    assert!(browser.is_closed());
}

#[tokio::test(start_paused = true)]
async fn unanswered_liveness_probes_stop_the_client_only_when_repeated() {
    let dir = tempfile::tempdir().unwrap();
    let browser = logged_in_browser();
    let client = Client::with_browser(browser.clone(), config(dir.path()));
    let names = record(&client);
    let mut events = client.subscribe();

    client.start().await.unwrap();
    wait_for(&mut events, |e| matches!(e, ClientEvent::LoggedIn)).await;

    // Two missed probes, e.g. while the page swaps execution contexts.
    browser.set_alive(false);
    tokio::time::sleep(Duration::from_millis(1100)).await;
    browser.set_alive(true);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!client.is_stopped());
    assert!(!browser.is_closed());
    assert!(!names.lock().unwrap().contains(&"stop"));

    browser.set_alive(false);
    wait_for(&mut events, |e| matches!(e, ClientEvent::Stopped)).await;
    assert!(client.is_stopped());
    assert!(browser.is_closed());
    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn closed_browser_stops_the_client() {
    let dir = tempfile::tempdir().unwrap();
    let browser = logged_in_browser();
    let client = Client::with_browser(browser.clone(), config(dir.path()));
    let mut events = client.subscribe();

    client.start().await.unwrap();
    wait_for(&mut events, |e| matches!(e, ClientEvent::LoggedIn)).await;
    browser.kill();
    wait_for(&mut events, |e| matches!(e, ClientEvent::Stopped)).await;

    assert!(client.is_stopped());
    client.stop().await;
}

#[tokio::test(start_paused = true)]
async fn debug_mode_numbers_screenshots_after_existing_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("error0.png"), b"").unwrap();
    let browser = logged_in_browser();
    show_chat_header(&browser);
    let config = ClientConfig {
        debug: true,
        ..config(dir.path())
    };
    let client = Client::with_browser(browser.clone(), config);
    let mut events = client.subscribe();

    client
        .send_message(PHONE, text("boom"), ScheduleOptions::default())
        .unwrap();
    client.start().await.unwrap();
    wait_for(&mut events, |e| matches!(e, ClientEvent::TaskCompleted(_))).await;
    for _ in 0..20 {
        if !browser.screenshots().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert_eq!(browser.screenshots(), vec![dir.path().join("error1.png")]);
    client.stop().await;
}

#[tokio::test]
async fn chats_are_shared_per_number() {
    let dir = tempfile::tempdir().unwrap();
    let client = Client::with_browser(FakeBrowser::new(), config(dir.path()));

    let a = client.chat("+90 555 111 22 33").unwrap();
    let b = client.chat(PHONE).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[tokio::test]
async fn invalid_requests_are_rejected_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let client = Client::with_browser(FakeBrowser::new(), config(dir.path()));

    assert!(matches!(
        client.send_message("90-555", text("hi"), ScheduleOptions::default()),
        Err(ClientError::Validation(_))
    ));
    assert!(matches!(
        client.send_message(PHONE, MessageInput::default(), ScheduleOptions::default()),
        Err(ClientError::Validation(_))
    ));
    assert!(client.pending().is_empty());
}
