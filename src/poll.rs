//! Poll loop - one tick reads the page phase, emits events and dispatches
//! due tasks.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use action_primitives::send_message;
use futures::FutureExt;
use perceiver_structural::Check;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use whatsweb_core_types::Notification;
use whatsweb_scheduler::{Task, TaskKind};

use crate::client::Inner;
use crate::events::ClientEvent;
use crate::qr;

const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Consecutive failed liveness probes before the session counts as gone.
const LIVENESS_FAILURES: u32 = 3;

/// Ticks until cancelled or until the browser goes away.
pub(crate) async fn run(inner: Arc<Inner>) {
    let mut ticker = interval(inner.config.poll_interval.max(MIN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failed_probes = 0;

    loop {
        tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if inner.browser.is_closed() {
            info!("Browser session closed");
            inner.shutdown().await;
            break;
        }
        if inner.browser.is_alive().await {
            failed_probes = 0;
        } else {
            failed_probes += 1;
            warn!(failed_probes, "Browser did not answer the liveness probe");
            if failed_probes >= LIVENESS_FAILURES {
                info!("Browser session lost");
                inner.shutdown().await;
                break;
            }
            continue;
        }

        if AssertUnwindSafe(tick(&inner)).catch_unwind().await.is_err() {
            inner.reporter.report("poll tick panicked");
        }
    }
    debug!("Poll loop finished");
}

/// One pass over the page.
///
/// Steps:
/// 1. Emit `Updated` and forward at most one notification
/// 2. Loading screen: log progress and stop here
/// 3. First-time login screen, QR code, QR refresh and login
/// 4. Logged in: dispatch the due task
async fn tick(inner: &Arc<Inner>) {
    let detector = &inner.detector;

    // 1. Heartbeat and notifications
    inner.publish(ClientEvent::Updated);
    if let Some(raw) = inner.browser.pop_notification().await {
        let notification = Notification::from_raw(&raw.tag, &raw.body);
        debug!(from = %notification.phone_number, "Notification received");
        inner.publish(ClientEvent::Notification(notification));
    }

    // 2. Loading
    if detector.is(Check::LoadingScreen).await {
        let percent = detector.loading_percent().await;
        let mut state = inner.state.lock();
        if state.last_loading != Some(percent) {
            info!(percent, "Loading");
            state.last_loading = Some(percent);
        }
        return;
    }

    // 3. Login phases
    if detector.first_time(Check::LoginScreen).await {
        let was_logged_in = std::mem::take(&mut inner.state.lock().logged_in);
        if was_logged_in {
            // A fresh login screen brings a fresh QR code.
            detector.clear(Check::LoggedIn);
            detector.clear(Check::QrReady);
            detector.clear(Check::QrRefresh);
            info!("Logged out");
            inner.publish(ClientEvent::LoggedOut);
        }
        info!("Login required");
        inner.publish(ClientEvent::LoginRequired);
        tokio::spawn(watch_login(Arc::clone(inner)));
        return;
    }

    if detector.first_time(Check::QrReady).await {
        match detector.qr_payload().await {
            Some(payload) => show_qr(inner, payload),
            // Rendered without its reference yet; look again next tick.
            None => detector.clear(Check::QrReady),
        }
    }

    if detector.first_time(Check::QrRefresh).await {
        detector.refresh_qr().await;
    }

    if detector.first_time(Check::LoggedIn).await {
        inner.state.lock().logged_in = true;
        info!("Logged in");
        inner.publish(ClientEvent::LoggedIn);
        return;
    }

    // 4. Tasks
    if detector.is(Check::LoggedIn).await {
        dispatch(inner);
    }
}

fn show_qr(inner: &Inner, payload: String) {
    info!("QR code ready");
    if inner.config.print_qr {
        match qr::render(&payload) {
            Ok(art) => println!("{art}"),
            Err(err) => inner.reporter.report(format!("cannot render QR code: {err}")),
        }
    }
    inner.publish(ClientEvent::QrCode(payload));
}

/// Re-arms the login screen check once the session is logged in, so a later
/// logout is noticed.
async fn watch_login(inner: Arc<Inner>) {
    let mut ticker = interval(inner.config.poll_interval.max(MIN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        if inner.detector.is(Check::LoggedIn).await {
            inner.detector.clear(Check::LoginScreen);
            debug!("Login watcher done");
            return;
        }
    }
}

/// Starts the due task unless one is already running.
fn dispatch(inner: &Arc<Inner>) {
    let Some(task) = inner.queue.next_due() else {
        return;
    };
    if !task.try_start() {
        return;
    }
    info!(task = %task.id(), "Task started");
    inner.publish(ClientEvent::TaskStarted(Arc::clone(&task)));
    tokio::spawn(run_task(Arc::clone(inner), task));
}

/// Runs one task to completion. Failures land on the message and in an
/// `Error` event; the task is finished either way.
async fn run_task(inner: Arc<Inner>, task: Arc<Task>) {
    match task.kind() {
        TaskKind::SendMessage { chat, message } => {
            let outcome = AssertUnwindSafe(send_message(
                &inner.detector,
                chat,
                message,
                &inner.timings,
            ))
            .catch_unwind()
            .await;

            let failure = match outcome {
                Ok(Ok(sent)) => {
                    info!(task = %task.id(), message_id = %sent.message_id, "Message sent");
                    None
                }
                Ok(Err(err)) => Some(err.to_string()),
                Err(_) => Some("send panicked".to_string()),
            };
            if let Some(reason) = failure {
                error!(task = %task.id(), %chat, "Send failed: {reason}");
                message.record_error(&reason);
                inner.reporter.report(format!("[{chat}] {reason}"));
            }
        }
    }

    task.finish();
    inner.publish(ClientEvent::TaskCompleted(task));
}
