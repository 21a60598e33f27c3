//! The client: owns one browser session, its detector, queue and event bus.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use action_primitives::SendTimings;
use cdp_adapter::{Browser, ChromiumBrowser};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use perceiver_structural::{Check, CheckRegistry, PerceiverError, PhaseDetector, WHATSAPP_URL};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use whatsweb_core_types::{Chat, Message, MessageInput, PhoneNumber, TaskId};
use whatsweb_event_bus::{to_mpsc, EventBus, InMemoryBus, ListenerId};
use whatsweb_scheduler::{metrics, SchedulerMetricsSnapshot, Task, TaskKind, TaskQueue};

use crate::config::ClientConfig;
use crate::errors::{ClientError, ClientResult};
use crate::events::ClientEvent;
use crate::poll;
use crate::report::ErrorReporter;

const EVENT_CAPACITY: usize = 256;

/// When and how urgently a send should run.
#[derive(Clone, Debug, Default)]
pub struct ScheduleOptions {
    /// Added on top of `at` (or now).
    pub delay: Option<Duration>,
    pub at: Option<DateTime<Utc>>,
    /// Higher runs first.
    pub priority: i32,
}

impl ScheduleOptions {
    pub fn after(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn at(at: DateTime<Utc>) -> Self {
        Self {
            at: Some(at),
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn not_before(&self, now: DateTime<Utc>) -> ClientResult<DateTime<Utc>> {
        let start = self.at.unwrap_or(now);
        let Some(delay) = self.delay else {
            return Ok(start);
        };
        chrono::Duration::from_std(delay)
            .ok()
            .and_then(|delay| start.checked_add_signed(delay))
            .ok_or_else(|| ClientError::InvalidSchedule(format!("delay {delay:?} is out of range")))
    }
}

#[derive(Debug, Default)]
pub(crate) struct LoopState {
    pub(crate) last_loading: Option<f64>,
    pub(crate) logged_in: bool,
}

pub(crate) struct Inner {
    pub(crate) config: ClientConfig,
    pub(crate) browser: Arc<dyn Browser>,
    pub(crate) detector: PhaseDetector,
    pub(crate) queue: TaskQueue,
    pub(crate) bus: Arc<InMemoryBus<ClientEvent>>,
    pub(crate) reporter: Arc<ErrorReporter>,
    pub(crate) timings: SendTimings,
    pub(crate) state: Mutex<LoopState>,
    pub(crate) cancel: CancellationToken,
    chats: DashMap<String, Arc<Chat>>,
    started: AtomicBool,
    stopped: AtomicBool,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    pub(crate) fn publish(&self, event: ClientEvent) {
        self.bus.publish(event);
    }

    /// Cancels polling, closes the browser and emits `Stopped`, once.
    pub(crate) async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        if !self.browser.is_closed() {
            if let Err(err) = self.browser.close().await {
                warn!("Closing browser failed: {err}");
            }
        }
        info!("Client stopped");
        self.publish(ClientEvent::Stopped);
    }
}

/// Handle to one WhatsApp Web session. Cheap to clone.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Launches Chromium with `config.browser`.
    pub async fn launch(config: ClientConfig) -> ClientResult<Self> {
        let browser = ChromiumBrowser::launch(&config.browser).await?;
        Ok(Self::with_browser(Arc::new(browser), config))
    }

    pub fn with_browser(browser: Arc<dyn Browser>, config: ClientConfig) -> Self {
        Self::with_timings(browser, config, SendTimings::default())
    }

    pub fn with_timings(browser: Arc<dyn Browser>, config: ClientConfig, timings: SendTimings) -> Self {
        let bus = InMemoryBus::new(EVENT_CAPACITY);
        let reporter = Arc::new(ErrorReporter::new(
            Arc::clone(&browser),
            Arc::clone(&bus),
            config.debug,
            config.debug_dir.clone(),
        ));

        let sink = Arc::clone(&reporter);
        let registry = CheckRegistry::standard()
            .with_error_sink(Arc::new(move |err: &PerceiverError| sink.report(err.to_string())));
        let detector =
            PhaseDetector::with_registry(Arc::clone(&browser), registry).with_settle(timings.settle);

        Self {
            inner: Arc::new(Inner {
                config,
                browser,
                detector,
                queue: TaskQueue::new(),
                bus,
                reporter,
                timings,
                state: Mutex::new(LoopState::default()),
                cancel: CancellationToken::new(),
                chats: DashMap::new(),
                started: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                ticker: Mutex::new(None),
            }),
        }
    }

    /// Opens the web client unless the tab is already on it and starts
    /// polling.
    ///
    /// Steps:
    /// 1. Announce the browser and the start
    /// 2. Navigate to the web client when needed
    /// 3. Spawn the poll loop
    pub async fn start(&self) -> ClientResult<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(ClientError::AlreadyStarted);
        }

        // 1. Announce
        self.inner.publish(ClientEvent::BrowserCreated);
        self.inner.publish(ClientEvent::Started);

        // 2. Navigate
        let on_app = self
            .inner
            .browser
            .current_url()
            .await
            .is_some_and(|url| url.starts_with(WHATSAPP_URL));
        if !on_app {
            self.load_main_page().await?;
        }

        // 3. Poll
        info!(interval = ?self.inner.config.poll_interval, "Client started");
        let handle = tokio::spawn(poll::run(Arc::clone(&self.inner)));
        *self.inner.ticker.lock() = Some(handle);
        Ok(())
    }

    /// Stops polling and closes the browser. Safe to call more than once.
    pub async fn stop(&self) {
        self.inner.shutdown().await;
        let handle = self.inner.ticker.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                debug!("Poll loop ended abnormally: {err}");
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner.state.lock().logged_in
    }

    pub async fn load_main_page(&self) -> ClientResult<()> {
        self.inner.detector.clear(Check::MainScreen);
        self.inner.browser.navigate(WHATSAPP_URL).await?;
        Ok(())
    }

    /// The chat for `phone`, shared by every send to the same number.
    pub fn chat(&self, phone: &str) -> ClientResult<Arc<Chat>> {
        let phone = PhoneNumber::parse(phone)?;
        let chat = self
            .inner
            .chats
            .entry(phone.as_str().to_string())
            .or_insert_with(|| Arc::new(Chat::new(phone)))
            .clone();
        Ok(chat)
    }

    /// Validates the message and queues it. The poll loop sends it once it
    /// is due and the session is logged in.
    pub fn send_message(
        &self,
        phone: &str,
        input: MessageInput,
        options: ScheduleOptions,
    ) -> ClientResult<Arc<Task>> {
        let chat = self.chat(phone)?;
        let message = Arc::new(Message::new(input)?);
        let not_before = options.not_before(Utc::now())?;
        let task = Arc::new(Task::new(
            TaskKind::SendMessage { chat, message },
            options.priority,
            not_before,
        ));
        info!(task = %task.id(), %not_before, priority = options.priority, "Message scheduled");
        self.inner.queue.add(Arc::clone(&task));
        Ok(task)
    }

    /// Drops a task that has not started yet.
    pub fn cancel(&self, id: &TaskId) -> ClientResult<Arc<Task>> {
        Ok(self.inner.queue.cancel(id)?)
    }

    pub fn pending(&self) -> Vec<Arc<Task>> {
        self.inner.queue.pending()
    }

    /// Task counters for this process, across every client.
    pub fn metrics(&self) -> SchedulerMetricsSnapshot {
        metrics::snapshot()
    }

    pub fn detector(&self) -> &PhaseDetector {
        &self.inner.detector
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.bus.subscribe()
    }

    /// Events as an mpsc stream; must be called inside a runtime.
    pub fn events(&self, capacity: usize) -> mpsc::Receiver<ClientEvent> {
        to_mpsc(Arc::clone(&self.inner.bus), capacity)
    }

    /// Registers a synchronous listener, called on the publishing task.
    pub fn on<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.inner.bus.listen(listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.bus.unlisten(id)
    }
}
