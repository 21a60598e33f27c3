//! Error reporting: `Error` events plus numbered debug screenshots

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cdp_adapter::Browser;
use tokio::runtime::Handle;
use tracing::{error, warn};
use whatsweb_event_bus::{EventBus, InMemoryBus};

use crate::events::ClientEvent;

pub struct ErrorReporter {
    browser: Arc<dyn Browser>,
    bus: Arc<InMemoryBus<ClientEvent>>,
    debug: bool,
    dir: PathBuf,
    next: AtomicUsize,
}

impl ErrorReporter {
    /// Screenshot numbering continues after the files already in `dir`.
    pub fn new(
        browser: Arc<dyn Browser>,
        bus: Arc<InMemoryBus<ClientEvent>>,
        debug: bool,
        dir: impl Into<PathBuf>,
    ) -> Self {
        let dir = dir.into();
        let next = count_files(&dir);
        Self {
            browser,
            bus,
            debug,
            dir,
            next: AtomicUsize::new(next),
        }
    }

    /// Publishes `Error`. In debug mode also logs it and captures
    /// `error<N>.png` in the background.
    pub fn report(&self, message: impl Into<String>) {
        let message = message.into();
        self.bus.publish(ClientEvent::Error(message.clone()));
        if !self.debug {
            return;
        }

        let n = self.next.fetch_add(1, Ordering::SeqCst);
        error!("[ERROR-{n}] {message}");

        let Ok(handle) = Handle::try_current() else {
            warn!("No runtime available, skipping error screenshot");
            return;
        };
        let browser = Arc::clone(&self.browser);
        let dir = self.dir.clone();
        handle.spawn(async move {
            if let Err(err) = tokio::fs::create_dir_all(&dir).await {
                warn!(dir = %dir.display(), "Cannot create debug directory: {err}");
                return;
            }
            let path = dir.join(format!("error{n}.png"));
            if !browser.screenshot(&path).await {
                warn!(path = %path.display(), "Error screenshot failed");
            }
        });
    }
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
                .count()
        })
        .unwrap_or(0)
}
