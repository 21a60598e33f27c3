//! Infers the web client's phase from DOM probes.

use std::time::Duration;

pub mod checks;
pub mod detector;
pub mod errors;
pub mod selectors;

pub use checks::{Check, CheckRegistry, Condition, ErrorSink, OneShotFlags};
pub use detector::{comparable, PhaseDetector};
pub use errors::PerceiverError;

pub const WHATSAPP_URL: &str = "https://web.whatsapp.com";

/// Base tick of the poll loop; also the settle time after UI-changing clicks.
pub const LOOP_INTERVAL: Duration = Duration::from_millis(500);

/// Deep link that opens the conversation with `phone`.
pub fn phone_url(phone: &str) -> String {
    format!("{WHATSAPP_URL}/send?phone={phone}")
}
