//! Bounded waits and the per-chat send protocol
//!
//! Everything here drives the page through a [`perceiver_structural::PhaseDetector`]
//! and never waits without a deadline:
//! - `wait_until` - poll a condition until it holds or times out
//! - `confirm_popup` / `is_chat_open` / `open_chat` - chat navigation
//! - `send_message` - type or attach, send, and bind the new row
//!
//! Callers must run at most one send per browser at a time; the scheduler's
//! single-flight rule is what guarantees it.

pub mod errors;
mod primitives;
pub mod types;
mod waiting;

pub use errors::*;
pub use primitives::*;
pub use types::*;
pub use waiting::*;
