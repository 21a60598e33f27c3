//! Page-level operations of the send protocol
//!
//! 1. confirm_popup - acknowledge the modal the web client shows
//! 2. is_chat_open / open_chat - make the target conversation current
//! 3. send_message - the full send, from typing to delivery

mod chat;
mod popup;
mod send;

pub use chat::*;
pub use popup::*;
pub use send::*;
