use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{PhoneNumber, ValidationError};

/// A conversation target. Once the web client rejects the number the chat
/// stays invalid for the rest of its life.
#[derive(Debug)]
pub struct Chat {
    phone: PhoneNumber,
    invalid: AtomicBool,
}

impl Chat {
    pub fn new(phone: PhoneNumber) -> Self {
        Self {
            phone,
            invalid: AtomicBool::new(false),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        PhoneNumber::parse(raw).map(Self::new)
    }

    pub fn phone(&self) -> &PhoneNumber {
        &self.phone
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid.load(Ordering::Acquire)
    }

    pub fn mark_invalid(&self) {
        self.invalid.store(true, Ordering::Release);
    }
}

impl fmt::Display for Chat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chat({})", self.phone)
    }
}
