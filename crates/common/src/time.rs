//! Wall-clock helpers
//!
//! Token expiry is stored as absolute unix milliseconds, so every component
//! that reasons about freshness needs the same "now". Hoisted here so the
//! conversion is written once.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as unix milliseconds.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
