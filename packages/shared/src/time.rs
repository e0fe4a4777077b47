//! Time-related utilities with clock abstraction for testability.

use chrono::{DateTime, FixedOffset, Utc};

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Get current Unix timestamp (milliseconds)
    fn now_millis(&self) -> i64;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        now_millis()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: i64,
}

impl FixedClock {
    /// Create a new fixed clock with the given timestamp
    pub fn new(fixed_time_millis: i64) -> Self {
        Self {
            fixed_time: fixed_time_millis,
        }
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.fixed_time
    }
}

/// Get current Unix timestamp (milliseconds)
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Format a Unix timestamp (milliseconds) as `HH:MM:SS` in the given UTC offset.
///
/// Out-of-range timestamps or offsets fall back to `--:--:--` rather than failing,
/// since the result is only ever shown next to a chat line.
pub fn format_time_of_day(timestamp_millis: i64, utc_offset_seconds: i32) -> String {
    let Some(offset) = FixedOffset::east_opt(utc_offset_seconds) else {
        return "--:--:--".to_string();
    };

    match DateTime::<Utc>::from_timestamp_millis(timestamp_millis) {
        Some(dt) => dt.with_timezone(&offset).format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}
