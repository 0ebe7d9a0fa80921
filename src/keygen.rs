//! Row key derivation strategies for the retrying insert protocols.
//!
//! A generator is asked for a key once per attempt. Ordinal strategies encode
//! the attempt number as a 3-digit suffix, which bounds them to
//! [`ORDINAL_KEY_SPACE`] attempts.

use chrono::{NaiveDateTime, Timelike};
use uuid::Uuid;

/// Number of distinct 3-digit ordinal suffixes.
pub const ORDINAL_KEY_SPACE: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowKeyDateTimeFormat {
    /// `yyyy-MM-dd HH:mm:ss.fffffff`
    #[default]
    Iso,
    /// `yyyyMMddHHmmss`
    Short,
}

impl RowKeyDateTimeFormat {
    pub fn mask(&self) -> &'static str {
        match self {
            Self::Iso => "yyyy-MM-dd HH:mm:ss.fffffff",
            Self::Short => "yyyyMMddHHmmss",
        }
    }
}

/// Formats `timestamp` as a sortable row key prefix.
pub fn format_row_key_timestamp(timestamp: NaiveDateTime, format: RowKeyDateTimeFormat) -> String {
    match format {
        RowKeyDateTimeFormat::Short => timestamp.format("%Y%m%d%H%M%S").to_string(),
        RowKeyDateTimeFormat::Iso => {
            // 100ns ticks; leap-second nanos above 1e9 fold back into range
            let ticks = (timestamp.nanosecond() % 1_000_000_000) / 100;
            format!("{}.{:07}", timestamp.format("%Y-%m-%d %H:%M:%S"), ticks)
        }
    }
}

pub fn ordinal_suffix(ordinal: u32) -> String {
    format!("{:03}", ordinal)
}

pub trait RowKeyGenerator: Send {
    /// Row key for the 0-based `attempt`.
    fn row_key(&mut self, attempt: u32) -> String;
}

impl<F> RowKeyGenerator for F
where
    F: FnMut(u32) -> String + Send,
{
    fn row_key(&mut self, attempt: u32) -> String {
        self(attempt)
    }
}

/// Formatted timestamp followed by a 3-digit attempt ordinal.
#[derive(Debug, Clone)]
pub struct TimestampOrdinalKey {
    prefix: String,
}

impl TimestampOrdinalKey {
    pub fn new(timestamp: NaiveDateTime, format: RowKeyDateTimeFormat) -> Self {
        Self {
            prefix: format_row_key_timestamp(timestamp, format),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl RowKeyGenerator for TimestampOrdinalKey {
    fn row_key(&mut self, attempt: u32) -> String {
        format!("{}{}", self.prefix, ordinal_suffix(attempt))
    }
}

/// `HH:mm:ss.NNN` where `NNN` is the attempt ordinal.
#[derive(Debug, Clone)]
pub struct ClockTimeOrdinalKey {
    prefix: String,
}

impl ClockTimeOrdinalKey {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            prefix: timestamp.format("%H:%M:%S").to_string(),
        }
    }
}

impl RowKeyGenerator for ClockTimeOrdinalKey {
    fn row_key(&mut self, attempt: u32) -> String {
        format!("{}.{}", self.prefix, ordinal_suffix(attempt))
    }
}

/// Calls a caller-supplied generator on every attempt, ignoring the attempt number.
pub struct GeneratedKey<F> {
    generate: F,
}

impl<F> GeneratedKey<F>
where
    F: FnMut() -> String + Send,
{
    pub fn new(generate: F) -> Self {
        Self { generate }
    }
}

impl GeneratedKey<fn() -> String> {
    /// Random v4 UUID per attempt.
    pub fn uuid() -> Self {
        Self {
            generate: new_uuid_key,
        }
    }
}

fn new_uuid_key() -> String {
    Uuid::new_v4().to_string()
}

impl<F> RowKeyGenerator for GeneratedKey<F>
where
    F: FnMut() -> String + Send,
{
    fn row_key(&mut self, _attempt: u32) -> String {
        (self.generate)()
    }
}
