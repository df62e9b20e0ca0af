// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Logging infrastructure for the OTA engine
//!
//! A fixed-capacity ring of log entries. When full, the oldest entry is
//! dropped. With the `defmt` feature every recorded entry is forwarded to
//! the defmt transport as well.
//!
//! # Security
//!
//! - Image contents and digests of unreleased firmware must not be logged
//! - Log levels control what is output in production vs development

use core::fmt;
use heapless::{Deque, String};

use crate::constants::{LOG_BUFFER_SIZE, MAX_LOG_MESSAGE_LEN};
use crate::types::write_truncated;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    /// Errors that require immediate attention
    Error = 0,
    /// Warnings about potential issues
    Warn = 1,
    /// Informational messages
    Info = 2,
    /// Debug messages (development only)
    Debug = 3,
    /// Trace messages (very verbose, development only)
    Trace = 4,
}

impl LogLevel {
    /// Get the log level name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    /// Get a short prefix for the log level
    #[must_use]
    pub const fn prefix(&self) -> char {
        match self {
            Self::Error => 'E',
            Self::Warn => 'W',
            Self::Info => 'I',
            Self::Debug => 'D',
            Self::Trace => 'T',
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded event
#[derive(Clone)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Event sequence number of the owner at the time of logging
    pub seq: u32,
    /// Component name
    pub module: &'static str,
    /// Message, clipped at [`MAX_LOG_MESSAGE_LEN`]
    pub message: String<MAX_LOG_MESSAGE_LEN>,
}

impl LogEntry {
    /// Create an entry from formatted arguments
    #[must_use]
    pub fn new(level: LogLevel, seq: u32, module: &'static str, args: fmt::Arguments<'_>) -> Self {
        let mut message = String::new();
        write_truncated(&mut message, args);
        Self {
            level,
            seq,
            module,
            message,
        }
    }
}

impl fmt::Debug for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:08X}] {} [{}] {}",
            self.seq,
            self.level.prefix(),
            self.module,
            self.message
        )
    }
}

/// Ring buffer of the most recent `N` entries
pub struct LogBuffer<const N: usize = LOG_BUFFER_SIZE> {
    entries: Deque<LogEntry, N>,
    min_level: LogLevel,
    dropped: u32,
}

impl<const N: usize> LogBuffer<N> {
    /// Create a new empty log buffer (minimum level `Info`)
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Deque::new(),
            min_level: LogLevel::Info,
            dropped: 0,
        }
    }

    /// Set the minimum log level
    pub fn set_min_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Get the minimum log level
    #[must_use]
    pub const fn min_level(&self) -> LogLevel {
        self.min_level
    }

    /// Check if a log level should be recorded
    #[must_use]
    pub const fn should_log(&self, level: LogLevel) -> bool {
        (level as u8) <= (self.min_level as u8)
    }

    /// Record an entry, evicting the oldest when full
    pub fn log(
        &mut self,
        level: LogLevel,
        seq: u32,
        module: &'static str,
        args: fmt::Arguments<'_>,
    ) {
        if !self.should_log(level) {
            return;
        }
        let entry = LogEntry::new(level, seq, module, args);
        forward(&entry);

        if self.entries.is_full() {
            let _ = self.entries.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
        // Cannot fail: a slot was freed above if needed
        let _ = self.entries.push_back(entry);
    }

    /// Number of retained entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries evicted since creation
    #[must_use]
    pub const fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Most recent entry
    #[must_use]
    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate over entries (oldest first)
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Whether any retained entry's message contains `needle`
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.iter().any(|e| e.message.contains(needle))
    }
}

impl<const N: usize> Default for LogBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic event counter used as the log timestamp
///
/// Kept apart from [`LogBuffer`] so `log_info!(self.log, self.seq.tick(), ..)`
/// borrows two disjoint fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sequence(u32);

impl Sequence {
    /// Start counting from zero
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Advance and return the new value
    pub fn tick(&mut self) -> u32 {
        self.0 = self.0.wrapping_add(1);
        self.0
    }

    /// Last value handed out
    #[must_use]
    pub const fn current(&self) -> u32 {
        self.0
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "defmt")] {
        fn forward(entry: &LogEntry) {
            let text = entry.message.as_str();
            match entry.level {
                LogLevel::Error => defmt::error!("[{}] {}", entry.module, text),
                LogLevel::Warn => defmt::warn!("[{}] {}", entry.module, text),
                LogLevel::Info => defmt::info!("[{}] {}", entry.module, text),
                LogLevel::Debug => defmt::debug!("[{}] {}", entry.module, text),
                LogLevel::Trace => defmt::trace!("[{}] {}", entry.module, text),
            }
        }
    } else {
        #[inline(always)]
        fn forward(_entry: &LogEntry) {}
    }
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($buffer:expr, $seq:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Error, $seq, $module, format_args!($($arg)*))
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($buffer:expr, $seq:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Warn, $seq, $module, format_args!($($arg)*))
    };
}

/// Log an informational message
#[macro_export]
macro_rules! log_info {
    ($buffer:expr, $seq:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Info, $seq, $module, format_args!($($arg)*))
    };
}

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($buffer:expr, $seq:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Debug, $seq, $module, format_args!($($arg)*))
    };
}

/// Log a trace-level message
#[macro_export]
macro_rules! log_trace {
    ($buffer:expr, $seq:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Trace, $seq, $module, format_args!($($arg)*))
    };
}
