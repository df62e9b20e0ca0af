// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Operation errors
//!
//! Every public operation returns an [`UpdateError`]: the error kind from
//! `ota_common` plus the human-readable message that also lands in the
//! session status.

use core::fmt;

use ota_common::{Error, StatusMessage};

/// Result type for update operations
pub type UpdateResult<T> = core::result::Result<T, UpdateError>;

/// Error kind plus bounded detail message
#[derive(Clone, PartialEq, Eq)]
pub struct UpdateError {
    kind: Error,
    message: StatusMessage,
}

impl UpdateError {
    /// Create an error with a fixed message
    #[must_use]
    pub fn new(kind: Error, message: &str) -> Self {
        Self {
            kind,
            message: StatusMessage::from(message),
        }
    }

    /// Create an error with a formatted message
    #[must_use]
    pub fn with_fmt(kind: Error, args: fmt::Arguments<'_>) -> Self {
        Self {
            kind,
            message: StatusMessage::from_fmt(args),
        }
    }

    /// Error kind
    #[must_use]
    pub const fn kind(&self) -> Error {
        self.kind
    }

    /// Detail message
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Status message form of the detail
    #[must_use]
    pub fn status(&self) -> &StatusMessage {
        &self.message
    }

    /// Whether this error ended the session it was raised in
    #[must_use]
    pub const fn is_session_fatal(&self) -> bool {
        self.kind.is_session_fatal()
    }
}

impl From<Error> for UpdateError {
    fn from(kind: Error) -> Self {
        Self::new(kind, kind.description())
    }
}

impl From<ota_hal::HalError> for UpdateError {
    fn from(e: ota_hal::HalError) -> Self {
        Self::with_fmt(Error::from(e), format_args!("flash: {}", e.description()))
    }
}

impl fmt::Debug for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UpdateError({:?}: {:?})", self.kind, self.message.as_str())
    }
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for UpdateError {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}: {}", self.kind, self.message.as_str());
    }
}
