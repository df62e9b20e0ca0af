// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! HAL error types

use core::fmt;

/// HAL error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// Hardware not initialized
    NotInitialized,
    /// Flash operation failed
    FlashError,
    /// Flash is locked
    FlashLocked,
    /// Flash address out of bounds
    FlashOutOfBounds,
    /// Flash erase failed
    FlashEraseFailed,
    /// Flash write failed
    FlashWriteFailed,
    /// Flash verify failed
    FlashVerifyFailed,
    /// Flash operation timeout
    FlashTimeout,
    /// Invalid parameter (e.g. misaligned address)
    InvalidParameter,
    /// Hardware busy
    Busy,
    /// Operation not supported
    NotSupported,
}

impl HalError {
    /// Get error code
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::NotInitialized => 0x0801,
            Self::FlashError => 0x0810,
            Self::FlashLocked => 0x0811,
            Self::FlashOutOfBounds => 0x0812,
            Self::FlashEraseFailed => 0x0813,
            Self::FlashWriteFailed => 0x0814,
            Self::FlashVerifyFailed => 0x0815,
            Self::FlashTimeout => 0x0816,
            Self::InvalidParameter => 0x08F0,
            Self::Busy => 0x08F2,
            Self::NotSupported => 0x08FF,
        }
    }

    /// Get error description
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::NotInitialized => "not initialized",
            Self::FlashError => "flash error",
            Self::FlashLocked => "flash locked",
            Self::FlashOutOfBounds => "flash address out of bounds",
            Self::FlashEraseFailed => "flash erase failed",
            Self::FlashWriteFailed => "flash write failed",
            Self::FlashVerifyFailed => "flash verify failed",
            Self::FlashTimeout => "flash operation timeout",
            Self::InvalidParameter => "invalid parameter",
            Self::Busy => "busy",
            Self::NotSupported => "not supported",
        }
    }
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04X}] {}", self.code(), self.description())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for HalError {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "[0x{:04X}] {}", self.code(), self.description());
    }
}

impl From<HalError> for ota_common::Error {
    fn from(e: HalError) -> Self {
        match e {
            HalError::FlashLocked => Self::FlashLocked,
            HalError::FlashOutOfBounds => Self::FlashOutOfBounds,
            HalError::FlashWriteFailed | HalError::FlashVerifyFailed => Self::WriteFailed,
            HalError::NotInitialized
            | HalError::FlashError
            | HalError::FlashEraseFailed
            | HalError::FlashTimeout
            | HalError::Busy => Self::FlashError,
            HalError::InvalidParameter => Self::InvalidParameter,
            HalError::NotSupported => Self::InternalError,
        }
    }
}

/// HAL Result type
pub type HalResult<T> = Result<T, HalError>;
