// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Error types for the OTA update engine
//!
//! This module defines the unified error kind used by every crate in the
//! workspace. Kinds are `Copy`, carry a stable numeric code, and never
//! allocate; human-readable detail travels next to the kind (see
//! `ota_update::UpdateError`), not inside it.

use core::fmt;

/// Result type alias for OTA engine operations
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error kind for the OTA engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Manifest Errors (0x01xx)
    // =========================================================================
    /// Part descriptor is malformed or missing a required field
    InvalidManifest,
    /// Summed part sizes do not fit the staging region
    CapacityExceeded,

    // =========================================================================
    // Session Errors (0x02xx)
    // =========================================================================
    /// Another update session is already open
    SessionBusy,
    /// Handle does not refer to the open session
    InvalidSession,
    /// Operation is not valid in the current phase
    InvalidState,

    // =========================================================================
    // File Errors (0x03xx)
    // =========================================================================
    /// Accumulated content checksum (or size) does not match the manifest
    ChecksumMismatch,
    /// Destination class is not supported on this device
    UnsupportedFile,
    /// Underlying flash write failed while streaming a file
    WriteFailed,

    // =========================================================================
    // Persistent State Errors (0x04xx)
    // =========================================================================
    /// Cross-file validation failed
    FinalizeFailed,
    /// Boot record could not be persisted during apply
    ApplyFailed,
    /// Boot record could not be persisted during commit/revert/boot accounting
    BootRecordFailed,
    /// Neither boot record copy is valid
    RecordCorrupted,

    // =========================================================================
    // Flash Errors (0x08xx)
    // =========================================================================
    /// Generic flash operation failure
    FlashError,
    /// Flash address outside the device or the configured region
    FlashOutOfBounds,
    /// Flash is locked against programming
    FlashLocked,

    // =========================================================================
    // General Errors (0xFFxx)
    // =========================================================================
    /// Bounded text would have to be truncated
    NameTooLong,
    /// Invalid parameter provided
    InvalidParameter,
    /// Fixed-capacity collection is full
    BufferTooSmall,
    /// Internal error (should not occur)
    InternalError,
}

impl Error {
    /// Get the error code for this error
    ///
    /// - 0x01xx: Manifest errors
    /// - 0x02xx: Session errors
    /// - 0x03xx: File errors
    /// - 0x04xx: Persistent state errors
    /// - 0x08xx: Flash errors
    /// - 0xFFxx: General errors
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::InvalidManifest => 0x0101,
            Self::CapacityExceeded => 0x0102,

            Self::SessionBusy => 0x0201,
            Self::InvalidSession => 0x0202,
            Self::InvalidState => 0x0203,

            Self::ChecksumMismatch => 0x0301,
            Self::UnsupportedFile => 0x0302,
            Self::WriteFailed => 0x0303,

            Self::FinalizeFailed => 0x0401,
            Self::ApplyFailed => 0x0402,
            Self::BootRecordFailed => 0x0403,
            Self::RecordCorrupted => 0x0404,

            Self::FlashError => 0x0801,
            Self::FlashOutOfBounds => 0x0802,
            Self::FlashLocked => 0x0803,

            Self::NameTooLong => 0xFF01,
            Self::InvalidParameter => 0xFF02,
            Self::BufferTooSmall => 0xFF03,
            Self::InternalError => 0xFFFF,
        }
    }

    /// Whether this error ends the update session it occurred in
    ///
    /// Caller mistakes (stale handle, out-of-order call) leave the session
    /// untouched; content and I/O failures terminate it.
    #[must_use]
    pub const fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch
                | Self::UnsupportedFile
                | Self::WriteFailed
                | Self::FinalizeFailed
                | Self::FlashError
                | Self::FlashOutOfBounds
                | Self::FlashLocked
        )
    }

    /// Whether this error concerns the persisted boot record
    #[must_use]
    pub const fn is_persistent_state_error(&self) -> bool {
        matches!(
            self,
            Self::ApplyFailed | Self::BootRecordFailed | Self::RecordCorrupted
        )
    }

    /// Get a short description of the error
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidManifest => "invalid manifest",
            Self::CapacityExceeded => "staging capacity exceeded",
            Self::SessionBusy => "update session busy",
            Self::InvalidSession => "invalid session handle",
            Self::InvalidState => "invalid state",
            Self::ChecksumMismatch => "checksum mismatch",
            Self::UnsupportedFile => "unsupported file",
            Self::WriteFailed => "write failed",
            Self::FinalizeFailed => "finalize failed",
            Self::ApplyFailed => "apply failed",
            Self::BootRecordFailed => "boot record update failed",
            Self::RecordCorrupted => "boot record corrupted",
            Self::FlashError => "flash error",
            Self::FlashOutOfBounds => "flash address out of bounds",
            Self::FlashLocked => "flash locked",
            Self::NameTooLong => "name too long",
            Self::InvalidParameter => "invalid parameter",
            Self::BufferTooSmall => "buffer too small",
            Self::InternalError => "internal error",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04X}] {}", self.code(), self.description())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "[0x{:04X}] {}", self.code(), self.description());
    }
}
