// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Compile-time limits for the OTA engine
//!
//! Every collection in the engine is fixed-capacity; these constants size
//! them. Changing one changes RAM usage, not behavior.

// =============================================================================
// Manifest Limits
// =============================================================================

/// Maximum length of a part name in bytes
pub const MAX_FILE_NAME_LEN: usize = 49;

/// Maximum length of a part type tag in bytes
pub const MAX_PART_TYPE_LEN: usize = 16;

/// Maximum number of parts in one manifest
pub const MAX_PARTS: usize = 16;

/// Maximum number of installed parts tracked for skip decisions
pub const MAX_INSTALLED_PARTS: usize = 16;

/// Maximum length of the manifest version string
pub const MAX_VERSION_LEN: usize = 32;

// =============================================================================
// Digest Constants
// =============================================================================

/// SHA3-256 digest size in bytes
pub const DIGEST_SIZE: usize = 32;

/// Hex-encoded digest length in characters
pub const DIGEST_HEX_LEN: usize = DIGEST_SIZE * 2;

// =============================================================================
// Status and Logging
// =============================================================================

/// Maximum length of a session status message
pub const MAX_STATUS_LEN: usize = 96;

/// Maximum length of a single log message
pub const MAX_LOG_MESSAGE_LEN: usize = 96;

/// Default number of entries retained by a log buffer
pub const LOG_BUFFER_SIZE: usize = 32;

// =============================================================================
// Boot Record
// =============================================================================

/// Encoded boot record size in bytes
pub const BOOT_RECORD_SIZE: usize = 32;

/// Boot record magic: "OTAR"
pub const BOOT_RECORD_MAGIC: u32 = 0x4F54_4152;

/// Boot record format version
pub const BOOT_RECORD_VERSION: u8 = 1;

/// Default boot attempts before an unconfirmed candidate is reverted
pub const DEFAULT_MAX_BOOT_ATTEMPTS: u8 = 3;

/// Default attempts for one redundant boot record write
pub const DEFAULT_RECORD_WRITE_RETRIES: u8 = 3;

// =============================================================================
// Flash
// =============================================================================

/// Value of an erased flash byte
pub const ERASED_BYTE: u8 = 0xFF;

/// Default flash programming granularity in bytes
pub const DEFAULT_WRITE_ALIGN: u32 = 4;

/// Largest supported programming granularity (size of the tail pad buffer)
pub const MAX_WRITE_ALIGN: u32 = 256;

/// Chunk size used when reading back or copying flash contents
pub const FLASH_IO_CHUNK: usize = 256;
