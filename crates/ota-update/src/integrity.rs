// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Integrity primitives
//!
//! SHA3-256 for image content and the bundle digest, CRC-32 for the boot
//! record tag. The CRC only detects torn or stale writes; it is not a
//! security boundary.

use ota_common::constants::FLASH_IO_CHUNK;
use ota_common::Digest;
use ota_hal::{FlashInterface, HalResult};
use sha3::{Digest as _, Sha3_256};

// ============================================================================
// SHA3-256
// ============================================================================

/// Running SHA3-256 over streamed content
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha3_256,
}

impl ContentHasher {
    /// Start an empty hash
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb `data`
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finish and reset to the empty state
    pub fn finish(&mut self) -> Digest {
        let out = self.inner.finalize_reset();
        let mut bytes = [0u8; Digest::SIZE];
        bytes.copy_from_slice(&out);
        Digest::new(bytes)
    }
}

/// SHA3-256 of a byte slice
#[must_use]
pub fn sha3_256(data: &[u8]) -> Digest {
    let mut hasher = ContentHasher::new();
    hasher.update(data);
    hasher.finish()
}

/// SHA3-256 over the concatenation of part digests, in order
pub fn bundle_digest<'a>(parts: impl IntoIterator<Item = &'a Digest>) -> Digest {
    let mut hasher = ContentHasher::new();
    for digest in parts {
        hasher.update(digest.as_bytes());
    }
    hasher.finish()
}

/// Hash `len` bytes of flash starting at `address`
pub fn hash_flash<F: FlashInterface>(flash: &F, address: u32, len: u32) -> HalResult<Digest> {
    let mut hasher = ContentHasher::new();
    let mut buf = [0u8; FLASH_IO_CHUNK];
    let mut done = 0u32;

    while done < len {
        let n = ((len - done) as usize).min(buf.len());
        flash.read(address + done, &mut buf[..n])?;
        hasher.update(&buf[..n]);
        done += n as u32;
    }

    Ok(hasher.finish())
}

/// Decode a hex-encoded SHA3-256 digest
///
/// Accepts upper or lower case; anything other than exactly 64 hex digits
/// is rejected.
#[must_use]
pub fn parse_digest(text: &str) -> Option<Digest> {
    let mut bytes = [0u8; Digest::SIZE];
    hex::decode_to_slice(text, &mut bytes).ok()?;
    Some(Digest::new(bytes))
}

// ============================================================================
// CRC-32
// ============================================================================

/// Compute CRC32 (IEEE 802.3 polynomial)
#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = generate_crc32_table();

    let mut crc = 0xFFFF_FFFFu32;

    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }

    !crc
}

/// Generate CRC32 lookup table at compile time
const fn generate_crc32_table() -> [u32; 256] {
    const POLYNOMIAL: u32 = 0xEDB8_8320;
    let mut table = [0u32; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLYNOMIAL;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }

    table
}
