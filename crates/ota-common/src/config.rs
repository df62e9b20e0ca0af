// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Configuration for the OTA engine
//!
//! All configuration is `const`-constructible so a board can bake it into
//! the image. Boot-attempt threshold and health policy are deliberately
//! configuration, not engine logic.

use crate::constants::{
    BOOT_RECORD_SIZE, DEFAULT_MAX_BOOT_ATTEMPTS, DEFAULT_RECORD_WRITE_RETRIES, DEFAULT_WRITE_ALIGN,
    MAX_WRITE_ALIGN,
};
use crate::errors::Error;
use crate::types::{DestinationClasses, Region, Slot};

/// Flash base address of the default layout
const FLASH_BASE: u32 = 0x0800_0000;

/// Bootloader size (not managed by the engine)
const BOOTLOADER_SIZE: u32 = 64 * 1024;

/// Sector reserved for each boot record copy
const RECORD_SECTOR_SIZE: u32 = 4 * 1024;

/// Single firmware slot size
const SLOT_SIZE: u32 = 448 * 1024;

/// Physical placement of everything the engine touches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashLayout {
    /// Primary boot record copy (written second, read first)
    pub record_primary: Region,
    /// Secondary boot record copy (written first)
    pub record_secondary: Region,
    /// Firmware slot A
    pub slot_a: Region,
    /// Firmware slot B
    pub slot_b: Region,
}

impl FlashLayout {
    /// Default layout: bootloader, two record sectors, two equal slots
    pub const DEFAULT: Self = Self {
        record_primary: Region::new(FLASH_BASE + BOOTLOADER_SIZE, RECORD_SECTOR_SIZE),
        record_secondary: Region::new(
            FLASH_BASE + BOOTLOADER_SIZE + RECORD_SECTOR_SIZE,
            RECORD_SECTOR_SIZE,
        ),
        slot_a: Region::new(FLASH_BASE + 2 * BOOTLOADER_SIZE, SLOT_SIZE),
        slot_b: Region::new(FLASH_BASE + 2 * BOOTLOADER_SIZE + SLOT_SIZE, SLOT_SIZE),
    };

    /// Region backing a firmware slot
    #[must_use]
    pub const fn slot(&self, slot: Slot) -> Region {
        match slot {
            Slot::A => self.slot_a,
            Slot::B => self.slot_b,
        }
    }

    /// Check the layout against the flash page size
    ///
    /// Every region must start on a page boundary, slots must span whole
    /// pages, record sectors must hold a record, and no two regions may
    /// overlap.
    pub fn validate(&self, page_size: u32) -> Result<(), Error> {
        if page_size == 0 || !page_size.is_power_of_two() {
            return Err(Error::InvalidParameter);
        }

        let regions = [
            self.record_primary,
            self.record_secondary,
            self.slot_a,
            self.slot_b,
        ];

        for region in &regions {
            if region.start % page_size != 0 || region.size == 0 {
                return Err(Error::InvalidParameter);
            }
            if region.start.checked_add(region.size).is_none() {
                return Err(Error::FlashOutOfBounds);
            }
        }

        if (self.record_primary.size as usize) < BOOT_RECORD_SIZE
            || (self.record_secondary.size as usize) < BOOT_RECORD_SIZE
        {
            return Err(Error::InvalidParameter);
        }

        if self.slot_a.size % page_size != 0 || self.slot_b.size % page_size != 0 {
            return Err(Error::InvalidParameter);
        }

        for (i, a) in regions.iter().enumerate() {
            for b in &regions[i + 1..] {
                if a.overlaps(b) {
                    return Err(Error::InvalidParameter);
                }
            }
        }

        Ok(())
    }
}

impl Default for FlashLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Update session configuration
#[derive(Debug, Clone, Copy)]
pub struct UpdateConfig {
    /// Flash programming granularity in bytes (power of two)
    pub write_align: u32,
    /// Destination classes this device installs
    pub supported_classes: DestinationClasses,
    /// Platform tag a manifest must match (empty accepts any)
    pub platform: &'static str,
    /// Reject manifests that do not declare a bundle checksum
    pub require_bundle_checksum: bool,
    /// Re-hash staged parts from flash during finalize
    pub verify_staged: bool,
    /// Attempts for one redundant boot record write during apply
    pub record_write_retries: u8,
}

impl UpdateConfig {
    /// Default update configuration
    pub const DEFAULT: Self = Self {
        write_align: DEFAULT_WRITE_ALIGN,
        supported_classes: DestinationClasses::FIRMWARE.union(DestinationClasses::DATA),
        platform: "",
        require_bundle_checksum: false,
        verify_staged: true,
        record_write_retries: DEFAULT_RECORD_WRITE_RETRIES,
    };

    /// Validate against the flash page size
    pub fn validate(&self, page_size: u32) -> Result<(), Error> {
        if self.write_align == 0
            || !self.write_align.is_power_of_two()
            || self.write_align > page_size
            || self.write_align > MAX_WRITE_ALIGN
        {
            return Err(Error::InvalidParameter);
        }
        if self.record_write_retries == 0 {
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Boot-time policy
#[derive(Debug, Clone, Copy)]
pub struct BootConfig {
    /// Boots a candidate gets before it is reverted automatically
    pub max_boot_attempts: u8,
    /// Attempts for one redundant boot record write
    pub record_write_retries: u8,
}

impl BootConfig {
    /// Default boot configuration
    pub const DEFAULT: Self = Self {
        max_boot_attempts: DEFAULT_MAX_BOOT_ATTEMPTS,
        record_write_retries: DEFAULT_RECORD_WRITE_RETRIES,
    };
}

impl Default for BootConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Copy)]
pub struct SystemConfig {
    /// Flash layout
    pub layout: FlashLayout,
    /// Update session configuration
    pub update: UpdateConfig,
    /// Boot-time configuration
    pub boot: BootConfig,
}

impl SystemConfig {
    /// Default configuration
    pub const DEFAULT: Self = Self {
        layout: FlashLayout::DEFAULT,
        update: UpdateConfig::DEFAULT,
        boot: BootConfig::DEFAULT,
    };

    /// Validate every section against the flash page size
    pub fn validate(&self, page_size: u32) -> Result<(), Error> {
        self.layout.validate(page_size)?;
        self.update.validate(page_size)?;
        if self.boot.max_boot_attempts == 0 || self.boot.record_write_retries == 0 {
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
