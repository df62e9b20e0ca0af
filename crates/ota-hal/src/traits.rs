// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! HAL trait definitions
//!
//! The flash driver is an external collaborator: the engine assumes it is
//! correct and bounded, and talks to it only through this trait.

use crate::error::{HalError, HalResult};

/// Flash memory interface
pub trait FlashInterface {
    /// Flash page/sector size in bytes (erase granularity)
    const PAGE_SIZE: usize;

    /// Total flash size in bytes
    const TOTAL_SIZE: usize;

    /// Base address of flash
    const BASE_ADDRESS: u32;

    /// Initialize flash controller
    fn init(&mut self) -> HalResult<()>;

    /// Read data from flash
    ///
    /// # Arguments
    /// * `address` - Absolute flash address
    /// * `buffer` - Buffer to read into
    fn read(&self, address: u32, buffer: &mut [u8]) -> HalResult<()>;

    /// Write data to flash
    ///
    /// # Arguments
    /// * `address` - Absolute flash address (must be aligned to write granularity)
    /// * `data` - Data to write
    ///
    /// # Notes
    /// Flash must be erased before writing.
    fn write(&mut self, address: u32, data: &[u8]) -> HalResult<()>;

    /// Erase the page containing `address`
    fn erase_page(&mut self, address: u32) -> HalResult<()>;

    /// Erase every page overlapping `[start, end)`
    fn erase_range(&mut self, start: u32, end: u32) -> HalResult<()> {
        if start < Self::BASE_ADDRESS {
            return Err(HalError::FlashOutOfBounds);
        }
        let page = Self::PAGE_SIZE as u32;
        let mut addr = start - (start - Self::BASE_ADDRESS) % page;
        while addr < end {
            self.erase_page(addr)?;
            addr += page;
        }
        Ok(())
    }

    /// Verify flash contents match expected data
    fn verify(&self, address: u32, expected: &[u8]) -> HalResult<bool> {
        let mut buffer = [0u8; 256];
        let mut offset = 0;

        while offset < expected.len() {
            let chunk_size = (expected.len() - offset).min(buffer.len());
            self.read(address + offset as u32, &mut buffer[..chunk_size])?;

            if buffer[..chunk_size] != expected[offset..offset + chunk_size] {
                return Ok(false);
            }
            offset += chunk_size;
        }

        Ok(true)
    }

    /// Lock flash region (prevent writes)
    fn lock(&mut self) -> HalResult<()>;

    /// Unlock flash region (allow writes)
    fn unlock(&mut self) -> HalResult<()>;

    /// Check if flash is locked
    fn is_locked(&self) -> bool;
}

impl<T: FlashInterface> FlashInterface for &mut T {
    const PAGE_SIZE: usize = T::PAGE_SIZE;
    const TOTAL_SIZE: usize = T::TOTAL_SIZE;
    const BASE_ADDRESS: u32 = T::BASE_ADDRESS;

    fn init(&mut self) -> HalResult<()> {
        (**self).init()
    }

    fn read(&self, address: u32, buffer: &mut [u8]) -> HalResult<()> {
        (**self).read(address, buffer)
    }

    fn write(&mut self, address: u32, data: &[u8]) -> HalResult<()> {
        (**self).write(address, data)
    }

    fn erase_page(&mut self, address: u32) -> HalResult<()> {
        (**self).erase_page(address)
    }

    fn erase_range(&mut self, start: u32, end: u32) -> HalResult<()> {
        (**self).erase_range(start, end)
    }

    fn verify(&self, address: u32, expected: &[u8]) -> HalResult<bool> {
        (**self).verify(address, expected)
    }

    fn lock(&mut self) -> HalResult<()> {
        (**self).lock()
    }

    fn unlock(&mut self) -> HalResult<()> {
        (**self).unlock()
    }

    fn is_locked(&self) -> bool {
        (**self).is_locked()
    }
}
