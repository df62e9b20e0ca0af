// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Host-side NOR flash simulator
//!
//! [`RamFlash`] models a small NOR device in RAM: erased bytes are `0xFF`,
//! programming ANDs data into the cell array, erase works per page. Tests
//! use it to inject the failures the engine must survive:
//!
//! - [`RamFlash::cut_power_after`]: after `n` more mutating operations
//!   every erase/write is silently refused, as if power dropped. Call
//!   [`RamFlash::restore_power`] and re-open the engine to "reboot".
//! - [`RamFlash::fail_writes_in`]: persistent write fault in an address
//!   range (a worn-out sector).
//! - [`RamFlash::fail_next_writes`]: transient faults on the next `n`
//!   writes.

use alloc::vec;
use alloc::vec::Vec;
use core::ops::Range;

use ota_common::types::Region;
use ota_common::FlashLayout;

use crate::error::{HalError, HalResult};
use crate::traits::FlashInterface;

/// Simulated flash base address
pub const SIM_BASE: u32 = 0x0800_0000;

/// Simulated page size
pub const SIM_PAGE_SIZE: usize = 1024;

/// Simulated device size
pub const SIM_TOTAL_SIZE: usize = 256 * 1024;

/// Layout sized for the simulator: two 1 KiB record pages, two 64 KiB slots
pub const SIM_LAYOUT: FlashLayout = FlashLayout {
    record_primary: Region::new(SIM_BASE, 0x400),
    record_secondary: Region::new(SIM_BASE + 0x400, 0x400),
    slot_a: Region::new(SIM_BASE + 0x1000, 0x1_0000),
    slot_b: Region::new(SIM_BASE + 0x1_1000, 0x1_0000),
};

/// Operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlashStats {
    /// Successful write calls
    pub writes: u32,
    /// Successful page erases
    pub erases: u32,
    /// Bytes programmed
    pub bytes_written: u64,
}

/// RAM-backed NOR flash
pub struct RamFlash {
    cells: Vec<u8>,
    initialized: bool,
    locked: bool,
    /// Mutating operations still allowed before the simulated power loss
    power_budget: Option<u32>,
    faulty: Option<Range<u32>>,
    transient_faults: u32,
    stats: FlashStats,
}

impl RamFlash {
    /// Create an erased, initialized, unlocked device
    #[must_use]
    pub fn new() -> Self {
        Self {
            cells: vec![0xFF; SIM_TOTAL_SIZE],
            initialized: true,
            locked: false,
            power_budget: None,
            faulty: None,
            transient_faults: 0,
            stats: FlashStats::default(),
        }
    }

    /// Allow `ops` more erase/write operations, then drop power
    pub fn cut_power_after(&mut self, ops: u32) {
        self.power_budget = Some(ops);
    }

    /// Whether the simulated power loss has happened
    #[must_use]
    pub fn is_powered_off(&self) -> bool {
        self.power_budget == Some(0)
    }

    /// Power back on; flash contents are whatever landed before the cut
    pub fn restore_power(&mut self) {
        self.power_budget = None;
    }

    /// Make every write touching `range` fail
    pub fn fail_writes_in(&mut self, range: Range<u32>) {
        self.faulty = Some(range);
    }

    /// Fail the next `count` writes, then recover
    pub fn fail_next_writes(&mut self, count: u32) {
        self.transient_faults = count;
    }

    /// Remove injected write faults
    pub fn clear_faults(&mut self) {
        self.faulty = None;
        self.transient_faults = 0;
    }

    /// Operation counters
    #[must_use]
    pub fn stats(&self) -> FlashStats {
        self.stats
    }

    /// Borrow raw cells of `[address, address + len)`
    ///
    /// # Panics
    /// Panics if the span is outside the device.
    #[must_use]
    pub fn peek(&self, address: u32, len: usize) -> &[u8] {
        let start = (address - SIM_BASE) as usize;
        &self.cells[start..start + len]
    }

    /// Overwrite raw cells, bypassing NOR semantics (corruption injection)
    ///
    /// # Panics
    /// Panics if the span is outside the device.
    pub fn poke(&mut self, address: u32, data: &[u8]) {
        let start = (address - SIM_BASE) as usize;
        self.cells[start..start + data.len()].copy_from_slice(data);
    }

    fn span(address: u32, len: usize) -> HalResult<Range<usize>> {
        if address < SIM_BASE {
            return Err(HalError::FlashOutOfBounds);
        }
        let start = (address - SIM_BASE) as usize;
        let end = start.checked_add(len).ok_or(HalError::FlashOutOfBounds)?;
        if end > SIM_TOTAL_SIZE {
            return Err(HalError::FlashOutOfBounds);
        }
        Ok(start..end)
    }

    /// Consume one unit of the power budget; `false` means power is gone
    fn take_power(&mut self) -> bool {
        match self.power_budget {
            Some(0) => false,
            Some(ref mut left) => {
                *left -= 1;
                true
            }
            None => true,
        }
    }
}

impl Default for RamFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashInterface for RamFlash {
    const PAGE_SIZE: usize = SIM_PAGE_SIZE;
    const TOTAL_SIZE: usize = SIM_TOTAL_SIZE;
    const BASE_ADDRESS: u32 = SIM_BASE;

    fn init(&mut self) -> HalResult<()> {
        self.initialized = true;
        Ok(())
    }

    fn read(&self, address: u32, buffer: &mut [u8]) -> HalResult<()> {
        if !self.initialized {
            return Err(HalError::NotInitialized);
        }
        let span = Self::span(address, buffer.len())?;
        buffer.copy_from_slice(&self.cells[span]);
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> HalResult<()> {
        if !self.initialized {
            return Err(HalError::NotInitialized);
        }
        if self.locked {
            return Err(HalError::FlashLocked);
        }
        let span = Self::span(address, data.len())?;
        if !self.take_power() {
            return Err(HalError::FlashError);
        }

        if self.transient_faults > 0 {
            self.transient_faults -= 1;
            return Err(HalError::FlashWriteFailed);
        }
        if let Some(faulty) = &self.faulty {
            let end = address + data.len() as u32;
            if address < faulty.end && faulty.start < end {
                return Err(HalError::FlashWriteFailed);
            }
        }

        for (cell, byte) in self.cells[span].iter_mut().zip(data) {
            *cell &= *byte;
        }
        self.stats.writes += 1;
        self.stats.bytes_written += data.len() as u64;
        Ok(())
    }

    fn erase_page(&mut self, address: u32) -> HalResult<()> {
        if !self.initialized {
            return Err(HalError::NotInitialized);
        }
        if self.locked {
            return Err(HalError::FlashLocked);
        }
        let offset = Self::span(address, 1)?.start;
        if !self.take_power() {
            return Err(HalError::FlashError);
        }

        let page_start = offset - offset % SIM_PAGE_SIZE;
        self.cells[page_start..page_start + SIM_PAGE_SIZE].fill(0xFF);
        self.stats.erases += 1;
        Ok(())
    }

    fn lock(&mut self) -> HalResult<()> {
        self.locked = true;
        Ok(())
    }

    fn unlock(&mut self) -> HalResult<()> {
        self.locked = false;
        Ok(())
    }

    fn is_locked(&self) -> bool {
        self.locked
    }
}
