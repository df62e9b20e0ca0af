// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Redundant boot record
//!
//! The only state that crosses a reboot. Two copies live in dedicated
//! flash sectors and every mutation rewrites both:
//!
//! ```text
//!   secondary: erase ─► body ─► tag ─► read back
//!   primary:   erase ─► body ─► tag ─► read back
//! ```
//!
//! The CRC tag is programmed after the body, so a copy torn at any point
//! fails its tag check. On load the primary wins when valid; the secondary
//! is only consulted when the primary is torn, and the losing copy is
//! rewritten from the winner.
//!
//! # Record Layout (32 bytes, little-endian)
//!
//! | Offset | Size | Field                          |
//! |--------|------|--------------------------------|
//! | 0      | 4    | magic `OTAR`                   |
//! | 4      | 1    | format version                 |
//! | 5      | 1    | active slot                    |
//! | 6      | 1    | candidate slot (`0xFF` = none) |
//! | 7      | 1    | commit pending                 |
//! | 8      | 1    | boot attempts                  |
//! | 9      | 2    | slot A / slot B state          |
//! | 11     | 1    | reserved                       |
//! | 12     | 4    | generation                     |
//! | 16     | 12   | reserved                       |
//! | 28     | 4    | CRC-32 of bytes 0..28          |

use ota_common::constants::{BOOT_RECORD_MAGIC, BOOT_RECORD_SIZE, BOOT_RECORD_VERSION};
use ota_common::{Error, FlashLayout, Region, Slot, SlotState};
use ota_hal::FlashInterface;

use crate::integrity::crc32;

/// Bytes covered by the tag
const BODY_LEN: usize = BOOT_RECORD_SIZE - 4;

/// Encoded "no candidate"
const NO_SLOT: u8 = 0xFF;

// ============================================================================
// Boot Record
// ============================================================================

/// Decoded boot record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootRecord {
    /// Slot the device runs from
    pub active: Slot,
    /// Staged slot awaiting its first good boot
    pub candidate: Option<Slot>,
    /// Candidate is on trial
    pub commit_pending: bool,
    /// Boots of the candidate so far
    pub boot_attempts: u8,
    /// Persisted state of slot A and slot B
    pub slot_states: [SlotState; 2],
    /// Incremented on every persisted mutation
    pub generation: u32,
}

impl BootRecord {
    /// Record written when no valid copy exists: slot A active, no candidate
    #[must_use]
    pub const fn factory() -> Self {
        Self {
            active: Slot::A,
            candidate: None,
            commit_pending: false,
            boot_attempts: 0,
            slot_states: [SlotState::Active, SlotState::Empty],
            generation: 0,
        }
    }

    /// Persisted state of `slot`
    #[must_use]
    pub const fn slot_state(&self, slot: Slot) -> SlotState {
        self.slot_states[slot as usize]
    }

    fn set_slot_state(&mut self, slot: Slot, state: SlotState) {
        self.slot_states[slot as usize] = state;
    }

    /// Slot the next boot should try first
    #[must_use]
    pub fn boot_slot(&self) -> Slot {
        match self.candidate {
            Some(candidate) if self.commit_pending => candidate,
            _ => self.active,
        }
    }

    /// Serialize with the tag
    #[must_use]
    pub fn encode(&self) -> [u8; BOOT_RECORD_SIZE] {
        let mut buf = [0u8; BOOT_RECORD_SIZE];
        buf[0..4].copy_from_slice(&BOOT_RECORD_MAGIC.to_le_bytes());
        buf[4] = BOOT_RECORD_VERSION;
        buf[5] = self.active as u8;
        buf[6] = self.candidate.map_or(NO_SLOT, |s| s as u8);
        buf[7] = u8::from(self.commit_pending);
        buf[8] = self.boot_attempts;
        buf[9] = self.slot_states[0] as u8;
        buf[10] = self.slot_states[1] as u8;
        buf[12..16].copy_from_slice(&self.generation.to_le_bytes());
        let tag = crc32(&buf[..BODY_LEN]);
        buf[BODY_LEN..].copy_from_slice(&tag.to_le_bytes());
        buf
    }

    /// Parse and check a stored copy
    ///
    /// Any tag mismatch, unknown field value, or inconsistent combination
    /// yields [`Error::RecordCorrupted`].
    pub fn decode(buf: &[u8; BOOT_RECORD_SIZE]) -> Result<Self, Error> {
        let tag = u32::from_le_bytes([buf[28], buf[29], buf[30], buf[31]]);
        if tag != crc32(&buf[..BODY_LEN]) {
            return Err(Error::RecordCorrupted);
        }
        let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if magic != BOOT_RECORD_MAGIC || buf[4] != BOOT_RECORD_VERSION {
            return Err(Error::RecordCorrupted);
        }

        let active = Slot::from_u8(buf[5]).ok_or(Error::RecordCorrupted)?;
        let candidate = match buf[6] {
            NO_SLOT => None,
            raw => Some(Slot::from_u8(raw).ok_or(Error::RecordCorrupted)?),
        };
        let commit_pending = match buf[7] {
            0 => false,
            1 => true,
            _ => return Err(Error::RecordCorrupted),
        };
        let slot_states = [
            SlotState::from_u8(buf[9]).ok_or(Error::RecordCorrupted)?,
            SlotState::from_u8(buf[10]).ok_or(Error::RecordCorrupted)?,
        ];

        if candidate == Some(active) || (commit_pending && candidate.is_none()) {
            return Err(Error::RecordCorrupted);
        }

        Ok(Self {
            active,
            candidate,
            commit_pending,
            boot_attempts: buf[8],
            slot_states,
            generation: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
        })
    }
}

impl Default for BootRecord {
    fn default() -> Self {
        Self::factory()
    }
}

// ============================================================================
// Store
// ============================================================================

/// Which copy supplied the record at open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
    /// Primary copy was valid
    Primary,
    /// Primary was torn; secondary used
    Secondary,
    /// Neither copy valid; factory record written
    Factory,
}

/// What happened while opening the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenReport {
    /// Copy that won
    pub source: RecordSource,
    /// A diverging or torn copy was rewritten
    pub repaired: bool,
    /// Repair was needed but failed; the winner is still in use
    pub repair_failed: bool,
}

/// Persistent boot record with redundant copies
///
/// Holds the in-memory view; flash is passed to each operation so the
/// owner decides who holds the driver.
#[derive(Debug, Clone)]
pub struct BootRecordStore {
    primary: Region,
    secondary: Region,
    retries: u8,
    record: BootRecord,
    diverged: bool,
}

impl BootRecordStore {
    /// Load the record, repairing or initializing copies as needed
    pub fn open<F: FlashInterface>(
        flash: &mut F,
        layout: &FlashLayout,
        retries: u8,
    ) -> Result<(Self, OpenReport), Error> {
        let mut store = Self {
            primary: layout.record_primary,
            secondary: layout.record_secondary,
            retries: retries.max(1),
            record: BootRecord::factory(),
            diverged: false,
        };

        let mut primary_raw = [0u8; BOOT_RECORD_SIZE];
        let mut secondary_raw = [0u8; BOOT_RECORD_SIZE];
        flash.read(store.primary.start, &mut primary_raw)?;
        flash.read(store.secondary.start, &mut secondary_raw)?;

        let (source, record, stale) = match (
            BootRecord::decode(&primary_raw),
            BootRecord::decode(&secondary_raw),
        ) {
            (Ok(record), _) => (
                RecordSource::Primary,
                record,
                (secondary_raw != primary_raw).then_some(store.secondary),
            ),
            (Err(_), Ok(record)) => (RecordSource::Secondary, record, Some(store.primary)),
            (Err(_), Err(_)) => {
                store.persist(flash, BootRecord::factory(), Error::RecordCorrupted)?;
                let report = OpenReport {
                    source: RecordSource::Factory,
                    repaired: true,
                    repair_failed: false,
                };
                return Ok((store, report));
            }
        };

        store.record = record;
        let mut report = OpenReport {
            source,
            repaired: false,
            repair_failed: false,
        };
        if let Some(region) = stale {
            let bytes = record.encode();
            match store.write_with_retries(flash, region, &bytes) {
                Ok(()) => report.repaired = true,
                Err(_) => report.repair_failed = true,
            }
        }
        Ok((store, report))
    }

    /// Current record
    #[must_use]
    pub const fn record(&self) -> &BootRecord {
        &self.record
    }

    /// Slot the running firmware lives in
    #[must_use]
    pub const fn active_slot(&self) -> Slot {
        self.record.active
    }

    /// Whether a candidate awaits commit
    #[must_use]
    pub const fn commit_pending(&self) -> bool {
        self.record.commit_pending
    }

    /// A failed write may have left a copy that a reboot would load
    /// instead of [`record`](Self::record)
    ///
    /// Cleared by the next successful write or by reopening the store.
    #[must_use]
    pub const fn is_diverged(&self) -> bool {
        self.diverged
    }

    /// Point the next boot at `candidate`
    ///
    /// The candidate becomes `Staged`, pending with zero attempts. Fails
    /// with [`Error::ApplyFailed`] when the record cannot be persisted.
    pub fn apply<F: FlashInterface>(&mut self, flash: &mut F, candidate: Slot) -> Result<(), Error> {
        if candidate == self.record.active {
            return Err(Error::InvalidParameter);
        }
        if self.record.commit_pending {
            return Err(Error::InvalidState);
        }
        let mut next = self.record;
        next.candidate = Some(candidate);
        next.commit_pending = true;
        next.boot_attempts = 0;
        next.set_slot_state(candidate, SlotState::Staged);
        self.persist(flash, next, Error::ApplyFailed)
    }

    /// Make the candidate permanent
    ///
    /// Returns `false` (and writes nothing) when no commit is pending.
    pub fn commit<F: FlashInterface>(&mut self, flash: &mut F) -> Result<bool, Error> {
        let Some(candidate) = self.pending_candidate() else {
            return Ok(false);
        };
        let previous = self.record.active;
        let mut next = self.record;
        next.active = candidate;
        next.candidate = None;
        next.commit_pending = false;
        next.boot_attempts = 0;
        next.set_slot_state(candidate, SlotState::Active);
        next.set_slot_state(previous, SlotState::Empty);
        self.persist(flash, next, Error::BootRecordFailed)?;
        Ok(true)
    }

    /// Drop the candidate and keep the previous active slot
    ///
    /// The candidate is marked `Invalid` so it is not retried. Returns
    /// `false` (and writes nothing) when no commit is pending.
    pub fn revert<F: FlashInterface>(&mut self, flash: &mut F) -> Result<bool, Error> {
        let Some(candidate) = self.pending_candidate() else {
            return Ok(false);
        };
        let mut next = self.record;
        next.candidate = None;
        next.commit_pending = false;
        next.boot_attempts = 0;
        next.set_slot_state(candidate, SlotState::Invalid);
        self.persist(flash, next, Error::BootRecordFailed)?;
        Ok(true)
    }

    /// Count one boot of the pending candidate and persist it
    pub fn record_boot_attempt<F: FlashInterface>(&mut self, flash: &mut F) -> Result<u8, Error> {
        if self.pending_candidate().is_none() {
            return Err(Error::InvalidState);
        }
        let mut next = self.record;
        next.boot_attempts = next.boot_attempts.saturating_add(1);
        self.persist(flash, next, Error::BootRecordFailed)?;
        Ok(self.record.boot_attempts)
    }

    fn pending_candidate(&self) -> Option<Slot> {
        if self.record.commit_pending {
            self.record.candidate
        } else {
            None
        }
    }

    /// Write `next` to both copies; the in-memory view changes only on success
    ///
    /// When the primary copy fails after the secondary took `next`, the
    /// secondary is rolled back to the current record so a reboot loads
    /// what the caller was told. If that also fails the store is marked
    /// [`diverged`](Self::is_diverged).
    fn persist<F: FlashInterface>(
        &mut self,
        flash: &mut F,
        mut next: BootRecord,
        failure: Error,
    ) -> Result<(), Error> {
        next.generation = self.record.generation.wrapping_add(1);
        let bytes = next.encode();

        for _ in 0..self.retries {
            // Primary untouched when the secondary fails
            if write_copy(flash, self.secondary, &bytes).is_err() {
                continue;
            }
            if write_copy(flash, self.primary, &bytes).is_ok() {
                self.record = next;
                self.diverged = false;
                return Ok(());
            }
            let current = self.record.encode();
            if self.write_with_retries(flash, self.secondary, &current).is_err() {
                self.diverged = true;
                return Err(failure);
            }
        }
        Err(failure)
    }

    fn write_with_retries<F: FlashInterface>(
        &self,
        flash: &mut F,
        region: Region,
        bytes: &[u8; BOOT_RECORD_SIZE],
    ) -> Result<(), Error> {
        let mut last = Error::BootRecordFailed;
        for _ in 0..self.retries {
            match write_copy(flash, region, bytes) {
                Ok(()) => return Ok(()),
                Err(e) => last = e,
            }
        }
        Err(last)
    }
}

/// Erase one copy, program body then tag, read back
fn write_copy<F: FlashInterface>(
    flash: &mut F,
    region: Region,
    bytes: &[u8; BOOT_RECORD_SIZE],
) -> Result<(), Error> {
    flash.erase_range(region.start, region.start + BOOT_RECORD_SIZE as u32)?;
    flash.write(region.start, &bytes[..BODY_LEN])?;
    flash.write(region.start + BODY_LEN as u32, &bytes[BODY_LEN..])?;

    let mut check = [0u8; BOOT_RECORD_SIZE];
    flash.read(region.start, &mut check)?;
    if check != *bytes {
        return Err(Error::WriteFailed);
    }
    Ok(())
}
