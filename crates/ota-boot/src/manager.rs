// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Boot manager
//!
//! # Trial boots
//!
//! After an update is applied the boot record holds a pending candidate
//! with zero attempts. Each boot through [`BootManager::select_boot_slot`]
//! either counts one more attempt and boots the candidate, or, once the
//! count reached `max_boot_attempts`, reverts and boots the previous slot.
//! With a threshold of 3 the candidate gets three trial boots; the fourth
//! boot reverts.
//!
//! ```text
//!            apply
//!              │
//!              ▼
//!   ┌──── pending, attempts < max ────┐
//!   │          │ select: attempt+1    │ confirm(healthy)
//!   │          ▼                      ▼
//!   │   boot candidate ──────────► commit
//!   │          │ confirm(unhealthy)
//!   ▼          ▼
//! attempts == max ──► revert ──► boot previous slot
//! ```

use ota_common::log::{LogBuffer, Sequence};
use ota_common::{log_debug, log_error, log_info, log_warn, BootConfig, Error, FlashLayout, Region, Slot};
use ota_hal::FlashInterface;
use ota_update::{BootRecord, BootRecordStore};

use crate::health::{HealthCheck, RevertReason};

/// Log module name
const MODULE: &str = "boot";

/// Slot chosen for this boot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootSelection {
    /// No update pending; boot the committed slot
    Active {
        /// Slot to boot
        slot: Slot,
        /// Its flash region
        region: Region,
    },
    /// Trial boot of a pending candidate
    Trial {
        /// Candidate slot
        slot: Slot,
        /// Its flash region
        region: Region,
        /// Attempt number, starting at 1
        attempt: u8,
    },
    /// Candidate dropped; boot the previous slot
    Reverted {
        /// Slot to boot
        slot: Slot,
        /// Its flash region
        region: Region,
        /// Why the candidate was dropped
        reason: RevertReason,
    },
}

impl BootSelection {
    /// Slot to boot
    #[must_use]
    pub const fn slot(&self) -> Slot {
        match self {
            Self::Active { slot, .. } | Self::Trial { slot, .. } | Self::Reverted { slot, .. } => *slot,
        }
    }

    /// Flash region of the slot to boot
    #[must_use]
    pub const fn region(&self) -> Region {
        match self {
            Self::Active { region, .. }
            | Self::Trial { region, .. }
            | Self::Reverted { region, .. } => *region,
        }
    }

    /// Whether this boot runs an unconfirmed candidate
    #[must_use]
    pub const fn is_trial(&self) -> bool {
        matches!(self, Self::Trial { .. })
    }
}

/// Result of [`BootManager::confirm`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// Nothing was pending; record untouched
    NothingPending,
    /// Candidate is now the active slot
    Committed(Slot),
    /// Candidate dropped; `slot` stays active
    Reverted {
        /// Slot that stays active
        slot: Slot,
        /// Why
        reason: RevertReason,
    },
}

/// Boot-time owner of the boot record
pub struct BootManager<F: FlashInterface> {
    flash: F,
    layout: FlashLayout,
    config: BootConfig,
    store: BootRecordStore,
    log: LogBuffer,
    seq: Sequence,
}

impl<F: FlashInterface> BootManager<F> {
    /// Load the boot record
    ///
    /// Torn copies are repaired; a blank device gets the factory record.
    pub fn open(mut flash: F, layout: &FlashLayout, config: BootConfig) -> Result<Self, Error> {
        layout.validate(F::PAGE_SIZE as u32)?;
        if config.max_boot_attempts == 0 || config.record_write_retries == 0 {
            return Err(Error::InvalidParameter);
        }
        let (store, report) = BootRecordStore::open(&mut flash, layout, config.record_write_retries)?;

        let mut manager = Self {
            flash,
            layout: *layout,
            config,
            store,
            log: LogBuffer::new(),
            seq: Sequence::new(),
        };
        log_debug!(
            manager.log,
            manager.seq.tick(),
            MODULE,
            "record gen {} from {:?}",
            manager.store.record().generation,
            report.source
        );
        if report.repair_failed {
            log_warn!(manager.log, manager.seq.tick(), MODULE, "record copy repair failed");
        }
        Ok(manager)
    }

    /// Boot record as loaded or last written
    #[must_use]
    pub fn record(&self) -> &BootRecord {
        self.store.record()
    }

    /// Committed slot
    #[must_use]
    pub fn active_slot(&self) -> Slot {
        self.store.active_slot()
    }

    /// Event log
    #[must_use]
    pub fn log(&self) -> &LogBuffer {
        &self.log
    }

    /// Flash driver
    #[must_use]
    pub fn flash(&self) -> &F {
        &self.flash
    }

    /// Flash driver, mutable (diagnostics and fault injection)
    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Give the flash driver back
    pub fn release(self) -> F {
        self.flash
    }

    /// Pick the slot for this boot, once per boot before the jump
    ///
    /// Counting a trial boot is persisted before the candidate is returned.
    /// If that write fails the error is returned and the caller should boot
    /// [`active_slot`](Self::active_slot).
    pub fn select_boot_slot(&mut self) -> Result<BootSelection, Error> {
        let record = *self.store.record();
        let candidate = match record.candidate {
            Some(candidate) if record.commit_pending => candidate,
            _ => {
                let slot = record.active;
                log_info!(self.log, self.seq.tick(), MODULE, "booting slot {}", slot);
                return Ok(BootSelection::Active {
                    slot,
                    region: self.layout.slot(slot),
                });
            }
        };

        if record.boot_attempts >= self.config.max_boot_attempts {
            return self.revert(RevertReason::AttemptsExhausted).map(|slot| BootSelection::Reverted {
                slot,
                region: self.layout.slot(slot),
                reason: RevertReason::AttemptsExhausted,
            });
        }

        match self.store.record_boot_attempt(&mut self.flash) {
            Ok(attempt) => {
                log_info!(
                    self.log,
                    self.seq.tick(),
                    MODULE,
                    "trial boot {}/{} of slot {}",
                    attempt,
                    self.config.max_boot_attempts,
                    candidate
                );
                Ok(BootSelection::Trial {
                    slot: candidate,
                    region: self.layout.slot(candidate),
                    attempt,
                })
            }
            Err(e) => {
                log_error!(self.log, self.seq.tick(), MODULE, "attempt not recorded: {}", e);
                Err(e)
            }
        }
    }

    /// Keep or drop the running candidate based on `check`
    ///
    /// No-op when nothing is pending; the check is not consulted.
    pub fn confirm<H: HealthCheck + ?Sized>(&mut self, check: &mut H) -> Result<BootOutcome, Error> {
        let Some(candidate) = self.store.record().candidate.filter(|_| self.store.commit_pending()) else {
            log_debug!(self.log, self.seq.tick(), MODULE, "confirm: nothing pending");
            return Ok(BootOutcome::NothingPending);
        };

        if check.is_healthy() {
            self.store.commit(&mut self.flash).map_err(|e| {
                log_error!(self.log, self.seq.tick(), MODULE, "commit failed: {}", e);
                e
            })?;
            log_info!(self.log, self.seq.tick(), MODULE, "slot {} committed", candidate);
            Ok(BootOutcome::Committed(candidate))
        } else {
            let slot = self.revert(RevertReason::HealthCheckFailed)?;
            Ok(BootOutcome::Reverted {
                slot,
                reason: RevertReason::HealthCheckFailed,
            })
        }
    }

    /// Drop the candidate and return the slot that stays active
    fn revert(&mut self, reason: RevertReason) -> Result<Slot, Error> {
        let candidate = self.store.record().candidate;
        match self.store.revert(&mut self.flash) {
            Ok(_) => {
                let slot = self.store.active_slot();
                log_warn!(
                    self.log,
                    self.seq.tick(),
                    MODULE,
                    "{}: reverted {:?}, booting slot {}",
                    reason,
                    candidate,
                    slot
                );
                Ok(slot)
            }
            Err(e) => {
                log_error!(self.log, self.seq.tick(), MODULE, "revert failed: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ota_common::SlotState;
    use ota_hal::sim::{RamFlash, SIM_LAYOUT};

    /// Blank device with slot B applied as candidate
    fn pending_flash() -> RamFlash {
        let mut flash = RamFlash::new();
        let (mut store, _) = BootRecordStore::open(&mut flash, &SIM_LAYOUT, 3).unwrap();
        store.apply(&mut flash, Slot::B).unwrap();
        flash
    }

    fn manager(flash: RamFlash) -> BootManager<RamFlash> {
        BootManager::open(flash, &SIM_LAYOUT, BootConfig::default()).unwrap()
    }

    #[test]
    fn test_no_pending_boots_active() {
        let mut boot = manager(RamFlash::new());
        let selection = boot.select_boot_slot().unwrap();
        assert_eq!(
            selection,
            BootSelection::Active {
                slot: Slot::A,
                region: SIM_LAYOUT.slot_a
            }
        );
        assert_eq!(boot.confirm(&mut || false).unwrap(), BootOutcome::NothingPending);
    }

    #[test]
    fn test_trial_boot_counts_attempt() {
        let mut boot = manager(pending_flash());
        let selection = boot.select_boot_slot().unwrap();
        assert!(selection.is_trial());
        assert_eq!(selection.slot(), Slot::B);
        assert_eq!(selection.region(), SIM_LAYOUT.slot_b);
        assert_eq!(boot.record().boot_attempts, 1);
    }

    #[test]
    fn test_healthy_commits() {
        let mut boot = manager(pending_flash());
        boot.select_boot_slot().unwrap();
        assert_eq!(boot.confirm(&mut || true).unwrap(), BootOutcome::Committed(Slot::B));
        assert_eq!(boot.active_slot(), Slot::B);
        assert_eq!(boot.record().slot_state(Slot::A), SlotState::Empty);
    }

    #[test]
    fn test_unhealthy_reverts() {
        let mut boot = manager(pending_flash());
        boot.select_boot_slot().unwrap();
        assert_eq!(
            boot.confirm(&mut || false).unwrap(),
            BootOutcome::Reverted {
                slot: Slot::A,
                reason: RevertReason::HealthCheckFailed
            }
        );
        assert_eq!(boot.record().slot_state(Slot::B), SlotState::Invalid);
        assert!(boot.log().contains("health check failed"));
    }

    #[test]
    fn test_rejects_zero_threshold() {
        let config = BootConfig {
            max_boot_attempts: 0,
            ..BootConfig::default()
        };
        assert_eq!(
            BootManager::open(RamFlash::new(), &SIM_LAYOUT, config).err(),
            Some(Error::InvalidParameter)
        );
    }

    #[test]
    fn test_attempt_write_failure_is_reported() {
        let mut boot = manager(pending_flash());
        boot.flash_mut().cut_power_after(0);
        assert!(boot.select_boot_slot().is_err());
        assert_eq!(boot.record().boot_attempts, 0);
        assert_eq!(boot.active_slot(), Slot::A);
    }
}
