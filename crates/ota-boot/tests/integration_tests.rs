// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Integration tests for ota-boot
//!
//! Update sessions followed by simulated reboots: trial boots, automatic
//! revert at the attempt threshold, health-driven commit and revert, and
//! power loss while the attempt counter is written.

use ota_boot::{BootManager, BootOutcome, BootSelection, RevertReason};
use ota_common::{BootConfig, Slot, SlotState, SystemConfig};
use ota_hal::sim::{RamFlash, SIM_LAYOUT};
use ota_update::integrity::sha3_256;
use ota_update::{Decision, Manifest, PartDescriptor, Updater};

fn config() -> SystemConfig {
    SystemConfig {
        layout: SIM_LAYOUT,
        ..SystemConfig::default()
    }
}

/// Stage and apply a one-part update, return the flash
fn applied(flash: RamFlash) -> RamFlash {
    let data: Vec<u8> = (0..700u32).map(|i| (i % 251) as u8).collect();
    let checksum = sha3_256(&data).to_string();
    let parts = [PartDescriptor::new("app.bin", "app", data.len() as u32, &checksum)];
    let manifest = Manifest::from_parts(&parts).unwrap();

    let mut u = Updater::open(flash, &config()).unwrap();
    let h = u.begin(&manifest).unwrap();
    assert_eq!(u.file_begin(h, "app.bin").unwrap(), Decision::Process);
    let n = u.file_data(h, "app.bin", &data).unwrap();
    u.file_end(h, "app.bin", &data[n..]).unwrap();
    u.finalize(h).unwrap();
    u.apply(h).unwrap();
    u.release()
}

fn boot(flash: RamFlash, max_attempts: u8) -> BootManager<RamFlash> {
    let config = BootConfig {
        max_boot_attempts: max_attempts,
        ..BootConfig::default()
    };
    BootManager::open(flash, &SIM_LAYOUT, config).unwrap()
}

mod threshold_tests {
    use super::*;

    #[test]
    fn test_fourth_boot_reverts_with_threshold_three() {
        let mut flash = applied(RamFlash::new());

        for attempt in 1..=3u8 {
            let mut b = boot(flash, 3);
            let selection = b.select_boot_slot().unwrap();
            assert_eq!(
                selection,
                BootSelection::Trial {
                    slot: Slot::B,
                    region: SIM_LAYOUT.slot_b,
                    attempt
                }
            );
            // Firmware hangs before confirming
            flash = b.release();
        }

        let mut b = boot(flash, 3);
        let selection = b.select_boot_slot().unwrap();
        assert_eq!(
            selection,
            BootSelection::Reverted {
                slot: Slot::A,
                region: SIM_LAYOUT.slot_a,
                reason: RevertReason::AttemptsExhausted
            }
        );
        assert_eq!(b.record().slot_state(Slot::B), SlotState::Invalid);

        // Stays reverted on the next boot
        let mut b = boot(b.release(), 3);
        assert_eq!(b.select_boot_slot().unwrap().slot(), Slot::A);
        assert!(!b.record().commit_pending);
    }

    #[test]
    fn test_commit_within_threshold() {
        let flash = applied(RamFlash::new());
        let b = {
            let mut b = boot(flash, 3);
            b.select_boot_slot().unwrap();
            b
        };
        let mut b = boot(b.release(), 3);
        assert!(b.select_boot_slot().unwrap().is_trial());
        assert_eq!(b.confirm(&mut || true).unwrap(), BootOutcome::Committed(Slot::B));

        // Next boots go straight to the committed slot
        let mut b = boot(b.release(), 3);
        assert_eq!(
            b.select_boot_slot().unwrap(),
            BootSelection::Active {
                slot: Slot::B,
                region: SIM_LAYOUT.slot_b
            }
        );
        assert_eq!(b.confirm(&mut || false).unwrap(), BootOutcome::NothingPending);
        assert_eq!(b.active_slot(), Slot::B);
    }
}

mod health_tests {
    use super::*;
    use ota_boot::HealthCheck;

    struct SelfTest {
        passed: bool,
        runs: u32,
    }

    impl HealthCheck for SelfTest {
        fn is_healthy(&mut self) -> bool {
            self.runs += 1;
            self.passed
        }
    }

    #[test]
    fn test_failed_health_check_reverts() {
        let mut b = boot(applied(RamFlash::new()), 3);
        b.select_boot_slot().unwrap();

        let mut check = SelfTest {
            passed: false,
            runs: 0,
        };
        let outcome = b.confirm(&mut check).unwrap();
        assert_eq!(
            outcome,
            BootOutcome::Reverted {
                slot: Slot::A,
                reason: RevertReason::HealthCheckFailed
            }
        );
        assert_eq!(check.runs, 1);

        // Confirm again: nothing pending, check not consulted
        assert_eq!(b.confirm(&mut check).unwrap(), BootOutcome::NothingPending);
        assert_eq!(check.runs, 1);
    }

    #[test]
    fn test_new_update_after_revert_targets_same_slot() {
        let mut b = boot(applied(RamFlash::new()), 3);
        b.select_boot_slot().unwrap();
        b.confirm(&mut || false).unwrap();

        let flash = applied(b.release());
        let b = boot(flash, 3);
        assert_eq!(b.record().candidate, Some(Slot::B));
        assert_eq!(b.record().slot_state(Slot::B), SlotState::Staged);
    }
}

mod power_loss_tests {
    use super::*;

    #[test]
    fn test_torn_attempt_write_never_loses_candidate() {
        let flash = applied(RamFlash::new());
        let mut b = boot(flash, 3);
        // Secondary copy updated, primary torn
        b.flash_mut().cut_power_after(5);
        assert!(b.select_boot_slot().is_err());

        let mut flash = b.release();
        flash.restore_power();
        let b = boot(flash, 3);
        let record = b.record();
        assert!(record.commit_pending);
        assert_eq!(record.candidate, Some(Slot::B));
        assert!(record.boot_attempts <= 1);
    }

    #[test]
    fn test_torn_revert_still_reverts_eventually() {
        let mut flash = applied(RamFlash::new());
        for _ in 0..3 {
            let mut b = boot(flash, 3);
            b.select_boot_slot().unwrap();
            flash = b.release();
        }

        let mut b = boot(flash, 3);
        b.flash_mut().cut_power_after(2);
        assert!(b.select_boot_slot().is_err());

        let mut flash = b.release();
        flash.restore_power();
        let mut b = boot(flash, 3);
        assert_eq!(b.select_boot_slot().unwrap().slot(), Slot::A);
        assert!(!b.record().commit_pending);
    }
}

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn candidate_gets_exactly_threshold_trials(max in 1u8..6) {
            let mut flash = applied(RamFlash::new());
            let mut trials = 0u8;
            loop {
                let mut b = boot(flash, max);
                let selection = b.select_boot_slot().unwrap();
                flash = b.release();
                if selection.is_trial() {
                    trials += 1;
                    prop_assert!(trials <= max);
                } else {
                    prop_assert_eq!(selection.slot(), Slot::A);
                    break;
                }
            }
            prop_assert_eq!(trials, max);
        }
    }
}
