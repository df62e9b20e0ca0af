// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Property tests for session bookkeeping
//!
//! - Oversized manifests never open a session
//! - FileData never consumes more than offered
//! - Progress is monotonic and bounded by the declared size

use ota_common::{Error, SystemConfig};
use ota_hal::sim::{RamFlash, SIM_LAYOUT};
use ota_update::integrity::sha3_256;
use ota_update::{FileState, Manifest, PartDescriptor, Phase, Updater};
use proptest::prelude::*;

const NAMES: [&str; 4] = ["a.bin", "b.bin", "c.bin", "d.bin"];

fn open() -> Updater<RamFlash> {
    let config = SystemConfig {
        layout: SIM_LAYOUT,
        ..SystemConfig::default()
    };
    Updater::open(RamFlash::new(), &config).unwrap()
}

proptest! {
    #[test]
    fn oversized_manifest_never_opens(sizes in prop::collection::vec(1u32..=SIM_LAYOUT.slot_b.size, 1..=4)) {
        let total: u64 = sizes.iter().map(|&s| u64::from(s)).sum();
        prop_assume!(total > u64::from(SIM_LAYOUT.slot_b.size));

        let zero = "00".repeat(32);
        let parts: Vec<_> = sizes
            .iter()
            .zip(NAMES)
            .map(|(&size, name)| PartDescriptor::new(name, "app", size, &zero))
            .collect();
        let manifest = Manifest::from_parts(&parts).unwrap();

        let mut u = open();
        let err = u.begin(&manifest).unwrap_err();
        prop_assert_eq!(err.kind(), Error::CapacityExceeded);
        prop_assert!(u.context().is_none());
        prop_assert_eq!(u.phase(), Phase::Idle);
    }

    #[test]
    fn consumption_is_bounded_and_monotonic(
        data in prop::collection::vec(any::<u8>(), 1..2048),
        chunks in prop::collection::vec(0usize..300, 1..64),
    ) {
        let checksum = sha3_256(&data).to_string();
        let parts = [PartDescriptor::new("app.bin", "app", data.len() as u32, &checksum)];
        let manifest = Manifest::from_parts(&parts).unwrap();

        let mut u = open();
        let h = u.begin(&manifest).unwrap();
        u.file_begin(h, "app.bin").unwrap();

        let mut pos = 0usize;
        for chunk in chunks {
            let end = (pos + chunk).min(data.len());
            let offered = &data[pos..end];
            let consumed = u.file_data(h, "app.bin", offered).unwrap();
            prop_assert!(consumed <= offered.len());

            let processed = u.files()[0].processed_bytes() as usize;
            prop_assert_eq!(processed, pos + consumed);
            prop_assert!(processed <= data.len());
            pos = processed;
        }

        let tail = data.len() - pos;
        prop_assert_eq!(u.file_end(h, "app.bin", &data[pos..]).unwrap(), tail);
        prop_assert_eq!(u.files()[0].processed_bytes() as usize, data.len());
        prop_assert_eq!(u.files()[0].state(), FileState::Completed);
        prop_assert!(u.finalize(h).is_ok());
    }
}
