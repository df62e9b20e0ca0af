// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Integration tests for ota-hal
//!
//! Tests for the flash trait's provided methods, the `&mut` forwarding
//! impl, HAL error codes and their conversion into engine error kinds.
//! A page-recording mock stands in for a real controller.

mod error_tests {
    use ota_hal::HalError;
    use std::collections::HashSet;

    const ALL: [HalError; 11] = [
        HalError::NotInitialized,
        HalError::FlashError,
        HalError::FlashLocked,
        HalError::FlashOutOfBounds,
        HalError::FlashEraseFailed,
        HalError::FlashWriteFailed,
        HalError::FlashVerifyFailed,
        HalError::FlashTimeout,
        HalError::InvalidParameter,
        HalError::Busy,
        HalError::NotSupported,
    ];

    #[test]
    fn test_all_error_codes_are_unique() {
        let codes: HashSet<u16> = ALL.iter().map(HalError::code).collect();
        assert_eq!(codes.len(), ALL.len());
    }

    #[test]
    fn test_all_errors_in_0x08xx_range() {
        for e in ALL {
            assert_eq!(e.code() >> 8, 0x08, "{e:?}");
        }
    }

    #[test]
    fn test_error_display_includes_code_and_description() {
        let text = format!("{}", HalError::FlashLocked);
        assert_eq!(text, "[0x0811] flash locked");
    }
}

mod error_conversion_tests {
    use ota_common::Error;
    use ota_hal::HalError;

    #[test]
    fn test_program_failures_become_write_failed() {
        assert_eq!(Error::from(HalError::FlashWriteFailed), Error::WriteFailed);
        assert_eq!(Error::from(HalError::FlashVerifyFailed), Error::WriteFailed);
    }

    #[test]
    fn test_controller_failures_become_flash_error() {
        for e in [
            HalError::NotInitialized,
            HalError::FlashError,
            HalError::FlashEraseFailed,
            HalError::FlashTimeout,
            HalError::Busy,
        ] {
            assert_eq!(Error::from(e), Error::FlashError, "{e:?}");
        }
    }

    #[test]
    fn test_bounds_and_lock_preserved() {
        assert_eq!(Error::from(HalError::FlashOutOfBounds), Error::FlashOutOfBounds);
        assert_eq!(Error::from(HalError::FlashLocked), Error::FlashLocked);
    }
}

mod flash_trait_tests {
    use ota_hal::{FlashInterface, HalError, HalResult};

    /// Mock controller: 16 pages of 64 bytes at 0x1000, records erased pages
    struct MockFlash {
        cells: [u8; 1024],
        erased: Vec<u32>,
    }

    impl MockFlash {
        fn new() -> Self {
            Self {
                cells: [0xFF; 1024],
                erased: Vec::new(),
            }
        }
    }

    impl FlashInterface for MockFlash {
        const PAGE_SIZE: usize = 64;
        const TOTAL_SIZE: usize = 1024;
        const BASE_ADDRESS: u32 = 0x1000;

        fn init(&mut self) -> HalResult<()> {
            Ok(())
        }

        fn read(&self, address: u32, buffer: &mut [u8]) -> HalResult<()> {
            let start = (address - Self::BASE_ADDRESS) as usize;
            let src = self
                .cells
                .get(start..start + buffer.len())
                .ok_or(HalError::FlashOutOfBounds)?;
            buffer.copy_from_slice(src);
            Ok(())
        }

        fn write(&mut self, address: u32, data: &[u8]) -> HalResult<()> {
            let start = (address - Self::BASE_ADDRESS) as usize;
            self.cells[start..start + data.len()].copy_from_slice(data);
            Ok(())
        }

        fn erase_page(&mut self, address: u32) -> HalResult<()> {
            self.erased.push(address);
            Ok(())
        }

        fn lock(&mut self) -> HalResult<()> {
            Ok(())
        }

        fn unlock(&mut self) -> HalResult<()> {
            Ok(())
        }

        fn is_locked(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_erase_range_aligns_down_to_page() {
        let mut flash = MockFlash::new();
        flash.erase_range(0x1010, 0x1081).unwrap();
        assert_eq!(flash.erased, vec![0x1000, 0x1040, 0x1080]);
    }

    #[test]
    fn test_erase_range_below_base_rejected() {
        let mut flash = MockFlash::new();
        assert_eq!(flash.erase_range(0x0FFF, 0x1010), Err(HalError::FlashOutOfBounds));
        assert!(flash.erased.is_empty());
    }

    #[test]
    fn test_verify_spans_multiple_read_chunks() {
        let mut flash = MockFlash::new();
        let data: Vec<u8> = (0..600u32).map(|i| (i % 251) as u8).collect();
        flash.write(0x1000, &data).unwrap();
        assert!(flash.verify(0x1000, &data).unwrap());

        let mut other = data.clone();
        other[599] ^= 1;
        assert!(!flash.verify(0x1000, &other).unwrap());
    }

    #[test]
    fn test_mut_ref_forwards_to_device() {
        fn program<F: FlashInterface>(mut flash: F) -> HalResult<()> {
            flash.write(F::BASE_ADDRESS, &[0xAB])
        }

        let mut flash = MockFlash::new();
        program(&mut flash).unwrap();
        assert_eq!(flash.cells[0], 0xAB);
        assert_eq!(<&mut MockFlash as FlashInterface>::PAGE_SIZE, 64);
    }
}
