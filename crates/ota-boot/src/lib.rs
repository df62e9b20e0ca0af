// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! OTA Boot Flow
//!
//! Runs on every boot, before and after the jump into firmware:
//!
//! - **Selection**: pick the slot to boot and count trial boots of a
//!   freshly applied candidate
//! - **Automatic revert**: a candidate that used up its attempts is
//!   dropped and the previous slot boots again
//! - **Confirmation**: a health check decides between commit and revert
//!
//! # Example
//!
//! ```ignore
//! let mut boot = BootManager::open(flash, &config.layout, config.boot)?;
//! let selection = boot.select_boot_slot()?;
//! jump_to(selection.region().start);
//! // ... later, from the running firmware:
//! boot.confirm(&mut || self_test_passed())?;
//! ```

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(test)]
extern crate std;

pub mod health;
pub mod manager;

pub use health::{HealthCheck, RevertReason};
pub use manager::{BootManager, BootOutcome, BootSelection};
