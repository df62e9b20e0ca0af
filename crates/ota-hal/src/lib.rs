// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Hardware Abstraction Layer for the OTA engine
//!
//! The engine touches hardware through one narrow seam: [`FlashInterface`].
//! Board crates implement it for their flash controller; the `sim` feature
//! provides [`sim::RamFlash`], a host-side NOR flash model used by tests to
//! inject write faults and cut power between operations.
//!
//! # Flash Semantics
//!
//! - Erased bytes read as `0xFF`
//! - Programming can only clear bits; writing over unerased data corrupts it
//! - Erase granularity is one page

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(any(test, feature = "sim"))]
extern crate alloc;

pub mod error;
pub mod traits;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

// Re-export main traits
pub use error::{HalError, HalResult};
pub use traits::FlashInterface;
