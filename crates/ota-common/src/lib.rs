// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! OTA Engine Common Library
//!
//! This crate provides the error kinds, configuration structures, bounded
//! types and logging shared by every OTA engine component.
//!
//! # Features
//!
//! - `std`: Enable standard library support (disabled by default for embedded)
//! - `defmt`: Forward log entries and format errors through defmt
//!
//! No heap allocations are performed: all buffers use fixed-size arrays or
//! heapless collections.

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(feature = "std")]
extern crate std;

pub mod config;
pub mod constants;
pub mod errors;
pub mod log;
pub mod types;

// Re-export commonly used items
pub use config::{BootConfig, FlashLayout, SystemConfig, UpdateConfig};
pub use errors::{Error, Result};
pub use types::*;
