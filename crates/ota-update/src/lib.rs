// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! OTA Update Engine
//!
//! Receives a multi-part firmware bundle, stages it into the inactive slot
//! and switches the boot record over to it:
//!
//! - **Manifest validation**: part names, sizes, checksums and capacity
//! - **Per-file policy**: process, skip an identical installed part, or abort
//! - **Streaming writes**: aligned, read back and hashed while they land
//! - **Redundant boot record**: two CRC-protected copies, torn writes survived
//! - **Boot-time confirmation**: commit or revert the candidate slot
//!
//! # Example
//!
//! ```ignore
//! let mut updater = Updater::open(flash, &config)?;
//! let handle = updater.begin(&manifest)?;
//! for part in manifest.parts() {
//!     if updater.file_begin(handle, part.name)? == Decision::Process {
//!         // stream with file_data, finish with file_end
//!     }
//! }
//! updater.finalize(handle)?;
//! updater.apply(handle)?;
//! ```

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(test)]
extern crate std;

pub mod boot_record;
pub mod context;
pub mod error;
pub mod integrity;
pub mod manifest;
pub mod orchestrator;
pub mod policy;
pub mod processor;

pub use boot_record::{BootRecord, BootRecordStore, OpenReport, RecordSource};
pub use context::{FileInfo, FileState, Phase, UpdateContext};
pub use error::{UpdateError, UpdateResult};
pub use manifest::{Manifest, ManifestView, PartDescriptor};
pub use orchestrator::{SessionHandle, Updater};
pub use policy::{Decision, InstalledPart, Inventory};
