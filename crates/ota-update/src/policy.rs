// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Per-file decision policy
//!
//! [`decide`] is a pure function of the file and the session policy. It
//! never touches flash or the context, so it can be tested in isolation.

use heapless::Vec;

use ota_common::constants::MAX_INSTALLED_PARTS;
use ota_common::{DestinationClasses, Digest, FileName};

use crate::context::FileInfo;

/// What to do with a file before its data arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Refuse the file; ends the whole session
    Abort,
    /// Stream the file into staging
    Process,
    /// Already installed; complete it from the local copy
    Skip,
}

/// A part already present in the active slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPart {
    /// Part name
    pub name: FileName,
    /// Installed size
    pub size: u32,
    /// Digest of the installed bytes
    pub digest: Digest,
    /// Byte offset inside the active slot
    pub offset: u32,
}

/// Parts installed in the active slot, as reported by the device
pub type Inventory = Vec<InstalledPart, MAX_INSTALLED_PARTS>;

/// Inputs of the decision
#[derive(Debug, Clone, Copy)]
pub struct Policy<'a> {
    /// Destination classes this device installs
    pub supported: DestinationClasses,
    /// Installed parts eligible for skipping
    pub inventory: &'a [InstalledPart],
}

/// Installed part identical to `file` (name, size and digest)
#[must_use]
pub fn find_installed<'a>(file: &FileInfo, inventory: &'a [InstalledPart]) -> Option<&'a InstalledPart> {
    inventory.iter().find(|part| {
        part.name.as_str() == file.name()
            && part.size == file.declared_size()
            && part.digest == *file.expected_digest()
    })
}

/// Decide how to handle `file`
#[must_use]
pub fn decide(file: &FileInfo, policy: &Policy<'_>) -> Decision {
    if !policy.supported.supports(file.destination().class) {
        return Decision::Abort;
    }
    if find_installed(file, policy.inventory).is_some() {
        return Decision::Skip;
    }
    Decision::Process
}
