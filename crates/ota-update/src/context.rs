// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Update context
//!
//! Mutable state of one update session: phase, per-file progress, staging
//! capacity accounting and the status message. Created only by
//! [`Updater::begin`](crate::Updater::begin) and owned by the updater for
//! the lifetime of the session.

use core::fmt;

use heapless::Vec;

use ota_common::constants::{MAX_PARTS, MAX_VERSION_LEN};
use ota_common::{BoundedStr, DestinationClass, Digest, Error, FileName, Slot, SlotState, StatusMessage};

// ============================================================================
// Session Phase
// ============================================================================

/// Session phase
///
/// Phases advance along `Idle → Begun → Processing → Finalizing → Staged →
/// Applied`. Any open phase may drop to `Aborted` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// No session
    Idle,
    /// Manifest accepted, no file started
    Begun,
    /// Files are being streamed
    Processing,
    /// Cross-file validation running
    Finalizing,
    /// Staging slot holds a verified image set
    Staged,
    /// Boot record points at the staged slot
    Applied,
    /// Session cancelled by the caller or by a content error
    Aborted,
    /// Finalize or apply failed
    Failed,
}

impl Phase {
    /// Whether the session is over and a new one may begin
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Applied | Self::Aborted | Self::Failed)
    }

    /// Whether `next` is a legal successor
    #[must_use]
    pub fn can_advance_to(self, next: Phase) -> bool {
        if self.is_closed() {
            return false;
        }
        match next {
            Self::Aborted | Self::Failed => true,
            Self::Idle => false,
            _ => next > self,
        }
    }

    /// Phase name for messages
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Begun => "begun",
            Self::Processing => "processing",
            Self::Finalizing => "finalizing",
            Self::Staged => "staged",
            Self::Applied => "applied",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// File Info
// ============================================================================

/// Per-file sub-state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileState {
    /// Waiting for its turn
    NotStarted,
    /// Accepted, data being streamed
    Processing,
    /// All bytes written and checksum matched
    Completed,
    /// Already installed; copied locally instead of streamed
    Skipped,
    /// Refused or failed
    Aborted,
}

impl FileState {
    /// Whether the file needs nothing more
    #[must_use]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

/// Where a file lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    /// Destination class from the type tag
    pub class: DestinationClass,
    /// Slot receiving the file
    pub slot: Slot,
    /// Byte offset inside the slot (page aligned)
    pub offset: u32,
}

/// Progress of one manifest part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    name: FileName,
    declared_size: u32,
    processed_bytes: u32,
    destination: Destination,
    expected: Digest,
    state: FileState,
}

impl FileInfo {
    /// Create a file entry in `NotStarted`
    #[must_use]
    pub fn new(name: FileName, declared_size: u32, destination: Destination, expected: Digest) -> Self {
        Self {
            name,
            declared_size,
            processed_bytes: 0,
            destination,
            expected,
            state: FileState::NotStarted,
        }
    }

    /// File name
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Size declared in the manifest
    #[must_use]
    pub const fn declared_size(&self) -> u32 {
        self.declared_size
    }

    /// Bytes accepted so far
    #[must_use]
    pub const fn processed_bytes(&self) -> u32 {
        self.processed_bytes
    }

    /// Bytes still expected
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.declared_size - self.processed_bytes
    }

    /// Placement
    #[must_use]
    pub const fn destination(&self) -> Destination {
        self.destination
    }

    /// Expected content digest
    #[must_use]
    pub const fn expected_digest(&self) -> &Digest {
        &self.expected
    }

    /// Sub-state
    #[must_use]
    pub const fn state(&self) -> FileState {
        self.state
    }

    /// Record `bytes` more accepted bytes, never past the declared size
    pub(crate) fn advance(&mut self, bytes: u32) {
        self.processed_bytes = self
            .processed_bytes
            .saturating_add(bytes)
            .min(self.declared_size);
    }

    pub(crate) fn set_state(&mut self, state: FileState) {
        self.state = state;
    }
}

// ============================================================================
// Update Context
// ============================================================================

/// Bundle version string
pub type VersionText = BoundedStr<MAX_VERSION_LEN>;

/// State of one update session
#[derive(Debug, Clone)]
pub struct UpdateContext {
    generation: u32,
    phase: Phase,
    status: StatusMessage,
    files: Vec<FileInfo, MAX_PARTS>,
    capacity_remaining: u32,
    staging: Slot,
    staging_state: SlotState,
    version: Option<VersionText>,
    bundle_checksum: Option<Digest>,
    failure: Option<Error>,
    erase_mark: u32,
}

impl UpdateContext {
    /// Create a context in `Begun`
    #[must_use]
    pub fn new(
        generation: u32,
        staging: Slot,
        capacity: u32,
        files: Vec<FileInfo, MAX_PARTS>,
        version: Option<VersionText>,
        bundle_checksum: Option<Digest>,
    ) -> Self {
        Self {
            generation,
            phase: Phase::Begun,
            status: StatusMessage::from("begun"),
            files,
            capacity_remaining: capacity,
            staging,
            staging_state: SlotState::Staging,
            version,
            bundle_checksum,
            failure: None,
            erase_mark: 0,
        }
    }

    /// Session generation the handle must match
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Last status message
    #[must_use]
    pub fn status(&self) -> &StatusMessage {
        &self.status
    }

    /// Files in manifest order
    #[must_use]
    pub fn files(&self) -> &[FileInfo] {
        &self.files
    }

    /// Bytes left in the staging slot
    #[must_use]
    pub const fn capacity_remaining(&self) -> u32 {
        self.capacity_remaining
    }

    /// Slot receiving the update
    #[must_use]
    pub const fn staging_slot(&self) -> Slot {
        self.staging
    }

    /// In-session state of the staging slot
    #[must_use]
    pub const fn staging_state(&self) -> SlotState {
        self.staging_state
    }

    /// Bundle version, if declared
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_ref().map(VersionText::as_str)
    }

    /// Declared bundle checksum
    #[must_use]
    pub const fn bundle_checksum(&self) -> Option<&Digest> {
        self.bundle_checksum.as_ref()
    }

    /// Error kind that closed the session, if any
    #[must_use]
    pub const fn failure(&self) -> Option<Error> {
        self.failure
    }

    /// Index of the first file that is neither done nor refused
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.files
            .iter()
            .position(|f| matches!(f.state, FileState::NotStarted | FileState::Processing))
    }

    /// Name of the file the transport should deliver next
    #[must_use]
    pub fn next_pending(&self) -> Option<&FileInfo> {
        if self.phase.is_closed() {
            return None;
        }
        self.current_index().map(|i| &self.files[i])
    }

    /// Whether every file is completed or skipped
    #[must_use]
    pub fn all_files_done(&self) -> bool {
        self.files.iter().all(|f| f.state.is_done())
    }

    /// Staging bytes that may hold session data (erase on release)
    #[must_use]
    pub const fn erase_mark(&self) -> u32 {
        self.erase_mark
    }

    pub(crate) fn file_mut(&mut self, index: usize) -> Option<&mut FileInfo> {
        self.files.get_mut(index)
    }

    /// Move forward along the phase graph
    pub(crate) fn advance(&mut self, next: Phase) -> Result<(), Error> {
        if !self.phase.can_advance_to(next) {
            return Err(Error::InvalidState);
        }
        self.phase = next;
        Ok(())
    }

    /// Close the session in `phase` (`Aborted` or `Failed`)
    ///
    /// `failure` is `None` when the caller aborted on purpose.
    pub(crate) fn terminate(&mut self, phase: Phase, failure: Option<Error>, message: &StatusMessage) {
        self.phase = phase;
        self.failure = failure;
        self.status = message.clone();
        self.staging_state = SlotState::Empty;
        if let Some(i) = self.current_index() {
            self.files[i].state = FileState::Aborted;
        }
    }

    pub(crate) fn set_status(&mut self, args: fmt::Arguments<'_>) {
        self.status.set_fmt(args);
    }

    pub(crate) fn set_staging_state(&mut self, state: SlotState) {
        self.staging_state = state;
    }

    pub(crate) fn consume_capacity(&mut self, bytes: u32) {
        self.capacity_remaining = self.capacity_remaining.saturating_sub(bytes);
    }

    /// Note that staging bytes up to `end` (slot offset) may be dirty
    pub(crate) fn mark_dirty(&mut self, end: u32) {
        self.erase_mark = self.erase_mark.max(end);
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.erase_mark = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, size: u32) -> FileInfo {
        FileInfo::new(
            FileName::new(name).unwrap(),
            size,
            Destination {
                class: DestinationClass::Firmware,
                slot: Slot::B,
                offset: 0,
            },
            Digest::default(),
        )
    }

    fn context() -> UpdateContext {
        let mut files = Vec::new();
        files.push(file("a", 10)).unwrap();
        files.push(file("b", 20)).unwrap();
        UpdateContext::new(1, Slot::B, 4096, files, None, None)
    }

    #[test]
    fn test_phase_graph() {
        assert!(Phase::Begun.can_advance_to(Phase::Processing));
        assert!(Phase::Begun.can_advance_to(Phase::Finalizing));
        assert!(!Phase::Staged.can_advance_to(Phase::Processing));
        assert!(Phase::Staged.can_advance_to(Phase::Aborted));
        assert!(!Phase::Applied.can_advance_to(Phase::Aborted));
        assert!(!Phase::Aborted.can_advance_to(Phase::Failed));
        assert!(!Phase::Begun.can_advance_to(Phase::Idle));
    }

    #[test]
    fn test_progress_never_exceeds_declared() {
        let mut f = file("a", 10);
        f.advance(4);
        f.advance(100);
        assert_eq!(f.processed_bytes(), 10);
        assert_eq!(f.remaining(), 0);
    }

    #[test]
    fn test_current_and_next_pending() {
        let mut ctx = context();
        assert_eq!(ctx.current_index(), Some(0));
        ctx.file_mut(0).unwrap().set_state(FileState::Skipped);
        assert_eq!(ctx.next_pending().map(FileInfo::name), Some("b"));
        ctx.file_mut(1).unwrap().set_state(FileState::Completed);
        assert!(ctx.all_files_done());
        assert!(ctx.next_pending().is_none());
    }

    #[test]
    fn test_terminate_marks_current_file() {
        let mut ctx = context();
        ctx.advance(Phase::Processing).unwrap();
        ctx.terminate(
            Phase::Aborted,
            Some(Error::ChecksumMismatch),
            &StatusMessage::from("bad"),
        );
        assert_eq!(ctx.phase(), Phase::Aborted);
        assert_eq!(ctx.failure(), Some(Error::ChecksumMismatch));
        assert_eq!(ctx.files()[0].state(), FileState::Aborted);
        assert_eq!(ctx.status().as_str(), "bad");
        assert_eq!(ctx.advance(Phase::Finalizing), Err(Error::InvalidState));
    }

    #[test]
    fn test_dirty_mark_only_grows() {
        let mut ctx = context();
        ctx.mark_dirty(2048);
        ctx.mark_dirty(1024);
        assert_eq!(ctx.erase_mark(), 2048);
        ctx.clear_dirty();
        assert_eq!(ctx.erase_mark(), 0);
    }
}
