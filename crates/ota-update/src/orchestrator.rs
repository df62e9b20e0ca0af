// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Update orchestrator
//!
//! [`Updater`] sequences one session at a time:
//!
//! ```text
//! begin ─► (file_begin ─► file_data* ─► file_end)* ─► finalize ─► apply
//!    │                                                    │
//!    └──────────────── abort (any open phase) ◄───────────┘
//! ```
//!
//! Only [`Updater::apply`] writes the boot record during a session. A
//! session that fails or is aborted releases its staging pages and leaves
//! the currently running firmware selected.
//!
//! Caller mistakes (stale handle, out-of-order file) are rejected with
//! [`Error::InvalidSession`] / [`Error::InvalidState`] and leave the session
//! as it was. Content and flash errors close it.

use heapless::Vec;

use ota_common::constants::MAX_PARTS;
use ota_common::log::{LogBuffer, Sequence};
use ota_common::{
    log_debug, log_error, log_info, log_trace, log_warn, Error, FlashLayout, Slot, SlotState,
    StatusMessage, SystemConfig, UpdateConfig,
};
use ota_hal::FlashInterface;

use crate::boot_record::{BootRecord, BootRecordStore};
use crate::context::{Destination, FileInfo, FileState, Phase, UpdateContext, VersionText};
use crate::error::{UpdateError, UpdateResult};
use crate::integrity::{bundle_digest, parse_digest};
use crate::manifest::{ManifestView, ValidatedPart};
use crate::policy::{decide, find_installed, Decision, Inventory, Policy};
use crate::processor::{placement_span, FileProcessor};

/// Log module name
const MODULE: &str = "update";

/// Token for the open session
///
/// Carries the session generation; a handle from an earlier session is
/// rejected with [`Error::InvalidSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    generation: u32,
}

impl SessionHandle {
    /// Session generation
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

struct Session {
    ctx: UpdateContext,
    processor: FileProcessor,
}

fn session_mut(session: &mut Option<Session>, handle: SessionHandle) -> UpdateResult<&mut Session> {
    match session {
        Some(s) if s.ctx.generation() == handle.generation => Ok(s),
        _ => Err(UpdateError::new(
            Error::InvalidSession,
            "stale or unknown session handle",
        )),
    }
}

/// Index of `name` if it is the file the session expects next, in `expected` state
fn locate(ctx: &UpdateContext, name: &str, expected: FileState) -> UpdateResult<usize> {
    if !matches!(ctx.phase(), Phase::Begun | Phase::Processing) {
        return Err(UpdateError::with_fmt(
            Error::InvalidState,
            format_args!("no file calls while {}", ctx.phase()),
        ));
    }
    let Some(index) = ctx.current_index() else {
        return Err(UpdateError::new(Error::InvalidState, "every file already handled"));
    };
    let file = &ctx.files()[index];
    if file.name() != name {
        return Err(UpdateError::with_fmt(
            Error::InvalidState,
            format_args!("expected {}, got {}", file.name(), name),
        ));
    }
    if file.state() != expected {
        return Err(UpdateError::with_fmt(
            Error::InvalidState,
            format_args!("{} is {:?}", name, file.state()),
        ));
    }
    Ok(index)
}

// ============================================================================
// Updater
// ============================================================================

/// OTA update orchestrator
pub struct Updater<F: FlashInterface> {
    flash: F,
    layout: FlashLayout,
    config: UpdateConfig,
    store: BootRecordStore,
    inventory: Inventory,
    session: Option<Session>,
    generation: u32,
    last_status: StatusMessage,
    log: LogBuffer,
    seq: Sequence,
}

impl<F: FlashInterface> Updater<F> {
    /// Validate the configuration and load the boot record
    pub fn open(mut flash: F, config: &SystemConfig) -> UpdateResult<Self> {
        config
            .validate(F::PAGE_SIZE as u32)
            .map_err(|kind| UpdateError::new(kind, "invalid configuration"))?;
        let (store, report) = BootRecordStore::open(
            &mut flash,
            &config.layout,
            config.update.record_write_retries,
        )
        .map_err(|kind| UpdateError::new(kind, "boot record unavailable"))?;

        let mut updater = Self {
            flash,
            layout: config.layout,
            config: config.update,
            store,
            inventory: Inventory::new(),
            session: None,
            generation: 0,
            last_status: StatusMessage::from("idle"),
            log: LogBuffer::new(),
            seq: Sequence::new(),
        };

        log_info!(
            updater.log,
            updater.seq.tick(),
            MODULE,
            "boot record from {:?}, active slot {}",
            report.source,
            updater.store.active_slot()
        );
        if report.repair_failed {
            log_warn!(updater.log, updater.seq.tick(), MODULE, "boot record copy repair failed");
        }
        Ok(updater)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Phase of the current (or last) session, `Idle` if none
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.session.as_ref().map_or(Phase::Idle, |s| s.ctx.phase())
    }

    /// Whether a session is open
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.ctx.phase().is_closed())
    }

    /// Status message of the session behind `handle`
    pub fn status(&self, handle: SessionHandle) -> UpdateResult<&StatusMessage> {
        match &self.session {
            Some(s) if s.ctx.generation() == handle.generation => Ok(s.ctx.status()),
            _ => Err(UpdateError::from(Error::InvalidSession)),
        }
    }

    /// Most recent status or rejection message
    #[must_use]
    pub fn last_status(&self) -> &StatusMessage {
        &self.last_status
    }

    /// Context of the current (or last) session
    #[must_use]
    pub fn context(&self) -> Option<&UpdateContext> {
        self.session.as_ref().map(|s| &s.ctx)
    }

    /// Files of the current (or last) session
    #[must_use]
    pub fn files(&self) -> &[FileInfo] {
        self.context().map_or(&[], UpdateContext::files)
    }

    /// Name of the file the transport should deliver next
    #[must_use]
    pub fn next_pending_file(&self) -> Option<&str> {
        self.context()?.next_pending().map(FileInfo::name)
    }

    /// Staging bytes left in the current session
    #[must_use]
    pub fn capacity_remaining(&self) -> Option<u32> {
        self.context().map(UpdateContext::capacity_remaining)
    }

    /// Persisted boot record
    #[must_use]
    pub fn boot_record(&self) -> &BootRecord {
        self.store.record()
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

    /// Replace the list of parts installed in the active slot
    ///
    /// Every part must lie inside the active slot.
    pub fn set_inventory(&mut self, inventory: Inventory) -> UpdateResult<()> {
        let region = self.layout.slot(self.store.active_slot());
        if let Some(part) = inventory
            .iter()
            .find(|p| !region.contains_span(p.offset, p.size))
        {
            return Err(UpdateError::with_fmt(
                Error::InvalidParameter,
                format_args!("{} lies outside the active slot", part.name),
            ));
        }
        log_debug!(self.log, self.seq.tick(), MODULE, "inventory: {} parts", inventory.len());
        self.inventory = inventory;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------------

    /// Open a session for `manifest`
    ///
    /// Fails with [`Error::SessionBusy`] while another session is open,
    /// [`Error::InvalidState`] while a previous update awaits its first
    /// boot, [`Error::BootRecordFailed`] after a boot record write left the
    /// copies out of step, [`Error::InvalidManifest`] for malformed parts and
    /// [`Error::CapacityExceeded`] when the parts do not fit the staging
    /// slot. No context is created on failure.
    pub fn begin<M: ManifestView + ?Sized>(&mut self, manifest: &M) -> UpdateResult<SessionHandle> {
        if self.is_busy() {
            return Err(self.reject(UpdateError::new(
                Error::SessionBusy,
                "update session already open",
            )));
        }
        if self.store.commit_pending() {
            return Err(self.reject(UpdateError::new(
                Error::InvalidState,
                "previous update awaits boot confirmation",
            )));
        }
        if self.store.is_diverged() {
            return Err(self.reject(UpdateError::new(
                Error::BootRecordFailed,
                "boot record copies out of step, restart required",
            )));
        }

        let generation = self.generation.wrapping_add(1);
        let ctx = match self.plan(manifest, generation) {
            Ok(ctx) => ctx,
            Err(err) => {
                self.session = None;
                return Err(self.reject(err));
            }
        };

        self.generation = generation;
        let staging = ctx.staging_slot();
        let parts = ctx.files().len();
        let processor = FileProcessor::new(self.config.write_align, F::PAGE_SIZE as u32);
        let session = self.session.insert(Session { ctx, processor });
        session.ctx.set_status(format_args!("begun: {parts} parts into slot {staging}"));
        self.last_status = session.ctx.status().clone();

        log_info!(
            self.log,
            self.seq.tick(),
            MODULE,
            "session {}: {} parts into slot {}",
            generation,
            parts,
            staging
        );
        Ok(SessionHandle { generation })
    }

    /// Validate the manifest and lay out every part in the staging slot
    fn plan<M: ManifestView + ?Sized>(&self, manifest: &M, generation: u32) -> UpdateResult<UpdateContext> {
        let count = manifest.part_count();
        if count == 0 {
            return Err(UpdateError::new(Error::InvalidManifest, "manifest has no parts"));
        }
        if count > MAX_PARTS {
            return Err(UpdateError::with_fmt(
                Error::InvalidManifest,
                format_args!("{count} parts, at most {MAX_PARTS} supported"),
            ));
        }

        if let Some(platform) = manifest.platform() {
            if !self.config.platform.is_empty() && platform != self.config.platform {
                return Err(UpdateError::with_fmt(
                    Error::InvalidManifest,
                    format_args!("built for {platform}, device is {}", self.config.platform),
                ));
            }
        }

        let bundle = match manifest.bundle_checksum() {
            Some(text) => Some(parse_digest(text).ok_or_else(|| {
                UpdateError::new(Error::InvalidManifest, "malformed bundle checksum")
            })?),
            None if self.config.require_bundle_checksum => {
                return Err(UpdateError::new(Error::InvalidManifest, "bundle checksum required"));
            }
            None => None,
        };

        let version = match manifest.version() {
            Some(text) => Some(VersionText::new(text).map_err(|_| {
                UpdateError::new(Error::InvalidManifest, "version string too long")
            })?),
            None => None,
        };

        let mut parts: Vec<ValidatedPart, MAX_PARTS> = Vec::new();
        for index in 0..count {
            let part = manifest
                .part(index)
                .ok_or_else(|| {
                    UpdateError::with_fmt(Error::InvalidManifest, format_args!("part {index} missing"))
                })?
                .validate()?;
            if parts.iter().any(|p| p.name == part.name) {
                return Err(UpdateError::with_fmt(
                    Error::InvalidManifest,
                    format_args!("duplicate part {}", part.name),
                ));
            }
            parts
                .push(part)
                .map_err(|_| UpdateError::from(Error::InvalidManifest))?;
        }

        let staging = self.store.active_slot().other();
        let region = self.layout.slot(staging);
        let capacity = u64::from(region.size);

        let total: u64 = parts.iter().map(|p| u64::from(p.size)).sum();
        if total > capacity {
            return Err(UpdateError::with_fmt(
                Error::CapacityExceeded,
                format_args!("{total} bytes exceed staging capacity {capacity}"),
            ));
        }

        let page = F::PAGE_SIZE as u64;
        let mut files: Vec<FileInfo, MAX_PARTS> = Vec::new();
        let mut offset = 0u64;
        for part in parts {
            let end = offset + u64::from(part.size);
            if end > capacity {
                return Err(UpdateError::with_fmt(
                    Error::CapacityExceeded,
                    format_args!("{} does not fit at page offset {offset:#x}", part.name),
                ));
            }
            let destination = Destination {
                class: part.class,
                slot: staging,
                // Bounded by the slot size checked above
                offset: offset as u32,
            };
            files
                .push(FileInfo::new(part.name, part.size, destination, part.digest))
                .map_err(|_| UpdateError::from(Error::InvalidManifest))?;
            offset = end.div_ceil(page) * page;
        }

        Ok(UpdateContext::new(
            generation,
            staging,
            region.size,
            files,
            version,
            bundle,
        ))
    }

    /// Decide how to handle the next file and prepare it
    ///
    /// `Process` erases the file's placement. `Skip` copies the installed
    /// part from the active slot right away. `Abort` closes the session.
    pub fn file_begin(&mut self, handle: SessionHandle, name: &str) -> UpdateResult<Decision> {
        let index = self.checked(handle, name, FileState::NotStarted)?;
        let active = self.layout.slot(self.store.active_slot());
        let page = F::PAGE_SIZE as u32;

        let Some(session) = self.session.as_mut() else {
            return Err(UpdateError::from(Error::InternalError));
        };
        if session.ctx.phase() == Phase::Begun {
            session.ctx.advance(Phase::Processing)?;
        }
        let base = self.layout.slot(session.ctx.staging_slot()).start;

        let file = &session.ctx.files()[index];
        let policy = Policy {
            supported: self.config.supported_classes,
            inventory: &self.inventory,
        };
        let decision = decide(file, &policy);
        let source = find_installed(file, &self.inventory).map(|p| active.start + p.offset);
        let class = file.destination().class;
        let (_, end) = placement_span(base, file, page);

        let outcome = match decision {
            Decision::Abort => {
                let message =
                    StatusMessage::from_fmt(format_args!("{name}: unsupported destination {class:?}"));
                self.close_session(Phase::Aborted, Some(Error::UnsupportedFile), &message);
                log_error!(self.log, self.seq.tick(), MODULE, "{}", message);
                return Ok(Decision::Abort);
            }
            Decision::Process => {
                session.ctx.mark_dirty(end - base);
                let Some(file) = session.ctx.file_mut(index) else {
                    return Err(UpdateError::from(Error::InternalError));
                };
                session.processor.start(&mut self.flash, base, file)
            }
            Decision::Skip => {
                session.ctx.mark_dirty(end - base);
                let Some(file) = session.ctx.file_mut(index) else {
                    return Err(UpdateError::from(Error::InternalError));
                };
                match source {
                    Some(source) => session.processor.copy_installed(&mut self.flash, base, file, source),
                    None => Err(Error::InternalError),
                }
            }
        };

        match outcome {
            Ok(()) => {
                if decision == Decision::Skip {
                    let size = session.ctx.files()[index].declared_size();
                    session.ctx.consume_capacity(size);
                }
                session.ctx.set_status(format_args!("{name}: {decision:?}"));
                self.last_status = session.ctx.status().clone();
                log_info!(self.log, self.seq.tick(), MODULE, "{}: {:?}", name, decision);
                Ok(decision)
            }
            Err(kind) => Err(self.fail_session(
                Phase::Aborted,
                UpdateError::with_fmt(kind, format_args!("{name}: {} ({decision:?})", kind.description())),
            )),
        }
    }

    /// Stream a chunk of the current file
    ///
    /// Returns the bytes consumed, which may be fewer than offered (down to
    /// zero) when the chunk does not end on a programming boundary; the
    /// caller re-offers the rest. A flash failure aborts the session.
    pub fn file_data(&mut self, handle: SessionHandle, name: &str, chunk: &[u8]) -> UpdateResult<usize> {
        let index = self.checked(handle, name, FileState::Processing)?;
        let Some(Session { ctx, processor }) = self.session.as_mut() else {
            return Err(UpdateError::from(Error::InternalError));
        };
        let base = self.layout.slot(ctx.staging_slot()).start;
        let Some(file) = ctx.file_mut(index) else {
            return Err(UpdateError::from(Error::InternalError));
        };

        match processor.data(&mut self.flash, base, file, chunk) {
            Ok(consumed) => {
                let processed = file.processed_bytes();
                ctx.consume_capacity(consumed as u32);
                log_trace!(
                    self.log,
                    self.seq.tick(),
                    MODULE,
                    "{}: +{} ({} bytes)",
                    name,
                    consumed,
                    processed
                );
                Ok(consumed)
            }
            Err(kind) => Err(self.fail_session(
                Phase::Aborted,
                UpdateError::with_fmt(kind, format_args!("{name}: {}", kind.description())),
            )),
        }
    }

    /// Deliver the tail of the current file and check it
    ///
    /// The tail must be exactly the bytes not yet consumed. A size or
    /// digest mismatch fails with [`Error::ChecksumMismatch`] and aborts
    /// the session.
    pub fn file_end(&mut self, handle: SessionHandle, name: &str, tail: &[u8]) -> UpdateResult<usize> {
        let index = self.checked(handle, name, FileState::Processing)?;
        let Some(Session { ctx, processor }) = self.session.as_mut() else {
            return Err(UpdateError::from(Error::InternalError));
        };
        let base = self.layout.slot(ctx.staging_slot()).start;
        let Some(file) = ctx.file_mut(index) else {
            return Err(UpdateError::from(Error::InternalError));
        };
        let offered = u64::from(file.processed_bytes()) + tail.len() as u64;
        let declared = file.declared_size();

        match processor.end(&mut self.flash, base, file, tail) {
            Ok(consumed) => {
                ctx.consume_capacity(consumed as u32);
                let done = ctx.files().iter().filter(|f| f.state().is_done()).count();
                let total = ctx.files().len();
                ctx.set_status(format_args!("{name}: complete ({done}/{total})"));
                self.last_status = ctx.status().clone();
                log_info!(self.log, self.seq.tick(), MODULE, "{}: complete", name);
                Ok(consumed)
            }
            Err(Error::ChecksumMismatch) if offered != u64::from(declared) => Err(self.fail_session(
                Phase::Aborted,
                UpdateError::with_fmt(
                    Error::ChecksumMismatch,
                    format_args!("{name}: size mismatch, {offered} of {declared} bytes"),
                ),
            )),
            Err(kind) => Err(self.fail_session(
                Phase::Aborted,
                UpdateError::with_fmt(kind, format_args!("{name}: {}", kind.description())),
            )),
        }
    }

    /// Run cross-file checks and mark the staging slot `Staged`
    ///
    /// Every file must be completed or skipped. The declared bundle
    /// checksum must match and, with `verify_staged`, every part is
    /// re-hashed from flash. Failure closes the session in `Failed`.
    pub fn finalize(&mut self, handle: SessionHandle) -> UpdateResult<()> {
        let advanced = session_mut(&mut self.session, handle).and_then(|s| {
            s.ctx.advance(Phase::Finalizing).map_err(|kind| {
                UpdateError::with_fmt(kind, format_args!("cannot finalize while {}", s.ctx.phase()))
            })
        });
        if let Err(err) = advanced {
            return Err(self.reject(err));
        }

        match self.cross_check() {
            Ok(()) => {
                let Some(session) = self.session.as_mut() else {
                    return Err(UpdateError::from(Error::InternalError));
                };
                let ctx = &mut session.ctx;
                ctx.set_staging_state(SlotState::Staged);
                ctx.advance(Phase::Staged)?;
                let slot = ctx.staging_slot();
                let parts = ctx.files().len();
                let status = match ctx.version() {
                    Some(version) => StatusMessage::from_fmt(format_args!(
                        "staged {parts} parts in slot {slot}, version {version}"
                    )),
                    None => StatusMessage::from_fmt(format_args!("staged {parts} parts in slot {slot}")),
                };
                ctx.set_status(format_args!("{status}"));
                self.last_status = status;
                log_info!(self.log, self.seq.tick(), MODULE, "{}", self.last_status);
                Ok(())
            }
            Err(err) => Err(self.fail_session(Phase::Failed, err)),
        }
    }

    fn cross_check(&self) -> UpdateResult<()> {
        let Some(session) = self.session.as_ref() else {
            return Err(UpdateError::from(Error::InternalError));
        };
        let ctx = &session.ctx;

        if let Some(file) = ctx.files().iter().find(|f| !f.state().is_done()) {
            return Err(UpdateError::with_fmt(
                Error::FinalizeFailed,
                format_args!(
                    "{}: {} of {} bytes",
                    file.name(),
                    file.processed_bytes(),
                    file.declared_size()
                ),
            ));
        }

        if let Some(expected) = ctx.bundle_checksum() {
            let actual = bundle_digest(ctx.files().iter().map(FileInfo::expected_digest));
            if actual != *expected {
                return Err(UpdateError::new(Error::FinalizeFailed, "bundle checksum mismatch"));
            }
        }

        if self.config.verify_staged {
            let base = self.layout.slot(ctx.staging_slot()).start;
            for file in ctx.files() {
                let intact = FileProcessor::verify_stored(&self.flash, base, file).map_err(|kind| {
                    UpdateError::with_fmt(
                        Error::FinalizeFailed,
                        format_args!("{}: read-back failed, {}", file.name(), kind.description()),
                    )
                })?;
                if !intact {
                    return Err(UpdateError::with_fmt(
                        Error::FinalizeFailed,
                        format_args!("{}: staged content does not match", file.name()),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Point the boot record at the staged slot
    ///
    /// The only write to the boot record during a session. On success the
    /// session is `Applied` and the caller restarts the device.
    pub fn apply(&mut self, handle: SessionHandle) -> UpdateResult<()> {
        let staging = match self.session_phase(handle) {
            Ok((Phase::Staged, staging)) => staging,
            Ok((phase, _)) => {
                let err = UpdateError::with_fmt(
                    Error::InvalidState,
                    format_args!("cannot apply while {phase}"),
                );
                return Err(self.reject(err));
            }
            Err(err) => return Err(self.reject(err)),
        };

        match self.store.apply(&mut self.flash, staging) {
            Ok(()) => {
                let generation = self.store.record().generation;
                let Some(session) = self.session.as_mut() else {
                    return Err(UpdateError::from(Error::InternalError));
                };
                session.ctx.advance(Phase::Applied)?;
                session
                    .ctx
                    .set_status(format_args!("applied: restart to boot slot {staging}"));
                self.last_status = session.ctx.status().clone();
                log_info!(
                    self.log,
                    self.seq.tick(),
                    MODULE,
                    "boot record gen {}: candidate {}",
                    generation,
                    staging
                );
                Ok(())
            }
            Err(kind) => {
                // A copy of the new record may survive a reboot; keep the image it points at
                if self.store.is_diverged() {
                    if let Some(session) = self.session.as_mut() {
                        session.ctx.clear_dirty();
                    }
                }
                Err(self.fail_session(
                    Phase::Failed,
                    UpdateError::with_fmt(
                        Error::ApplyFailed,
                        format_args!("boot record not written: {}", kind.description()),
                    ),
                ))
            }
        }
    }

    /// Cancel the session and release its staging pages
    ///
    /// Valid in every open phase; the boot record is never touched.
    pub fn abort(&mut self, handle: SessionHandle, reason: &str) -> UpdateResult<()> {
        match self.session_phase(handle) {
            Ok((phase, _)) if !phase.is_closed() => {}
            Ok((phase, _)) => {
                let err = UpdateError::with_fmt(
                    Error::InvalidState,
                    format_args!("session already {phase}"),
                );
                return Err(self.reject(err));
            }
            Err(err) => return Err(self.reject(err)),
        }

        let message = StatusMessage::from_fmt(format_args!("aborted: {reason}"));
        self.close_session(Phase::Aborted, None, &message);
        log_warn!(self.log, self.seq.tick(), MODULE, "{}", message);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Boot-time operations
    // ------------------------------------------------------------------------

    /// Make the candidate permanent; no-op when nothing is pending
    pub fn boot_commit(&mut self) -> UpdateResult<()> {
        match self.store.commit(&mut self.flash) {
            Ok(true) => {
                let active = self.store.active_slot();
                // Installed parts described the previous slot
                self.inventory.clear();
                self.last_status.set_fmt(format_args!("committed slot {active}"));
                log_info!(self.log, self.seq.tick(), MODULE, "committed slot {}", active);
                Ok(())
            }
            Ok(false) => {
                log_debug!(self.log, self.seq.tick(), MODULE, "commit: nothing pending");
                Ok(())
            }
            Err(kind) => Err(self.record_failure(kind, "commit")),
        }
    }

    /// Drop the candidate and keep the previous slot; no-op when nothing is pending
    pub fn boot_revert(&mut self) -> UpdateResult<()> {
        let candidate = self.store.record().candidate;
        match self.store.revert(&mut self.flash) {
            Ok(true) => {
                let active = self.store.active_slot();
                self.last_status.set_fmt(format_args!("reverted to slot {active}"));
                log_warn!(
                    self.log,
                    self.seq.tick(),
                    MODULE,
                    "reverted to slot {}, candidate {:?} invalid",
                    active,
                    candidate
                );
                Ok(())
            }
            Ok(false) => {
                log_debug!(self.log, self.seq.tick(), MODULE, "revert: nothing pending");
                Ok(())
            }
            Err(kind) => Err(self.record_failure(kind, "revert")),
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Phase and staging slot of the session behind `handle`
    fn session_phase(&self, handle: SessionHandle) -> UpdateResult<(Phase, Slot)> {
        match &self.session {
            Some(s) if s.ctx.generation() == handle.generation => {
                Ok((s.ctx.phase(), s.ctx.staging_slot()))
            }
            _ => Err(UpdateError::new(
                Error::InvalidSession,
                "stale or unknown session handle",
            )),
        }
    }

    /// Resolve `handle` and `name` to the expected file index
    fn checked(&mut self, handle: SessionHandle, name: &str, state: FileState) -> UpdateResult<usize> {
        let found = session_mut(&mut self.session, handle).and_then(|s| locate(&s.ctx, name, state));
        found.map_err(|err| self.reject(err))
    }

    /// Log a rejected call; the session is left as it was
    fn reject(&mut self, err: UpdateError) -> UpdateError {
        self.last_status = err.status().clone();
        log_warn!(self.log, self.seq.tick(), MODULE, "rejected: {}", err.message());
        err
    }

    fn record_failure(&mut self, kind: Error, operation: &str) -> UpdateError {
        let err = UpdateError::with_fmt(
            Error::BootRecordFailed,
            format_args!("{operation}: boot record not written, {}", kind.description()),
        );
        self.last_status = err.status().clone();
        log_error!(self.log, self.seq.tick(), MODULE, "{}", err.message());
        err
    }

    /// Close the session on an error and return it
    fn fail_session(&mut self, phase: Phase, err: UpdateError) -> UpdateError {
        self.close_session(phase, Some(err.kind()), err.status());
        log_error!(self.log, self.seq.tick(), MODULE, "{} ({})", err.message(), phase);
        err
    }

    /// Terminate the session and erase whatever it wrote
    fn close_session(&mut self, phase: Phase, failure: Option<Error>, message: &StatusMessage) {
        if let Some(session) = self.session.as_mut() {
            session.ctx.terminate(phase, failure, message);
            let region = self.layout.slot(session.ctx.staging_slot());
            let mark = session.ctx.erase_mark();
            if mark > 0 {
                match self.flash.erase_range(region.start, region.start + mark) {
                    Ok(()) => session.ctx.clear_dirty(),
                    Err(e) => log_warn!(
                        self.log,
                        self.seq.tick(),
                        MODULE,
                        "staging release failed: {}",
                        e
                    ),
                }
            }
        }
        self.last_status = message.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::sha3_256;
    use crate::manifest::{Manifest, PartDescriptor};
    use ota_hal::sim::{RamFlash, SIM_LAYOUT};
    use std::string::{String, ToString};

    fn config() -> SystemConfig {
        SystemConfig {
            layout: SIM_LAYOUT,
            ..SystemConfig::default()
        }
    }

    fn updater() -> Updater<RamFlash> {
        Updater::open(RamFlash::new(), &config()).unwrap()
    }

    fn hex_of(data: &[u8]) -> String {
        sha3_256(data).to_string()
    }

    #[test]
    fn test_open_blank_device() {
        let u = updater();
        assert_eq!(u.phase(), Phase::Idle);
        assert!(!u.is_busy());
        assert_eq!(u.boot_record().active, ota_common::Slot::A);
        assert!(u.log().contains("active slot A"));
    }

    #[test]
    fn test_open_rejects_bad_config() {
        let mut cfg = config();
        cfg.update.write_align = 3;
        let err = Updater::open(RamFlash::new(), &cfg).err().unwrap();
        assert_eq!(err.kind(), Error::InvalidParameter);
    }

    #[test]
    fn test_out_of_order_file_is_rejected_without_closing() {
        let a = [1u8; 8];
        let b = [2u8; 8];
        let (ha, hb) = (hex_of(&a), hex_of(&b));
        let manifest = Manifest::from_parts(&[
            PartDescriptor::new("a.bin", "app", 8, &ha),
            PartDescriptor::new("b.img", "fs", 8, &hb),
        ])
        .unwrap();

        let mut u = updater();
        let h = u.begin(&manifest).unwrap();
        let err = u.file_begin(h, "b.img").unwrap_err();
        assert_eq!(err.kind(), Error::InvalidState);
        assert_eq!(u.phase(), Phase::Begun);
        assert_eq!(u.next_pending_file(), Some("a.bin"));

        assert_eq!(u.file_begin(h, "a.bin").unwrap(), Decision::Process);
        let err = u.file_data(h, "b.img", &b).unwrap_err();
        assert_eq!(err.kind(), Error::InvalidState);
        assert_eq!(u.phase(), Phase::Processing);
    }

    #[test]
    fn test_abort_releases_staging() {
        let data = [0x5Au8; 1500];
        let sum = hex_of(&data);
        let manifest = Manifest::from_parts(&[PartDescriptor::new("a.bin", "app", 1500, &sum)]).unwrap();

        let mut u = updater();
        let h = u.begin(&manifest).unwrap();
        u.file_begin(h, "a.bin").unwrap();
        assert_eq!(u.file_data(h, "a.bin", &data[..1024]).unwrap(), 1024);
        u.abort(h, "link lost").unwrap();

        assert_eq!(u.phase(), Phase::Aborted);
        assert_eq!(u.last_status().as_str(), "aborted: link lost");
        assert!(u.flash().peek(SIM_LAYOUT.slot_b.start, 2048).iter().all(|&b| b == 0xFF));
        assert_eq!(u.context().unwrap().staging_state(), SlotState::Empty);
        assert_eq!(u.abort(h, "again").unwrap_err().kind(), Error::InvalidState);
    }

    #[test]
    fn test_status_follows_handle() {
        let data = [7u8; 4];
        let sum = hex_of(&data);
        let manifest = Manifest::from_parts(&[PartDescriptor::new("a.bin", "app", 4, &sum)]).unwrap();

        let mut u = updater();
        let first = u.begin(&manifest).unwrap();
        u.abort(first, "restart").unwrap();
        let second = u.begin(&manifest).unwrap();
        assert_ne!(first, second);
        assert_eq!(u.status(first).unwrap_err().kind(), Error::InvalidSession);
        assert!(u.status(second).unwrap().as_str().starts_with("begun"));
    }

    #[test]
    fn test_inventory_must_fit_active_slot() {
        let mut u = updater();
        let mut inventory = Inventory::new();
        inventory
            .push(crate::policy::InstalledPart {
                name: ota_common::FileName::new("fs.img").unwrap(),
                size: 0x100,
                digest: ota_common::Digest::default(),
                offset: SIM_LAYOUT.slot_a.size - 0x80,
            })
            .unwrap();
        assert_eq!(u.set_inventory(inventory).unwrap_err().kind(), Error::InvalidParameter);
    }
}
