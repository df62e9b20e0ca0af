// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! File processor
//!
//! Streams one file at a time into its staging placement. Writes are cut to
//! the flash programming granularity; whatever does not fill a whole unit
//! is left for the caller to offer again (or to pass as the tail to
//! [`FileProcessor::end`]). Every write is read back before it counts.
//!
//! # Per-file flow
//!
//! ```text
//! start ──► data* ──► end           (Process)
//! copy_installed                    (Skip)
//! ```

use ota_common::constants::{ERASED_BYTE, FLASH_IO_CHUNK, MAX_WRITE_ALIGN};
use ota_common::Error;
use ota_hal::FlashInterface;

use crate::context::{FileInfo, FileState};
use crate::integrity::{hash_flash, ContentHasher};

/// Round `value` up to a multiple of `align` (a power of two)
#[must_use]
pub const fn align_up(value: u32, align: u32) -> u32 {
    (value + align - 1) & !(align - 1)
}

/// Absolute address range `[start, end)` a file may occupy, page rounded
#[must_use]
pub fn placement_span(base: u32, file: &FileInfo, page_size: u32) -> (u32, u32) {
    let start = base + file.destination().offset;
    let end = base + align_up(file.destination().offset + file.declared_size(), page_size);
    (start, end)
}

/// Program `data` at `address` and read it back
fn program<F: FlashInterface>(flash: &mut F, address: u32, data: &[u8]) -> Result<(), Error> {
    flash.write(address, data)?;
    if !flash.verify(address, data)? {
        return Err(Error::WriteFailed);
    }
    Ok(())
}

/// Streaming writer for the file currently in `Processing`
pub struct FileProcessor {
    hasher: ContentHasher,
    write_align: u32,
    page_size: u32,
}

impl FileProcessor {
    /// Create a processor for the given programming granularity
    #[must_use]
    pub fn new(write_align: u32, page_size: u32) -> Self {
        Self {
            hasher: ContentHasher::new(),
            write_align: write_align.clamp(1, MAX_WRITE_ALIGN),
            page_size,
        }
    }

    /// Erase the file's placement and begin hashing
    ///
    /// `base` is the absolute start of the staging slot.
    pub fn start<F: FlashInterface>(
        &mut self,
        flash: &mut F,
        base: u32,
        file: &mut FileInfo,
    ) -> Result<(), Error> {
        if file.state() != FileState::NotStarted {
            return Err(Error::InvalidState);
        }
        let (start, end) = placement_span(base, file, self.page_size);
        flash.erase_range(start, end)?;
        self.hasher = ContentHasher::new();
        file.set_state(FileState::Processing);
        Ok(())
    }

    /// Write the largest aligned prefix of `chunk` that fits the file
    ///
    /// Returns the number of bytes consumed, possibly zero.
    pub fn data<F: FlashInterface>(
        &mut self,
        flash: &mut F,
        base: u32,
        file: &mut FileInfo,
        chunk: &[u8],
    ) -> Result<usize, Error> {
        if file.state() != FileState::Processing {
            return Err(Error::InvalidState);
        }

        let align = self.write_align as usize;
        let mut take = chunk.len().min(file.remaining() as usize);
        take -= take % align;
        if take == 0 {
            return Ok(0);
        }

        let address = base + file.destination().offset + file.processed_bytes();
        program(flash, address, &chunk[..take])?;
        self.hasher.update(&chunk[..take]);
        file.advance(take as u32);
        Ok(take)
    }

    /// Write the final bytes and check size and digest
    ///
    /// `tail` must be exactly what is left of the file. A short or long
    /// tail and a digest mismatch both fail with
    /// [`Error::ChecksumMismatch`].
    pub fn end<F: FlashInterface>(
        &mut self,
        flash: &mut F,
        base: u32,
        file: &mut FileInfo,
        tail: &[u8],
    ) -> Result<usize, Error> {
        if file.state() != FileState::Processing {
            return Err(Error::InvalidState);
        }
        if tail.len() != file.remaining() as usize {
            return Err(Error::ChecksumMismatch);
        }

        let align = self.write_align as usize;
        let address = base + file.destination().offset + file.processed_bytes();
        let aligned = tail.len() - tail.len() % align;
        if aligned > 0 {
            program(flash, address, &tail[..aligned])?;
        }

        let rest = &tail[aligned..];
        if !rest.is_empty() {
            let mut pad = [ERASED_BYTE; MAX_WRITE_ALIGN as usize];
            pad[..rest.len()].copy_from_slice(rest);
            program(flash, address + aligned as u32, &pad[..align])?;
        }

        self.hasher.update(tail);
        file.advance(tail.len() as u32);

        if self.hasher.finish() != *file.expected_digest() {
            return Err(Error::ChecksumMismatch);
        }
        file.set_state(FileState::Completed);
        Ok(tail.len())
    }

    /// Complete a skipped file by copying the installed bytes
    ///
    /// The copy is re-hashed on the way; a source that no longer matches
    /// the expected digest fails with [`Error::ChecksumMismatch`].
    pub fn copy_installed<F: FlashInterface>(
        &mut self,
        flash: &mut F,
        base: u32,
        file: &mut FileInfo,
        source: u32,
    ) -> Result<(), Error> {
        if file.state() != FileState::NotStarted {
            return Err(Error::InvalidState);
        }
        let (start, end) = placement_span(base, file, self.page_size);
        flash.erase_range(start, end)?;

        let mut hasher = ContentHasher::new();
        let mut buf = [0u8; FLASH_IO_CHUNK];
        let total = file.declared_size();
        let mut done = 0u32;

        while done < total {
            let n = ((total - done) as usize).min(buf.len());
            flash.read(source + done, &mut buf[..n])?;
            hasher.update(&buf[..n]);

            // Only the last chunk can be short
            let padded = align_up(n as u32, self.write_align) as usize;
            buf[n..padded].fill(ERASED_BYTE);
            program(flash, start + done, &buf[..padded])?;
            done += n as u32;
        }

        if hasher.finish() != *file.expected_digest() {
            return Err(Error::ChecksumMismatch);
        }
        file.advance(total);
        file.set_state(FileState::Skipped);
        Ok(())
    }

    /// Re-read a finished file from flash and compare its digest
    pub fn verify_stored<F: FlashInterface>(
        flash: &F,
        base: u32,
        file: &FileInfo,
    ) -> Result<bool, Error> {
        let address = base + file.destination().offset;
        let digest = hash_flash(flash, address, file.declared_size())?;
        Ok(digest == *file.expected_digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Destination;
    use crate::integrity::sha3_256;
    use ota_common::{DestinationClass, Digest, FileName, Slot};
    use ota_hal::sim::{RamFlash, SIM_LAYOUT};

    const BASE: u32 = SIM_LAYOUT.slot_b.start;
    const PAGE: u32 = 1024;

    fn file(size: u32, digest: Digest) -> FileInfo {
        FileInfo::new(
            FileName::new("app.bin").unwrap(),
            size,
            Destination {
                class: DestinationClass::Firmware,
                slot: Slot::B,
                offset: 0,
            },
            digest,
        )
    }

    fn image(len: usize) -> std::vec::Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 4), 0);
        assert_eq!(align_up(1, 4), 4);
        assert_eq!(align_up(1024, 1024), 1024);
        assert_eq!(align_up(1025, 1024), 2048);
    }

    #[test]
    fn test_partial_consumption_and_tail_padding() {
        let data = image(10);
        let mut flash = RamFlash::new();
        let mut f = file(10, sha3_256(&data));
        let mut p = FileProcessor::new(4, PAGE);

        p.start(&mut flash, BASE, &mut f).unwrap();
        // Three bytes cannot fill one programming unit
        assert_eq!(p.data(&mut flash, BASE, &mut f, &data[..3]).unwrap(), 0);
        assert_eq!(p.data(&mut flash, BASE, &mut f, &data[..7]).unwrap(), 4);
        assert_eq!(p.data(&mut flash, BASE, &mut f, &data[4..]).unwrap(), 4);
        assert_eq!(f.processed_bytes(), 8);
        assert_eq!(p.end(&mut flash, BASE, &mut f, &data[8..]).unwrap(), 2);

        assert_eq!(f.state(), FileState::Completed);
        assert_eq!(flash.peek(BASE, 10), &data[..]);
        assert_eq!(flash.peek(BASE + 10, 2), &[0xFF, 0xFF]);
    }

    #[test]
    fn test_data_never_passes_declared_size() {
        let data = image(64);
        let mut flash = RamFlash::new();
        let mut f = file(16, sha3_256(&data[..16]));
        let mut p = FileProcessor::new(4, PAGE);
        p.start(&mut flash, BASE, &mut f).unwrap();
        assert_eq!(p.data(&mut flash, BASE, &mut f, &data).unwrap(), 16);
        assert_eq!(p.data(&mut flash, BASE, &mut f, &data).unwrap(), 0);
        assert_eq!(p.end(&mut flash, BASE, &mut f, &[]).unwrap(), 0);
    }

    #[test]
    fn test_wrong_tail_length_is_checksum_error() {
        let data = image(8);
        let mut flash = RamFlash::new();
        let mut f = file(8, sha3_256(&data));
        let mut p = FileProcessor::new(4, PAGE);
        p.start(&mut flash, BASE, &mut f).unwrap();
        p.data(&mut flash, BASE, &mut f, &data[..4]).unwrap();
        assert_eq!(p.end(&mut flash, BASE, &mut f, &data[4..7]), Err(Error::ChecksumMismatch));
    }

    #[test]
    fn test_digest_mismatch() {
        let data = image(8);
        let mut flash = RamFlash::new();
        let mut f = file(8, Digest::new([0; 32]));
        let mut p = FileProcessor::new(4, PAGE);
        p.start(&mut flash, BASE, &mut f).unwrap();
        assert_eq!(p.end(&mut flash, BASE, &mut f, &data), Err(Error::ChecksumMismatch));
        assert_eq!(f.state(), FileState::Processing);
    }

    #[test]
    fn test_write_fault_surfaces_as_write_failed() {
        let data = image(8);
        let mut flash = RamFlash::new();
        let mut f = file(8, sha3_256(&data));
        let mut p = FileProcessor::new(4, PAGE);
        p.start(&mut flash, BASE, &mut f).unwrap();
        flash.fail_next_writes(1);
        assert_eq!(p.data(&mut flash, BASE, &mut f, &data), Err(Error::WriteFailed));
        assert_eq!(f.processed_bytes(), 0);
    }

    #[test]
    fn test_copy_installed_and_verify() {
        let data = image(700);
        let source = SIM_LAYOUT.slot_a.start + 0x400;
        let mut flash = RamFlash::new();
        flash.write(source, &data).unwrap();

        let mut f = file(700, sha3_256(&data));
        let mut p = FileProcessor::new(8, PAGE);
        p.copy_installed(&mut flash, BASE, &mut f, source).unwrap();
        assert_eq!(f.state(), FileState::Skipped);
        assert_eq!(f.processed_bytes(), 700);
        assert_eq!(flash.peek(BASE, 700), &data[..]);
        assert!(FileProcessor::verify_stored(&flash, BASE, &f).unwrap());

        flash.poke(BASE + 5, &[0x00]);
        assert!(!FileProcessor::verify_stored(&flash, BASE, &f).unwrap());
    }

    #[test]
    fn test_copy_of_changed_source_rejected() {
        let data = image(32);
        let source = SIM_LAYOUT.slot_a.start;
        let mut flash = RamFlash::new();
        flash.write(source, &data).unwrap();
        flash.poke(source, &[0x42]);

        let mut f = file(32, sha3_256(&data));
        let mut p = FileProcessor::new(4, PAGE);
        assert_eq!(
            p.copy_installed(&mut flash, BASE, &mut f, source),
            Err(Error::ChecksumMismatch)
        );
    }
}
