// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Common types for the OTA engine
//!
//! Bounded text, digests, firmware slots and flash regions. Nothing here
//! allocates; every buffer has a compile-time capacity.

use core::fmt::{self, Write};
use heapless::String;

use crate::constants::{DIGEST_SIZE, MAX_FILE_NAME_LEN, MAX_STATUS_LEN};
use crate::errors::Error;

// ============================================================================
// Bounded Text
// ============================================================================

/// Text with a fixed maximum length where overflow is an error
///
/// Construction never clips: a value that does not fit is rejected with
/// [`Error::NameTooLong`].
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct BoundedStr<const N: usize>(String<N>);

impl<const N: usize> BoundedStr<N> {
    /// Maximum length in bytes
    pub const CAPACITY: usize = N;

    /// Create from a string slice, failing if it exceeds the capacity
    pub fn new(text: &str) -> Result<Self, Error> {
        let mut inner = String::new();
        inner.push_str(text).map_err(|()| Error::NameTooLong)?;
        Ok(Self(inner))
    }

    /// Borrow as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the text is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> TryFrom<&str> for BoundedStr<N> {
    type Error = Error;

    fn try_from(text: &str) -> Result<Self, Self::Error> {
        Self::new(text)
    }
}

impl<const N: usize> PartialEq<str> for BoundedStr<N> {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl<const N: usize> PartialEq<&str> for BoundedStr<N> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl<const N: usize> fmt::Debug for BoundedStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl<const N: usize> fmt::Display for BoundedStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of a part/file inside a manifest
pub type FileName = BoundedStr<MAX_FILE_NAME_LEN>;

/// Append `text` to `buf`, dropping whatever does not fit
///
/// Cuts on a char boundary so the buffer always holds valid UTF-8.
pub fn push_truncated<const N: usize>(buf: &mut String<N>, text: &str) {
    let room = N - buf.len();
    if text.len() <= room {
        // Fits entirely
        let _ = buf.push_str(text);
        return;
    }
    let mut cut = room;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let _ = buf.push_str(&text[..cut]);
}

struct Truncating<'a, const N: usize>(&'a mut String<N>);

impl<const N: usize> Write for Truncating<'_, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        push_truncated(self.0, s);
        Ok(())
    }
}

/// Format `args` into `buf`, truncating at capacity
pub fn write_truncated<const N: usize>(buf: &mut String<N>, args: fmt::Arguments<'_>) {
    let _ = Truncating(buf).write_fmt(args);
}

/// Human-readable status of an update session
///
/// Overwritten on each transition. Unlike [`FileName`], a status message
/// is diagnostic text and is clipped at capacity.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct StatusMessage(String<MAX_STATUS_LEN>);

impl StatusMessage {
    /// Create an empty status message
    #[must_use]
    pub const fn new() -> Self {
        Self(String::new())
    }

    /// Create from formatted arguments
    #[must_use]
    pub fn from_fmt(args: fmt::Arguments<'_>) -> Self {
        let mut msg = Self::new();
        msg.set_fmt(args);
        msg
    }

    /// Replace the message with `text`
    pub fn set(&mut self, text: &str) {
        self.0.clear();
        push_truncated(&mut self.0, text);
    }

    /// Replace the message with formatted arguments
    pub fn set_fmt(&mut self, args: fmt::Arguments<'_>) {
        self.0.clear();
        write_truncated(&mut self.0, args);
    }

    /// Borrow as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for StatusMessage {
    fn from(text: &str) -> Self {
        let mut msg = Self::new();
        msg.set(text);
        msg
    }
}

impl fmt::Debug for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Digest
// ============================================================================

/// SHA3-256 content digest
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
    /// Size of digest in bytes
    pub const SIZE: usize = DIGEST_SIZE;

    /// Create from raw bytes
    #[must_use]
    pub const fn new(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the digest bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }
}

impl From<[u8; DIGEST_SIZE]> for Digest {
    fn from(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest(")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "...)")
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut text = [0u8; Self::SIZE * 2];
        hex::encode_to_slice(self.0, &mut text).map_err(|_| fmt::Error)?;
        f.write_str(core::str::from_utf8(&text).map_err(|_| fmt::Error)?)
    }
}

// ============================================================================
// Slots
// ============================================================================

/// Firmware slot identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Slot {
    /// Slot A
    A = 0,
    /// Slot B
    B = 1,
}

impl Slot {
    /// Get the other slot
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    /// Decode a persisted slot byte
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::A),
            1 => Some(Self::B),
            _ => None,
        }
    }

    /// Slot letter for messages
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SlotState {
    /// No usable image
    Empty = 0,
    /// An update session is writing into the slot
    Staging = 1,
    /// Image fully written and verified, waiting to be booted
    Staged = 2,
    /// Slot the device runs from
    Active = 3,
    /// Image failed its boot trial and must not be retried
    Invalid = 4,
}

impl SlotState {
    /// Decode a persisted state byte
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Empty),
            1 => Some(Self::Staging),
            2 => Some(Self::Staged),
            3 => Some(Self::Active),
            4 => Some(Self::Invalid),
            _ => None,
        }
    }

    /// Whether a bootloader may jump into a slot in this state
    #[must_use]
    pub const fn is_bootable(self) -> bool {
        matches!(self, Self::Staged | Self::Active)
    }
}

// ============================================================================
// Flash Regions
// ============================================================================

/// Contiguous flash region `[start, start + size)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Absolute start address
    pub start: u32,
    /// Size in bytes
    pub size: u32,
}

impl Region {
    /// Create a new region
    #[must_use]
    pub const fn new(start: u32, size: u32) -> Self {
        Self { start, size }
    }

    /// Exclusive end address
    #[must_use]
    pub const fn end(&self) -> u32 {
        self.start + self.size
    }

    /// Whether `[offset, offset + len)` relative to the start lies inside
    #[must_use]
    pub const fn contains_span(&self, offset: u32, len: u32) -> bool {
        match offset.checked_add(len) {
            Some(end) => end <= self.size,
            None => false,
        }
    }

    /// Whether two regions share any byte
    #[must_use]
    pub const fn overlaps(&self, other: &Region) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

// ============================================================================
// Destination Classes
// ============================================================================

/// Class of destination a manifest part is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationClass {
    /// Application firmware image
    Firmware,
    /// Filesystem / data image shipped alongside the firmware
    Data,
    /// Bootloader image
    Bootloader,
    /// Tag this build does not recognise
    Unknown,
}

impl DestinationClass {
    /// Resolve a manifest type tag
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "app" | "firmware" => Self::Firmware,
            "fs" | "data" => Self::Data,
            "boot" | "bootloader" => Self::Bootloader,
            _ => Self::Unknown,
        }
    }

    /// Flag bit for this class; `Unknown` maps to no bit
    #[must_use]
    pub const fn flag(self) -> DestinationClasses {
        match self {
            Self::Firmware => DestinationClasses::FIRMWARE,
            Self::Data => DestinationClasses::DATA,
            Self::Bootloader => DestinationClasses::BOOTLOADER,
            Self::Unknown => DestinationClasses::empty(),
        }
    }
}

bitflags::bitflags! {
    /// Set of destination classes a device accepts
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DestinationClasses: u8 {
        /// Application firmware
        const FIRMWARE = 0x01;
        /// Filesystem / data image
        const DATA = 0x02;
        /// Bootloader
        const BOOTLOADER = 0x04;
    }
}

impl DestinationClasses {
    /// Whether `class` is accepted
    #[must_use]
    pub fn supports(self, class: DestinationClass) -> bool {
        let flag = class.flag();
        !flag.is_empty() && self.contains(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_str_rejects_overflow() {
        let exact = [b'x'; MAX_FILE_NAME_LEN];
        let exact = core::str::from_utf8(&exact).unwrap();
        assert_eq!(FileName::new(exact).unwrap().len(), MAX_FILE_NAME_LEN);

        let long = [b'x'; MAX_FILE_NAME_LEN + 1];
        let long = core::str::from_utf8(&long).unwrap();
        assert_eq!(FileName::new(long), Err(Error::NameTooLong));
    }

    #[test]
    fn test_push_truncated_respects_char_boundary() {
        let mut buf: String<4> = String::new();
        push_truncated(&mut buf, "abé!");
        // 'é' is two bytes, so "abé" fills exactly four bytes
        assert_eq!(buf.as_str(), "abé");

        let mut buf: String<3> = String::new();
        push_truncated(&mut buf, "abé");
        assert_eq!(buf.as_str(), "ab");
    }

    #[test]
    fn test_status_message_overwrites() {
        let mut msg = StatusMessage::from("first");
        msg.set_fmt(format_args!("file {} done", 3));
        assert_eq!(msg.as_str(), "file 3 done");
    }

    #[test]
    fn test_slot_other_and_decode() {
        assert_eq!(Slot::A.other(), Slot::B);
        assert_eq!(Slot::B.other().other(), Slot::B);
        assert_eq!(Slot::from_u8(1), Some(Slot::B));
        assert_eq!(Slot::from_u8(0xFF), None);
    }

    #[test]
    fn test_slot_state_bootable() {
        assert!(!SlotState::Empty.is_bootable());
        assert!(!SlotState::Staging.is_bootable());
        assert!(SlotState::Staged.is_bootable());
        assert!(SlotState::Active.is_bootable());
        assert!(!SlotState::Invalid.is_bootable());
    }

    #[test]
    fn test_destination_class_tags() {
        assert_eq!(DestinationClass::from_tag("app"), DestinationClass::Firmware);
        assert_eq!(DestinationClass::from_tag("fs"), DestinationClass::Data);
        assert_eq!(DestinationClass::from_tag("bootloader"), DestinationClass::Bootloader);
        assert_eq!(DestinationClass::from_tag("spiffs"), DestinationClass::Unknown);

        let accepted = DestinationClasses::FIRMWARE | DestinationClasses::DATA;
        assert!(accepted.supports(DestinationClass::Data));
        assert!(!accepted.supports(DestinationClass::Bootloader));
        assert!(!DestinationClasses::all().supports(DestinationClass::Unknown));
    }

    #[test]
    fn test_region_span_and_overlap() {
        let a = Region::new(0x1000, 0x1000);
        let b = Region::new(0x2000, 0x1000);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&Region::new(0x1FFF, 2)));
        assert!(a.contains_span(0xF00, 0x100));
        assert!(!a.contains_span(0xF00, 0x101));
        assert!(!a.contains_span(u32::MAX, 2));
    }
}
