// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Manifest view
//!
//! The manifest text format belongs to an external parser. The engine only
//! sees the result through [`ManifestView`]: an ordered sequence of part
//! descriptors plus a few optional bundle-level fields. [`Manifest`] is a
//! ready-made view for parsers that already hold borrowed strings.

use heapless::Vec;

use ota_common::constants::{MAX_PARTS, MAX_PART_TYPE_LEN};
use ota_common::{DestinationClass, Digest, Error, FileName};

use crate::error::{UpdateError, UpdateResult};
use crate::integrity::parse_digest;

/// One part as it appears in the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartDescriptor<'a> {
    /// Part name, used as the file name in every per-file call
    pub name: &'a str,
    /// Destination class tag (`app`, `fs`, `boot`, ...)
    pub part_type: &'a str,
    /// Declared size in bytes
    pub size: u32,
    /// Hex-encoded SHA3-256 of the content
    pub checksum: &'a str,
}

impl<'a> PartDescriptor<'a> {
    /// Create a descriptor
    #[must_use]
    pub const fn new(name: &'a str, part_type: &'a str, size: u32, checksum: &'a str) -> Self {
        Self {
            name,
            part_type,
            size,
            checksum,
        }
    }

    /// Check every field and resolve the destination class
    ///
    /// An unrecognised tag is not an error here: it resolves to
    /// [`DestinationClass::Unknown`] and is refused when the file starts.
    pub fn validate(&self) -> UpdateResult<ValidatedPart> {
        if self.name.is_empty() {
            return Err(UpdateError::new(Error::InvalidManifest, "part without a name"));
        }
        let name = FileName::new(self.name).map_err(|_| {
            UpdateError::with_fmt(
                Error::InvalidManifest,
                format_args!("part name longer than {} bytes", FileName::CAPACITY),
            )
        })?;
        if self.size == 0 {
            return Err(UpdateError::with_fmt(
                Error::InvalidManifest,
                format_args!("{}: zero size", self.name),
            ));
        }
        if self.part_type.is_empty() || self.part_type.len() > MAX_PART_TYPE_LEN {
            return Err(UpdateError::with_fmt(
                Error::InvalidManifest,
                format_args!("{}: no destination type", self.name),
            ));
        }
        let digest = parse_digest(self.checksum).ok_or_else(|| {
            UpdateError::with_fmt(
                Error::InvalidManifest,
                format_args!("{}: malformed checksum", self.name),
            )
        })?;

        Ok(ValidatedPart {
            name,
            class: DestinationClass::from_tag(self.part_type),
            size: self.size,
            digest,
        })
    }
}

/// Part descriptor after validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPart {
    /// Bounded name
    pub name: FileName,
    /// Resolved destination class
    pub class: DestinationClass,
    /// Declared size
    pub size: u32,
    /// Expected content digest
    pub digest: Digest,
}

/// Read-only access to a parsed manifest
pub trait ManifestView {
    /// Number of parts
    fn part_count(&self) -> usize;

    /// Part at `index`, in manifest order
    fn part(&self, index: usize) -> Option<PartDescriptor<'_>>;

    /// Platform the bundle was built for
    fn platform(&self) -> Option<&str> {
        None
    }

    /// Bundle version string
    fn version(&self) -> Option<&str> {
        None
    }

    /// Hex SHA3-256 over the concatenated part digests
    fn bundle_checksum(&self) -> Option<&str> {
        None
    }
}

/// Manifest assembled from borrowed parser output
#[derive(Debug, Clone, Default)]
pub struct Manifest<'a> {
    parts: Vec<PartDescriptor<'a>, MAX_PARTS>,
    platform: Option<&'a str>,
    version: Option<&'a str>,
    bundle_checksum: Option<&'a str>,
}

impl<'a> Manifest<'a> {
    /// Create an empty manifest
    #[must_use]
    pub const fn new() -> Self {
        Self {
            parts: Vec::new(),
            platform: None,
            version: None,
            bundle_checksum: None,
        }
    }

    /// Append a part; fails once the part limit is reached
    pub fn push(&mut self, part: PartDescriptor<'a>) -> UpdateResult<()> {
        self.parts.push(part).map_err(|_| {
            UpdateError::with_fmt(
                Error::InvalidManifest,
                format_args!("more than {MAX_PARTS} parts"),
            )
        })
    }

    /// Build from a slice of parts
    pub fn from_parts(parts: &[PartDescriptor<'a>]) -> UpdateResult<Self> {
        let mut manifest = Self::new();
        for part in parts {
            manifest.push(*part)?;
        }
        Ok(manifest)
    }

    /// Set the platform tag
    #[must_use]
    pub fn with_platform(mut self, platform: &'a str) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Set the version string
    #[must_use]
    pub fn with_version(mut self, version: &'a str) -> Self {
        self.version = Some(version);
        self
    }

    /// Set the bundle checksum
    #[must_use]
    pub fn with_bundle_checksum(mut self, checksum: &'a str) -> Self {
        self.bundle_checksum = Some(checksum);
        self
    }

    /// Parts in manifest order
    #[must_use]
    pub fn parts(&self) -> &[PartDescriptor<'a>] {
        &self.parts
    }
}

impl ManifestView for Manifest<'_> {
    fn part_count(&self) -> usize {
        self.parts.len()
    }

    fn part(&self, index: usize) -> Option<PartDescriptor<'_>> {
        self.parts.get(index).copied()
    }

    fn platform(&self) -> Option<&str> {
        self.platform
    }

    fn version(&self) -> Option<&str> {
        self.version
    }

    fn bundle_checksum(&self) -> Option<&str> {
        self.bundle_checksum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUM: &str = "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a";

    #[test]
    fn test_valid_part() {
        let part = PartDescriptor::new("app.bin", "app", 100, SUM).validate().unwrap();
        assert_eq!(part.name, "app.bin");
        assert_eq!(part.class, DestinationClass::Firmware);
        assert_eq!(part.size, 100);
    }

    #[test]
    fn test_missing_fields_rejected() {
        for part in [
            PartDescriptor::new("", "app", 1, SUM),
            PartDescriptor::new("a", "app", 0, SUM),
            PartDescriptor::new("a", "", 1, SUM),
            PartDescriptor::new("a", "app", 1, "abc"),
        ] {
            assert_eq!(part.validate().unwrap_err().kind(), Error::InvalidManifest);
        }
    }

    #[test]
    fn test_long_name_is_error_not_truncated() {
        let long = "n".repeat(FileName::CAPACITY + 1);
        let err = PartDescriptor::new(&long, "app", 1, SUM).validate().unwrap_err();
        assert_eq!(err.kind(), Error::InvalidManifest);
        assert!(err.message().contains("longer than 49"));
    }

    #[test]
    fn test_unknown_tag_resolves_to_unknown() {
        let part = PartDescriptor::new("x", "spiffs", 1, SUM).validate().unwrap();
        assert_eq!(part.class, DestinationClass::Unknown);
    }

    #[test]
    fn test_part_limit() {
        let mut manifest = Manifest::new();
        for _ in 0..MAX_PARTS {
            manifest.push(PartDescriptor::new("p", "app", 1, SUM)).unwrap();
        }
        let err = manifest.push(PartDescriptor::new("p", "app", 1, SUM)).unwrap_err();
        assert_eq!(err.kind(), Error::InvalidManifest);
        assert_eq!(manifest.part_count(), MAX_PARTS);
    }

    #[test]
    fn test_view_fields() {
        let manifest = Manifest::from_parts(&[PartDescriptor::new("a", "fs", 4, SUM)])
            .unwrap()
            .with_platform("stm32")
            .with_version("1.2.0");
        assert_eq!(manifest.platform(), Some("stm32"));
        assert_eq!(manifest.version(), Some("1.2.0"));
        assert_eq!(manifest.bundle_checksum(), None);
        assert_eq!(manifest.part(0).map(|p| p.part_type), Some("fs"));
        assert!(manifest.part(1).is_none());
    }
}
