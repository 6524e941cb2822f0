//! Core value types shared by the Mach-O readers.
//!
//! This module defines the small, serialisable building blocks used
//! throughout the parsed tree: bit-width variants, byte ranges, fixed-size
//! names, header and protection flags, packed versions and parse options.

use bitflags::bitflags;
use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;

/// Address width of a Mach-O image or record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Width {
    /// 32-bit (`mach_header`, `segment_command`, `section`).
    Bits32,
    /// 64-bit (`mach_header_64`, `segment_command_64`, `section_64`).
    Bits64,
}

impl Width {
    /// Number of address bits.
    pub fn bits(self) -> u8 {
        match self {
            Width::Bits32 => 32,
            Width::Bits64 => 64,
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// An offset and size pair.
///
/// What the offset is relative to depends on where the range came from;
/// ranges taken from link-edit data commands are relative to the start of
/// the owning Mach header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    /// Start offset
    pub offset: u64,
    /// Length in bytes
    pub size: u64,
}

impl ByteRange {
    /// Create a new range.
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// One past the last byte, saturating on overflow.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }

    /// Returns true if the range covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}..0x{:X} ({} bytes)", self.offset, self.end(), self.size)
    }
}

/// A 16-byte, null-padded name as stored in segment and section records.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FixedName(pub [u8; 16]);

impl FixedName {
    /// The name up to the first null byte, lossily decoded.
    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(trim_nul(&self.0))
    }

    /// Raw, padded bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl From<&str> for FixedName {
    fn from(name: &str) -> Self {
        let mut raw = [0u8; 16];
        let len = name.len().min(16);
        raw[..len].copy_from_slice(&name.as_bytes()[..len]);
        FixedName(raw)
    }
}

impl PartialEq<str> for FixedName {
    fn eq(&self, other: &str) -> bool {
        trim_nul(&self.0) == other.as_bytes()
    }
}

impl fmt::Debug for FixedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for FixedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.as_str())
    }
}

impl Serialize for FixedName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_str())
    }
}

/// Slice up to (not including) the first null byte.
pub(crate) fn trim_nul(bytes: &[u8]) -> &[u8] {
    match memchr::memchr(0, bytes) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

/// Decode a null-terminated string from trailing command bytes.
pub(crate) fn c_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(trim_nul(bytes)).into_owned()
}

bitflags! {
    /// Mach header flags. Unknown bits are retained.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct HeaderFlags: u32 {
        /// The object file has no undefined references
        const NOUNDEFS = 0x1;
        /// The object file is the output of an incremental link
        const INCRLINK = 0x2;
        /// The object file is input for the dynamic linker
        const DYLDLINK = 0x4;
        /// Undefined references are bound by the dynamic linker when loaded
        const BINDATLOAD = 0x8;
        /// Dynamic undefined references are prebound
        const PREBOUND = 0x10;
        /// Read-only and read-write segments are split
        const SPLIT_SEGS = 0x20;
        /// The image uses two-level name space bindings
        const TWOLEVEL = 0x80;
        /// All images are forced to flat name space bindings
        const FORCE_FLAT = 0x100;
        /// Safe to divide sections into sub-sections via symbols
        const SUBSECTIONS_VIA_SYMBOLS = 0x2000;
        /// The image contains external weak symbols
        const WEAK_DEFINES = 0x8000;
        /// The image uses weak symbols
        const BINDS_TO_WEAK = 0x10000;
        /// All stacks are given stack execution privilege
        const ALLOW_STACK_EXECUTION = 0x20000;
        /// Load the main executable at a random address
        const PIE = 0x200000;
        /// Contains a thread-local variables section
        const HAS_TLV_DESCRIPTORS = 0x800000;
        /// Run with a non-executable heap
        const NO_HEAP_EXECUTION = 0x1000000;
        /// Linked for use in an application extension
        const APP_EXTENSION_SAFE = 0x2000000;
        /// The dylib is part of the dyld shared cache
        const DYLIB_IN_CACHE = 0x80000000;
    }
}

bitflags! {
    /// Virtual memory protections of a segment. Unknown bits are retained.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct VmProt: u32 {
        /// Readable
        const READ = 0x1;
        /// Writable
        const WRITE = 0x2;
        /// Executable
        const EXECUTE = 0x4;
    }
}

impl fmt::Display for VmProt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = if self.contains(VmProt::READ) { 'r' } else { '-' };
        let w = if self.contains(VmProt::WRITE) { 'w' } else { '-' };
        let x = if self.contains(VmProt::EXECUTE) { 'x' } else { '-' };
        write!(f, "{r}{w}{x}")
    }
}

/// A version packed as `xxxx.yy.zz` nibbles, as used by dylib records.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackedVersion(pub u32);

impl PackedVersion {
    /// Major component.
    pub fn major(self) -> u32 {
        self.0 >> 16
    }

    /// Minor component.
    pub fn minor(self) -> u32 {
        (self.0 >> 8) & 0xFF
    }

    /// Patch component.
    pub fn patch(self) -> u32 {
        self.0 & 0xFF
    }
}

impl fmt::Display for PackedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())
    }
}

/// Parse configuration options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Cross-check every load command against its declared size and the
    /// header's `sizeofcmds`, and resynchronise the cursor on `cmdsize`.
    pub validate_command_sizes: bool,
    /// Largest `ncmds` accepted before any command is read
    pub max_load_commands: u32,
    /// Largest `nfat_arch` accepted before any architecture is read
    pub max_fat_arches: u32,
}

impl ParseOptions {
    /// Create options with default settings (strict).
    pub fn new() -> Self {
        Self::strict()
    }

    /// Create options that validate command sizes.
    pub fn strict() -> Self {
        Self {
            validate_command_sizes: true,
            max_load_commands: 0x10000,
            max_fat_arches: 64,
        }
    }

    /// Create options that trust each command's own size and nothing else.
    pub fn lenient() -> Self {
        Self {
            validate_command_sizes: false,
            max_load_commands: u32::MAX,
            max_fat_arches: u32::MAX,
        }
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::new()
    }
}
