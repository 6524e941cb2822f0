//! Mach-O container, header and load command decoders.
//!
//! Parsing is a single, non-backtracking descent:
//! container (fat or thin) → Mach header → load commands → sections.
//! Every level reads through the same [`ByteCursor`].

pub mod commands;
pub mod cpu;
pub mod fat;
pub mod header;
pub mod registry;

#[cfg(test)]
pub(crate) mod fixtures;

use serde::Serialize;
use std::io::{Read, Seek};

use crate::cursor::ByteCursor;
use crate::error::Result;
use crate::types::{ParseOptions, Width};

pub use commands::{
    DylibCommand, EncryptionInfoCommand, LinkEditDataCommand, LoadCommand, RPathCommand, Section,
    SegmentCommand, UndefinedCommand,
};
pub use cpu::{cpu_type_description, cpu_type_name, file_type_name};
pub use fat::{FatArch, FatHeader, FatSlices};
pub use header::MachHeader;
pub use registry::{reader_for, reader_for_magic, CommandLookup, ContainerReader, LoadCommandKind};

/// Magic values, interpreted big-endian as they appear on disk.
pub mod magic {
    /// Fat/universal header
    pub const FAT_MAGIC: u32 = 0xCAFEBABE;
    /// 32-bit little-endian Mach header
    pub const MACHO_MAGIC32: u32 = 0xCEFAEDFE;
    /// 64-bit little-endian Mach header
    pub const MACHO_MAGIC64: u32 = 0xCFFAEDFE;

    /// Returns true for the fat magic.
    pub fn is_fat_magic(value: u32) -> bool {
        value == FAT_MAGIC
    }

    /// Returns true for either Mach header magic.
    pub fn is_macho_magic(value: u32) -> bool {
        value == MACHO_MAGIC32 || value == MACHO_MAGIC64
    }
}

/// A parsed top-level container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "container", rename_all = "snake_case")]
pub enum MachFile {
    /// Universal binary with one or more slices (slices are parsed on demand)
    Fat(FatHeader),
    /// A single Mach-O image
    MachO(MachHeader),
}

impl MachFile {
    /// Every Mach-O image in the container, in architecture order.
    ///
    /// Thin files yield a copy of their single header.
    pub fn machos<R: Read + Seek>(
        &self,
        cursor: &mut ByteCursor<R>,
        options: &ParseOptions,
    ) -> Result<Vec<MachHeader>> {
        match self {
            MachFile::Fat(fat) => fat.machos(cursor, options),
            MachFile::MachO(header) => Ok(vec![header.clone()]),
        }
    }

    /// Consuming form of [`MachFile::machos`].
    pub fn into_machos<R: Read + Seek>(
        self,
        cursor: &mut ByteCursor<R>,
        options: &ParseOptions,
    ) -> Result<Vec<MachHeader>> {
        match self {
            MachFile::Fat(fat) => fat.machos(cursor, options),
            MachFile::MachO(header) => Ok(vec![header]),
        }
    }

    /// Returns true for fat containers.
    pub fn is_fat(&self) -> bool {
        matches!(self, MachFile::Fat(_))
    }
}

impl ContainerReader {
    /// Header width for the Mach header readers; `None` for the fat reader.
    pub fn width(self) -> Option<Width> {
        match self {
            ContainerReader::Fat => None,
            ContainerReader::MachHeader32 => Some(Width::Bits32),
            ContainerReader::MachHeader64 => Some(Width::Bits64),
        }
    }

    /// Parse a container of this kind at the cursor.
    pub fn parse<R: Read + Seek>(
        self,
        cursor: &mut ByteCursor<R>,
        options: &ParseOptions,
    ) -> Result<MachFile> {
        match self.width() {
            None => Ok(MachFile::Fat(FatHeader::read(cursor, options)?)),
            Some(width) => Ok(MachFile::MachO(MachHeader::read(cursor, width, options)?)),
        }
    }
}

/// Parse the container at the cursor with default options.
pub fn read_stream<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> Result<MachFile> {
    read_stream_with_options(cursor, &ParseOptions::new())
}

/// Peek the leading magic, pick the container reader and delegate.
pub fn read_stream_with_options<R: Read + Seek>(
    cursor: &mut ByteCursor<R>,
    options: &ParseOptions,
) -> Result<MachFile> {
    let value = cursor.peek_u32::<byteorder::BigEndian>()?;
    let reader = reader_for_magic(value)?;
    tracing::debug!(magic = value, ?reader, "container dispatch");
    reader.parse(cursor, options)
}
