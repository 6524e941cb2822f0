//! Fat (universal) container parsing.
//!
//! The fat header and its architecture table are always big-endian.
//! Slice offsets are relative to the start of the fat container.

use serde::Serialize;
use std::io::{Read, Seek};

use crate::cursor::ByteCursor;
use crate::error::{MachOError, Result};
use crate::formats::cpu::{cpu_type_description, cpu_type_name, width_for_cpu_type};
use crate::formats::header::MachHeader;
use crate::formats::magic::FAT_MAGIC;
use crate::formats::registry::ContainerReader;
use crate::types::{ByteRange, ParseOptions, Width};

/// Size of one `fat_arch` record.
pub const FAT_ARCH_SIZE: u32 = 20;

/// One entry of the fat architecture table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FatArch {
    /// CPU type
    pub cputype: u32,
    /// CPU subtype
    pub cpusubtype: u32,
    /// Slice offset from the start of the container
    pub offset: u32,
    /// Slice size in bytes
    pub size: u32,
    /// Alignment as a power of two
    pub align: u32,
}

impl FatArch {
    fn read<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> Result<Self> {
        Ok(Self {
            cputype: cursor.read_u32_be()?,
            cpusubtype: cursor.read_u32_be()?,
            offset: cursor.read_u32_be()?,
            size: cursor.read_u32_be()?,
            align: cursor.read_u32_be()?,
        })
    }

    /// Header width of the slice, from the ABI64 bit of the CPU type.
    pub fn width(&self) -> Width {
        width_for_cpu_type(self.cputype)
    }

    /// Mach header reader that applies to this slice.
    pub fn header_reader(&self) -> ContainerReader {
        match self.width() {
            Width::Bits32 => ContainerReader::MachHeader32,
            Width::Bits64 => ContainerReader::MachHeader64,
        }
    }

    /// Short architecture name, e.g. `arm64` or `armv7s`.
    pub fn arch_name(&self) -> &'static str {
        cpu_type_name(self.cputype, self.cpusubtype)
    }

    /// Human-readable CPU description.
    pub fn description(&self) -> &'static str {
        cpu_type_description(self.cputype)
    }

    /// Container-relative byte range of the slice.
    pub fn range(&self) -> ByteRange {
        ByteRange::new(u64::from(self.offset), u64::from(self.size))
    }
}

/// A parsed fat header and its architecture table.
///
/// Slices are not parsed eagerly; use [`FatHeader::each_macho`] or
/// [`FatHeader::machos`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FatHeader {
    /// Absolute stream offset of the container
    pub offset: u64,
    /// Magic as read (big-endian)
    pub magic: u32,
    /// Declared architecture count
    pub nfat_arch: u32,
    /// Architecture table, in file order
    pub arches: Vec<FatArch>,
}

impl FatHeader {
    /// Read a fat header at the cursor.
    pub fn read<R: Read + Seek>(cursor: &mut ByteCursor<R>, options: &ParseOptions) -> Result<Self> {
        let offset = cursor.position()?;
        let magic = cursor.read_u32_be()?;
        if magic != FAT_MAGIC {
            return Err(MachOError::BadMagic {
                expected: FAT_MAGIC,
                actual: magic,
                offset,
            });
        }

        let nfat_arch = cursor.read_u32_be()?;
        if nfat_arch > options.max_fat_arches {
            return Err(MachOError::TooManyArchitectures {
                declared: nfat_arch,
                limit: options.max_fat_arches,
            });
        }

        let mut arches = Vec::with_capacity(nfat_arch.min(64) as usize);
        for _ in 0..nfat_arch {
            arches.push(FatArch::read(cursor)?);
        }

        Ok(Self {
            offset,
            magic,
            nfat_arch,
            arches,
        })
    }

    /// Architecture entry by name (`arm64`, `x86_64`, ...).
    pub fn arch(&self, name: &str) -> Option<&FatArch> {
        self.arches.iter().find(|a| a.arch_name() == name)
    }

    /// Absolute stream offset of a slice.
    pub fn slice_offset(&self, arch: &FatArch) -> u64 {
        self.offset + u64::from(arch.offset)
    }

    /// Parse the Mach header of one slice.
    pub fn read_macho<R: Read + Seek>(
        &self,
        arch: &FatArch,
        cursor: &mut ByteCursor<R>,
        options: &ParseOptions,
    ) -> Result<MachHeader> {
        let start = self.slice_offset(arch);
        tracing::debug!(
            arch = arch.arch_name(),
            offset = start,
            size = arch.size,
            "fat slice"
        );
        cursor.set_position(start)?;
        MachHeader::read(cursor, arch.width(), options)
    }

    /// Lazily parse the Mach header of every slice, in table order.
    pub fn each_macho<'a, R: Read + Seek>(
        &'a self,
        cursor: &'a mut ByteCursor<R>,
        options: &'a ParseOptions,
    ) -> FatSlices<'a, R> {
        FatSlices {
            header: self,
            cursor,
            options,
            index: 0,
        }
    }

    /// Parse the Mach header of every slice.
    pub fn machos<R: Read + Seek>(
        &self,
        cursor: &mut ByteCursor<R>,
        options: &ParseOptions,
    ) -> Result<Vec<MachHeader>> {
        self.each_macho(cursor, options).collect()
    }

    /// Parse every slice in parallel, each on its own cursor over `data`.
    ///
    /// `data` must be the same bytes the header was read from.
    #[cfg(feature = "parallel")]
    pub fn par_machos(&self, data: &[u8], options: &ParseOptions) -> Result<Vec<MachHeader>> {
        use rayon::prelude::*;

        self.arches
            .par_iter()
            .map(|arch| {
                let mut cursor = ByteCursor::new(std::io::Cursor::new(data));
                self.read_macho(arch, &mut cursor, options)
            })
            .collect()
    }
}

/// Iterator over the Mach headers of a fat container.
///
/// Each step seeks to the slice start, so the cursor may be used freely
/// between steps.
#[derive(Debug)]
pub struct FatSlices<'a, R> {
    header: &'a FatHeader,
    cursor: &'a mut ByteCursor<R>,
    options: &'a ParseOptions,
    index: usize,
}

impl<R: Read + Seek> Iterator for FatSlices<'_, R> {
    type Item = Result<MachHeader>;

    fn next(&mut self) -> Option<Self::Item> {
        let arch = self.header.arches.get(self.index)?;
        self.index += 1;
        Some(self.header.read_macho(arch, self.cursor, self.options))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.header.arches.len() - self.index;
        (left, Some(left))
    }
}
