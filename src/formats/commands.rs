//! Load command readers.
//!
//! Every command starts with the same two-field preamble (`cmd`, `cmdsize`).
//! Commands with a dedicated reader are decoded into their own variant of
//! [`LoadCommand`]; everything else is kept as raw bytes in
//! [`UndefinedCommand`] so parsing can always continue past it.

use serde::{Serialize, Serializer};
use std::io::{Read, Seek};

use crate::cursor::ByteCursor;
use crate::error::{MachOError, Result};
use crate::formats::registry::{reader_for, CommandReader, LoadCommandKind};
use crate::types::{c_string, ByteRange, FixedName, PackedVersion, ParseOptions, VmProt, Width};

/// Size of the `cmd` + `cmdsize` preamble.
pub const PREAMBLE_SIZE: u32 = 8;

/// Fixed size of `segment_command` (without sections).
pub const SEGMENT_COMMAND_SIZE: u32 = 56;
/// Fixed size of `segment_command_64` (without sections).
pub const SEGMENT_COMMAND_64_SIZE: u32 = 72;
/// Size of one `section` record.
pub const SECTION_SIZE: u32 = 68;
/// Size of one `section_64` record.
pub const SECTION_64_SIZE: u32 = 80;
/// Fixed size of `dylib_command` before the name.
pub const DYLIB_COMMAND_SIZE: u32 = 24;
/// Fixed size of `rpath_command` before the path.
pub const RPATH_COMMAND_SIZE: u32 = 12;

/// The leading `cmd` / `cmdsize` pair of every load command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Preamble {
    cmd: u32,
    cmdsize: u32,
    /// Absolute stream offset of the command
    offset: u64,
}

impl Preamble {
    fn read<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> Result<Self> {
        let offset = cursor.position()?;
        let cmd = cursor.read_u32_le()?;
        let cmdsize = cursor.read_u32_le()?;
        if cmdsize < PREAMBLE_SIZE {
            return Err(MachOError::MalformedCommand {
                cmd,
                cmdsize,
                offset,
            });
        }
        Ok(Self {
            cmd,
            cmdsize,
            offset,
        })
    }

    fn malformed(&self) -> MachOError {
        MachOError::MalformedCommand {
            cmd: self.cmd,
            cmdsize: self.cmdsize,
            offset: self.offset,
        }
    }

    /// Read the trailing string that starts `string_offset` bytes into the
    /// command and runs to `cmdsize`.
    fn read_trailing_string<R: Read + Seek>(
        &self,
        cursor: &mut ByteCursor<R>,
        fixed_size: u32,
        string_offset: u32,
    ) -> Result<String> {
        if string_offset < fixed_size || string_offset > self.cmdsize {
            return Err(self.malformed());
        }
        cursor.set_position(self.offset + u64::from(string_offset))?;
        let data = cursor.read_bytes(u64::from(self.cmdsize - string_offset))?;
        Ok(c_string(&data))
    }
}

/// One parsed load command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum LoadCommand {
    /// `LC_SEGMENT` / `LC_SEGMENT_64`
    Segment(SegmentCommand),
    /// Any of the dylib reference commands
    Dylib(DylibCommand),
    /// Offset + size pointer into link-edit data
    LinkEditData(LinkEditDataCommand),
    /// `LC_ENCRYPTION_INFO` / `LC_ENCRYPTION_INFO_64`
    EncryptionInfo(EncryptionInfoCommand),
    /// `LC_RPATH`
    RPath(RPathCommand),
    /// Any command without a dedicated reader
    Undefined(UndefinedCommand),
}

impl LoadCommand {
    /// Numeric command code.
    pub fn cmd(&self) -> u32 {
        match self {
            LoadCommand::Segment(c) => c.cmd,
            LoadCommand::Dylib(c) => c.cmd,
            LoadCommand::LinkEditData(c) => c.cmd,
            LoadCommand::EncryptionInfo(c) => c.cmd,
            LoadCommand::RPath(c) => c.cmd,
            LoadCommand::Undefined(c) => c.cmd,
        }
    }

    /// Declared command size, including the preamble.
    pub fn cmdsize(&self) -> u32 {
        match self {
            LoadCommand::Segment(c) => c.cmdsize,
            LoadCommand::Dylib(c) => c.cmdsize,
            LoadCommand::LinkEditData(c) => c.cmdsize,
            LoadCommand::EncryptionInfo(c) => c.cmdsize,
            LoadCommand::RPath(c) => c.cmdsize,
            LoadCommand::Undefined(c) => c.cmdsize,
        }
    }

    /// Symbolic kind of this command.
    pub fn kind(&self) -> LoadCommandKind {
        LoadCommandKind::from_code(self.cmd())
    }

    /// Canonical `LC_*` name, if the code is known.
    pub fn name(&self) -> Option<&'static str> {
        self.kind().name()
    }

    /// Segment payload, if this is a segment command.
    pub fn as_segment(&self) -> Option<&SegmentCommand> {
        match self {
            LoadCommand::Segment(c) => Some(c),
            _ => None,
        }
    }

    /// Dylib payload, if this is a dylib command.
    pub fn as_dylib(&self) -> Option<&DylibCommand> {
        match self {
            LoadCommand::Dylib(c) => Some(c),
            _ => None,
        }
    }

    /// Link-edit data payload, if this command has that shape.
    pub fn as_link_edit_data(&self) -> Option<&LinkEditDataCommand> {
        match self {
            LoadCommand::LinkEditData(c) => Some(c),
            _ => None,
        }
    }

    /// Encryption payload, if this is an encryption info command.
    pub fn as_encryption_info(&self) -> Option<&EncryptionInfoCommand> {
        match self {
            LoadCommand::EncryptionInfo(c) => Some(c),
            _ => None,
        }
    }

    /// Run path payload, if this is an rpath command.
    pub fn as_rpath(&self) -> Option<&RPathCommand> {
        match self {
            LoadCommand::RPath(c) => Some(c),
            _ => None,
        }
    }

    /// Raw payload, if this command had no dedicated reader.
    pub fn as_undefined(&self) -> Option<&UndefinedCommand> {
        match self {
            LoadCommand::Undefined(c) => Some(c),
            _ => None,
        }
    }
}

/// A command kept as undecoded bytes.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndefinedCommand {
    pub cmd: u32,
    pub cmdsize: u32,
    /// Exactly `cmdsize - 8` bytes following the preamble
    #[serde(serialize_with = "serialize_hex")]
    pub data: Vec<u8>,
}

fn serialize_hex<S: Serializer>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(data))
}

/// A segment and its sections.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentCommand {
    pub cmd: u32,
    pub cmdsize: u32,
    /// Address width of this record and its sections
    pub width: Width,
    pub segname: FixedName,
    pub vmaddr: u64,
    pub vmsize: u64,
    pub fileoff: u64,
    pub filesize: u64,
    pub maxprot: VmProt,
    pub initprot: VmProt,
    /// Declared section count; always equal to `sections.len()`
    pub nsects: u32,
    pub flags: u32,
    pub sections: Vec<Section>,
}

impl SegmentCommand {
    /// Segment name without padding.
    pub fn name(&self) -> String {
        self.segname.to_string()
    }

    /// Section by name.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.sectname == *name)
    }

    fn read<R: Read + Seek>(
        cursor: &mut ByteCursor<R>,
        pre: Preamble,
        width: Width,
        options: &ParseOptions,
    ) -> Result<Self> {
        let segname = FixedName(cursor.read_array::<16>()?);
        let (vmaddr, vmsize, fileoff, filesize) = match width {
            Width::Bits32 => (
                u64::from(cursor.read_u32_le()?),
                u64::from(cursor.read_u32_le()?),
                u64::from(cursor.read_u32_le()?),
                u64::from(cursor.read_u32_le()?),
            ),
            Width::Bits64 => (
                cursor.read_u64_le()?,
                cursor.read_u64_le()?,
                cursor.read_u64_le()?,
                cursor.read_u64_le()?,
            ),
        };
        let maxprot = VmProt::from_bits_retain(cursor.read_u32_le()?);
        let initprot = VmProt::from_bits_retain(cursor.read_u32_le()?);
        let nsects = cursor.read_u32_le()?;
        let flags = cursor.read_u32_le()?;

        let (fixed, section_size) = match width {
            Width::Bits32 => (SEGMENT_COMMAND_SIZE, SECTION_SIZE),
            Width::Bits64 => (SEGMENT_COMMAND_64_SIZE, SECTION_64_SIZE),
        };
        let needed = u64::from(fixed) + u64::from(nsects) * u64::from(section_size);
        if options.validate_command_sizes && needed > u64::from(pre.cmdsize) {
            return Err(MachOError::CommandOverrun {
                cmd: pre.cmd,
                cmdsize: pre.cmdsize,
                consumed: needed,
                offset: pre.offset,
            });
        }

        let mut sections = Vec::with_capacity(nsects.min(256) as usize);
        for _ in 0..nsects {
            sections.push(Section::read(cursor, width)?);
        }

        Ok(Self {
            cmd: pre.cmd,
            cmdsize: pre.cmdsize,
            width,
            segname,
            vmaddr,
            vmsize,
            fileoff,
            filesize,
            maxprot,
            initprot,
            nsects,
            flags,
            sections,
        })
    }
}

/// A section inside a segment.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub sectname: FixedName,
    /// Name of the owning segment
    pub segname: FixedName,
    pub addr: u64,
    pub size: u64,
    pub offset: u32,
    pub align: u32,
    pub reloff: u32,
    pub nreloc: u32,
    pub flags: u32,
    pub reserved1: u32,
    pub reserved2: u32,
    /// Present only in `section_64`
    pub reserved3: Option<u32>,
}

impl Section {
    /// Section name without padding.
    pub fn name(&self) -> String {
        self.sectname.to_string()
    }

    /// `segment,section` form, e.g. `__TEXT,__text`.
    pub fn full_name(&self) -> String {
        format!("{},{}", self.segname, self.sectname)
    }

    fn read<R: Read + Seek>(cursor: &mut ByteCursor<R>, width: Width) -> Result<Self> {
        let sectname = FixedName(cursor.read_array::<16>()?);
        let segname = FixedName(cursor.read_array::<16>()?);
        let (addr, size) = match width {
            Width::Bits32 => (
                u64::from(cursor.read_u32_le()?),
                u64::from(cursor.read_u32_le()?),
            ),
            Width::Bits64 => (cursor.read_u64_le()?, cursor.read_u64_le()?),
        };
        let offset = cursor.read_u32_le()?;
        let align = cursor.read_u32_le()?;
        let reloff = cursor.read_u32_le()?;
        let nreloc = cursor.read_u32_le()?;
        let flags = cursor.read_u32_le()?;
        let reserved1 = cursor.read_u32_le()?;
        let reserved2 = cursor.read_u32_le()?;
        let reserved3 = match width {
            Width::Bits32 => None,
            Width::Bits64 => Some(cursor.read_u32_le()?),
        };

        Ok(Self {
            sectname,
            segname,
            addr,
            size,
            offset,
            align,
            reloff,
            nreloc,
            flags,
            reserved1,
            reserved2,
            reserved3,
        })
    }
}

/// The `dylib` sub-record of a dylib command.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dylib {
    /// Offset of the name from the start of the command
    pub name_offset: u32,
    pub timestamp: u32,
    pub current_version: PackedVersion,
    pub compatibility_version: PackedVersion,
}

/// A reference to a shared library (id, load, weak, re-export, ...).
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DylibCommand {
    pub cmd: u32,
    pub cmdsize: u32,
    pub dylib: Dylib,
    /// Install name
    pub name: String,
}

impl DylibCommand {
    fn read<R: Read + Seek>(cursor: &mut ByteCursor<R>, pre: Preamble) -> Result<Self> {
        let dylib = Dylib {
            name_offset: cursor.read_u32_le()?,
            timestamp: cursor.read_u32_le()?,
            current_version: PackedVersion(cursor.read_u32_le()?),
            compatibility_version: PackedVersion(cursor.read_u32_le()?),
        };
        let name = pre.read_trailing_string(cursor, DYLIB_COMMAND_SIZE, dylib.name_offset)?;

        Ok(Self {
            cmd: pre.cmd,
            cmdsize: pre.cmdsize,
            dylib,
            name,
        })
    }
}

/// Offset + size of a blob in the link-edit region.
///
/// `dataoff` is relative to the start of the owning Mach header.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinkEditDataCommand {
    pub cmd: u32,
    pub cmdsize: u32,
    pub dataoff: u32,
    pub datasize: u32,
}

impl LinkEditDataCommand {
    /// Header-relative byte range.
    pub fn range(&self) -> ByteRange {
        ByteRange::new(u64::from(self.dataoff), u64::from(self.datasize))
    }

    fn read<R: Read + Seek>(cursor: &mut ByteCursor<R>, pre: Preamble) -> Result<Self> {
        Ok(Self {
            cmd: pre.cmd,
            cmdsize: pre.cmdsize,
            dataoff: cursor.read_u32_le()?,
            datasize: cursor.read_u32_le()?,
        })
    }
}

/// Encryption descriptor.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncryptionInfoCommand {
    pub cmd: u32,
    pub cmdsize: u32,
    pub width: Width,
    pub cryptoff: u32,
    pub cryptsize: u32,
    /// Zero means not encrypted
    pub cryptid: u32,
    /// Trailing padding, present only in the 64-bit form
    pub pad: Option<u32>,
}

impl EncryptionInfoCommand {
    /// Returns true if `cryptid` is non-zero.
    pub fn is_encrypted(&self) -> bool {
        self.cryptid != 0
    }

    fn read<R: Read + Seek>(cursor: &mut ByteCursor<R>, pre: Preamble, width: Width) -> Result<Self> {
        let cryptoff = cursor.read_u32_le()?;
        let cryptsize = cursor.read_u32_le()?;
        let cryptid = cursor.read_u32_le()?;
        let pad = match width {
            Width::Bits32 => None,
            Width::Bits64 => Some(cursor.read_u32_le()?),
        };

        Ok(Self {
            cmd: pre.cmd,
            cmdsize: pre.cmdsize,
            width,
            cryptoff,
            cryptsize,
            cryptid,
            pad,
        })
    }
}

/// A runtime search path.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RPathCommand {
    pub cmd: u32,
    pub cmdsize: u32,
    /// Offset of the path from the start of the command
    pub path_offset: u32,
    pub path: String,
}

impl RPathCommand {
    fn read<R: Read + Seek>(cursor: &mut ByteCursor<R>, pre: Preamble) -> Result<Self> {
        let path_offset = cursor.read_u32_le()?;
        let path = pre.read_trailing_string(cursor, RPATH_COMMAND_SIZE, path_offset)?;

        Ok(Self {
            cmd: pre.cmd,
            cmdsize: pre.cmdsize,
            path_offset,
            path,
        })
    }
}

impl UndefinedCommand {
    fn read<R: Read + Seek>(cursor: &mut ByteCursor<R>, pre: Preamble) -> Result<Self> {
        let data = cursor.read_bytes(u64::from(pre.cmdsize - PREAMBLE_SIZE))?;
        Ok(Self {
            cmd: pre.cmd,
            cmdsize: pre.cmdsize,
            data,
        })
    }
}

impl CommandReader {
    /// Decode one load command starting at the cursor.
    pub fn read<R: Read + Seek>(
        self,
        cursor: &mut ByteCursor<R>,
        options: &ParseOptions,
    ) -> Result<LoadCommand> {
        let pre = Preamble::read(cursor)?;
        let command = match self {
            CommandReader::Undefined => LoadCommand::Undefined(UndefinedCommand::read(cursor, pre)?),
            CommandReader::Segment32 => {
                LoadCommand::Segment(SegmentCommand::read(cursor, pre, Width::Bits32, options)?)
            }
            CommandReader::Segment64 => {
                LoadCommand::Segment(SegmentCommand::read(cursor, pre, Width::Bits64, options)?)
            }
            CommandReader::Dylib => LoadCommand::Dylib(DylibCommand::read(cursor, pre)?),
            CommandReader::LinkEditData => {
                LoadCommand::LinkEditData(LinkEditDataCommand::read(cursor, pre)?)
            }
            CommandReader::EncryptionInfo32 => {
                LoadCommand::EncryptionInfo(EncryptionInfoCommand::read(cursor, pre, Width::Bits32)?)
            }
            CommandReader::EncryptionInfo64 => {
                LoadCommand::EncryptionInfo(EncryptionInfoCommand::read(cursor, pre, Width::Bits64)?)
            }
            CommandReader::RPath => LoadCommand::RPath(RPathCommand::read(cursor, pre)?),
        };
        Ok(command)
    }
}

/// Peek the next command's code, pick its reader and decode it.
pub fn read_load_command<R: Read + Seek>(
    cursor: &mut ByteCursor<R>,
    options: &ParseOptions,
) -> Result<LoadCommand> {
    let cmd = cursor.peek_u32::<byteorder::LittleEndian>()?;
    let reader = reader_for(cmd);
    tracing::trace!(cmd, ?reader, "load command");
    reader.read(cursor, options)
}
