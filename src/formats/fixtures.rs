//! Byte builders for in-memory Mach-O test images.

use crate::formats::magic;
use crate::types::Width;

/// Load command codes used by the fixtures.
pub mod lc {
    pub const SEGMENT: u32 = 0x1;
    pub const LOAD_DYLIB: u32 = 0xc;
    pub const ID_DYLIB: u32 = 0xd;
    pub const LOAD_WEAK_DYLIB: u32 = 0x8000_0018;
    pub const SEGMENT_64: u32 = 0x19;
    pub const UUID: u32 = 0x1b;
    pub const RPATH: u32 = 0x8000_001c;
    pub const CODE_SIGNATURE: u32 = 0x1d;
    pub const SEGMENT_SPLIT_INFO: u32 = 0x1e;
    pub const REEXPORT_DYLIB: u32 = 0x8000_001f;
    pub const LAZY_LOAD_DYLIB: u32 = 0x20;
    pub const ENCRYPTION_INFO: u32 = 0x21;
    pub const FUNCTION_STARTS: u32 = 0x26;
    pub const DATA_IN_CODE: u32 = 0x29;
    pub const DYLIB_CODE_SIGN_DRS: u32 = 0x2b;
    pub const ENCRYPTION_INFO_64: u32 = 0x2c;
    pub const LINKER_OPTIMIZATION_HINT: u32 = 0x2e;
}

pub const CPU_TYPE_ARM: u32 = 12;
pub const CPU_TYPE_ARM64: u32 = 0x0100_000C;

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_name(out: &mut Vec<u8>, name: &str) {
    let mut raw = [0u8; 16];
    raw[..name.len()].copy_from_slice(name.as_bytes());
    out.extend_from_slice(&raw);
}

/// A command with an arbitrary payload after the preamble.
pub fn raw_command(cmd: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    put_u32(&mut out, cmd);
    put_u32(&mut out, 8 + payload.len() as u32);
    out.extend_from_slice(payload);
    out
}

fn section_bytes(width: Width, segname: &str, sectname: &str, index: u32) -> Vec<u8> {
    let mut out = Vec::new();
    put_name(&mut out, sectname);
    put_name(&mut out, segname);
    match width {
        Width::Bits32 => {
            put_u32(&mut out, 0x1000 + index * 0x100);
            put_u32(&mut out, 0x100);
        }
        Width::Bits64 => {
            put_u64(&mut out, 0x1_0000_1000 + u64::from(index) * 0x100);
            put_u64(&mut out, 0x100);
        }
    }
    for value in [0x1000 + index * 0x100, 4, 0, 0, 0x8000_0400, 0, 0] {
        put_u32(&mut out, value);
    }
    if width == Width::Bits64 {
        put_u32(&mut out, 0);
    }
    out
}

fn segment(width: Width, name: &str, sections: &[&str]) -> Vec<u8> {
    let (cmd, fixed, sect_size) = match width {
        Width::Bits32 => (lc::SEGMENT, 56u32, 68u32),
        Width::Bits64 => (lc::SEGMENT_64, 72u32, 80u32),
    };
    let mut out = Vec::new();
    put_u32(&mut out, cmd);
    put_u32(&mut out, fixed + sect_size * sections.len() as u32);
    put_name(&mut out, name);
    match width {
        Width::Bits32 => {
            for value in [0x1000, 0x4000, 0, 0x4000] {
                put_u32(&mut out, value);
            }
        }
        Width::Bits64 => {
            for value in [0x1_0000_0000, 0x4000, 0, 0x4000] {
                put_u64(&mut out, value);
            }
        }
    }
    put_u32(&mut out, 5); // maxprot r-x
    put_u32(&mut out, 5); // initprot r-x
    put_u32(&mut out, sections.len() as u32);
    put_u32(&mut out, 0);
    for (i, sect) in sections.iter().enumerate() {
        out.extend(section_bytes(width, name, sect, i as u32));
    }
    out
}

/// `LC_SEGMENT` with one section per name.
pub fn segment32(name: &str, sections: &[&str]) -> Vec<u8> {
    segment(Width::Bits32, name, sections)
}

/// `LC_SEGMENT_64` with one section per name.
pub fn segment64(name: &str, sections: &[&str]) -> Vec<u8> {
    segment(Width::Bits64, name, sections)
}

/// Null-terminated string padded to a multiple of 8 bytes.
fn padded_string(text: &str) -> Vec<u8> {
    let mut out = text.as_bytes().to_vec();
    out.push(0);
    while out.len() % 8 != 0 {
        out.push(0);
    }
    out
}

/// Dylib command of any dylib kind, version 1.2.3.
pub fn dylib(cmd: u32, name: &str) -> Vec<u8> {
    let name = padded_string(name);
    let mut out = Vec::new();
    put_u32(&mut out, cmd);
    put_u32(&mut out, 24 + name.len() as u32);
    put_u32(&mut out, 24);
    put_u32(&mut out, 2);
    put_u32(&mut out, 0x0001_0203);
    put_u32(&mut out, 0x0001_0000);
    out.extend(name);
    out
}

/// `LC_RPATH`.
pub fn rpath(path: &str) -> Vec<u8> {
    let path = padded_string(path);
    let mut out = Vec::new();
    put_u32(&mut out, lc::RPATH);
    put_u32(&mut out, 12 + path.len() as u32);
    put_u32(&mut out, 12);
    out.extend(path);
    out
}

/// Link-edit data command (offset + size).
pub fn linkedit(cmd: u32, dataoff: u32, datasize: u32) -> Vec<u8> {
    let mut out = Vec::new();
    put_u32(&mut out, cmd);
    put_u32(&mut out, 16);
    put_u32(&mut out, dataoff);
    put_u32(&mut out, datasize);
    out
}

/// Encryption info command of the given width.
pub fn encryption(width: Width, cryptid: u32) -> Vec<u8> {
    let mut out = Vec::new();
    match width {
        Width::Bits32 => {
            put_u32(&mut out, lc::ENCRYPTION_INFO);
            put_u32(&mut out, 20);
        }
        Width::Bits64 => {
            put_u32(&mut out, lc::ENCRYPTION_INFO_64);
            put_u32(&mut out, 24);
        }
    }
    put_u32(&mut out, 0x4000);
    put_u32(&mut out, 0x8000);
    put_u32(&mut out, cryptid);
    if width == Width::Bits64 {
        put_u32(&mut out, 0);
    }
    out
}

/// Builds a thin Mach-O image from a list of encoded commands.
#[derive(Debug, Clone)]
pub struct MachOBuilder {
    width: Width,
    cputype: u32,
    cpusubtype: u32,
    filetype: u32,
    flags: u32,
    commands: Vec<Vec<u8>>,
    trailer: Vec<u8>,
    ncmds: Option<u32>,
    sizeofcmds: Option<u32>,
}

impl MachOBuilder {
    pub fn new(width: Width) -> Self {
        let cputype = match width {
            Width::Bits32 => CPU_TYPE_ARM,
            Width::Bits64 => CPU_TYPE_ARM64,
        };
        Self {
            width,
            cputype,
            cpusubtype: 0,
            filetype: 2,
            flags: 0x0020_0085,
            commands: Vec::new(),
            trailer: Vec::new(),
            ncmds: None,
            sizeofcmds: None,
        }
    }

    pub fn command(mut self, bytes: Vec<u8>) -> Self {
        self.commands.push(bytes);
        self
    }

    /// Bytes appended after the command list.
    pub fn trailer(mut self, bytes: Vec<u8>) -> Self {
        self.trailer = bytes;
        self
    }

    pub fn ncmds(mut self, ncmds: u32) -> Self {
        self.ncmds = Some(ncmds);
        self
    }

    pub fn sizeofcmds(mut self, sizeofcmds: u32) -> Self {
        self.sizeofcmds = Some(sizeofcmds);
        self
    }

    /// Size of the fixed header for this width.
    pub fn header_size(&self) -> usize {
        match self.width {
            Width::Bits32 => 28,
            Width::Bits64 => 32,
        }
    }

    /// Offset at which the trailer will start.
    pub fn trailer_offset(&self) -> usize {
        self.header_size() + self.commands.iter().map(Vec::len).sum::<usize>()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let magic = match self.width {
            Width::Bits32 => magic::MACHO_MAGIC32,
            Width::Bits64 => magic::MACHO_MAGIC64,
        };
        out.extend_from_slice(&magic.to_be_bytes());
        let sizeofcmds = self.commands.iter().map(Vec::len).sum::<usize>() as u32;
        for value in [
            self.cputype,
            self.cpusubtype,
            self.filetype,
            self.ncmds.unwrap_or(self.commands.len() as u32),
            self.sizeofcmds.unwrap_or(sizeofcmds),
            self.flags,
        ] {
            put_u32(&mut out, value);
        }
        if self.width == Width::Bits64 {
            put_u32(&mut out, 0);
        }
        for cmd in &self.commands {
            out.extend_from_slice(cmd);
        }
        out.extend_from_slice(&self.trailer);
        out
    }
}

/// A fat container holding `images`, each aligned to 16 bytes.
///
/// Returns the bytes and the offset of every slice.
pub fn fat(images: &[(u32, Vec<u8>)]) -> (Vec<u8>, Vec<u32>) {
    let header_len = 8 + 20 * images.len();
    let mut offsets = Vec::new();
    let mut next = (header_len + 15) & !15;
    for (_, image) in images {
        offsets.push(next as u32);
        next = (next + image.len() + 15) & !15;
    }

    let mut out = Vec::new();
    out.extend_from_slice(&magic::FAT_MAGIC.to_be_bytes());
    out.extend_from_slice(&(images.len() as u32).to_be_bytes());
    for ((cputype, image), offset) in images.iter().zip(&offsets) {
        for value in [*cputype, 0, *offset, image.len() as u32, 4] {
            out.extend_from_slice(&value.to_be_bytes());
        }
    }
    for ((_, image), offset) in images.iter().zip(&offsets) {
        out.resize(*offset as usize, 0);
        out.extend_from_slice(image);
    }
    (out, offsets)
}
