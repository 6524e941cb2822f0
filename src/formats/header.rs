//! Mach header parsing and derived queries.
//!
//! The 32- and 64-bit headers share one reader; they differ only in the
//! trailing `reserved` field and in which segment and encryption commands
//! belong to them.

use serde::Serialize;
use std::io::{Read, Seek};

use crate::cursor::ByteCursor;
use crate::error::{MachOError, Result};
use crate::formats::commands::{
    read_load_command, DylibCommand, EncryptionInfoCommand, LoadCommand, SegmentCommand,
};
use crate::formats::cpu::{cpu_type_description, cpu_type_name, file_type_name};
use crate::formats::magic::{MACHO_MAGIC32, MACHO_MAGIC64};
use crate::formats::registry::{CommandLookup, LoadCommandKind};
use crate::signature::SignatureDecoder;
use crate::types::{ByteRange, HeaderFlags, ParseOptions, Width};

/// Size of `mach_header`.
pub const MACH_HEADER_SIZE: u32 = 28;
/// Size of `mach_header_64`.
pub const MACH_HEADER_64_SIZE: u32 = 32;

/// Dylib kinds reported by [`MachHeader::loaded_libraries`].
const LOADED_LIBRARY_KINDS: [LoadCommandKind; 3] = [
    LoadCommandKind::LoadDylib,
    LoadCommandKind::LoadWeakDylib,
    LoadCommandKind::ReexportDylib,
];

/// A parsed Mach header with its load commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachHeader {
    /// Absolute stream offset of the header; link-edit offsets are relative to it
    pub offset: u64,
    /// Magic as read (big-endian)
    pub magic: u32,
    /// Header width
    pub width: Width,
    /// CPU type
    pub cputype: u32,
    /// CPU subtype
    pub cpusubtype: u32,
    /// File type (`MH_EXECUTE`, `MH_DYLIB`, ...)
    pub filetype: u32,
    /// Declared load command count
    pub ncmds: u32,
    /// Declared size of all load commands
    pub sizeofcmds: u32,
    /// Header flags
    pub flags: HeaderFlags,
    /// Present only in the 64-bit header
    pub reserved: Option<u32>,
    /// Load commands in declaration order
    pub load_commands: Vec<LoadCommand>,
}

impl MachHeader {
    /// Read a Mach header of the given width, then its load commands.
    pub fn read<R: Read + Seek>(
        cursor: &mut ByteCursor<R>,
        width: Width,
        options: &ParseOptions,
    ) -> Result<Self> {
        let offset = cursor.position()?;
        let expected = match width {
            Width::Bits32 => MACHO_MAGIC32,
            Width::Bits64 => MACHO_MAGIC64,
        };
        let magic = cursor.read_u32_be()?;
        if magic != expected {
            return Err(MachOError::BadMagic {
                expected,
                actual: magic,
                offset,
            });
        }

        let cputype = cursor.read_u32_le()?;
        let cpusubtype = cursor.read_u32_le()?;
        let filetype = cursor.read_u32_le()?;
        let ncmds = cursor.read_u32_le()?;
        let sizeofcmds = cursor.read_u32_le()?;
        let flags = HeaderFlags::from_bits_retain(cursor.read_u32_le()?);
        let reserved = match width {
            Width::Bits32 => None,
            Width::Bits64 => Some(cursor.read_u32_le()?),
        };

        if ncmds > options.max_load_commands {
            return Err(MachOError::TooManyCommands {
                declared: ncmds,
                limit: options.max_load_commands,
            });
        }

        tracing::debug!(
            offset,
            %width,
            cputype,
            ncmds,
            sizeofcmds,
            "mach header"
        );

        let load_commands = read_commands(cursor, ncmds, sizeofcmds, options)?;

        Ok(Self {
            offset,
            magic,
            width,
            cputype,
            cpusubtype,
            filetype,
            ncmds,
            sizeofcmds,
            flags,
            reserved,
            load_commands,
        })
    }

    /// Returns true for a 32-bit header.
    pub fn is_32(&self) -> bool {
        self.width == Width::Bits32
    }

    /// Returns true for a 64-bit header.
    pub fn is_64(&self) -> bool {
        self.width == Width::Bits64
    }

    /// Size of the fixed header.
    pub fn header_size(&self) -> u32 {
        match self.width {
            Width::Bits32 => MACH_HEADER_SIZE,
            Width::Bits64 => MACH_HEADER_64_SIZE,
        }
    }

    /// `MH_*` name of the file type.
    pub fn file_type_name(&self) -> &'static str {
        file_type_name(self.filetype)
    }

    /// Short architecture name, e.g. `arm64`.
    pub fn cpu_name(&self) -> &'static str {
        cpu_type_name(self.cputype, self.cpusubtype)
    }

    /// Human-readable CPU description.
    pub fn cpu_description(&self) -> &'static str {
        cpu_type_description(self.cputype)
    }

    /// First load command of the given kind.
    ///
    /// Accepts a numeric code, a [`LoadCommandKind`], or a name / number in
    /// string form. Unknown kinds match nothing.
    pub fn find_by_kind<'a>(
        &self,
        kind: impl Into<CommandLookup<'a>>,
    ) -> Result<Option<&LoadCommand>> {
        let Some(code) = kind.into().resolve()? else {
            return Ok(None);
        };
        Ok(self.load_commands.iter().find(|c| c.cmd() == code))
    }

    /// Every load command of the given kind, in declaration order.
    pub fn all_by_kind<'a>(&self, kind: impl Into<CommandLookup<'a>>) -> Result<Vec<&LoadCommand>> {
        let Some(code) = kind.into().resolve()? else {
            return Ok(Vec::new());
        };
        Ok(self
            .load_commands
            .iter()
            .filter(|c| c.cmd() == code)
            .collect())
    }

    /// First load command of a symbolic kind.
    pub fn find_command(&self, kind: LoadCommandKind) -> Option<&LoadCommand> {
        self.load_commands.iter().find(|c| c.kind() == kind)
    }

    fn commands_of(&self, kind: LoadCommandKind) -> impl Iterator<Item = &LoadCommand> + '_ {
        self.load_commands.iter().filter(move |c| c.kind() == kind)
    }

    /// Dylib commands that pull a library in.
    pub fn dylib_commands(&self) -> impl Iterator<Item = &DylibCommand> + '_ {
        self.load_commands
            .iter()
            .filter(|c| LOADED_LIBRARY_KINDS.contains(&c.kind()))
            .filter_map(LoadCommand::as_dylib)
    }

    /// Install names of every load, weak-load and re-export dylib command.
    ///
    /// The image's own `LC_ID_DYLIB` is not included.
    pub fn loaded_libraries(&self) -> Vec<&str> {
        self.dylib_commands().map(|d| d.name.as_str()).collect()
    }

    /// Install name from `LC_ID_DYLIB`, for dylibs.
    pub fn dylib_id(&self) -> Option<&str> {
        self.find_command(LoadCommandKind::IdDylib)
            .and_then(LoadCommand::as_dylib)
            .map(|d| d.name.as_str())
    }

    /// Run paths, without duplicates, in first-seen order.
    pub fn run_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = Vec::new();
        for rpath in self
            .commands_of(LoadCommandKind::Rpath)
            .filter_map(LoadCommand::as_rpath)
        {
            if !paths.contains(&rpath.path.as_str()) {
                paths.push(&rpath.path);
            }
        }
        paths
    }

    /// Segment commands of this header's width.
    pub fn segments(&self) -> Vec<&SegmentCommand> {
        self.load_commands
            .iter()
            .filter_map(LoadCommand::as_segment)
            .filter(|s| s.width == self.width)
            .collect()
    }

    /// Segment by name (`__TEXT`, `__LINKEDIT`, ...).
    pub fn segment(&self, name: &str) -> Option<&SegmentCommand> {
        self.segments().into_iter().find(|s| s.segname == *name)
    }

    /// Encryption info command of this header's width.
    pub fn encryption_info(&self) -> Option<&EncryptionInfoCommand> {
        let kind = match self.width {
            Width::Bits32 => LoadCommandKind::EncryptionInfo,
            Width::Bits64 => LoadCommandKind::EncryptionInfo64,
        };
        self.find_command(kind)
            .and_then(LoadCommand::as_encryption_info)
    }

    /// Returns true if the image carries a non-zero `cryptid`.
    pub fn is_encrypted(&self) -> bool {
        self.encryption_info()
            .map_or(false, EncryptionInfoCommand::is_encrypted)
    }

    /// Header-relative range of the code signature, if the image is signed.
    pub fn code_signature_range(&self) -> Option<ByteRange> {
        self.find_command(LoadCommandKind::CodeSignature)
            .and_then(LoadCommand::as_link_edit_data)
            .map(|c| c.range())
    }

    /// Read `size` bytes at a header-relative offset.
    pub fn read_at<R: Read + Seek>(
        &self,
        cursor: &mut ByteCursor<R>,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>> {
        cursor.set_position(self.offset + offset)?;
        cursor.read_bytes(size)
    }

    /// Raw code-signature bytes, if the image is signed.
    pub fn code_signature_data<R: Read + Seek>(
        &self,
        cursor: &mut ByteCursor<R>,
    ) -> Result<Option<Vec<u8>>> {
        match self.code_signature_range() {
            Some(range) => Ok(Some(self.read_at(cursor, range.offset, range.size)?)),
            None => Ok(None),
        }
    }

    /// Slice the code signature and hand it to `decoder`.
    pub fn code_signature_with<R: Read + Seek, D: SignatureDecoder>(
        &self,
        cursor: &mut ByteCursor<R>,
        decoder: &D,
    ) -> Result<Option<D::Output>> {
        let Some(data) = self.code_signature_data(cursor)? else {
            return Ok(None);
        };
        decoder
            .decode(&data)
            .map(Some)
            .map_err(|e| MachOError::Signature(Box::new(e)))
    }
}

/// Read `ncmds` load commands starting at the cursor.
fn read_commands<R: Read + Seek>(
    cursor: &mut ByteCursor<R>,
    ncmds: u32,
    sizeofcmds: u32,
    options: &ParseOptions,
) -> Result<Vec<LoadCommand>> {
    let mut commands = Vec::with_capacity(ncmds.min(256) as usize);
    let mut total: u64 = 0;

    for _ in 0..ncmds {
        let start = cursor.position()?;
        let command = read_load_command(cursor, options)?;
        let cmdsize = u64::from(command.cmdsize());
        let consumed = cursor.position()?.saturating_sub(start);
        total += cmdsize;

        if options.validate_command_sizes {
            if consumed > cmdsize {
                return Err(MachOError::CommandOverrun {
                    cmd: command.cmd(),
                    cmdsize: command.cmdsize(),
                    consumed,
                    offset: start,
                });
            }
            if total > u64::from(sizeofcmds) {
                return Err(MachOError::CommandsExceedDeclaredSize {
                    declared: sizeofcmds,
                    actual: total,
                });
            }
            if consumed < cmdsize {
                // Trailing padding must be present in the stream.
                cursor.read_bytes(cmdsize - consumed)?;
            }
        } else if consumed != cmdsize {
            tracing::warn!(
                cmd = command.cmd(),
                cmdsize,
                consumed,
                offset = start,
                "load command size mismatch"
            );
        }

        commands.push(command);
    }

    if !options.validate_command_sizes && total != u64::from(sizeofcmds) {
        tracing::warn!(declared = sizeofcmds, actual = total, "sizeofcmds mismatch");
    }

    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::fixtures::{self, lc, MachOBuilder};
    use crate::formats::read_stream_with_options;
    use crate::formats::MachFile;
    use crate::signature::{tests::sample_signature, EnvelopeDecoder, EMBEDDED_SIGNATURE_MAGIC};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn parse_with(bytes: Vec<u8>, width: Width, options: &ParseOptions) -> Result<MachHeader> {
        let mut cursor = ByteCursor::new(Cursor::new(bytes));
        MachHeader::read(&mut cursor, width, options)
    }

    fn parse(bytes: Vec<u8>, width: Width) -> MachHeader {
        parse_with(bytes, width, &ParseOptions::new()).unwrap()
    }

    #[test]
    fn test_segment_and_id_dylib() {
        let bytes = MachOBuilder::new(Width::Bits64)
            .command(fixtures::segment64("__TEXT", &["__text", "__cstring"]))
            .command(fixtures::dylib(lc::ID_DYLIB, "/usr/lib/libSystem.B.dylib"))
            .build();
        let header = parse(bytes, Width::Bits64);

        assert!(header.is_64());
        assert_eq!(header.reserved, Some(0));
        assert_eq!(header.load_commands.len(), 2);
        assert_eq!(header.segments().len(), 1);
        assert_eq!(header.segments()[0].sections.len(), 2);
        assert!(header.loaded_libraries().is_empty());
        assert_eq!(header.dylib_id(), Some("/usr/lib/libSystem.B.dylib"));
    }

    #[test]
    fn test_loaded_libraries_kinds() {
        let bytes = MachOBuilder::new(Width::Bits64)
            .command(fixtures::dylib(lc::LOAD_DYLIB, "/usr/lib/libSystem.B.dylib"))
            .command(fixtures::dylib(lc::ID_DYLIB, "@rpath/Self.framework/Self"))
            .command(fixtures::dylib(lc::LOAD_WEAK_DYLIB, "/usr/lib/libweak.dylib"))
            .command(fixtures::dylib(lc::LAZY_LOAD_DYLIB, "/usr/lib/liblazy.dylib"))
            .command(fixtures::dylib(lc::REEXPORT_DYLIB, "/usr/lib/libreexport.dylib"))
            .build();
        let header = parse(bytes, Width::Bits64);

        assert_eq!(
            header.loaded_libraries(),
            vec![
                "/usr/lib/libSystem.B.dylib",
                "/usr/lib/libweak.dylib",
                "/usr/lib/libreexport.dylib",
            ]
        );
    }

    #[test]
    fn test_encryption_both_widths() {
        for width in [Width::Bits32, Width::Bits64] {
            for (cryptid, expected) in [(0, false), (1, true)] {
                let bytes = MachOBuilder::new(width)
                    .command(fixtures::encryption(width, cryptid))
                    .build();
                let header = parse(bytes, width);
                assert_eq!(header.is_encrypted(), expected, "{width} cryptid={cryptid}");
                assert_eq!(header.encryption_info().unwrap().cryptid, cryptid);
            }
        }
    }

    #[test]
    fn test_width_mismatched_commands_are_ignored() {
        let bytes = MachOBuilder::new(Width::Bits64)
            .command(fixtures::encryption(Width::Bits32, 1))
            .command(fixtures::segment32("__TEXT", &[]))
            .command(fixtures::segment64("__DATA", &["__data"]))
            .build();
        let header = parse(bytes, Width::Bits64);

        assert!(!header.is_encrypted());
        assert!(header.encryption_info().is_none());
        assert_eq!(header.segments().len(), 1);
        assert!(header.segment("__DATA").is_some());
        assert!(header.segment("__TEXT").is_none());
    }

    #[test]
    fn test_unknown_command_resilience() {
        let bytes = MachOBuilder::new(Width::Bits32)
            .command(fixtures::segment32("__TEXT", &["__text"]))
            .command(fixtures::raw_command(0x7777, &[0xAB; 12]))
            .command(fixtures::dylib(lc::LOAD_DYLIB, "/usr/lib/libobjc.A.dylib"))
            .build();
        let header = parse(bytes, Width::Bits32);

        assert_eq!(header.load_commands.len(), 3);
        let raw = header.load_commands[1].as_undefined().unwrap();
        assert_eq!(raw.data.len() as u32, raw.cmdsize - 8);
        assert_eq!(header.loaded_libraries(), vec!["/usr/lib/libobjc.A.dylib"]);
    }

    fn assert_truncates_at_every_offset(bytes: &[u8]) {
        for cut in 0..bytes.len() {
            let mut cursor = ByteCursor::new(Cursor::new(bytes[..cut].to_vec()));
            let err = read_stream_with_options(&mut cursor, &ParseOptions::new())
                .expect_err("truncated input must fail");
            assert!(err.is_truncation(), "cut at {cut}: {err}");
        }
        assert!(read_stream_with_options(
            &mut ByteCursor::new(Cursor::new(bytes.to_vec())),
            &ParseOptions::new()
        )
        .is_ok());
    }

    #[test]
    fn test_truncation_at_every_offset() {
        let bytes = MachOBuilder::new(Width::Bits64)
            .command(fixtures::segment64("__TEXT", &["__text"]))
            .command(fixtures::dylib(lc::LOAD_DYLIB, "/usr/lib/libSystem.B.dylib"))
            .command(fixtures::rpath("@executable_path/Frameworks"))
            .command(fixtures::linkedit(lc::CODE_SIGNATURE, 0x8000, 0x100))
            .command(fixtures::encryption(Width::Bits64, 1))
            .build();
        assert_truncates_at_every_offset(&bytes);
    }

    #[test]
    fn test_truncation_at_every_offset_32() {
        let bytes = MachOBuilder::new(Width::Bits32)
            .command(fixtures::segment32("__TEXT", &["__text", "__const"]))
            .command(fixtures::dylib(lc::LOAD_WEAK_DYLIB, "/usr/lib/libz.1.dylib"))
            .command(fixtures::rpath("@loader_path"))
            .command(fixtures::linkedit(lc::CODE_SIGNATURE, 0x4000, 0x80))
            .command(fixtures::encryption(Width::Bits32, 0))
            .build();
        assert_truncates_at_every_offset(&bytes);
    }

    #[test]
    fn test_bad_magic_for_width() {
        let bytes = MachOBuilder::new(Width::Bits32).build();
        match parse_with(bytes, Width::Bits64, &ParseOptions::new()).unwrap_err() {
            MachOError::BadMagic { expected, actual, .. } => {
                assert_eq!(expected, MACHO_MAGIC64);
                assert_eq!(actual, MACHO_MAGIC32);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_strict_rejects_command_overrun() {
        // A link-edit command whose cmdsize covers only its preamble.
        let mut short = Vec::new();
        short.extend_from_slice(&lc::FUNCTION_STARTS.to_le_bytes());
        short.extend_from_slice(&8u32.to_le_bytes());
        let bytes = MachOBuilder::new(Width::Bits64)
            .command(short)
            .command(fixtures::rpath("@loader_path"))
            .build();

        match parse_with(bytes, Width::Bits64, &ParseOptions::strict()).unwrap_err() {
            MachOError::CommandOverrun { cmd, cmdsize, consumed, offset } => {
                assert_eq!(cmd, lc::FUNCTION_STARTS);
                assert_eq!(cmdsize, 8);
                assert_eq!(consumed, 16);
                assert_eq!(offset, 32);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_strict_resyncs_on_cmdsize() {
        // Link-edit command padded to 24 bytes.
        let mut padded = fixtures::linkedit(lc::FUNCTION_STARTS, 0x100, 0x10);
        padded[4..8].copy_from_slice(&24u32.to_le_bytes());
        padded.extend_from_slice(&[0; 8]);
        let bytes = MachOBuilder::new(Width::Bits64)
            .command(padded)
            .command(fixtures::rpath("@loader_path"))
            .build();

        let header = parse_with(bytes.clone(), Width::Bits64, &ParseOptions::strict()).unwrap();
        assert_eq!(header.run_paths(), vec!["@loader_path"]);

        // Lenient mode reads the next command from the padding.
        assert!(matches!(
            parse_with(bytes, Width::Bits64, &ParseOptions::lenient()).unwrap_err(),
            MachOError::MalformedCommand { cmd: 0, cmdsize: 0, .. }
        ));
    }

    #[test]
    fn test_strict_rejects_missing_padding() {
        // Last command declares 24 bytes but the stream ends after 16.
        let mut padded = fixtures::linkedit(lc::CODE_SIGNATURE, 0x100, 0x10);
        padded[4..8].copy_from_slice(&24u32.to_le_bytes());
        let bytes = MachOBuilder::new(Width::Bits64)
            .command(padded)
            .sizeofcmds(24)
            .build();
        assert_eq!(bytes.len(), 48);

        let err = parse_with(bytes.clone(), Width::Bits64, &ParseOptions::strict()).unwrap_err();
        match err {
            MachOError::TruncatedRead {
                requested,
                offset,
                available,
            } => {
                assert_eq!(requested, 8);
                assert_eq!(offset, 48);
                assert_eq!(available, 0);
            }
            other => panic!("unexpected error: {other}"),
        }

        let header = parse_with(bytes, Width::Bits64, &ParseOptions::lenient()).unwrap();
        assert_eq!(header.code_signature_range().map(|r| r.size), Some(0x10));
    }

    #[test]
    fn test_sizeofcmds_check() {
        let builder = MachOBuilder::new(Width::Bits32)
            .command(fixtures::rpath("@loader_path"))
            .command(fixtures::rpath("@executable_path"))
            .sizeofcmds(16);
        let bytes = builder.build();

        assert!(matches!(
            parse_with(bytes.clone(), Width::Bits32, &ParseOptions::strict()).unwrap_err(),
            MachOError::CommandsExceedDeclaredSize { declared: 16, .. }
        ));
        let header = parse_with(bytes, Width::Bits32, &ParseOptions::lenient()).unwrap();
        assert_eq!(header.run_paths().len(), 2);
    }

    #[test]
    fn test_too_many_commands() {
        let bytes = MachOBuilder::new(Width::Bits64).ncmds(0x20000).build();
        assert!(matches!(
            parse_with(bytes.clone(), Width::Bits64, &ParseOptions::strict()).unwrap_err(),
            MachOError::TooManyCommands { declared: 0x20000, .. }
        ));
        assert!(parse_with(bytes, Width::Bits64, &ParseOptions::lenient())
            .unwrap_err()
            .is_truncation());
    }

    #[test]
    fn test_lookup_by_kind() {
        let bytes = MachOBuilder::new(Width::Bits64)
            .command(fixtures::segment64("__TEXT", &["__text"]))
            .command(fixtures::segment64("__DATA", &[]))
            .command(fixtures::rpath("@loader_path"))
            .build();
        let header = parse(bytes, Width::Bits64);

        let by_name = header.find_by_kind("LC_RPATH").unwrap().unwrap();
        assert_eq!(by_name.as_rpath().unwrap().path, "@loader_path");
        assert_eq!(header.find_by_kind(lc::RPATH).unwrap(), Some(by_name));
        assert_eq!(header.find_by_kind(LoadCommandKind::Rpath).unwrap(), Some(by_name));
        assert_eq!(header.find_by_kind("0x8000001c").unwrap(), Some(by_name));
        assert_eq!(header.find_by_kind("lc_rpath").unwrap(), Some(by_name));

        assert_eq!(header.all_by_kind("LC_SEGMENT_64").unwrap().len(), 2);
        assert_eq!(header.all_by_kind(lc::SEGMENT).unwrap().len(), 0);

        // Unknown kinds match nothing.
        assert_eq!(header.find_by_kind("LC_NOT_A_COMMAND").unwrap(), None);
        assert_eq!(header.find_by_kind(0x7777u32).unwrap(), None);
        assert!(header.all_by_kind("LC_NOT_A_COMMAND").unwrap().is_empty());

        assert!(matches!(
            header.find_by_kind("segment 64").unwrap_err(),
            MachOError::InvalidLookupKind { .. }
        ));
        assert!(header.all_by_kind("").is_err());
    }

    #[test]
    fn test_run_paths_deduplicated() {
        let bytes = MachOBuilder::new(Width::Bits64)
            .command(fixtures::rpath("@executable_path/Frameworks"))
            .command(fixtures::rpath("@loader_path/Frameworks"))
            .command(fixtures::rpath("@executable_path/Frameworks"))
            .build();
        let header = parse(bytes, Width::Bits64);

        assert_eq!(
            header.run_paths(),
            vec!["@executable_path/Frameworks", "@loader_path/Frameworks"]
        );
    }

    fn signed_image(width: Width) -> Vec<u8> {
        let signature = sample_signature();
        let builder = MachOBuilder::new(width)
            .command(fixtures::dylib(lc::LOAD_DYLIB, "/usr/lib/libz.1.dylib"));
        let dataoff = builder.trailer_offset() + 16;
        builder
            .command(fixtures::linkedit(
                lc::CODE_SIGNATURE,
                dataoff as u32,
                signature.len() as u32,
            ))
            .trailer(signature)
            .build()
    }

    #[test]
    fn test_code_signature_slice() {
        let bytes = signed_image(Width::Bits64);
        let mut cursor = ByteCursor::new(Cursor::new(bytes));
        let header = MachHeader::read(&mut cursor, Width::Bits64, &ParseOptions::new()).unwrap();

        let range = header.code_signature_range().unwrap();
        assert_eq!(range.size, sample_signature().len() as u64);
        let data = header.code_signature_data(&mut cursor).unwrap().unwrap();
        assert_eq!(data, sample_signature());

        let blob = header
            .code_signature_with(&mut cursor, &EnvelopeDecoder)
            .unwrap()
            .unwrap();
        assert_eq!(blob.magic, EMBEDDED_SIGNATURE_MAGIC);
    }

    #[test]
    fn test_code_signature_inside_fat_slice() {
        let (bytes, _) = fixtures::fat(&[
            (fixtures::CPU_TYPE_ARM, signed_image(Width::Bits32)),
            (fixtures::CPU_TYPE_ARM64, signed_image(Width::Bits64)),
        ]);
        let mut cursor = ByteCursor::new(Cursor::new(bytes));
        let options = ParseOptions::new();
        let MachFile::Fat(fat) = read_stream_with_options(&mut cursor, &options).unwrap() else {
            panic!("expected a fat container");
        };

        for header in fat.machos(&mut cursor, &options).unwrap() {
            let blob = header
                .code_signature_with(&mut cursor, &EnvelopeDecoder)
                .unwrap()
                .unwrap();
            assert_eq!(blob.entries.len(), 2);
        }
    }

    #[test]
    fn test_unsigned_and_bad_signature() {
        let bytes = MachOBuilder::new(Width::Bits64).build();
        let mut cursor = ByteCursor::new(Cursor::new(bytes));
        let header = MachHeader::read(&mut cursor, Width::Bits64, &ParseOptions::new()).unwrap();
        assert_eq!(header.code_signature_range(), None);
        assert!(header
            .code_signature_with(&mut cursor, &EnvelopeDecoder)
            .unwrap()
            .is_none());

        let builder = MachOBuilder::new(Width::Bits64);
        let dataoff = builder.trailer_offset() + 16;
        let bytes = builder
            .command(fixtures::linkedit(lc::CODE_SIGNATURE, dataoff as u32, 16))
            .trailer(vec![0x55; 16])
            .build();
        let mut cursor = ByteCursor::new(Cursor::new(bytes));
        let header = MachHeader::read(&mut cursor, Width::Bits64, &ParseOptions::new()).unwrap();
        assert!(matches!(
            header.code_signature_with(&mut cursor, &EnvelopeDecoder).unwrap_err(),
            MachOError::Signature(_)
        ));
    }

    #[test]
    fn test_names_and_serialization() {
        let bytes = MachOBuilder::new(Width::Bits64)
            .command(fixtures::segment64("__TEXT", &["__text"]))
            .build();
        let header = parse(bytes, Width::Bits64);

        assert_eq!(header.cpu_name(), "arm64");
        assert_eq!(header.file_type_name(), "MH_EXECUTE");
        assert_eq!(header.header_size(), MACH_HEADER_64_SIZE);
        assert!(header.flags.contains(HeaderFlags::PIE | HeaderFlags::NOUNDEFS));

        let json = serde_json::to_value(&header).unwrap();
        assert_eq!(json["ncmds"], 1);
        assert_eq!(json["width"], "bits64");
        assert_eq!(json["load_commands"][0]["shape"], "segment");
        assert_eq!(json["load_commands"][0]["segname"], "__TEXT");
    }
}
