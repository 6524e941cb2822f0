//! Load command and container registry.
//!
//! Static tables mapping numeric load command codes to symbolic kinds and
//! names, and kinds to the reader that decodes them. Nothing here is built
//! lazily: the table is a `const` slice and dispatch is a `match`.

use serde::{Serialize, Serializer};
use std::fmt;

use crate::error::{MachOError, Result};
use crate::formats::magic;

/// Flag OR-ed into commands the dynamic linker must understand.
pub const LC_REQ_DYLD: u32 = 0x8000_0000;

macro_rules! load_command_kinds {
    ($( $variant:ident = $code:expr => $name:literal, )*) => {
        /// Symbolic load command kind.
        ///
        /// Unrecognised codes are carried verbatim in [`LoadCommandKind::Unknown`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[allow(missing_docs)]
        pub enum LoadCommandKind {
            $( $variant, )*
            Unknown(u32),
        }

        /// Every known kind with its code and canonical name.
        pub const KNOWN_KINDS: &[(LoadCommandKind, u32, &str)] = &[
            $( (LoadCommandKind::$variant, $code, $name), )*
        ];

        impl LoadCommandKind {
            /// Numeric load command code.
            pub fn code(self) -> u32 {
                match self {
                    $( LoadCommandKind::$variant => $code, )*
                    LoadCommandKind::Unknown(code) => code,
                }
            }

            /// Canonical `LC_*` name, or `None` for unknown codes.
            pub fn name(self) -> Option<&'static str> {
                match self {
                    $( LoadCommandKind::$variant => Some($name), )*
                    LoadCommandKind::Unknown(_) => None,
                }
            }
        }
    };
}

load_command_kinds! {
    Segment = 0x1 => "LC_SEGMENT",
    Symtab = 0x2 => "LC_SYMTAB",
    Symseg = 0x3 => "LC_SYMSEG",
    Thread = 0x4 => "LC_THREAD",
    UnixThread = 0x5 => "LC_UNIXTHREAD",
    LoadFvmlib = 0x6 => "LC_LOADFVMLIB",
    IdFvmlib = 0x7 => "LC_IDFVMLIB",
    Ident = 0x8 => "LC_IDENT",
    FvmFile = 0x9 => "LC_FVMFILE",
    Prepage = 0xa => "LC_PREPAGE",
    Dysymtab = 0xb => "LC_DYSYMTAB",
    LoadDylib = 0xc => "LC_LOAD_DYLIB",
    IdDylib = 0xd => "LC_ID_DYLIB",
    LoadDylinker = 0xe => "LC_LOAD_DYLINKER",
    IdDylinker = 0xf => "LC_ID_DYLINKER",
    PreboundDylib = 0x10 => "LC_PREBOUND_DYLIB",
    Routines = 0x11 => "LC_ROUTINES",
    SubFramework = 0x12 => "LC_SUB_FRAMEWORK",
    SubUmbrella = 0x13 => "LC_SUB_UMBRELLA",
    SubClient = 0x14 => "LC_SUB_CLIENT",
    SubLibrary = 0x15 => "LC_SUB_LIBRARY",
    TwolevelHints = 0x16 => "LC_TWOLEVEL_HINTS",
    PrebindCksum = 0x17 => "LC_PREBIND_CKSUM",
    LoadWeakDylib = 0x18 | LC_REQ_DYLD => "LC_LOAD_WEAK_DYLIB",
    Segment64 = 0x19 => "LC_SEGMENT_64",
    Routines64 = 0x1a => "LC_ROUTINES_64",
    Uuid = 0x1b => "LC_UUID",
    Rpath = 0x1c | LC_REQ_DYLD => "LC_RPATH",
    CodeSignature = 0x1d => "LC_CODE_SIGNATURE",
    SegmentSplitInfo = 0x1e => "LC_SEGMENT_SPLIT_INFO",
    ReexportDylib = 0x1f | LC_REQ_DYLD => "LC_REEXPORT_DYLIB",
    LazyLoadDylib = 0x20 => "LC_LAZY_LOAD_DYLIB",
    EncryptionInfo = 0x21 => "LC_ENCRYPTION_INFO",
    DyldInfo = 0x22 => "LC_DYLD_INFO",
    DyldInfoOnly = 0x22 | LC_REQ_DYLD => "LC_DYLD_INFO_ONLY",
    LoadUpwardDylib = 0x23 | LC_REQ_DYLD => "LC_LOAD_UPWARD_DYLIB",
    VersionMinMacosx = 0x24 => "LC_VERSION_MIN_MACOSX",
    VersionMinIphoneos = 0x25 => "LC_VERSION_MIN_IPHONEOS",
    FunctionStarts = 0x26 => "LC_FUNCTION_STARTS",
    DyldEnvironment = 0x27 => "LC_DYLD_ENVIRONMENT",
    Main = 0x28 | LC_REQ_DYLD => "LC_MAIN",
    DataInCode = 0x29 => "LC_DATA_IN_CODE",
    SourceVersion = 0x2a => "LC_SOURCE_VERSION",
    DylibCodeSignDrs = 0x2b => "LC_DYLIB_CODE_SIGN_DRS",
    EncryptionInfo64 = 0x2c => "LC_ENCRYPTION_INFO_64",
    LinkerOption = 0x2d => "LC_LINKER_OPTION",
    LinkerOptimizationHint = 0x2e => "LC_LINKER_OPTIMIZATION_HINT",
    VersionMinTvos = 0x2f => "LC_VERSION_MIN_TVOS",
    VersionMinWatchos = 0x30 => "LC_VERSION_MIN_WATCHOS",
    Note = 0x31 => "LC_NOTE",
    BuildVersion = 0x32 => "LC_BUILD_VERSION",
    DyldExportsTrie = 0x33 | LC_REQ_DYLD => "LC_DYLD_EXPORTS_TRIE",
    DyldChainedFixups = 0x34 | LC_REQ_DYLD => "LC_DYLD_CHAINED_FIXUPS",
    FilesetEntry = 0x35 | LC_REQ_DYLD => "LC_FILESET_ENTRY",
    AtomInfo = 0x36 => "LC_ATOM_INFO",
}

impl LoadCommandKind {
    /// Kind for a numeric code; unrecognised codes map to `Unknown(code)`.
    pub fn from_code(code: u32) -> Self {
        kind_for(code).unwrap_or(LoadCommandKind::Unknown(code))
    }

    /// Kind for a canonical `LC_*` name (ASCII case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        KNOWN_KINDS
            .iter()
            .find(|(_, _, n)| n.eq_ignore_ascii_case(name))
            .map(|(kind, _, _)| *kind)
    }

    /// Returns true for codes present in the registry.
    pub fn is_known(self) -> bool {
        !matches!(self, LoadCommandKind::Unknown(_))
    }
}

impl fmt::Display for LoadCommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "LC_UNKNOWN(0x{:X})", self.code()),
        }
    }
}

impl Serialize for LoadCommandKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Known kind for a numeric code, or `None`.
pub fn kind_for(code: u32) -> Option<LoadCommandKind> {
    KNOWN_KINDS
        .iter()
        .find(|(_, c, _)| *c == code)
        .map(|(kind, _, _)| *kind)
}

/// Canonical name for a numeric code, or `None`.
pub fn name_for(code: u32) -> Option<&'static str> {
    kind_for(code).and_then(LoadCommandKind::name)
}

/// Reader responsible for decoding one load command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandReader {
    /// Preserves the undecoded payload; used for every kind without a
    /// dedicated reader.
    Undefined,
    /// `segment_command` followed by 32-bit sections.
    Segment32,
    /// `segment_command_64` followed by 64-bit sections.
    Segment64,
    /// `dylib_command` with trailing name.
    Dylib,
    /// `linkedit_data_command` (offset + size).
    LinkEditData,
    /// `encryption_info_command`.
    EncryptionInfo32,
    /// `encryption_info_command_64` (trailing pad).
    EncryptionInfo64,
    /// `rpath_command` with trailing path.
    RPath,
}

/// Reader for a load command code.
///
/// Unrecognised codes, and known codes without a dedicated reader, get
/// [`CommandReader::Undefined`].
pub fn reader_for(code: u32) -> CommandReader {
    use LoadCommandKind as K;

    match LoadCommandKind::from_code(code) {
        K::Segment => CommandReader::Segment32,
        K::Segment64 => CommandReader::Segment64,
        K::IdDylib
        | K::LoadDylib
        | K::LoadWeakDylib
        | K::ReexportDylib
        | K::LazyLoadDylib
        | K::LoadUpwardDylib => CommandReader::Dylib,
        K::CodeSignature
        | K::SegmentSplitInfo
        | K::FunctionStarts
        | K::DataInCode
        | K::DylibCodeSignDrs
        | K::LinkerOptimizationHint
        | K::DyldExportsTrie
        | K::DyldChainedFixups
        | K::AtomInfo => CommandReader::LinkEditData,
        K::EncryptionInfo => CommandReader::EncryptionInfo32,
        K::EncryptionInfo64 => CommandReader::EncryptionInfo64,
        K::Rpath => CommandReader::RPath,
        _ => CommandReader::Undefined,
    }
}

/// Top-level reader selected from a file's leading magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerReader {
    /// Fat/universal header
    Fat,
    /// 32-bit Mach header
    MachHeader32,
    /// 64-bit Mach header
    MachHeader64,
}

impl ContainerReader {
    /// Magic value this reader expects (big-endian interpretation).
    pub fn magic(self) -> u32 {
        match self {
            ContainerReader::Fat => magic::FAT_MAGIC,
            ContainerReader::MachHeader32 => magic::MACHO_MAGIC32,
            ContainerReader::MachHeader64 => magic::MACHO_MAGIC64,
        }
    }
}

/// Container reader for a big-endian interpreted magic value.
pub fn reader_for_magic(value: u32) -> Result<ContainerReader> {
    match value {
        magic::FAT_MAGIC => Ok(ContainerReader::Fat),
        magic::MACHO_MAGIC32 => Ok(ContainerReader::MachHeader32),
        magic::MACHO_MAGIC64 => Ok(ContainerReader::MachHeader64),
        other => Err(MachOError::UnrecognizedMagic { magic: other }),
    }
}

/// A value used to look up load commands by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandLookup<'a> {
    /// Raw numeric code
    Code(u32),
    /// Symbolic kind
    Kind(LoadCommandKind),
    /// `LC_*` name, or a decimal / `0x` hexadecimal code in string form
    Name(&'a str),
}

impl CommandLookup<'_> {
    /// Normalise to a numeric code.
    ///
    /// Well-formed names that are not in the registry resolve to `None`
    /// (nothing can match them). Strings that are neither a name nor a
    /// number fail with [`MachOError::InvalidLookupKind`].
    pub fn resolve(&self) -> Result<Option<u32>> {
        match *self {
            CommandLookup::Code(code) => Ok(Some(code)),
            CommandLookup::Kind(kind) => Ok(Some(kind.code())),
            CommandLookup::Name(text) => resolve_name(text),
        }
    }
}

fn resolve_name(text: &str) -> Result<Option<u32>> {
    let invalid = || MachOError::InvalidLookupKind {
        value: text.to_string(),
    };
    let text = text.trim();

    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return Err(invalid());
    }

    if text.as_bytes()[0].is_ascii_digit() {
        let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => text.parse::<u32>(),
        };
        return parsed.map(Some).map_err(|_| invalid());
    }

    Ok(LoadCommandKind::from_name(text).map(LoadCommandKind::code))
}

impl From<u32> for CommandLookup<'_> {
    fn from(code: u32) -> Self {
        CommandLookup::Code(code)
    }
}

impl From<LoadCommandKind> for CommandLookup<'_> {
    fn from(kind: LoadCommandKind) -> Self {
        CommandLookup::Kind(kind)
    }
}

impl<'a> From<&'a str> for CommandLookup<'a> {
    fn from(name: &'a str) -> Self {
        CommandLookup::Name(name)
    }
}
