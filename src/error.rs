//! Error types for the Mach-O inspector.
//!
//! Every failure carries enough context (requested size, stream offset,
//! offending value) to tell exactly where and why decoding stopped.

use thiserror::Error;

/// Primary error type for Mach-O parsing.
#[derive(Debug, Error)]
pub enum MachOError {
    /// IO error from the underlying byte source.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Fewer bytes were available than a read required.
    #[error("Truncated read at offset {offset}: requested {requested} bytes, got {available}")]
    TruncatedRead {
        /// Bytes the read asked for
        requested: u64,
        /// Position the read started at
        offset: u64,
        /// Bytes actually available
        available: u64,
    },

    /// Top-level dispatch found no container or header kind for this magic.
    #[error("Unrecognized magic value: 0x{magic:08X}")]
    UnrecognizedMagic {
        /// Leading four bytes, big-endian
        magic: u32,
    },

    /// A reader's own magic re-check disagreed with the dispatch decision.
    #[error("Unexpected magic at offset {offset}: expected 0x{expected:08X}, got 0x{actual:08X}")]
    BadMagic {
        /// Magic the reader accepts
        expected: u32,
        /// Magic found in the stream
        actual: u32,
        /// Position of the magic
        offset: u64,
    },

    /// Declared load command size cannot even hold the command preamble.
    #[error("Load command 0x{cmd:08X} size too small ({cmdsize} bytes) at offset {offset}")]
    MalformedCommand {
        /// Command code
        cmd: u32,
        /// Declared command size
        cmdsize: u32,
        /// Start of the command
        offset: u64,
    },

    /// A load command reader consumed more bytes than the command declared.
    #[error("Load command 0x{cmd:08X} at offset {offset} declares {cmdsize} bytes but {consumed} were consumed")]
    CommandOverrun {
        /// Command code
        cmd: u32,
        /// Declared command size
        cmdsize: u32,
        /// Bytes the reader consumed
        consumed: u64,
        /// Start of the command
        offset: u64,
    },

    /// Parsed load commands add up to more than the header's `sizeofcmds`.
    #[error("Load commands occupy {actual} bytes, header declares {declared}")]
    CommandsExceedDeclaredSize {
        /// Header's `sizeofcmds`
        declared: u32,
        /// Sum of the parsed `cmdsize` values
        actual: u64,
    },

    /// Header declares more load commands than the configured limit.
    #[error("Header declares {declared} load commands (limit {limit})")]
    TooManyCommands {
        /// Header's `ncmds`
        declared: u32,
        /// Configured maximum
        limit: u32,
    },

    /// Fat header declares more architectures than the configured limit.
    #[error("Fat header declares {declared} architectures (limit {limit})")]
    TooManyArchitectures {
        /// Fat header's `nfat_arch`
        declared: u32,
        /// Configured maximum
        limit: u32,
    },

    /// A load command lookup value is neither a code nor a command name.
    #[error("Invalid load command lookup value: {value:?}")]
    InvalidLookupKind {
        /// Rejected lookup string
        value: String,
    },

    /// A code-signature decoder rejected the sliced signature bytes.
    #[error("Code signature decoding failed: {0}")]
    Signature(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result type alias for Mach-O operations.
pub type Result<T> = std::result::Result<T, MachOError>;

impl MachOError {
    /// Stream offset this error is attached to, if any.
    pub fn offset(&self) -> Option<u64> {
        match self {
            MachOError::TruncatedRead { offset, .. }
            | MachOError::BadMagic { offset, .. }
            | MachOError::MalformedCommand { offset, .. }
            | MachOError::CommandOverrun { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// Returns true if the error was caused by running out of input.
    #[inline]
    pub fn is_truncation(&self) -> bool {
        matches!(self, MachOError::TruncatedRead { .. })
    }
}
