//! Mach-O Inspect - Strict Mach-O and Universal Binary Parser
//!
//! This library walks the container, header and load-command structure of
//! Mach-O executables (thin or fat/universal) and exposes it as structured,
//! serialisable data, without executing anything.
//!
//! # Features
//!
//! - **Strict Reads**: Every field is read with an exact-size read; short input is an error, never a guess
//! - **Fat Binaries**: Each architecture slice is parsed from its own container-relative offset
//! - **Load Commands**: Segments and sections, dylibs, run paths, link-edit data, encryption info
//! - **Resilient**: Unknown load commands are kept as raw bytes instead of failing the parse
//! - **Code Signatures**: Locates and slices the signature blob for an external decoder
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use macho_inspect::{parse_file, parse_bytes};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Parse a file (thin or fat)
//!     for image in parse_file("Payload/App.app/App")? {
//!         println!("Arch: {}", image.cpu_name());
//!         println!("Encrypted: {}", image.is_encrypted());
//!         println!("Libraries: {:?}", image.loaded_libraries());
//!     }
//!
//!     // Parse raw bytes
//!     let bytes = std::fs::read("Payload/App.app/App")?;
//!     let images = parse_bytes(&bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! # Validation
//!
//! By default every load command is checked against its declared `cmdsize`
//! and the header's `sizeofcmds`. [`ParseOptions::lenient`] turns those
//! checks off and only logs the mismatches.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]

pub mod cursor;
pub mod error;
pub mod formats;
pub mod formatter;
pub mod signature;
pub mod types;

pub use cursor::ByteCursor;
pub use error::{MachOError, Result};
pub use formats::{
    read_stream, read_stream_with_options, CommandLookup, FatArch, FatHeader, LoadCommand,
    LoadCommandKind, MachFile, MachHeader,
};
pub use signature::{EnvelopeDecoder, SignatureDecoder};
pub use types::{ByteRange, FixedName, HeaderFlags, PackedVersion, ParseOptions, VmProt, Width};

use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;

/// Parse every Mach-O image in a file.
///
/// Thin files yield one header, fat files one per architecture.
///
/// # Example
///
/// ```rust,no_run
/// use macho_inspect::parse_file;
///
/// let images = parse_file("/usr/bin/true")?;
/// println!("{} architecture(s)", images.len());
/// # Ok::<(), macho_inspect::MachOError>(())
/// ```
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<MachHeader>> {
    parse_file_with_options(path, &ParseOptions::new())
}

/// Parse every Mach-O image in a file with custom options.
pub fn parse_file_with_options<P: AsRef<Path>>(
    path: P,
    options: &ParseOptions,
) -> Result<Vec<MachHeader>> {
    let file = File::open(path)?;
    let mut cursor = ByteCursor::new(BufReader::new(file));
    read_stream_with_options(&mut cursor, options)?.into_machos(&mut cursor, options)
}

/// Parse every Mach-O image in a byte slice.
pub fn parse_bytes(data: &[u8]) -> Result<Vec<MachHeader>> {
    parse_bytes_with_options(data, &ParseOptions::new())
}

/// Parse every Mach-O image in a byte slice with custom options.
///
/// # Example
///
/// ```rust
/// use macho_inspect::{parse_bytes_with_options, ParseOptions};
///
/// let options = ParseOptions::lenient();
/// // Not a Mach-O file
/// assert!(parse_bytes_with_options(b"\x7FELF", &options).is_err());
/// ```
pub fn parse_bytes_with_options(data: &[u8], options: &ParseOptions) -> Result<Vec<MachHeader>> {
    let mut cursor = ByteCursor::new(Cursor::new(data));
    read_stream_with_options(&mut cursor, options)?.into_machos(&mut cursor, options)
}

/// Get version information for this library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
