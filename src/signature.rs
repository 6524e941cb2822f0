//! Code-signature hand-off.
//!
//! The parser only locates and slices the code-signature bytes of an image
//! (see [`MachHeader::code_signature_with`](crate::formats::MachHeader::code_signature_with)).
//! Decoding is delegated to a [`SignatureDecoder`]. [`EnvelopeDecoder`] is a
//! minimal decoder that reads the outer super-blob and its index, which is
//! enough to tell a well-formed signature from garbage.

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;
use thiserror::Error;

/// `CSMAGIC_EMBEDDED_SIGNATURE`
pub const EMBEDDED_SIGNATURE_MAGIC: u32 = 0xFADE_0CC0;
/// `CSMAGIC_DETACHED_SIGNATURE`
pub const DETACHED_SIGNATURE_MAGIC: u32 = 0xFADE_0CC1;

/// Size of the super-blob header (magic, length, count).
const SUPER_BLOB_HEADER_SIZE: usize = 12;
/// Size of one blob index entry (type, offset).
const BLOB_INDEX_SIZE: usize = 8;

/// Decodes the raw bytes of a code-signature range.
pub trait SignatureDecoder {
    /// Decoded signature tree.
    type Output;
    /// Decoder failure.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Decode a complete signature blob.
    fn decode(&self, data: &[u8]) -> Result<Self::Output, Self::Error>;
}

/// Errors from [`EnvelopeDecoder`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Not enough bytes for a header or index entry
    #[error("Signature blob truncated: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required
        needed: usize,
        /// Bytes present
        available: usize,
    },

    /// Leading magic is not a super-blob magic
    #[error("Not a signature super-blob (magic 0x{magic:08X})")]
    UnknownMagic {
        /// Magic found
        magic: u32,
    },

    /// Declared length runs past the end of the data
    #[error("Signature declares {declared} bytes but only {available} are present")]
    LengthMismatch {
        /// Length from the super-blob header
        declared: u32,
        /// Bytes present
        available: usize,
    },

    /// A sub-blob offset points outside the super-blob
    #[error("Blob index {index} points at offset {offset} outside the signature")]
    OffsetOutOfRange {
        /// Position in the blob index
        index: usize,
        /// Offending sub-blob offset
        offset: u32,
    },
}

/// One entry of a super-blob index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlobIndex {
    /// Slot type (code directory, requirements, entitlements, ...)
    pub slot: u32,
    /// Offset of the sub-blob from the start of the super-blob
    pub offset: u32,
    /// Magic of the sub-blob
    pub magic: u32,
}

/// The outer structure of a signature super-blob.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuperBlob {
    pub magic: u32,
    pub length: u32,
    pub entries: Vec<BlobIndex>,
}

impl SuperBlob {
    /// Entry for a slot type, if present.
    pub fn slot(&self, slot: u32) -> Option<&BlobIndex> {
        self.entries.iter().find(|e| e.slot == slot)
    }
}

/// Reads the super-blob header and index. Sub-blobs are not decoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeDecoder;

fn check_len(data: &[u8], needed: usize) -> Result<(), EnvelopeError> {
    if data.len() < needed {
        return Err(EnvelopeError::Truncated {
            needed,
            available: data.len(),
        });
    }
    Ok(())
}

impl SignatureDecoder for EnvelopeDecoder {
    type Output = SuperBlob;
    type Error = EnvelopeError;

    fn decode(&self, data: &[u8]) -> Result<SuperBlob, EnvelopeError> {
        check_len(data, SUPER_BLOB_HEADER_SIZE)?;

        let magic = BigEndian::read_u32(&data[0..4]);
        if magic != EMBEDDED_SIGNATURE_MAGIC && magic != DETACHED_SIGNATURE_MAGIC {
            return Err(EnvelopeError::UnknownMagic { magic });
        }
        let length = BigEndian::read_u32(&data[4..8]);
        if length as usize > data.len() {
            return Err(EnvelopeError::LengthMismatch {
                declared: length,
                available: data.len(),
            });
        }
        // The signature range is usually padded; ignore what follows `length`.
        let data = &data[..length as usize];
        check_len(data, SUPER_BLOB_HEADER_SIZE)?;

        let count = BigEndian::read_u32(&data[8..12]) as usize;
        check_len(
            data,
            SUPER_BLOB_HEADER_SIZE.saturating_add(count.saturating_mul(BLOB_INDEX_SIZE)),
        )?;

        let mut entries = Vec::with_capacity(count);
        for index in 0..count {
            let at = SUPER_BLOB_HEADER_SIZE + index * BLOB_INDEX_SIZE;
            let slot = BigEndian::read_u32(&data[at..at + 4]);
            let offset = BigEndian::read_u32(&data[at + 4..at + 8]);

            let start = offset as usize;
            let magic = data
                .get(start..start.saturating_add(4))
                .map(BigEndian::read_u32)
                .ok_or(EnvelopeError::OffsetOutOfRange { index, offset })?;
            entries.push(BlobIndex { slot, offset, magic });
        }

        Ok(SuperBlob {
            magic,
            length,
            entries,
        })
    }
}
