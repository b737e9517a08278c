#![forbid(unsafe_code)]
//! Shared newtypes, on-disk constants, and byte-parsing primitives for
//! the osp filesystem image format.
//!
//! Everything on disk is little-endian. The three fixed records
//! (superblock, inode, directory entry) are decoded in `ospfs-ondisk`
//! using the helpers in this crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Magic value in the first superblock field.
pub const FS_MAGIC: u32 = 0x2025_1205;

/// Size of the on-disk superblock: eleven consecutive `u32` fields.
pub const SUPERBLOCK_SIZE: usize = 44;

/// Size of one on-disk inode record:
/// `u32` id, `u8` directory flag, 3 bytes padding, `u32` size,
/// eight `u32` direct block ids.
pub const INODE_RECORD_SIZE: usize = 44;

/// Number of direct block pointers per inode. There is no indirection,
/// so the maximum file size is `DIRECT_BLOCKS * block_size` bytes.
pub const DIRECT_BLOCKS: usize = 8;

/// Size of one packed directory entry: `u32` inode id plus the name buffer.
pub const DIRENTRY_SIZE: usize = 64;

/// Capacity of the NUL-terminated/padded name buffer in a directory entry.
pub const DIRENTRY_NAME_LEN: usize = 60;

/// Block identifier. Block `b` occupies image bytes
/// `b * block_size .. (b + 1) * block_size`.
///
/// `BlockId(0)` holds the superblock and doubles as the "unused slot"
/// sentinel in inode direct-block arrays and directory entries, so it
/// can never be a real data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl BlockId {
    pub const UNUSED: Self = Self(0);

    /// Byte offset of this block for a given block size.
    ///
    /// Returns `None` on overflow.
    #[must_use]
    pub fn byte_offset(self, block_size: u32) -> Option<u64> {
        u64::from(self.0).checked_mul(u64::from(block_size))
    }
}

/// Inode identifier: the index of the record in the inode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InodeId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for InodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors produced while decoding fixed on-disk records from bytes.
///
/// This type stays inside the parsing layer; `ospfs-core` converts it
/// into the user-facing `FsError` at its boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("insufficient data: need {needed} bytes at offset {offset}, got {actual}")]
    InsufficientData {
        needed: usize,
        offset: usize,
        actual: usize,
    },
    #[error("invalid magic: expected {expected:#010x}, got {actual:#010x}")]
    InvalidMagic { expected: u32, actual: u32 },
    #[error("invalid field: {field} ({reason})")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

#[inline]
pub fn ensure_slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8], ParseError> {
    let Some(end) = offset.checked_add(len) else {
        return Err(ParseError::InvalidField {
            field: "offset",
            reason: "overflow",
        });
    };

    if end > data.len() {
        return Err(ParseError::InsufficientData {
            needed: len,
            offset,
            actual: data.len().saturating_sub(offset),
        });
    }

    Ok(&data[offset..end])
}

#[inline]
pub fn read_le_u32(data: &[u8], offset: usize) -> Result<u32, ParseError> {
    let bytes = ensure_slice(data, offset, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub fn read_fixed<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], ParseError> {
    let bytes = ensure_slice(data, offset, N)?;
    let mut out = [0_u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// Decode a NUL-terminated/padded name buffer as UTF-8 with lossy
/// replacement of invalid sequences. Bytes after the first NUL are
/// padding and never part of the name.
#[must_use]
pub fn decode_nul_padded(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
