#![forbid(unsafe_code)]
//! Read-only block I/O over an osp image.
//!
//! Provides the `ByteDevice` trait for positioned reads, a file-backed
//! implementation using `pread`-style I/O (no shared seek cursor), an
//! in-memory implementation for tests, and the block accessor that
//! turns a validated block id into exactly one block of bytes.
//!
//! There is no caching: every operation is a bounded sequence of
//! positioned reads, decoded fresh on each call.

use ospfs_error::{FsError, Result};
use ospfs_types::{BlockId, SUPERBLOCK_SIZE};
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::Path;

/// Byte-addressed read-only device (pread semantics).
pub trait ByteDevice: Send + Sync {
    /// Total length in bytes.
    fn len_bytes(&self) -> u64;

    /// Read exactly `buf.len()` bytes from `offset` into `buf`.
    ///
    /// Fails with `FsError::ShortRead` if the device cannot supply the
    /// full range; partial reads are never surfaced.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;
}

/// Bounds-check a positioned read against the device length.
fn check_range(len: u64, offset: u64, needed: usize) -> Result<()> {
    let needed_u64 = needed as u64;
    let end = offset
        .checked_add(needed_u64)
        .ok_or(FsError::ShortRead {
            needed: needed_u64,
            offset,
            actual: len,
        })?;
    if end > len {
        return Err(FsError::ShortRead {
            needed: needed_u64,
            offset,
            actual: len.saturating_sub(offset).min(needed_u64),
        });
    }
    Ok(())
}

/// File-backed byte device opened read-only.
///
/// Uses `std::os::unix::fs::FileExt`, so reads carry their own offset
/// and the handle has no seek position to corrupt. The handle is
/// scoped: dropped (and thus closed) on every exit path.
#[derive(Debug)]
pub struct FileByteDevice {
    file: File,
    len: u64,
}

impl FileByteDevice {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

impl ByteDevice for FileByteDevice {
    fn len_bytes(&self) -> u64 {
        self.len
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_range(self.len, offset, buf.len())?;
        self.file.read_exact_at(buf, offset)?;
        Ok(())
    }
}

/// In-memory byte device.
///
/// Test suites build images in a `Vec<u8>` and read them through the
/// same code paths as a real file.
#[derive(Debug, Clone)]
pub struct MemoryByteDevice {
    bytes: Vec<u8>,
}

impl MemoryByteDevice {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl ByteDevice for MemoryByteDevice {
    fn len_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_range(self.len_bytes(), offset, buf.len())?;
        let start = usize::try_from(offset).map_err(|_| FsError::ShortRead {
            needed: buf.len() as u64,
            offset,
            actual: 0,
        })?;
        buf.copy_from_slice(&self.bytes[start..start + buf.len()]);
        Ok(())
    }
}

/// Read the fixed-size superblock region at the start of the device.
pub fn read_superblock_region(dev: &dyn ByteDevice) -> Result<[u8; SUPERBLOCK_SIZE]> {
    let mut region = [0_u8; SUPERBLOCK_SIZE];
    dev.read_exact_at(0, &mut region)?;
    Ok(region)
}

/// Read one full block.
///
/// Validates `block < total_blocks` (`FsError::OutOfRange` otherwise)
/// and returns exactly `block_size` bytes from offset
/// `block * block_size`; a truncated image yields `FsError::ShortRead`,
/// never a partial block.
pub fn read_block(
    dev: &dyn ByteDevice,
    block_size: u32,
    total_blocks: u32,
    block: BlockId,
) -> Result<Vec<u8>> {
    if block.0 >= total_blocks {
        return Err(FsError::OutOfRange {
            what: "block",
            value: block.0,
            limit: total_blocks,
        });
    }

    let offset = block.byte_offset(block_size).ok_or(FsError::OutOfRange {
        what: "block",
        value: block.0,
        limit: total_blocks,
    })?;

    let mut buf = vec![0_u8; block_size as usize];
    dev.read_exact_at(offset, &mut buf)?;
    Ok(buf)
}
