#![forbid(unsafe_code)]
//! Core inspector operations over an open osp image: superblock
//! validation, inode-table addressing, path resolution, file-content
//! reassembly, and free-bitmap accounting.
//!
//! All operations are pure functions of `(device, superblock,
//! identifier)`: nothing is cached or mutated across calls, and every
//! operation is a bounded sequence of positioned reads. This is the
//! sole crate that converts the parse-layer `ParseError` into the
//! user-facing `FsError`.

use ospfs_block::{read_block, read_superblock_region, ByteDevice, FileByteDevice};
use ospfs_error::{FsError, Result};
use ospfs_ondisk::{lookup_in_dir_block, parse_dir_block, Inode, SuperBlock};
use ospfs_types::{BlockId, InodeId, ParseError, INODE_RECORD_SIZE};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, trace};

/// Convert a parse-layer error into the user-facing taxonomy.
///
/// `InvalidMagic` means "not an osp image"; `InsufficientData` means
/// the image ends before a fixed record does. `InvalidField` on the
/// two geometry fields becomes `InvalidGeometry`; anything else keeps
/// its parse-layer description.
fn parse_to_fs_error(err: &ParseError) -> FsError {
    match err {
        ParseError::InvalidMagic { expected, actual } => FsError::BadMagic {
            expected: *expected,
            actual: *actual,
        },
        ParseError::InsufficientData {
            needed,
            offset,
            actual,
        } => FsError::ShortRead {
            needed: *needed as u64,
            offset: *offset as u64,
            actual: *actual as u64,
        },
        ParseError::InvalidField { field, reason }
            if matches!(*field, "block_size" | "total_blocks") =>
        {
            FsError::InvalidGeometry(format!("{field}: {reason}"))
        }
        ParseError::InvalidField { .. } => FsError::Parse(err.to_string()),
    }
}

/// Split a slash-delimited path into its non-empty components.
///
/// Leading, trailing, and repeated separators collapse away, so
/// `"/a//b/"`, `"a/b"`, and `"//a/b//"` all yield `["a", "b"]`. An
/// empty result means the path names the root.
#[must_use]
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

/// One entry from a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListEntry {
    pub name: String,
    pub is_directory: bool,
}

/// Used/free accounting for the data-block region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitmapStats {
    pub total: u32,
    pub used: u32,
    pub free: u32,
}

/// An open osp image: a positioned-read device plus its validated
/// superblock.
///
/// The superblock is read once at open time and every other component
/// consumes the geometry it declares. The device handle lives for one
/// command invocation and is released on every exit path when the
/// `OpenFs` drops.
pub struct OpenFs {
    device: Box<dyn ByteDevice>,
    superblock: SuperBlock,
}

impl std::fmt::Debug for OpenFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenFs")
            .field("superblock", &self.superblock)
            .field("device_len", &self.device.len_bytes())
            .finish()
    }
}

impl OpenFs {
    /// Open an image file read-only and validate its superblock.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let device = FileByteDevice::open(path.as_ref())?;
        debug!(
            image = %path.as_ref().display(),
            len = device.len_bytes(),
            "opened image file"
        );
        Self::from_device(Box::new(device))
    }

    /// Validate the superblock of an already-open device.
    ///
    /// Fails with `BadMagic` before any other field is interpreted,
    /// then with `InvalidGeometry` if `block_size` or `total_blocks`
    /// is zero. All other superblock fields are validated lazily by
    /// the operations that consume them.
    pub fn from_device(device: Box<dyn ByteDevice>) -> Result<Self> {
        let region = read_superblock_region(device.as_ref())?;
        let superblock =
            SuperBlock::parse_region(&region).map_err(|e| parse_to_fs_error(&e))?;
        superblock
            .validate_geometry()
            .map_err(|e| parse_to_fs_error(&e))?;

        debug!(
            block_size = superblock.block_size,
            total_blocks = superblock.total_blocks,
            inode_count = superblock.inode_count,
            root_inode = superblock.root_inode_id,
            "validated superblock"
        );

        Ok(Self { device, superblock })
    }

    #[must_use]
    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    /// Read one full block through the block accessor.
    pub fn read_block(&self, block: BlockId) -> Result<Vec<u8>> {
        read_block(
            self.device.as_ref(),
            self.superblock.block_size,
            self.superblock.total_blocks,
            block,
        )
    }

    /// How many inode records fit in one block.
    fn inodes_per_block(&self) -> Result<u32> {
        let per = self.superblock.block_size / INODE_RECORD_SIZE as u32;
        if per == 0 {
            return Err(FsError::InvalidLayout(format!(
                "block size {} cannot hold a {INODE_RECORD_SIZE}-byte inode record",
                self.superblock.block_size
            )));
        }
        Ok(per)
    }

    /// Byte offset of an inode record within the image.
    ///
    /// Validates the id against `inode_count` and the implied table
    /// block against `inode_table_blocks`; an inconsistency between
    /// those two superblock fields is a `GeometryMismatch`.
    pub fn inode_offset(&self, inode: InodeId) -> Result<u64> {
        let sb = &self.superblock;
        let per = self.inodes_per_block()?;

        if inode.0 >= sb.inode_count {
            return Err(FsError::OutOfRange {
                what: "inode",
                value: inode.0,
                limit: sb.inode_count,
            });
        }

        let block_index = inode.0 / per;
        let index_in_block = inode.0 % per;
        if block_index >= sb.inode_table_blocks {
            return Err(FsError::GeometryMismatch {
                block_index,
                table_blocks: sb.inode_table_blocks,
            });
        }

        let table_block =
            sb.inode_table_start
                .checked_add(block_index)
                .ok_or(FsError::OutOfRange {
                    what: "block",
                    value: u32::MAX,
                    limit: sb.total_blocks,
                })?;

        // u32 * u32 cannot overflow u64, and the in-block offset stays
        // below one block, so the sum fits.
        let base = BlockId(table_block)
            .byte_offset(sb.block_size)
            .unwrap_or(u64::MAX);
        Ok(base + u64::from(index_in_block) * INODE_RECORD_SIZE as u64)
    }

    /// Read and decode one inode record.
    pub fn read_inode(&self, inode: InodeId) -> Result<Inode> {
        let offset = self.inode_offset(inode)?;
        let mut record = [0_u8; INODE_RECORD_SIZE];
        self.device.read_exact_at(offset, &mut record)?;
        Inode::parse_record(&record).map_err(|e| parse_to_fs_error(&e))
    }

    /// Resolve a slash-delimited path to an inode id.
    ///
    /// An empty path or one consisting only of separators resolves to
    /// the root inode without touching the image. Each component is
    /// looked up in its parent's first (and only) directory data
    /// block; the first name match in on-disk order wins.
    pub fn resolve_path(&self, path: &str) -> Result<InodeId> {
        let root = self.superblock.root_inode();
        let components = split_path(path);
        if components.is_empty() {
            return Ok(root);
        }

        let mut current = root;
        for component in components {
            let inode = self.read_inode(current)?;
            if !inode.is_directory {
                return Err(FsError::NotADirectory(current.0));
            }
            let Some(first) = inode.first_block() else {
                return Err(FsError::EmptyDirectory(current.0));
            };
            let block = self.read_block(first)?;
            current = lookup_in_dir_block(&block, component)
                .ok_or_else(|| FsError::PathNotFound(component.to_owned()))?;
            trace!(component, inode = current.0, "resolved path component");
        }

        Ok(current)
    }

    /// List a directory's entries in on-disk order.
    ///
    /// Each child's inode is read solely to report whether it is a
    /// directory. An empty directory (no first data block) lists as
    /// an empty sequence, not an error.
    pub fn list_dir(&self, path: &str) -> Result<Vec<ListEntry>> {
        let id = self.resolve_path(path)?;
        let inode = self.read_inode(id)?;
        if !inode.is_directory {
            return Err(FsError::NotADirectory(id.0));
        }
        let Some(first) = inode.first_block() else {
            return Ok(Vec::new());
        };

        let block = self.read_block(first)?;
        let mut entries = Vec::new();
        for entry in parse_dir_block(&block) {
            let child = self.read_inode(InodeId(entry.inode_id))?;
            entries.push(ListEntry {
                name: entry.name,
                is_directory: child.is_directory,
            });
        }
        Ok(entries)
    }

    /// Reassemble a file's content from its direct blocks.
    ///
    /// Blocks are visited in array order; iteration stops at the first
    /// unused slot or once the declared size is satisfied. A declared
    /// size the allocated blocks cannot cover is a `TruncatedFile`,
    /// which also catches sizes beyond the 8-block cap.
    pub fn read_file_content(&self, path: &str) -> Result<Vec<u8>> {
        let id = self.resolve_path(path)?;
        let inode = self.read_inode(id)?;
        if inode.is_directory {
            return Err(FsError::IsADirectory(id.0));
        }

        let block_size = self.superblock.block_size;
        let mut remaining = inode.size;
        let mut content = Vec::new();

        for &block_id in &inode.direct {
            if remaining == 0 || block_id == 0 {
                break;
            }
            let block = self.read_block(BlockId(block_id))?;
            let take = remaining.min(block_size) as usize;
            content.extend_from_slice(&block[..take]);
            remaining -= take as u32;
        }

        if remaining != 0 {
            return Err(FsError::TruncatedFile {
                declared: inode.size,
                recovered: inode.size - remaining,
            });
        }
        Ok(content)
    }

    /// Count used and free data blocks from the free bitmap.
    ///
    /// Scans bitmap blocks in order, one bit per tracked data block,
    /// least-significant bit first within each byte. Only
    /// `data_block_count` logical bits are consulted even when the
    /// bitmap region has trailing unused capacity.
    #[allow(clippy::cast_possible_truncation)] // bit indices are bounded by block.len() * 8
    pub fn bitmap_stats(&self) -> Result<BitmapStats> {
        let sb = &self.superblock;
        let total = sb.data_block_count;
        let mut used: u32 = 0;
        let mut remaining = total;

        for index in 0..sb.free_bitmap_blocks {
            if remaining == 0 {
                break;
            }
            let block_id =
                sb.free_bitmap_start
                    .checked_add(index)
                    .ok_or(FsError::OutOfRange {
                        what: "block",
                        value: u32::MAX,
                        limit: sb.total_blocks,
                    })?;
            let block = self.read_block(BlockId(block_id))?;

            let bits_in_block = u64::from(remaining).min(block.len() as u64 * 8);
            for bit in 0..bits_in_block {
                let byte = block[(bit / 8) as usize];
                if (byte >> (bit % 8)) & 1 == 1 {
                    used += 1;
                }
            }
            // Capped by `remaining` above, so the narrowing is lossless.
            remaining -= bits_in_block as u32;
        }

        Ok(BitmapStats {
            total,
            used,
            free: total - used,
        })
    }
}
