#![forbid(unsafe_code)]
//! Byte-exact decode/encode pairs for the three fixed osp records:
//! superblock, inode, and directory entry.
//!
//! All records are little-endian. Each type carries a deterministic
//! `parse_*` / `encode` pair; the encoders exist so tests can build
//! images without a separate formatter, and round trips are verified
//! in this crate's tests.

use ospfs_types::{
    decode_nul_padded, ensure_slice, read_fixed, read_le_u32, BlockId, InodeId, ParseError,
    DIRECT_BLOCKS, DIRENTRY_NAME_LEN, DIRENTRY_SIZE, FS_MAGIC, INODE_RECORD_SIZE, SUPERBLOCK_SIZE,
};
use serde::{Deserialize, Serialize};

/// On-disk superblock: eleven consecutive `u32` fields at image offset 0.
///
/// The region start/length pairs are trusted as-is; the inspector does
/// not verify that regions stay within `total_blocks` or avoid
/// overlapping. An inconsistent superblock surfaces later as an
/// out-of-range or short-read failure on a dependent read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperBlock {
    pub magic: u32,
    pub block_size: u32,
    pub total_blocks: u32,
    pub inode_table_start: u32,
    pub inode_table_blocks: u32,
    pub inode_count: u32,
    pub free_bitmap_start: u32,
    pub free_bitmap_blocks: u32,
    pub data_block_start: u32,
    pub data_block_count: u32,
    pub root_inode_id: u32,
}

impl SuperBlock {
    /// Parse a superblock from the 44-byte region at the start of an image.
    ///
    /// The magic is checked before any other field is interpreted.
    /// Geometry validation (`block_size`/`total_blocks` nonzero) is a
    /// separate step so callers can distinguish "not an osp image" from
    /// "osp image with broken geometry".
    pub fn parse_region(region: &[u8]) -> Result<Self, ParseError> {
        if region.len() < SUPERBLOCK_SIZE {
            return Err(ParseError::InsufficientData {
                needed: SUPERBLOCK_SIZE,
                offset: 0,
                actual: region.len(),
            });
        }

        let magic = read_le_u32(region, 0x00)?;
        if magic != FS_MAGIC {
            return Err(ParseError::InvalidMagic {
                expected: FS_MAGIC,
                actual: magic,
            });
        }

        Ok(Self {
            magic,
            block_size: read_le_u32(region, 0x04)?,
            total_blocks: read_le_u32(region, 0x08)?,
            inode_table_start: read_le_u32(region, 0x0C)?,
            inode_table_blocks: read_le_u32(region, 0x10)?,
            inode_count: read_le_u32(region, 0x14)?,
            free_bitmap_start: read_le_u32(region, 0x18)?,
            free_bitmap_blocks: read_le_u32(region, 0x1C)?,
            data_block_start: read_le_u32(region, 0x20)?,
            data_block_count: read_le_u32(region, 0x24)?,
            root_inode_id: read_le_u32(region, 0x28)?,
        })
    }

    /// Check that `block_size` and `total_blocks` are both nonzero.
    pub fn validate_geometry(&self) -> Result<(), ParseError> {
        if self.block_size == 0 {
            return Err(ParseError::InvalidField {
                field: "block_size",
                reason: "must be nonzero",
            });
        }
        if self.total_blocks == 0 {
            return Err(ParseError::InvalidField {
                field: "total_blocks",
                reason: "must be nonzero",
            });
        }
        Ok(())
    }

    /// Root directory inode id.
    #[must_use]
    pub fn root_inode(&self) -> InodeId {
        InodeId(self.root_inode_id)
    }

    /// Encode to the exact on-disk byte layout.
    #[must_use]
    pub fn encode(&self) -> [u8; SUPERBLOCK_SIZE] {
        let fields = [
            self.magic,
            self.block_size,
            self.total_blocks,
            self.inode_table_start,
            self.inode_table_blocks,
            self.inode_count,
            self.free_bitmap_start,
            self.free_bitmap_blocks,
            self.data_block_start,
            self.data_block_count,
            self.root_inode_id,
        ];
        let mut out = [0_u8; SUPERBLOCK_SIZE];
        for (i, field) in fields.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&field.to_le_bytes());
        }
        out
    }
}

/// On-disk inode record (44 bytes).
///
/// One record per filesystem object; files and directories share the
/// layout and are distinguished only by the directory flag. The direct
/// block array is the sole block-addressing mechanism, so a file can
/// never exceed `DIRECT_BLOCKS * block_size` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inode {
    /// Inode id; matches the record's slot in the inode table.
    pub id: u32,
    pub is_directory: bool,
    /// Byte length. Meaningful for files, advisory for directories.
    pub size: u32,
    /// Direct block ids in content order; 0 marks an unused slot.
    pub direct: [u32; DIRECT_BLOCKS],
}

impl Inode {
    /// Parse an inode record from exactly `INODE_RECORD_SIZE` bytes.
    ///
    /// The directory flag occupies one byte (any nonzero value is
    /// true) followed by three bytes of padding before the size field.
    pub fn parse_record(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < INODE_RECORD_SIZE {
            return Err(ParseError::InsufficientData {
                needed: INODE_RECORD_SIZE,
                offset: 0,
                actual: bytes.len(),
            });
        }

        let id = read_le_u32(bytes, 0x00)?;
        let is_directory = ensure_slice(bytes, 0x04, 1)?[0] != 0;
        let size = read_le_u32(bytes, 0x08)?;

        let mut direct = [0_u32; DIRECT_BLOCKS];
        for (i, slot) in direct.iter_mut().enumerate() {
            *slot = read_le_u32(bytes, 0x0C + i * 4)?;
        }

        Ok(Self {
            id,
            is_directory,
            size,
            direct,
        })
    }

    /// First direct block, or `None` if the slot is unused.
    #[must_use]
    pub fn first_block(&self) -> Option<BlockId> {
        (self.direct[0] != 0).then_some(BlockId(self.direct[0]))
    }

    /// Encode to the exact on-disk byte layout (padding zeroed).
    #[must_use]
    pub fn encode(&self) -> [u8; INODE_RECORD_SIZE] {
        let mut out = [0_u8; INODE_RECORD_SIZE];
        out[0x00..0x04].copy_from_slice(&self.id.to_le_bytes());
        out[0x04] = u8::from(self.is_directory);
        out[0x08..0x0C].copy_from_slice(&self.size.to_le_bytes());
        for (i, slot) in self.direct.iter().enumerate() {
            out[0x0C + i * 4..0x10 + i * 4].copy_from_slice(&slot.to_le_bytes());
        }
        out
    }
}

/// A decoded directory entry.
///
/// Entries live packed inside a directory's first data block; an entry
/// whose `inode_id` is 0 marks an empty slot and is skipped during
/// decoding. Names are not guaranteed unique by this reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub inode_id: u32,
    pub name: String,
}

impl DirEntry {
    pub fn parse_record(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < DIRENTRY_SIZE {
            return Err(ParseError::InsufficientData {
                needed: DIRENTRY_SIZE,
                offset: 0,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            inode_id: read_le_u32(bytes, 0x00)?,
            name: decode_nul_padded(&read_fixed::<DIRENTRY_NAME_LEN>(bytes, 0x04)?),
        })
    }

    /// Encode to the exact on-disk byte layout (name NUL-padded).
    ///
    /// Fails if the name does not fit the fixed buffer or contains a
    /// NUL byte (which would silently shorten it on decode).
    pub fn encode(&self) -> Result<[u8; DIRENTRY_SIZE], ParseError> {
        let name = self.name.as_bytes();
        if name.len() > DIRENTRY_NAME_LEN {
            return Err(ParseError::InvalidField {
                field: "name",
                reason: "exceeds fixed name buffer",
            });
        }
        if name.contains(&0) {
            return Err(ParseError::InvalidField {
                field: "name",
                reason: "contains NUL",
            });
        }

        let mut out = [0_u8; DIRENTRY_SIZE];
        out[0x00..0x04].copy_from_slice(&self.inode_id.to_le_bytes());
        out[0x04..0x04 + name.len()].copy_from_slice(name);
        Ok(out)
    }
}

/// Parse all live directory entries from a directory data block.
///
/// The block is a packed sequence of fixed-size records in on-disk
/// order. Records with `inode_id == 0` are skipped; a trailing partial
/// record (block size not a multiple of the entry size) is ignored.
#[must_use]
pub fn parse_dir_block(block: &[u8]) -> Vec<DirEntry> {
    let mut entries = Vec::new();
    for chunk in block.chunks_exact(DIRENTRY_SIZE) {
        let Ok(entry) = DirEntry::parse_record(chunk) else {
            break;
        };
        if entry.inode_id == 0 {
            continue;
        }
        entries.push(entry);
    }
    entries
}

/// Look up a single name in a directory data block.
///
/// Entries are scanned in on-disk order and the first match wins;
/// duplicate names are tolerated, not diagnosed.
#[must_use]
pub fn lookup_in_dir_block(block: &[u8], target: &str) -> Option<InodeId> {
    parse_dir_block(block)
        .into_iter()
        .find(|entry| entry.name == target)
        .map(|entry| InodeId(entry.inode_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ospfs_types::FS_MAGIC;

    fn sample_superblock() -> SuperBlock {
        SuperBlock {
            magic: FS_MAGIC,
            block_size: 4096,
            total_blocks: 256,
            inode_table_start: 1,
            inode_table_blocks: 2,
            inode_count: 128,
            free_bitmap_start: 3,
            free_bitmap_blocks: 1,
            data_block_start: 4,
            data_block_count: 252,
            root_inode_id: 0,
        }
    }

    #[test]
    fn superblock_round_trip() {
        let sb = sample_superblock();
        let raw = sb.encode();
        assert_eq!(raw.len(), SUPERBLOCK_SIZE);
        assert_eq!(SuperBlock::parse_region(&raw).expect("parse"), sb);
    }

    #[test]
    fn superblock_field_order_is_fixed() {
        let raw = sample_superblock().encode();
        // magic | block_size | total_blocks | inode_table_start | ...
        assert_eq!(read_le_u32(&raw, 0x00).unwrap(), FS_MAGIC);
        assert_eq!(read_le_u32(&raw, 0x04).unwrap(), 4096);
        assert_eq!(read_le_u32(&raw, 0x08).unwrap(), 256);
        assert_eq!(read_le_u32(&raw, 0x24).unwrap(), 252);
        assert_eq!(read_le_u32(&raw, 0x28).unwrap(), 0);
    }

    #[test]
    fn superblock_bad_magic() {
        let mut raw = sample_superblock().encode();
        raw[0] ^= 0xFF;
        assert_eq!(
            SuperBlock::parse_region(&raw),
            Err(ParseError::InvalidMagic {
                expected: FS_MAGIC,
                actual: FS_MAGIC ^ 0xFF,
            })
        );
    }

    #[test]
    fn superblock_short_region() {
        let raw = sample_superblock().encode();
        assert_eq!(
            SuperBlock::parse_region(&raw[..20]),
            Err(ParseError::InsufficientData {
                needed: SUPERBLOCK_SIZE,
                offset: 0,
                actual: 20,
            })
        );
    }

    #[test]
    fn superblock_geometry_validation() {
        let mut sb = sample_superblock();
        assert!(sb.validate_geometry().is_ok());

        sb.block_size = 0;
        assert_eq!(
            sb.validate_geometry(),
            Err(ParseError::InvalidField {
                field: "block_size",
                reason: "must be nonzero",
            })
        );

        sb.block_size = 4096;
        sb.total_blocks = 0;
        assert_eq!(
            sb.validate_geometry(),
            Err(ParseError::InvalidField {
                field: "total_blocks",
                reason: "must be nonzero",
            })
        );
    }

    #[test]
    fn inode_round_trip() {
        let inode = Inode {
            id: 7,
            is_directory: true,
            size: 123,
            direct: [9, 10, 0, 0, 0, 0, 0, 0],
        };
        let raw = inode.encode();
        assert_eq!(raw.len(), INODE_RECORD_SIZE);
        assert_eq!(Inode::parse_record(&raw).expect("parse"), inode);
    }

    #[test]
    fn inode_layout_offsets() {
        let inode = Inode {
            id: 0x0102_0304,
            is_directory: false,
            size: 0x0A0B_0C0D,
            direct: [1, 2, 3, 4, 5, 6, 7, 8],
        };
        let raw = inode.encode();
        assert_eq!(&raw[0x00..0x04], &0x0102_0304_u32.to_le_bytes());
        // Flag byte followed by three bytes of padding, always zero.
        assert_eq!(raw[0x04], 0);
        assert_eq!(&raw[0x05..0x08], &[0, 0, 0]);
        assert_eq!(&raw[0x08..0x0C], &0x0A0B_0C0D_u32.to_le_bytes());
        assert_eq!(&raw[0x0C..0x10], &1_u32.to_le_bytes());
        assert_eq!(&raw[0x28..0x2C], &8_u32.to_le_bytes());
    }

    #[test]
    fn inode_flag_any_nonzero_is_directory() {
        let mut raw = Inode {
            id: 1,
            is_directory: false,
            size: 0,
            direct: [0; DIRECT_BLOCKS],
        }
        .encode();
        raw[0x04] = 0x7F;
        assert!(Inode::parse_record(&raw).expect("parse").is_directory);
    }

    #[test]
    fn inode_first_block_sentinel() {
        let mut inode = Inode {
            id: 1,
            is_directory: true,
            size: 0,
            direct: [0; DIRECT_BLOCKS],
        };
        assert_eq!(inode.first_block(), None);
        inode.direct[0] = 5;
        assert_eq!(inode.first_block(), Some(BlockId(5)));
    }

    #[test]
    fn dir_entry_round_trip() {
        let entry = DirEntry {
            inode_id: 2,
            name: "hello.txt".to_owned(),
        };
        let raw = entry.encode().expect("encode");
        assert_eq!(raw.len(), DIRENTRY_SIZE);
        assert_eq!(DirEntry::parse_record(&raw).expect("parse"), entry);
    }

    #[test]
    fn dir_entry_name_limits() {
        let max = DirEntry {
            inode_id: 1,
            name: "n".repeat(DIRENTRY_NAME_LEN),
        };
        assert!(max.encode().is_ok());

        let too_long = DirEntry {
            inode_id: 1,
            name: "n".repeat(DIRENTRY_NAME_LEN + 1),
        };
        assert!(too_long.encode().is_err());

        let embedded_nul = DirEntry {
            inode_id: 1,
            name: "a\0b".to_owned(),
        };
        assert!(embedded_nul.encode().is_err());
    }

    fn dir_block(entries: &[(u32, &str)], block_size: usize) -> Vec<u8> {
        let mut block = vec![0_u8; block_size];
        for (i, (inode_id, name)) in entries.iter().enumerate() {
            let raw = DirEntry {
                inode_id: *inode_id,
                name: (*name).to_owned(),
            }
            .encode()
            .expect("encode entry");
            block[i * DIRENTRY_SIZE..(i + 1) * DIRENTRY_SIZE].copy_from_slice(&raw);
        }
        block
    }

    #[test]
    fn parse_dir_block_skips_empty_slots() {
        let block = dir_block(&[(2, "a"), (0, "deleted"), (3, "b")], 512);
        let entries = parse_dir_block(&block);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a");
        assert_eq!(entries[1].name, "b");
    }

    #[test]
    fn parse_dir_block_preserves_on_disk_order() {
        let block = dir_block(&[(5, "z"), (4, "a"), (3, "m")], 256);
        let entries = parse_dir_block(&block);
        let names: Vec<&str> = entries
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, ["z", "a", "m"]);
    }

    #[test]
    fn parse_dir_block_ignores_trailing_partial_record() {
        // 200 bytes holds three full entries plus 8 stray bytes.
        let block = dir_block(&[(2, "a"), (3, "b"), (4, "c")], 200);
        assert_eq!(parse_dir_block(&block).len(), 3);
    }

    #[test]
    fn lookup_first_match_wins_on_duplicates() {
        // Duplicate names are tolerated by design: the reader resolves
        // to the first entry in block order and never reports the
        // ambiguity.
        let block = dir_block(&[(7, "dup"), (8, "dup")], 256);
        assert_eq!(lookup_in_dir_block(&block, "dup"), Some(InodeId(7)));
    }

    #[test]
    fn lookup_miss_returns_none() {
        let block = dir_block(&[(2, "present")], 256);
        assert_eq!(lookup_in_dir_block(&block, "absent"), None);
    }
}
