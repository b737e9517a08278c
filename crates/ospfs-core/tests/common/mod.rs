//! Shared test-image builder.
//!
//! Builds osp images in memory with the encoders from `ospfs-ondisk`,
//! so the inspector is exercised against byte layouts produced by the
//! same round-trip-tested codecs.

use ospfs_block::MemoryByteDevice;
use ospfs_core::OpenFs;
use ospfs_ondisk::{DirEntry, Inode, SuperBlock};
use ospfs_types::{DIRECT_BLOCKS, DIRENTRY_SIZE, FS_MAGIC, INODE_RECORD_SIZE};

pub struct ImageBuilder {
    sb: SuperBlock,
    image: Vec<u8>,
}

impl ImageBuilder {
    pub fn new(sb: SuperBlock) -> Self {
        let len = sb.block_size as usize * sb.total_blocks as usize;
        let mut image = vec![0_u8; len];
        image[..44].copy_from_slice(&sb.encode());
        Self { sb, image }
    }

    /// Canonical small geometry used by most tests:
    /// 64-byte blocks, 16 blocks total, data region at blocks 2..8,
    /// inode table at blocks 8..12 (one record per block), bitmap at
    /// block 12, root inode id 0.
    pub fn small() -> Self {
        Self::new(SuperBlock {
            magic: FS_MAGIC,
            block_size: 64,
            total_blocks: 16,
            inode_table_start: 8,
            inode_table_blocks: 4,
            inode_count: 4,
            free_bitmap_start: 12,
            free_bitmap_blocks: 1,
            data_block_start: 2,
            data_block_count: 6,
            root_inode_id: 0,
        })
    }

    /// Roomier geometry for directory tests: 256-byte blocks hold four
    /// directory entries and five inode records each. Same region
    /// layout as [`ImageBuilder::small`].
    pub fn wide() -> Self {
        Self::new(SuperBlock {
            magic: FS_MAGIC,
            block_size: 256,
            total_blocks: 16,
            inode_table_start: 8,
            inode_table_blocks: 4,
            inode_count: 8,
            free_bitmap_start: 12,
            free_bitmap_blocks: 1,
            data_block_start: 2,
            data_block_count: 6,
            root_inode_id: 0,
        })
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.sb
    }

    pub fn write_block(&mut self, block: u32, bytes: &[u8]) -> &mut Self {
        let bs = self.sb.block_size as usize;
        assert!(bytes.len() <= bs, "block payload exceeds block size");
        let start = block as usize * bs;
        self.image[start..start + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn write_inode(&mut self, inode: &Inode) -> &mut Self {
        let per = self.sb.block_size as usize / INODE_RECORD_SIZE;
        let id = inode.id as usize;
        let block = self.sb.inode_table_start as usize + id / per;
        let offset =
            block * self.sb.block_size as usize + (id % per) * INODE_RECORD_SIZE;
        self.image[offset..offset + INODE_RECORD_SIZE].copy_from_slice(&inode.encode());
        self
    }

    pub fn dir_inode(&mut self, id: u32, first_block: u32) -> &mut Self {
        let mut direct = [0_u32; DIRECT_BLOCKS];
        direct[0] = first_block;
        self.write_inode(&Inode {
            id,
            is_directory: true,
            size: 0,
            direct,
        })
    }

    pub fn file_inode(&mut self, id: u32, size: u32, blocks: &[u32]) -> &mut Self {
        let mut direct = [0_u32; DIRECT_BLOCKS];
        direct[..blocks.len()].copy_from_slice(blocks);
        self.write_inode(&Inode {
            id,
            is_directory: false,
            size,
            direct,
        })
    }

    pub fn write_dir_block(&mut self, block: u32, entries: &[(u32, &str)]) -> &mut Self {
        let bs = self.sb.block_size as usize;
        assert!(
            entries.len() * DIRENTRY_SIZE <= bs,
            "directory entries exceed one block"
        );
        let mut payload = vec![0_u8; bs];
        for (i, (inode_id, name)) in entries.iter().enumerate() {
            let raw = DirEntry {
                inode_id: *inode_id,
                name: (*name).to_owned(),
            }
            .encode()
            .expect("encode dir entry");
            payload[i * DIRENTRY_SIZE..(i + 1) * DIRENTRY_SIZE].copy_from_slice(&raw);
        }
        self.write_block(block, &payload)
    }

    /// Set one bit in the free bitmap (bit index = data block ordinal).
    pub fn set_bitmap_bit(&mut self, bit: u32) -> &mut Self {
        let bs = self.sb.block_size as usize;
        let base = self.sb.free_bitmap_start as usize * bs;
        self.image[base + bit as usize / 8] |= 1 << (bit % 8);
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.image
    }

    pub fn open(self) -> OpenFs {
        OpenFs::from_device(Box::new(MemoryByteDevice::new(self.image)))
            .expect("open built image")
    }
}

/// The canonical image: root directory with one file `/hello.txt`
/// (inode 2, content `hello` in data block 3), root's entries in
/// data block 2.
pub fn hello_image() -> ImageBuilder {
    let mut builder = ImageBuilder::small();
    builder
        .dir_inode(0, 2)
        .write_dir_block(2, &[(2, "hello.txt")])
        .file_inode(2, 5, &[3])
        .write_block(3, b"hello");
    builder
}
