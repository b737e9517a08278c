#![forbid(unsafe_code)]
//! Error types for the osp image inspector.
//!
//! `FsError` is the single user-facing error type returned by
//! `ospfs-core` and consumed by the CLI. The parse-layer `ParseError`
//! (in `ospfs-types`) converts into `FsError` at the `ospfs-core`
//! boundary; this crate deliberately depends on no other ospfs crate
//! so the dependency graph stays acyclic.
//!
//! Every failure aborts the current operation: there are no retries
//! and no partial results anywhere in the core.

use thiserror::Error;

/// Unified error type for all inspector operations.
#[derive(Debug, Error)]
pub enum FsError {
    /// Operating system I/O error (wraps `std::io::Error`).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The superblock magic does not identify an osp image.
    #[error("bad magic: expected {expected:#010x}, got {actual:#010x}")]
    BadMagic { expected: u32, actual: u32 },

    /// `block_size` or `total_blocks` is zero.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The block size cannot hold even one inode record.
    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    /// A block or inode identifier is outside its valid domain.
    #[error("{what} {value} out of range (limit {limit})")]
    OutOfRange {
        what: &'static str,
        value: u32,
        limit: u32,
    },

    /// Inode-table addressing implies a block beyond the declared table
    /// size; the superblock's inode count and table size disagree.
    #[error("inode table block {block_index} exceeds declared table size {table_blocks}")]
    GeometryMismatch { block_index: u32, table_blocks: u32 },

    /// Fewer bytes available than a fixed-size record or block requires
    /// (truncated or corrupt image).
    #[error("short read: need {needed} bytes at offset {offset}, image has {actual}")]
    ShortRead { needed: u64, offset: u64, actual: u64 },

    /// A path component resolved to a file where a directory was expected.
    #[error("inode {0} is not a directory")]
    NotADirectory(u32),

    /// A file operation was attempted on a directory.
    #[error("inode {0} is a directory")]
    IsADirectory(u32),

    /// A directory's first direct block is unallocated.
    #[error("directory inode {0} has no data block")]
    EmptyDirectory(u32),

    /// No directory entry matches the next path component.
    #[error("path component not found: {0}")]
    PathNotFound(String),

    /// The declared file size exceeds what the allocated direct blocks
    /// can supply.
    #[error("file truncated: declared {declared} bytes, direct blocks cover {recovered}")]
    TruncatedFile { declared: u32, recovered: u32 },

    /// Parse-layer error with no more specific mapping.
    #[error("parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, FsError>;
