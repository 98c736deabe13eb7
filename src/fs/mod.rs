mod alloc;
mod core;
mod dir;
mod io;
mod ops;

use crate::format::Header;
use crate::store::ByteStore;

pub use alloc::ChainIter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Dir,
}

/// Combined attribute view of one file or directory.
#[derive(Debug, Clone)]
pub struct FsAttr {
    pub kind: NodeKind,
    pub name: String,
    pub ext: String,
    /// Content bytes, descriptor excluded.
    pub size: u64,
    pub nblocks: u64,
    pub parent: u32,
}

#[derive(Debug, PartialEq, Eq)]
pub enum FsError {
    AlreadyExists,
    Corrupt,
    InvalidInput,
    InvalidName,
    NoSpace,
    NotDir,
    NotFound,
    OffsetBeyondEnd,
    PathTooDeep,
}

pub type FsResult<T> = Result<T, FsError>;

/// On-disk format
///
/// The container is `[header][block 0][block 1]...[block N-1]` with
/// 512-byte blocks.
///
/// Header (offset 0):
/// - magic: b"SLIM64\0\0"
/// - version: u32
/// - block_size: u32
/// - total_size: u64 (block region bytes)
/// - used_size: u64 (header + reserved blocks)
/// - total_blocks: u64
/// - nfree_blocks: u64
/// - next_free_block: u32
/// - root_block: u32
///
/// Each block: `[u32 in_use][u32 used_before][u32 prev][u32 next]` then
/// 496 payload bytes. Files and directories are chains of blocks; the
/// first payload starts with a 164-byte descriptor, content follows.
/// Directory content is a u32 entry count then fixed-size entries.
///
/// Free blocks form a list headed by `next_free_block`. Block 0 always
/// holds the root directory, freeing index 0 to mean "none" in every
/// block-index field.
pub struct Slim64Fs<S: ByteStore> {
    pub(crate) store: S,
    pub(crate) header: Header,
}
