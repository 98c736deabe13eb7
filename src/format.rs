//! On-disk records: container header, per-block metadata, chain
//! descriptors, and directory entries. Everything serializes by hand at
//! fixed little-endian offsets; there is no padding and no versioned
//! framing beyond the header magic.

use crate::layout::{
    BLOCK_META_SIZE, DESCRIPTOR_SIZE, DIR_ENTRY_SIZE, ENTRY_NAME_LEN, EXT_LEN, HEADER_SIZE, MAGIC,
    NAME_LEN, VERSION,
};

/// Byte offset of each descriptor field inside a chain's first payload.
pub const DESC_USED_SIZE: usize = 0;
pub const DESC_NBLOCKS: usize = 8;
pub const DESC_NAME: usize = 16;
pub const DESC_EXT: usize = 140;
pub const DESC_IS_DIRECTORY: usize = 144;
pub const DESC_PARENT: usize = 148;
pub const DESC_SELF: usize = 152;
pub const DESC_CONTENT: usize = 156;

/// Container header, stored at offset 0.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub version: u32,
    pub block_size: u32,
    /// Byte size of the block region (excludes the header itself).
    pub total_size: u64,
    /// Header bytes plus every reserved block, in bytes.
    pub used_size: u64,
    pub total_blocks: u64,
    pub nfree_blocks: u64,
    pub next_free_block: u32,
    pub root_block: u32,
}

impl Header {
    #[must_use]
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE || buf[..8] != MAGIC {
            return None;
        }
        let version = u32::from_le_bytes(buf[8..12].try_into().ok()?);
        if version != VERSION {
            return None;
        }
        Some(Self {
            version,
            block_size: u32::from_le_bytes(buf[12..16].try_into().ok()?),
            total_size: u64::from_le_bytes(buf[16..24].try_into().ok()?),
            used_size: u64::from_le_bytes(buf[24..32].try_into().ok()?),
            total_blocks: u64::from_le_bytes(buf[32..40].try_into().ok()?),
            nfree_blocks: u64::from_le_bytes(buf[40..48].try_into().ok()?),
            next_free_block: u32::from_le_bytes(buf[48..52].try_into().ok()?),
            root_block: u32::from_le_bytes(buf[52..56].try_into().ok()?),
        })
    }

    pub fn write_bytes(&self, buf: &mut [u8]) {
        buf[..8].copy_from_slice(&MAGIC);
        buf[8..12].copy_from_slice(&self.version.to_le_bytes());
        buf[12..16].copy_from_slice(&self.block_size.to_le_bytes());
        buf[16..24].copy_from_slice(&self.total_size.to_le_bytes());
        buf[24..32].copy_from_slice(&self.used_size.to_le_bytes());
        buf[32..40].copy_from_slice(&self.total_blocks.to_le_bytes());
        buf[40..48].copy_from_slice(&self.nfree_blocks.to_le_bytes());
        buf[48..52].copy_from_slice(&self.next_free_block.to_le_bytes());
        buf[52..56].copy_from_slice(&self.root_block.to_le_bytes());
    }
}

/// Per-block metadata prefix.
///
/// `prev == NO_BLOCK` marks the first block of a chain; `next == NO_BLOCK`
/// marks the last block of an in-use chain or the end of the free list.
/// `used_before` stays set once a block has been reserved for the first
/// time: a free block without it has never been linked anywhere and its
/// free-list successor is implicitly `index + 1`, which is what lets a
/// freshly formatted container stay zero-filled instead of pre-linking
/// every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMeta {
    pub in_use: bool,
    pub used_before: bool,
    pub prev: u32,
    pub next: u32,
}

impl BlockMeta {
    #[must_use]
    pub fn to_bytes(&self) -> [u8; BLOCK_META_SIZE] {
        let mut buf = [0u8; BLOCK_META_SIZE];
        buf[0..4].copy_from_slice(&u32::from(self.in_use).to_le_bytes());
        buf[4..8].copy_from_slice(&u32::from(self.used_before).to_le_bytes());
        buf[8..12].copy_from_slice(&self.prev.to_le_bytes());
        buf[12..16].copy_from_slice(&self.next.to_le_bytes());
        buf
    }

    #[must_use]
    pub fn from_bytes(buf: &[u8; BLOCK_META_SIZE]) -> Self {
        Self {
            in_use: u32::from_le_bytes(buf[0..4].try_into().unwrap()) != 0,
            used_before: u32::from_le_bytes(buf[4..8].try_into().unwrap()) != 0,
            prev: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            next: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
        }
    }
}

/// Chain descriptor, stored at the start of the first block's payload.
///
/// `used_size` counts the descriptor itself, so a fresh chain starts at
/// `DESCRIPTOR_SIZE`, never 0. `name` holds the full entry name; `ext` is
/// derived from it and kept separately for quick attribute reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub used_size: u64,
    pub nblocks: u64,
    pub name: String,
    pub ext: String,
    pub is_directory: bool,
    pub parent: u32,
    pub self_block: u32,
    /// Absolute container offset of the first content byte, cached at
    /// creation time.
    pub content: u64,
}

impl Descriptor {
    #[must_use]
    pub fn to_bytes(&self) -> [u8; DESCRIPTOR_SIZE] {
        let mut buf = [0u8; DESCRIPTOR_SIZE];
        buf[DESC_USED_SIZE..DESC_USED_SIZE + 8].copy_from_slice(&self.used_size.to_le_bytes());
        buf[DESC_NBLOCKS..DESC_NBLOCKS + 8].copy_from_slice(&self.nblocks.to_le_bytes());
        encode_name(&mut buf[DESC_NAME..DESC_NAME + NAME_LEN], &self.name);
        encode_name(&mut buf[DESC_EXT..DESC_EXT + EXT_LEN], &self.ext);
        buf[DESC_IS_DIRECTORY..DESC_IS_DIRECTORY + 4]
            .copy_from_slice(&u32::from(self.is_directory).to_le_bytes());
        buf[DESC_PARENT..DESC_PARENT + 4].copy_from_slice(&self.parent.to_le_bytes());
        buf[DESC_SELF..DESC_SELF + 4].copy_from_slice(&self.self_block.to_le_bytes());
        buf[DESC_CONTENT..DESC_CONTENT + 8].copy_from_slice(&self.content.to_le_bytes());
        buf
    }

    #[must_use]
    pub fn from_bytes(buf: &[u8; DESCRIPTOR_SIZE]) -> Self {
        Self {
            used_size: u64::from_le_bytes(buf[DESC_USED_SIZE..DESC_USED_SIZE + 8].try_into().unwrap()),
            nblocks: u64::from_le_bytes(buf[DESC_NBLOCKS..DESC_NBLOCKS + 8].try_into().unwrap()),
            name: decode_name(&buf[DESC_NAME..DESC_NAME + NAME_LEN]),
            ext: decode_name(&buf[DESC_EXT..DESC_EXT + EXT_LEN]),
            is_directory: u32::from_le_bytes(
                buf[DESC_IS_DIRECTORY..DESC_IS_DIRECTORY + 4].try_into().unwrap(),
            ) != 0,
            parent: u32::from_le_bytes(buf[DESC_PARENT..DESC_PARENT + 4].try_into().unwrap()),
            self_block: u32::from_le_bytes(buf[DESC_SELF..DESC_SELF + 4].try_into().unwrap()),
            content: u64::from_le_bytes(buf[DESC_CONTENT..DESC_CONTENT + 8].try_into().unwrap()),
        }
    }
}

/// One directory entry: a name and the first block of the child's chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub base_block: u32,
}

impl DirEntry {
    #[must_use]
    pub fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut buf = [0u8; DIR_ENTRY_SIZE];
        encode_name(&mut buf[..ENTRY_NAME_LEN], &self.name);
        buf[ENTRY_NAME_LEN..].copy_from_slice(&self.base_block.to_le_bytes());
        buf
    }

    #[must_use]
    pub fn from_bytes(buf: &[u8; DIR_ENTRY_SIZE]) -> Self {
        Self {
            name: decode_name(&buf[..ENTRY_NAME_LEN]),
            base_block: u32::from_le_bytes(buf[ENTRY_NAME_LEN..].try_into().unwrap()),
        }
    }
}

/// Copies `name` into `buf` null-padded, truncating at the field width.
pub(crate) fn encode_name(buf: &mut [u8], name: &str) {
    let bytes = name.as_bytes();
    let max = bytes.len().min(buf.len());
    buf[..max].copy_from_slice(&bytes[..max]);
}

/// Decodes a null-padded name field.
#[must_use]
pub(crate) fn decode_name(buf: &[u8]) -> String {
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip_preserves_fields() {
        let header = Header {
            version: VERSION,
            block_size: 512,
            total_size: 512 * 64,
            used_size: 56 + 512,
            total_blocks: 64,
            nfree_blocks: 63,
            next_free_block: 1,
            root_block: 0,
        };
        let mut buf = [0u8; HEADER_SIZE];
        header.write_bytes(&mut buf);
        let decoded = Header::from_bytes(&buf).expect("valid header");
        assert_eq!(decoded.block_size, 512);
        assert_eq!(decoded.total_size, 512 * 64);
        assert_eq!(decoded.used_size, 56 + 512);
        assert_eq!(decoded.total_blocks, 64);
        assert_eq!(decoded.nfree_blocks, 63);
        assert_eq!(decoded.next_free_block, 1);
        assert_eq!(decoded.root_block, 0);
    }

    #[test]
    fn header_rejects_foreign_magic() {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..8].copy_from_slice(b"EXT4IMG\0");
        assert!(Header::from_bytes(&buf).is_none());
    }

    #[test]
    fn header_rejects_unknown_version() {
        let header = Header {
            version: VERSION,
            block_size: 512,
            total_size: 512,
            used_size: 56,
            total_blocks: 1,
            nfree_blocks: 1,
            next_free_block: 0,
            root_block: 0,
        };
        let mut buf = [0u8; HEADER_SIZE];
        header.write_bytes(&mut buf);
        buf[8..12].copy_from_slice(&(VERSION + 1).to_le_bytes());
        assert!(Header::from_bytes(&buf).is_none());
    }

    #[test]
    fn header_rejects_short_buffer() {
        assert!(Header::from_bytes(&[0u8; 20]).is_none());
    }

    #[test]
    fn block_meta_round_trip() {
        let meta = BlockMeta {
            in_use: true,
            used_before: true,
            prev: 7,
            next: 12,
        };
        assert_eq!(BlockMeta::from_bytes(&meta.to_bytes()), meta);
    }

    #[test]
    fn zeroed_block_meta_reads_as_never_used() {
        let meta = BlockMeta::from_bytes(&[0u8; BLOCK_META_SIZE]);
        assert!(!meta.in_use);
        assert!(!meta.used_before);
        assert_eq!(meta.prev, 0);
        assert_eq!(meta.next, 0);
    }

    #[test]
    fn descriptor_round_trip_preserves_fields() {
        let desc = Descriptor {
            used_size: 300,
            nblocks: 2,
            name: "report.txt".to_string(),
            ext: "txt".to_string(),
            is_directory: false,
            parent: 0,
            self_block: 5,
            content: 1234,
        };
        let decoded = Descriptor::from_bytes(&desc.to_bytes());
        assert_eq!(decoded.used_size, 300);
        assert_eq!(decoded.nblocks, 2);
        assert_eq!(decoded.name, "report.txt");
        assert_eq!(decoded.ext, "txt");
        assert!(!decoded.is_directory);
        assert_eq!(decoded.parent, 0);
        assert_eq!(decoded.self_block, 5);
        assert_eq!(decoded.content, 1234);
    }

    #[test]
    fn descriptor_truncates_long_names() {
        let desc = Descriptor {
            used_size: 164,
            nblocks: 1,
            name: "d".repeat(NAME_LEN + 30),
            ext: String::new(),
            is_directory: true,
            parent: 0,
            self_block: 1,
            content: 0,
        };
        let decoded = Descriptor::from_bytes(&desc.to_bytes());
        assert_eq!(decoded.name.len(), NAME_LEN);
    }

    #[test]
    fn dir_entry_round_trip() {
        let entry = DirEntry {
            name: "notes".to_string(),
            base_block: 9,
        };
        assert_eq!(DirEntry::from_bytes(&entry.to_bytes()), entry);
    }

    #[test]
    fn name_without_padding_decodes_full_width() {
        let mut buf = [0u8; EXT_LEN];
        encode_name(&mut buf, "json");
        assert_eq!(decode_name(&buf), "json");
    }
}
