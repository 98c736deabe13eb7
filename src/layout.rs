//! On-disk geometry for the container format.
//!
//! The container is `[header][block 0][block 1]...[block N-1]`. Every block
//! starts with a fixed metadata prefix; the rest is payload. All multi-byte
//! integers on disk are little-endian.

/// BLOCK_SIZE is the size of one block, metadata prefix included.
pub const BLOCK_SIZE: u64 = 512;
/// BLOCK_META_SIZE is the byte size of the per-block metadata prefix.
pub const BLOCK_META_SIZE: usize = 16;
/// BLOCK_PAYLOAD is the usable payload size of one block.
pub const BLOCK_PAYLOAD: u64 = BLOCK_SIZE - BLOCK_META_SIZE as u64;
/// HEADER_SIZE is the byte size of the container header at offset 0.
pub const HEADER_SIZE: usize = 56;
/// DESCRIPTOR_SIZE is the byte size of the descriptor record at the start
/// of every chain's first payload.
pub const DESCRIPTOR_SIZE: usize = 164;
/// DIR_ENTRY_SIZE is the byte size of one directory entry record.
pub const DIR_ENTRY_SIZE: usize = 132;
/// ENTRY_COUNT_SIZE is the byte size of the entry-count prefix stored at
/// the start of a directory's content.
pub const ENTRY_COUNT_SIZE: usize = 4;
/// NAME_LEN is the maximum name length stored in a descriptor.
pub const NAME_LEN: usize = 124;
/// ENTRY_NAME_LEN is the name field width of a directory entry.
pub const ENTRY_NAME_LEN: usize = 128;
/// EXT_LEN is the extension field width of a descriptor.
pub const EXT_LEN: usize = 4;
/// MAX_PATH_DEPTH is the deepest path `build_path` will render.
pub const MAX_PATH_DEPTH: usize = 16;
/// NO_BLOCK marks "no block here": a chain head's prev, the last block's
/// next, the end of the free list, and the root's parent. Block 0 holds
/// the root directory, so it never appears inside a stored link except
/// as the prev of the root's own second block.
pub const NO_BLOCK: u32 = 0;
/// MAGIC identifies the container format on disk.
pub const MAGIC: [u8; 8] = *b"SLIM64\0\0";
/// VERSION is the on-disk format version.
pub const VERSION: u32 = 1;

/// Absolute container offset of a block's metadata prefix.
#[must_use]
pub fn block_meta_offset(block: u32) -> u64 {
    HEADER_SIZE as u64 + u64::from(block) * BLOCK_SIZE
}

/// Absolute container offset of a byte inside a block's payload.
#[must_use]
pub fn payload_offset(block: u32, offset: u64) -> u64 {
    block_meta_offset(block) + BLOCK_META_SIZE as u64 + offset
}

/// Number of blocks needed to hold `bytes` payload bytes.
#[must_use]
pub fn payload_blocks(bytes: u64) -> u64 {
    bytes.div_ceil(BLOCK_PAYLOAD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_and_payload_fill_a_block() {
        assert_eq!(BLOCK_META_SIZE as u64 + BLOCK_PAYLOAD, BLOCK_SIZE);
    }

    #[test]
    fn descriptor_fits_one_payload() {
        assert!(DESCRIPTOR_SIZE as u64 <= BLOCK_PAYLOAD);
    }

    #[test]
    fn entry_is_name_plus_block_index() {
        assert_eq!(DIR_ENTRY_SIZE, ENTRY_NAME_LEN + 4);
    }

    #[test]
    fn offsets_step_by_block_size() {
        assert_eq!(block_meta_offset(0), HEADER_SIZE as u64);
        assert_eq!(block_meta_offset(1), HEADER_SIZE as u64 + BLOCK_SIZE);
        assert_eq!(
            payload_offset(0, 0),
            HEADER_SIZE as u64 + BLOCK_META_SIZE as u64
        );
        assert_eq!(payload_offset(2, 7), block_meta_offset(2) + 16 + 7);
    }

    #[test]
    fn payload_blocks_rounds_up() {
        assert_eq!(payload_blocks(0), 0);
        assert_eq!(payload_blocks(1), 1);
        assert_eq!(payload_blocks(BLOCK_PAYLOAD), 1);
        assert_eq!(payload_blocks(BLOCK_PAYLOAD + 1), 2);
    }
}
