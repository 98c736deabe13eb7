//! Content reads and writes against a chain.
//!
//! Offsets here are content-relative: 0 is the first byte after the
//! descriptor. `used_size` stays descriptor-inclusive on disk, so the
//! engine shifts by `DESCRIPTOR_SIZE` before any block math.

use crate::layout::{BLOCK_PAYLOAD, DESCRIPTOR_SIZE, NO_BLOCK, payload_blocks, payload_offset};
use crate::store::ByteStore;

use super::{FsError, FsResult, Slim64Fs};

impl<S: ByteStore> Slim64Fs<S> {
    /// Writes `data` at content offset `offset`, growing the chain when
    /// the write runs past its block capacity.
    ///
    /// # Errors
    /// `OffsetBeyondEnd` if `offset` lies past the current logical end;
    /// writes may extend content but never leave a hole behind it.
    pub fn write_at(&mut self, chain: u32, offset: u64, data: &[u8]) -> FsResult<usize> {
        let used_size = self.read_used_size(chain)?;
        let physical = offset.saturating_add(DESCRIPTOR_SIZE as u64);
        if physical > used_size {
            return Err(FsError::OffsetBeyondEnd);
        }
        if data.is_empty() {
            return Ok(0);
        }

        let mut nblocks = self.read_nblocks(chain)?;
        let end = physical.saturating_add(data.len() as u64);
        let capacity = nblocks.saturating_mul(BLOCK_PAYLOAD);
        if end > capacity {
            nblocks += self.grow_chain(chain, nblocks, end - capacity)?;
            self.write_nblocks(chain, nblocks)?;
        }

        let mut cursor = self.chain_seek(chain, physical / BLOCK_PAYLOAD)?;
        let mut in_block = (physical % BLOCK_PAYLOAD) as usize;
        let mut written = 0usize;
        while written < data.len() {
            let take = (BLOCK_PAYLOAD as usize - in_block).min(data.len() - written);
            let off = payload_offset(cursor, in_block as u64);
            if self.store.write_at(off, &data[written..written + take]) != take {
                return Err(FsError::Corrupt);
            }
            written += take;
            in_block = 0;
            if written < data.len() {
                cursor = self.chain_next(cursor)?;
                if cursor == NO_BLOCK {
                    return Err(FsError::Corrupt);
                }
            }
        }

        if end > used_size {
            self.write_used_size(chain, end)?;
        }
        Ok(written)
    }

    /// Reads up to `len` content bytes starting at `offset`. Reads past
    /// the logical end clamp: the result is shorter than asked, empty when
    /// `offset` is at or beyond the end.
    pub fn read_at(&self, chain: u32, offset: u64, len: u64) -> FsResult<Vec<u8>> {
        let used_size = self.read_used_size(chain)?;
        let Some(content_len) = used_size.checked_sub(DESCRIPTOR_SIZE as u64) else {
            return Err(FsError::Corrupt);
        };
        if offset >= content_len {
            return Ok(Vec::new());
        }
        let to_read = len.min(content_len - offset);
        let physical = offset + DESCRIPTOR_SIZE as u64;
        let start_index = physical / BLOCK_PAYLOAD;
        let mut in_block = (physical % BLOCK_PAYLOAD) as usize;
        let mut out = vec![0u8; to_read as usize];
        let mut read = 0usize;
        for (index, block) in self.chain(chain).enumerate() {
            let block = block?;
            if (index as u64) < start_index {
                continue;
            }
            let take = (BLOCK_PAYLOAD as usize - in_block).min(out.len() - read);
            let off = payload_offset(block, in_block as u64);
            if self.store.read_at(off, &mut out[read..read + take]) != take {
                return Err(FsError::Corrupt);
            }
            read += take;
            in_block = 0;
            if read == out.len() {
                break;
            }
        }
        if read != out.len() {
            return Err(FsError::Corrupt);
        }
        Ok(out)
    }

    /// Writes `data` at the current logical end.
    pub fn append(&mut self, chain: u32, data: &[u8]) -> FsResult<usize> {
        let used_size = self.read_used_size(chain)?;
        let Some(end) = used_size.checked_sub(DESCRIPTOR_SIZE as u64) else {
            return Err(FsError::Corrupt);
        };
        self.write_at(chain, end, data)
    }

    /// Reserves blocks for `excess` more payload bytes and links the run
    /// onto the chain's tail.
    fn grow_chain(&mut self, chain: u32, nblocks: u64, excess: u64) -> FsResult<u64> {
        let Some(last) = nblocks.checked_sub(1) else {
            return Err(FsError::Corrupt);
        };
        let needed = payload_blocks(excess);
        let run = self.reserve_blocks(needed)?;
        let tail = self.chain_seek(chain, last)?;

        let mut tail_meta = self.read_block_meta(tail)?;
        tail_meta.next = run;
        self.write_block_meta(tail, &tail_meta)?;
        let mut run_meta = self.read_block_meta(run)?;
        run_meta.prev = tail;
        self.write_block_meta(run, &run_meta)?;
        Ok(needed)
    }
}
