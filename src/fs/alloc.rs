//! Block reservation and release.
//!
//! Free blocks form a list headed by `header.next_free_block`. A block
//! that has never been reserved carries no stored successor: the walk
//! treats `index + 1` as its next free block, so a freshly formatted
//! container needs no pre-linking pass. Once reserved (and later freed),
//! the stored `next` takes over. Freed blocks are pushed onto the list
//! head, so reuse is most-recently-freed first.

use crate::layout::{BLOCK_SIZE, NO_BLOCK};
use crate::store::ByteStore;

use super::{FsError, FsResult, Slim64Fs};

impl<S: ByteStore> Slim64Fs<S> {
    /// Takes `count` blocks off the free list and links them into one
    /// chain. Returns the first block of the run.
    ///
    /// # Errors
    /// `InvalidInput` for a zero count, `NoSpace` when the container
    /// cannot hold `count` more blocks, `Corrupt` if the free list walks
    /// out of range or onto a block already in use.
    pub(crate) fn reserve_blocks(&mut self, count: u64) -> FsResult<u32> {
        if count == 0 {
            return Err(FsError::InvalidInput);
        }
        let bytes = count.saturating_mul(BLOCK_SIZE);
        if self.header.used_size.saturating_add(bytes) >= self.header.total_size {
            return Err(FsError::NoSpace);
        }
        if count > self.header.nfree_blocks {
            return Err(FsError::NoSpace);
        }

        let first = self.header.next_free_block;
        let mut cursor = first;
        let mut prev = NO_BLOCK;
        for taken in 1..=count {
            if u64::from(cursor) >= self.header.total_blocks {
                return Err(FsError::Corrupt);
            }
            let mut meta = self.read_block_meta(cursor)?;
            if meta.in_use {
                return Err(FsError::Corrupt);
            }
            let successor = if meta.used_before { meta.next } else { cursor + 1 };
            meta.in_use = true;
            meta.used_before = true;
            meta.prev = prev;
            meta.next = if taken == count { NO_BLOCK } else { successor };
            self.write_block_meta(cursor, &meta)?;
            prev = cursor;
            cursor = successor;
        }

        self.header.next_free_block = cursor;
        self.header.used_size += bytes;
        self.header.nfree_blocks -= count;
        self.flush_header()?;
        Ok(first)
    }

    /// Releases every block of the chain headed by `first` back onto the
    /// free list. Returns how many blocks were freed.
    ///
    /// # Errors
    /// `Corrupt` if the chain touches a block that is already free or
    /// runs longer than the container has blocks.
    pub(crate) fn free_chain(&mut self, first: u32) -> FsResult<u64> {
        let mut cursor = first;
        let mut freed = 0u64;
        while cursor != NO_BLOCK {
            if freed >= self.header.total_blocks {
                return Err(FsError::Corrupt);
            }
            let mut meta = self.read_block_meta(cursor)?;
            if !meta.in_use {
                return Err(FsError::Corrupt);
            }
            let next = meta.next;
            meta.in_use = false;
            meta.prev = NO_BLOCK;
            meta.next = self.header.next_free_block;
            self.write_block_meta(cursor, &meta)?;
            self.header.next_free_block = cursor;
            freed += 1;
            cursor = next;
        }
        self.header.used_size = self
            .header
            .used_size
            .saturating_sub(freed.saturating_mul(BLOCK_SIZE));
        self.header.nfree_blocks += freed;
        self.flush_header()?;
        Ok(freed)
    }

    /// Lazily walks the chain headed by `first`, yielding block indices.
    pub fn chain(&self, first: u32) -> ChainIter<'_, S> {
        ChainIter {
            fs: self,
            cursor: Some(first),
            steps: 0,
        }
    }

    /// Successor of `block` in its chain, `NO_BLOCK` at the tail.
    pub(crate) fn chain_next(&self, block: u32) -> FsResult<u32> {
        Ok(self.read_block_meta(block)?.next)
    }

    /// Walks `skip` links from `first` and returns the block there.
    ///
    /// `NO_BLOCK` only terminates a chain inside a stored link; the head
    /// itself is never compared against it, since the root chain starts
    /// at block 0.
    pub(crate) fn chain_seek(&self, first: u32, skip: u64) -> FsResult<u32> {
        let mut cursor = first;
        for _ in 0..skip {
            let next = self.chain_next(cursor)?;
            if next == NO_BLOCK {
                return Err(FsError::Corrupt);
            }
            cursor = next;
        }
        Ok(cursor)
    }
}

/// Iterator over the block indices of one chain. The head is always
/// yielded, even when it is block 0. Stops with `Corrupt` instead of
/// looping forever if the chain is longer than the container, which
/// would mean a cycle in the links.
pub struct ChainIter<'a, S: ByteStore> {
    fs: &'a Slim64Fs<S>,
    cursor: Option<u32>,
    steps: u64,
}

impl<S: ByteStore> Iterator for ChainIter<'_, S> {
    type Item = FsResult<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.cursor?;
        if self.steps >= self.fs.header.total_blocks {
            self.cursor = None;
            return Some(Err(FsError::Corrupt));
        }
        self.steps += 1;
        match self.fs.read_block_meta(block) {
            Ok(meta) => {
                self.cursor = (meta.next != NO_BLOCK).then_some(meta.next);
                Some(Ok(block))
            }
            Err(err) => {
                self.cursor = None;
                Some(Err(err))
            }
        }
    }
}
