//! Directory entries, stored as ordinary chain content.
//!
//! A directory's content is a u32 entry count followed by fixed-size
//! entry records. The count prefix is written lazily on the first insert;
//! until then the directory's content is empty and its count reads as 0.

use crate::format::DirEntry;
use crate::layout::{DESCRIPTOR_SIZE, DIR_ENTRY_SIZE, ENTRY_COUNT_SIZE};
use crate::store::ByteStore;

use super::{FsError, FsResult, Slim64Fs};

impl<S: ByteStore> Slim64Fs<S> {
    /// Number of entries in `dir`.
    ///
    /// Gated on `used_size`: a directory that never stored its count
    /// prefix reports 0 without touching content, so stale bytes left in
    /// a reused block are never mistaken for a count.
    pub fn entry_count(&self, dir: u32) -> FsResult<u32> {
        if !self.read_is_directory(dir)? {
            return Err(FsError::NotDir);
        }
        if self.read_used_size(dir)? <= DESCRIPTOR_SIZE as u64 {
            return Ok(0);
        }
        let buf = self.read_at(dir, 0, ENTRY_COUNT_SIZE as u64)?;
        let bytes: [u8; ENTRY_COUNT_SIZE] =
            buf.as_slice().try_into().map_err(|_| FsError::Corrupt)?;
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn read_entry(&self, dir: u32, index: u32) -> FsResult<DirEntry> {
        let count = self.entry_count(dir)?;
        if index >= count {
            return Err(FsError::InvalidInput);
        }
        let buf = self.read_at(dir, entry_offset(index), DIR_ENTRY_SIZE as u64)?;
        let bytes: &[u8; DIR_ENTRY_SIZE] =
            buf.as_slice().try_into().map_err(|_| FsError::Corrupt)?;
        Ok(DirEntry::from_bytes(bytes))
    }

    pub fn list_entries(&self, dir: u32) -> FsResult<Vec<DirEntry>> {
        let count = self.entry_count(dir)?;
        let mut entries = Vec::with_capacity(count as usize);
        for index in 0..count {
            entries.push(self.read_entry(dir, index)?);
        }
        Ok(entries)
    }

    /// Resolves `name` in `dir` to the child's first block.
    ///
    /// # Errors
    /// `NotFound` if no entry carries that name.
    pub fn find_child(&self, dir: u32, name: &str) -> FsResult<u32> {
        let (_, entry) = self.find_entry(dir, name)?;
        Ok(entry.base_block)
    }

    pub(crate) fn find_entry(&self, dir: u32, name: &str) -> FsResult<(u32, DirEntry)> {
        let count = self.entry_count(dir)?;
        for index in 0..count {
            let entry = self.read_entry(dir, index)?;
            if entry.name == name {
                return Ok((index, entry));
            }
        }
        Err(FsError::NotFound)
    }

    pub(crate) fn entry_by_block(&self, dir: u32, base_block: u32) -> FsResult<(u32, DirEntry)> {
        let count = self.entry_count(dir)?;
        for index in 0..count {
            let entry = self.read_entry(dir, index)?;
            if entry.base_block == base_block {
                return Ok((index, entry));
            }
        }
        Err(FsError::NotFound)
    }

    /// Appends `entry` to `dir`, establishing the count prefix on the
    /// directory's first insert.
    pub(crate) fn add_entry(&mut self, dir: u32, entry: &DirEntry) -> FsResult<()> {
        if !self.read_is_directory(dir)? {
            return Err(FsError::NotDir);
        }
        let count = self.entry_count(dir)?;
        if self.read_used_size(dir)? <= DESCRIPTOR_SIZE as u64 {
            self.write_at(dir, 0, &0u32.to_le_bytes())?;
        }
        self.append(dir, &entry.to_bytes())?;
        self.write_entry_count(dir, count + 1)
    }

    /// Drops the entry whose child chain starts at `base_block`, shifting
    /// later entries left one slot. The count prefix stays in place even
    /// when the directory empties.
    pub(crate) fn remove_entry(&mut self, dir: u32, base_block: u32) -> FsResult<()> {
        let (slot, _) = self.entry_by_block(dir, base_block)?;
        let count = self.entry_count(dir)?;
        for index in slot + 1..count {
            let entry = self.read_entry(dir, index)?;
            self.write_entry(dir, index - 1, &entry)?;
        }
        self.write_entry_count(dir, count - 1)?;
        let used_size = self.read_used_size(dir)?;
        self.write_used_size(dir, used_size - DIR_ENTRY_SIZE as u64)
    }

    /// Overwrites the entry at `index` in place.
    pub(crate) fn replace_entry(&mut self, dir: u32, index: u32, entry: &DirEntry) -> FsResult<()> {
        let count = self.entry_count(dir)?;
        if index >= count {
            return Err(FsError::InvalidInput);
        }
        self.write_entry(dir, index, entry)
    }

    fn write_entry(&mut self, dir: u32, index: u32, entry: &DirEntry) -> FsResult<()> {
        self.write_at(dir, entry_offset(index), &entry.to_bytes())?;
        Ok(())
    }

    fn write_entry_count(&mut self, dir: u32, count: u32) -> FsResult<()> {
        self.write_at(dir, 0, &count.to_le_bytes())?;
        Ok(())
    }
}

fn entry_offset(index: u32) -> u64 {
    ENTRY_COUNT_SIZE as u64 + u64::from(index) * DIR_ENTRY_SIZE as u64
}
