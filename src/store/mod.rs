#[cfg(test)]
mod store_tests;

use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Random-access byte store backing a container.
///
/// Reads and writes clamp at the store edge and report how many bytes were
/// actually moved; they never fail. The filesystem layer treats a short
/// count as corruption, because it only ever addresses bytes the header
/// says exist.
pub trait ByteStore {
    fn read_at(&self, off: u64, buf: &mut [u8]) -> usize;
    fn write_at(&mut self, off: u64, data: &[u8]) -> usize;
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Memory-mapped container file on the host filesystem.
pub struct Container {
    path: PathBuf,
    map: MmapMut,
    len: u64,
}

impl Container {
    /// Creates (or truncates) a container file pre-sized to `len` bytes and
    /// maps it. The fresh mapping reads as zeros.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created, sized, or mapped.
    pub fn create(path: &Path, len: u64) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(len)?;
        let map = Self::map_file(&file, len)?;
        Ok(Self {
            path: path.to_path_buf(),
            map,
            len,
        })
    }

    /// Opens and maps an existing container file at its current length.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or mapped.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        let map = Self::map_file(&file, len)?;
        Ok(Self {
            path: path.to_path_buf(),
            map,
            len,
        })
    }

    fn map_file(file: &std::fs::File, len: u64) -> anyhow::Result<MmapMut> {
        let map_len = usize::try_from(len)
            .map_err(|_| anyhow::anyhow!("container length {len} exceeds addressable size"))?;
        let map = unsafe { MmapOptions::new().len(map_len).map_mut(file)? };
        Ok(map)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes dirty pages to the backing file. Ordinary operation relies
    /// on the OS page cache; dropping the mapping also writes back.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn sync(&self) -> anyhow::Result<()> {
        self.map.flush()?;
        Ok(())
    }
}

impl ByteStore for Container {
    fn read_at(&self, off: u64, buf: &mut [u8]) -> usize {
        let Ok(off) = usize::try_from(off) else {
            return 0;
        };
        let Ok(store_len) = usize::try_from(self.len) else {
            return 0;
        };
        if off >= store_len {
            return 0;
        }
        let end = off.saturating_add(buf.len()).min(store_len);
        let src = &self.map[off..end];
        let n = src.len();
        buf[..n].copy_from_slice(src);
        n
    }

    fn write_at(&mut self, off: u64, data: &[u8]) -> usize {
        let Ok(off) = usize::try_from(off) else {
            return 0;
        };
        let Ok(store_len) = usize::try_from(self.len) else {
            return 0;
        };
        if off >= store_len {
            return 0;
        }
        let end = off.saturating_add(data.len()).min(store_len);
        let dst = &mut self.map[off..end];
        let n = dst.len();
        dst.copy_from_slice(&data[..n]);
        n
    }

    fn len(&self) -> u64 {
        self.len
    }
}

/// Vec-backed store, mostly for tests and scratch filesystems.
pub struct Memory {
    buf: Vec<u8>,
}

impl Memory {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            buf: vec![0u8; len],
        }
    }
}

impl ByteStore for Memory {
    fn read_at(&self, off: u64, buf: &mut [u8]) -> usize {
        let Ok(off) = usize::try_from(off) else {
            return 0;
        };
        if off >= self.buf.len() {
            return 0;
        }
        let end = off.saturating_add(buf.len()).min(self.buf.len());
        let src = &self.buf[off..end];
        let n = src.len();
        buf[..n].copy_from_slice(src);
        n
    }

    fn write_at(&mut self, off: u64, data: &[u8]) -> usize {
        let Ok(off) = usize::try_from(off) else {
            return 0;
        };
        if off >= self.buf.len() {
            return 0;
        }
        let end = off.saturating_add(data.len()).min(self.buf.len());
        let dst = &mut self.buf[off..end];
        let n = dst.len();
        dst.copy_from_slice(&data[..n]);
        n
    }

    fn len(&self) -> u64 {
        self.buf.len() as u64
    }
}
