use std::path::Path;

use crate::format::{
    BlockMeta, DESC_CONTENT, DESC_EXT, DESC_IS_DIRECTORY, DESC_NAME, DESC_NBLOCKS, DESC_PARENT,
    DESC_USED_SIZE, Descriptor, Header, decode_name, encode_name,
};
use crate::layout::{
    BLOCK_META_SIZE, BLOCK_SIZE, DESCRIPTOR_SIZE, EXT_LEN, HEADER_SIZE, NAME_LEN, NO_BLOCK,
    VERSION, block_meta_offset, payload_offset,
};
use crate::store::{ByteStore, Container};

use super::{FsAttr, FsError, FsResult, NodeKind, Slim64Fs};

const ROOT_NAME: &str = "root";

impl Slim64Fs<Container> {
    /// Creates a container file at `path` sized for roughly `size_hint`
    /// bytes of blocks (rounded up to a whole number of blocks) and
    /// formats it.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or is too small to
    /// hold the root directory.
    pub fn create(path: &Path, size_hint: u64) -> anyhow::Result<Self> {
        let total_size = (size_hint / BLOCK_SIZE + 1) * BLOCK_SIZE;
        let store = Container::create(path, HEADER_SIZE as u64 + total_size)?;
        Self::format(store)
    }

    /// Opens an existing container file and mounts it.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or does not hold a
    /// valid container.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Self::mount(Container::open(path)?)
    }
}

impl<S: ByteStore> Slim64Fs<S> {
    /// Formats `store` as an empty filesystem: writes the header and the
    /// root directory, nothing else. Untouched blocks stay zero-filled,
    /// which the allocator reads as "free, never used".
    ///
    /// # Errors
    /// Returns an error if the store is too small for a header, the root
    /// directory, and at least one spare block.
    pub fn format(store: S) -> anyhow::Result<Self> {
        let Some(region) = store.len().checked_sub(HEADER_SIZE as u64) else {
            anyhow::bail!("store too small for a container header");
        };
        let total_blocks = region / BLOCK_SIZE;
        if total_blocks < 2 {
            anyhow::bail!("store too small for a root directory");
        }
        if total_blocks > u64::from(u32::MAX) {
            anyhow::bail!("store too large for 32-bit block indexing");
        }

        let header = Header {
            version: VERSION,
            block_size: u32::try_from(BLOCK_SIZE).unwrap_or(u32::MAX),
            total_size: total_blocks * BLOCK_SIZE,
            used_size: HEADER_SIZE as u64,
            total_blocks,
            nfree_blocks: total_blocks,
            next_free_block: 0,
            root_block: NO_BLOCK,
        };
        let mut fs = Self { store, header };

        let root = fs
            .reserve_blocks(1)
            .map_err(|err| anyhow::anyhow!("failed to reserve the root block: {:?}", err))?;
        fs.header.root_block = root;
        let descriptor = Descriptor {
            used_size: DESCRIPTOR_SIZE as u64,
            nblocks: 1,
            name: ROOT_NAME.to_string(),
            ext: String::new(),
            is_directory: true,
            parent: NO_BLOCK,
            self_block: root,
            content: payload_offset(root, DESCRIPTOR_SIZE as u64),
        };
        fs.write_descriptor(root, &descriptor)
            .map_err(|err| anyhow::anyhow!("failed to write the root directory: {:?}", err))?;
        fs.flush_header()
            .map_err(|err| anyhow::anyhow!("failed to write the header: {:?}", err))?;
        Ok(fs)
    }

    /// Mounts an already formatted store.
    ///
    /// # Errors
    /// Returns an error if the header is missing, carries a foreign magic
    /// or version, or disagrees with the store's geometry.
    pub fn mount(store: S) -> anyhow::Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        if store.read_at(0, &mut buf) != HEADER_SIZE {
            anyhow::bail!("store too small for a container header");
        }
        let Some(header) = Header::from_bytes(&buf) else {
            anyhow::bail!("not a slim64 container (bad magic or version)");
        };
        let fs = Self { store, header };
        fs.validate_geometry()
            .map_err(|err| anyhow::anyhow!("container validation failed: {:?}", err))?;
        Ok(fs)
    }

    fn validate_geometry(&self) -> FsResult<()> {
        if u64::from(self.header.block_size) != BLOCK_SIZE {
            return Err(FsError::Corrupt);
        }
        if self.header.total_size != self.header.total_blocks * BLOCK_SIZE {
            return Err(FsError::Corrupt);
        }
        if HEADER_SIZE as u64 + self.header.total_size > self.store.len() {
            return Err(FsError::Corrupt);
        }
        if self.header.nfree_blocks > self.header.total_blocks
            || u64::from(self.header.next_free_block) > self.header.total_blocks
        {
            return Err(FsError::Corrupt);
        }
        if u64::from(self.header.root_block) >= self.header.total_blocks {
            return Err(FsError::Corrupt);
        }
        Ok(())
    }

    /// First block of the root directory's chain.
    #[must_use]
    pub const fn root(&self) -> u32 {
        self.header.root_block
    }

    #[must_use]
    pub const fn total_blocks(&self) -> u64 {
        self.header.total_blocks
    }

    #[must_use]
    pub const fn free_blocks(&self) -> u64 {
        self.header.nfree_blocks
    }

    /// Header bytes plus every reserved block, in bytes.
    #[must_use]
    pub const fn used_size(&self) -> u64 {
        self.header.used_size
    }

    pub(crate) fn flush_header(&mut self) -> FsResult<()> {
        let mut buf = [0u8; HEADER_SIZE];
        self.header.write_bytes(&mut buf);
        if self.store.write_at(0, &buf) != HEADER_SIZE {
            return Err(FsError::Corrupt);
        }
        Ok(())
    }

    pub(crate) fn read_block_meta(&self, block: u32) -> FsResult<BlockMeta> {
        if u64::from(block) >= self.header.total_blocks {
            return Err(FsError::Corrupt);
        }
        let mut buf = [0u8; BLOCK_META_SIZE];
        if self.store.read_at(block_meta_offset(block), &mut buf) != BLOCK_META_SIZE {
            return Err(FsError::Corrupt);
        }
        Ok(BlockMeta::from_bytes(&buf))
    }

    pub(crate) fn write_block_meta(&mut self, block: u32, meta: &BlockMeta) -> FsResult<()> {
        if u64::from(block) >= self.header.total_blocks {
            return Err(FsError::Corrupt);
        }
        let buf = meta.to_bytes();
        if self.store.write_at(block_meta_offset(block), &buf) != BLOCK_META_SIZE {
            return Err(FsError::Corrupt);
        }
        Ok(())
    }

    /// Confirms `block` is the live head of a chain. Heads are the only
    /// blocks carrying a descriptor: in use and with no predecessor.
    pub(crate) fn descriptor_head(&self, block: u32) -> FsResult<()> {
        if u64::from(block) >= self.header.total_blocks {
            return Err(FsError::NotFound);
        }
        let meta = self.read_block_meta(block)?;
        if !meta.in_use || meta.prev != NO_BLOCK {
            return Err(FsError::NotFound);
        }
        // The root chain starts at block 0, so its second block also
        // stores a prev of NO_BLOCK. Rule out the root's successor.
        if block != self.root() && self.chain_next(self.root())? == block {
            return Err(FsError::NotFound);
        }
        Ok(())
    }

    /// Reads the full descriptor of the chain headed by `block`.
    ///
    /// # Errors
    /// `NotFound` if `block` is not a live chain head.
    pub fn read_descriptor(&self, block: u32) -> FsResult<Descriptor> {
        self.descriptor_head(block)?;
        let mut buf = [0u8; DESCRIPTOR_SIZE];
        if self.store.read_at(payload_offset(block, 0), &mut buf) != DESCRIPTOR_SIZE {
            return Err(FsError::Corrupt);
        }
        Ok(Descriptor::from_bytes(&buf))
    }

    pub(crate) fn write_descriptor(&mut self, block: u32, descriptor: &Descriptor) -> FsResult<()> {
        let buf = descriptor.to_bytes();
        if self.store.write_at(payload_offset(block, 0), &buf) != DESCRIPTOR_SIZE {
            return Err(FsError::Corrupt);
        }
        Ok(())
    }

    pub fn read_used_size(&self, block: u32) -> FsResult<u64> {
        self.descriptor_head(block)?;
        self.read_desc_u64(block, DESC_USED_SIZE)
    }

    pub(crate) fn write_used_size(&mut self, block: u32, used_size: u64) -> FsResult<()> {
        self.write_desc_u64(block, DESC_USED_SIZE, used_size)
    }

    pub fn read_nblocks(&self, block: u32) -> FsResult<u64> {
        self.descriptor_head(block)?;
        self.read_desc_u64(block, DESC_NBLOCKS)
    }

    pub(crate) fn write_nblocks(&mut self, block: u32, nblocks: u64) -> FsResult<()> {
        self.write_desc_u64(block, DESC_NBLOCKS, nblocks)
    }

    pub fn read_name(&self, block: u32) -> FsResult<String> {
        self.descriptor_head(block)?;
        let mut buf = [0u8; NAME_LEN];
        self.read_desc_field(block, DESC_NAME, &mut buf)?;
        Ok(decode_name(&buf))
    }

    /// Rewrites the stored name and extension in place.
    pub(crate) fn write_name(&mut self, block: u32, name: &str, ext: &str) -> FsResult<()> {
        self.descriptor_head(block)?;
        let mut buf = [0u8; NAME_LEN + EXT_LEN];
        encode_name(&mut buf[..NAME_LEN], name);
        encode_name(&mut buf[NAME_LEN..], ext);
        let off = payload_offset(block, DESC_NAME as u64);
        if self.store.write_at(off, &buf) != buf.len() {
            return Err(FsError::Corrupt);
        }
        Ok(())
    }

    pub fn read_ext(&self, block: u32) -> FsResult<String> {
        self.descriptor_head(block)?;
        let mut buf = [0u8; EXT_LEN];
        self.read_desc_field(block, DESC_EXT, &mut buf)?;
        Ok(decode_name(&buf))
    }

    pub fn read_is_directory(&self, block: u32) -> FsResult<bool> {
        self.descriptor_head(block)?;
        Ok(self.read_desc_u32(block, DESC_IS_DIRECTORY)? != 0)
    }

    pub fn read_parent(&self, block: u32) -> FsResult<u32> {
        self.descriptor_head(block)?;
        self.read_desc_u32(block, DESC_PARENT)
    }

    pub(crate) fn write_parent(&mut self, block: u32, parent: u32) -> FsResult<()> {
        self.write_desc_u32(block, DESC_PARENT, parent)
    }

    /// Absolute container offset of the chain's first content byte, as
    /// cached in the descriptor.
    pub fn read_content_offset(&self, block: u32) -> FsResult<u64> {
        self.descriptor_head(block)?;
        self.read_desc_u64(block, DESC_CONTENT)
    }

    /// One combined attribute view instead of four accessor calls.
    pub fn stat(&self, block: u32) -> FsResult<FsAttr> {
        let descriptor = self.read_descriptor(block)?;
        let Some(size) = descriptor.used_size.checked_sub(DESCRIPTOR_SIZE as u64) else {
            return Err(FsError::Corrupt);
        };
        Ok(FsAttr {
            kind: if descriptor.is_directory {
                NodeKind::Dir
            } else {
                NodeKind::File
            },
            name: descriptor.name,
            ext: descriptor.ext,
            size,
            nblocks: descriptor.nblocks,
            parent: descriptor.parent,
        })
    }

    fn read_desc_field(&self, block: u32, field: usize, buf: &mut [u8]) -> FsResult<()> {
        let off = payload_offset(block, field as u64);
        if self.store.read_at(off, buf) != buf.len() {
            return Err(FsError::Corrupt);
        }
        Ok(())
    }

    fn read_desc_u64(&self, block: u32, field: usize) -> FsResult<u64> {
        let mut buf = [0u8; 8];
        self.read_desc_field(block, field, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn read_desc_u32(&self, block: u32, field: usize) -> FsResult<u32> {
        let mut buf = [0u8; 4];
        self.read_desc_field(block, field, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn write_desc_u64(&mut self, block: u32, field: usize, value: u64) -> FsResult<()> {
        let off = payload_offset(block, field as u64);
        if self.store.write_at(off, &value.to_le_bytes()) != 8 {
            return Err(FsError::Corrupt);
        }
        Ok(())
    }

    fn write_desc_u32(&mut self, block: u32, field: usize, value: u32) -> FsResult<()> {
        let off = payload_offset(block, field as u64);
        if self.store.write_at(off, &value.to_le_bytes()) != 4 {
            return Err(FsError::Corrupt);
        }
        Ok(())
    }
}
