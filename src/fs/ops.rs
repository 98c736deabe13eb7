//! Namespace operations: insert, rename, copy, move, delete, and path
//! building. Tree walks use explicit work stacks; nothing here recurses.

use crate::format::{Descriptor, DirEntry};
use crate::layout::{
    BLOCK_PAYLOAD, DESCRIPTOR_SIZE, EXT_LEN, MAX_PATH_DEPTH, NAME_LEN, NO_BLOCK, payload_offset,
};
use crate::store::ByteStore;

use super::{FsError, FsResult, Slim64Fs};

impl<S: ByteStore> Slim64Fs<S> {
    /// Creates an empty file named `name` under `parent`. Returns the
    /// first block of the new chain.
    ///
    /// # Errors
    /// `InvalidName` for an unusable name, `NotDir` if `parent` is not a
    /// directory, `AlreadyExists` on a name collision.
    pub fn insert_file(&mut self, parent: u32, name: &str) -> FsResult<u32> {
        self.insert_node(parent, name, false)
    }

    /// Creates an empty directory named `name` under `parent`. Returns
    /// the first block of the new chain.
    pub fn insert_directory(&mut self, parent: u32, name: &str) -> FsResult<u32> {
        self.insert_node(parent, name, true)
    }

    /// Renames the entry `old_name` in `parent` to `new_name`, keeping
    /// the entry record and the descriptor in agreement.
    pub fn rename(&mut self, parent: u32, old_name: &str, new_name: &str) -> FsResult<()> {
        validate_name(new_name)?;
        let (index, mut entry) = self.find_entry(parent, old_name)?;
        if old_name == new_name {
            return Ok(());
        }
        if self.name_taken(parent, new_name)? {
            return Err(FsError::AlreadyExists);
        }
        let target = entry.base_block;
        entry.name = new_name.to_string();
        self.replace_entry(parent, index, &entry)?;
        let ext = if self.read_is_directory(target)? {
            String::new()
        } else {
            extract_ext(new_name).to_string()
        };
        self.write_name(target, new_name, &ext)
    }

    /// Copies the file or directory headed by `src` into `dst_dir`,
    /// directories recursively. On a name collision the copy is named
    /// `<name>-copy`, then `<name>-copy2` and so on. Returns the first
    /// block of the new top-level chain.
    ///
    /// # Errors
    /// `InvalidInput` for the root, or for copying a directory into its
    /// own subtree.
    pub fn copy(&mut self, src: u32, dst_dir: u32) -> FsResult<u32> {
        if src == self.header.root_block {
            return Err(FsError::InvalidInput);
        }
        if !self.read_is_directory(dst_dir)? {
            return Err(FsError::NotDir);
        }
        if self.read_is_directory(src)? && self.is_descendant(dst_dir, src)? {
            return Err(FsError::InvalidInput);
        }
        let src_parent = self.read_parent(src)?;
        let (_, entry) = self.entry_by_block(src_parent, src)?;
        let name = self.collision_name(dst_dir, &entry.name)?;

        let copied = self.copy_single(src, dst_dir, &name)?;
        if self.read_is_directory(src)? {
            let mut stack = vec![(src, copied)];
            while let Some((from, into)) = stack.pop() {
                for entry in self.list_entries(from)? {
                    let child = self.copy_single(entry.base_block, into, &entry.name)?;
                    if self.read_is_directory(entry.base_block)? {
                        stack.push((entry.base_block, child));
                    }
                }
            }
        }
        Ok(copied)
    }

    /// Moves the file or directory headed by `src` under `dst_dir`
    /// without touching its content; only entry records and the parent
    /// link change. Moving to the current parent is a no-op. Collisions
    /// rename the moved entry the same way `copy` does.
    ///
    /// # Errors
    /// `InvalidInput` for the root, or for moving into the moved
    /// directory's own subtree.
    pub fn move_entry(&mut self, src: u32, dst_dir: u32) -> FsResult<()> {
        if src == self.header.root_block {
            return Err(FsError::InvalidInput);
        }
        if !self.read_is_directory(dst_dir)? {
            return Err(FsError::NotDir);
        }
        let src_parent = self.read_parent(src)?;
        if dst_dir == src_parent {
            return Ok(());
        }
        if self.is_descendant(dst_dir, src)? {
            return Err(FsError::InvalidInput);
        }
        let (_, entry) = self.entry_by_block(src_parent, src)?;
        let name = self.collision_name(dst_dir, &entry.name)?;
        self.remove_entry(src_parent, src)?;
        self.add_entry(
            dst_dir,
            &DirEntry {
                name: name.clone(),
                base_block: src,
            },
        )?;
        self.write_parent(src, dst_dir)?;
        if name != entry.name {
            let ext = if self.read_is_directory(src)? {
                String::new()
            } else {
                extract_ext(&name).to_string()
            };
            self.write_name(src, &name, &ext)?;
        }
        Ok(())
    }

    /// Deletes the file or directory headed by `target`, directories
    /// recursively, children freed before the directory holding them.
    /// Returns the number of blocks released.
    ///
    /// # Errors
    /// `InvalidInput` for the root.
    pub fn delete(&mut self, target: u32) -> FsResult<u64> {
        if target == self.header.root_block {
            return Err(FsError::InvalidInput);
        }
        let parent = self.read_parent(target)?;
        self.remove_entry(parent, target)?;

        // Entry bookkeeping inside the doomed subtree is skipped; every
        // chain in it is freed wholesale.
        let mut freed = 0u64;
        let mut stack = vec![(target, false)];
        while let Some((block, expanded)) = stack.pop() {
            if !expanded && self.read_is_directory(block)? {
                stack.push((block, true));
                for entry in self.list_entries(block)? {
                    stack.push((entry.base_block, false));
                }
            } else {
                freed += self.free_chain(block)?;
            }
        }
        Ok(freed)
    }

    /// Renders the absolute path of `block`, root-first, joined by `/`.
    ///
    /// # Errors
    /// `PathTooDeep` past `MAX_PATH_DEPTH` components.
    pub fn build_path(&self, block: u32) -> FsResult<String> {
        let mut names = Vec::new();
        let mut cursor = block;
        loop {
            names.push(self.read_name(cursor)?);
            if cursor == self.header.root_block {
                break;
            }
            if names.len() >= MAX_PATH_DEPTH {
                return Err(FsError::PathTooDeep);
            }
            cursor = self.read_parent(cursor)?;
        }
        names.reverse();
        Ok(names.join("/"))
    }

    fn insert_node(&mut self, parent: u32, name: &str, is_directory: bool) -> FsResult<u32> {
        validate_name(name)?;
        if !self.read_is_directory(parent)? {
            return Err(FsError::NotDir);
        }
        if self.name_taken(parent, name)? {
            return Err(FsError::AlreadyExists);
        }
        let block = self.reserve_blocks(1)?;
        let descriptor = Descriptor {
            used_size: DESCRIPTOR_SIZE as u64,
            nblocks: 1,
            name: name.to_string(),
            ext: if is_directory {
                String::new()
            } else {
                extract_ext(name).to_string()
            },
            is_directory,
            parent,
            self_block: block,
            content: payload_offset(block, DESCRIPTOR_SIZE as u64),
        };
        self.write_descriptor(block, &descriptor)?;
        let entry = DirEntry {
            name: name.to_string(),
            base_block: block,
        };
        // Growing the parent's entry list can still run out of space; the
        // reserved block must go back instead of leaking.
        if let Err(err) = self.add_entry(parent, &entry) {
            self.free_chain(block)?;
            return Err(err);
        }
        Ok(block)
    }

    /// Copies one node into `dst_dir` under `name`: directories as a
    /// fresh empty shell (children follow separately), files by cloning
    /// the whole chain payload-for-payload.
    fn copy_single(&mut self, src: u32, dst_dir: u32, name: &str) -> FsResult<u32> {
        let descriptor = self.read_descriptor(src)?;
        if descriptor.is_directory {
            return self.insert_node(dst_dir, name, true);
        }

        let run = self.reserve_blocks(descriptor.nblocks)?;
        let mut from = src;
        let mut into = run;
        let mut buf = vec![0u8; BLOCK_PAYLOAD as usize];
        loop {
            if self.store.read_at(payload_offset(from, 0), &mut buf) != buf.len() {
                return Err(FsError::Corrupt);
            }
            if self.store.write_at(payload_offset(into, 0), &buf) != buf.len() {
                return Err(FsError::Corrupt);
            }
            let next_from = self.chain_next(from)?;
            if next_from == NO_BLOCK {
                break;
            }
            let next_into = self.chain_next(into)?;
            if next_into == NO_BLOCK {
                return Err(FsError::Corrupt);
            }
            from = next_from;
            into = next_into;
        }

        let mut copied = descriptor;
        copied.name = name.to_string();
        copied.ext = extract_ext(name).to_string();
        copied.parent = dst_dir;
        copied.self_block = run;
        copied.content = payload_offset(run, DESCRIPTOR_SIZE as u64);
        self.write_descriptor(run, &copied)?;
        let entry = DirEntry {
            name: name.to_string(),
            base_block: run,
        };
        if let Err(err) = self.add_entry(dst_dir, &entry) {
            self.free_chain(run)?;
            return Err(err);
        }
        Ok(run)
    }

    /// `base` if it is free in `dir`, else the first free suffixed
    /// variant.
    fn collision_name(&self, dir: u32, base: &str) -> FsResult<String> {
        if !self.name_taken(dir, base)? {
            return Ok(base.to_string());
        }
        let mut candidate = format!("{base}-copy");
        let mut attempt = 2u32;
        while self.name_taken(dir, &candidate)? {
            candidate = format!("{base}-copy{attempt}");
            attempt += 1;
        }
        if candidate.len() > NAME_LEN {
            return Err(FsError::InvalidName);
        }
        Ok(candidate)
    }

    fn name_taken(&self, dir: u32, name: &str) -> FsResult<bool> {
        match self.find_child(dir, name) {
            Ok(_) => Ok(true),
            Err(FsError::NotFound) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Whether `node` sits inside the subtree rooted at `ancestor`
    /// (itself included), by walking parent links.
    fn is_descendant(&self, node: u32, ancestor: u32) -> FsResult<bool> {
        let mut cursor = node;
        let mut steps = 0u64;
        loop {
            if cursor == ancestor {
                return Ok(true);
            }
            if cursor == self.header.root_block {
                return Ok(false);
            }
            if steps >= self.header.total_blocks {
                return Err(FsError::Corrupt);
            }
            cursor = self.read_parent(cursor)?;
            steps += 1;
        }
    }
}

fn validate_name(name: &str) -> FsResult<()> {
    if name.is_empty() || name.len() > NAME_LEN {
        return Err(FsError::InvalidName);
    }
    if name == "." || name == ".." {
        return Err(FsError::InvalidName);
    }
    if name.contains('/') || name.contains('\0') {
        return Err(FsError::InvalidName);
    }
    Ok(())
}

/// Extension of `name`, if it has one short enough for the descriptor's
/// extension field. The dot is not stored.
fn extract_ext(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) if pos + 1 < name.len() && name.len() - pos - 1 <= EXT_LEN => &name[pos + 1..],
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_must_be_plain_and_fit() {
        assert!(validate_name("notes.txt").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(".").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("nul\0byte").is_err());
        assert!(validate_name(&"x".repeat(NAME_LEN)).is_ok());
        assert!(validate_name(&"x".repeat(NAME_LEN + 1)).is_err());
    }

    #[test]
    fn extension_comes_from_the_last_dot() {
        assert_eq!(extract_ext("notes.txt"), "txt");
        assert_eq!(extract_ext("archive.tar.gz"), "gz");
        assert_eq!(extract_ext("data.json"), "json");
        assert_eq!(extract_ext("README"), "");
        assert_eq!(extract_ext("trailing."), "");
        assert_eq!(extract_ext("file.toolong"), "");
        assert_eq!(extract_ext(".hidden"), "");
    }
}
