// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{BlockIndex, BlockStore, FreeList};
use crate::{
    coding::{Decode, Encode},
    file::{rewrite_atomic, FREE_LIST_EXTENSION},
};
use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

/// Block store backed by a single file
///
/// Block `i` lives at byte offset `i * block_size`. The free list is kept
/// in memory and written to a sidecar file (`<file>.free`) on
/// [`BlockStore::sync`] and when the store is dropped.
pub struct FileBlockStore {
    path: PathBuf,
    file: File,
    block_count: u32,
    free: FreeList,
    free_list_dirty: bool,
    block_size: usize,
    blocking_factor: usize,
}

impl std::fmt::Debug for FileBlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBlockStore")
            .field("path", &self.path)
            .field("block_count", &self.block_count)
            .field("free", &self.free.len())
            .field("block_size", &self.block_size)
            .finish_non_exhaustive()
    }
}

impl FileBlockStore {
    /// Opens (or creates) a block file.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred, or the file length is not
    /// a multiple of the block size.
    pub fn open<P: AsRef<Path>>(
        path: P,
        block_size: usize,
        blocking_factor: usize,
    ) -> crate::Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let file_len = file.metadata()?.len();
        let block_size_u64 = block_size as u64;

        if file_len % block_size_u64 != 0 {
            log::error!(
                "Block file {} has torn length {file_len} (block size {block_size})",
                path.display(),
            );
            return Err(crate::Error::InvalidHeader("BlockStore"));
        }

        let block_count = u32::try_from(file_len / block_size_u64)
            .map_err(|_| crate::Error::InvalidHeader("BlockStore"))?;

        let free_list_path = path.with_extension(FREE_LIST_EXTENSION);
        let mut free = if free_list_path.try_exists()? {
            let bytes = std::fs::read(&free_list_path)?;
            FreeList::decode_from(&mut bytes.as_slice())?
        } else {
            FreeList::default()
        };
        free.truncate(block_count);

        log::trace!(
            "Opened block file {} with {block_count} blocks ({} free)",
            path.display(),
            free.len(),
        );

        Ok(Self {
            path,
            file,
            block_count,
            free,
            free_list_dirty: false,
            block_size,
            blocking_factor,
        })
    }

    /// Path of the block file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the block file in bytes.
    #[must_use]
    pub fn disk_space(&self) -> u64 {
        u64::from(self.block_count) * self.block_size as u64
    }

    fn offset(&self, idx: BlockIndex) -> u64 {
        u64::from(idx) * self.block_size as u64
    }

    fn set_block_count(&mut self, count: u32) -> crate::Result<()> {
        self.file.set_len(self.offset(count))?;
        self.block_count = count;
        Ok(())
    }

    fn persist_free_list(&mut self) -> crate::Result<()> {
        if !self.free_list_dirty {
            return Ok(());
        }

        let bytes = self.free.encode_into_vec()?;
        rewrite_atomic(&self.path.with_extension(FREE_LIST_EXTENSION), &bytes)?;
        self.free_list_dirty = false;

        Ok(())
    }
}

impl BlockStore for FileBlockStore {
    fn read_block(&self, idx: BlockIndex) -> crate::Result<Option<Vec<u8>>> {
        if idx >= self.block_count {
            return Ok(None);
        }

        let mut file = &self.file;
        file.seek(SeekFrom::Start(self.offset(idx)))?;

        let mut block = vec![0; self.block_size];
        file.read_exact(&mut block)?;

        Ok(Some(block))
    }

    fn write_block(&mut self, idx: BlockIndex, block: &[u8]) -> crate::Result<()> {
        debug_assert_eq!(self.block_size, block.len());

        if idx > self.block_count {
            // Zero-fill the gap
            self.set_block_count(idx)?;
        }

        let offset = self.offset(idx);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(block)?;

        self.block_count = self.block_count.max(idx + 1);

        Ok(())
    }

    fn extend_to(&mut self, count: u32) -> crate::Result<()> {
        if count > self.block_count {
            self.set_block_count(count)?;
        }
        Ok(())
    }

    fn truncate_to(&mut self, count: u32) -> crate::Result<()> {
        if count < self.block_count {
            self.set_block_count(count)?;

            let before = self.free.len();
            self.free.truncate(count);
            self.free_list_dirty |= before != self.free.len();
        }
        Ok(())
    }

    fn take_free_block(&mut self) -> Option<BlockIndex> {
        let idx = self.free.pop_lowest()?;
        self.free_list_dirty = true;
        Some(idx)
    }

    fn release_block(&mut self, idx: BlockIndex) -> crate::Result<()> {
        if idx >= self.block_count {
            return Err(crate::Error::DanglingLink(idx));
        }
        self.free_list_dirty |= self.free.insert(idx);
        Ok(())
    }

    fn trim_free_tail(&mut self) -> crate::Result<()> {
        if self.free.is_empty() {
            return Ok(());
        }

        let count = self.free.trimmed_len(self.block_count);

        if count != self.block_count {
            log::trace!(
                "Trimming {} free blocks off {}",
                self.block_count - count,
                self.path.display(),
            );
            self.set_block_count(count)?;
            self.free_list_dirty = true;
        }

        Ok(())
    }

    fn block_count(&self) -> u32 {
        self.block_count
    }

    fn free_block_count(&self) -> u32 {
        self.free.len()
    }

    fn blocking_factor(&self) -> usize {
        self.blocking_factor
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn sync(&mut self) -> crate::Result<()> {
        self.persist_free_list()?;
        self.file.sync_all()?;
        Ok(())
    }
}

impl Drop for FileBlockStore {
    fn drop(&mut self) {
        if let Err(e) = self.persist_free_list() {
            log::error!(
                "Failed to persist free list of {}: {e:?}",
                self.path.display()
            );
        }
    }
}
