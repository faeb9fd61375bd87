// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{BlockIndex, BlockStore, FreeList};

/// Block store that lives entirely in memory
///
/// Useful for tests and throwaway tables, nothing is persisted.
#[derive(Clone, Debug)]
pub struct MemoryBlockStore {
    blocks: Vec<Vec<u8>>,
    free: FreeList,
    block_size: usize,
    blocking_factor: usize,
}

impl MemoryBlockStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(block_size: usize, blocking_factor: usize) -> Self {
        Self {
            blocks: Vec::new(),
            free: FreeList::default(),
            block_size,
            blocking_factor,
        }
    }

    fn resize(&mut self, count: u32) {
        self.blocks.resize(count as usize, vec![0; self.block_size]);
    }
}

impl BlockStore for MemoryBlockStore {
    fn read_block(&self, idx: BlockIndex) -> crate::Result<Option<Vec<u8>>> {
        Ok(self.blocks.get(idx as usize).cloned())
    }

    fn write_block(&mut self, idx: BlockIndex, block: &[u8]) -> crate::Result<()> {
        debug_assert_eq!(self.block_size, block.len());

        if idx >= self.block_count() {
            self.resize(idx + 1);
        }

        if let Some(slot) = self.blocks.get_mut(idx as usize) {
            slot.clear();
            slot.extend_from_slice(block);
        }

        Ok(())
    }

    fn extend_to(&mut self, count: u32) -> crate::Result<()> {
        if count > self.block_count() {
            self.resize(count);
        }
        Ok(())
    }

    fn truncate_to(&mut self, count: u32) -> crate::Result<()> {
        if count < self.block_count() {
            self.resize(count);
            self.free.truncate(count);
        }
        Ok(())
    }

    fn take_free_block(&mut self) -> Option<BlockIndex> {
        self.free.pop_lowest()
    }

    fn release_block(&mut self, idx: BlockIndex) -> crate::Result<()> {
        if idx >= self.block_count() {
            return Err(crate::Error::DanglingLink(idx));
        }
        self.free.insert(idx);
        Ok(())
    }

    fn trim_free_tail(&mut self) -> crate::Result<()> {
        if self.free.is_empty() {
            return Ok(());
        }

        let count = self.free.trimmed_len(self.block_count());
        self.resize(count);
        Ok(())
    }

    #[expect(clippy::cast_possible_truncation, reason = "block indexes are u32")]
    fn block_count(&self) -> u32 {
        self.blocks.len() as u32
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
        Ok(())
    }
}
