// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Fixed-size block storage with free-list reuse

mod file_store;
mod free_list;
mod memory;

pub use file_store::FileBlockStore;
pub use free_list::FreeList;
pub use memory::MemoryBlockStore;

/// Index of a block inside a block store
pub type BlockIndex = u32;

/// Storage of fixed-size blocks addressed by index
///
/// Blocks that are no longer needed can be handed back with
/// [`BlockStore::release_block`] and are reused by
/// [`BlockStore::take_free_block`] before the store grows.
pub trait BlockStore {
    /// Reads a block, returns `None` if the index is past the end of the store.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred.
    fn read_block(&self, idx: BlockIndex) -> crate::Result<Option<Vec<u8>>>;

    /// Writes a block.
    ///
    /// Writing at [`BlockStore::next_block_index`] appends a block,
    /// writing further past the end fills the gap with zeroed blocks.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred.
    fn write_block(&mut self, idx: BlockIndex, block: &[u8]) -> crate::Result<()>;

    /// Grows the store to `count` blocks, new blocks are zeroed.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred.
    fn extend_to(&mut self, count: u32) -> crate::Result<()>;

    /// Shrinks the store to `count` blocks, forgetting freed blocks past the end.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred.
    fn truncate_to(&mut self, count: u32) -> crate::Result<()>;

    /// Takes a previously released block for reuse.
    fn take_free_block(&mut self) -> Option<BlockIndex>;

    /// Index a newly appended block would get.
    fn next_block_index(&self) -> BlockIndex {
        self.block_count()
    }

    /// Marks a block as reusable.
    ///
    /// # Errors
    ///
    /// Returns error, if the block does not exist.
    fn release_block(&mut self, idx: BlockIndex) -> crate::Result<()>;

    /// Truncates trailing blocks that are marked free.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred.
    fn trim_free_tail(&mut self) -> crate::Result<()>;

    /// Number of blocks in the store, including free ones.
    fn block_count(&self) -> u32;

    /// Number of blocks marked free.
    fn free_block_count(&self) -> u32;

    /// Number of records that fit into one block.
    fn blocking_factor(&self) -> usize;

    /// Size of one block in bytes.
    fn block_size(&self) -> usize;

    /// Persists the free list and flushes written blocks to disk.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred.
    fn sync(&mut self) -> crate::Result<()>;
}
