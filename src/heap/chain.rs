// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::BucketHeap;
use crate::{container::OverflowBlock, BlockIndex, BlockStore, Record};

/// Walks the overflow chain of a bucket, front to back
///
/// Yields `(index, block)` pairs. Fails with
/// [`crate::Error::ChainLengthMismatch`] if the chain is longer than the
/// bucket claims, which also stops cycles in corrupted chains.
pub struct ChainIter<'a, R, S> {
    heap: &'a BucketHeap<R, S>,
    address: BlockIndex,
    next: Option<BlockIndex>,
    expected: u32,
    traversed: u32,
}

impl<'a, R, S> ChainIter<'a, R, S> {
    pub(super) fn new(
        heap: &'a BucketHeap<R, S>,
        address: BlockIndex,
        first: Option<BlockIndex>,
        expected: u32,
    ) -> Self {
        Self {
            heap,
            address,
            next: first,
            expected,
            traversed: 0,
        }
    }

    /// Number of blocks visited so far.
    #[must_use]
    pub fn traversed(&self) -> u32 {
        self.traversed
    }
}

impl<R: Record, S: BlockStore> Iterator for ChainIter<'_, R, S> {
    type Item = crate::Result<(BlockIndex, OverflowBlock<R>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.next.take()?;

        self.traversed += 1;

        if self.traversed > self.expected {
            return Some(Err(super::chain_mismatch(
                self.address,
                self.expected,
                self.traversed,
            )));
        }

        let block = fail_iter!(self.heap.load_overflow_block(idx));
        self.next = block.next_overflow_block();

        Some(Ok((idx, block)))
    }
}
