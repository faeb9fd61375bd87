// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Record placement into buckets and their overflow chains

mod chain;

pub use chain::ChainIter;

use crate::{
    container::{Bucket, OverflowBlock, RecordContainer},
    BlockIndex, BlockStore, Record,
};
use std::marker::PhantomData;

/// Result of removing a record from a single overflow block
#[derive(Debug)]
pub enum DeleteOutcome<R> {
    /// The record was removed, the block needs to be written back
    Removed {
        /// Index of the block
        idx: BlockIndex,

        /// Block without the record
        block: OverflowBlock<R>,
    },

    /// The block does not contain the record
    NotFoundHere {
        /// Index of the block
        idx: BlockIndex,

        /// Unmodified block
        block: OverflowBlock<R>,
    },
}

pub(crate) fn chain_mismatch(address: BlockIndex, expected: u32, traversed: u32) -> crate::Error {
    log::error!(
        "Overflow chain of bucket {address} has {traversed} blocks, but bucket claims {expected}"
    );
    crate::Error::ChainLengthMismatch {
        address,
        expected,
        traversed,
    }
}

fn shuffle_mismatch(address: BlockIndex, expected: usize, got: usize) -> crate::Error {
    log::error!("Shuffle of bucket {address} placed {got} records, expected {expected}");
    crate::Error::ShuffleCountMismatch {
        address,
        expected,
        got,
    }
}

/// Primary buckets plus their overflow blocks
///
/// Buckets live in the main store at their hash address, overflow blocks
/// in the overflow store. Every operation loads the blocks it needs and
/// writes modified blocks back before returning.
pub struct BucketHeap<R, S> {
    main: S,
    overflow: S,
    _record: PhantomData<R>,
}

impl<R, S: std::fmt::Debug> std::fmt::Debug for BucketHeap<R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketHeap")
            .field("main", &self.main)
            .field("overflow", &self.overflow)
            .finish()
    }
}

impl<R: Record, S: BlockStore> BucketHeap<R, S> {
    /// Creates a heap over a main and an overflow store.
    pub fn new(main: S, overflow: S) -> Self {
        Self {
            main,
            overflow,
            _record: PhantomData,
        }
    }

    /// Records per bucket.
    #[must_use]
    pub fn main_capacity(&self) -> usize {
        self.main.blocking_factor()
    }

    /// Records per overflow block.
    #[must_use]
    pub fn overflow_capacity(&self) -> usize {
        self.overflow.blocking_factor()
    }

    /// Number of blocks in the main store.
    #[must_use]
    pub fn main_block_count(&self) -> u32 {
        self.main.block_count()
    }

    /// Number of overflow blocks in use (not on the free list).
    #[must_use]
    pub fn overflow_block_count(&self) -> u32 {
        self.overflow
            .block_count()
            .saturating_sub(self.overflow.free_block_count())
    }

    /// The main store.
    #[must_use]
    pub fn main_store(&self) -> &S {
        &self.main
    }

    /// The overflow store.
    #[must_use]
    pub fn overflow_store(&self) -> &S {
        &self.overflow
    }

    /// Loads the bucket at `address`.
    ///
    /// A bucket that was never written is returned empty.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred or the block is corrupt.
    pub fn load_bucket(&self, address: BlockIndex) -> crate::Result<Bucket<R>> {
        match self.main.read_block(address)? {
            Some(bytes) => Bucket::decode_block(&bytes, self.main_capacity()),
            None => Ok(Bucket::new(self.main_capacity())),
        }
    }

    /// Loads an overflow block.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred, the block is corrupt, or
    /// it does not exist.
    pub fn load_overflow_block(&self, idx: BlockIndex) -> crate::Result<OverflowBlock<R>> {
        let Some(bytes) = self.overflow.read_block(idx)? else {
            log::error!("Overflow chain links to missing block {idx}");
            return Err(crate::Error::DanglingLink(idx));
        };
        OverflowBlock::decode_block(&bytes, self.overflow_capacity())
    }

    /// Iterates over the overflow chain of a bucket.
    pub fn chain<'a>(&'a self, address: BlockIndex, bucket: &Bucket<R>) -> ChainIter<'a, R, S> {
        ChainIter::new(
            self,
            address,
            bucket.first_overflow_block(),
            bucket.overflow_block_count(),
        )
    }

    /// Smallest number of overflow blocks that can hold `n` records
    /// next to a full bucket.
    #[must_use]
    pub fn min_required_overflow_blocks(&self, n: u32) -> u32 {
        let main = self.main_capacity() as u64;
        let overflow = self.overflow_capacity() as u64;
        let n = u64::from(n);

        if n <= main {
            return 0;
        }

        u32::try_from((n - main).div_ceil(overflow)).unwrap_or(u32::MAX)
    }

    fn write_bucket(&mut self, address: BlockIndex, bucket: &Bucket<R>) -> crate::Result<()> {
        let bytes = bucket.encode_block(self.main.block_size())?;
        self.main.write_block(address, &bytes)
    }

    fn write_overflow_block(
        &mut self,
        idx: BlockIndex,
        block: &OverflowBlock<R>,
    ) -> crate::Result<()> {
        let bytes = block.encode_block(self.overflow.block_size())?;
        self.overflow.write_block(idx, &bytes)
    }

    fn allocate_overflow_block(&mut self) -> BlockIndex {
        match self.overflow.take_free_block() {
            Some(idx) => {
                log::trace!("Reusing free overflow block {idx}");
                idx
            }
            None => self.overflow.next_block_index(),
        }
    }

    fn release_overflow_block(&mut self, idx: BlockIndex) -> crate::Result<()> {
        let zeroed = vec![0; self.overflow.block_size()];
        self.overflow.write_block(idx, &zeroed)?;
        self.overflow.release_block(idx)
    }

    /// Inserts a record into the bucket at `address`, spilling into the
    /// overflow chain if the bucket is full.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred or the chain is inconsistent.
    pub fn insert_into_bucket(&mut self, address: BlockIndex, record: R) -> crate::Result<()> {
        let mut bucket = self.load_bucket(address)?;
        bucket.set_total_element_count(bucket.total_element_count() + 1);

        if bucket.is_full() {
            return self.insert_into_overflow(address, bucket, record);
        }

        log::trace!("Placing record in bucket {address}");
        bucket.add_record(record);
        self.write_bucket(address, &bucket)
    }

    fn insert_into_overflow(
        &mut self,
        address: BlockIndex,
        mut bucket: Bucket<R>,
        record: R,
    ) -> crate::Result<()> {
        let mut block = OverflowBlock::new(self.overflow_capacity());

        if bucket.first_overflow_block().is_none() {
            let idx = self.allocate_overflow_block();
            log::trace!("Starting overflow chain of bucket {address} at block {idx}");

            block.add_record(record);
            self.write_overflow_block(idx, &block)?;

            bucket.set_first_overflow_block(Some(idx));
            bucket.set_overflow_block_count(1);
            return self.write_bucket(address, &bucket);
        }

        let mut last = None;
        let mut with_room = None;

        let mut chain = self.chain(address, &bucket);
        for item in chain.by_ref() {
            let (idx, block) = item?;

            if block.is_full() {
                last = Some((idx, block));
            } else {
                with_room = Some((idx, block));
                break;
            }
        }
        let traversed = chain.traversed();

        if let Some((idx, mut block)) = with_room {
            log::trace!("Placing record of bucket {address} in overflow block {idx}");
            block.add_record(record);
            self.write_overflow_block(idx, &block)?;
            return self.write_bucket(address, &bucket);
        }

        if traversed != bucket.overflow_block_count() {
            return Err(chain_mismatch(
                address,
                bucket.overflow_block_count(),
                traversed,
            ));
        }

        let Some((last_idx, mut last_block)) = last else {
            return Err(chain_mismatch(
                address,
                bucket.overflow_block_count(),
                traversed,
            ));
        };

        let idx = self.allocate_overflow_block();
        log::trace!("Appending overflow block {idx} to chain of bucket {address}");

        block.add_record(record);
        self.write_overflow_block(idx, &block)?;

        last_block.set_next_overflow_block(Some(idx));
        self.write_overflow_block(last_idx, &last_block)?;

        bucket.set_overflow_block_count(traversed + 1);
        self.write_bucket(address, &bucket)
    }

    /// Looks up the record with the same key as `partial`.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred or the chain is inconsistent.
    pub fn get(&self, address: BlockIndex, partial: &R) -> crate::Result<Option<R>> {
        let bucket = self.load_bucket(address)?;

        if let Some(record) = bucket.get_record(partial) {
            return Ok(Some(record.clone()));
        }

        for item in self.chain(address, &bucket) {
            let (_, block) = item?;

            if let Some(record) = block.get_record(partial) {
                return Ok(Some(record.clone()));
            }
        }

        Ok(None)
    }

    /// Replaces the record with the same key in place.
    ///
    /// Returns `false` if no such record exists.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred or the chain is inconsistent.
    pub fn update(&mut self, address: BlockIndex, record: R) -> crate::Result<bool> {
        let mut bucket = self.load_bucket(address)?;

        if bucket.get_record(&record).is_some() {
            bucket.replace_record(record);
            self.write_bucket(address, &bucket)?;
            return Ok(true);
        }

        let mut found = None;

        for item in self.chain(address, &bucket) {
            let (idx, block) = item?;

            if block.get_record(&record).is_some() {
                found = Some((idx, block));
                break;
            }
        }

        let Some((idx, mut block)) = found else {
            return Ok(false);
        };

        block.replace_record(record);
        self.write_overflow_block(idx, &block)?;

        Ok(true)
    }

    fn delete_from_block(
        idx: BlockIndex,
        mut block: OverflowBlock<R>,
        partial: &R,
    ) -> DeleteOutcome<R> {
        if block.remove_record(partial).is_some() {
            DeleteOutcome::Removed { idx, block }
        } else {
            DeleteOutcome::NotFoundHere { idx, block }
        }
    }

    /// Deletes the record with the same key as `partial`.
    ///
    /// Emptied overflow blocks are unlinked and released. If the chain
    /// ends up longer than needed, the bucket is shuffled.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred or the chain is inconsistent.
    pub fn delete(&mut self, address: BlockIndex, partial: &R) -> crate::Result<bool> {
        let mut bucket = self.load_bucket(address)?;

        if bucket.remove_record(partial).is_some() {
            bucket.set_total_element_count(bucket.total_element_count().saturating_sub(1));
            self.write_bucket(address, &bucket)?;
            self.shuffle_if_sparse(address, bucket)?;
            return Ok(true);
        }

        let mut prev = None;
        let mut removed = None;

        for item in self.chain(address, &bucket) {
            let (idx, block) = item?;

            match Self::delete_from_block(idx, block, partial) {
                DeleteOutcome::Removed { idx, block } => {
                    removed = Some((idx, block));
                    break;
                }
                DeleteOutcome::NotFoundHere { idx, block } => {
                    prev = Some((idx, block));
                }
            }
        }

        let Some((idx, block)) = removed else {
            return Ok(false);
        };

        bucket.set_total_element_count(bucket.total_element_count().saturating_sub(1));

        if block.is_empty() {
            log::trace!("Unlinking empty overflow block {idx} from bucket {address}");

            let next = block.next_overflow_block();

            match prev {
                Some((prev_idx, mut prev_block)) => {
                    prev_block.set_next_overflow_block(next);
                    self.write_overflow_block(prev_idx, &prev_block)?;
                }
                None => bucket.set_first_overflow_block(next),
            }

            bucket.set_overflow_block_count(bucket.overflow_block_count().saturating_sub(1));
            self.release_overflow_block(idx)?;
            self.overflow.trim_free_tail()?;
        } else {
            self.write_overflow_block(idx, &block)?;
        }

        self.write_bucket(address, &bucket)?;
        self.shuffle_if_sparse(address, bucket)?;

        Ok(true)
    }

    fn shuffle_if_sparse(&mut self, address: BlockIndex, bucket: Bucket<R>) -> crate::Result<()> {
        let required = self.min_required_overflow_blocks(bucket.total_element_count());

        if required < bucket.overflow_block_count() {
            self.shuffle(address, bucket)?;
        }

        Ok(())
    }

    /// Redistributes the records of a bucket and its chain onto as few
    /// overflow blocks as possible.
    ///
    /// The visited chain blocks are reused in order, the rest is released.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred or the record counts do not add up.
    pub fn shuffle(&mut self, address: BlockIndex, mut bucket: Bucket<R>) -> crate::Result<()> {
        let (records, visited) = self.collect_with_chain(address, &bucket)?;

        let expected = bucket.total_element_count() as usize;
        if records.len() != expected {
            return Err(shuffle_mismatch(address, expected, records.len()));
        }

        let required = self.min_required_overflow_blocks(bucket.total_element_count()) as usize;

        let Some((used, unused)) = visited.split_at_checked(required) else {
            return Err(shuffle_mismatch(
                address,
                expected,
                bucket.valid_count() + visited.len() * self.overflow_capacity(),
            ));
        };

        let mut records = records.into_iter();
        let mut placed = 0;

        bucket.delete_all_records();

        for record in records.by_ref().take(self.main_capacity()) {
            bucket.add_record(record);
            placed += 1;
        }

        for (pos, &idx) in used.iter().enumerate() {
            let mut block = OverflowBlock::new(self.overflow_capacity());

            for record in records.by_ref().take(self.overflow_capacity()) {
                block.add_record(record);
                placed += 1;
            }

            block.set_next_overflow_block(used.get(pos + 1).copied());
            self.write_overflow_block(idx, &block)?;
        }

        if placed != expected || records.next().is_some() {
            return Err(shuffle_mismatch(address, expected, placed));
        }

        for &idx in unused {
            self.release_overflow_block(idx)?;
        }

        bucket.set_first_overflow_block(used.first().copied());
        #[expect(clippy::cast_possible_truncation, reason = "chain is never longer than u32")]
        bucket.set_overflow_block_count(used.len() as u32);
        self.write_bucket(address, &bucket)?;

        self.overflow.trim_free_tail()?;

        log::debug!(
            "Shuffled bucket {address}: {} -> {} overflow blocks",
            visited.len(),
            used.len(),
        );

        Ok(())
    }

    /// Collects every record of the bucket and its chain, in chain order.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred or the chain is inconsistent.
    pub fn collect_all_records(
        &self,
        address: BlockIndex,
        bucket: &Bucket<R>,
    ) -> crate::Result<Vec<R>> {
        self.collect_with_chain(address, bucket)
            .map(|(records, _)| records)
    }

    /// Collects every record of the bucket and its chain, together with
    /// the indexes of the visited overflow blocks.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred or the chain length does not
    /// match the bucket's overflow block count.
    pub fn collect_with_chain(
        &self,
        address: BlockIndex,
        bucket: &Bucket<R>,
    ) -> crate::Result<(Vec<R>, Vec<BlockIndex>)> {
        let mut records = bucket.valid_records().to_vec();
        let mut visited = Vec::with_capacity(bucket.overflow_block_count() as usize);

        for item in self.chain(address, bucket) {
            let (idx, block) = item?;
            records.extend_from_slice(block.valid_records());
            visited.push(idx);
        }

        #[expect(clippy::cast_possible_truncation, reason = "chain is never longer than u32")]
        let traversed = visited.len() as u32;

        if traversed != bucket.overflow_block_count() {
            return Err(chain_mismatch(
                address,
                bucket.overflow_block_count(),
                traversed,
            ));
        }

        Ok((records, visited))
    }

    /// Detaches the overflow chain of a bucket.
    ///
    /// The overflow blocks themselves are left untouched.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred.
    pub fn clear_overflow_chain(&mut self, address: BlockIndex) -> crate::Result<()> {
        let mut bucket = self.load_bucket(address)?;
        bucket.clear_overflow_chain();
        self.write_bucket(address, &bucket)
    }

    /// Moves every record out of a bucket and its chain.
    ///
    /// The chain blocks are released and the bucket is left empty.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred or the chain is inconsistent.
    pub fn take_all_records(&mut self, address: BlockIndex) -> crate::Result<Vec<R>> {
        let mut bucket = self.load_bucket(address)?;
        let (records, visited) = self.collect_with_chain(address, &bucket)?;

        for &idx in &visited {
            self.release_overflow_block(idx)?;
        }

        bucket.delete_all_records();
        bucket.clear_overflow_chain();
        bucket.set_total_element_count(0);
        self.write_bucket(address, &bucket)?;

        self.overflow.trim_free_tail()?;

        log::trace!(
            "Took {} records and {} overflow blocks out of bucket {address}",
            records.len(),
            visited.len(),
        );

        Ok(records)
    }

    /// Grows the main store to `count` buckets.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred.
    pub fn extend_main_to(&mut self, count: u32) -> crate::Result<()> {
        self.main.extend_to(count)
    }

    /// Shrinks the main store to `count` buckets.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred.
    pub fn truncate_main_to(&mut self, count: u32) -> crate::Result<()> {
        self.main.truncate_to(count)
    }

    /// Persists both stores.
    ///
    /// # Errors
    ///
    /// Returns error, if an IO error occurred.
    pub fn sync(&mut self) -> crate::Result<()> {
        self.main.sync()?;
        self.overflow.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{record::test_support::Rec, MemoryBlockStore};
    use test_log::test;

    // 3 records per bucket, 2 per overflow block
    fn heap() -> BucketHeap<Rec, MemoryBlockStore> {
        BucketHeap::new(MemoryBlockStore::new(64, 3), MemoryBlockStore::new(40, 2))
    }

    fn fill(
        heap: &mut BucketHeap<Rec, MemoryBlockStore>,
        address: BlockIndex,
        keys: std::ops::Range<i32>,
    ) -> crate::Result<()> {
        for key in keys {
            heap.insert_into_bucket(address, Rec::new(key))?;
        }
        Ok(())
    }

    #[test]
    fn heap_min_required() {
        let heap = heap();
        assert_eq!(0, heap.min_required_overflow_blocks(0));
        assert_eq!(0, heap.min_required_overflow_blocks(3));
        assert_eq!(1, heap.min_required_overflow_blocks(4));
        assert_eq!(1, heap.min_required_overflow_blocks(5));
        assert_eq!(2, heap.min_required_overflow_blocks(6));
        assert_eq!(3, heap.min_required_overflow_blocks(9));
    }

    #[test]
    fn heap_insert_spills_into_overflow() -> crate::Result<()> {
        let mut heap = heap();

        fill(&mut heap, 0, 0..3)?;
        assert_eq!(0, heap.overflow_block_count());

        heap.insert_into_bucket(0, Rec::new(3))?;

        let bucket = heap.load_bucket(0)?;
        assert_eq!(3, bucket.valid_count());
        assert_eq!(4, bucket.total_element_count());
        assert_eq!(1, bucket.overflow_block_count());
        assert_eq!(Some(0), bucket.first_overflow_block());
        assert_eq!(1, heap.overflow_block_count());

        for key in 0..4 {
            assert_eq!(Some(Rec::new(key)), heap.get(0, &Rec::partial(key))?);
        }
        assert_eq!(None, heap.get(0, &Rec::partial(4))?);

        Ok(())
    }

    #[test]
    fn heap_chain_grows_in_order() -> crate::Result<()> {
        let mut heap = heap();
        fill(&mut heap, 0, 0..8)?;

        let bucket = heap.load_bucket(0)?;
        assert_eq!(8, bucket.total_element_count());
        assert_eq!(3, bucket.overflow_block_count());

        let (records, visited) = heap.collect_with_chain(0, &bucket)?;
        assert_eq!(vec![0, 1, 2], visited);
        assert_eq!(
            (0..8).collect::<Vec<_>>(),
            records.iter().map(|r| r.key).collect::<Vec<_>>(),
        );

        Ok(())
    }

    #[test]
    fn heap_chain_counts_traversed_blocks() -> crate::Result<()> {
        let mut heap = heap();
        fill(&mut heap, 0, 0..8)?;

        let bucket = heap.load_bucket(0)?;

        let mut chain = heap.chain(0, &bucket);
        assert_eq!(0, chain.traversed());

        let first = chain.next().transpose()?.map(|(idx, _)| idx);
        assert_eq!(Some(0), first);
        assert_eq!(1, chain.traversed());

        for item in chain.by_ref() {
            item?;
        }
        assert_eq!(3, chain.traversed());
        assert!(chain.next().is_none());

        // A fourth insert into the full chain appends block 3
        heap.insert_into_bucket(0, Rec::new(8))?;
        heap.insert_into_bucket(0, Rec::new(9))?;
        let bucket = heap.load_bucket(0)?;
        assert_eq!(4, bucket.overflow_block_count());
        assert_eq!(10, bucket.total_element_count());

        Ok(())
    }

    #[test]
    fn heap_update_in_chain() -> crate::Result<()> {
        let mut heap = heap();
        fill(&mut heap, 1, 0..5)?;

        let mut updated = Rec::new(4);
        updated.payload[0] = 7;

        assert!(heap.update(1, updated.clone())?);
        assert!(!heap.update(1, Rec::new(10))?);
        assert_eq!(Some(updated), heap.get(1, &Rec::partial(4))?);
        assert_eq!(5, heap.load_bucket(1)?.total_element_count());

        Ok(())
    }

    #[test]
    fn heap_delete_from_bucket_shuffles() -> crate::Result<()> {
        let mut heap = heap();
        fill(&mut heap, 0, 0..6)?;
        assert_eq!(2, heap.load_bucket(0)?.overflow_block_count());

        // 5 records fit into the bucket plus one overflow block
        assert!(heap.delete(0, &Rec::partial(1))?);

        let bucket = heap.load_bucket(0)?;
        assert_eq!(5, bucket.total_element_count());
        assert_eq!(3, bucket.valid_count());
        assert_eq!(1, bucket.overflow_block_count());
        assert_eq!(1, heap.overflow_store().block_count());
        assert_eq!(0, heap.overflow_store().free_block_count());

        for key in [0, 2, 3, 4, 5] {
            assert!(heap.get(0, &Rec::partial(key))?.is_some());
        }
        assert!(heap.get(0, &Rec::partial(1))?.is_none());

        Ok(())
    }

    #[test]
    fn heap_delete_unlinks_empty_block() -> crate::Result<()> {
        let mut heap = heap();
        fill(&mut heap, 0, 0..4)?;

        assert!(heap.delete(0, &Rec::partial(3))?);
        assert!(!heap.delete(0, &Rec::partial(3))?);

        let bucket = heap.load_bucket(0)?;
        assert_eq!(3, bucket.total_element_count());
        assert_eq!(0, bucket.overflow_block_count());
        assert_eq!(None, bucket.first_overflow_block());
        assert_eq!(0, heap.overflow_store().block_count());

        Ok(())
    }

    #[test]
    fn heap_delete_middle_of_chain() -> crate::Result<()> {
        let mut heap = heap();
        fill(&mut heap, 0, 0..9)?;
        assert_eq!(3, heap.load_bucket(0)?.overflow_block_count());

        // Block 1 holds keys 5 and 6
        assert!(heap.delete(0, &Rec::partial(5))?);
        assert!(heap.delete(0, &Rec::partial(6))?);

        let bucket = heap.load_bucket(0)?;
        assert_eq!(7, bucket.total_element_count());
        assert_eq!(2, bucket.overflow_block_count());

        let (records, visited) = heap.collect_with_chain(0, &bucket)?;
        assert_eq!(vec![0, 2], visited);
        assert_eq!(
            vec![0, 1, 2, 3, 4, 7, 8],
            records.iter().map(|r| r.key).collect::<Vec<_>>(),
        );

        Ok(())
    }

    #[test]
    fn heap_free_block_is_reused() -> crate::Result<()> {
        let mut heap = heap();
        fill(&mut heap, 0, 0..4)?;
        fill(&mut heap, 1, 10..14)?;
        assert_eq!(2, heap.overflow_store().block_count());

        let taken = heap.take_all_records(0)?;
        assert_eq!(4, taken.len());
        assert_eq!(1, heap.overflow_store().free_block_count());
        assert_eq!(1, heap.overflow_block_count());

        fill(&mut heap, 1, 14..16)?;

        let bucket = heap.load_bucket(1)?;
        assert_eq!(2, bucket.overflow_block_count());
        assert_eq!(2, heap.overflow_store().block_count());
        assert_eq!(0, heap.overflow_store().free_block_count());

        let (_, visited) = heap.collect_with_chain(1, &bucket)?;
        assert_eq!(vec![1, 0], visited);

        Ok(())
    }

    #[test]
    fn heap_take_all_records_empties_bucket() -> crate::Result<()> {
        let mut heap = heap();
        fill(&mut heap, 0, 0..7)?;

        let records = heap.take_all_records(0)?;
        assert_eq!(7, records.len());

        let bucket = heap.load_bucket(0)?;
        assert!(bucket.is_empty());
        assert_eq!(0, bucket.total_element_count());
        assert_eq!(None, bucket.first_overflow_block());
        assert_eq!(0, heap.overflow_store().block_count());

        Ok(())
    }

    #[test]
    fn heap_clear_overflow_chain_keeps_blocks() -> crate::Result<()> {
        let mut heap = heap();
        fill(&mut heap, 0, 0..5)?;

        heap.clear_overflow_chain(0)?;

        let bucket = heap.load_bucket(0)?;
        assert_eq!(None, bucket.first_overflow_block());
        assert_eq!(0, bucket.overflow_block_count());
        assert_eq!(1, heap.overflow_store().block_count());

        Ok(())
    }

    #[test]
    fn heap_chain_length_mismatch() -> crate::Result<()> {
        let mut heap = heap();
        fill(&mut heap, 0, 0..6)?;

        let mut bucket = heap.load_bucket(0)?;
        bucket.set_overflow_block_count(1);
        heap.write_bucket(0, &bucket)?;

        assert!(matches!(
            heap.get(0, &Rec::partial(100)),
            Err(crate::Error::ChainLengthMismatch {
                address: 0,
                expected: 1,
                traversed: 2,
            })
        ));

        Ok(())
    }

    #[test]
    fn heap_dangling_link() -> crate::Result<()> {
        let mut heap = heap();
        fill(&mut heap, 0, 0..3)?;

        let mut bucket = heap.load_bucket(0)?;
        bucket.set_first_overflow_block(Some(9));
        bucket.set_overflow_block_count(1);
        heap.write_bucket(0, &bucket)?;

        assert!(matches!(
            heap.get(0, &Rec::partial(100)),
            Err(crate::Error::DanglingLink(9))
        ));

        Ok(())
    }
}
