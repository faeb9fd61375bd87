// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Fixed-capacity record containers (primary buckets and overflow blocks)

mod bucket;
mod overflow;

pub use bucket::Bucket;
pub use overflow::OverflowBlock;

use crate::{
    record::{decode_slot, encode_slot},
    BlockIndex, Record,
};

/// Link value that marks "no block"
pub const NO_BLOCK: i32 = -1;

/// Shared behaviour of [`Bucket`] and [`OverflowBlock`]
///
/// A container holds up to [`RecordContainer::capacity`] records. Valid
/// records are always stored contiguously from the first slot.
pub trait RecordContainer {
    /// Record type stored in the container
    type Record: Record;

    /// Maximum number of records (the blocking factor).
    fn capacity(&self) -> usize;

    /// Returns all valid records.
    fn valid_records(&self) -> &[Self::Record];

    #[doc(hidden)]
    fn slots_mut(&mut self) -> &mut Vec<Self::Record>;

    /// Number of valid records.
    fn valid_count(&self) -> usize {
        self.valid_records().len()
    }

    /// Returns `true` if no further record fits.
    fn is_full(&self) -> bool {
        self.valid_count() >= self.capacity()
    }

    /// Returns `true` if the container holds no record.
    fn is_empty(&self) -> bool {
        self.valid_records().is_empty()
    }

    /// Appends a record.
    ///
    /// Returns `false` (and leaves the container untouched) if it is full.
    fn add_record(&mut self, record: Self::Record) -> bool {
        if self.is_full() {
            return false;
        }
        self.slots_mut().push(record);
        true
    }

    /// Removes all records, returning how many were removed.
    fn delete_all_records(&mut self) -> usize {
        let slots = self.slots_mut();
        let count = slots.len();
        slots.clear();
        count
    }

    /// Finds the record with the same key as `partial`.
    fn get_record(&self, partial: &Self::Record) -> Option<&Self::Record> {
        self.valid_records().iter().find(|r| r.same_key(partial))
    }

    /// Removes the record with the same key as `partial`.
    ///
    /// The remaining records are shifted down to stay contiguous.
    fn remove_record(&mut self, partial: &Self::Record) -> Option<Self::Record> {
        let slots = self.slots_mut();
        let idx = slots.iter().position(|r| r.same_key(partial))?;
        Some(slots.remove(idx))
    }

    /// Replaces the record with the same key, returning the old one.
    fn replace_record(&mut self, record: Self::Record) -> Option<Self::Record> {
        let slot = self
            .slots_mut()
            .iter_mut()
            .find(|r| r.same_key(&record))?;
        Some(std::mem::replace(slot, record))
    }
}

/// Computes how many records fit into a block next to its metadata.
pub(crate) fn blocking_factor(
    block_size: usize,
    record_len: usize,
    metadata_len: usize,
) -> crate::Result<usize> {
    assert!(record_len > 0, "records may not be zero-sized");

    let required = metadata_len + record_len;

    if block_size < required {
        return Err(crate::Error::BlockTooSmall {
            block_size,
            required,
        });
    }

    Ok((block_size - metadata_len) / record_len)
}

pub(crate) fn encode_slots<R: Record>(
    records: &[R],
    capacity: usize,
    out: &mut Vec<u8>,
) -> crate::Result<()> {
    debug_assert!(records.len() <= capacity);

    for record in records {
        encode_slot(record, out)?;
    }

    let empty_slots = capacity.saturating_sub(records.len());
    out.resize(out.len() + empty_slots * R::ENCODED_LEN, 0);

    Ok(())
}

pub(crate) fn decode_slots<R: Record>(
    slots: &[u8],
    valid_count: usize,
) -> crate::Result<Vec<R>> {
    let mut records = Vec::with_capacity(valid_count);

    // NOTE: An all-zero slot inside the valid range is treated as empty
    for slot in slots.chunks_exact(R::ENCODED_LEN).take(valid_count) {
        if let Some(record) = decode_slot(slot)? {
            records.push(record);
        }
    }

    Ok(records)
}

/// Zero-pads an encoded container to the block size.
pub(crate) fn pad_to_block(mut bytes: Vec<u8>, block_size: usize) -> crate::Result<Vec<u8>> {
    if bytes.len() > block_size {
        log::error!(
            "Encoded container needs {} bytes, but blocks are {block_size} bytes",
            bytes.len()
        );
        return Err(crate::Error::BlockTooSmall {
            block_size,
            required: bytes.len(),
        });
    }

    bytes.resize(block_size, 0);
    Ok(bytes)
}

pub(crate) fn encode_link(link: Option<BlockIndex>) -> crate::Result<i32> {
    match link {
        None => Ok(NO_BLOCK),
        Some(idx) => i32::try_from(idx).map_err(|_| crate::Error::DanglingLink(idx)),
    }
}

pub(crate) fn decode_link(raw: i32, what: &'static str) -> crate::Result<Option<BlockIndex>> {
    match raw {
        NO_BLOCK => Ok(None),
        idx if idx >= 0 => Ok(Some(idx.unsigned_abs())),
        _ => Err(crate::Error::InvalidHeader(what)),
    }
}

pub(crate) fn encode_count(count: usize) -> crate::Result<i32> {
    i32::try_from(count).map_err(|_| crate::Error::InvalidHeader("count exceeds i32"))
}

pub(crate) fn decode_count(raw: i32, what: &'static str) -> crate::Result<u32> {
    u32::try_from(raw).map_err(|_| crate::Error::InvalidHeader(what))
}

/// Splits a block into its slot area and trailer.
pub(crate) fn split_block<'a>(
    bytes: &'a [u8],
    capacity: usize,
    record_len: usize,
    metadata_len: usize,
    what: &'static str,
) -> crate::Result<(&'a [u8], &'a [u8])> {
    let slots_len = capacity * record_len;

    if bytes.len() < slots_len + metadata_len {
        return Err(crate::Error::InvalidHeader(what));
    }

    let (slots, rest) = bytes.split_at(slots_len);
    let (trailer, _padding) = rest.split_at(metadata_len);

    Ok((slots, trailer))
}

pub(crate) fn is_zeroed(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::test_support::Rec;
    use test_log::test;

    #[test]
    fn blocking_factor_rounds_down() -> crate::Result<()> {
        assert_eq!(3, blocking_factor(64, 16, 16)?);
        assert_eq!(3, blocking_factor(79, 16, 16)?);
        assert_eq!(4, blocking_factor(80, 16, 16)?);
        assert_eq!(2, blocking_factor(40, 16, 8)?);
        Ok(())
    }

    #[test]
    fn blocking_factor_too_small() {
        assert!(matches!(
            blocking_factor(31, 16, 16),
            Err(crate::Error::BlockTooSmall {
                block_size: 31,
                required: 32
            })
        ));
    }

    #[test]
    fn container_add_until_full() {
        let mut bucket = Bucket::<Rec>::new(2);
        assert!(bucket.add_record(Rec::new(1)));
        assert!(bucket.add_record(Rec::new(2)));
        assert!(!bucket.add_record(Rec::new(3)));
        assert_eq!(2, bucket.valid_count());
        assert!(bucket.get_record(&Rec::partial(3)).is_none());
    }

    #[test]
    fn container_remove_keeps_order() {
        let mut block = OverflowBlock::<Rec>::new(3);
        block.add_record(Rec::new(1));
        block.add_record(Rec::new(2));
        block.add_record(Rec::new(3));

        assert_eq!(Some(Rec::new(2)), block.remove_record(&Rec::partial(2)));
        assert_eq!(None, block.remove_record(&Rec::partial(2)));

        let keys = block.valid_records().iter().map(|r| r.key).collect::<Vec<_>>();
        assert_eq!(vec![1, 3], keys);
    }

    #[test]
    fn container_replace_and_delete_all() {
        let mut bucket = Bucket::<Rec>::new(3);
        bucket.add_record(Rec::new(5));
        bucket.add_record(Rec::new(6));

        let mut updated = Rec::new(5);
        updated.payload[0] = 0xFF;

        assert_eq!(Some(Rec::new(5)), bucket.replace_record(updated.clone()));
        assert_eq!(Some(&updated), bucket.get_record(&Rec::partial(5)));
        assert!(bucket.replace_record(Rec::new(7)).is_none());

        assert_eq!(2, bucket.delete_all_records());
        assert!(bucket.is_empty());
    }

    #[test]
    fn link_coding() -> crate::Result<()> {
        assert_eq!(NO_BLOCK, encode_link(None)?);
        assert_eq!(7, encode_link(Some(7))?);
        assert_eq!(None, decode_link(NO_BLOCK, "test")?);
        assert_eq!(Some(7), decode_link(7, "test")?);
        assert!(decode_link(-2, "test").is_err());
        Ok(())
    }
}
