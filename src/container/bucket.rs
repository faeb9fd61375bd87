// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{
    decode_count, decode_link, decode_slots, encode_count, encode_link, encode_slots, is_zeroed,
    pad_to_block, split_block, RecordContainer,
};
use crate::{BlockIndex, Record};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

/// Primary bucket, one per hash address
///
/// ```text
/// [slot 0 .. slot bf-1][overflow block count: i32][total element count: i32]
/// [first overflow block: i32][valid count: i32][zero padding]
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Bucket<R> {
    records: Vec<R>,
    capacity: usize,

    /// Number of overflow blocks chained to this bucket
    overflow_block_count: u32,

    /// Records in the bucket and its entire chain
    total_element_count: u32,

    /// Head of the overflow chain
    first_overflow_block: Option<BlockIndex>,
}

impl<R: Record> RecordContainer for Bucket<R> {
    type Record = R;

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn valid_records(&self) -> &[R] {
        &self.records
    }

    fn slots_mut(&mut self) -> &mut Vec<R> {
        &mut self.records
    }
}

impl<R: Record> Bucket<R> {
    /// Size of the trailing metadata in bytes.
    pub const METADATA_LEN: usize = 4 * std::mem::size_of::<i32>();

    /// Smallest block size that holds `capacity` records.
    #[must_use]
    pub fn block_size_for(capacity: usize) -> usize {
        capacity * R::ENCODED_LEN + Self::METADATA_LEN
    }

    /// Creates an empty bucket without overflow chain.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
            overflow_block_count: 0,
            total_element_count: 0,
            first_overflow_block: None,
        }
    }

    /// Number of overflow blocks chained to this bucket.
    #[must_use]
    pub fn overflow_block_count(&self) -> u32 {
        self.overflow_block_count
    }

    /// Number of records in the bucket and its entire chain.
    #[must_use]
    pub fn total_element_count(&self) -> u32 {
        self.total_element_count
    }

    /// Index of the first overflow block, if any.
    #[must_use]
    pub fn first_overflow_block(&self) -> Option<BlockIndex> {
        self.first_overflow_block
    }

    pub(crate) fn set_overflow_block_count(&mut self, count: u32) {
        self.overflow_block_count = count;
    }

    pub(crate) fn set_total_element_count(&mut self, count: u32) {
        self.total_element_count = count;
    }

    pub(crate) fn set_first_overflow_block(&mut self, idx: Option<BlockIndex>) {
        self.first_overflow_block = idx;
    }

    /// Forgets the overflow chain, leaving the overflow blocks untouched.
    pub(crate) fn clear_overflow_chain(&mut self) {
        self.first_overflow_block = None;
        self.overflow_block_count = 0;
    }

    /// Encodes the bucket into a zero-padded block.
    ///
    /// # Errors
    ///
    /// Returns error, if the bucket does not fit into `block_size` bytes.
    pub fn encode_block(&self, block_size: usize) -> crate::Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(block_size);

        encode_slots(&self.records, self.capacity, &mut bytes)?;

        bytes.write_i32::<BigEndian>(encode_count(self.overflow_block_count as usize)?)?;
        bytes.write_i32::<BigEndian>(encode_count(self.total_element_count as usize)?)?;
        bytes.write_i32::<BigEndian>(encode_link(self.first_overflow_block)?)?;
        bytes.write_i32::<BigEndian>(encode_count(self.records.len())?)?;

        pad_to_block(bytes, block_size)
    }

    /// Decodes a bucket from a block.
    ///
    /// An all-zero block is a bucket that was never written.
    ///
    /// # Errors
    ///
    /// Returns error, if the block is malformed.
    pub fn decode_block(bytes: &[u8], capacity: usize) -> crate::Result<Self> {
        if is_zeroed(bytes) {
            return Ok(Self::new(capacity));
        }

        let (slots, mut trailer) =
            split_block(bytes, capacity, R::ENCODED_LEN, Self::METADATA_LEN, "Bucket")?;

        let overflow_block_count = trailer.read_i32::<BigEndian>()?;
        let total_element_count = trailer.read_i32::<BigEndian>()?;
        let first_overflow_block = trailer.read_i32::<BigEndian>()?;
        let valid_count = trailer.read_i32::<BigEndian>()?;

        let valid_count = decode_count(valid_count, "Bucket")? as usize;
        if valid_count > capacity {
            return Err(crate::Error::InvalidHeader("Bucket"));
        }

        Ok(Self {
            records: decode_slots(slots, valid_count)?,
            capacity,
            overflow_block_count: decode_count(overflow_block_count, "Bucket")?,
            total_element_count: decode_count(total_element_count, "Bucket")?,
            first_overflow_block: decode_link(first_overflow_block, "Bucket")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{container::NO_BLOCK, record::test_support::Rec};
    use test_log::test;

    const BLOCK_SIZE: usize = 64;

    #[test]
    fn bucket_roundtrip() -> crate::Result<()> {
        for count in 0..=3 {
            let mut bucket = Bucket::new(3);
            for key in 0..count {
                bucket.add_record(Rec::new(key));
            }
            bucket.set_overflow_block_count(2);
            bucket.set_total_element_count(7);
            bucket.set_first_overflow_block(Some(11));

            let bytes = bucket.encode_block(BLOCK_SIZE)?;
            assert_eq!(BLOCK_SIZE, bytes.len());
            assert_eq!(bucket, Bucket::decode_block(&bytes, 3)?);
        }

        Ok(())
    }

    #[test]
    fn bucket_layout() -> crate::Result<()> {
        let mut bucket = Bucket::new(3);
        bucket.add_record(Rec::new(1));
        bucket.set_total_element_count(1);

        // 3 slots + 16 bytes metadata + 4 bytes padding
        let bytes = bucket.encode_block(68)?;

        assert_eq!(&1_i32.to_be_bytes(), bytes.get(0..4).unwrap_or_default());
        assert!(bytes.get(16..48).unwrap_or_default().iter().all(|&b| b == 0));
        assert_eq!(&0_i32.to_be_bytes(), bytes.get(48..52).unwrap_or_default());
        assert_eq!(&1_i32.to_be_bytes(), bytes.get(52..56).unwrap_or_default());
        assert_eq!(&NO_BLOCK.to_be_bytes(), bytes.get(56..60).unwrap_or_default());
        assert_eq!(&1_i32.to_be_bytes(), bytes.get(60..64).unwrap_or_default());
        assert_eq!(&[0; 4], bytes.get(64..68).unwrap_or_default());

        Ok(())
    }

    #[test]
    fn bucket_zeroed_block_is_empty() -> crate::Result<()> {
        let bucket = Bucket::<Rec>::decode_block(&[0; BLOCK_SIZE], 3)?;
        assert!(bucket.is_empty());
        assert_eq!(None, bucket.first_overflow_block());
        assert_eq!(0, bucket.total_element_count());
        Ok(())
    }

    #[test]
    fn bucket_zeroed_slot_is_absent() -> crate::Result<()> {
        let mut bucket = Bucket::new(3);
        bucket.add_record(Rec::new(1));
        bucket.add_record(Rec::new(2));
        let mut bytes = bucket.encode_block(BLOCK_SIZE)?;

        // Wipe the first slot but keep the valid count at 2
        bytes.iter_mut().take(16).for_each(|b| *b = 0);

        let decoded = Bucket::<Rec>::decode_block(&bytes, 3)?;
        assert_eq!(&[Rec::new(2)], decoded.valid_records());

        Ok(())
    }

    #[test]
    fn bucket_invalid_valid_count() -> crate::Result<()> {
        let bucket = Bucket::<Rec>::new(3);
        let mut bytes = bucket.encode_block(BLOCK_SIZE)?;

        if let Some(valid) = bytes.get_mut(60..64) {
            valid.copy_from_slice(&4_i32.to_be_bytes());
        }

        assert!(matches!(
            Bucket::<Rec>::decode_block(&bytes, 3),
            Err(crate::Error::InvalidHeader("Bucket"))
        ));

        Ok(())
    }

    #[test]
    fn bucket_does_not_fit() {
        let bucket = Bucket::<Rec>::new(3);
        assert!(matches!(
            bucket.encode_block(63),
            Err(crate::Error::BlockTooSmall {
                block_size: 63,
                required: 64
            })
        ));
    }
}
