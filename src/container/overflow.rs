// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{
    decode_count, decode_link, decode_slots, encode_count, encode_link, encode_slots, is_zeroed,
    pad_to_block, split_block, RecordContainer,
};
use crate::{BlockIndex, Record};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

/// Overflow block, a link in the singly linked chain of a bucket
///
/// ```text
/// [slot 0 .. slot bf-1][next overflow block: i32][valid count: i32][zero padding]
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OverflowBlock<R> {
    records: Vec<R>,
    capacity: usize,
    next_overflow_block: Option<BlockIndex>,
}

impl<R: Record> RecordContainer for OverflowBlock<R> {
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

impl<R: Record> OverflowBlock<R> {
    /// Size of the trailing metadata in bytes.
    pub const METADATA_LEN: usize = 2 * std::mem::size_of::<i32>();

    /// Smallest block size that holds `capacity` records.
    #[must_use]
    pub fn block_size_for(capacity: usize) -> usize {
        capacity * R::ENCODED_LEN + Self::METADATA_LEN
    }

    /// Creates an empty, unlinked overflow block.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
            next_overflow_block: None,
        }
    }

    /// Index of the next block in the chain, if any.
    #[must_use]
    pub fn next_overflow_block(&self) -> Option<BlockIndex> {
        self.next_overflow_block
    }

    pub(crate) fn set_next_overflow_block(&mut self, idx: Option<BlockIndex>) {
        self.next_overflow_block = idx;
    }

    /// Encodes the block into a zero-padded block.
    ///
    /// # Errors
    ///
    /// Returns error, if the block does not fit into `block_size` bytes.
    pub fn encode_block(&self, block_size: usize) -> crate::Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(block_size);

        encode_slots(&self.records, self.capacity, &mut bytes)?;

        bytes.write_i32::<BigEndian>(encode_link(self.next_overflow_block)?)?;
        bytes.write_i32::<BigEndian>(encode_count(self.records.len())?)?;

        pad_to_block(bytes, block_size)
    }

    /// Decodes an overflow block.
    ///
    /// # Errors
    ///
    /// Returns error, if the block is malformed.
    pub fn decode_block(bytes: &[u8], capacity: usize) -> crate::Result<Self> {
        if is_zeroed(bytes) {
            return Ok(Self::new(capacity));
        }

        let (slots, mut trailer) = split_block(
            bytes,
            capacity,
            R::ENCODED_LEN,
            Self::METADATA_LEN,
            "OverflowBlock",
        )?;

        let next_overflow_block = trailer.read_i32::<BigEndian>()?;
        let valid_count = trailer.read_i32::<BigEndian>()?;

        let valid_count = decode_count(valid_count, "OverflowBlock")? as usize;
        if valid_count > capacity {
            return Err(crate::Error::InvalidHeader("OverflowBlock"));
        }

        Ok(Self {
            records: decode_slots(slots, valid_count)?,
            capacity,
            next_overflow_block: decode_link(next_overflow_block, "OverflowBlock")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::test_support::Rec;
    use test_log::test;

    #[test]
    fn overflow_block_roundtrip() -> crate::Result<()> {
        for (count, next) in [(0, None), (1, Some(0)), (2, Some(42)), (2, None)] {
            let mut block = OverflowBlock::new(2);
            for key in 0..count {
                block.add_record(Rec::new(-key));
            }
            block.set_next_overflow_block(next);

            let bytes = block.encode_block(40)?;
            assert_eq!(40, bytes.len());
            assert_eq!(block, OverflowBlock::decode_block(&bytes, 2)?);
        }

        Ok(())
    }

    #[test]
    fn overflow_block_padding() -> crate::Result<()> {
        let block = OverflowBlock::<Rec>::new(2);
        let bytes = block.encode_block(128)?;

        assert_eq!(128, bytes.len());
        assert!(bytes.iter().skip(40).all(|&b| b == 0));
        assert_eq!(block, OverflowBlock::decode_block(&bytes, 2)?);

        Ok(())
    }

    #[test]
    fn overflow_block_truncated() {
        assert!(matches!(
            OverflowBlock::<Rec>::decode_block(&[1; 20], 2),
            Err(crate::Error::InvalidHeader("OverflowBlock"))
        ));
    }
}
