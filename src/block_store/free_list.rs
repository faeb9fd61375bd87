// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::BlockIndex;
use crate::coding::{Decode, Encode};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::collections::BTreeSet;
use std::io::{Read, Write};

/// Set of released block indexes
///
/// The lowest index is reused first, so that the tail of a store
/// empties out and can be truncated.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FreeList(BTreeSet<BlockIndex>);

impl FreeList {
    /// Marks a block as free, returns `false` if it already was.
    pub fn insert(&mut self, idx: BlockIndex) -> bool {
        self.0.insert(idx)
    }

    /// Takes the lowest free block.
    pub fn pop_lowest(&mut self) -> Option<BlockIndex> {
        self.0.pop_first()
    }

    /// Forgets all blocks at or past `count`.
    pub fn truncate(&mut self, count: u32) {
        let _ = self.0.split_off(&count);
    }

    /// Computes the block count after dropping free blocks from the end.
    #[must_use]
    pub fn trimmed_len(&mut self, mut count: u32) -> u32 {
        while count > 0 && self.0.remove(&(count - 1)) {
            count -= 1;
        }
        count
    }

    /// Number of free blocks.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "block indexes are u32")]
    pub fn len(&self) -> u32 {
        self.0.len() as u32
    }

    /// Returns `true` if no block is free.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over free blocks in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = BlockIndex> + '_ {
        self.0.iter().copied()
    }
}

impl Encode for FreeList {
    fn encode_into<W: Write>(&self, writer: &mut W) -> crate::Result<()> {
        writer.write_u32::<BigEndian>(self.len())?;

        for idx in self.iter() {
            writer.write_u32::<BigEndian>(idx)?;
        }

        Ok(())
    }
}

impl Decode for FreeList {
    fn decode_from<R: Read>(reader: &mut R) -> crate::Result<Self> {
        let len = reader.read_u32::<BigEndian>()?;

        let mut set = BTreeSet::new();
        for _ in 0..len {
            set.insert(reader.read_u32::<BigEndian>()?);
        }

        Ok(Self(set))
    }
}
