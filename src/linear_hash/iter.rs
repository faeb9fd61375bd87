// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::LinearHash;
use crate::{BlockIndex, BlockStore, Record};

/// Iterator over every record of a hash file
///
/// Records are returned bucket by bucket, each bucket followed by its
/// overflow chain.
pub struct Iter<'a, R, S> {
    hash: &'a LinearHash<R, S>,
    next_address: BlockIndex,
    buffer: std::vec::IntoIter<R>,
}

impl<'a, R, S> Iter<'a, R, S> {
    pub(super) fn new(hash: &'a LinearHash<R, S>) -> Self {
        Self {
            hash,
            next_address: 0,
            buffer: Vec::new().into_iter(),
        }
    }
}

impl<R: Record, S: BlockStore> Iterator for Iter<'_, R, S> {
    type Item = crate::Result<R>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.next() {
                return Some(Ok(record));
            }

            fail_iter!(self.hash.check_poisoned());

            if self.next_address >= self.hash.bucket_count() {
                return None;
            }

            let address = self.next_address;
            self.next_address += 1;

            let heap = self.hash.heap();
            let records = fail_iter!(self.hash.poison_on(
                heap.load_bucket(address)
                    .and_then(|bucket| heap.collect_all_records(address, &bucket))
            ));

            self.buffer = records.into_iter();
        }
    }
}
