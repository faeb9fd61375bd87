// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{Decode, Encode};

/// A fixed-size record that can be stored in a hash file
///
/// Records are identified by a 32-bit hash key. Two records with the
/// same key are considered the same record, so a "partial" record that
/// only carries the key can be used for lookups and deletes.
///
/// The encoding must always produce exactly [`Record::ENCODED_LEN`] bytes.
///
/// ##### Empty slots
///
/// A slot whose encoded bytes are all zero is read back as an empty slot.
/// Record types whose encoding can legitimately be all zero should reserve
/// a non-zero marker byte.
pub trait Record: Encode + Decode + Clone + std::fmt::Debug {
    /// Size of the encoded record in bytes
    const ENCODED_LEN: usize;

    /// Returns the key the record is hashed by.
    fn hash_key(&self) -> i32;

    /// Returns `true` if both records have the same key.
    fn same_key(&self, other: &Self) -> bool;
}

/// Encodes a record into a slot, checking its declared length.
pub(crate) fn encode_slot<R: Record>(record: &R, out: &mut Vec<u8>) -> crate::Result<()> {
    let start = out.len();
    record.encode_into(out)?;

    let got = out.len() - start;
    if got != R::ENCODED_LEN {
        log::error!(
            "Record {record:?} encoded to {got} bytes, expected {}",
            R::ENCODED_LEN
        );
        return Err(crate::Error::RecordLength {
            expected: R::ENCODED_LEN,
            got,
        });
    }

    Ok(())
}

/// Decodes a slot, returning `None` for an all-zero (empty) slot.
pub(crate) fn decode_slot<R: Record>(slot: &[u8]) -> crate::Result<Option<R>> {
    if slot.iter().all(|&b| b == 0) {
        return Ok(None);
    }

    let mut reader = slot;
    R::decode_from(&mut reader).map(Some)
}
