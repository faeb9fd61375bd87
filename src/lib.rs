// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A disk-oriented implementation of Linear Hashing (Litwin).
//!
//! ##### NOTE
//!
//! > This crate only provides a single-writer hash file, not a storage engine.
//! > It does not ship with a write-ahead log, so a crash in the middle of a split,
//! > merge or shuffle may leave the file inconsistent.
//! > Free lists are only written on flush and on drop, so after a crash an
//! > overflow block taken since the last flush may be handed out again.
//!
//! ##### About
//!
//! This crate exports a `LinearHash` that stores fixed-size records by a 32-bit key.
//!
//! Records live in primary buckets, one fixed-size block per hash address. When a bucket
//! is full, records spill into a singly linked chain of overflow blocks that are allocated
//! from a second block file, reusing released blocks first.
//!
//! Instead of rehashing the whole file at once, the hash file grows one bucket at a time:
//! once there are too many overflow blocks per bucket, the bucket at the split pointer is
//! split in two. Deletes shrink the file again by merging the last bucket into its partner.
//! Addresses stay consistent across growth and shrinkage, because keys below the split
//! pointer are addressed with the hash function of the next level.
//!
//! All blocks use a byte-exact, big-endian layout, see [`Bucket`] and [`OverflowBlock`].

#![deny(clippy::all, clippy::cargo)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

macro_rules! fail_iter {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => return Some(Err(e.into())),
        }
    };
}

mod block_store;
mod checksum;
mod coding;
mod config;

/// Record containers
pub mod container;

mod error;
mod file;

/// Placement of records into buckets and overflow chains
pub mod heap;

mod linear_hash;
mod manifest;
mod record;

pub use {
    block_store::{BlockIndex, BlockStore, FileBlockStore, FreeList, MemoryBlockStore},
    checksum::Checksum,
    coding::{Decode, Encode},
    config::Config,
    container::{Bucket, OverflowBlock, RecordContainer, NO_BLOCK},
    error::{Error, Result},
    heap::{BucketHeap, ChainIter, DeleteOutcome},
    linear_hash::{HashState, Iter, LinearHash, Stats},
    record::Record,
};

#[doc(hidden)]
#[must_use]
#[allow(missing_docs, clippy::missing_errors_doc, clippy::unwrap_used)]
pub fn get_tmp_folder() -> tempfile::TempDir {
    if let Ok(p) = std::env::var("LHF_TMP_FOLDER") {
        tempfile::tempdir_in(p)
    } else {
        tempfile::tempdir()
    }
    .unwrap()
}
