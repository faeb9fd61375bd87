// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{BlockIndex, Checksum};

/// Represents errors that can occur in the hash file
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// Invalid or corrupted block/file header
    InvalidHeader(&'static str),

    /// Invalid or unparseable data format version
    InvalidVersion(u8),

    /// Invalid checksum value
    ChecksumMismatch {
        /// Checksum of the data that was read
        got: Checksum,

        /// Checksum that was stored
        expected: Checksum,
    },

    /// A block cannot fit its metadata and at least one record
    BlockTooSmall {
        /// Configured block size
        block_size: usize,

        /// Minimum block size for one record
        required: usize,
    },

    /// A record encoded to an unexpected number of bytes
    RecordLength {
        /// Declared encoded length of the record type
        expected: usize,

        /// Bytes actually produced
        got: usize,
    },

    /// The configuration is invalid or does not match the persisted hash file
    InvalidConfig(&'static str),

    /// An overflow link points outside of the overflow store
    DanglingLink(BlockIndex),

    /// The overflow chain of a bucket is not as long as its bucket claims
    ChainLengthMismatch {
        /// Bucket address
        address: BlockIndex,

        /// Block count stored in the bucket
        expected: u32,

        /// Blocks actually traversed
        traversed: u32,
    },

    /// Compacting a bucket did not preserve its record count
    ShuffleCountMismatch {
        /// Bucket address
        address: BlockIndex,

        /// Record count stored in the bucket
        expected: usize,

        /// Records collected from bucket and chain
        got: usize,
    },

    /// A previous operation hit a broken invariant, the hash file refuses further work
    Poisoned,
}

impl Error {
    /// Returns `true` if the error signals a broken structural invariant.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::ChainLengthMismatch { .. }
                | Self::ShuffleCountMismatch { .. }
                | Self::DanglingLink(_)
                | Self::RecordLength { .. }
        )
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LinearHashError: {self:?}")
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Hash file result
pub type Result<T> = std::result::Result<T, Error>;
