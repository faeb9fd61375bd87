// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{FileBlockStore, LinearHash, MemoryBlockStore, Record};
use std::path::{Path, PathBuf};

const DEFAULT_FILE_FOLDER: &str = ".lhf.data";

/// Hash file configuration builder
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Folder path
    #[doc(hidden)]
    pub path: PathBuf,

    /// Number of primary buckets of a fresh hash file (`M`)
    ///
    /// Once set, the initial bucket count is fixed (in the "manifest" file)
    pub initial_buckets: u32,

    /// Block size of primary buckets
    ///
    /// Once set, the block size is fixed (in the "manifest" file)
    pub main_block_size: u32,

    /// Block size of overflow blocks
    ///
    /// Once set, the block size is fixed (in the "manifest" file)
    pub overflow_block_size: u32,

    /// Overflow ratio above which an insert splits a bucket
    pub split_threshold: f64,

    /// Overflow ratio below which a delete merges a bucket
    pub merge_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: absolute_path(Path::new(DEFAULT_FILE_FOLDER)),
            initial_buckets: 16,
            main_block_size: 4_096,
            overflow_block_size: 1_024,
            split_threshold: 0.8,
            merge_threshold: 0.3,
        }
    }
}

fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

impl Config {
    /// Initializes a new config
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: absolute_path(path.as_ref()),
            ..Default::default()
        }
    }

    /// Sets the number of primary buckets a new hash file starts with.
    ///
    /// The hash file never shrinks below this.
    ///
    /// Defaults to 16.
    #[must_use]
    pub fn initial_buckets(mut self, n: u32) -> Self {
        self.initial_buckets = n;
        self
    }

    /// Sets the block size of primary buckets.
    ///
    /// Defaults to 4 KiB.
    #[must_use]
    pub fn main_block_size(mut self, bytes: u32) -> Self {
        self.main_block_size = bytes;
        self
    }

    /// Sets the block size of overflow blocks.
    ///
    /// Defaults to 1 KiB.
    #[must_use]
    pub fn overflow_block_size(mut self, bytes: u32) -> Self {
        self.overflow_block_size = bytes;
        self
    }

    /// Sets the ratio of overflow blocks to primary buckets above which
    /// a bucket is split.
    ///
    /// Defaults to 0.8.
    #[must_use]
    pub fn split_threshold(mut self, ratio: f64) -> Self {
        self.split_threshold = ratio;
        self
    }

    /// Sets the ratio of overflow blocks to primary buckets below which
    /// a bucket is merged.
    ///
    /// Defaults to 0.3.
    #[must_use]
    pub fn merge_threshold(mut self, ratio: f64) -> Self {
        self.merge_threshold = ratio;
        self
    }

    pub(crate) fn validate(&self) -> crate::Result<()> {
        if self.initial_buckets == 0 {
            return Err(crate::Error::InvalidConfig("initial bucket count is zero"));
        }

        if !self.split_threshold.is_finite() || !self.merge_threshold.is_finite() {
            return Err(crate::Error::InvalidConfig("thresholds must be finite"));
        }

        if self.merge_threshold < 0.0 || self.merge_threshold >= self.split_threshold {
            return Err(crate::Error::InvalidConfig(
                "merge threshold must be in 0..split threshold",
            ));
        }

        Ok(())
    }

    /// Opens a hash file using the config.
    ///
    /// An existing hash file keeps its persisted layout (initial bucket
    /// count and block sizes), the thresholds are taken from the config.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, the layout is invalid, or
    /// the hash file stores records of a different size.
    pub fn open<R: Record>(self) -> crate::Result<LinearHash<R, FileBlockStore>> {
        LinearHash::open(self)
    }

    /// Creates a hash file that lives in memory.
    ///
    /// The path is ignored.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the layout is invalid.
    pub fn open_in_memory<R: Record>(self) -> crate::Result<LinearHash<R, MemoryBlockStore>> {
        LinearHash::in_memory(&self)
    }
}
