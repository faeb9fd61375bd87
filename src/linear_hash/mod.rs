// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

mod iter;
mod state;

pub use iter::Iter;
pub use state::HashState;

use crate::{
    coding::{Decode, Encode},
    container::{blocking_factor, Bucket, OverflowBlock},
    heap::BucketHeap,
    manifest::{Manifest, FORMAT_VERSION},
    BlockIndex, BlockStore, Config, FileBlockStore, MemoryBlockStore, Record,
};
use std::sync::atomic::{AtomicBool, Ordering};

/// Point-in-time numbers of a hash file
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Stats {
    /// Number of completed doublings
    pub level: u32,

    /// Next bucket to be split
    pub split_pointer: u32,

    /// Number of primary buckets
    pub bucket_count: u32,

    /// Overflow blocks in use
    pub overflow_blocks: u32,

    /// Overflow blocks including free ones
    pub overflow_blocks_total: u32,

    /// Overflow blocks in use per primary bucket
    pub overflow_ratio: f64,
}

/// A linear hash file
///
/// Grows one bucket at a time when the overflow chains get too long, and
/// shrinks again when they get short.
///
/// # Examples
///
/// ```
/// # use linear_hash::{Config, Decode, Encode, Record};
/// # use std::io::{Read, Write};
/// #[derive(Clone, Debug, PartialEq)]
/// struct Counter {
///     id: i32,
///     hits: u32,
/// }
///
/// impl Encode for Counter {
///     fn encode_into<W: Write>(&self, writer: &mut W) -> linear_hash::Result<()> {
///         // Leading marker keeps the slot from being all zero
///         writer.write_all(&[1])?;
///         writer.write_all(&self.id.to_be_bytes())?;
///         writer.write_all(&self.hits.to_be_bytes())?;
///         Ok(())
///     }
/// }
///
/// impl Decode for Counter {
///     fn decode_from<R: Read>(reader: &mut R) -> linear_hash::Result<Self> {
///         let mut marker = [0; 1];
///         reader.read_exact(&mut marker)?;
///         let mut buf = [0; 4];
///         reader.read_exact(&mut buf)?;
///         let id = i32::from_be_bytes(buf);
///         reader.read_exact(&mut buf)?;
///         let hits = u32::from_be_bytes(buf);
///         Ok(Self { id, hits })
///     }
/// }
///
/// impl Record for Counter {
///     const ENCODED_LEN: usize = 9;
///
///     fn hash_key(&self) -> i32 {
///         self.id
///     }
///
///     fn same_key(&self, other: &Self) -> bool {
///         self.id == other.id
///     }
/// }
///
/// # let folder = tempfile::tempdir()?;
/// let mut hash = Config::new(folder).open::<Counter>()?;
///
/// hash.insert(Counter { id: 7, hits: 1 })?;
/// hash.update(Counter { id: 7, hits: 2 })?;
///
/// let lookup = Counter { id: 7, hits: 0 };
/// assert_eq!(Some(2), hash.get(&lookup)?.map(|c| c.hits));
///
/// assert!(hash.delete(&lookup)?);
/// assert!(hash.is_empty()?);
/// #
/// # Ok::<(), linear_hash::Error>(())
/// ```
pub struct LinearHash<R, S> {
    heap: BucketHeap<R, S>,
    state: HashState,
    split_threshold: f64,
    merge_threshold: f64,
    poisoned: AtomicBool,
}

impl<R, S: std::fmt::Debug> std::fmt::Debug for LinearHash<R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearHash")
            .field("state", &self.state)
            .field("heap", &self.heap)
            .field("poisoned", &self.poisoned.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<R: Record> LinearHash<R, FileBlockStore> {
    pub(crate) fn open(config: Config) -> crate::Result<Self> {
        use crate::file::MANIFEST_FILE;

        log::debug!("Opening hash file at {}", config.path.display());

        config.validate()?;

        if config.path.join(MANIFEST_FILE).try_exists()? {
            Self::recover(config)
        } else {
            Self::create_new(config)
        }
    }

    fn recover(mut config: Config) -> crate::Result<Self> {
        use crate::file::MANIFEST_FILE;

        log::info!("Recovering hash file at {}", config.path.display());

        let bytes = std::fs::read(config.path.join(MANIFEST_FILE))?;
        let manifest = Manifest::decode_from(&mut bytes.as_slice())?;

        if manifest.record_len as usize != R::ENCODED_LEN {
            log::error!(
                "Hash file stores {}-byte records, cannot open it with {}-byte records",
                manifest.record_len,
                R::ENCODED_LEN,
            );
            return Err(crate::Error::RecordLength {
                expected: manifest.record_len as usize,
                got: R::ENCODED_LEN,
            });
        }

        // IMPORTANT: Restore persisted layout
        config.initial_buckets = manifest.initial_buckets;
        config.main_block_size = manifest.main_block_size;
        config.overflow_block_size = manifest.overflow_block_size;

        let (main, overflow) = Self::open_stores(&config)?;
        let hash = Self::from_stores(&config, main, overflow)?;

        log::debug!(
            "Recovered hash file with {} buckets (level={}, split pointer={})",
            hash.bucket_count(),
            hash.level(),
            hash.split_pointer(),
        );

        Ok(hash)
    }

    fn create_new(config: Config) -> crate::Result<Self> {
        use crate::file::{fsync_directory, MANIFEST_FILE};
        use std::fs::{create_dir_all, File};

        let path = config.path.clone();
        log::trace!("Creating hash file at {}", path.display());

        let record_len = u32::try_from(R::ENCODED_LEN)
            .map_err(|_| crate::Error::InvalidConfig("record too large"))?;

        create_dir_all(&path)?;

        let manifest_path = path.join(MANIFEST_FILE);
        assert!(!manifest_path.try_exists()?);

        let (main, overflow) = Self::open_stores(&config)?;
        let mut hash = Self::from_stores(&config, main, overflow)?;
        hash.flush()?;

        // NOTE: Lastly, fsync the manifest
        // -> the hash file is fully initialized
        let mut file = File::create_new(manifest_path)?;
        Manifest {
            version: FORMAT_VERSION,
            initial_buckets: config.initial_buckets,
            main_block_size: config.main_block_size,
            overflow_block_size: config.overflow_block_size,
            record_len,
        }
        .encode_into(&mut file)?;
        file.sync_all()?;

        // IMPORTANT: fsync folder on Unix
        fsync_directory(&path)?;

        Ok(hash)
    }

    fn open_stores(config: &Config) -> crate::Result<(FileBlockStore, FileBlockStore)> {
        use crate::file::{BUCKETS_FILE, OVERFLOW_FILE};

        let (main_block_size, main_bf, overflow_block_size, overflow_bf) = layout::<R>(config)?;

        let main = FileBlockStore::open(config.path.join(BUCKETS_FILE), main_block_size, main_bf)?;
        let overflow = FileBlockStore::open(
            config.path.join(OVERFLOW_FILE),
            overflow_block_size,
            overflow_bf,
        )?;

        Ok((main, overflow))
    }

    /// Returns the disk space usage of the block files.
    #[must_use]
    pub fn disk_space(&self) -> u64 {
        self.heap.main_store().disk_space() + self.heap.overflow_store().disk_space()
    }
}

impl<R: Record> LinearHash<R, MemoryBlockStore> {
    pub(crate) fn in_memory(config: &Config) -> crate::Result<Self> {
        config.validate()?;

        let (main_block_size, main_bf, overflow_block_size, overflow_bf) = layout::<R>(config)?;

        Self::from_stores(
            config,
            MemoryBlockStore::new(main_block_size, main_bf),
            MemoryBlockStore::new(overflow_block_size, overflow_bf),
        )
    }
}

/// Block sizes and blocking factors of both stores.
fn layout<R: Record>(config: &Config) -> crate::Result<(usize, usize, usize, usize)> {
    let main_block_size = config.main_block_size as usize;
    let overflow_block_size = config.overflow_block_size as usize;

    let main_bf = blocking_factor(main_block_size, R::ENCODED_LEN, Bucket::<R>::METADATA_LEN)?;
    let overflow_bf = blocking_factor(
        overflow_block_size,
        R::ENCODED_LEN,
        OverflowBlock::<R>::METADATA_LEN,
    )?;

    log::trace!(
        "{} records per bucket, {} records per overflow block",
        main_bf,
        overflow_bf,
    );

    Ok((main_block_size, main_bf, overflow_block_size, overflow_bf))
}

fn check_store<S: BlockStore>(store: &S, required: usize) -> crate::Result<()> {
    if store.blocking_factor() == 0 {
        return Err(crate::Error::InvalidConfig("blocking factor is zero"));
    }

    if store.block_size() < required {
        return Err(crate::Error::BlockTooSmall {
            block_size: store.block_size(),
            required,
        });
    }

    Ok(())
}

impl<R: Record, S: BlockStore> LinearHash<R, S> {
    /// Creates a hash file on top of two block stores.
    ///
    /// An empty main store is initialized with the configured number of
    /// buckets, otherwise level and split pointer are derived from its
    /// block count.
    ///
    /// # Errors
    ///
    /// Returns error, if the config is invalid, the stores cannot hold
    /// their blocking factor of records, or an IO error occurred.
    pub fn from_stores(config: &Config, main: S, overflow: S) -> crate::Result<Self> {
        config.validate()?;

        check_store(&main, Bucket::<R>::block_size_for(main.blocking_factor()))?;
        check_store(
            &overflow,
            OverflowBlock::<R>::block_size_for(overflow.blocking_factor()),
        )?;

        let mut heap = BucketHeap::new(main, overflow);

        if heap.main_block_count() == 0 {
            heap.extend_main_to(config.initial_buckets)?;
        }

        let state = HashState::from_bucket_count(config.initial_buckets, heap.main_block_count())?;

        Ok(Self {
            heap,
            state,
            split_threshold: config.split_threshold,
            merge_threshold: config.merge_threshold,
            poisoned: AtomicBool::new(false),
        })
    }

    pub(crate) fn check_poisoned(&self) -> crate::Result<()> {
        if self.poisoned.load(Ordering::Relaxed) {
            Err(crate::Error::Poisoned)
        } else {
            Ok(())
        }
    }

    /// Poisons the hash file if the result carries a broken invariant.
    pub(crate) fn poison_on<T>(&self, result: crate::Result<T>) -> crate::Result<T> {
        if let Err(e) = &result {
            if e.is_structural() {
                log::error!("Hash file is poisoned after: {e:?}");
                self.poisoned.store(true, Ordering::Relaxed);
            }
        }
        result
    }

    /// Returns `true` if a broken invariant was hit and the hash file
    /// refuses further operations.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Relaxed)
    }

    /// The underlying bucket heap.
    #[must_use]
    pub fn heap(&self) -> &BucketHeap<R, S> {
        &self.heap
    }

    /// Number of completed doublings.
    #[must_use]
    pub fn level(&self) -> u32 {
        self.state.level()
    }

    /// Next bucket to be split.
    #[must_use]
    pub fn split_pointer(&self) -> u32 {
        self.state.split_pointer()
    }

    /// Number of primary buckets.
    #[must_use]
    pub fn bucket_count(&self) -> u32 {
        self.state.bucket_count()
    }

    /// Number of buckets the hash file started with.
    #[must_use]
    pub fn initial_buckets(&self) -> u32 {
        self.state.initial_buckets()
    }

    /// Bucket address a key currently maps to.
    #[must_use]
    pub fn address_of(&self, key: i32) -> BlockIndex {
        self.state.address(key)
    }

    /// Overflow blocks in use per primary bucket.
    #[must_use]
    pub fn overflow_ratio(&self) -> f64 {
        let main = self.heap.main_block_count();

        if main == 0 {
            return 0.0;
        }

        f64::from(self.heap.overflow_block_count()) / f64::from(main)
    }

    /// Returns point-in-time numbers of the hash file.
    #[must_use]
    pub fn stats(&self) -> Stats {
        Stats {
            level: self.level(),
            split_pointer: self.split_pointer(),
            bucket_count: self.bucket_count(),
            overflow_blocks: self.heap.overflow_block_count(),
            overflow_blocks_total: self.heap.overflow_store().block_count(),
            overflow_ratio: self.overflow_ratio(),
        }
    }

    /// Inserts a record.
    ///
    /// The key is not checked for duplicates, use [`LinearHash::update`]
    /// to replace an existing record. May split one bucket afterwards.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs or the hash file is corrupt.
    pub fn insert(&mut self, record: R) -> crate::Result<()> {
        self.check_poisoned()?;
        let result = self.insert_inner(record);
        self.poison_on(result)
    }

    fn insert_inner(&mut self, record: R) -> crate::Result<()> {
        let address = self.state.address(record.hash_key());
        self.heap.insert_into_bucket(address, record)?;

        if self.overflow_ratio() > self.split_threshold {
            self.split_inner()?;
        }

        Ok(())
    }

    /// Retrieves the record with the same key as `partial`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs or the hash file is corrupt.
    pub fn get(&self, partial: &R) -> crate::Result<Option<R>> {
        self.check_poisoned()?;
        let address = self.state.address(partial.hash_key());
        self.poison_on(self.heap.get(address, partial))
    }

    /// Returns `true` if a record with the same key as `partial` exists.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs or the hash file is corrupt.
    pub fn contains(&self, partial: &R) -> crate::Result<bool> {
        self.get(partial).map(|record| record.is_some())
    }

    /// Replaces the record with the same key.
    ///
    /// Returns `false` if there is no such record.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs or the hash file is corrupt.
    pub fn update(&mut self, record: R) -> crate::Result<bool> {
        self.check_poisoned()?;
        let address = self.state.address(record.hash_key());
        let result = self.heap.update(address, record);
        self.poison_on(result)
    }

    /// Deletes the record with the same key as `partial`.
    ///
    /// Returns `false` if there is no such record. May merge one bucket
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs or the hash file is corrupt.
    pub fn delete(&mut self, partial: &R) -> crate::Result<bool> {
        self.check_poisoned()?;
        let result = self.delete_inner(partial);
        self.poison_on(result)
    }

    fn delete_inner(&mut self, partial: &R) -> crate::Result<bool> {
        let address = self.state.address(partial.hash_key());

        if !self.heap.delete(address, partial)? {
            return Ok(false);
        }

        if self.overflow_ratio() < self.merge_threshold
            && self.state.bucket_count() > self.state.initial_buckets()
        {
            self.merge_inner()?;
        }

        Ok(true)
    }

    /// Splits the bucket at the split pointer, adding one bucket.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs or the hash file is corrupt.
    pub fn split(&mut self) -> crate::Result<()> {
        self.check_poisoned()?;
        let result = self.split_inner();
        self.poison_on(result)
    }

    fn split_inner(&mut self) -> crate::Result<()> {
        let source = self.state.split_pointer();
        let target = self.state.bucket_count();
        let next_level = self.state.level() + 1;

        let records = self.heap.take_all_records(source)?;
        let total = records.len();

        self.heap.extend_main_to(target + 1)?;

        let mut moved = 0;

        for record in records {
            let address = self.state.address_at(next_level, record.hash_key());
            debug_assert!(address == source || address == target);

            if address == target {
                moved += 1;
            }

            self.heap.insert_into_bucket(address, record)?;
        }

        self.state.advance();

        log::debug!(
            "Split bucket {source} into {target}, moved {moved}/{total} records (level={}, split pointer={})",
            self.state.level(),
            self.state.split_pointer(),
        );

        Ok(())
    }

    /// Merges the last bucket into its split partner, removing one bucket.
    ///
    /// Does nothing if the hash file is at its initial size.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs or the hash file is corrupt.
    pub fn merge(&mut self) -> crate::Result<()> {
        self.check_poisoned()?;
        let result = self.merge_inner();
        self.poison_on(result)
    }

    fn merge_inner(&mut self) -> crate::Result<()> {
        let Some((from, into)) = self.state.merge_target() else {
            log::trace!("Hash file is at its initial size, not merging");
            return Ok(());
        };

        let records = self.heap.take_all_records(from)?;
        let total = records.len();

        self.state.retreat();
        self.heap.truncate_main_to(self.state.bucket_count())?;

        for record in records {
            self.heap.insert_into_bucket(into, record)?;
        }

        log::debug!(
            "Merged bucket {from} into {into}, moved {total} records (level={}, split pointer={})",
            self.state.level(),
            self.state.split_pointer(),
        );

        Ok(())
    }

    /// Counts the records in the hash file.
    ///
    /// Reads every primary bucket.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs or the hash file is corrupt.
    pub fn len(&self) -> crate::Result<u64> {
        self.check_poisoned()?;

        let mut count = 0;

        for address in 0..self.bucket_count() {
            let bucket = self.poison_on(self.heap.load_bucket(address))?;
            count += u64::from(bucket.total_element_count());
        }

        Ok(count)
    }

    /// Returns `true` if the hash file holds no record.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs or the hash file is corrupt.
    pub fn is_empty(&self) -> crate::Result<bool> {
        self.len().map(|len| len == 0)
    }

    /// Returns an iterator over every record.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, R, S> {
        Iter::new(self)
    }

    /// Persists free lists and flushes written blocks to disk.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn flush(&mut self) -> crate::Result<()> {
        self.heap.sync()
    }
}
