// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::BlockIndex;

/// Addressing state of a linear hash file
///
/// The number of primary buckets is always
/// `initial_buckets * 2^level + split_pointer`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HashState {
    initial_buckets: u32,
    level: u32,
    split_pointer: u32,
}

impl HashState {
    /// Creates the state of a fresh hash file with `initial_buckets` buckets.
    ///
    /// # Errors
    ///
    /// Returns error, if `initial_buckets` is zero.
    pub fn new(initial_buckets: u32) -> crate::Result<Self> {
        Self::from_bucket_count(initial_buckets, initial_buckets)
    }

    /// Derives level and split pointer from the number of primary buckets.
    ///
    /// # Errors
    ///
    /// Returns error, if `initial_buckets` is zero or larger than `bucket_count`.
    pub fn from_bucket_count(initial_buckets: u32, bucket_count: u32) -> crate::Result<Self> {
        if initial_buckets == 0 {
            return Err(crate::Error::InvalidConfig("initial bucket count is zero"));
        }

        if bucket_count < initial_buckets {
            log::error!(
                "Hash file has {bucket_count} buckets, fewer than the initial {initial_buckets}"
            );
            return Err(crate::Error::InvalidConfig(
                "fewer buckets than initial bucket count",
            ));
        }

        let mut level = 0;
        while u64::from(initial_buckets) << (level + 1) <= u64::from(bucket_count) {
            level += 1;
        }

        #[expect(clippy::cast_possible_truncation, reason = "bounded by bucket_count")]
        let split_pointer =
            (u64::from(bucket_count) - (u64::from(initial_buckets) << level)) as u32;

        Ok(Self {
            initial_buckets,
            level,
            split_pointer,
        })
    }

    /// Number of buckets the hash file started with (`M`).
    #[must_use]
    pub fn initial_buckets(&self) -> u32 {
        self.initial_buckets
    }

    /// Number of completed doublings (`u`).
    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Next bucket to be split (`s`).
    #[must_use]
    pub fn split_pointer(&self) -> u32 {
        self.split_pointer
    }

    /// Number of buckets at the start of the current level (`M * 2^u`).
    #[must_use]
    pub fn level_buckets(&self) -> u64 {
        Self::buckets_at(self.initial_buckets, self.level)
    }

    fn buckets_at(initial_buckets: u32, level: u32) -> u64 {
        u64::from(initial_buckets) << level
    }

    /// Number of primary buckets (`N`).
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "bucket count lives in u32")]
    pub fn bucket_count(&self) -> u32 {
        (self.level_buckets() + u64::from(self.split_pointer)) as u32
    }

    /// Hash function of the given level, `key mod (M * 2^level)`.
    ///
    /// Negative keys wrap around, so the address is always in range.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap,
        reason = "the result is in 0..M*2^level"
    )]
    pub fn address_at(&self, level: u32, key: i32) -> BlockIndex {
        let modulus = Self::buckets_at(self.initial_buckets, level) as i64;
        i64::from(key).rem_euclid(modulus) as BlockIndex
    }

    /// Bucket address of a key.
    #[must_use]
    pub fn address(&self, key: i32) -> BlockIndex {
        let address = self.address_at(self.level, key);

        if address < self.split_pointer {
            self.address_at(self.level + 1, key)
        } else {
            address
        }
    }

    /// Moves the split pointer past a split bucket.
    pub fn advance(&mut self) {
        self.split_pointer += 1;

        if u64::from(self.split_pointer) >= self.level_buckets() {
            self.split_pointer = 0;
            self.level += 1;
        }
    }

    /// Returns `(from, into)` of the next merge, `None` at the initial size.
    ///
    /// `from` is always the last bucket.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "bucket count lives in u32")]
    pub fn merge_target(&self) -> Option<(BlockIndex, BlockIndex)> {
        if self.split_pointer > 0 {
            let from = self.bucket_count() - 1;
            Some((from, self.split_pointer - 1))
        } else if self.level > 0 {
            let from = (self.level_buckets() - 1) as u32;
            let into = (self.level_buckets() / 2 - 1) as u32;
            Some((from, into))
        } else {
            None
        }
    }

    /// Undoes the last split.
    #[expect(clippy::cast_possible_truncation, reason = "bucket count lives in u32")]
    pub fn retreat(&mut self) {
        if self.split_pointer > 0 {
            self.split_pointer -= 1;
        } else if self.level > 0 {
            self.level -= 1;
            self.split_pointer = (self.level_buckets() - 1) as u32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn state_from_bucket_count() -> crate::Result<()> {
        for (count, level, split_pointer) in [
            (4, 0, 0),
            (5, 0, 1),
            (7, 0, 3),
            (8, 1, 0),
            (13, 1, 5),
            (16, 2, 0),
        ] {
            let state = HashState::from_bucket_count(4, count)?;
            assert_eq!(level, state.level());
            assert_eq!(split_pointer, state.split_pointer());
            assert_eq!(count, state.bucket_count());
        }

        assert!(HashState::from_bucket_count(0, 4).is_err());
        assert!(HashState::from_bucket_count(4, 3).is_err());

        Ok(())
    }

    #[test]
    fn state_address_uses_next_level_below_split_pointer() -> crate::Result<()> {
        let mut state = HashState::new(2)?;
        assert_eq!(0, state.address(4));
        assert_eq!(1, state.address(5));

        state.advance();
        assert_eq!(3, state.bucket_count());

        // 4 mod 2 = 0 < s, 4 mod 4 = 0
        assert_eq!(0, state.address(4));
        // 6 mod 2 = 0 < s, 6 mod 4 = 2
        assert_eq!(2, state.address(6));
        // 5 mod 2 = 1 >= s
        assert_eq!(1, state.address(5));

        Ok(())
    }

    #[test]
    fn state_negative_keys() -> crate::Result<()> {
        let state = HashState::new(3)?;
        assert_eq!(2, state.address(-1));
        assert_eq!(0, state.address(-3));
        assert_eq!(2, state.address(i32::MIN + 1));

        for key in [i32::MIN, -17, -1, 0, 1, i32::MAX] {
            assert!(state.address(key) < state.bucket_count());
        }

        Ok(())
    }

    #[test]
    fn state_advance_and_retreat() -> crate::Result<()> {
        let mut state = HashState::new(2)?;
        assert_eq!(None, state.merge_target());

        state.advance();
        assert_eq!((0, 1), (state.level(), state.split_pointer()));
        assert_eq!(Some((2, 0)), state.merge_target());

        state.advance();
        assert_eq!((1, 0), (state.level(), state.split_pointer()));
        assert_eq!(4, state.bucket_count());
        assert_eq!(Some((3, 1)), state.merge_target());

        state.retreat();
        assert_eq!((0, 1), (state.level(), state.split_pointer()));
        assert_eq!(3, state.bucket_count());

        state.retreat();
        assert_eq!(HashState::new(2)?, state);

        state.retreat();
        assert_eq!(HashState::new(2)?, state);

        Ok(())
    }

    #[test]
    fn state_addresses_stay_in_range() -> crate::Result<()> {
        let mut state = HashState::new(3)?;

        for _ in 0..50 {
            let n = state.bucket_count();
            for key in -100..100 {
                assert!(state.address(key) < n);
            }
            state.advance();
        }

        Ok(())
    }
}
