// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::io::{Read, Write};
use xxhash_rust::xxh3::Xxh3Default;

/// A 32-bit checksum, the lower half of an xxh3 digest
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Checksum(u32);

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl Checksum {
    /// Wraps a checksum value.
    #[must_use]
    pub fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw 32-bit integer.
    #[must_use]
    pub fn into_u32(self) -> u32 {
        self.0
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "we purposefully only use the lower 4 bytes as checksum"
    )]
    fn from_hasher(hasher: &Xxh3Default) -> Self {
        Self(hasher.digest() as u32)
    }

    pub(crate) fn check(self, expected: Self) -> crate::Result<()> {
        if self == expected {
            Ok(())
        } else {
            Err(crate::Error::ChecksumMismatch {
                got: self,
                expected,
            })
        }
    }
}

pub struct ChecksummedWriter<W: Write> {
    inner: W,
    hasher: Xxh3Default,
}

impl<W: Write> ChecksummedWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: writer,
            hasher: Xxh3Default::new(),
        }
    }

    pub fn checksum(&self) -> Checksum {
        Checksum::from_hasher(&self.hasher)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ChecksummedWriter<W> {
    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }

    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;

        #[expect(clippy::indexing_slicing)]
        self.hasher.update(&buf[..n]);

        Ok(n)
    }
}

pub struct ChecksummedReader<R: Read> {
    inner: R,
    hasher: Xxh3Default,
}

impl<R: Read> ChecksummedReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: reader,
            hasher: Xxh3Default::new(),
        }
    }

    pub fn checksum(&self) -> Checksum {
        Checksum::from_hasher(&self.hasher)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ChecksummedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;

        #[expect(clippy::indexing_slicing)]
        self.hasher.update(&buf[..n]);

        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn checksum_reader_matches_writer() -> crate::Result<()> {
        let mut writer = ChecksummedWriter::new(vec![]);
        writer.write_all(b"linear hashing")?;
        let written = writer.checksum();
        let bytes = writer.into_inner();

        let mut reader = ChecksummedReader::new(&bytes[..]);
        let mut buf = vec![];
        reader.read_to_end(&mut buf)?;

        assert_eq!(written, reader.checksum());
        assert_eq!(b"linear hashing", &*buf);

        Ok(())
    }

    #[test]
    fn checksum_mismatch() {
        let a = Checksum::from_raw(1);
        let b = Checksum::from_raw(2);
        assert!(a.check(a).is_ok());
        assert!(matches!(
            a.check(b),
            Err(crate::Error::ChecksumMismatch { .. })
        ));
    }
}
