use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use linear_hash::{Decode, Encode, Record};
use std::io::{Read, Write};

/// 16-byte record: key, value and a non-zero marker
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Item {
    pub key: i32,
    pub value: u64,
}

impl Item {
    #[must_use]
    pub fn new(key: i32, value: u64) -> Self {
        Self { key, value }
    }

    #[must_use]
    pub fn key(key: i32) -> Self {
        Self { key, value: 0 }
    }
}

impl Encode for Item {
    fn encode_into<W: Write>(&self, writer: &mut W) -> linear_hash::Result<()> {
        writer.write_u32::<BigEndian>(1)?;
        writer.write_i32::<BigEndian>(self.key)?;
        writer.write_u64::<BigEndian>(self.value)?;
        Ok(())
    }
}

impl Decode for Item {
    fn decode_from<R: Read>(reader: &mut R) -> linear_hash::Result<Self> {
        let _marker = reader.read_u32::<BigEndian>()?;
        let key = reader.read_i32::<BigEndian>()?;
        let value = reader.read_u64::<BigEndian>()?;
        Ok(Self { key, value })
    }
}

impl Record for Item {
    const ENCODED_LEN: usize = 16;

    fn hash_key(&self) -> i32 {
        self.key
    }

    fn same_key(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

/// 8-byte record, used to open a hash file with the wrong record length
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SmallItem {
    pub key: i32,
}

impl Encode for SmallItem {
    fn encode_into<W: Write>(&self, writer: &mut W) -> linear_hash::Result<()> {
        writer.write_u32::<BigEndian>(1)?;
        writer.write_i32::<BigEndian>(self.key)?;
        Ok(())
    }
}

impl Decode for SmallItem {
    fn decode_from<R: Read>(reader: &mut R) -> linear_hash::Result<Self> {
        let _marker = reader.read_u32::<BigEndian>()?;
        let key = reader.read_i32::<BigEndian>()?;
        Ok(Self { key })
    }
}

impl Record for SmallItem {
    const ENCODED_LEN: usize = 8;

    fn hash_key(&self) -> i32 {
        self.key
    }

    fn same_key(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

/// 3 items per bucket, 2 items per overflow block
#[must_use]
pub fn small_config<P: AsRef<std::path::Path>>(path: P) -> linear_hash::Config {
    linear_hash::Config::new(path)
        .initial_buckets(2)
        .main_block_size(64)
        .overflow_block_size(40)
}
