// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    checksum::{Checksum, ChecksummedReader, ChecksummedWriter},
    coding::{Decode, Encode},
    file::MAGIC_BYTES,
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Current disk format version
pub const FORMAT_VERSION: u8 = 1;

/// Immutable layout of a hash file
///
/// ```text
/// [magic: "LHF"][version: u8][initial buckets: u32][main block size: u32]
/// [overflow block size: u32][record length: u32][checksum: u32]
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Manifest {
    pub version: u8,
    pub initial_buckets: u32,
    pub main_block_size: u32,
    pub overflow_block_size: u32,
    pub record_len: u32,
}

impl Encode for Manifest {
    fn encode_into<W: Write>(&self, writer: &mut W) -> crate::Result<()> {
        let mut writer = ChecksummedWriter::new(writer);

        writer.write_all(&MAGIC_BYTES)?;
        writer.write_u8(self.version)?;
        writer.write_u32::<BigEndian>(self.initial_buckets)?;
        writer.write_u32::<BigEndian>(self.main_block_size)?;
        writer.write_u32::<BigEndian>(self.overflow_block_size)?;
        writer.write_u32::<BigEndian>(self.record_len)?;

        let checksum = writer.checksum();
        writer.into_inner().write_u32::<BigEndian>(checksum.into_u32())?;

        Ok(())
    }
}

impl Decode for Manifest {
    fn decode_from<R: Read>(reader: &mut R) -> crate::Result<Self> {
        let mut reader = ChecksummedReader::new(reader);

        let mut magic = [0u8; MAGIC_BYTES.len()];
        reader.read_exact(&mut magic)?;

        if magic != MAGIC_BYTES {
            return Err(crate::Error::InvalidHeader("Manifest"));
        }

        let version = reader.read_u8()?;
        if version != FORMAT_VERSION {
            return Err(crate::Error::InvalidVersion(version));
        }

        let initial_buckets = reader.read_u32::<BigEndian>()?;
        let main_block_size = reader.read_u32::<BigEndian>()?;
        let overflow_block_size = reader.read_u32::<BigEndian>()?;
        let record_len = reader.read_u32::<BigEndian>()?;

        let got = reader.checksum();
        let expected = Checksum::from_raw(reader.into_inner().read_u32::<BigEndian>()?);

        if let Err(e) = got.check(expected) {
            log::error!("Manifest checksum mismatch: got {got}, expected {expected}");
            return Err(e);
        }

        Ok(Self {
            version,
            initial_buckets,
            main_block_size,
            overflow_block_size,
            record_len,
        })
    }
}
