#![no_main]
use libfuzzer_sys::fuzz_target;
use linear_hash::{Bucket, Decode, Encode, OverflowBlock, Record, RecordContainer};
use std::io::{Read, Write};

#[derive(Clone, Debug)]
struct Item([u8; 8]);

impl Encode for Item {
    fn encode_into<W: Write>(&self, writer: &mut W) -> linear_hash::Result<()> {
        writer.write_all(&self.0)?;
        Ok(())
    }
}

impl Decode for Item {
    fn decode_from<R: Read>(reader: &mut R) -> linear_hash::Result<Self> {
        let mut buf = [0; 8];
        reader.read_exact(&mut buf)?;
        Ok(Self(buf))
    }
}

impl Record for Item {
    const ENCODED_LEN: usize = 8;

    fn hash_key(&self) -> i32 {
        i32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    fn same_key(&self, other: &Self) -> bool {
        self.hash_key() == other.hash_key()
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&capacity, bytes)) = data.split_first() else {
        return;
    };
    let capacity = usize::from(capacity % 16).max(1);

    // Decoding arbitrary bytes must never panic, and whatever decodes
    // must encode back into a block of the same size
    if let Ok(bucket) = Bucket::<Item>::decode_block(bytes, capacity) {
        assert!(bucket.valid_count() <= capacity);
        if bytes.len() >= Bucket::<Item>::block_size_for(capacity) {
            let encoded = bucket.encode_block(bytes.len()).unwrap();
            assert_eq!(bytes.len(), encoded.len());
        }
    }

    if let Ok(block) = OverflowBlock::<Item>::decode_block(bytes, capacity) {
        assert!(block.valid_count() <= capacity);
    }
});
