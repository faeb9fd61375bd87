use criterion::{criterion_group, criterion_main, Criterion};
use linear_hash::{Bucket, Decode, Encode, OverflowBlock, Record, RecordContainer};
use std::io::{Read, Write};

#[derive(Clone, Debug)]
struct Item {
    key: i32,
    value: u64,
}

impl Encode for Item {
    fn encode_into<W: Write>(&self, writer: &mut W) -> linear_hash::Result<()> {
        writer.write_all(&[1])?;
        writer.write_all(&self.key.to_be_bytes())?;
        writer.write_all(&self.value.to_be_bytes())?;
        Ok(())
    }
}

impl Decode for Item {
    fn decode_from<R: Read>(reader: &mut R) -> linear_hash::Result<Self> {
        let mut buf = [0; 13];
        reader.read_exact(&mut buf)?;

        let mut key = [0; 4];
        key.copy_from_slice(&buf[1..5]);
        let mut value = [0; 8];
        value.copy_from_slice(&buf[5..]);

        Ok(Self {
            key: i32::from_be_bytes(key),
            value: u64::from_be_bytes(value),
        })
    }
}

impl Record for Item {
    const ENCODED_LEN: usize = 13;

    fn hash_key(&self) -> i32 {
        self.key
    }

    fn same_key(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

fn bucket(c: &mut Criterion) {
    let mut group = c.benchmark_group("bucket");

    for block_size in [1_024, 4_096, 16_384] {
        let capacity = (block_size - Bucket::<Item>::METADATA_LEN) / Item::ENCODED_LEN;

        let mut bucket = Bucket::<Item>::new(capacity);
        for key in 0..capacity {
            bucket.add_record(Item {
                key: key as i32,
                value: key as u64,
            });
        }

        let bytes = bucket.encode_block(block_size).unwrap();

        group.bench_function(format!("encode {block_size}B bucket"), |b| {
            b.iter(|| bucket.encode_block(block_size).unwrap())
        });

        group.bench_function(format!("decode {block_size}B bucket"), |b| {
            b.iter(|| {
                let decoded = Bucket::<Item>::decode_block(&bytes, capacity).unwrap();
                assert_eq!(capacity, decoded.valid_count());
            })
        });

        group.bench_function(format!("find last record in {block_size}B bucket"), |b| {
            let lookup = Item {
                key: capacity as i32 - 1,
                value: 0,
            };
            b.iter(|| assert!(bucket.get_record(&lookup).is_some()))
        });
    }
}

fn overflow_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("overflow block");

    for block_size in [256, 1_024, 4_096] {
        let capacity = (block_size - OverflowBlock::<Item>::METADATA_LEN) / Item::ENCODED_LEN;

        // Half full, as after a delete
        let mut block = OverflowBlock::<Item>::new(capacity);
        for key in 0..capacity / 2 {
            block.add_record(Item {
                key: key as i32,
                value: key as u64,
            });
        }

        let bytes = block.encode_block(block_size).unwrap();

        group.bench_function(format!("decode half-full {block_size}B block"), |b| {
            b.iter(|| {
                let decoded = OverflowBlock::<Item>::decode_block(&bytes, capacity).unwrap();
                assert_eq!(capacity / 2, decoded.valid_count());
            })
        });
    }
}

criterion_group!(benches, bucket, overflow_block);
criterion_main!(benches);
