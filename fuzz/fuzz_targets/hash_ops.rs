#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use linear_hash::{Config, Decode, Encode, Record};
use std::collections::HashMap;
use std::io::{Read, Write};

#[derive(Clone, Debug, PartialEq)]
struct Item {
    key: i32,
    value: u16,
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
        let mut buf = [0; 7];
        reader.read_exact(&mut buf)?;
        Ok(Self {
            key: i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]),
            value: u16::from_be_bytes([buf[5], buf[6]]),
        })
    }
}

impl Record for Item {
    const ENCODED_LEN: usize = 7;

    fn hash_key(&self) -> i32 {
        self.key
    }

    fn same_key(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

#[derive(Arbitrary, Debug)]
enum Op {
    Upsert(i8, u16),
    Delete(i8),
    Get(i8),
    Split,
    Merge,
}

fuzz_target!(|ops: Vec<Op>| {
    let mut hash = Config::default()
        .initial_buckets(2)
        .main_block_size(32)
        .overflow_block_size(24)
        .open_in_memory::<Item>()
        .unwrap();

    let mut model = HashMap::new();

    for op in ops {
        match op {
            Op::Upsert(key, value) => {
                let item = Item {
                    key: key.into(),
                    value,
                };
                if model.insert(key, value).is_some() {
                    assert!(hash.update(item).unwrap());
                } else {
                    hash.insert(item).unwrap();
                }
            }
            Op::Delete(key) => {
                let lookup = Item {
                    key: key.into(),
                    value: 0,
                };
                assert_eq!(model.remove(&key).is_some(), hash.delete(&lookup).unwrap());
            }
            Op::Get(key) => {
                let lookup = Item {
                    key: key.into(),
                    value: 0,
                };
                let got = hash.get(&lookup).unwrap().map(|item| item.value);
                assert_eq!(model.get(&key).copied(), got);
            }
            Op::Split => hash.split().unwrap(),
            Op::Merge => hash.merge().unwrap(),
        }
    }

    assert_eq!(model.len() as u64, hash.len().unwrap());
});
