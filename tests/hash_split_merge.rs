mod common;

use common::{small_config, Item};
use linear_hash::{BlockStore, RecordContainer};
use test_log::test;

#[test]
fn hash_forced_split() -> linear_hash::Result<()> {
    let folder = tempfile::tempdir()?;
    let mut hash = small_config(&folder).open::<Item>()?;

    for key in [0, 4, 8, 12, 16] {
        hash.insert(Item::new(key, 0))?;
    }
    assert_eq!(2, hash.bucket_count());
    assert_eq!(1, hash.heap().overflow_block_count());

    hash.insert(Item::new(20, 0))?;

    assert_eq!(3, hash.bucket_count());
    assert_eq!((0, 1), (hash.level(), hash.split_pointer()));
    assert_eq!(3, hash.heap().main_store().block_count());

    let bucket = hash.heap().load_bucket(0)?;
    assert_eq!(6, bucket.total_element_count());
    assert_eq!(
        hash.heap()
            .min_required_overflow_blocks(bucket.total_element_count()),
        bucket.overflow_block_count(),
    );
    assert!(hash.heap().load_bucket(2)?.is_empty());

    Ok(())
}

#[test]
fn hash_delete_until_chain_is_gone() -> linear_hash::Result<()> {
    let folder = tempfile::tempdir()?;
    let mut hash = small_config(&folder)
        .split_threshold(100.0)
        .merge_threshold(0.0)
        .open::<Item>()?;

    let keys = (0..7).map(|k| k * 2).collect::<Vec<_>>();
    for &key in &keys {
        hash.insert(Item::new(key, 0))?;
    }
    assert_eq!(2, hash.heap().load_bucket(0)?.overflow_block_count());

    for &key in &keys {
        assert!(hash.delete(&Item::key(key))?);

        let bucket = hash.heap().load_bucket(0)?;
        assert_eq!(
            hash.heap()
                .min_required_overflow_blocks(bucket.total_element_count()),
            bucket.overflow_block_count(),
        );
    }

    let bucket = hash.heap().load_bucket(0)?;
    assert_eq!(None, bucket.first_overflow_block());
    assert_eq!(0, hash.heap().overflow_store().block_count());
    assert!(hash.is_empty()?);

    Ok(())
}

#[test]
fn hash_grows_and_shrinks() -> linear_hash::Result<()> {
    let folder = tempfile::tempdir()?;
    let mut hash = small_config(&folder).open::<Item>()?;

    for key in 0..500 {
        hash.insert(Item::new(key, 0))?;

        let m = u64::from(hash.initial_buckets());
        assert_eq!(
            u64::from(hash.bucket_count()),
            (m << hash.level()) + u64::from(hash.split_pointer()),
        );
    }
    let grown = hash.bucket_count();
    assert!(grown > 100);

    for key in 0..500 {
        assert!(hash.delete(&Item::key(key))?);
        assert!(hash.bucket_count() >= hash.initial_buckets());
    }

    assert!(hash.bucket_count() < grown);
    assert!(hash.is_empty()?);

    Ok(())
}

#[test]
fn hash_split_and_merge_keep_records() -> linear_hash::Result<()> {
    let folder = tempfile::tempdir()?;
    let mut hash = small_config(&folder).split_threshold(100.0).open::<Item>()?;

    for key in -50..50 {
        hash.insert(Item::new(key, 5))?;
    }

    for _ in 0..10 {
        hash.split()?;
    }
    assert_eq!(12, hash.bucket_count());
    assert_eq!((2, 4), (hash.level(), hash.split_pointer()));

    for address in 0..hash.bucket_count() {
        let bucket = hash.heap().load_bucket(address)?;
        for item in hash.heap().collect_all_records(address, &bucket)? {
            assert_eq!(address, hash.address_of(item.key));
        }
    }

    for _ in 0..10 {
        hash.merge()?;
    }
    assert_eq!(2, hash.bucket_count());

    // At the initial size there is nothing to merge
    hash.merge()?;
    assert_eq!(2, hash.bucket_count());

    for key in -50..50 {
        assert_eq!(Some(Item::new(key, 5)), hash.get(&Item::key(key))?);
    }

    Ok(())
}
