//! Client and server views of the same directories kept in step through
//! mapping exchange.

use super::*;
use crate::cache::MappingCache;
use crate::config::{GigaConfig, ServerList};
use crate::network::{decode_mapping, encode_mapping, frame_mapping, unframe_mapping};
use crate::partitioning::resolver::placement_for_file;
use std::sync::Arc;
use std::thread;

fn config() -> GigaConfig {
    GigaConfig::new(ServerList::new(["s0:7000", "s1:7000", "s2:7000", "s3:7000"]))
}

#[test]
fn test_stale_client_catches_up_from_reply() {
    let server = MappingCache::new(&config()).unwrap();
    let client = MappingCache::new(&config()).unwrap();
    let dir = 42;

    server.get_or_insert(dir, 0).unwrap();
    client.get_or_insert(dir, 0).unwrap();

    // The server splits twice; the client still routes with radix 0.
    for _ in 0..2 {
        let mut txn = server.begin_split(dir, 0).unwrap().unwrap();
        server.commit_split(dir, &mut txn).unwrap();
    }
    let name = names_with_low_bits(2, 2, 1).remove(0);
    assert_eq!(client.resolve(dir, name.as_bytes()).unwrap().unwrap().index, 0);

    // The server's reply carries its mapping, which the client merges.
    let reply = encode_mapping(&server.get(dir).unwrap()).unwrap();
    client.refresh(dir, &decode_mapping(&reply).unwrap());

    let placement = client.resolve(dir, name.as_bytes()).unwrap().unwrap();
    assert_eq!(placement.index, 2);
    assert_eq!(placement.server, 2);
    assert_eq!(client.get(dir), server.get(dir));
}

#[test]
fn test_framed_exchange_between_peers() {
    let a = MappingCache::new(&config()).unwrap();
    let b = MappingCache::new(&config()).unwrap();
    a.insert(1, mapping_with(&[1, 3], 0, 4).unwrap());
    b.insert(1, mapping_with(&[2], 0, 4).unwrap());

    let merged_b = b.refresh(1, &unframe_mapping(&frame_mapping(&a.get(1).unwrap())).unwrap());
    let merged_a = a.refresh(1, &unframe_mapping(&frame_mapping(&b.get(1).unwrap())).unwrap());

    assert_eq!(merged_a, merged_b);
    assert_eq!(merged_a.partitions().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
}

#[test]
fn test_concurrent_readers_and_split_writer() {
    let cache = Arc::new(MappingCache::new(&config()).unwrap());
    let dir = 7;
    cache.get_or_insert(dir, 0).unwrap();

    let names: Arc<Vec<String>> = Arc::new((0..64).map(|i| format!("f{}", i)).collect());
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = cache.clone();
            let names = names.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    for name in names.iter() {
                        let placement = cache.resolve(dir, name.as_bytes()).unwrap().unwrap();
                        assert!(placement.server < 4);
                    }
                }
            })
        })
        .collect();

    let writer = {
        let cache = cache.clone();
        thread::spawn(move || {
            let mut mapping = cache.get(dir).unwrap();
            for child in grow_by_splits(&mut mapping, &[0, 0, 1, 2, 0, 3]) {
                cache.apply_split(dir, child).unwrap();
            }
        })
    };

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    let mapping = cache.get(dir).unwrap();
    assert_eq!(mapping.partition_count(), 7);
    for name in names.iter() {
        assert_eq!(
            cache.resolve(dir, name.as_bytes()).unwrap(),
            Some(placement_for_file(&mapping, name.as_bytes()).unwrap())
        );
    }
}
