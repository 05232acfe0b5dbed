use bptree::BPlusTree;
use rand::prelude::SliceRandom;
use rand::Rng;
use std::time::SystemTime;

const ITERATIONS: usize = 3;
const ELEMENTS: usize = 100_000;
const BRANCHING_FACTOR: usize = 64;

fn gen_data(count: usize) -> Vec<(u64, u64)> {
    let mut rng = rand::thread_rng();
    (0..count).map(|_| (rng.gen(), rng.gen())).collect()
}

fn main() {
    let pairs = gen_data(ELEMENTS);
    let mut tree: BPlusTree<u64, u64> = BPlusTree::new(BRANCHING_FACTOR).unwrap();

    let start = SystemTime::now();
    for (key, value) in &pairs {
        tree.insert(*key, *value);
    }
    let end = SystemTime::now();
    let duration = end.duration_since(start).unwrap();
    println!(
        "bptree: bulk inserted {} items in {}ms",
        ELEMENTS,
        duration.as_millis()
    );

    let mut key_order: Vec<usize> = (0..pairs.len()).collect();
    key_order.shuffle(&mut rand::thread_rng());

    for _ in 0..ITERATIONS {
        let start = SystemTime::now();
        let mut checksum = 0u64;
        let mut expected_checksum = 0u64;
        for i in &key_order {
            let (key, value) = &pairs[*i];
            checksum = checksum.wrapping_add(tree.at(key).unwrap());
            expected_checksum = expected_checksum.wrapping_add(*value);
        }
        assert_eq!(checksum, expected_checksum);
        let end = SystemTime::now();
        let duration = end.duration_since(start).unwrap();
        println!(
            "bptree: random read {} items in {}ms",
            ELEMENTS,
            duration.as_millis()
        );
    }

    let start = SystemTime::now();
    let mut traversed = 0usize;
    let mut cursor = tree.begin();
    while !cursor.is_past_the_end() {
        traversed += 1;
        cursor.inc().unwrap();
    }
    let end = SystemTime::now();
    let duration = end.duration_since(start).unwrap();
    assert_eq!(traversed, tree.len());
    println!(
        "bptree: forward traversal of {} items in {}ms",
        traversed,
        duration.as_millis()
    );

    let deletions: Vec<usize> = {
        let mut order: Vec<usize> = (0..pairs.len()).collect();
        order.shuffle(&mut rand::thread_rng());
        order
    };
    let start = SystemTime::now();
    for i in &deletions {
        tree.erase(&pairs[*i].0);
    }
    let end = SystemTime::now();
    let duration = end.duration_since(start).unwrap();
    println!(
        "bptree: deleted {} items in {}ms",
        ELEMENTS,
        duration.as_millis()
    );
    assert!(tree.is_empty());
}
