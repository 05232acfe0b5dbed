use bptree::BPlusTree;
use rand::seq::SliceRandom;
use rand::thread_rng;

#[test]
fn erase_on_an_absent_key_is_a_no_op() {
    let mut tree = BPlusTree::new(3).unwrap();
    tree.insert(1, 1);
    tree.erase(&99);
    assert_eq!(tree.len(), 1);
    tree.check_invariants().unwrap();
}

#[test]
fn erase_then_find_is_past_the_end() {
    let mut tree = BPlusTree::new(3).unwrap();
    tree.insert(1, "a");
    tree.insert(2, "b");
    tree.erase(&1);
    assert!(tree.find(&1).is_past_the_end());
    assert!(tree.contains(&2));
}

#[test]
fn erase_the_only_key_empties_the_tree() {
    let mut tree = BPlusTree::new(3).unwrap();
    tree.insert(1, 1);
    tree.erase(&1);
    assert!(tree.is_empty());
    assert_eq!(tree.begin(), tree.end());
}

/// Boundary scenario 2: with M=3, insert 1..=7 then erase 4. The remaining
/// keys are 1,2,3,5,6,7 and every separator that used to read 4 is updated.
#[test]
fn boundary_scenario_erase_middle_key_refreshes_separators() {
    let mut tree = BPlusTree::new(3).unwrap();
    for k in 1..=7 {
        tree.insert(k, k);
    }
    tree.erase(&4);
    tree.check_invariants().unwrap();
    assert_eq!(tree.get_keys(), vec![1, 2, 3, 5, 6, 7]);
    assert_eq!(tree.len(), 6);
}

/// Boundary scenario 3: with M=4, erasing the leftmost key updates the
/// separator that duplicated it, and reverse traversal still works.
#[test]
fn boundary_scenario_erase_leftmost_key_then_reverse_traverse() {
    let mut tree = BPlusTree::new(4).unwrap();
    for k in [10, 20, 30, 40, 50, 60, 70, 80] {
        tree.insert(k, k);
    }
    tree.erase(&10);
    tree.check_invariants().unwrap();
    assert!(tree.find(&10).is_past_the_end());

    let mut reversed = Vec::new();
    let mut cursor = tree.rbegin();
    let end = tree.rend();
    while cursor != end {
        reversed.push(cursor.get_key().unwrap());
        cursor.inc().unwrap();
    }
    assert_eq!(reversed, vec![80, 70, 60, 50, 40, 30, 20]);
}

/// Boundary scenario 5: fill 1..=9, erase everything in reverse order,
/// checking invariants after every erase.
#[test]
fn boundary_scenario_erase_everything_in_reverse() {
    let mut tree = BPlusTree::new(3).unwrap();
    for k in 1..=9 {
        tree.insert(k, k);
    }
    for k in (1..=9).rev() {
        tree.erase(&k);
        tree.check_invariants().unwrap();
    }
    assert!(tree.is_empty());
    assert_eq!(tree.begin(), tree.end());
}

/// Boundary scenario 6: with M=5, insert 1..=100 and delete all evens.
#[test]
fn boundary_scenario_delete_all_evens() {
    let mut tree = BPlusTree::new(5).unwrap();
    for k in 1..=100 {
        tree.insert(k, k);
    }
    for k in (2..=100).step_by(2) {
        tree.erase(&k);
    }
    tree.check_invariants().unwrap();
    let expected: Vec<i32> = (1..=99).step_by(2).collect();
    assert_eq!(tree.get_keys(), expected);
    assert_eq!(tree.len(), 50);
}

#[test]
fn large_randomized_insert_and_delete_preserves_invariants() {
    let mut keys: Vec<i64> = (0..1500).collect();
    keys.shuffle(&mut thread_rng());

    let mut tree = BPlusTree::new(8).unwrap();
    for &k in &keys {
        tree.insert(k, k);
    }
    tree.check_invariants().unwrap();

    let mut deletion_order = keys.clone();
    deletion_order.shuffle(&mut thread_rng());

    for (i, k) in deletion_order.iter().enumerate() {
        tree.erase(k);
        if i % 83 == 0 {
            tree.check_invariants().unwrap();
        }
    }
    tree.check_invariants().unwrap();
    assert!(tree.is_empty());
}
