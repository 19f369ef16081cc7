extern crate currawong;
extern crate rand;

use std::collections::HashMap;

use currawong::baum::node_map::NodeMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn test_sum_update_accumulates_per_key() {
    let mut nodes: NodeMap<2> = NodeMap::new();
    nodes.sum_update([3, 7], 0.25);
    nodes.sum_update([3, 7], 0.5);
    nodes.sum_update([7, 3], 1.0);
    assert_eq!(nodes.size(), 2);
    assert_eq!(nodes.value([3, 7]), 0.75);
    assert_eq!(nodes.value([7, 3]), 1.0);
    assert_eq!(nodes.value([0, 0]), 0.0);
}

#[test]
fn test_enumeration_follows_insertion_order() {
    let mut nodes: NodeMap<2> = NodeMap::new();
    nodes.sum_update([5, 0], 0.1);
    nodes.sum_update([1, 9], 0.2);
    nodes.sum_update([5, 0], 0.3);
    nodes.sum_update([2, 2], 0.4);
    assert_eq!(nodes.size(), 3);
    assert_eq!(nodes.enum_key(0), [5, 0]);
    assert_eq!(nodes.enum_key(1), [1, 9]);
    assert_eq!(nodes.enum_key(2), [2, 2]);
    assert!((nodes.enum_value(0) - 0.4).abs() < 1e-7);
    assert!((nodes.enum_value(1) - 0.2).abs() < 1e-7);
}

#[test]
fn test_random_round_trip() {
    let mut rng = StdRng::seed_from_u64(31);
    let mut nodes: NodeMap<2> = NodeMap::new();
    let mut expected: HashMap<[u32; 2], f32> = HashMap::new();
    for _ in 0..10_000 {
        let key = [rng.gen_range(0, 2000u32), rng.gen_range(0, 2000u32)];
        let value = rng.gen_range(1e-3f32, 1.0f32);
        nodes.sum_update(key, value);
        *expected.entry(key).or_insert(0.0) += value;
    }
    assert_eq!(nodes.size(), expected.len());
    for (key, value) in expected.iter() {
        let stored = nodes.value(*key);
        assert!(
            (stored - value).abs() <= 1e-3 * value,
            "key {:?}: stored {} expected {}",
            key,
            stored,
            value
        );
    }
    let keys: Vec<[u32; 2]> = expected.keys().copied().collect();
    nodes.clear();
    assert_eq!(nodes.size(), 0);
    for key in keys {
        assert_eq!(nodes.value(key), 0.0);
    }
}

#[test]
fn test_clear_then_reuse() {
    let mut nodes: NodeMap<1> = NodeMap::new();
    for k in 0..100u32 {
        nodes.sum_update([k], 1.0);
    }
    nodes.clear();
    nodes.sum_update([17], 2.0);
    assert_eq!(nodes.size(), 1);
    assert_eq!(nodes.enum_key(0), [17]);
    assert_eq!(nodes.value([16]), 0.0);
}

#[test]
fn test_growth_preserves_entries() {
    let mut nodes: NodeMap<3> = NodeMap::with_capacity(4);
    for k in 0..5_000u32 {
        nodes.sum_update([k, k + 1, k % 7], (k + 1) as f32);
    }
    assert_eq!(nodes.size(), 5_000);
    assert_eq!(nodes.value([999, 1000, 999 % 7]), 1000.0);
    assert_eq!(nodes.enum_key(0), [0, 1, 0]);
    assert_eq!(nodes.enum_key(4_999), [4_999, 5_000, 4_999 % 7]);
}

#[test]
#[should_panic]
fn test_nonpositive_update_panics() {
    let mut nodes: NodeMap<2> = NodeMap::new();
    nodes.sum_update([0, 0], 0.0);
}

#[test]
#[should_panic]
fn test_nonfinite_update_panics() {
    let mut nodes: NodeMap<2> = NodeMap::new();
    nodes.sum_update([0, 0], f32::INFINITY);
}
