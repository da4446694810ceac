use serde_json::json;

use super::*;

#[test]
fn test_initial_size_is_zero() {
    let cache = LruCache::new(3);
    assert_eq!(cache.capacity(), 3);
    assert_eq!(cache.size(), 0);
}

#[test]
fn test_set_and_get_basic() {
    let cache = LruCache::new(3);
    cache.set("key1", json!("value1"));
    assert_eq!(cache.size(), 1);

    cache.set("key2", json!("value2"));
    assert_eq!(cache.size(), 2);

    let (value, found) = cache.get("key1");
    assert!(found);
    assert_eq!(value.unwrap(), json!("value1"));
}

#[test]
fn test_get_missing_key() {
    let cache = LruCache::new(3);
    assert_eq!(cache.get("nope"), (None, false));
}

#[test]
fn test_set_existing_key_updates_in_place() {
    let cache = LruCache::new(3);
    cache.set("key1", json!("value1"));
    cache.set("key1", json!("value01"));
    assert_eq!(cache.size(), 1);
    assert_eq!(cache.get("key1").0.unwrap(), json!("value01"));
}

#[test]
fn test_capacity_is_strict() {
    let cache = LruCache::new(2);
    cache.set("key1", json!(1));
    cache.set("key2", json!(2));
    cache.set("key3", json!(3));
    assert_eq!(cache.size(), 2);
}

#[test]
fn test_least_recently_used_is_evicted() {
    let cache = LruCache::new(2);
    cache.set("a", json!("a"));
    cache.set("b", json!("b"));
    cache.set("c", json!("c"));

    // "a" was least recently used; exactly it is gone.
    assert_eq!(cache.get("a"), (None, false));
    assert_eq!(cache.get("b").0.unwrap(), json!("b"));
    assert_eq!(cache.get("c").0.unwrap(), json!("c"));
    assert_eq!(cache.size(), 2);
}

#[test]
fn test_get_promotes_to_most_recent() {
    let cache = LruCache::new(2);
    cache.set("a", json!("a"));
    cache.set("b", json!("b"));

    // Touch "a" so "b" becomes the eviction victim.
    assert!(cache.get("a").1);
    cache.set("c", json!("c"));

    assert_eq!(cache.get("b"), (None, false));
    assert!(cache.get("a").1);
    assert!(cache.get("c").1);
}

#[test]
fn test_set_promotes_existing_key() {
    let cache = LruCache::new(2);
    cache.set("a", json!(1));
    cache.set("b", json!(2));

    // Rewriting "a" promotes it; "b" is now the victim.
    cache.set("a", json!(10));
    cache.set("c", json!(3));

    assert_eq!(cache.get("b"), (None, false));
    assert_eq!(cache.get("a").0.unwrap(), json!(10));
}

#[test]
fn test_eviction_reuses_slots() {
    let cache = LruCache::new(2);
    for i in 0..100 {
        cache.set(&format!("key{}", i), json!(i));
    }
    assert_eq!(cache.size(), 2);
    assert!(cache.get("key99").1);
    assert!(cache.get("key98").1);
}

#[test]
fn test_capacity_one() {
    let cache = LruCache::new(1);
    cache.set("a", json!("a"));
    cache.set("b", json!("b"));
    assert_eq!(cache.size(), 1);
    assert_eq!(cache.get("a"), (None, false));
    assert!(cache.get("b").1);
}
