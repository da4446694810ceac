use std::time::Duration;

use serde_json::json;

use super::*;

#[test]
fn test_initial_size_is_zero() {
    let cache = TtlCache::new(Duration::from_secs(3));
    assert_eq!(cache.size(), 0);
}

#[test]
fn test_set_and_get_within_ttl() {
    let cache = TtlCache::new(Duration::from_secs(3));
    cache.set("key1", json!("value1"));
    assert_eq!(cache.size(), 1);

    let (value, found) = cache.get("key1");
    assert!(found);
    assert_eq!(value.unwrap(), json!("value1"));
}

#[test]
fn test_get_missing_key() {
    let cache = TtlCache::new(Duration::from_secs(3));
    assert_eq!(cache.get("nope"), (None, false));
}

#[test]
fn test_rewrite_replaces_value() {
    let cache = TtlCache::new(Duration::from_secs(3));
    cache.set("key1", json!("value1"));
    cache.set("key1", json!("value01"));
    assert_eq!(cache.size(), 1);
    assert_eq!(cache.get("key1").0.unwrap(), json!("value01"));
}

#[tokio::test]
async fn test_entry_expires_and_is_removed_on_lookup() {
    let cache = TtlCache::new(Duration::from_millis(50));
    cache.set("key1", json!("value1"));

    tokio::time::sleep(Duration::from_millis(120)).await;

    assert_eq!(cache.get("key1"), (None, false));
    // The expired entry was dropped by the lookup itself.
    assert_eq!(cache.size(), 0);
}

#[tokio::test]
async fn test_rewrite_extends_expiry() {
    let cache = TtlCache::new(Duration::from_millis(100));
    cache.set("key1", json!("value1"));

    tokio::time::sleep(Duration::from_millis(60)).await;
    cache.set("key1", json!("value2"));
    tokio::time::sleep(Duration::from_millis(60)).await;

    // 120ms after the first write, but only 60ms after the second.
    let (value, found) = cache.get("key1");
    assert!(found);
    assert_eq!(value.unwrap(), json!("value2"));
}
