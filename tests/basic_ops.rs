use loadcache::{CacheBuilder, CacheKey, CacheValue};

fn key(primary: &str, secondary: &str) -> CacheKey {
  CacheKey::new(primary, secondary)
}

#[test]
fn test_put_and_get_if_present() {
  let cache = CacheBuilder::new().build::<i32>().unwrap();

  cache.put(key("row", "a"), CacheValue::new(10));

  let hit = cache.get_if_present(&key("row", "a")).unwrap();
  assert_eq!(hit.value(), Some(&10));

  assert!(cache.get_if_present(&key("row", "b")).is_none());

  let stats = cache.stats();
  assert_eq!(stats.hit_count, 1);
  assert_eq!(stats.miss_count, 1);
}

#[test]
fn test_key_identity_uses_both_parts() {
  let cache = CacheBuilder::new().build::<i32>().unwrap();

  cache.put(key("row", "a"), CacheValue::new(1));
  cache.put(key("row", "b"), CacheValue::new(2));

  assert_eq!(
    cache.get_if_present(&key("row", "a")).unwrap().value(),
    Some(&1)
  );
  assert_eq!(
    cache.get_if_present(&key("row", "b")).unwrap().value(),
    Some(&2)
  );
  assert!(cache.get_if_present(&key("other", "a")).is_none());
}

#[test]
fn test_replacement_keeps_latest_value() {
  let cache = CacheBuilder::new().build::<i32>().unwrap();

  cache.put(key("row", "a"), CacheValue::new(1));
  cache.put(key("row", "a"), CacheValue::new(2));

  assert_eq!(cache.len(), 1);
  assert_eq!(
    cache.get_if_present(&key("row", "a")).unwrap().value(),
    Some(&2)
  );
}

#[test]
fn test_invalidate_and_clear() {
  let cache = CacheBuilder::new().build::<i32>().unwrap();

  cache.put(key("row", "a"), CacheValue::new(1));
  cache.put(key("row", "b"), CacheValue::new(2));

  assert!(cache.invalidate(&key("row", "a")));
  assert!(
    !cache.invalidate(&key("row", "a")),
    "Double invalidate should report absence"
  );
  assert!(cache.get_if_present(&key("row", "a")).is_none());

  cache.clear();
  assert!(cache.is_empty());
  assert!(cache.get_if_present(&key("row", "b")).is_none());
}

#[test]
fn test_invalidate_all_removes_each_key() {
  let cache = CacheBuilder::new().build::<i32>().unwrap();

  for i in 0..4 {
    cache.put(key("row", &i.to_string()), CacheValue::new(i));
  }

  cache.invalidate_all(vec![key("row", "0"), key("row", "2")]);

  assert_eq!(cache.len(), 2);
  assert!(cache.get_if_present(&key("row", "0")).is_none());
  assert!(cache.get_if_present(&key("row", "1")).is_some());
  assert!(cache.get_if_present(&key("row", "2")).is_none());
  assert!(cache.get_if_present(&key("row", "3")).is_some());
}

#[test]
fn test_get_all_present_skips_missing() {
  let cache = CacheBuilder::new().build::<i32>().unwrap();

  cache.put(key("row", "a"), CacheValue::new(1));
  cache.put(key("row", "c"), CacheValue::new(3));

  let found = cache.get_all_present(vec![
    key("row", "a"),
    key("row", "b"),
    key("row", "c"),
  ]);

  assert_eq!(found.len(), 2);
  assert_eq!(found[&key("row", "a")].value(), Some(&1));
  assert_eq!(found[&key("row", "c")].value(), Some(&3));
  assert!(!found.contains_key(&key("row", "b")));
}

#[test]
fn test_lru_eviction_at_capacity() {
  // One segment so the whole maximum applies to a single recency order.
  let cache = CacheBuilder::new()
    .maximum_size(2)
    .concurrency_level(1)
    .build::<i32>()
    .unwrap();

  cache.put(key("k", "a"), CacheValue::new(1));
  cache.put(key("k", "b"), CacheValue::new(2));

  // Touch "a" so "b" becomes the least recently used entry.
  assert!(cache.get_if_present(&key("k", "a")).is_some());

  cache.put(key("k", "c"), CacheValue::new(3));

  assert!(cache.get_if_present(&key("k", "a")).is_some());
  assert!(
    cache.get_if_present(&key("k", "b")).is_none(),
    "LRU entry should have been evicted"
  );
  assert!(cache.get_if_present(&key("k", "c")).is_some());
  assert!(cache.stats().eviction_count >= 1);
}

#[test]
fn test_record_stats_disabled_keeps_counters_at_zero() {
  let cache = CacheBuilder::new()
    .record_stats(false)
    .build::<i32>()
    .unwrap();

  cache.put(key("row", "a"), CacheValue::new(1));
  assert!(cache.get_if_present(&key("row", "a")).is_some());
  assert!(cache.get_if_present(&key("row", "b")).is_none());

  let stats = cache.stats();
  assert_eq!(stats.hit_count, 0);
  assert_eq!(stats.miss_count, 0);
  assert_eq!(stats.hit_rate(), 1.0);
}
