use loadcache::{CacheBuilder, CacheKey, CacheValue, RemovalCause, RemovalListener};

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Forwards every notification to a channel the test can drain.
struct ChannelListener {
  sender: Sender<(CacheKey, Arc<CacheValue<String>>, RemovalCause)>,
}

impl RemovalListener<String> for ChannelListener {
  fn on_removal(&self, key: CacheKey, value: Arc<CacheValue<String>>, cause: RemovalCause) {
    let _ = self.sender.send((key, value, cause));
  }
}

fn listener() -> (
  ChannelListener,
  Receiver<(CacheKey, Arc<CacheValue<String>>, RemovalCause)>,
) {
  let (tx, rx) = unbounded();
  (ChannelListener { sender: tx }, rx)
}

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

#[test]
fn test_listener_explicit_on_invalidate() {
  let (listener, rx) = listener();
  let cache = CacheBuilder::new()
    .build_with_listener::<String, _>(listener)
    .unwrap();

  cache.put(CacheKey::new("k", "a"), CacheValue::new("one".to_string()));
  assert!(cache.invalidate(&CacheKey::new("k", "a")));

  let (key, value, cause) = rx.recv_timeout(RECV_TIMEOUT).unwrap();
  assert_eq!(key, CacheKey::new("k", "a"));
  assert_eq!(value.value(), Some(&"one".to_string()));
  assert_eq!(cause, RemovalCause::Explicit);
  assert!(!cause.was_evicted());
}

#[test]
fn test_listener_replaced_on_put_over_live_entry() {
  let (listener, rx) = listener();
  let cache = CacheBuilder::new()
    .build_with_listener::<String, _>(listener)
    .unwrap();

  cache.put(CacheKey::new("k", "a"), CacheValue::new("old".to_string()));
  cache.put(CacheKey::new("k", "a"), CacheValue::new("new".to_string()));

  let (key, value, cause) = rx.recv_timeout(RECV_TIMEOUT).unwrap();
  assert_eq!(key, CacheKey::new("k", "a"));
  assert_eq!(value.value(), Some(&"old".to_string()));
  assert_eq!(cause, RemovalCause::Replaced);
}

#[test]
fn test_listener_size_on_capacity_eviction() {
  let (listener, rx) = listener();
  let cache = CacheBuilder::new()
    .maximum_size(2)
    .concurrency_level(1)
    .build_with_listener::<String, _>(listener)
    .unwrap();

  cache.put(CacheKey::new("k", "a"), CacheValue::new("one".to_string()));
  cache.put(CacheKey::new("k", "b"), CacheValue::new("two".to_string()));
  cache.put(CacheKey::new("k", "c"), CacheValue::new("three".to_string()));

  let (key, value, cause) = rx.recv_timeout(RECV_TIMEOUT).unwrap();
  assert_eq!(key, CacheKey::new("k", "a"), "Oldest untouched entry goes");
  assert_eq!(value.value(), Some(&"one".to_string()));
  assert_eq!(cause, RemovalCause::Size);
  assert!(cause.was_evicted());
}

#[test]
fn test_listener_expired_on_replacing_lapsed_entry() {
  let (listener, rx) = listener();
  let cache = CacheBuilder::new()
    .expire_after_write(Duration::from_millis(50))
    .concurrency_level(1)
    .build_with_listener::<String, _>(listener)
    .unwrap();

  cache.put(CacheKey::new("k", "a"), CacheValue::new("old".to_string()));
  thread::sleep(Duration::from_millis(120));
  // The old entry lapsed before it was displaced, so the removal is
  // reported as expiry rather than replacement.
  cache.put(CacheKey::new("k", "a"), CacheValue::new("new".to_string()));

  let (key, value, cause) = rx.recv_timeout(RECV_TIMEOUT).unwrap();
  assert_eq!(key, CacheKey::new("k", "a"));
  assert_eq!(value.value(), Some(&"old".to_string()));
  assert_eq!(cause, RemovalCause::Expired);
}

#[test]
fn test_listener_expired_via_maintenance() {
  let (listener, rx) = listener();
  let cache = CacheBuilder::new()
    .expire_after_write(Duration::from_millis(50))
    .concurrency_level(1)
    .build_with_listener::<String, _>(listener)
    .unwrap();

  cache.put(CacheKey::new("k", "stale"), CacheValue::new("v".to_string()));
  thread::sleep(Duration::from_millis(120));
  // An unrelated write piggybacks maintenance on the same segment.
  cache.put(CacheKey::new("k", "fresh"), CacheValue::new("w".to_string()));

  let (key, _value, cause) = rx.recv_timeout(RECV_TIMEOUT).unwrap();
  assert_eq!(key, CacheKey::new("k", "stale"));
  assert_eq!(cause, RemovalCause::Expired);
  assert!(cache.get_if_present(&CacheKey::new("k", "fresh")).is_some());
}

#[test]
fn test_listener_collected_for_soft_tier() {
  let (listener, rx) = listener();
  let cache = CacheBuilder::new()
    .maximum_size(8)
    .soft_values()
    .soft_capacity(1)
    .concurrency_level(1)
    .build_with_listener::<String, _>(listener)
    .unwrap();

  cache.put(CacheKey::new("k", "a"), CacheValue::new("one".to_string()));
  cache.put(CacheKey::new("k", "b"), CacheValue::new("two".to_string()));

  // The soft tier reclaims down to its threshold well before the hard
  // maximum is reached.
  let (key, _value, cause) = rx.recv_timeout(RECV_TIMEOUT).unwrap();
  assert_eq!(key, CacheKey::new("k", "a"));
  assert_eq!(cause, RemovalCause::Collected);
  assert!(cause.was_evicted());
  assert!(cache.get_if_present(&CacheKey::new("k", "b")).is_some());
}

#[test]
fn test_listener_explicit_for_every_cleared_entry() {
  let (listener, rx) = listener();
  let cache = CacheBuilder::new()
    .build_with_listener::<String, _>(listener)
    .unwrap();

  for i in 0..3 {
    cache.put(
      CacheKey::new("k", i.to_string()),
      CacheValue::new(i.to_string()),
    );
  }
  cache.clear();

  let mut causes = vec![];
  for _ in 0..3 {
    let (_key, _value, cause) = rx.recv_timeout(RECV_TIMEOUT).unwrap();
    causes.push(cause);
  }
  assert!(causes.iter().all(|c| *c == RemovalCause::Explicit));
}

#[test]
fn test_replacement_notifications_arrive_in_write_order() {
  let (listener, rx) = listener();
  let cache = CacheBuilder::new()
    .build_with_listener::<String, _>(listener)
    .unwrap();

  let key = CacheKey::new("k", "a");
  for i in 0..5 {
    cache.put(key.clone(), CacheValue::new(format!("v{i}")));
  }

  // Each put displaces the previous value; the listener must see them in
  // the order the writes happened.
  for i in 0..4 {
    let (_key, value, cause) = rx.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(value.value(), Some(&format!("v{i}")));
    assert_eq!(cause, RemovalCause::Replaced);
  }
}
