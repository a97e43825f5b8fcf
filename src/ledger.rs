use crate::key::CacheKey;

use std::collections::HashMap;

use generational_arena::{Arena, Index};

#[derive(Debug)]
struct Node {
  key: CacheKey,
  next: Option<Index>,
  prev: Option<Index>,
}

/// A doubly linked list of keys backed by an arena, with O(1) lookup.
///
/// Head is the most recent position, tail the least recent. The same
/// structure serves both the recency order and the write order; only the
/// events that move a key to the front differ.
#[derive(Debug)]
struct KeyList {
  // Arena stores all nodes contiguously.
  nodes: Arena<Node>,
  // HashMap for O(1) lookup of a key to its node index in the arena.
  lookup: HashMap<CacheKey, Index>,
  head: Option<Index>,
  tail: Option<Index>,
}

impl KeyList {
  fn new() -> Self {
    Self {
      nodes: Arena::new(),
      lookup: HashMap::new(),
      head: None,
      tail: None,
    }
  }

  fn len(&self) -> usize {
    self.lookup.len()
  }

  // Helper to unlink a node from the list.
  // Does not touch the arena or the lookup map.
  fn unlink(&mut self, index: Index) {
    let node = &self.nodes[index];
    let prev_node_idx = node.prev;
    let next_node_idx = node.next;

    if let Some(prev_idx) = prev_node_idx {
      self.nodes[prev_idx].next = next_node_idx;
    } else {
      self.head = next_node_idx;
    }

    if let Some(next_idx) = next_node_idx {
      self.nodes[next_idx].prev = prev_node_idx;
    } else {
      self.tail = prev_node_idx;
    }
  }

  // Helper to push a node to the front (making it the new head).
  // Assumes the node is already in the arena.
  fn push_front_node(&mut self, index: Index) {
    let old_head_idx = self.head;
    self.nodes[index].next = old_head_idx;
    self.nodes[index].prev = None;
    self.head = Some(index);

    if let Some(old_head) = old_head_idx {
      self.nodes[old_head].prev = Some(index);
    }

    if self.tail.is_none() {
      self.tail = Some(index);
    }
  }

  /// Inserts a new key at the front, or moves an existing one there.
  fn push_front(&mut self, key: &CacheKey) {
    if let Some(&index) = self.lookup.get(key) {
      if self.head != Some(index) {
        self.unlink(index);
        self.push_front_node(index);
      }
    } else {
      let new_node = Node {
        key: key.clone(),
        next: None,
        prev: None,
      };
      let index = self.nodes.insert(new_node);
      self.lookup.insert(key.clone(), index);
      self.push_front_node(index);
    }
  }

  fn move_to_front(&mut self, key: &CacheKey) {
    if let Some(&index) = self.lookup.get(key) {
      if self.head != Some(index) {
        self.unlink(index);
        self.push_front_node(index);
      }
    }
  }

  /// Removes and returns the tail (least recent) key.
  fn pop_back(&mut self) -> Option<CacheKey> {
    let tail_index = self.tail?;
    let key = self.nodes[tail_index].key.clone();
    self.remove(&key);
    Some(key)
  }

  fn remove(&mut self, key: &CacheKey) -> bool {
    if let Some(index) = self.lookup.remove(key) {
      self.unlink(index);
      self.nodes.remove(index);
      true
    } else {
      false
    }
  }

  /// Collects up to `limit` keys from the tail, least recent first.
  fn back_keys(&self, limit: usize) -> Vec<CacheKey> {
    let mut keys = Vec::new();
    let mut current = self.tail;
    while let Some(index) = current {
      if keys.len() >= limit {
        break;
      }
      keys.push(self.nodes[index].key.clone());
      current = self.nodes[index].prev;
    }
    keys
  }

  fn clear(&mut self) {
    self.nodes.clear();
    self.lookup.clear();
    self.head = None;
    self.tail = None;
  }

  // A helper for tests, to get the order of keys from head to tail.
  #[cfg(test)]
  fn keys_as_vec(&self) -> Vec<CacheKey> {
    let mut keys = Vec::new();
    let mut current = self.head;
    while let Some(index) = current {
      keys.push(self.nodes[index].key.clone());
      current = self.nodes[index].next;
    }
    keys
  }
}

/// Per-shard bookkeeping for eviction decisions.
///
/// Two orders over the same key set:
/// - the **recency** order, advanced by inserts and lookups; its tail is
///   the least-recently-used key and the capacity-eviction victim;
/// - the **write** order, advanced by inserts and replacements only; its
///   tail is the oldest write and drives bounded expiry scans.
///
/// Keys that are equally stale come off each tail in ascending insertion
/// order, which keeps eviction deterministic.
#[derive(Debug)]
pub(crate) struct EvictionLedger {
  recency: KeyList,
  write_order: KeyList,
}

impl EvictionLedger {
  pub(crate) fn new() -> Self {
    Self {
      recency: KeyList::new(),
      write_order: KeyList::new(),
    }
  }

  /// The number of keys tracked by this ledger.
  pub(crate) fn len(&self) -> usize {
    self.recency.len()
  }

  /// Records an insert or replacement: the key becomes the most recent in
  /// both orders.
  pub(crate) fn on_insert(&mut self, key: &CacheKey) {
    self.recency.push_front(key);
    self.write_order.push_front(key);
  }

  /// Records a read hit: the key becomes the most recent in recency order.
  pub(crate) fn on_access(&mut self, key: &CacheKey) {
    self.recency.move_to_front(key);
  }

  /// Drops a key from both orders. Returns `false` if it was not tracked.
  pub(crate) fn on_remove(&mut self, key: &CacheKey) -> bool {
    let present = self.recency.remove(key);
    self.write_order.remove(key);
    present
  }

  /// Removes and returns the least-recently-used key.
  pub(crate) fn pop_lru(&mut self) -> Option<CacheKey> {
    let key = self.recency.pop_back()?;
    self.write_order.remove(&key);
    Some(key)
  }

  /// Up to `limit` keys in ascending write order (oldest write first).
  pub(crate) fn oldest_written(&self, limit: usize) -> Vec<CacheKey> {
    self.write_order.back_keys(limit)
  }

  /// Up to `limit` keys in ascending recency order (least recent first).
  pub(crate) fn least_recent(&self, limit: usize) -> Vec<CacheKey> {
    self.recency.back_keys(limit)
  }

  pub(crate) fn clear(&mut self) {
    self.recency.clear();
    self.write_order.clear();
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn k(name: &str) -> CacheKey {
    CacheKey::new(name, "field")
  }

  #[test]
  fn new_ledger_is_empty() {
    let ledger = EvictionLedger::new();
    assert_eq!(ledger.len(), 0);
    assert!(ledger.oldest_written(10).is_empty());
  }

  #[test]
  fn insert_order_drives_both_lists() {
    let mut ledger = EvictionLedger::new();
    ledger.on_insert(&k("a"));
    ledger.on_insert(&k("b"));
    ledger.on_insert(&k("c"));

    assert_eq!(ledger.len(), 3);
    assert_eq!(
      ledger.recency.keys_as_vec(),
      vec![k("c"), k("b"), k("a")],
      "Newest insert should be at the recency front"
    );
    assert_eq!(
      ledger.oldest_written(10),
      vec![k("a"), k("b"), k("c")],
      "Write order tail should be the oldest insert"
    );
  }

  #[test]
  fn access_moves_recency_but_not_write_order() {
    let mut ledger = EvictionLedger::new();
    ledger.on_insert(&k("a"));
    ledger.on_insert(&k("b"));
    ledger.on_access(&k("a"));

    assert_eq!(ledger.recency.keys_as_vec(), vec![k("a"), k("b")]);
    assert_eq!(
      ledger.oldest_written(10),
      vec![k("a"), k("b")],
      "Reads must not disturb write order"
    );
  }

  #[test]
  fn pop_lru_returns_least_recent_and_forgets_it() {
    let mut ledger = EvictionLedger::new();
    ledger.on_insert(&k("a"));
    ledger.on_insert(&k("b"));
    ledger.on_access(&k("a"));

    assert_eq!(ledger.pop_lru(), Some(k("b")));
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.oldest_written(10), vec![k("a")]);
  }

  #[test]
  fn reinsert_moves_write_order() {
    let mut ledger = EvictionLedger::new();
    ledger.on_insert(&k("a"));
    ledger.on_insert(&k("b"));
    ledger.on_insert(&k("a"));

    assert_eq!(ledger.len(), 2, "Reinsert must not grow the ledger");
    assert_eq!(ledger.oldest_written(10), vec![k("b"), k("a")]);
  }

  #[test]
  fn remove_non_existent_key_is_a_noop() {
    let mut ledger = EvictionLedger::new();
    ledger.on_insert(&k("a"));
    assert!(!ledger.on_remove(&k("missing")));
    assert_eq!(ledger.len(), 1);
  }

  #[test]
  fn clear_resets_everything() {
    let mut ledger = EvictionLedger::new();
    ledger.on_insert(&k("a"));
    ledger.on_insert(&k("b"));
    ledger.clear();
    assert_eq!(ledger.len(), 0);
    assert_eq!(ledger.pop_lru(), None);
  }
}
