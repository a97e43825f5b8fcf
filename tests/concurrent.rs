use loadcache::{BoxError, CacheBuilder, CacheKey, CacheLoader, CacheValue};

use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc, Barrier,
};
use std::thread;

#[test]
fn test_concurrent_puts_and_reads() {
  let cache = Arc::new(CacheBuilder::new().maximum_size(10_000).build::<usize>().unwrap());
  let num_threads = 8;
  let keys_per_thread = 200;

  let barrier = Arc::new(Barrier::new(num_threads));
  let mut handles = vec![];
  for t in 0..num_threads {
    let cache = cache.clone();
    let barrier = barrier.clone();
    handles.push(thread::spawn(move || {
      barrier.wait();
      for i in 0..keys_per_thread {
        let key = CacheKey::new(t.to_string(), i.to_string());
        cache.put(key.clone(), CacheValue::new(t * 1000 + i));
        let read = cache.get_if_present(&key).unwrap();
        assert_eq!(read.value(), Some(&(t * 1000 + i)));
      }
    }));
  }
  for handle in handles {
    handle.join().unwrap();
  }

  assert_eq!(cache.len(), num_threads * keys_per_thread);
}

#[test]
fn test_distinct_keys_load_independently() {
  struct IdLoader {
    calls: Arc<AtomicUsize>,
  }
  impl CacheLoader<String> for IdLoader {
    fn load(&self, key: &CacheKey) -> Result<CacheValue<String>, BoxError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Ok(CacheValue::new(key.secondary().to_string()))
    }
  }

  let calls = Arc::new(AtomicUsize::new(0));
  let cache = Arc::new(
    CacheBuilder::new()
      .build_with_loader(IdLoader {
        calls: calls.clone(),
      })
      .unwrap(),
  );

  let num_threads = 8;
  let barrier = Arc::new(Barrier::new(num_threads));
  let mut handles = vec![];
  for t in 0..num_threads {
    let cache = cache.clone();
    let barrier = barrier.clone();
    handles.push(thread::spawn(move || {
      barrier.wait();
      // Each thread loads its own key plus one shared key.
      let own = cache.get(&CacheKey::new("own", t.to_string())).unwrap();
      assert_eq!(own.value(), Some(&t.to_string()));
      let shared = cache.get(&CacheKey::new("shared", "s")).unwrap();
      assert_eq!(shared.value(), Some(&"s".to_string()));
    }));
  }
  for handle in handles {
    handle.join().unwrap();
  }

  // One load per thread-private key, one shared load for everyone.
  assert_eq!(calls.load(Ordering::SeqCst), num_threads + 1);
}

#[test]
fn test_invalidation_races_with_loads() {
  struct SlowIdLoader;
  impl CacheLoader<String> for SlowIdLoader {
    fn load(&self, key: &CacheKey) -> Result<CacheValue<String>, BoxError> {
      thread::sleep(std::time::Duration::from_millis(1));
      Ok(CacheValue::new(key.secondary().to_string()))
    }
  }

  let cache = Arc::new(CacheBuilder::new().build_with_loader(SlowIdLoader).unwrap());
  let barrier = Arc::new(Barrier::new(2));

  let reader = {
    let cache = cache.clone();
    let barrier = barrier.clone();
    thread::spawn(move || {
      barrier.wait();
      for i in 0..100 {
        let key = CacheKey::new("k", (i % 10).to_string());
        let value = cache.get(&key).unwrap();
        assert_eq!(value.value(), Some(&(i % 10).to_string()));
      }
    })
  };
  let invalidator = {
    let cache = cache.clone();
    let barrier = barrier.clone();
    thread::spawn(move || {
      barrier.wait();
      for i in 0..100 {
        cache.invalidate(&CacheKey::new("k", (i % 10).to_string()));
      }
    })
  };

  reader.join().unwrap();
  invalidator.join().unwrap();
}
