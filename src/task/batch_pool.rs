use std::thread::{self, JoinHandle};

use crossbeam_channel as channel;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed pool of worker threads for batch loads.
///
/// Jobs are plain closures; a `get_all` call submits one job per batch of
/// missing keys and harvests results over its own channel with a deadline.
/// A batch that overruns the deadline is abandoned by the caller, not
/// cancelled: the worker finishes, finds the result channel disconnected,
/// and moves on to the next job. No thread is leaked and no late result is
/// ever merged into the cache.
pub(crate) struct BatchPool {
  tx: channel::Sender<Job>,
  _handles: Vec<JoinHandle<()>>,
}

impl BatchPool {
  /// Spawns `workers` threads. They exit once the pool (the only sender)
  /// is dropped and the queue drains.
  pub(crate) fn spawn(workers: usize) -> Self {
    let (tx, rx) = channel::unbounded::<Job>();

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers.max(1) {
      let rx = rx.clone();
      handles.push(thread::spawn(move || {
        while let Ok(job) = rx.recv() {
          job();
        }
      }));
    }

    Self {
      tx,
      _handles: handles,
    }
  }

  pub(crate) fn submit(&self, job: impl FnOnce() + Send + 'static) {
    // The receivers outlive every submit call, so this cannot fail.
    let _ = self.tx.send(Box::new(job));
  }
}
