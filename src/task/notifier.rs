use crate::key::{CacheKey, CacheValue};
use crate::listener::{RemovalCause, RemovalListener};

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel as channel;

/// A message sent to the notifier thread.
pub(crate) type Notification<V> = (CacheKey, Arc<CacheValue<V>>, RemovalCause);

/// Queue capacity for pending removal notifications.
const NOTIFICATION_CHANNEL_CAPACITY: usize = 128;

/// How long a cache operation may block enqueueing a notification before
/// the event is dropped. A stalled listener loses events; it never wedges
/// a shard.
const NOTIFICATION_ENQUEUE_TIMEOUT: Duration = Duration::from_millis(100);

/// The background thread responsible for calling the user-provided removal
/// listener.
///
/// Removal events are enqueued after the owning shard has committed the
/// removal and while that shard's lock is still held, so two events for the
/// same key are always observed in causal order.
pub(crate) struct Notifier {
  _handle: JoinHandle<()>,
}

impl Notifier {
  /// Spawns the notifier thread. The thread exits once every
  /// `NotificationSender` has been dropped.
  pub(crate) fn spawn<V>(listener: Arc<dyn RemovalListener<V>>) -> (Self, NotificationSender<V>)
  where
    V: Send + Sync + 'static,
  {
    let (tx, rx) = channel::bounded::<Notification<V>>(NOTIFICATION_CHANNEL_CAPACITY);

    let handle = thread::spawn(move || {
      while let Ok((key, value, cause)) = rx.recv() {
        listener.on_removal(key, value, cause);
      }
    });

    (Self { _handle: handle }, NotificationSender { tx })
  }
}

/// Sending half of the notification channel, held by `CacheShared`.
pub(crate) struct NotificationSender<V> {
  tx: channel::Sender<Notification<V>>,
}

impl<V> Clone for NotificationSender<V> {
  fn clone(&self) -> Self {
    Self { tx: self.tx.clone() }
  }
}

impl<V> NotificationSender<V> {
  /// Enqueues a removal event, blocking up to the enqueue timeout if the
  /// queue is full, then dropping the event.
  pub(crate) fn send(&self, key: CacheKey, value: Arc<CacheValue<V>>, cause: RemovalCause) {
    let _ = self
      .tx
      .send_timeout((key, value, cause), NOTIFICATION_ENQUEUE_TIMEOUT);
  }
}
