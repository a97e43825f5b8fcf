pub(crate) mod batch_pool;
pub(crate) mod notifier;
