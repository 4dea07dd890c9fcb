//! The optimistic mutation protocol: every write pairs a local cache
//! transform with the durable operation it fronts.
//!
//! The pairing is enforced at compile time. `MutationBuilder` produces a
//! `TransformedMutation`, which produces an `OptimisticMutation`, and only
//! the last of those has `run`; there is no code path that performs a durable
//! write without a corresponding cache transform.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::future::Future;

use crate::cache::{CacheSlot, LedgerCache};
use crate::errors::LedgerError;

type Transform<V> = Box<dyn FnOnce(Option<V>) -> V + Send>;
type DurableOp = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), LedgerError>> + Send>;
type Reconcile = Box<dyn FnOnce(&LedgerCache) + Send>;

pub struct MutationBuilder<S: CacheSlot> {
    slot: S,
}

impl<S: CacheSlot> MutationBuilder<S> {
    pub fn new(slot: S) -> Self {
        Self { slot }
    }

    /// Supplies the pure local transform applied to whatever the cache holds
    /// when the mutation starts.
    pub fn transform<F>(self, transform: F) -> TransformedMutation<S>
    where
        F: FnOnce(Option<S::Value>) -> S::Value + Send + 'static,
    {
        TransformedMutation {
            slot: self.slot,
            transform: Box::new(transform),
        }
    }
}

pub struct TransformedMutation<S: CacheSlot> {
    slot: S,
    transform: Transform<S::Value>,
}

impl<S: CacheSlot> TransformedMutation<S> {
    /// Supplies the durable operation, completing the mutation.
    pub fn durable<F, Fut>(self, op: F) -> OptimisticMutation<S>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), LedgerError>> + Send + 'static,
    {
        OptimisticMutation {
            slot: self.slot,
            transform: self.transform,
            durable: Box::new(move || op().boxed()),
            reconcile: None,
        }
    }
}

pub struct OptimisticMutation<S: CacheSlot> {
    slot: S,
    transform: Transform<S::Value>,
    durable: DurableOp,
    reconcile: Option<Reconcile>,
}

impl<S: CacheSlot> OptimisticMutation<S> {
    /// Optional step run against the cache after the durable write commits.
    pub fn with_reconcile<F>(mut self, reconcile: F) -> Self
    where
        F: FnOnce(&LedgerCache) + Send + 'static,
    {
        self.reconcile = Some(Box::new(reconcile));
        self
    }

    /// Runs the protocol: snapshot, optimistic apply, durable write, then
    /// commit or roll back.
    ///
    /// The rollback target is the exact entry (value and timestamp) cached
    /// immediately before this mutation started, so interleaved mutations on
    /// the same key each restore their own predecessor state. The cache is
    /// never observable in a partially applied state.
    pub async fn run(self, cache: &LedgerCache) -> Result<(), LedgerError> {
        let key = self.slot.key();
        let prior = cache.entry_snapshot(key);
        let current = prior
            .as_ref()
            .and_then(|entry| S::unwrap(entry.value.clone()));
        let optimistic = (self.transform)(current);
        cache.set_raw(key, S::wrap(optimistic));

        match (self.durable)().await {
            Ok(()) => {
                if let Some(reconcile) = self.reconcile {
                    reconcile(cache);
                }
                Ok(())
            }
            Err(err) => {
                cache.restore(key, prior);
                Err(err)
            }
        }
    }
}
