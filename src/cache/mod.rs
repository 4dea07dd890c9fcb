//! Process-wide cache of ledger state, keyed by a sum type so the period and
//! aggregate namespaces cannot collide.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::domain::{LedgerAggregates, Period, PeriodOrdinal};

/// Every key the cache can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Period {
        ledger_id: Uuid,
        ordinal: PeriodOrdinal,
    },
    Aggregates {
        ledger_id: Uuid,
    },
}

/// Every value the cache can hold.
#[derive(Debug, Clone)]
pub enum CachedValue {
    Period(Period),
    Aggregates(LedgerAggregates),
}

/// Typed handle pairing a key with the value type stored under it.
pub trait CacheSlot {
    type Value: Clone + Send + 'static;

    fn key(&self) -> CacheKey;
    fn wrap(value: Self::Value) -> CachedValue;
    fn unwrap(value: CachedValue) -> Option<Self::Value>;
}

#[derive(Debug, Clone, Copy)]
pub struct PeriodSlot {
    pub ledger_id: Uuid,
    pub ordinal: PeriodOrdinal,
}

impl CacheSlot for PeriodSlot {
    type Value = Period;

    fn key(&self) -> CacheKey {
        CacheKey::Period {
            ledger_id: self.ledger_id,
            ordinal: self.ordinal,
        }
    }

    fn wrap(value: Period) -> CachedValue {
        CachedValue::Period(value)
    }

    fn unwrap(value: CachedValue) -> Option<Period> {
        match value {
            CachedValue::Period(period) => Some(period),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AggregatesSlot {
    pub ledger_id: Uuid,
}

impl CacheSlot for AggregatesSlot {
    type Value = LedgerAggregates;

    fn key(&self) -> CacheKey {
        CacheKey::Aggregates {
            ledger_id: self.ledger_id,
        }
    }

    fn wrap(value: LedgerAggregates) -> CachedValue {
        CachedValue::Aggregates(value)
    }

    fn unwrap(value: CachedValue) -> Option<LedgerAggregates> {
        match value {
            CachedValue::Aggregates(aggregates) => Some(aggregates),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: CachedValue,
    pub updated_at: Instant,
}

/// Single process-wide key/value table.
///
/// No locking discipline beyond the table mutex: consistency across
/// suspension points is the optimistic protocol's job, not the cache's.
pub struct LedgerCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    staleness: Duration,
    revision: AtomicU64,
}

impl LedgerCache {
    /// `staleness` is the window within which a value is trusted without a
    /// store round-trip.
    pub fn new(staleness: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            staleness,
            revision: AtomicU64::new(0),
        }
    }

    pub fn get<S: CacheSlot>(&self, slot: &S) -> Option<S::Value> {
        let entries = self.entries.lock();
        entries
            .get(&slot.key())
            .and_then(|entry| S::unwrap(entry.value.clone()))
    }

    /// Like `get`, but only while the entry is younger than the staleness
    /// window.
    pub fn get_fresh<S: CacheSlot>(&self, slot: &S) -> Option<S::Value> {
        let entries = self.entries.lock();
        let entry = entries.get(&slot.key())?;
        if entry.updated_at.elapsed() >= self.staleness {
            return None;
        }
        S::unwrap(entry.value.clone())
    }

    pub fn state<S: CacheSlot>(&self, slot: &S) -> Option<(S::Value, Instant)> {
        let entries = self.entries.lock();
        let entry = entries.get(&slot.key())?;
        Some((S::unwrap(entry.value.clone())?, entry.updated_at))
    }

    pub fn set<S: CacheSlot>(&self, slot: &S, value: S::Value) {
        let mut entries = self.entries.lock();
        entries.insert(
            slot.key(),
            CacheEntry {
                value: S::wrap(value),
                updated_at: Instant::now(),
            },
        );
        self.revision.fetch_add(1, Ordering::SeqCst);
    }

    pub fn invalidate(&self, key: CacheKey) {
        if self.entries.lock().remove(&key).is_some() {
            self.revision.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Bumped on every set or invalidation; consumers poll it to learn that
    /// something they rendered may have changed.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// The raw entry under a key, timestamp included. This is the rollback
    /// target of an optimistic mutation.
    pub(crate) fn entry_snapshot(&self, key: CacheKey) -> Option<CacheEntry> {
        self.entries.lock().get(&key).cloned()
    }

    /// Restores a pre-mutation snapshot, or removes the key when there was
    /// none.
    pub(crate) fn restore(&self, key: CacheKey, snapshot: Option<CacheEntry>) {
        let mut entries = self.entries.lock();
        match snapshot {
            Some(entry) => {
                entries.insert(key, entry);
            }
            None => {
                entries.remove(&key);
            }
        }
        self.revision.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn set_raw(&self, key: CacheKey, value: CachedValue) {
        self.entries.lock().insert(
            key,
            CacheEntry {
                value,
                updated_at: Instant::now(),
            },
        );
        self.revision.fetch_add(1, Ordering::SeqCst);
    }
}
