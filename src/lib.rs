#![doc(test(attr(deny(warnings))))]

//! Ledger Core implements the balance-chaining and cache-consistency engine
//! of a personal-finance ledger: per-period retotaling, forward balance
//! propagation across months, and the optimistic-mutation protocol that keeps
//! an in-memory cache consistent with a slower durable store.

pub mod cache;
pub mod config;
pub mod core;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod store;
pub mod utils;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Ledger Core tracing initialized.");
    });
}
