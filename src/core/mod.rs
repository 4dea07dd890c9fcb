//! Orchestration: the optimistic mutation protocol, the recalculation
//! orchestrator, and the services that wire them to the store and cache.

pub mod mutation;
pub mod recalc;
pub mod services;

pub use mutation::{MutationBuilder, OptimisticMutation, TransformedMutation};
pub use recalc::{RecalcOutcome, RecalcRegistry, Recalculator};
pub use services::{LedgerService, PeriodService};
