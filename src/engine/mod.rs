//! Pure balance computation: single-period retotal and cross-period chaining.

pub mod chain;
pub mod retotal;

pub use chain::{
    aggregates_at_boundary, chain_periods, extend_category_aggregates, extract_snapshot,
    recalc_period, resolve_base_snapshot, BaseProvenance, ChainResult, ResolvedBase,
};
pub use retotal::retotal;
