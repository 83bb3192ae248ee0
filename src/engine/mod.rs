//! Snapshot arithmetic: totals, baseline deltas and ranking.
//!
//! Everything here is pure and synchronous. The poll cycle in
//! [`crate::collector`] decides when to call which function.

pub mod aggregate;
pub mod delta;
pub mod rank;

pub use aggregate::sum;
pub use delta::{NegativeDeltaAnomaly, compute_relative, needs_rebase, rebase};
pub use rank::rank;
