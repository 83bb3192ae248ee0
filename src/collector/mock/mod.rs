//! Mock query executor for testing.
//!
//! This module provides `MockExecutor` and pre-built scenarios for testing
//! sources, the poll cycle and the registry without a MySQL server.

mod executor;
mod scenarios;

pub use executor::MockExecutor;
