//! psglot - live monitor for MySQL performance_schema counter tables.
//!
//! The library holds everything except process setup:
//! - `model` / `engine` - snapshot rows, totals, baseline deltas and ranking
//! - `collector` - query execution, per-table sources and the poll cycles
//! - `view` / `fmt` / `tui` - presentation

pub mod collector;
pub mod config;
pub mod engine;
pub mod fmt;
pub mod model;
pub mod tui;
pub mod view;
