//! Core domain types and logic.

pub mod allocator;
pub mod backtest;
pub mod calendar;
pub mod compositor;
pub mod config_validation;
pub mod diagnostics;
pub mod error;
pub mod estimator;
pub mod expander;
pub mod partition;
pub mod prices;
pub mod regime;
pub mod weights;
