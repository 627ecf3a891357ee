//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod greedy_allocator;
pub mod nyse_calendar;
pub mod price_calendar;
pub mod tangency_solver;
