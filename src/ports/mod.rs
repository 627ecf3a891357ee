//! Port traits for external collaborators.

pub mod calendar_port;
pub mod config_port;
pub mod data_port;
pub mod discretization_port;
pub mod signal_port;
pub mod solver_port;
