//! Core domain types and logic.

pub mod backtest;
pub mod dates;
pub mod error;
pub mod features;
pub mod frame;
pub mod metrics;
pub mod model;
pub mod recipe;
pub mod transform;
