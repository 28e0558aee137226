//! Concrete adapter implementations for ports.

pub mod cache_adapter;
pub mod csv_adapter;
pub mod output_adapter;
