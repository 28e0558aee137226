//! hindcast — rolling-origin forecast evaluation harness.
//!
//! Loads a dated numeric table, assembles supervised datasets from a
//! declarative feature configuration, backtests interchangeable forecasting
//! plugins across horizons under frozen/refit retraining policies, and
//! memoizes results in a content-addressed cache.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in
//! [`ports`], concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
