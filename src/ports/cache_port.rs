//! Result cache port trait.

use crate::domain::backtest::RunResult;
use crate::domain::error::HindcastError;

/// Aggregate numbers for `cache stats`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub models: usize,
    pub total_bytes: u64,
}

pub trait CachePort {
    /// Whether a stored result exists for this key.
    fn contains(&self, key: &str) -> bool;

    /// Load the stored result, or `None` when the key is absent or the
    /// entry is unreadable.
    fn load(&self, key: &str) -> Result<Option<RunResult>, HindcastError>;

    fn store(&self, key: &str, result: &RunResult) -> Result<(), HindcastError>;

    fn stats(&self) -> Result<CacheStats, HindcastError>;

    /// Remove entries, optionally only those older than `older_than_days`.
    /// Returns how many were removed.
    fn clear(&self, older_than_days: Option<u64>) -> Result<usize, HindcastError>;
}
