//! Port trait definitions. Adapters in `crate::adapters` implement these;
//! orchestration code depends only on the traits.

pub mod cache_port;
pub mod data_port;
