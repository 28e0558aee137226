//! Domain error types.
//!
//! Configuration problems are fatal before any I/O; data-insufficiency
//! conditions are handled inside the backtest engine as NaN metrics and never
//! surface here. Cache corruption is downgraded to a miss by the cache
//! adapter, so `Cache` errors only cover unrecoverable filesystem failures.

/// Top-level error type for hindcast.
#[derive(Debug, thiserror::Error)]
pub enum HindcastError {
    #[error("recipe parse error in {file}: {reason}")]
    RecipeParse { file: String, reason: String },

    #[error("invalid recipe value {field}: {reason}")]
    RecipeInvalid { field: String, reason: String },

    #[error("unknown model: {name} (available: {available})")]
    UnknownModel { name: String, available: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no trained run found under {base_dir} for prefix {prefix}")]
    NoTrainedRun { base_dir: String, prefix: String },

    #[error("cache error: {reason}")]
    Cache { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&HindcastError> for std::process::ExitCode {
    fn from(err: &HindcastError) -> Self {
        let code: u8 = match err {
            HindcastError::Io(_) => 1,
            HindcastError::RecipeParse { .. }
            | HindcastError::RecipeInvalid { .. }
            | HindcastError::UnknownModel { .. } => 2,
            HindcastError::Data { .. } => 3,
            HindcastError::NoTrainedRun { .. } => 4,
            HindcastError::Cache { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
