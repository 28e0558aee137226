//! Data access port trait.

use chrono::NaiveDate;

use crate::domain::error::HindcastError;
use crate::domain::frame::TimeSeriesFrame;
use crate::domain::recipe::DataSpec;

pub trait DataPort {
    /// Load a time-series frame, keeping only rows dated at or before
    /// `as_of` when one is given.
    fn load_frame(
        &self,
        spec: &DataSpec,
        as_of: Option<NaiveDate>,
    ) -> Result<TimeSeriesFrame, HindcastError>;
}
