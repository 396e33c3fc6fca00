use chrono::NaiveDate;
use thiserror::Error;

use crate::models::Dimension;

/// Errors raised by the filter-and-aggregate pipeline.
///
/// Empty selections are never errors; these only cover requests that name
/// something the dataset cannot answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("unknown dimension `{0}` (expected one of: {names})", names = Dimension::names())]
    UnknownDimension(String),

    #[error("dimension `{0}` is not present in the loaded dataset")]
    MissingDimension(Dimension),

    #[error("filter `{0}` must look like dimension=value[,value...]")]
    InvalidFilter(String),

    #[error("date range starts at {from} but ends earlier at {to}")]
    InvalidDateRange { from: NaiveDate, to: NaiveDate },
}
