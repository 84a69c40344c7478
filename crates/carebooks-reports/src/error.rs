use carebooks_core::StoreError;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid report range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

pub type ReportResult<T> = Result<T, ReportError>;
