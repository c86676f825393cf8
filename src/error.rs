use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeterError {
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Unknown meter type: {0}")]
    UnknownMeterType(String),

    #[error("Negative value {value} for {field}: meter values must be non-negative")]
    NegativeValue { field: String, value: f64 },

    #[error("A {meter_type} replacement is already recorded on {date}")]
    OverlappingReplacement { meter_type: String, date: NaiveDate },

    #[error("No record with id {0}")]
    NotFound(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MeterError>;
