use thiserror::Error;

pub type DfResult<T> = Result<T, DfError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DfError {
    #[error("{what} must be finite, got {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("{what} must be positive, got {value}")]
    NonPositive { what: &'static str, value: f64 },
}
