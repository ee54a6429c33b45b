//! Error types for expression compilation and evaluation.

use thiserror::Error;

/// Result type for compile-time expression operations.
pub type ExprResult<T> = Result<T, ExprError>;

/// Result type for numeric evaluation.
pub type EvalResult<T> = Result<T, EvalError>;

/// Errors detected while turning equation text into a compiled expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("Parse error in `{expr}` at {pos}: {what}")]
    Parse {
        expr: String,
        pos: usize,
        what: String,
    },

    #[error("Undeclared symbol `{name}` in `{expr}`")]
    UndeclaredSymbol { name: String, expr: String },

    #[error("Unknown function `{name}` in `{expr}`")]
    UnknownFunction { name: String, expr: String },

    #[error("Symbol `{name}` is already declared")]
    DuplicateSymbol { name: String },
}

/// Recoverable per-evaluation failures.
///
/// These surface to the integrator, which may shrink the step and retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Domain error: {func}({value}) at row {row}")]
    Domain {
        func: &'static str,
        value: f64,
        row: usize,
    },

    #[error("Non-finite result {value} at row {row}")]
    NonFinite { value: f64, row: usize },

    #[error("Column for slot {slot} has {actual} rows, expected {expected}")]
    Shape {
        slot: usize,
        expected: usize,
        actual: usize,
    },

    #[error("State vector has {actual} entries, expected {expected}")]
    Length { expected: usize, actual: usize },
}

impl EvalError {
    /// Shape errors come from the caller, not from the numerics.
    pub fn is_shape(&self) -> bool {
        matches!(self, EvalError::Shape { .. } | EvalError::Length { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ExprError::UndeclaredSymbol {
            name: "pmx".to_string(),
            expr: "pmx - pout".to_string(),
        };
        assert!(err.to_string().contains("pmx"));

        let err = EvalError::Domain {
            func: "sqrt",
            value: -1.0,
            row: 3,
        };
        assert!(err.to_string().contains("sqrt"));
    }
}
