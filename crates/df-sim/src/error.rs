//! Error types for time-domain simulation.

use df_core::DfError;
use df_expr::EvalError;
use df_system::SystemError;
use thiserror::Error;

/// Errors encountered during transient simulation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error(transparent)]
    Core(#[from] DfError),

    #[error("Convergence failed: {what}")]
    ConvergenceFailed { what: String },

    #[error("Singular Jacobian: {what}")]
    SingularJacobian { what: String },

    /// A per-evaluation failure; the step may be retried with a smaller size.
    #[error("Retryable failure: {message}")]
    Retryable { message: String },

    #[error("Step size {dt} fell below the minimum at t = {t}")]
    StepTooSmall { t: f64, dt: f64 },

    #[error("Backend error: {message}")]
    Backend { message: String },
}

pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    /// Failures that a smaller step may cure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SimError::Retryable { .. }
                | SimError::ConvergenceFailed { .. }
                | SimError::SingularJacobian { .. }
        )
    }
}

impl From<EvalError> for SimError {
    fn from(e: EvalError) -> Self {
        if e.is_shape() {
            return SimError::Backend {
                message: e.to_string(),
            };
        }
        SimError::Retryable {
            message: e.to_string(),
        }
    }
}

impl From<SystemError> for SimError {
    fn from(e: SystemError) -> Self {
        match e {
            SystemError::Eval(e) => e.into(),
            other => SimError::Backend {
                message: other.to_string(),
            },
        }
    }
}
