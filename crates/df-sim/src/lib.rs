//! Reference time-domain integrator for assembled DAE systems.
//!
//! Provides:
//! - [`DaeModel`]: the residual / Jacobian / commit contract
//! - Newton with backtracking line search (LU via nalgebra)
//! - backward Euler and trapezoidal steppers
//! - step cutback on retryable evaluation failures
//! - difference Jacobians and an audit of symbolic partials

pub mod error;
pub mod integrator;
pub mod jacobian;
pub mod model;
pub mod newton;
pub mod sim;

pub use error::{SimError, SimResult};
pub use integrator::{
    BackwardEuler, Integrator, JacobianMode, Trapezoid, consistent_algebraic,
};
pub use jacobian::{DifferenceScheme, JacobianMismatch, audit_jacobian, difference_jacobian};
pub use model::DaeModel;
pub use newton::{NewtonConfig, NewtonResult, newton_solve};
pub use sim::{IntegratorType, SimOptions, SimRecord, run_sim};
