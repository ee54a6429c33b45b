//! Damped Newton iteration for the nonlinear system of one implicit step.

use nalgebra::{DMatrix, DVector};

use crate::error::{SimError, SimResult};

/// Newton iteration limits and tolerances.
#[derive(Clone, Debug)]
pub struct NewtonConfig {
    pub max_iter: usize,
    /// Converged when `|F| < tol`.
    pub tol: f64,
    /// ...or when `|F| < rel_tol * |F(x0)|`.
    pub rel_tol: f64,
    /// Step shrink factor while backtracking.
    pub backtrack: f64,
    pub max_backtracks: usize,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iter: 30,
            tol: 1e-10,
            rel_tol: 1e-10,
            backtrack: 0.5,
            max_backtracks: 20,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NewtonResult {
    pub x: DVector<f64>,
    pub residual_norm: f64,
    pub iterations: usize,
}

/// Solve `F(x) = 0` from `x0`.
///
/// Each Newton direction is damped until `|F|` decreases; trial points whose
/// evaluation fails with a retryable error count as no decrease. A singular
/// iteration matrix is [`SimError::SingularJacobian`] and running out of
/// iterations is [`SimError::ConvergenceFailed`]; both are retryable.
pub fn newton_solve<F, J>(
    x0: DVector<f64>,
    residual_fn: F,
    jacobian_fn: J,
    config: &NewtonConfig,
) -> SimResult<NewtonResult>
where
    F: Fn(&DVector<f64>) -> SimResult<DVector<f64>>,
    J: Fn(&DVector<f64>) -> SimResult<DMatrix<f64>>,
{
    let mut x = x0;
    let mut r = residual_fn(&x)?;
    let mut norm = r.norm();
    let target = config.tol.max(config.rel_tol * norm);

    for iter in 0..config.max_iter {
        if norm < target {
            return Ok(NewtonResult {
                x,
                residual_norm: norm,
                iterations: iter,
            });
        }

        let dx = jacobian_fn(&x)?
            .lu()
            .solve(&(-&r))
            .ok_or_else(|| SimError::SingularJacobian {
                what: format!("LU solve failed at iteration {iter}"),
            })?;

        (x, r) = backtrack(&x, &dx, norm, &residual_fn, config).ok_or_else(|| {
            SimError::ConvergenceFailed {
                what: format!("no descent at iteration {iter}, residual = {norm:e}"),
            }
        })??;
        norm = r.norm();
    }

    if norm < target {
        return Ok(NewtonResult {
            x,
            residual_norm: norm,
            iterations: config.max_iter,
        });
    }
    Err(SimError::ConvergenceFailed {
        what: format!(
            "{} iterations exhausted, residual = {norm:e}",
            config.max_iter
        ),
    })
}

/// First point along `x + alpha dx` (alpha = 1, beta, beta^2, ...) that lowers
/// the residual norm, with its residual. `None` when every trial fails.
fn backtrack<F>(
    x: &DVector<f64>,
    dx: &DVector<f64>,
    norm: f64,
    residual_fn: &F,
    config: &NewtonConfig,
) -> Option<SimResult<(DVector<f64>, DVector<f64>)>>
where
    F: Fn(&DVector<f64>) -> SimResult<DVector<f64>>,
{
    let mut alpha = 1.0;
    for _ in 0..config.max_backtracks {
        let trial = x + alpha * dx;
        match residual_fn(&trial) {
            Ok(r) if r.norm() < norm || r.norm() <= config.tol => return Some(Ok((trial, r))),
            Ok(_) | Err(SimError::Retryable { .. }) => alpha *= config.backtrack,
            Err(e) => return Some(Err(e)),
        }
    }
    None
}
