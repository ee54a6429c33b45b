//! Implicit one-step integrators for semi-explicit DAEs.
//!
//! One step solves for `z = x(t + h)`:
//!
//! ```text
//! z_s - x_s - h * (theta * f(z) + (1 - theta) * f(x)) = 0   (states)
//! g(z) = 0                                                   (algebraic)
//! ```
//!
//! `theta = 1` is backward Euler, `theta = 1/2` the trapezoidal rule.

use nalgebra::{DMatrix, DVector};

use crate::error::SimResult;
use crate::jacobian::{DifferenceScheme, difference_jacobian};
use crate::model::DaeModel;
use crate::newton::{NewtonConfig, newton_solve};

/// How the iteration matrix is obtained.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum JacobianMode {
    /// Symbolic partials from the model.
    #[default]
    Analytic,
    /// Forward differences of the model residual.
    FiniteDifference { epsilon: f64 },
}

/// Trait for time integrators.
pub trait Integrator {
    /// Advance `x` at `t` by `dt`. Does not commit the step.
    fn step<M: DaeModel>(
        &self,
        model: &M,
        t: f64,
        x: &DVector<f64>,
        dt: f64,
        newton: &NewtonConfig,
        mode: JacobianMode,
    ) -> SimResult<DVector<f64>>;
}

/// Backward (implicit) Euler, first order, L-stable.
#[derive(Clone, Debug)]
pub struct BackwardEuler;

impl Integrator for BackwardEuler {
    fn step<M: DaeModel>(
        &self,
        model: &M,
        t: f64,
        x: &DVector<f64>,
        dt: f64,
        newton: &NewtonConfig,
        mode: JacobianMode,
    ) -> SimResult<DVector<f64>> {
        theta_step(model, t, x, dt, 1.0, newton, mode)
    }
}

/// Trapezoidal rule, second order.
#[derive(Clone, Debug)]
pub struct Trapezoid;

impl Integrator for Trapezoid {
    fn step<M: DaeModel>(
        &self,
        model: &M,
        t: f64,
        x: &DVector<f64>,
        dt: f64,
        newton: &NewtonConfig,
        mode: JacobianMode,
    ) -> SimResult<DVector<f64>> {
        theta_step(model, t, x, dt, 0.5, newton, mode)
    }
}

pub(crate) fn model_jacobian<M: DaeModel>(
    model: &M,
    z: &DVector<f64>,
    t: f64,
    mode: JacobianMode,
) -> SimResult<DMatrix<f64>> {
    match mode {
        JacobianMode::Analytic => model.jacobian(z, t),
        JacobianMode::FiniteDifference { epsilon } => {
            difference_jacobian(z, |v| model.residual(v, t), epsilon, DifferenceScheme::Forward)
        }
    }
}

fn theta_step<M: DaeModel>(
    model: &M,
    t: f64,
    x: &DVector<f64>,
    dt: f64,
    theta: f64,
    newton: &NewtonConfig,
    mode: JacobianMode,
) -> SimResult<DVector<f64>> {
    let ns = model.n_states();
    let t1 = t + dt;

    // explicit part of the state update, fixed for this step
    let f0 = if theta < 1.0 {
        model.residual(x, t)?.rows(0, ns).into_owned()
    } else {
        DVector::zeros(ns)
    };

    let residual = |z: &DVector<f64>| -> SimResult<DVector<f64>> {
        let mut r = model.residual(z, t1)?;
        for i in 0..ns {
            r[i] = z[i] - x[i] - dt * (theta * r[i] + (1.0 - theta) * f0[i]);
        }
        Ok(r)
    };
    let jacobian = |z: &DVector<f64>| -> SimResult<DMatrix<f64>> {
        let mut j = model_jacobian(model, z, t1, mode)?;
        for i in 0..ns {
            for c in 0..j.ncols() {
                j[(i, c)] *= -dt * theta;
            }
            j[(i, i)] += 1.0;
        }
        Ok(j)
    };

    Ok(newton_solve(x.clone(), residual, jacobian, newton)?.x)
}

/// Solve `g(x, y, t) = 0` for the algebraic part with states held fixed.
pub fn consistent_algebraic<M: DaeModel>(
    model: &M,
    x: &DVector<f64>,
    t: f64,
    newton: &NewtonConfig,
    mode: JacobianMode,
) -> SimResult<DVector<f64>> {
    let ns = model.n_states();
    let na = model.len() - ns;
    if na == 0 {
        return Ok(x.clone());
    }
    let full = |y: &DVector<f64>| {
        let mut z = x.clone();
        z.rows_mut(ns, na).copy_from(y);
        z
    };
    let residual = |y: &DVector<f64>| -> SimResult<DVector<f64>> {
        Ok(model.residual(&full(y), t)?.rows(ns, na).into_owned())
    };
    let jacobian = |y: &DVector<f64>| -> SimResult<DMatrix<f64>> {
        Ok(model_jacobian(model, &full(y), t, mode)?
            .view((ns, ns), (na, na))
            .into_owned())
    };
    let y0 = x.rows(ns, na).into_owned();
    Ok(full(&newton_solve(y0, residual, jacobian, newton)?.x))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `x' = -x`, `0 = 2x - y`.
    struct Decay;

    impl DaeModel for Decay {
        fn len(&self) -> usize {
            2
        }
        fn n_states(&self) -> usize {
            1
        }
        fn residual(&self, x: &DVector<f64>, _t: f64) -> SimResult<DVector<f64>> {
            Ok(DVector::from_vec(vec![-x[0], 2.0 * x[0] - x[1]]))
        }
        fn jacobian(&self, _x: &DVector<f64>, _t: f64) -> SimResult<DMatrix<f64>> {
            Ok(DMatrix::from_row_slice(2, 2, &[-1.0, 0.0, 2.0, -1.0]))
        }
        fn commit_step(&mut self, _x: &DVector<f64>, _t: f64) -> SimResult<()> {
            Ok(())
        }
    }

    #[test]
    fn backward_euler_decay() {
        let x0 = DVector::from_vec(vec![1.0, 2.0]);
        let x1 = BackwardEuler
            .step(&Decay, 0.0, &x0, 0.1, &NewtonConfig::default(), JacobianMode::Analytic)
            .unwrap();
        assert!((x1[0] - 1.0 / 1.1).abs() < 1e-12);
        assert!((x1[1] - 2.0 * x1[0]).abs() < 1e-12);
    }

    #[test]
    fn trapezoid_decay() {
        let x0 = DVector::from_vec(vec![1.0, 2.0]);
        let x1 = Trapezoid
            .step(&Decay, 0.0, &x0, 0.1, &NewtonConfig::default(), JacobianMode::Analytic)
            .unwrap();
        assert!((x1[0] - 0.95 / 1.05).abs() < 1e-12);
    }

    #[test]
    fn finite_difference_mode_agrees() {
        let x0 = DVector::from_vec(vec![1.0, 2.0]);
        let fd = JacobianMode::FiniteDifference { epsilon: 1e-7 };
        let a = BackwardEuler
            .step(&Decay, 0.0, &x0, 0.1, &NewtonConfig::default(), JacobianMode::Analytic)
            .unwrap();
        let b = BackwardEuler
            .step(&Decay, 0.0, &x0, 0.1, &NewtonConfig::default(), fd)
            .unwrap();
        assert!((a - b).norm() < 1e-9);
    }

    #[test]
    fn algebraic_initialization() {
        let x = DVector::from_vec(vec![1.5, 0.0]);
        let newton = NewtonConfig::default();
        let z = consistent_algebraic(&Decay, &x, 0.0, &newton, JacobianMode::Analytic).unwrap();
        assert_eq!(z[0], 1.5);
        assert!((z[1] - 3.0).abs() < 1e-12);
    }
}
