//! The integrator-side view of an assembled DAE.

use df_system::Assembly;
use nalgebra::{DMatrix, DVector};

use crate::error::SimResult;

/// Semi-explicit DAE `x' = f(x, y, t)`, `0 = g(x, y, t)`.
///
/// The first [`DaeModel::n_states`] entries of the unknown vector are the
/// differential states; `residual` returns `[f; g]` in the same order.
pub trait DaeModel {
    fn len(&self) -> usize;

    fn n_states(&self) -> usize;

    fn residual(&self, x: &DVector<f64>, t: f64) -> SimResult<DVector<f64>>;

    fn jacobian(&self, x: &DVector<f64>, t: f64) -> SimResult<DMatrix<f64>>;

    /// Called once per accepted step, never for trial iterates.
    fn commit_step(&mut self, x: &DVector<f64>, t: f64) -> SimResult<()>;
}

impl DaeModel for Assembly {
    fn len(&self) -> usize {
        Assembly::len(self)
    }

    fn n_states(&self) -> usize {
        Assembly::n_states(self)
    }

    fn residual(&self, x: &DVector<f64>, t: f64) -> SimResult<DVector<f64>> {
        Ok(Assembly::residual(self, x, t)?)
    }

    fn jacobian(&self, x: &DVector<f64>, t: f64) -> SimResult<DMatrix<f64>> {
        Ok(Assembly::jacobian(self, x, t)?.to_dense())
    }

    fn commit_step(&mut self, x: &DVector<f64>, t: f64) -> SimResult<()> {
        Ok(Assembly::commit_step(self, x, t)?)
    }
}
