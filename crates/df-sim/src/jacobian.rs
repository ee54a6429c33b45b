//! Difference Jacobians of a residual, used as a fallback iteration matrix
//! and to audit symbolic partials.

use nalgebra::{DMatrix, DVector};

use crate::error::SimResult;
use crate::model::DaeModel;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DifferenceScheme {
    /// `(f(x + h e_j) - f(x)) / h`
    #[default]
    Forward,
    /// `(f(x + h e_j) - f(x - h e_j)) / 2h`
    Central,
}

/// Column-by-column difference Jacobian of `f` at `x`.
///
/// The perturbation of column `j` is `epsilon * max(|x_j|, 1)`.
pub fn difference_jacobian<F>(
    x: &DVector<f64>,
    f: F,
    epsilon: f64,
    scheme: DifferenceScheme,
) -> SimResult<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> SimResult<DVector<f64>>,
{
    let f0 = f(x)?;
    let mut jac = DMatrix::zeros(f0.len(), x.len());
    let mut probe = x.clone();

    for j in 0..x.len() {
        let h = epsilon * x[j].abs().max(1.0);
        probe[j] = x[j] + h;
        let plus = f(&probe)?;
        let column = match scheme {
            DifferenceScheme::Forward => (plus - &f0) / h,
            DifferenceScheme::Central => {
                probe[j] = x[j] - h;
                (plus - f(&probe)?) / (2.0 * h)
            }
        };
        probe[j] = x[j];
        jac.set_column(j, &column);
    }

    Ok(jac)
}

/// Worst disagreement between symbolic and difference Jacobians.
#[derive(Clone, Debug, PartialEq)]
pub struct JacobianMismatch {
    pub row: usize,
    pub col: usize,
    pub analytic: f64,
    pub numeric: f64,
}

impl JacobianMismatch {
    pub fn error(&self) -> f64 {
        (self.analytic - self.numeric).abs()
    }
}

/// Compare `model.jacobian` against central differences at `(x, t)`.
///
/// Returns the entry with the largest absolute error if it exceeds `tol`.
/// `x` should sit away from discrete switching points, since flags are
/// constants to the symbolic partials but not to the differences.
pub fn audit_jacobian<M: DaeModel>(
    model: &M,
    x: &DVector<f64>,
    t: f64,
    epsilon: f64,
    tol: f64,
) -> SimResult<Option<JacobianMismatch>> {
    let analytic = model.jacobian(x, t)?;
    let numeric = difference_jacobian(
        x,
        |z| model.residual(z, t),
        epsilon,
        DifferenceScheme::Central,
    )?;

    let worst = analytic
        .iter()
        .zip(numeric.iter())
        .enumerate()
        .map(|(k, (&a, &n))| (k, a, n))
        .max_by(|l, r| (l.1 - l.2).abs().total_cmp(&(r.1 - r.2).abs()));

    Ok(worst.and_then(|(k, a, n)| {
        // column-major storage
        let (row, col) = (k % analytic.nrows(), k / analytic.nrows());
        let mismatch = JacobianMismatch {
            row,
            col,
            analytic: a,
            numeric: n,
        };
        (mismatch.error() > tol).then_some(mismatch)
    }))
}
