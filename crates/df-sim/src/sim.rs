//! Simulation runner with step cutback and result recording.

use df_core::{ensure_finite, ensure_positive};
use nalgebra::DVector;
use tracing::{debug, info, warn};

use crate::error::{SimError, SimResult};
use crate::integrator::{
    BackwardEuler, Integrator, JacobianMode, Trapezoid, consistent_algebraic,
};
use crate::model::DaeModel;
use crate::newton::NewtonConfig;

/// Which one-step method advances the DAE.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IntegratorType {
    /// First order, L-stable; damps switching transients.
    #[default]
    BackwardEuler,
    /// Second order, A-stable.
    Trapezoid,
}

/// Step control for [`run_sim`].
#[derive(Clone, Debug)]
pub struct SimOptions {
    /// Nominal and largest step, seconds
    pub dt: f64,
    /// End time, seconds
    pub t_end: f64,
    /// Cap on accepted steps
    pub max_steps: usize,
    /// Keep every N-th accepted state
    pub record_every: usize,
    pub integrator: IntegratorType,
    /// Smallest step allowed after cutbacks (seconds)
    pub min_dt: f64,
    /// Maximum consecutive retries of one step
    pub max_retries: usize,
    /// Step multiplier after a retryable failure
    pub cutback_factor: f64,
    /// Step multiplier after a success, capped at `dt`
    pub grow_factor: f64,
    /// Iteration matrix source
    pub jacobian: JacobianMode,
    /// Solve the algebraic equations at `t = 0` before stepping
    pub init_algebraic: bool,
    pub newton: NewtonConfig,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            dt: 1e-2,
            t_end: 1.0,
            max_steps: 100_000,
            record_every: 1,
            integrator: IntegratorType::default(),
            min_dt: 1e-6,
            max_retries: 8,
            cutback_factor: 0.5,
            grow_factor: 2.0,
            jacobian: JacobianMode::default(),
            init_algebraic: true,
            newton: NewtonConfig::default(),
        }
    }
}

impl SimOptions {
    fn validate(&self) -> SimResult<()> {
        ensure_positive(self.dt, "dt")?;
        ensure_finite(self.t_end, "t_end")?;
        if self.t_end < 0.0 {
            return Err(SimError::InvalidArg {
                what: "t_end must be non-negative",
            });
        }
        if self.max_steps == 0 || self.record_every == 0 {
            return Err(SimError::InvalidArg {
                what: "max_steps and record_every must be positive",
            });
        }
        if !(self.cutback_factor > 0.0 && self.cutback_factor < 1.0) {
            return Err(SimError::InvalidArg {
                what: "cutback_factor must be in (0, 1)",
            });
        }
        if self.grow_factor < 1.0 || self.min_dt <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "grow_factor must be >= 1 and min_dt positive",
            });
        }
        Ok(())
    }
}

/// Accepted states, with the final state always included.
#[derive(Clone, Debug)]
pub struct SimRecord {
    pub t: Vec<f64>,
    pub x: Vec<DVector<f64>>,
}

impl SimRecord {
    pub fn last(&self) -> Option<(f64, &DVector<f64>)> {
        Some((*self.t.last()?, self.x.last()?))
    }
}

fn step_once<M: DaeModel>(
    model: &M,
    opts: &SimOptions,
    t: f64,
    x: &DVector<f64>,
    dt: f64,
) -> SimResult<DVector<f64>> {
    match opts.integrator {
        IntegratorType::BackwardEuler => {
            BackwardEuler.step(model, t, x, dt, &opts.newton, opts.jacobian)
        }
        IntegratorType::Trapezoid => Trapezoid.step(model, t, x, dt, &opts.newton, opts.jacobian),
    }
}

/// Integrate `model` from `x0` at `t = 0` to `opts.t_end`.
///
/// Retryable failures cut the step by `cutback_factor` and retry from the
/// last accepted state; the discrete memory is committed only after a step
/// is accepted.
pub fn run_sim<M: DaeModel>(
    model: &mut M,
    x0: DVector<f64>,
    opts: &SimOptions,
) -> SimResult<SimRecord> {
    opts.validate()?;
    if x0.len() != model.len() {
        return Err(SimError::InvalidArg {
            what: "initial state length does not match the model",
        });
    }

    let mut t = 0.0;
    let mut x = if opts.init_algebraic {
        consistent_algebraic(&*model, &x0, t, &opts.newton, opts.jacobian)?
    } else {
        x0
    };
    model.commit_step(&x, t)?;

    let mut record = SimRecord {
        t: vec![t],
        x: vec![x.clone()],
    };

    let mut dt = opts.dt;
    let mut step = 0;
    let eps = 1e-12 * opts.t_end.max(1.0);
    while t < opts.t_end - eps && step < opts.max_steps {
        let h = dt.min(opts.t_end - t);
        let mut retries = 0;
        let mut h_try = h;
        let x_new = loop {
            match step_once(&*model, opts, t, &x, h_try) {
                Ok(x_new) => break x_new,
                Err(e) if e.is_retryable() => {
                    retries += 1;
                    h_try *= opts.cutback_factor;
                    warn!(t, dt = h_try, retries, error = %e, "step rejected, cutting back");
                    if retries > opts.max_retries || h_try < opts.min_dt {
                        return Err(SimError::StepTooSmall { t, dt: h_try });
                    }
                }
                Err(e) => return Err(e),
            }
        };

        t += h_try;
        x = x_new;
        model.commit_step(&x, t)?;
        step += 1;
        debug!(t, dt = h_try, step, "step accepted");

        dt = if retries > 0 {
            h_try
        } else {
            (h_try * opts.grow_factor).min(opts.dt)
        };

        if step % opts.record_every == 0 {
            record.t.push(t);
            record.x.push(x.clone());
        }
    }

    // final state even when decimated away
    if step % opts.record_every != 0 {
        record.t.push(t);
        record.x.push(x);
    }

    info!(t_end = t, steps = step, "simulation finished");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_options_defaults() {
        let opts = SimOptions::default();
        assert_eq!(opts.dt, 1e-2);
        assert_eq!(opts.integrator, IntegratorType::BackwardEuler);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn sim_options_invalid() {
        let opts = SimOptions {
            dt: 0.0,
            ..SimOptions::default()
        };
        assert!(matches!(opts.validate(), Err(SimError::Core(_))));

        let opts = SimOptions {
            cutback_factor: 1.5,
            ..SimOptions::default()
        };
        assert!(opts.validate().is_err());
    }
}
