//! Discrete blocks: per-instance selector flags from threshold comparisons.
//!
//! Flags are exported as 0/1 columns so equations can blend branches
//! arithmetically, e.g. `pnl * plim_zi + pmax * plim_zu + pmin * plim_zl`.
//! Within one block the `zl`/`zi`/`zu` flags are mutually exclusive and
//! exhaustive for every instance on every evaluation.

use df_core::flag;
use df_expr::{Columns, CompiledExpr, EvalResult};

/// Flag suffixes of a hard limiter, in slot order.
pub const LIMITER_FLAGS: [&str; 3] = ["zl", "zi", "zu"];

/// Flag suffixes of a deadband, in slot order.
pub const DEADBAND_FLAGS: [&str; 5] = ["zl", "zi", "zu", "zlr", "zur"];

/// Which band edge a deadband instance last left through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeldEdge {
    #[default]
    None,
    Lower,
    Upper,
}

/// `[zl, zi, zu]` for one instance of a hard limiter.
///
/// Boundaries belong to `zi`, so `v == upper` blends to exactly `upper`.
/// A disabled limiter is always within.
pub fn limiter_flags(v: f64, lower: f64, upper: f64, enable: bool) -> [bool; 3] {
    if !enable {
        return [false, true, false];
    }
    let below = v < lower;
    let above = !below && v > upper;
    [below, !below && !above, above]
}

/// `[zl, zi, zu, zlr, zur]` for one deadband instance.
///
/// `held` is the committed edge from the last accepted step; it is read,
/// never written, here. A disabled deadband is never inside and splits
/// `zl`/`zu` at `center`, so the blended output passes the input through.
pub fn deadband_flags(
    v: f64,
    lower: f64,
    upper: f64,
    center: f64,
    held: HeldEdge,
    enable: bool,
) -> [bool; 5] {
    if !enable {
        let below = v < center;
        return [below, false, !below, false, false];
    }
    let below = v < lower;
    let above = !below && v > upper;
    let inside = !below && !above;
    [
        below,
        inside,
        above,
        inside && held == HeldEdge::Lower,
        inside && held == HeldEdge::Upper,
    ]
}

/// Edge to hold after an accepted step with input `v`.
pub fn deadband_commit(v: f64, lower: f64, upper: f64, held: HeldEdge, enable: bool) -> HeldEdge {
    if !enable {
        return HeldEdge::None;
    }
    if v < lower {
        HeldEdge::Lower
    } else if v > upper {
        HeldEdge::Upper
    } else {
        held
    }
}

/// Hard limiter on a monitored expression.
#[derive(Debug, Clone, PartialEq)]
pub struct HardLimiter {
    pub name: String,
    pub origin: CompiledExpr,
    pub lower: CompiledExpr,
    pub upper: CompiledExpr,
    pub enable: bool,
    pub flag_slots: [usize; 3],
}

/// Deadband with edge memory.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadBand {
    pub name: String,
    pub origin: CompiledExpr,
    pub center: CompiledExpr,
    pub lower: CompiledExpr,
    pub upper: CompiledExpr,
    pub enable: bool,
    pub flag_slots: [usize; 5],
}

#[derive(Debug, Clone, PartialEq)]
pub enum Discrete {
    HardLimiter(HardLimiter),
    DeadBand(DeadBand),
}

/// Committed per-instance memory of a discrete block.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscreteMemory {
    Stateless,
    Held(Vec<HeldEdge>),
}

impl Discrete {
    pub fn name(&self) -> &str {
        match self {
            Discrete::HardLimiter(b) => &b.name,
            Discrete::DeadBand(b) => &b.name,
        }
    }

    pub fn flag_suffixes(&self) -> &'static [&'static str] {
        match self {
            Discrete::HardLimiter(_) => &LIMITER_FLAGS,
            Discrete::DeadBand(_) => &DEADBAND_FLAGS,
        }
    }

    pub fn flag_slots(&self) -> &[usize] {
        match self {
            Discrete::HardLimiter(b) => &b.flag_slots,
            Discrete::DeadBand(b) => &b.flag_slots,
        }
    }

    /// Expressions read when computing flags.
    pub fn inputs(&self) -> Vec<&CompiledExpr> {
        match self {
            Discrete::HardLimiter(b) => vec![&b.origin, &b.lower, &b.upper],
            Discrete::DeadBand(b) => vec![&b.origin, &b.center, &b.lower, &b.upper],
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            Discrete::HardLimiter(b) => b.enable,
            Discrete::DeadBand(b) => b.enable,
        }
    }

    /// Fresh committed memory for `rows` instances.
    pub fn memory(&self, rows: usize) -> DiscreteMemory {
        match self {
            Discrete::HardLimiter(_) => DiscreteMemory::Stateless,
            Discrete::DeadBand(_) => DiscreteMemory::Held(vec![HeldEdge::None; rows]),
        }
    }

    /// Compute flag columns (one per entry of [`Discrete::flag_slots`]).
    ///
    /// Pure with respect to `memory`: trial evaluations never alter it.
    pub fn check<C: Columns + ?Sized>(
        &self,
        cols: &C,
        memory: &DiscreteMemory,
    ) -> EvalResult<Vec<Vec<f64>>> {
        let n = cols.rows();
        match self {
            Discrete::HardLimiter(b) => {
                let v = b.origin.eval(cols)?;
                let lo = b.lower.eval(cols)?;
                let hi = b.upper.eval(cols)?;
                let mut out = vec![vec![0.0; n]; 3];
                for i in 0..n {
                    let z = limiter_flags(v[i], lo[i], hi[i], b.enable);
                    for (k, zk) in z.iter().enumerate() {
                        out[k][i] = flag(*zk);
                    }
                }
                Ok(out)
            }
            Discrete::DeadBand(b) => {
                let v = b.origin.eval(cols)?;
                let c = b.center.eval(cols)?;
                let lo = b.lower.eval(cols)?;
                let hi = b.upper.eval(cols)?;
                let mut out = vec![vec![0.0; n]; 5];
                for i in 0..n {
                    let z = deadband_flags(v[i], lo[i], hi[i], c[i], held_at(memory, i), b.enable);
                    for (k, zk) in z.iter().enumerate() {
                        out[k][i] = flag(*zk);
                    }
                }
                Ok(out)
            }
        }
    }

    /// Advance committed memory from an accepted state.
    pub fn commit<C: Columns + ?Sized>(
        &self,
        cols: &C,
        memory: &mut DiscreteMemory,
    ) -> EvalResult<()> {
        let (Discrete::DeadBand(b), DiscreteMemory::Held(held)) = (self, memory) else {
            return Ok(());
        };
        let v = b.origin.eval(cols)?;
        let lo = b.lower.eval(cols)?;
        let hi = b.upper.eval(cols)?;
        for (i, h) in held.iter_mut().enumerate() {
            *h = deadband_commit(v[i], lo[i], hi[i], *h, b.enable);
        }
        Ok(())
    }
}

fn held_at(memory: &DiscreteMemory, row: usize) -> HeldEdge {
    match memory {
        DiscreteMemory::Held(h) => h.get(row).copied().unwrap_or_default(),
        DiscreteMemory::Stateless => HeldEdge::None,
    }
}
