//! Vectorized evaluation of compiled expressions.
//!
//! A [`Program`] is the post-order flattening of an [`Expr`]. Evaluation runs
//! every opcode over whole columns at once: the same formula applied to all
//! instances of a model type, with per-row data supplied by [`Columns`].

use crate::ast::{Expr, Func};
use crate::error::{EvalError, EvalResult};

/// Per-slot input data for one evaluation pass.
pub trait Columns {
    /// Number of rows (model instances).
    fn rows(&self) -> usize;

    /// Values of symbol `slot`, one per row.
    fn column(&self, slot: usize) -> &[f64];
}

/// Dense column storage indexed by symbol slot.
#[derive(Debug, Clone, Default)]
pub struct ColumnSet {
    rows: usize,
    data: Vec<Vec<f64>>,
}

impl ColumnSet {
    /// Create `slots` zero-filled columns of length `rows`.
    pub fn new(slots: usize, rows: usize) -> Self {
        Self {
            rows,
            data: vec![vec![0.0; rows]; slots],
        }
    }

    /// Replace a column. A length other than `rows` is reported as
    /// [`EvalError::Shape`] by the next evaluation that loads it.
    pub fn set(&mut self, slot: usize, values: Vec<f64>) {
        self.data[slot] = values;
    }

    pub fn column_mut(&mut self, slot: usize) -> &mut [f64] {
        &mut self.data[slot]
    }

    pub fn fill(&mut self, slot: usize, value: f64) {
        self.data[slot].iter_mut().for_each(|v| *v = value);
    }
}

impl Columns for ColumnSet {
    fn rows(&self) -> usize {
        self.rows
    }

    fn column(&self, slot: usize) -> &[f64] {
        &self.data[slot]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Const(f64),
    Load(usize),
    Neg,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Call(Func),
}

/// Stack program evaluating one expression over all rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    ops: Vec<Op>,
}

impl Program {
    pub fn from_expr(e: &Expr) -> Self {
        let mut ops = Vec::new();
        emit(e, &mut ops);
        Self { ops }
    }

    /// Program returning a constant; used for folded derivatives.
    pub fn constant(&self) -> Option<f64> {
        match self.ops.as_slice() {
            [Op::Const(v)] => Some(*v),
            _ => None,
        }
    }

    /// Evaluate into a fresh vector of length `cols.rows()`.
    pub fn eval<C: Columns + ?Sized>(&self, cols: &C) -> EvalResult<Vec<f64>> {
        let n = cols.rows();
        let mut stack: Vec<Vec<f64>> = Vec::with_capacity(4);

        for op in &self.ops {
            match *op {
                Op::Const(v) => stack.push(vec![v; n]),
                Op::Load(slot) => {
                    let col = cols.column(slot);
                    if col.len() != n {
                        return Err(EvalError::Shape {
                            slot,
                            expected: n,
                            actual: col.len(),
                        });
                    }
                    stack.push(col.to_vec());
                }
                Op::Neg => {
                    let top = stack.last_mut().expect("program is well-formed");
                    top.iter_mut().for_each(|v| *v = -*v);
                }
                Op::Call(f) => {
                    let top = stack.last_mut().expect("program is well-formed");
                    for (row, v) in top.iter_mut().enumerate() {
                        if !f.in_domain(*v) {
                            return Err(EvalError::Domain {
                                func: f.name(),
                                value: *v,
                                row,
                            });
                        }
                        *v = f.apply(*v);
                    }
                }
                Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Pow => {
                    let rhs = stack.pop().expect("program is well-formed");
                    let lhs = stack.last_mut().expect("program is well-formed");
                    binary(*op, lhs, &rhs)?;
                }
            }
        }

        let out = stack.pop().expect("program is well-formed");
        if let Some((row, value)) = out.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(EvalError::NonFinite { value: *value, row });
        }
        Ok(out)
    }
}

fn binary(op: Op, lhs: &mut [f64], rhs: &[f64]) -> EvalResult<()> {
    match op {
        Op::Add => lhs.iter_mut().zip(rhs).for_each(|(a, b)| *a += b),
        Op::Sub => lhs.iter_mut().zip(rhs).for_each(|(a, b)| *a -= b),
        Op::Mul => lhs.iter_mut().zip(rhs).for_each(|(a, b)| *a *= b),
        Op::Div => lhs.iter_mut().zip(rhs).for_each(|(a, b)| *a /= b),
        Op::Pow => {
            for (row, (a, b)) in lhs.iter_mut().zip(rhs).enumerate() {
                let r = if b.fract() == 0.0 && b.abs() <= i32::MAX as f64 {
                    a.powi(*b as i32)
                } else {
                    a.powf(*b)
                };
                if r.is_nan() && !a.is_nan() && !b.is_nan() {
                    return Err(EvalError::Domain {
                        func: "pow",
                        value: *a,
                        row,
                    });
                }
                *a = r;
            }
        }
        _ => unreachable!("not a binary opcode"),
    }
    Ok(())
}

fn emit(e: &Expr, ops: &mut Vec<Op>) {
    match e {
        Expr::Const(v) => ops.push(Op::Const(*v)),
        Expr::Sym(s) => ops.push(Op::Load(*s)),
        Expr::Neg(a) => {
            emit(a, ops);
            ops.push(Op::Neg);
        }
        Expr::Call(f, a) => {
            emit(a, ops);
            ops.push(Op::Call(*f));
        }
        Expr::Add(a, b) => emit_binary(a, b, Op::Add, ops),
        Expr::Sub(a, b) => emit_binary(a, b, Op::Sub, ops),
        Expr::Mul(a, b) => emit_binary(a, b, Op::Mul, ops),
        Expr::Div(a, b) => emit_binary(a, b, Op::Div, ops),
        Expr::Pow(a, b) => emit_binary(a, b, Op::Pow, ops),
    }
}

fn emit_binary(a: &Expr, b: &Expr, op: Op, ops: &mut Vec<Op>) {
    emit(a, ops);
    emit(b, ops);
    ops.push(op);
}
