//! Symbolic differentiation.

use std::f64::consts::LN_10;

use crate::ast::{Expr, Func};

/// Partial derivative of `e` with respect to symbol slot `wrt`.
///
/// The result is simplified through the folding constructors, so a structural
/// zero comes back as `Expr::Const(0.0)`.
pub fn differentiate(e: &Expr, wrt: usize) -> Expr {
    match e {
        Expr::Const(_) => Expr::Const(0.0),
        Expr::Sym(s) => Expr::Const(if *s == wrt { 1.0 } else { 0.0 }),
        Expr::Neg(a) => Expr::neg(differentiate(a, wrt)),
        Expr::Add(a, b) => Expr::add(differentiate(a, wrt), differentiate(b, wrt)),
        Expr::Sub(a, b) => Expr::sub(differentiate(a, wrt), differentiate(b, wrt)),
        Expr::Mul(a, b) => {
            let da = differentiate(a, wrt);
            let db = differentiate(b, wrt);
            Expr::add(
                Expr::mul(da, (**b).clone()),
                Expr::mul((**a).clone(), db),
            )
        }
        Expr::Div(a, b) => {
            let da = differentiate(a, wrt);
            let db = differentiate(b, wrt);
            if db.is_zero() {
                return Expr::div(da, (**b).clone());
            }
            // (a/b)' = (a' b - a b') / b^2
            Expr::div(
                Expr::sub(
                    Expr::mul(da, (**b).clone()),
                    Expr::mul((**a).clone(), db),
                ),
                Expr::pow((**b).clone(), Expr::Const(2.0)),
            )
        }
        Expr::Pow(a, b) => {
            let da = differentiate(a, wrt);
            if !b.depends_on(wrt) {
                // (a^c)' = c a^(c-1) a'
                let c = (**b).clone();
                let c_minus_1 = Expr::sub(c.clone(), Expr::Const(1.0));
                return Expr::mul(Expr::mul(c, Expr::pow((**a).clone(), c_minus_1)), da);
            }
            // (a^b)' = a^b (b' ln a + b a'/a)
            let db = differentiate(b, wrt);
            Expr::mul(
                e.clone(),
                Expr::add(
                    Expr::mul(db, Expr::call(Func::Ln, (**a).clone())),
                    Expr::div(Expr::mul((**b).clone(), da), (**a).clone()),
                ),
            )
        }
        Expr::Call(f, a) => {
            let da = differentiate(a, wrt);
            if da.is_zero() {
                return Expr::Const(0.0);
            }
            Expr::mul(outer_derivative(*f, a), da)
        }
    }
}

/// d f(a) / d a.
fn outer_derivative(f: Func, a: &Expr) -> Expr {
    let a = a.clone();
    let one = || Expr::Const(1.0);
    let sq = |x: Expr| Expr::pow(x, Expr::Const(2.0));
    match f {
        Func::Sin => Expr::call(Func::Cos, a),
        Func::Cos => Expr::neg(Expr::call(Func::Sin, a)),
        Func::Tan => Expr::div(one(), sq(Expr::call(Func::Cos, a))),
        Func::Asin => Expr::div(one(), Expr::call(Func::Sqrt, Expr::sub(one(), sq(a)))),
        Func::Acos => Expr::neg(Expr::div(
            one(),
            Expr::call(Func::Sqrt, Expr::sub(one(), sq(a))),
        )),
        Func::Atan => Expr::div(one(), Expr::add(one(), sq(a))),
        Func::Sinh => Expr::call(Func::Cosh, a),
        Func::Cosh => Expr::call(Func::Sinh, a),
        Func::Tanh => Expr::sub(one(), sq(Expr::call(Func::Tanh, a))),
        Func::Exp => Expr::call(Func::Exp, a),
        Func::Ln => Expr::div(one(), a),
        Func::Log10 => Expr::div(one(), Expr::mul(a, Expr::Const(LN_10))),
        Func::Sqrt => Expr::div(Expr::Const(0.5), Expr::call(Func::Sqrt, a)),
        Func::Abs => Expr::call(Func::Sign, a),
        // piecewise constant
        Func::Sign => Expr::Const(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{ColumnSet, Program};

    fn eval_at(e: &Expr, values: &[f64]) -> f64 {
        let mut cols = ColumnSet::new(values.len(), 1);
        for (slot, v) in values.iter().enumerate() {
            cols.set(slot, vec![*v]);
        }
        Program::from_expr(e).eval(&cols).unwrap()[0]
    }

    fn x() -> Expr {
        Expr::Sym(0)
    }

    fn y() -> Expr {
        Expr::Sym(1)
    }

    fn check_against_fd(e: &Expr, at: &[f64], wrt: usize) {
        let d = differentiate(e, wrt);
        let h = 1e-6;
        let mut plus = at.to_vec();
        let mut minus = at.to_vec();
        plus[wrt] += h;
        minus[wrt] -= h;
        let fd = (eval_at(e, &plus) - eval_at(e, &minus)) / (2.0 * h);
        let exact = eval_at(&d, at);
        assert!(
            (fd - exact).abs() < 1e-5 * exact.abs().max(1.0),
            "fd={fd} exact={exact} for {e:?}"
        );
    }

    #[test]
    fn structural_zero() {
        let e = Expr::mul(Expr::Const(3.0), y());
        assert!(differentiate(&e, 0).is_zero());
        assert_eq!(differentiate(&e, 1), Expr::Const(3.0));
    }

    #[test]
    fn linear_residual() {
        // pm0 + y - x, derivative w.r.t. x is exactly -1
        let e = Expr::sub(Expr::add(Expr::Sym(2), y()), x());
        assert_eq!(differentiate(&e, 0), Expr::Const(-1.0));
    }

    #[test]
    fn products_quotients_powers() {
        let at = [1.3, 0.7];
        let e = Expr::div(Expr::mul(x(), y()), Expr::add(x(), Expr::Const(2.0)));
        check_against_fd(&e, &at, 0);
        check_against_fd(&e, &at, 1);

        let e = Expr::pow(x(), Expr::Const(3.0));
        check_against_fd(&e, &at, 0);

        let e = Expr::Pow(Box::new(x()), Box::new(y()));
        check_against_fd(&e, &at, 0);
        check_against_fd(&e, &at, 1);
    }

    #[test]
    fn elementary_functions() {
        let at = [0.4, 0.2];
        for f in [
            Func::Sin,
            Func::Cos,
            Func::Tan,
            Func::Asin,
            Func::Acos,
            Func::Atan,
            Func::Sinh,
            Func::Cosh,
            Func::Tanh,
            Func::Exp,
            Func::Ln,
            Func::Log10,
            Func::Sqrt,
            Func::Abs,
        ] {
            let e = Expr::Call(f, Box::new(Expr::mul(x(), y())));
            check_against_fd(&e, &at, 0);
        }
    }

    #[test]
    fn sign_has_zero_derivative() {
        let e = Expr::Call(Func::Sign, Box::new(x()));
        assert!(differentiate(&e, 0).is_zero());
    }
}
