//! Expression tree with resolved symbol slots.
//!
//! The smart constructors (`Expr::add`, `Expr::mul`, ...) fold constants and
//! drop additive/multiplicative identities so that derivative trees stay small
//! and structural zeros are recognizable.

use std::collections::BTreeSet;

/// Elementary function library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Ln,
    Log10,
    Sqrt,
    Abs,
    Sign,
}

impl Func {
    /// Look up a function by its name in equation text.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "asin" | "arcsin" => Func::Asin,
            "acos" | "arccos" => Func::Acos,
            "atan" | "arctan" => Func::Atan,
            "sinh" => Func::Sinh,
            "cosh" => Func::Cosh,
            "tanh" => Func::Tanh,
            "exp" => Func::Exp,
            "ln" | "log" => Func::Ln,
            "log10" => Func::Log10,
            "sqrt" => Func::Sqrt,
            "abs" => Func::Abs,
            "sign" => Func::Sign,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Asin => "asin",
            Func::Acos => "acos",
            Func::Atan => "atan",
            Func::Sinh => "sinh",
            Func::Cosh => "cosh",
            Func::Tanh => "tanh",
            Func::Exp => "exp",
            Func::Ln => "ln",
            Func::Log10 => "log10",
            Func::Sqrt => "sqrt",
            Func::Abs => "abs",
            Func::Sign => "sign",
        }
    }

    /// Whether `v` lies in the function's real domain.
    pub fn in_domain(self, v: f64) -> bool {
        match self {
            Func::Sqrt => v >= 0.0,
            Func::Ln | Func::Log10 => v > 0.0,
            Func::Asin | Func::Acos => (-1.0..=1.0).contains(&v),
            _ => true,
        }
    }

    pub fn apply(self, v: f64) -> f64 {
        match self {
            Func::Sin => v.sin(),
            Func::Cos => v.cos(),
            Func::Tan => v.tan(),
            Func::Asin => v.asin(),
            Func::Acos => v.acos(),
            Func::Atan => v.atan(),
            Func::Sinh => v.sinh(),
            Func::Cosh => v.cosh(),
            Func::Tanh => v.tanh(),
            Func::Exp => v.exp(),
            Func::Ln => v.ln(),
            Func::Log10 => v.log10(),
            Func::Sqrt => v.sqrt(),
            Func::Abs => v.abs(),
            // sign(0) = 0, unlike f64::signum
            Func::Sign => {
                if v > 0.0 {
                    1.0
                } else if v < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Expression node. `Sym` holds a slot in the owning symbol table.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    Sym(usize),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

impl Expr {
    pub fn as_const(&self) -> Option<f64> {
        match self {
            Expr::Const(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_const() == Some(0.0)
    }

    pub fn is_one(&self) -> bool {
        self.as_const() == Some(1.0)
    }

    pub fn neg(a: Expr) -> Expr {
        match a {
            Expr::Const(v) => Expr::Const(-v),
            Expr::Neg(inner) => *inner,
            other => Expr::Neg(Box::new(other)),
        }
    }

    pub fn add(a: Expr, b: Expr) -> Expr {
        match (a.as_const(), b.as_const()) {
            (Some(x), Some(y)) => Expr::Const(x + y),
            (Some(x), _) if x == 0.0 => b,
            (_, Some(y)) if y == 0.0 => a,
            _ => Expr::Add(Box::new(a), Box::new(b)),
        }
    }

    pub fn sub(a: Expr, b: Expr) -> Expr {
        match (a.as_const(), b.as_const()) {
            (Some(x), Some(y)) => Expr::Const(x - y),
            (Some(x), _) if x == 0.0 => Expr::neg(b),
            (_, Some(y)) if y == 0.0 => a,
            _ => Expr::Sub(Box::new(a), Box::new(b)),
        }
    }

    pub fn mul(a: Expr, b: Expr) -> Expr {
        match (a.as_const(), b.as_const()) {
            (Some(x), Some(y)) => Expr::Const(x * y),
            (Some(x), _) | (_, Some(x)) if x == 0.0 => Expr::Const(0.0),
            (Some(x), _) if x == 1.0 => b,
            (_, Some(y)) if y == 1.0 => a,
            (Some(x), _) if x == -1.0 => Expr::neg(b),
            (_, Some(y)) if y == -1.0 => Expr::neg(a),
            _ => Expr::Mul(Box::new(a), Box::new(b)),
        }
    }

    pub fn div(a: Expr, b: Expr) -> Expr {
        match (a.as_const(), b.as_const()) {
            (Some(x), Some(y)) if y != 0.0 => Expr::Const(x / y),
            (Some(x), _) if x == 0.0 => Expr::Const(0.0),
            (_, Some(y)) if y == 1.0 => a,
            _ => Expr::Div(Box::new(a), Box::new(b)),
        }
    }

    pub fn pow(a: Expr, b: Expr) -> Expr {
        match (a.as_const(), b.as_const()) {
            (Some(x), Some(y)) if x.powf(y).is_finite() => Expr::Const(x.powf(y)),
            (_, Some(y)) if y == 0.0 => Expr::Const(1.0),
            (_, Some(y)) if y == 1.0 => a,
            _ => Expr::Pow(Box::new(a), Box::new(b)),
        }
    }

    pub fn call(f: Func, a: Expr) -> Expr {
        match a.as_const() {
            Some(v) if f.in_domain(v) && f.apply(v).is_finite() => Expr::Const(f.apply(v)),
            _ => Expr::Call(f, Box::new(a)),
        }
    }

    /// Collect every symbol slot referenced by this expression.
    pub fn collect_slots(&self, out: &mut BTreeSet<usize>) {
        match self {
            Expr::Const(_) => {}
            Expr::Sym(s) => {
                out.insert(*s);
            }
            Expr::Neg(a) | Expr::Call(_, a) => a.collect_slots(out),
            Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::Div(a, b)
            | Expr::Pow(a, b) => {
                a.collect_slots(out);
                b.collect_slots(out);
            }
        }
    }

    pub fn slots(&self) -> BTreeSet<usize> {
        let mut out = BTreeSet::new();
        self.collect_slots(&mut out);
        out
    }

    pub fn depends_on(&self, slot: usize) -> bool {
        match self {
            Expr::Const(_) => false,
            Expr::Sym(s) => *s == slot,
            Expr::Neg(a) | Expr::Call(_, a) => a.depends_on(slot),
            Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::Div(a, b)
            | Expr::Pow(a, b) => a.depends_on(slot) || b.depends_on(slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: usize) -> Expr {
        Expr::Sym(s)
    }

    #[test]
    fn folding_identities() {
        assert_eq!(Expr::add(Expr::Const(0.0), sym(1)), sym(1));
        assert_eq!(Expr::mul(sym(1), Expr::Const(0.0)), Expr::Const(0.0));
        assert_eq!(Expr::mul(Expr::Const(1.0), sym(2)), sym(2));
        assert_eq!(Expr::sub(Expr::Const(0.0), sym(2)), Expr::Neg(Box::new(sym(2))));
        assert_eq!(Expr::neg(Expr::neg(sym(3))), sym(3));
        assert_eq!(Expr::pow(sym(3), Expr::Const(1.0)), sym(3));
        assert_eq!(Expr::div(Expr::Const(6.0), Expr::Const(3.0)), Expr::Const(2.0));
    }

    #[test]
    fn division_by_constant_zero_is_kept() {
        let e = Expr::div(Expr::Const(1.0), Expr::Const(0.0));
        assert!(matches!(e, Expr::Div(..)));
    }

    #[test]
    fn slots_are_sorted_and_unique() {
        let e = Expr::add(Expr::mul(sym(4), sym(1)), sym(4));
        let slots: Vec<_> = e.slots().into_iter().collect();
        assert_eq!(slots, vec![1, 4]);
        assert!(e.depends_on(1));
        assert!(!e.depends_on(2));
    }

    #[test]
    fn function_names_round_trip() {
        for f in [Func::Sin, Func::Exp, Func::Ln, Func::Sqrt, Func::Sign] {
            assert_eq!(Func::from_name(f.name()), Some(f));
        }
        assert_eq!(Func::from_name("log"), Some(Func::Ln));
        assert!(Func::from_name("gamma").is_none());
    }

    #[test]
    fn sign_of_zero_is_zero() {
        assert_eq!(Func::Sign.apply(0.0), 0.0);
        assert_eq!(Func::Sign.apply(-3.0), -1.0);
    }
}
