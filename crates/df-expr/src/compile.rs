//! Compile equation text into value and partial-derivative programs.

use std::collections::BTreeSet;

use crate::ast::Expr;
use crate::diff::differentiate;
use crate::error::{EvalResult, ExprError, ExprResult};
use crate::parser::parse;
use crate::program::{Columns, Program};
use crate::symbols::{SymbolClass, SymbolTable};

/// Partial derivative of a compiled expression with respect to one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Partial {
    /// Slot of the variable differentiated against.
    pub slot: usize,
    pub expr: Expr,
    pub program: Program,
}

/// An equation compiled once per model type and shared by all its instances.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpr {
    text: String,
    ast: Expr,
    value: Program,
    partials: Vec<Partial>,
}

/// Parse `text` against `table` and derive its partials.
///
/// Every identifier must already be declared in `table`; otherwise this fails
/// with [`ExprError::UndeclaredSymbol`]. Partials are produced for each
/// variable slot the expression reads (ascending slot order), and structural
/// zeros are dropped.
pub fn compile(text: &str, table: &SymbolTable) -> ExprResult<CompiledExpr> {
    let ast = parse(text, |name| {
        table
            .lookup(name)
            .ok_or_else(|| ExprError::UndeclaredSymbol {
                name: name.to_string(),
                expr: text.to_string(),
            })
    })?;

    let partials = ast
        .slots()
        .into_iter()
        .filter(|&slot| table.class(slot).is_variable())
        .filter_map(|slot| {
            let d = differentiate(&ast, slot);
            if d.is_zero() {
                None
            } else {
                Some(Partial {
                    slot,
                    program: Program::from_expr(&d),
                    expr: d,
                })
            }
        })
        .collect();

    Ok(CompiledExpr {
        text: text.to_string(),
        value: Program::from_expr(&ast),
        ast,
        partials,
    })
}

impl CompiledExpr {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    pub fn partials(&self) -> &[Partial] {
        &self.partials
    }

    /// All slots read by the expression.
    pub fn slots(&self) -> BTreeSet<usize> {
        self.ast.slots()
    }

    /// Slots of a given class read by the expression.
    pub fn slots_of(&self, table: &SymbolTable, class: SymbolClass) -> Vec<usize> {
        self.slots()
            .into_iter()
            .filter(|&s| table.class(s) == class)
            .collect()
    }

    pub fn eval<C: Columns + ?Sized>(&self, cols: &C) -> EvalResult<Vec<f64>> {
        self.value.eval(cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ColumnSet;

    fn limiter_table() -> SymbolTable {
        let mut t = SymbolTable::new();
        for name in ["pmax", "pmin"] {
            t.declare(name, SymbolClass::Parameter).unwrap();
        }
        for name in ["pnl", "pout"] {
            t.declare(name, SymbolClass::Algebraic).unwrap();
        }
        for name in ["plim_zl", "plim_zi", "plim_zu"] {
            t.declare(name, SymbolClass::Flag).unwrap();
        }
        t
    }

    #[test]
    fn limiter_blend_partials() {
        let t = limiter_table();
        let eq = compile(
            "pnl * plim_zi + pmax * plim_zu + pmin * plim_zl - pout",
            &t,
        )
        .unwrap();

        // Flags and parameters are not differentiated.
        let slots: Vec<_> = eq.partials().iter().map(|p| p.slot).collect();
        assert_eq!(slots, vec![t.lookup("pnl").unwrap(), t.lookup("pout").unwrap()]);

        let d_pout = &eq.partials()[1];
        assert_eq!(d_pout.program.constant(), Some(-1.0));

        let mut cols = ColumnSet::new(t.len(), 1);
        cols.set(t.lookup("pnl").unwrap(), vec![1.3]);
        cols.set(t.lookup("pout").unwrap(), vec![1.0]);
        cols.set(t.lookup("pmax").unwrap(), vec![1.0]);
        cols.set(t.lookup("plim_zu").unwrap(), vec![1.0]);
        assert_eq!(eq.eval(&cols).unwrap(), vec![0.0]);
        // d/dpnl = zi = 0 while saturated
        assert_eq!(eq.partials()[0].program.eval(&cols).unwrap(), vec![0.0]);
    }

    #[test]
    fn undeclared_symbol_fails_at_compile_time() {
        let t = limiter_table();
        let err = compile("pnl - pmx", &t).unwrap_err();
        assert_eq!(
            err,
            ExprError::UndeclaredSymbol {
                name: "pmx".to_string(),
                expr: "pnl - pmx".to_string()
            }
        );
    }

    #[test]
    fn slots_of_class() {
        let t = limiter_table();
        let eq = compile("pnl * plim_zi + pmax * plim_zu", &t).unwrap();
        assert_eq!(
            eq.slots_of(&t, SymbolClass::Flag),
            vec![t.lookup("plim_zi").unwrap(), t.lookup("plim_zu").unwrap()]
        );
        assert_eq!(eq.text(), "pnl * plim_zi + pmax * plim_zu");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::program::ColumnSet;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn row_independence(xs in prop::collection::vec(-10.0_f64..10.0, 1..16)) {
            let mut t = SymbolTable::new();
            let x = t.declare("x", SymbolClass::State).unwrap();
            let eq = compile("x^3 - 2 * x + sin(x)", &t).unwrap();

            let mut all = ColumnSet::new(1, xs.len());
            all.set(x, xs.clone());
            let batched = eq.eval(&all).unwrap();

            for (i, xi) in xs.iter().enumerate() {
                let mut one = ColumnSet::new(1, 1);
                one.set(x, vec![*xi]);
                prop_assert_eq!(eq.eval(&one).unwrap()[0], batched[i]);
            }
        }
    }
}
