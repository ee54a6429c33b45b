//! Expression compiler for dynaflow device equations.
//!
//! Equation text is parsed once into an [`Expr`] tree whose identifiers are
//! already resolved against a [`SymbolTable`]. Compilation then produces a
//! vectorized [`Program`] for the value and one program per symbolic partial
//! derivative with respect to every variable the expression reads.
//!
//! # Grammar
//!
//! ```text
//! expr    = term (('+' | '-') term)*
//! term    = unary (('*' | '/') unary)*
//! unary   = '-' unary | '+' unary | power
//! power   = primary (('^' | '**') unary)?
//! primary = number | ident | ident '(' expr ')' | '(' expr ')'
//! ```
//!
//! # Example
//!
//! ```
//! use df_expr::{ColumnSet, SymbolClass, SymbolTable, compile};
//!
//! let mut table = SymbolTable::new();
//! let k = table.declare("k", SymbolClass::Parameter).unwrap();
//! let x = table.declare("x", SymbolClass::Algebraic).unwrap();
//!
//! let eq = compile("k * x^2 - 1", &table).unwrap();
//!
//! let mut cols = ColumnSet::new(table.len(), 2);
//! cols.set(k, vec![2.0, 3.0]);
//! cols.set(x, vec![1.0, 2.0]);
//!
//! assert_eq!(eq.eval(&cols).unwrap(), vec![1.0, 11.0]);
//! let dx = &eq.partials()[0];
//! assert_eq!(dx.slot, x);
//! assert_eq!(dx.program.eval(&cols).unwrap(), vec![4.0, 12.0]);
//! ```

pub mod ast;
pub mod compile;
pub mod diff;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod program;
pub mod symbols;

pub use ast::{Expr, Func};
pub use compile::{CompiledExpr, Partial, compile};
pub use diff::differentiate;
pub use error::{EvalError, EvalResult, ExprError, ExprResult};
pub use program::{ColumnSet, Columns, Program};
pub use symbols::{SymbolClass, SymbolInfo, SymbolTable};
