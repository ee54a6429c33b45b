//! Variable declarations and symbol handles.

use std::fmt;

/// Differential or algebraic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    /// Equation gives the time derivative: `x' = e`.
    State,
    /// Equation gives a residual driven to zero: `0 = e`.
    Algeb,
}

/// Declaration of a variable owned by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDef {
    pub name: String,
    pub kind: VarKind,
    pub v_init: Option<String>,
    pub e_str: Option<String>,
    pub info: String,
}

impl VarDef {
    fn new(name: impl Into<String>, kind: VarKind) -> Self {
        Self {
            name: name.into(),
            kind,
            v_init: None,
            e_str: None,
            info: String::new(),
        }
    }

    pub fn state(name: impl Into<String>) -> Self {
        Self::new(name, VarKind::State)
    }

    pub fn algeb(name: impl Into<String>) -> Self {
        Self::new(name, VarKind::Algeb)
    }

    pub fn v_init(mut self, expr: impl Into<String>) -> Self {
        self.v_init = Some(expr.into());
        self
    }

    pub fn e_str(mut self, expr: impl Into<String>) -> Self {
        self.e_str = Some(expr.into());
        self
    }

    pub fn info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }
}

/// Handle to a declared symbol, returned by the builder.
///
/// Displays as the symbol name so it can be spliced into equation text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    name: String,
    slot: usize,
}

impl Symbol {
    pub(crate) fn new(name: impl Into<String>, slot: usize) -> Self {
        Self {
            name: name.into(),
            slot,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&Symbol> for String {
    fn from(s: &Symbol) -> Self {
        s.name.clone()
    }
}
