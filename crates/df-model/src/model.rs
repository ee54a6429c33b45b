//! Compiled model types: the immutable result of [`crate::ModelBuilder::build`].

use df_expr::{Columns, CompiledExpr, EvalResult, SymbolTable};

use crate::discrete::Discrete;
use crate::extref::ExtDef;
use crate::param::{ParamDef, ParamStore};
use crate::service::{RefreshPolicy, flag_value};
use crate::var::VarKind;

/// Where the values of a symbol slot come from during evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotSource {
    /// Index into [`ModelDef::params`].
    Param(usize),
    /// Index into [`ModelDef::exts`].
    Ext(usize),
    /// Index into [`ModelDef::services`].
    Service(usize),
    /// Index into [`ModelDef::vars`].
    Var(usize),
    /// Flag `flag` of discrete block `block`.
    Flag { block: usize, flag: usize },
    /// Simulation time.
    Time,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceExpr {
    Expr(CompiledExpr),
    FlagValue { of: CompiledExpr, value: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledService {
    pub name: String,
    pub slot: usize,
    pub refresh: RefreshPolicy,
    pub expr: ServiceExpr,
}

impl CompiledService {
    pub fn eval<C: Columns + ?Sized>(&self, cols: &C) -> EvalResult<Vec<f64>> {
        match &self.expr {
            ServiceExpr::Expr(e) => e.eval(cols),
            ServiceExpr::FlagValue { of, value } => Ok(flag_value(&of.eval(cols)?, *value)),
        }
    }

    pub fn compiled(&self) -> &CompiledExpr {
        match &self.expr {
            ServiceExpr::Expr(e) => e,
            ServiceExpr::FlagValue { of, .. } => of,
        }
    }
}

/// A variable owned by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledVar {
    pub name: String,
    pub kind: VarKind,
    pub slot: usize,
    /// Initial-value expression; the variable starts at 0 without one.
    pub init: Option<CompiledExpr>,
    pub equation: Option<CompiledExpr>,
}

/// A reference to another model's symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExt {
    pub def: ExtDef,
    pub slot: usize,
    /// Contribution added to the owner's equation row.
    pub equation: Option<CompiledExpr>,
}

/// One step of per-instance initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    Service(usize),
    Var(usize),
}

/// A fully declared and compiled model type.
///
/// Shared by all instances; per-instance data lives in a [`ParamStore`]
/// and in the runtime owned by the system.
#[derive(Debug, Clone)]
pub struct ModelDef {
    pub name: String,
    pub group: String,
    pub symbols: SymbolTable,
    pub sources: Vec<SlotSource>,
    pub params: Vec<ParamDef>,
    pub exts: Vec<CompiledExt>,
    pub services: Vec<CompiledService>,
    pub vars: Vec<CompiledVar>,
    pub discretes: Vec<Discrete>,
    /// Services and initialized variables in dependency order.
    pub init_order: Vec<InitStep>,
    /// Slot of the device power rating (a parameter or external parameter),
    /// required when any parameter is per-unit on it.
    pub rating: Option<usize>,
    /// Slot of the connection-status parameter `u`.
    pub u_slot: usize,
    /// Slot of the time symbol `dae_t`.
    pub t_slot: usize,
}

impl ModelDef {
    /// Fresh parameter store with every declaration of this model.
    pub fn param_store(&self) -> ParamStore {
        let mut store = ParamStore::new(self.name.clone());
        for def in &self.params {
            store
                .declare(def.clone())
                .expect("builder rejects duplicate parameter names");
        }
        store
    }

    pub fn slot(&self, name: &str) -> Option<usize> {
        self.symbols.lookup(name)
    }

    pub fn var(&self, name: &str) -> Option<&CompiledVar> {
        self.vars.iter().find(|v| v.name == name)
    }

    pub fn ext(&self, name: &str) -> Option<&CompiledExt> {
        self.exts.iter().find(|e| e.def.name == name)
    }

    pub fn service(&self, name: &str) -> Option<&CompiledService> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn states(&self) -> impl Iterator<Item = &CompiledVar> {
        self.vars.iter().filter(|v| v.kind == VarKind::State)
    }

    pub fn algebs(&self) -> impl Iterator<Item = &CompiledVar> {
        self.vars.iter().filter(|v| v.kind == VarKind::Algeb)
    }

    /// Names of models this one reads from.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut deps: Vec<&str> = self.exts.iter().map(|e| e.def.ext.model.as_str()).collect();
        deps.sort_unstable();
        deps.dedup();
        deps
    }

    pub fn has_power_params(&self) -> bool {
        self.params.iter().any(|p| p.power)
    }
}
