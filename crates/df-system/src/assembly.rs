//! Global residual and Jacobian evaluation.
//!
//! Rows follow the [`DofMap`]: a differential row holds `f` of `x' = f`, an
//! algebraic row holds `g` of `0 = g`. Equations carried by external
//! variables are added to the owner's row. Flags are treated as constants
//! when differentiating, so the Jacobian holds exactly the symbolic partials
//! of every equation at the current flag values.

use std::collections::HashMap;
use std::sync::Arc;

use df_core::ModelId;
use df_expr::{ColumnSet, Columns, CompiledExpr, EvalError, EvalResult};
use df_model::{DiscreteMemory, ModelDef, SlotSource, VarKind};
use nalgebra::DVector;
use tracing::info;

use crate::dof::DofMap;
use crate::error::{SystemError, SystemResult};
use crate::runtime::ModelRuntime;
use crate::sparse::SparseJacobian;

#[derive(Debug, Clone)]
struct ModelAssembly {
    def: Arc<ModelDef>,
    rows: usize,
    /// Parameters, services and gathered external constants.
    base: ColumnSet,
    /// Global index per instance, for every variable.
    var_dofs: Vec<Vec<usize>>,
    /// Global index per instance of the owner's row, for external variables.
    ext_dofs: Vec<Option<Vec<usize>>>,
    /// Committed discrete memory, one per block.
    memory: Vec<DiscreteMemory>,
}

impl ModelAssembly {
    /// Columns of every variable and time, without flags.
    fn columns(&self, x: &DVector<f64>, t: f64) -> ColumnSet {
        let mut cols = self.base.clone();
        for (k, var) in self.def.vars.iter().enumerate() {
            cols.set(var.slot, self.var_dofs[k].iter().map(|&i| x[i]).collect());
        }
        for (e, ext) in self.def.exts.iter().enumerate() {
            if let Some(dofs) = &self.ext_dofs[e] {
                cols.set(ext.slot, dofs.iter().map(|&i| x[i]).collect());
            }
        }
        cols.fill(self.def.t_slot, t);
        cols
    }

    /// Columns with every discrete block checked in declaration order.
    fn columns_with_flags(&self, x: &DVector<f64>, t: f64) -> EvalResult<ColumnSet> {
        let mut cols = self.columns(x, t);
        for (b, block) in self.def.discretes.iter().enumerate() {
            let flags = block.check(&cols, &self.memory[b])?;
            for (slot, col) in block.flag_slots().iter().zip(flags) {
                cols.set(*slot, col);
            }
        }
        Ok(cols)
    }

    /// Equations with the global rows they scatter into.
    fn equations(&self) -> impl Iterator<Item = (&CompiledExpr, &[usize])> + '_ {
        let own = self
            .def
            .vars
            .iter()
            .zip(&self.var_dofs)
            .filter_map(|(v, dofs)| v.equation.as_ref().map(|e| (e, dofs.as_slice())));
        let ext = self
            .def
            .exts
            .iter()
            .zip(&self.ext_dofs)
            .filter_map(|(x, dofs)| Some((x.equation.as_ref()?, dofs.as_deref()?)));
        own.chain(ext)
    }

    fn dofs_of(&self, slot: usize) -> Option<&[usize]> {
        match self.def.sources[slot] {
            SlotSource::Var(k) => Some(&self.var_dofs[k]),
            SlotSource::Ext(e) => self.ext_dofs[e].as_deref(),
            _ => None,
        }
    }
}

/// Frozen evaluator handed to the integrator.
///
/// `residual` and `jacobian` are pure in `(x, t)`; only
/// [`Assembly::commit_step`] changes the discrete memory.
#[derive(Debug, Clone)]
pub struct Assembly {
    dof: DofMap,
    models: Vec<ModelAssembly>,
    by_name: HashMap<String, usize>,
}

impl Assembly {
    pub(crate) fn new(
        runtimes: &[ModelRuntime],
        dof: &DofMap,
        x0: &DVector<f64>,
    ) -> SystemResult<Self> {
        check_owned_equations(runtimes)?;
        check_flag_order(runtimes)?;

        let mut models = Vec::with_capacity(runtimes.len());
        for (m, rt) in runtimes.iter().enumerate() {
            let id = ModelId::from_usize(m);
            let var_dofs = (0..rt.def.vars.len())
                .map(|k| dof.range(id, k).collect())
                .collect();
            let ext_dofs = rt
                .def
                .exts
                .iter()
                .zip(&rt.links)
                .map(|(ext, link)| match link.source {
                    SlotSource::Var(k) if ext.def.kind.is_variable() => {
                        let target = ModelId::from_usize(link.model);
                        Some(link.rows.iter().map(|&r| dof.index(target, k, r)).collect())
                    }
                    _ => None,
                })
                .collect();
            models.push(ModelAssembly {
                def: rt.def.clone(),
                rows: rt.rows(),
                base: rt.columns(),
                var_dofs,
                ext_dofs,
                memory: rt.def.discretes.iter().map(|d| d.memory(rt.rows())).collect(),
            });
        }

        let mut asm = Self {
            dof: dof.clone(),
            by_name: runtimes
                .iter()
                .enumerate()
                .map(|(m, rt)| (rt.def.name.clone(), m))
                .collect(),
            models,
        };
        asm.check_structure()?;
        asm.commit_step(x0, 0.0)?;

        info!(
            states = asm.dof.n_states(),
            algebs = asm.dof.n_algebs(),
            nnz = asm.structural_nnz(),
            "assembled"
        );
        Ok(asm)
    }

    /// Every algebraic row needs at least one structural partial.
    fn check_structure(&self) -> SystemResult<()> {
        let mut covered = vec![false; self.dof.len()];
        for ma in &self.models {
            for (eq, rows) in ma.equations() {
                if !eq.partials().is_empty() {
                    rows.iter().for_each(|&r| covered[r] = true);
                }
            }
        }
        if let Some(i) = (self.dof.n_states()..self.dof.len()).find(|&i| !covered[i]) {
            return Err(SystemError::Assembly {
                what: format!(
                    "algebraic variable {} has no structural Jacobian entry",
                    self.dof.label(i).unwrap_or("?")
                ),
            });
        }
        Ok(())
    }

    fn structural_nnz(&self) -> usize {
        self.models
            .iter()
            .flat_map(|ma| ma.equations().map(move |(eq, _)| eq.partials().len() * ma.rows))
            .sum()
    }

    pub fn dof(&self) -> &DofMap {
        &self.dof
    }

    pub fn len(&self) -> usize {
        self.dof.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dof.is_empty()
    }

    pub fn n_states(&self) -> usize {
        self.dof.n_states()
    }

    fn check_len(&self, x: &DVector<f64>) -> EvalResult<()> {
        if x.len() != self.dof.len() {
            return Err(EvalError::Length {
                expected: self.dof.len(),
                actual: x.len(),
            });
        }
        Ok(())
    }

    /// `[f; g]` at `(x, t)` using the committed discrete memory.
    pub fn residual(&self, x: &DVector<f64>, t: f64) -> EvalResult<DVector<f64>> {
        self.check_len(x)?;
        let mut r = DVector::zeros(self.dof.len());
        for ma in &self.models {
            if ma.rows == 0 {
                continue;
            }
            let cols = ma.columns_with_flags(x, t)?;
            for (eq, rows) in ma.equations() {
                for (&row, v) in rows.iter().zip(eq.eval(&cols)?) {
                    r[row] += v;
                }
            }
        }
        Ok(r)
    }

    /// `d[f; g] / dx` at `(x, t)`.
    pub fn jacobian(&self, x: &DVector<f64>, t: f64) -> EvalResult<SparseJacobian> {
        self.check_len(x)?;
        let n = self.dof.len();
        let mut jac = SparseJacobian::with_capacity(n, n, self.structural_nnz());
        for ma in &self.models {
            if ma.rows == 0 {
                continue;
            }
            let cols = ma.columns_with_flags(x, t)?;
            for (eq, rows) in ma.equations() {
                for partial in eq.partials() {
                    let Some(col_dofs) = ma.dofs_of(partial.slot) else {
                        continue;
                    };
                    let vals = partial.program.eval(&cols)?;
                    for ((&row, &col), v) in rows.iter().zip(col_dofs).zip(vals) {
                        jac.push(row, col, v);
                    }
                }
            }
        }
        Ok(jac)
    }

    /// Advance discrete memory from an accepted state.
    ///
    /// Call only for accepted steps; trial evaluations must leave memory as
    /// it was at the last commit.
    pub fn commit_step(&mut self, x: &DVector<f64>, t: f64) -> EvalResult<()> {
        self.check_len(x)?;
        for ma in &mut self.models {
            if ma.rows == 0 || ma.def.discretes.is_empty() {
                continue;
            }
            let mut cols = ma.columns(x, t);
            let def = ma.def.clone();
            for (b, block) in def.discretes.iter().enumerate() {
                let flags = block.check(&cols, &ma.memory[b])?;
                for (slot, col) in block.flag_slots().iter().zip(flags) {
                    cols.set(*slot, col);
                }
                block.commit(&cols, &mut ma.memory[b])?;
            }
        }
        Ok(())
    }

    /// Values of any symbol of `model` at `(x, t)`, flags included.
    pub fn probe(
        &self,
        model: &str,
        name: &str,
        x: &DVector<f64>,
        t: f64,
    ) -> SystemResult<Vec<f64>> {
        self.check_len(x)?;
        let ma = self
            .by_name
            .get(model)
            .map(|&m| &self.models[m])
            .ok_or_else(|| SystemError::UnknownModel {
                name: model.to_string(),
            })?;
        let slot = ma.def.slot(name).ok_or_else(|| SystemError::UnknownSymbol {
            model: model.to_string(),
            name: name.to_string(),
        })?;
        let cols = ma.columns_with_flags(x, t)?;
        Ok(cols.column(slot).to_vec())
    }

    /// Committed memory of the discrete blocks of `model`.
    pub fn memory(&self, model: &str) -> Option<&[DiscreteMemory]> {
        self.by_name
            .get(model)
            .map(|&m| self.models[m].memory.as_slice())
    }
}

fn check_owned_equations(runtimes: &[ModelRuntime]) -> SystemResult<()> {
    for rt in runtimes.iter().filter(|rt| rt.rows() > 0) {
        if let Some(var) = rt.def.vars.iter().find(|v| v.equation.is_none()) {
            let kind = match var.kind {
                VarKind::State => "differential",
                VarKind::Algeb => "algebraic",
            };
            return Err(SystemError::Assembly {
                what: format!("{kind} variable {}.{} has no equation", rt.def.name, var.name),
            });
        }
    }
    Ok(())
}

/// A block may read flags of earlier blocks only.
fn check_flag_order(runtimes: &[ModelRuntime]) -> SystemResult<()> {
    for rt in runtimes {
        for (b, block) in rt.def.discretes.iter().enumerate() {
            for input in block.inputs() {
                for slot in input.slots() {
                    if let SlotSource::Flag { block: src, .. } = rt.def.sources[slot] {
                        if src >= b {
                            return Err(SystemError::Assembly {
                                what: format!(
                                    "{}: block `{}` reads flag `{}` before it is computed",
                                    rt.def.name,
                                    block.name(),
                                    rt.def.symbols.name(slot)
                                ),
                            });
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
