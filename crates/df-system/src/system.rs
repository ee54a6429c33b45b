//! The instantiated system: registered models, their instances and links.
//!
//! Lifecycle: register models and instances, [`System::setup`] (bind and
//! validate parameters, resolve external references, convert power
//! parameters), [`System::initialize`] (evaluate initial values in
//! dependency order), then [`System::assemble`] to freeze the topology into
//! an [`Assembly`] for the integrator.

use std::collections::HashMap;

use df_core::{ModelId, device_to_system, mva};
use df_model::{
    ExtKind, InitStep, InstanceData, ModelDef, ModelError, ParamKind, RefreshPolicy, SlotSource,
    VarKind, evaluation_order,
};
use nalgebra::DVector;
use tracing::{debug, info};

use crate::assembly::Assembly;
use crate::config::SystemConfig;
use crate::dof::DofMap;
use crate::error::{SystemError, SystemResult};
use crate::runtime::{Link, ModelRuntime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Building,
    SetUp,
    Initialized,
}

/// All model instances of one simulation case.
#[derive(Debug, Clone)]
pub struct System {
    config: SystemConfig,
    models: Vec<ModelRuntime>,
    by_name: HashMap<String, usize>,
    init_order: Vec<usize>,
    dof: DofMap,
    stage: Stage,
}

impl System {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            config,
            models: Vec::new(),
            by_name: HashMap::new(),
            init_order: Vec::new(),
            dof: DofMap::build(&[]),
            stage: Stage::Building,
        }
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    fn require(&self, stage: Stage, name: &'static str) -> SystemResult<()> {
        if self.stage < stage {
            return Err(SystemError::Stage { stage: name });
        }
        Ok(())
    }

    /// Register a model type. Models are indexed in registration order.
    pub fn add_model(&mut self, def: ModelDef) -> SystemResult<ModelId> {
        if self.stage != Stage::Building {
            return Err(SystemError::InvalidArg {
                what: format!("cannot add model `{}` after setup", def.name),
            });
        }
        if self.by_name.contains_key(&def.name) {
            return Err(SystemError::DuplicateModel { name: def.name });
        }
        let id = ModelId::from_usize(self.models.len());
        debug!(model = %def.name, group = %def.group, "model registered");
        self.by_name.insert(def.name.clone(), self.models.len());
        self.models.push(ModelRuntime::new(def));
        Ok(id)
    }

    /// Add an instance of a registered model, returning its row.
    pub fn add_instance(&mut self, model: &str, data: InstanceData) -> SystemResult<usize> {
        if self.stage != Stage::Building {
            return Err(SystemError::InvalidArg {
                what: format!("cannot add instance `{}` after setup", data.idx),
            });
        }
        let m = self.position(model)?;
        self.models[m].add_instance(data)
    }

    fn position(&self, model: &str) -> SystemResult<usize> {
        self.by_name
            .get(model)
            .copied()
            .ok_or_else(|| SystemError::UnknownModel {
                name: model.to_string(),
            })
    }

    pub fn model_id(&self, model: &str) -> SystemResult<ModelId> {
        self.position(model).map(ModelId::from_usize)
    }

    pub fn model(&self, model: &str) -> SystemResult<&ModelDef> {
        Ok(&self.models[self.position(model)?].def)
    }

    /// Number of instances of a model.
    pub fn rows(&self, model: &str) -> SystemResult<usize> {
        Ok(self.models[self.position(model)?].rows())
    }

    /// Instance labels of a model, in row order.
    pub fn idx(&self, model: &str) -> SystemResult<&[String]> {
        Ok(&self.models[self.position(model)?].idx)
    }

    pub fn dof(&self) -> &DofMap {
        &self.dof
    }

    /// Bind and validate all data and fix the global indexing.
    pub fn setup(&mut self) -> SystemResult<()> {
        self.config
            .validate()
            .map_err(|e| SystemError::InvalidArg {
                what: e.to_string(),
            })?;

        for rt in &mut self.models {
            rt.bind()?;
        }
        for rt in &self.models {
            rt.store.validate_references(|target, idx| {
                self.by_name
                    .get(target)
                    .is_some_and(|&t| self.models[t].idx_rows.contains_key(idx))
            })?;
        }

        for m in 0..self.models.len() {
            let links = self.resolve_links(m)?;
            self.models[m].links = links;
        }
        self.init_order = self.model_order()?;
        for m in 0..self.models.len() {
            self.convert_power(m)?;
        }

        let entries: Vec<(&ModelDef, &[String])> = self
            .models
            .iter()
            .map(|rt| (rt.def.as_ref(), rt.idx.as_slice()))
            .collect();
        self.dof = DofMap::build(&entries);
        self.stage = Stage::SetUp;

        info!(
            models = self.models.len(),
            states = self.dof.n_states(),
            algebs = self.dof.n_algebs(),
            "system set up"
        );
        Ok(())
    }

    fn resolve_links(&self, m: usize) -> SystemResult<Vec<Link>> {
        let rt = &self.models[m];
        let mut links = Vec::with_capacity(rt.def.exts.len());
        for ext in &rt.def.exts {
            let def = &ext.def;
            let unresolved = |what: String| SystemError::UnresolvedReference {
                model: rt.def.name.clone(),
                ext: def.name.clone(),
                what,
            };

            let t = *self
                .by_name
                .get(&def.ext.model)
                .ok_or_else(|| unresolved(format!("unknown model `{}`", def.ext.model)))?;
            let target = &self.models[t];
            let slot = target
                .def
                .slot(&def.ext.src)
                .ok_or_else(|| {
                    unresolved(format!("`{}` has no `{}`", def.ext.model, def.ext.src))
                })?;
            let source = target.def.sources[slot];

            let compatible = match (def.kind, source) {
                (ExtKind::Param, SlotSource::Param(i)) => {
                    target.def.params[i].kind == ParamKind::Num
                }
                (ExtKind::Service, SlotSource::Service(_) | SlotSource::Var(_)) => true,
                (ExtKind::State, SlotSource::Var(k)) => target.def.vars[k].kind == VarKind::State,
                (ExtKind::Algeb, SlotSource::Var(k)) => target.def.vars[k].kind == VarKind::Algeb,
                _ => false,
            };
            if !compatible {
                return Err(unresolved(format!(
                    "`{}.{}` is not a {:?} target",
                    def.ext.model, def.ext.src, def.kind
                )));
            }

            let labels = rt.store.idx_values(&def.ext.indexer).ok_or_else(|| {
                unresolved(format!("index parameter `{}` missing", def.ext.indexer))
            })?;
            let mut rows = Vec::with_capacity(labels.len());
            for (row, label) in labels.iter().enumerate() {
                let label = label.as_ref().ok_or_else(|| {
                    unresolved(format!("`{}` unset for instance {row}", def.ext.indexer))
                })?;
                let r = target.idx_rows.get(label).ok_or_else(|| {
                    SystemError::Model(ModelError::UnresolvedReference {
                        model: rt.def.name.clone(),
                        param: def.ext.indexer.clone(),
                        target: def.ext.model.clone(),
                        value: label.clone(),
                    })
                })?;
                rows.push(*r);
            }
            links.push(Link {
                model: t,
                source,
                rows,
            });
        }
        Ok(links)
    }

    /// Models ordered so that every model follows the models it reads from.
    fn model_order(&self) -> SystemResult<Vec<usize>> {
        let mut edges = Vec::new();
        for (m, rt) in self.models.iter().enumerate() {
            for link in &rt.links {
                if link.model != m && !edges.contains(&(link.model, m)) {
                    edges.push((link.model, m));
                }
            }
        }
        let order = evaluation_order(self.models.len(), &edges).map_err(|stuck| {
            SystemError::CyclicInitialization {
                models: stuck
                    .into_iter()
                    .map(|m| self.models[m].def.name.clone())
                    .collect(),
            }
        })?;
        debug!(
            order = ?order.iter().map(|&m| self.models[m].def.name.as_str()).collect::<Vec<_>>(),
            "model initialization order"
        );
        Ok(order)
    }

    /// Rescale power parameters from the device rating to the system base.
    fn convert_power(&mut self, m: usize) -> SystemResult<()> {
        let rt = &self.models[m];
        let Some(rating) = rt.def.rating else {
            return Ok(());
        };
        if !rt.def.has_power_params() || rt.rows() == 0 {
            return Ok(());
        }
        let sn = match rt.def.sources[rating] {
            SlotSource::Param(i) => rt.column(SlotSource::Param(i)),
            SlotSource::Ext(e) => {
                let link = &rt.links[e];
                link.gather(&self.models[link.model].column(link.source))
            }
            _ => {
                return Err(SystemError::InvalidArg {
                    what: format!("{}: rating is not a parameter", rt.def.name),
                });
            }
        };
        let factors: Vec<f64> = sn
            .iter()
            .map(|&s| device_to_system(mva(s), self.config.base_mva))
            .collect();

        let names: Vec<String> = rt
            .def
            .params
            .iter()
            .filter(|p| p.power)
            .map(|p| p.name.clone())
            .collect();
        debug!(model = %rt.def.name, params = ?names, "power parameters converted to system base");
        let rt = &mut self.models[m];
        for name in names {
            rt.store.scale(&name, &factors)?;
        }
        Ok(())
    }

    fn gather_exts(&mut self, m: usize) {
        let values: Vec<Vec<f64>> = self.models[m]
            .links
            .iter()
            .map(|link| link.gather(&self.models[link.model].column(link.source)))
            .collect();
        self.models[m].ext_values = values;
    }

    /// Evaluate services and initial values of every model.
    ///
    /// Models run in dependency order of their external references; inside
    /// a model, services and initialized variables run in their own
    /// dependency order. Variables without an initial value start at 0.
    pub fn initialize(&mut self) -> SystemResult<DVector<f64>> {
        self.require(Stage::SetUp, "set up")?;
        for m in self.init_order.clone() {
            self.gather_exts(m);
            let rt = &mut self.models[m];
            if rt.rows() == 0 {
                continue;
            }
            for v in &mut rt.vars {
                v.iter_mut().for_each(|x| *x = 0.0);
            }
            let mut cols = rt.columns();
            let def = rt.def.clone();
            for step in &def.init_order {
                match *step {
                    InitStep::Service(j) => {
                        let s = &def.services[j];
                        let vals = s.eval(&cols)?;
                        cols.set(s.slot, vals.clone());
                        rt.services[j] = vals;
                    }
                    InitStep::Var(k) => {
                        let v = &def.vars[k];
                        if let Some(init) = &v.init {
                            let vals = init.eval(&cols)?;
                            cols.set(v.slot, vals.clone());
                            rt.vars[k] = vals;
                        }
                    }
                }
            }
            debug!(model = %def.name, rows = rt.rows(), "initialized");
        }
        self.stage = Stage::Initialized;
        Ok(self.state_vector())
    }

    /// Recompute services declared with [`RefreshPolicy::Refresh`] from the
    /// current variable values.
    pub fn refresh_services(&mut self) -> SystemResult<()> {
        self.require(Stage::Initialized, "initialized")?;
        for m in self.init_order.clone() {
            self.gather_exts(m);
            let rt = &mut self.models[m];
            let mut cols = rt.columns();
            let def = rt.def.clone();
            for step in &def.init_order {
                if let InitStep::Service(j) = *step {
                    let s = &def.services[j];
                    if s.refresh == RefreshPolicy::Refresh {
                        let vals = s.eval(&cols)?;
                        cols.set(s.slot, vals.clone());
                        rt.services[j] = vals;
                    }
                }
            }
        }
        Ok(())
    }

    /// Global vector of current variable values.
    pub fn state_vector(&self) -> DVector<f64> {
        let mut x = DVector::zeros(self.dof.len());
        for (m, rt) in self.models.iter().enumerate() {
            let id = ModelId::from_usize(m);
            for (k, vals) in rt.vars.iter().enumerate() {
                for (i, v) in self.dof.range(id, k).zip(vals) {
                    x[i] = *v;
                }
            }
        }
        x
    }

    /// Scatter a global vector back into per-model variable values.
    pub fn set_state(&mut self, x: &DVector<f64>) -> SystemResult<()> {
        if x.len() != self.dof.len() {
            return Err(SystemError::InvalidArg {
                what: format!("state has {} entries, expected {}", x.len(), self.dof.len()),
            });
        }
        for (m, rt) in self.models.iter_mut().enumerate() {
            let id = ModelId::from_usize(m);
            for (k, vals) in rt.vars.iter_mut().enumerate() {
                for (i, v) in self.dof.range(id, k).zip(vals.iter_mut()) {
                    *v = x[i];
                }
            }
        }
        Ok(())
    }

    /// Current values of a local or external symbol of a model.
    pub fn values(&self, model: &str, name: &str) -> SystemResult<Vec<f64>> {
        let rt = &self.models[self.position(model)?];
        let slot = rt.def.slot(name).ok_or_else(|| SystemError::UnknownSymbol {
            model: model.to_string(),
            name: name.to_string(),
        })?;
        match rt.def.sources[slot] {
            SlotSource::Ext(e) if rt.def.exts[e].def.kind.is_variable() => {
                let link = &rt.links[e];
                Ok(link.gather(&self.models[link.model].column(link.source)))
            }
            source => Ok(rt.column(source)),
        }
    }

    /// Write values through an external variable reference into the rows of
    /// the owning model.
    pub fn write_ext(&mut self, model: &str, ext: &str, values: &[f64]) -> SystemResult<()> {
        let m = self.position(model)?;
        let rt = &self.models[m];
        let e = rt
            .def
            .exts
            .iter()
            .position(|x| x.def.name == ext && x.def.kind.is_variable())
            .ok_or_else(|| SystemError::UnknownSymbol {
                model: model.to_string(),
                name: ext.to_string(),
            })?;
        let link = rt.links.get(e).cloned().ok_or(SystemError::Stage { stage: "set up" })?;
        if values.len() != link.rows.len() {
            return Err(SystemError::InvalidArg {
                what: format!("{} values for {} instances", values.len(), link.rows.len()),
            });
        }
        let SlotSource::Var(k) = link.source else {
            return Err(SystemError::InvalidArg {
                what: format!("{model}.{ext} does not refer to a variable"),
            });
        };
        let target = &mut self.models[link.model].vars[k];
        for (row, v) in link.rows.iter().zip(values) {
            target[*row] = *v;
        }
        Ok(())
    }

    /// Freeze the current topology and data into an evaluator.
    ///
    /// Discrete memory is committed once at the current variable values.
    pub fn assemble(&self) -> SystemResult<Assembly> {
        self.require(Stage::Initialized, "initialized")?;
        Assembly::new(&self.models, &self.dof, &self.state_vector())
    }
}
