//! Per-model runtime data: instances, parameters, links and current values.

use std::collections::HashMap;
use std::sync::Arc;

use df_expr::ColumnSet;
use df_model::{InstanceData, ModelDef, ModelError, ParamStore, SlotSource};

use crate::error::SystemResult;

/// Resolved target of one external reference.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Link {
    /// Target model position in the system.
    pub model: usize,
    /// Where the referenced symbol lives in the target.
    pub source: SlotSource,
    /// Target row for every local instance.
    pub rows: Vec<usize>,
}

impl Link {
    pub fn gather(&self, column: &[f64]) -> Vec<f64> {
        self.rows.iter().map(|&r| column[r]).collect()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ModelRuntime {
    pub def: Arc<ModelDef>,
    pub instances: Vec<InstanceData>,
    pub idx: Vec<String>,
    pub idx_rows: HashMap<String, usize>,
    pub store: ParamStore,
    pub links: Vec<Link>,
    /// Gathered values of external parameters and services.
    pub ext_values: Vec<Vec<f64>>,
    pub services: Vec<Vec<f64>>,
    pub vars: Vec<Vec<f64>>,
}

impl ModelRuntime {
    pub fn new(def: ModelDef) -> Self {
        Self {
            store: def.param_store(),
            def: Arc::new(def),
            instances: Vec::new(),
            idx: Vec::new(),
            idx_rows: HashMap::new(),
            links: Vec::new(),
            ext_values: Vec::new(),
            services: Vec::new(),
            vars: Vec::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.instances.len()
    }

    pub fn add_instance(&mut self, data: InstanceData) -> SystemResult<usize> {
        if self.idx_rows.contains_key(&data.idx) {
            return Err(ModelError::DuplicateInstance {
                model: self.def.name.clone(),
                idx: data.idx,
            }
            .into());
        }
        let row = self.instances.len();
        self.idx_rows.insert(data.idx.clone(), row);
        self.idx.push(data.idx.clone());
        self.instances.push(data);
        Ok(row)
    }

    /// Fill the parameter store from instance data and check it.
    pub fn bind(&mut self) -> SystemResult<()> {
        let rows = self.rows();
        self.store = self.def.param_store();
        self.store.bind(rows);
        for (row, data) in self.instances.iter().enumerate() {
            for (name, value) in &data.params {
                self.store.set(name, row, value.clone())?;
            }
        }
        self.store.validate()?;

        self.ext_values = vec![vec![0.0; rows]; self.def.exts.len()];
        self.services = vec![vec![0.0; rows]; self.def.services.len()];
        self.vars = vec![vec![0.0; rows]; self.def.vars.len()];
        Ok(())
    }

    /// Current values of a local symbol. Flags and time read as zero.
    pub fn column(&self, source: SlotSource) -> Vec<f64> {
        let rows = self.rows();
        let stored = match source {
            SlotSource::Param(i) => self.store.values(&self.def.params[i].name),
            SlotSource::Ext(e) => self.ext_values.get(e).map(Vec::as_slice),
            SlotSource::Service(j) => self.services.get(j).map(Vec::as_slice),
            SlotSource::Var(k) => self.vars.get(k).map(Vec::as_slice),
            SlotSource::Flag { .. } | SlotSource::Time => None,
        };
        match stored {
            Some(v) if v.len() == rows => v.to_vec(),
            _ => vec![0.0; rows],
        }
    }

    /// Column set holding every symbol's current value.
    pub fn columns(&self) -> ColumnSet {
        let mut cols = ColumnSet::new(self.def.symbols.len(), self.rows());
        for (slot, source) in self.def.sources.iter().enumerate() {
            cols.set(slot, self.column(*source));
        }
        cols
    }
}
