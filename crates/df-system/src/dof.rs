//! Global variable indexing.
//!
//! All differential states come first, then all algebraic variables. Within
//! each group the order is model registration order, then variable
//! declaration order, then instance order, so the rows of one variable are
//! contiguous.

use std::ops::Range;

use df_core::ModelId;
use df_model::{ModelDef, VarKind};

/// Fixed map from (model, variable, instance) to a global index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DofMap {
    n_states: usize,
    n_algebs: usize,
    /// First global index of every variable, per model.
    starts: Vec<Vec<usize>>,
    rows: Vec<usize>,
    labels: Vec<String>,
}

impl DofMap {
    /// Build the map for models given with their instance `idx` labels.
    pub fn build(models: &[(&ModelDef, &[String])]) -> Self {
        let mut starts: Vec<Vec<usize>> = models
            .iter()
            .map(|(def, _)| vec![0; def.vars.len()])
            .collect();
        let mut labels = Vec::new();

        let mut next = 0;
        let mut assign = |kind: VarKind, starts: &mut Vec<Vec<usize>>| {
            for (m, (def, idx)) in models.iter().enumerate() {
                for (k, var) in def.vars.iter().enumerate() {
                    if var.kind != kind {
                        continue;
                    }
                    starts[m][k] = next;
                    next += idx.len();
                    labels.extend(idx.iter().map(|i| format!("{}.{}[{i}]", def.name, var.name)));
                }
            }
            next
        };
        let n_states = assign(VarKind::State, &mut starts);
        let n_total = assign(VarKind::Algeb, &mut starts);

        Self {
            n_states,
            n_algebs: n_total - n_states,
            starts,
            rows: models.iter().map(|(_, idx)| idx.len()).collect(),
            labels,
        }
    }

    pub fn len(&self) -> usize {
        self.n_states + self.n_algebs
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn n_states(&self) -> usize {
        self.n_states
    }

    pub fn n_algebs(&self) -> usize {
        self.n_algebs
    }

    /// True when global index `i` is a differential state.
    pub fn is_state(&self, i: usize) -> bool {
        i < self.n_states
    }

    /// Global indices of variable `var` across all instances of `model`.
    pub fn range(&self, model: ModelId, var: usize) -> Range<usize> {
        let start = self.starts[model.as_usize()][var];
        start..start + self.rows[model.as_usize()]
    }

    pub fn index(&self, model: ModelId, var: usize, row: usize) -> usize {
        self.starts[model.as_usize()][var] + row
    }

    /// Human-readable `Model.var[idx]` label of a global index.
    pub fn label(&self, i: usize) -> Option<&str> {
        self.labels.get(i).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use df_model::{ModelBuilder, VarDef};

    fn def(name: &str) -> ModelDef {
        let mut b = ModelBuilder::new(name, "Test");
        b.algeb(VarDef::algeb("a")).unwrap();
        b.state(VarDef::state("x")).unwrap();
        b.algeb(VarDef::algeb("b")).unwrap();
        b.build().unwrap()
    }

    #[test]
    fn states_first_then_algebraic() {
        let (m1, m2) = (def("M1"), def("M2"));
        let i1 = vec!["1".to_string(), "2".to_string()];
        let i2 = vec!["9".to_string()];
        let dof = DofMap::build(&[(&m1, i1.as_slice()), (&m2, i2.as_slice())]);

        let (id1, id2) = (ModelId::from_usize(0), ModelId::from_usize(1));
        assert_eq!(dof.n_states(), 3);
        assert_eq!(dof.len(), 9);
        // x of M1, then x of M2
        assert_eq!(dof.range(id1, 1), 0..2);
        assert_eq!(dof.range(id2, 1), 2..3);
        // a, b of M1, then a, b of M2
        assert_eq!(dof.range(id1, 0), 3..5);
        assert_eq!(dof.range(id1, 2), 5..7);
        assert_eq!(dof.index(id2, 0, 0), 7);
        assert_eq!(dof.index(id2, 2, 0), 8);
        assert_eq!(dof.label(4), Some("M1.a[2]"));
        assert!(dof.is_state(2) && !dof.is_state(3));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use df_model::{ModelBuilder, VarDef};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn indices_are_a_bijection(n1 in 0_usize..6, n2 in 0_usize..6) {
            let mut b = ModelBuilder::new("A", "T");
            b.state(VarDef::state("x")).unwrap();
            b.algeb(VarDef::algeb("y")).unwrap();
            let a = b.build().unwrap();
            let mut b = ModelBuilder::new("B", "T");
            b.algeb(VarDef::algeb("z")).unwrap();
            b.state(VarDef::state("w")).unwrap();
            let bb = b.build().unwrap();

            let ia: Vec<String> = (0..n1).map(|i| i.to_string()).collect();
            let ib: Vec<String> = (0..n2).map(|i| i.to_string()).collect();
            let dof = DofMap::build(&[(&a, ia.as_slice()), (&bb, ib.as_slice())]);

            let mut seen = vec![false; dof.len()];
            for (m, def, rows) in [(0, &a, n1), (1, &bb, n2)] {
                for (k, var) in def.vars.iter().enumerate() {
                    for r in 0..rows {
                        let i = dof.index(ModelId::from_usize(m), k, r);
                        prop_assert!(!seen[i]);
                        seen[i] = true;
                        prop_assert_eq!(dof.is_state(i), var.kind == VarKind::State);
                    }
                }
            }
            prop_assert!(seen.into_iter().all(|s| s));
        }
    }
}
