//! Parameter declarations and the per-instance parameter store.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Semantic kind of a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// Plain numeric value.
    Num,
    /// Reference to an instance `idx` of another model.
    Idx { model: String },
}

/// Declaration of a parameter, made once per model type.
///
/// ```
/// use df_model::ParamDef;
///
/// let r = ParamDef::num("R").default(0.05).unit("pu").info("Speed regulation gain");
/// assert_eq!(r.default, Some(0.05));
/// assert!(!r.mandatory);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<f64>,
    pub mandatory: bool,
    pub unit: Option<String>,
    pub info: String,
    /// Per-unit on the device rating; rescaled to the system base at setup.
    pub power: bool,
    pub non_zero: bool,
    pub non_negative: bool,
}

impl ParamDef {
    fn with_kind(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            mandatory: false,
            unit: None,
            info: String::new(),
            power: false,
            non_zero: false,
            non_negative: false,
        }
    }

    pub fn num(name: impl Into<String>) -> Self {
        Self::with_kind(name, ParamKind::Num)
    }

    pub fn idx(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            ParamKind::Idx {
                model: model.into(),
            },
        )
    }

    pub fn default(mut self, v: f64) -> Self {
        self.default = Some(v);
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    pub fn power(mut self) -> Self {
        self.power = true;
        self
    }

    pub fn non_zero(mut self) -> Self {
        self.non_zero = true;
        self
    }

    pub fn non_negative(mut self) -> Self {
        self.non_negative = true;
        self
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, ParamKind::Num)
    }
}

/// A single parameter value as supplied by instance data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Num(f64),
    Idx(String),
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Num(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Idx(v.to_string())
    }
}

/// Data for one model instance: its `idx` label and supplied parameters.
///
/// Parameters left out take their declared default.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstanceData {
    pub idx: String,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

impl InstanceData {
    pub fn new(idx: impl Into<String>) -> Self {
        Self {
            idx: idx.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone)]
enum Column {
    Num(Vec<f64>),
    Idx(Vec<Option<String>>),
}

/// Per-instance parameter arrays for one model type.
///
/// Every column has exactly `len()` rows once [`ParamStore::bind`] has run.
#[derive(Debug, Clone)]
pub struct ParamStore {
    model: String,
    defs: Vec<ParamDef>,
    by_name: HashMap<String, usize>,
    columns: Vec<Column>,
    given: Vec<Vec<bool>>,
    rows: usize,
}

impl ParamStore {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            defs: Vec::new(),
            by_name: HashMap::new(),
            columns: Vec::new(),
            given: Vec::new(),
            rows: 0,
        }
    }

    /// Register a parameter definition. Must happen before any instance exists.
    pub fn declare(&mut self, def: ParamDef) -> ModelResult<usize> {
        if self.rows > 0 {
            return Err(ModelError::InvalidArg {
                what: format!(
                    "{}: cannot declare `{}` after instances are bound",
                    self.model, def.name
                ),
            });
        }
        if self.by_name.contains_key(&def.name) {
            return Err(ModelError::InvalidArg {
                what: format!("{}: parameter `{}` declared twice", self.model, def.name),
            });
        }
        let i = self.defs.len();
        self.by_name.insert(def.name.clone(), i);
        self.columns.push(match def.kind {
            ParamKind::Num => Column::Num(Vec::new()),
            ParamKind::Idx { .. } => Column::Idx(Vec::new()),
        });
        self.given.push(Vec::new());
        self.defs.push(def);
        Ok(i)
    }

    /// Allocate (or grow/shrink) per-instance arrays to `rows`, filling defaults.
    pub fn bind(&mut self, rows: usize) {
        for (i, col) in self.columns.iter_mut().enumerate() {
            let default = self.defs[i].default.unwrap_or(0.0);
            match col {
                Column::Num(v) => v.resize(rows, default),
                Column::Idx(v) => v.resize(rows, None),
            }
            self.given[i].resize(rows, false);
        }
        self.rows = rows;
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn defs(&self) -> &[ParamDef] {
        &self.defs
    }

    pub fn def(&self, name: &str) -> Option<&ParamDef> {
        self.by_name.get(name).map(|&i| &self.defs[i])
    }

    fn position(&self, name: &str) -> ModelResult<usize> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| ModelError::UnknownParameter {
                model: self.model.clone(),
                param: name.to_string(),
            })
    }

    fn check_row(&self, row: usize) -> ModelResult<()> {
        if row >= self.rows {
            return Err(ModelError::InvalidArg {
                what: format!("{}: instance row {row} out of range", self.model),
            });
        }
        Ok(())
    }

    /// Set one instance's value.
    pub fn set(&mut self, name: &str, row: usize, value: ParamValue) -> ModelResult<()> {
        let i = self.position(name)?;
        self.check_row(row)?;
        match (&mut self.columns[i], value) {
            (Column::Num(col), ParamValue::Num(v)) => col[row] = v,
            (Column::Idx(col), ParamValue::Idx(s)) => col[row] = Some(s),
            // numeric idx labels are accepted as text
            (Column::Idx(col), ParamValue::Num(v)) => col[row] = Some(format_idx(v)),
            (Column::Num(_), ParamValue::Idx(_)) => {
                return Err(ModelError::ParamKindMismatch {
                    model: self.model.clone(),
                    param: name.to_string(),
                    expected: "numeric",
                });
            }
        }
        self.given[i][row] = true;
        Ok(())
    }

    /// Numeric values of a parameter.
    pub fn values(&self, name: &str) -> Option<&[f64]> {
        match self.by_name.get(name).map(|&i| &self.columns[i]) {
            Some(Column::Num(v)) => Some(v),
            _ => None,
        }
    }

    /// Index values of an index-reference parameter.
    pub fn idx_values(&self, name: &str) -> Option<&[Option<String>]> {
        match self.by_name.get(name).map(|&i| &self.columns[i]) {
            Some(Column::Idx(v)) => Some(v),
            _ => None,
        }
    }

    /// Multiply a numeric parameter element-wise by `factors`.
    pub fn scale(&mut self, name: &str, factors: &[f64]) -> ModelResult<()> {
        let i = self.position(name)?;
        match &mut self.columns[i] {
            Column::Num(col) if col.len() == factors.len() => {
                col.iter_mut().zip(factors).for_each(|(v, k)| *v *= k);
                Ok(())
            }
            _ => Err(ModelError::ParamKindMismatch {
                model: self.model.clone(),
                param: name.to_string(),
                expected: "numeric",
            }),
        }
    }

    /// Check mandatory presence and numeric value rules.
    ///
    /// Fails with [`ModelError::MissingMandatoryParameter`] for the first
    /// mandatory parameter left unset on any instance.
    pub fn validate(&self) -> ModelResult<()> {
        for (i, def) in self.defs.iter().enumerate() {
            if def.mandatory {
                if let Some(row) = self.given[i].iter().position(|g| !g) {
                    return Err(ModelError::MissingMandatoryParameter {
                        model: self.model.clone(),
                        param: def.name.clone(),
                        row,
                    });
                }
            }
            if let Column::Num(col) = &self.columns[i] {
                for (row, &value) in col.iter().enumerate() {
                    let rule = if !value.is_finite() {
                        Some("finite")
                    } else if def.non_zero && value == 0.0 {
                        Some("non-zero")
                    } else if def.non_negative && value < 0.0 {
                        Some("non-negative")
                    } else {
                        None
                    };
                    if let Some(rule) = rule {
                        return Err(ModelError::InvalidParameter {
                            model: self.model.clone(),
                            param: def.name.clone(),
                            row,
                            value,
                            rule,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Check that every index-reference value names an existing target instance.
    ///
    /// `exists(target_model, idx)` answers whether the target has that instance.
    pub fn validate_references<F>(&self, exists: F) -> ModelResult<()>
    where
        F: Fn(&str, &str) -> bool,
    {
        for (i, def) in self.defs.iter().enumerate() {
            let (ParamKind::Idx { model: target }, Column::Idx(col)) = (&def.kind, &self.columns[i])
            else {
                continue;
            };
            for value in col.iter().flatten() {
                if !exists(target, value) {
                    return Err(ModelError::UnresolvedReference {
                        model: self.model.clone(),
                        param: def.name.clone(),
                        target: target.clone(),
                        value: value.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn format_idx(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}
