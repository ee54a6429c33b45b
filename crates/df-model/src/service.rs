//! Services: derived quantities cached outside the state vector.

/// When a service value is recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Computed once at initialization.
    #[default]
    Constant,
    /// Also recomputed by an explicit refresh before simulation start.
    Refresh,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceKind {
    /// Value of an expression.
    Const(String),
    /// 0 where `of == value`, 1 elsewhere.
    FlagValue { of: String, value: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDef {
    pub name: String,
    pub kind: ServiceKind,
    pub refresh: RefreshPolicy,
    pub info: String,
}

impl ServiceDef {
    pub fn constant(name: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ServiceKind::Const(expr.into()),
            refresh: RefreshPolicy::Constant,
            info: String::new(),
        }
    }

    pub fn flag_value(name: impl Into<String>, of: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            kind: ServiceKind::FlagValue {
                of: of.into(),
                value,
            },
            refresh: RefreshPolicy::Constant,
            info: String::new(),
        }
    }

    pub fn refresh(mut self, policy: RefreshPolicy) -> Self {
        self.refresh = policy;
        self
    }

    pub fn info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }
}

/// Evaluate a flag-value service over a column.
pub fn flag_value(of: &[f64], value: f64) -> Vec<f64> {
    of.iter().map(|v| df_core::flag(*v != value)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_value_marks_matches_with_zero() {
        assert_eq!(flag_value(&[0.0, 10.0, 0.0], 0.0), vec![0.0, 1.0, 0.0]);
    }
}
