//! Error types for model declaration and parameter validation.

use df_expr::ExprError;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors detected while declaring a model or validating its data.
///
/// All of these are raised eagerly at model-build or setup time.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },

    #[error("{model}: mandatory parameter `{param}` missing for instance {row}")]
    MissingMandatoryParameter {
        model: String,
        param: String,
        row: usize,
    },

    #[error("{model}: parameter `{param}` = '{value}' does not match any {target} instance")]
    UnresolvedReference {
        model: String,
        param: String,
        target: String,
        value: String,
    },

    #[error("{model}: parameter `{param}` = {value} at instance {row} must be {rule}")]
    InvalidParameter {
        model: String,
        param: String,
        row: usize,
        value: f64,
        rule: &'static str,
    },

    #[error("{model}: unknown parameter `{param}`")]
    UnknownParameter { model: String, param: String },

    #[error("{model}: parameter `{param}` expects a {expected} value")]
    ParamKindMismatch {
        model: String,
        param: String,
        expected: &'static str,
    },

    #[error("{model}: {source}")]
    Expr { model: String, source: ExprError },

    #[error("{model}: cyclic initialization among {cycle:?}")]
    CyclicInitialization { model: String, cycle: Vec<String> },

    #[error("{model}: initial value of `{var}` reads discrete flag `{flag}`")]
    FlagInInit {
        model: String,
        var: String,
        flag: String,
    },

    #[error("{model}: `{name}` is not a variable of this model")]
    NotAVariable { model: String, name: String },

    #[error("{model}: duplicate instance idx `{idx}`")]
    DuplicateInstance { model: String, idx: String },
}

impl ModelError {
    pub(crate) fn expr(model: &str, source: ExprError) -> Self {
        ModelError::Expr {
            model: model.to_string(),
            source,
        }
    }

    /// True when the error is an expression referencing an undeclared name.
    pub fn is_undeclared_symbol(&self) -> bool {
        matches!(
            self,
            ModelError::Expr {
                source: ExprError::UndeclaredSymbol { .. },
                ..
            }
        )
    }
}
