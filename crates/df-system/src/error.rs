//! Error types for system setup, initialization and assembly.

use df_expr::EvalError;
use df_model::ModelError;
use thiserror::Error;

pub type SystemResult<T> = Result<T, SystemError>;

/// Errors raised while putting instantiated models together.
///
/// Everything except [`SystemError::Eval`] is detected before simulation
/// starts and aborts construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SystemError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },

    #[error("Unknown model `{name}`")]
    UnknownModel { name: String },

    #[error("Model `{name}` registered twice")]
    DuplicateModel { name: String },

    #[error("{model}: unknown symbol `{name}`")]
    UnknownSymbol { model: String, name: String },

    #[error("{model}.{ext}: {what}")]
    UnresolvedReference {
        model: String,
        ext: String,
        what: String,
    },

    #[error("Cyclic initialization among models {models:?}")]
    CyclicInitialization { models: Vec<String> },

    #[error("Assembly error: {what}")]
    Assembly { what: String },

    #[error("System is not {stage}")]
    Stage { stage: &'static str },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Evaluation failed: {0}")]
    Eval(#[from] EvalError),
}
