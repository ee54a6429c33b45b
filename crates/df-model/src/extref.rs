//! Declarations of references to symbols owned by other models.

use serde::{Deserialize, Serialize};

/// Link from this model's instances to rows of another model.
///
/// For local instance `i`, the target row is the instance of `model` whose
/// `idx` equals the value of the local index parameter `indexer` at row `i`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtRef {
    /// Target model name.
    pub model: String,
    /// Symbol name in the target model.
    pub src: String,
    /// Local index-reference parameter selecting the target row.
    pub indexer: String,
}

impl ExtRef {
    pub fn new(
        model: impl Into<String>,
        src: impl Into<String>,
        indexer: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            src: src.into(),
            indexer: indexer.into(),
        }
    }
}

/// What the referenced symbol is in the target model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtKind {
    Param,
    Service,
    State,
    Algeb,
}

impl ExtKind {
    pub fn is_variable(self) -> bool {
        matches!(self, ExtKind::State | ExtKind::Algeb)
    }
}

/// A named external symbol declared on the local model.
///
/// An external variable may carry an equation; it is added to the owner's
/// residual row rather than owning it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtDef {
    pub name: String,
    pub ext: ExtRef,
    pub kind: ExtKind,
    pub e_str: Option<String>,
    pub info: String,
}

impl ExtDef {
    pub fn new(name: impl Into<String>, kind: ExtKind, ext: ExtRef) -> Self {
        Self {
            name: name.into(),
            ext,
            kind,
            e_str: None,
            info: String::new(),
        }
    }

    pub fn e_str(mut self, e: impl Into<String>) -> Self {
        self.e_str = Some(e.into());
        self
    }

    pub fn info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }
}
