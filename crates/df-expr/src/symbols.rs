//! Symbol table shared by every equation of one model type.

use std::collections::HashMap;

use crate::error::{ExprError, ExprResult};

/// What kind of quantity a symbol names.
///
/// Only `State` and `Algebraic` symbols get partial derivatives; everything
/// else is constant for the duration of one evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolClass {
    Parameter,
    Service,
    State,
    Algebraic,
    Flag,
    Time,
}

impl SymbolClass {
    pub fn is_variable(self) -> bool {
        matches!(self, SymbolClass::State | SymbolClass::Algebraic)
    }
}

/// One declared symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInfo {
    pub name: String,
    pub class: SymbolClass,
}

/// Name -> slot mapping. Slots are dense and assigned in declaration order.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: Vec<SymbolInfo>,
    by_name: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a new symbol and return its slot.
    pub fn declare(&mut self, name: impl Into<String>, class: SymbolClass) -> ExprResult<usize> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(ExprError::DuplicateSymbol { name });
        }
        let slot = self.entries.len();
        self.by_name.insert(name.clone(), slot);
        self.entries.push(SymbolInfo { name, class });
        Ok(slot)
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Get symbol info by slot (panics if out of bounds).
    pub fn get(&self, slot: usize) -> &SymbolInfo {
        &self.entries[slot]
    }

    pub fn class(&self, slot: usize) -> SymbolClass {
        self.entries[slot].class
    }

    pub fn name(&self, slot: usize) -> &str {
        &self.entries[slot].name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &SymbolInfo)> {
        self.entries.iter().enumerate()
    }
}
