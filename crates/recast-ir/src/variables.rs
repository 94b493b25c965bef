//! Inferred variables.
//!
//! Variable inference groups terms whose memory locations alias into
//! storage units. The generator asks which variable a term belongs to,
//! and enumerates a variable's touching terms to decide whether its
//! defining assignment can be inlined.

use std::collections::HashMap;

use crate::location::MemoryLocation;
use crate::term::TermId;

/// Unique identifier for a variable within a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VariableId(pub u32);

/// A term touching a variable, together with the location it touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TermAndLocation {
    pub term: TermId,
    pub location: MemoryLocation,
}

/// An inferred storage unit.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Variable {
    /// The variable's canonical storage.
    pub memory_location: MemoryLocation,
    /// True for variables living in global memory.
    pub is_global: bool,
    /// All terms touching the variable, with the locations they touch.
    pub terms: Vec<TermAndLocation>,
}

impl Variable {
    /// Returns true for function-local variables.
    pub fn is_local(&self) -> bool {
        !self.is_global
    }
}

/// The variables of one function.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    vars: Vec<Variable>,
    by_term: HashMap<TermId, VariableId>,
}

impl Variables {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable with no touching terms yet.
    pub fn add_variable(&mut self, memory_location: MemoryLocation, is_global: bool) -> VariableId {
        let id = VariableId(self.vars.len() as u32);
        self.vars.push(Variable {
            memory_location,
            is_global,
            terms: Vec::new(),
        });
        id
    }

    /// Records that `term` touches `var` at `location`.
    pub fn attach_term(&mut self, var: VariableId, term: TermId, location: MemoryLocation) {
        self.vars[var.0 as usize]
            .terms
            .push(TermAndLocation { term, location });
        self.by_term.insert(term, var);
    }

    /// Returns a variable by id.
    pub fn var(&self, id: VariableId) -> &Variable {
        &self.vars[id.0 as usize]
    }

    /// The variable a term belongs to, if any.
    pub fn var_of(&self, term: TermId) -> Option<VariableId> {
        self.by_term.get(&term).copied()
    }

    /// Iterates over all variables.
    pub fn iter(&self) -> impl Iterator<Item = (VariableId, &Variable)> {
        self.vars
            .iter()
            .enumerate()
            .map(|(i, v)| (VariableId(i as u32), v))
    }
}
