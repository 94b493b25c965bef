//! The inlining oracle.
//!
//! Decides when a variable's defining assignment may be elided and its
//! right-hand side substituted at the use site. All predicates are pure
//! functions of the dataflow, liveness and dominance facts; the two
//! expensive ones are memoised per variable because they enumerate the
//! variable's whole touching-term set.

use std::collections::HashMap;

use recast_ir::{
    Dataflow, DominatorTree, Function, Liveness, TermId, TermKind, VariableId, Variables,
};

/// Answers single-assignment and inlining queries for one function.
pub struct InliningOracle<'a> {
    function: &'a Function,
    dataflow: &'a Dataflow,
    liveness: &'a Liveness,
    variables: &'a Variables,
    dominators: DominatorTree,
    inline_intermediates: bool,
    single_assignment: HashMap<VariableId, bool>,
    intermediate: HashMap<VariableId, bool>,
}

impl<'a> InliningOracle<'a> {
    /// Creates an oracle over one function's facts.
    pub fn new(
        function: &'a Function,
        dataflow: &'a Dataflow,
        liveness: &'a Liveness,
        variables: &'a Variables,
        dominators: DominatorTree,
        inline_intermediates: bool,
    ) -> Self {
        Self {
            function,
            dataflow,
            liveness,
            variables,
            dominators,
            inline_intermediates,
            single_assignment: HashMap::new(),
            intermediate: HashMap::new(),
        }
    }

    /// The unique writing term of a variable, if exactly one exists.
    pub fn single_definition(&self, var: VariableId) -> Option<TermId> {
        let mut result = None;
        for tl in &self.variables.var(var).terms {
            if self.function.term(tl.term).is_write() {
                if result.is_some() {
                    return None;
                }
                result = Some(tl.term);
            }
        }
        result
    }

    /// The unique live reading term of a variable, if exactly one exists.
    pub fn single_use(&self, var: VariableId) -> Option<TermId> {
        let mut result = None;
        for tl in &self.variables.var(var).terms {
            if self.function.term(tl.term).is_read() && self.liveness.is_live(tl.term) {
                if result.is_some() {
                    return None;
                }
                result = Some(tl.term);
            }
        }
        result
    }

    /// Returns true if the write is executed before the read on every path.
    ///
    /// Within one block, terms of distinct instructions are ordered by
    /// instruction address; terms of the same instruction (or of
    /// instruction-less statements) fall back to statement order. The
    /// lifter may interleave statements of different machine instructions,
    /// so the address rule cannot be replaced by a pure index rule.
    pub fn is_dominating(&self, write: TermId, read: TermId) -> bool {
        let Some(write_stmt) = self.function.term(write).stmt else {
            return false;
        };
        let Some(read_stmt) = self.function.term(read).stmt else {
            return false;
        };

        let write_block = self.function.stmt(write_stmt).block;
        let read_block = self.function.stmt(read_stmt).block;

        if write_block == read_block {
            let write_insn = self.function.stmt(write_stmt).insn;
            let read_insn = self.function.stmt(read_stmt).insn;
            match (write_insn, read_insn) {
                (Some(w), Some(r)) if w != r => {
                    self.function.insn(w).address < self.function.insn(r).address
                }
                _ => {
                    let wi = self.function.stmt_index(write_stmt);
                    let ri = self.function.stmt_index(read_stmt);
                    match (wi, ri) {
                        (Some(wi), Some(ri)) => wi <= ri,
                        _ => false,
                    }
                }
            }
        } else {
            self.dominators.dominates(write_block, read_block)
        }
    }

    /// Returns true if the variable is local, written exactly once, every
    /// live read is dominated by that write, and no touching term accesses
    /// only part of the variable's storage.
    pub fn is_single_assignment(&mut self, var: VariableId) -> bool {
        if let Some(&cached) = self.single_assignment.get(&var) {
            return cached;
        }
        let result = self.compute_single_assignment(var);
        self.single_assignment.insert(var, result);
        result
    }

    fn compute_single_assignment(&mut self, var: VariableId) -> bool {
        let variable = self.variables.var(var);
        if variable.is_global {
            return false;
        }

        let Some(definition) = self.single_definition(var) else {
            return false;
        };

        for tl in &variable.terms {
            let term = self.function.term(tl.term);
            if term.is_read() && self.liveness.is_live(tl.term) {
                if !self.is_dominating(definition, tl.term) {
                    return false;
                }
                if tl.location != variable.memory_location {
                    return false;
                }
            } else if term.is_write() && tl.location != variable.memory_location {
                return false;
            }
        }
        true
    }

    /// Returns true if the term can be re-evaluated at another program
    /// point without changing its value: no side effects, and every leaf
    /// is a constant or a read of a single-assignment variable.
    pub fn is_movable(&mut self, term: TermId) -> bool {
        if let Some(var) = self.variables.var_of(term) {
            return self.is_single_assignment(var);
        }
        match self.function.term(term).kind.clone() {
            TermKind::IntConst(_) => true,
            TermKind::Intrinsic => false,
            TermKind::MemoryLocationAccess(_) => false,
            TermKind::Dereference { .. } => false,
            TermKind::UnaryOp { operand, .. } => self.is_movable(operand),
            TermKind::BinaryOp { left, right, .. } => {
                self.is_movable(left) && self.is_movable(right)
            }
            TermKind::Choice { preferred, default } => {
                if !self.dataflow.definitions(preferred).is_empty() {
                    self.is_movable(preferred)
                } else {
                    self.is_movable(default)
                }
            }
        }
    }

    /// Returns true if the variable's defining expression may be inlined
    /// at its uses, eliding both the declaration and the assignment.
    ///
    /// Permanently false unless the experimental `inline_intermediates`
    /// option is on.
    pub fn is_intermediate(&mut self, var: VariableId) -> bool {
        if !self.inline_intermediates {
            return false;
        }
        if let Some(&cached) = self.intermediate.get(&var) {
            return cached;
        }
        let result = self.compute_intermediate(var);
        self.intermediate.insert(var, result);
        result
    }

    fn compute_intermediate(&mut self, var: VariableId) -> bool {
        if self.variables.var(var).is_global {
            return false;
        }
        if !self.is_single_assignment(var) {
            return false;
        }

        let Some(definition) = self.single_definition(var) else {
            return false;
        };
        let Some(source) = self.function.source_of(definition) else {
            return false;
        };

        // Substituting a complex expression at many sites would duplicate
        // work; only a bare read of another single-assignment variable is
        // safe to repeat.
        if self.single_use(var).is_some() {
            self.is_movable(source)
        } else if let Some(source_var) = self.variables.var_of(source) {
            self.is_single_assignment(source_var)
        } else {
            false
        }
    }
}
