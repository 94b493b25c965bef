//! Functions and basic blocks.

use indexmap::IndexMap;

use crate::location::{MemoryLocation, SizedValue};
use crate::statement::{InsnId, Instruction, Statement, StatementKind, StmtId};
use crate::term::{Access, BinaryOpKind, Term, TermId, TermKind, UnaryOpKind};

/// Unique identifier for a basic block within a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasicBlockId(pub u32);

impl BasicBlockId {
    /// Creates a new basic block ID.
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for BasicBlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A basic block: an ordered list of statements, terminated by the trailing
/// jump statement when one is present.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasicBlock {
    /// Unique identifier for this block.
    pub id: BasicBlockId,
    /// Load address of the block, when it was lifted from mapped code.
    pub address: Option<u64>,
    /// Statements in execution order.
    pub statements: Vec<StmtId>,
}

/// A function under decompilation.
///
/// The function owns arenas for its statements, terms and instructions;
/// everything else refers to them through copyable ids. Back-references
/// (term to statement, statement to block) are filled in by [`Function::push_stmt`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Function {
    /// Function name (symbol or synthesized).
    pub name: String,
    /// Entry address, when known.
    pub address: Option<u64>,
    /// The entry block.
    pub entry: BasicBlockId,
    blocks: IndexMap<BasicBlockId, BasicBlock>,
    stmts: Vec<Statement>,
    terms: Vec<Term>,
    insns: Vec<Instruction>,
}

impl Function {
    /// Creates an empty function. The entry block still has to be added.
    pub fn new(name: impl Into<String>, entry: BasicBlockId) -> Self {
        Self {
            name: name.into(),
            address: None,
            entry,
            blocks: IndexMap::new(),
            stmts: Vec::new(),
            terms: Vec::new(),
            insns: Vec::new(),
        }
    }

    /// Adds a basic block.
    pub fn add_block(&mut self, id: BasicBlockId, address: Option<u64>) {
        self.blocks.insert(
            id,
            BasicBlock {
                id,
                address,
                statements: Vec::new(),
            },
        );
    }

    /// Returns a block by id.
    pub fn block(&self, id: BasicBlockId) -> Option<&BasicBlock> {
        self.blocks.get(&id)
    }

    /// Iterates over all blocks in insertion order.
    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.values()
    }

    /// Returns the block starting at the given load address.
    pub fn block_at_address(&self, address: u64) -> Option<BasicBlockId> {
        self.blocks
            .values()
            .find(|b| b.address == Some(address))
            .map(|b| b.id)
    }

    /// Records a machine instruction.
    pub fn add_insn(&mut self, address: u64, text: impl Into<String>) -> InsnId {
        let id = InsnId(self.insns.len() as u32);
        self.insns.push(Instruction {
            address,
            text: text.into(),
        });
        id
    }

    /// Returns an instruction by id.
    pub fn insn(&self, id: InsnId) -> &Instruction {
        &self.insns[id.0 as usize]
    }

    /// Adds a term to the arena.
    pub fn add_term(&mut self, kind: TermKind, size: u16) -> TermId {
        let id = TermId(self.terms.len() as u32);
        self.terms.push(Term::new(kind, size));
        id
    }

    /// Returns a term by id.
    pub fn term(&self, id: TermId) -> &Term {
        &self.terms[id.0 as usize]
    }

    /// Returns a statement by id.
    pub fn stmt(&self, id: StmtId) -> &Statement {
        &self.stmts[id.0 as usize]
    }

    /// Appends a statement to a block, adopting its term trees: the
    /// statement backref is set on every reachable term, the assignment's
    /// left root becomes a write, and a kill's term becomes a kill.
    pub fn push_stmt(
        &mut self,
        block: BasicBlockId,
        kind: StatementKind,
        insn: Option<InsnId>,
    ) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);

        let mut roots = Vec::new();
        match &kind {
            StatementKind::Assignment { left, right } => {
                roots.push(*left);
                roots.push(*right);
            }
            StatementKind::Jump {
                condition,
                then_target,
                else_target,
            } => {
                roots.extend(condition.iter().copied());
                roots.extend(then_target.address.iter().copied());
                if let Some(t) = else_target {
                    roots.extend(t.address.iter().copied());
                }
            }
            StatementKind::Call { target } => roots.push(*target),
            StatementKind::Touch { term } => roots.push(*term),
            StatementKind::Kill { term } => roots.push(*term),
            _ => {}
        }
        for root in &roots {
            self.adopt_term(*root, id);
        }
        match &kind {
            StatementKind::Assignment { left, .. } => {
                self.terms[left.0 as usize].access = Access::Write;
            }
            StatementKind::Kill { term } => {
                self.terms[term.0 as usize].access = Access::Kill;
            }
            _ => {}
        }

        self.stmts.push(Statement { kind, block, insn });
        self.blocks
            .get_mut(&block)
            .expect("statement pushed into unknown block")
            .statements
            .push(id);
        id
    }

    fn adopt_term(&mut self, root: TermId, stmt: StmtId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let term = &mut self.terms[id.0 as usize];
            term.stmt = Some(stmt);
            match &term.kind {
                TermKind::Dereference { address } => stack.push(*address),
                TermKind::UnaryOp { operand, .. } => stack.push(*operand),
                TermKind::BinaryOp { left, right, .. } => {
                    stack.push(*left);
                    stack.push(*right);
                }
                TermKind::Choice { preferred, default } => {
                    stack.push(*preferred);
                    stack.push(*default);
                }
                _ => {}
            }
        }
    }

    /// Returns the trailing jump statement of a block, if any.
    pub fn jump_of(&self, block: BasicBlockId) -> Option<StmtId> {
        let last = *self.block(block)?.statements.last()?;
        matches!(self.stmt(last).kind, StatementKind::Jump { .. }).then_some(last)
    }

    /// Returns the defining source of a write term: the right-hand side
    /// when the term is an assignment's left, `None` otherwise.
    pub fn source_of(&self, term: TermId) -> Option<TermId> {
        let stmt = self.term(term).stmt?;
        match &self.stmt(stmt).kind {
            StatementKind::Assignment { left, right } if *left == term => Some(*right),
            _ => None,
        }
    }

    /// Position of a statement within its block.
    pub fn stmt_index(&self, id: StmtId) -> Option<usize> {
        let block = self.block(self.stmt(id).block)?;
        block.statements.iter().position(|s| *s == id)
    }

    // Convenience constructors used by lifters and tests.

    /// An integer constant term.
    pub fn int_const(&mut self, value: u64, size: u16) -> TermId {
        self.add_term(TermKind::IntConst(SizedValue::new(size, value)), size)
    }

    /// An intrinsic term.
    pub fn intrinsic(&mut self, size: u16) -> TermId {
        self.add_term(TermKind::Intrinsic, size)
    }

    /// A direct memory location access.
    pub fn mem_access(&mut self, location: MemoryLocation) -> TermId {
        let size = location.size as u16;
        self.add_term(TermKind::MemoryLocationAccess(location), size)
    }

    /// A dereference of a computed address.
    pub fn deref(&mut self, address: TermId, size: u16) -> TermId {
        self.add_term(TermKind::Dereference { address }, size)
    }

    /// A unary operation.
    pub fn unary(&mut self, op: UnaryOpKind, operand: TermId, size: u16) -> TermId {
        self.add_term(TermKind::UnaryOp { op, operand }, size)
    }

    /// A binary operation.
    pub fn binary(&mut self, op: BinaryOpKind, left: TermId, right: TermId, size: u16) -> TermId {
        self.add_term(TermKind::BinaryOp { op, left, right }, size)
    }

    /// A choice between a preferred and a default term.
    pub fn choice(&mut self, preferred: TermId, default: TermId, size: u16) -> TermId {
        self.add_term(TermKind::Choice { preferred, default }, size)
    }
}
