//! IR statements and jump targets.

use crate::function::BasicBlockId;
use crate::term::TermId;

/// Unique identifier for a statement within a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StmtId(pub u32);

/// Unique identifier for a machine instruction within a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InsnId(pub u32);

/// A machine instruction a statement was lifted from.
///
/// Only the address and the disassembly text survive into the IR; the
/// address orders statements of different instructions within a block, and
/// the text is echoed for inline-assembly statements.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    /// Load address of the instruction.
    pub address: u64,
    /// Disassembly text.
    pub text: String,
}

/// One entry of a jump table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JumpTableEntry {
    /// Target address of the entry.
    pub address: u64,
}

/// An ordered jump table.
pub type JumpTable = Vec<JumpTableEntry>;

/// The target of a jump edge.
///
/// A target is resolved to a basic block when intraprocedural analysis
/// found one, carries an address term when only the address expression is
/// known, or a jump table for table-based dispatch. A target with none of
/// the three is wholly unresolved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JumpTarget {
    /// The resolved basic block, if any.
    pub basic_block: Option<BasicBlockId>,
    /// The address term, if any.
    pub address: Option<TermId>,
    /// The jump table, if any.
    pub table: Option<JumpTable>,
}

impl JumpTarget {
    /// A target resolved to a basic block.
    pub fn block(bb: BasicBlockId) -> Self {
        Self {
            basic_block: Some(bb),
            ..Self::default()
        }
    }

    /// A target known only by its address expression.
    pub fn address(term: TermId) -> Self {
        Self {
            address: Some(term),
            ..Self::default()
        }
    }

    /// A table-based target.
    pub fn table(entries: JumpTable) -> Self {
        Self {
            table: Some(entries),
            ..Self::default()
        }
    }

    /// A wholly unresolved target.
    pub fn unresolved() -> Self {
        Self::default()
    }
}

/// The kind of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StatementKind {
    /// An instruction the lifter could not model; echoed verbatim.
    InlineAssembly,
    /// `left = right`.
    Assignment { left: TermId, right: TermId },
    /// A control transfer. Unconditional when `condition` is absent.
    Jump {
        condition: Option<TermId>,
        then_target: JumpTarget,
        else_target: Option<JumpTarget>,
    },
    /// A call through `target`.
    Call { target: TermId },
    /// Return from the function.
    Return,
    /// Marks a term as used without generating code.
    Touch { term: TermId },
    /// An analysis callback marker.
    Callback,
    /// A lifter comment.
    Comment(String),
    /// Invalidates the killed term's location.
    Kill { term: TermId },
}

/// A statement in the IR.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Statement {
    /// What the statement does.
    pub kind: StatementKind,
    /// The block the statement belongs to.
    pub block: BasicBlockId,
    /// The originating machine instruction, if any.
    pub insn: Option<InsnId>,
}

impl Statement {
    /// Returns the jump payload if this is a jump statement.
    pub fn as_jump(&self) -> Option<(&Option<TermId>, &JumpTarget, &Option<JumpTarget>)> {
        match &self.kind {
            StatementKind::Jump {
                condition,
                then_target,
                else_target,
            } => Some((condition, then_target, else_target)),
            _ => None,
        }
    }

    /// Returns true if this is a conditional jump.
    pub fn is_conditional_jump(&self) -> bool {
        matches!(
            &self.kind,
            StatementKind::Jump {
                condition: Some(_),
                ..
            }
        )
    }
}
