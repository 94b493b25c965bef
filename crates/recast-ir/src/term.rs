//! IR terms: the expression-level representation.

use crate::location::{MemoryLocation, SizedValue};
use crate::statement::StmtId;

/// Unique identifier for a term within a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TermId(pub u32);

impl std::fmt::Display for TermId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// The role a term plays in its statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Access {
    /// The term reads its location.
    Read,
    /// The term writes its location.
    Write,
    /// The term invalidates its location.
    Kill,
}

/// Unary operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnaryOpKind {
    /// Bitwise complement.
    Not,
    /// Arithmetic negation.
    Negation,
    /// Widen, replicating the sign bit.
    SignExtend,
    /// Widen with zeroes.
    ZeroExtend,
    /// Narrow to the term's size.
    Truncate,
}

/// Binary operator kinds.
///
/// Division, remainder, shifts-right and orderings come in signed and
/// unsigned flavors; the machine code determines which one was meant, and
/// the code generator turns the flavor into explicit operand casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOpKind {
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Sar,
    Add,
    Sub,
    Mul,
    SignedDiv,
    SignedRem,
    UnsignedDiv,
    UnsignedRem,
    Equal,
    SignedLess,
    SignedLessOrEqual,
    UnsignedLess,
    UnsignedLessOrEqual,
}

/// The kind of a term.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TermKind {
    /// An integer constant.
    IntConst(SizedValue),
    /// An opaque architecture intrinsic.
    Intrinsic,
    /// A direct access to a memory location (register, stack slot, global).
    MemoryLocationAccess(MemoryLocation),
    /// A memory access through a computed address.
    Dereference { address: TermId },
    /// A unary operation.
    UnaryOp { op: UnaryOpKind, operand: TermId },
    /// A binary operation.
    BinaryOp {
        op: BinaryOpKind,
        left: TermId,
        right: TermId,
    },
    /// Use `preferred` if it has reaching definitions, else `default`.
    Choice { preferred: TermId, default: TermId },
}

/// A term in the IR.
///
/// Terms are owned by their function's arena; `stmt` points back at the
/// statement the term (transitively) belongs to and is filled in when the
/// statement is pushed into a block.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Term {
    /// What the term is.
    pub kind: TermKind,
    /// Size in bits.
    pub size: u16,
    /// Read/write/kill role. Defaults to `Read`; adjusted when the term is
    /// adopted by a statement.
    pub access: Access,
    /// The statement this term belongs to, if any.
    pub stmt: Option<StmtId>,
}

impl Term {
    /// Creates a term with the default `Read` role and no owning statement.
    pub fn new(kind: TermKind, size: u16) -> Self {
        Self {
            kind,
            size,
            access: Access::Read,
            stmt: None,
        }
    }

    /// Returns true if the term reads its location.
    pub fn is_read(&self) -> bool {
        self.access == Access::Read
    }

    /// Returns true if the term writes its location.
    pub fn is_write(&self) -> bool {
        self.access == Access::Write
    }
}
