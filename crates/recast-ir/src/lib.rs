//! # recast-ir
//!
//! Intermediate representation consumed by the recast code generator.
//! This crate defines the per-function IR (basic blocks, statements, terms),
//! the structured control-flow tree produced by region analysis, and the
//! containers that carry the results of the upstream analyses:
//!
//! - Data flow facts (memory locations, abstract values, reaching definitions)
//! - Liveness facts
//! - Inferred variables
//! - Term types
//! - Calling signatures and the entry/call/return hooks
//!
//! Nothing here computes those results from machine code; lifters and
//! analysis passes fill the containers in, and the generator reads them.

pub mod calling;
pub mod cancel;
pub mod cfg;
pub mod dataflow;
pub mod error;
pub mod function;
pub mod image;
pub mod liveness;
pub mod location;
pub mod region;
pub mod registers;
pub mod statement;
pub mod term;
pub mod types;
pub mod variables;

pub use calling::{CallHook, EntryHook, Hooks, ReturnHook, Signature, SignatureId, SignatureValue, Signatures};
pub use cancel::CancellationToken;
pub use cfg::{Cfg, DominatorTree};
pub use dataflow::{AbstractValue, Dataflow, Value};
pub use error::Error;
pub use function::{BasicBlock, BasicBlockId, Function};
pub use image::{Image, Section};
pub use liveness::Liveness;
pub use location::{MemoryDomain, MemoryLocation, SizedValue, CHAR_BIT};
pub use region::{NodeId, NodeKind, RegionKind, RegionTree, SwitchData};
pub use registers::{Register, RegisterMap};
pub use statement::{InsnId, Instruction, JumpTable, JumpTableEntry, JumpTarget, Statement, StatementKind, StmtId};
pub use term::{Access, BinaryOpKind, Term, TermId, TermKind, UnaryOpKind};
pub use types::{IrType, Types};
pub use variables::{TermAndLocation, Variable, VariableId, Variables};
