//! The C-like output AST.
//!
//! The generator produces one [`FunctionDefinition`] per function: parameter,
//! local and label declarations, and a body of statements. The tree is
//! owned top-down; declarations are referenced by index so the same
//! declaration can back many identifiers.
//!
//! Every statement and expression carries provenance back to the IR
//! statement or term it was lowered from; [`CStmt::attach_origin`] and
//! [`CExpr::attach_term`] fill the attribution in on nodes that do not have
//! one yet.

use indexmap::IndexMap;
use recast_ir::{MemoryLocation, StmtId, TermId};

/// Index of a local declaration within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(pub u32);

/// Index of a label declaration within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(pub u32);

/// A type of the output language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CType {
    /// `void`.
    Void,
    /// A sized integer, signed or unsigned.
    Int { size: u16, unsigned: bool },
    /// A pointer of the given size.
    Pointer { size: u16, pointee: Box<CType> },
}

impl CType {
    /// An integer type.
    pub fn int(size: u16, unsigned: bool) -> Self {
        Self::Int { size, unsigned }
    }

    /// A pointer type.
    pub fn pointer(size: u16, pointee: CType) -> Self {
        Self::Pointer {
            size,
            pointee: Box::new(pointee),
        }
    }
}

/// What an identifier refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarRef {
    /// A local declaration of the current function.
    Local(LocalId),
    /// A parameter of the current function, by position.
    Param(usize),
    /// A global variable, by name.
    Global(String),
}

/// Unary operators of the output language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CUnaryOp {
    LogicalNot,
    BitwiseNot,
    Negation,
    Dereference,
    Reference,
}

/// Binary operators of the output language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CBinaryOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Lt,
    Leq,
    LogicalAnd,
    LogicalOr,
    Comma,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CExpr {
    /// What the expression is.
    pub kind: CExprKind,
    /// The IR term this expression was lowered from, if attributed.
    pub term: Option<TermId>,
}

/// The kind of an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CExprKind {
    /// A variable reference.
    Identifier(VarRef),
    /// A reference to a known function, by name.
    FunctionRef(String),
    /// A label, usable as a `goto` operand.
    LabelRef(LabelId),
    /// An integer literal of a given type.
    IntLiteral { value: u64, ty: CType },
    /// A string literal.
    StringLiteral(String),
    /// A unary operation.
    Unary { op: CUnaryOp, operand: Box<CExpr> },
    /// A binary operation.
    Binary {
        op: CBinaryOp,
        left: Box<CExpr>,
        right: Box<CExpr>,
    },
    /// A call.
    Call {
        target: Box<CExpr>,
        arguments: Vec<CExpr>,
    },
    /// An explicit cast.
    Cast { ty: CType, expr: Box<CExpr> },
}

impl CExpr {
    /// Creates an unattributed expression.
    pub fn new(kind: CExprKind) -> Self {
        Self { kind, term: None }
    }

    /// A variable reference.
    pub fn identifier(var: VarRef) -> Self {
        Self::new(CExprKind::Identifier(var))
    }

    /// An integer literal.
    pub fn int_literal(value: u64, ty: CType) -> Self {
        Self::new(CExprKind::IntLiteral { value, ty })
    }

    /// A string literal.
    pub fn string(s: impl Into<String>) -> Self {
        Self::new(CExprKind::StringLiteral(s.into()))
    }

    /// A unary operation.
    pub fn unary(op: CUnaryOp, operand: CExpr) -> Self {
        Self::new(CExprKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// A binary operation.
    pub fn binary(op: CBinaryOp, left: CExpr, right: CExpr) -> Self {
        Self::new(CExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// A call.
    pub fn call(target: CExpr, arguments: Vec<CExpr>) -> Self {
        Self::new(CExprKind::Call {
            target: Box::new(target),
            arguments,
        })
    }

    /// An explicit cast.
    pub fn cast(ty: CType, expr: CExpr) -> Self {
        Self::new(CExprKind::Cast {
            ty,
            expr: Box::new(expr),
        })
    }

    /// Attributes this expression tree to an IR term.
    ///
    /// Nodes that already carry a term keep it, and their subtrees are left
    /// alone: a set attribution marks the frontier of an earlier lowering.
    pub fn attach_term(&mut self, term: TermId) {
        if self.term.is_some() {
            return;
        }
        self.term = Some(term);
        match &mut self.kind {
            CExprKind::Unary { operand, .. } => operand.attach_term(term),
            CExprKind::Binary { left, right, .. } => {
                left.attach_term(term);
                right.attach_term(term);
            }
            CExprKind::Call { target, arguments } => {
                target.attach_term(term);
                for arg in arguments {
                    arg.attach_term(term);
                }
            }
            CExprKind::Cast { expr, .. } => expr.attach_term(term),
            _ => {}
        }
    }
}

/// A statement node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CStmt {
    /// What the statement is.
    pub kind: CStmtKind,
    /// The IR statement this was lowered from, if attributed.
    pub stmt: Option<StmtId>,
}

/// The kind of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CStmtKind {
    /// An expression evaluated for effect.
    Expression(CExpr),
    /// `if (condition) then_stmt [else else_stmt]`.
    If {
        condition: CExpr,
        then_stmt: Box<CStmt>,
        else_stmt: Option<Box<CStmt>>,
    },
    /// `while (condition) body`.
    While { condition: CExpr, body: Box<CStmt> },
    /// `do body while (condition);`.
    DoWhile { body: Box<CStmt>, condition: CExpr },
    /// `switch (expression) body`.
    Switch {
        expression: CExpr,
        body: Box<CStmt>,
    },
    /// A braced block.
    Block(Block),
    /// `break;`.
    Break,
    /// `continue;`.
    Continue,
    /// `return [expr];`.
    Return(Option<CExpr>),
    /// `goto` to a label, an address expression, or an unresolved marker.
    Goto(CExpr),
    /// A label definition.
    Label(LabelId),
    /// `case value:`.
    CaseLabel { value: i64, ty: CType },
    /// `default:`.
    DefaultLabel,
    /// Verbatim inline assembly.
    InlineAsm(String),
}

impl CStmt {
    /// Creates an unattributed statement.
    pub fn new(kind: CStmtKind) -> Self {
        Self { kind, stmt: None }
    }

    /// An expression statement.
    pub fn expression(expr: CExpr) -> Self {
        Self::new(CStmtKind::Expression(expr))
    }

    /// A block statement.
    pub fn block(block: Block) -> Self {
        Self::new(CStmtKind::Block(block))
    }

    /// Attributes this statement tree to an IR statement.
    ///
    /// As with terms, an already-set attribution stops the walk: those
    /// nodes came from an earlier lowering with their own origin.
    pub fn attach_origin(&mut self, stmt: StmtId) {
        if self.stmt.is_some() {
            return;
        }
        self.stmt = Some(stmt);
        match &mut self.kind {
            CStmtKind::If {
                then_stmt,
                else_stmt,
                ..
            } => {
                then_stmt.attach_origin(stmt);
                if let Some(e) = else_stmt {
                    e.attach_origin(stmt);
                }
            }
            CStmtKind::While { body, .. }
            | CStmtKind::DoWhile { body, .. }
            | CStmtKind::Switch { body, .. } => body.attach_origin(stmt),
            CStmtKind::Block(block) => {
                for s in &mut block.statements {
                    s.attach_origin(stmt);
                }
            }
            _ => {}
        }
    }
}

/// A sequence of statements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    /// Statements in emission order.
    pub statements: Vec<CStmt>,
}

impl Block {
    /// Creates an empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a statement.
    pub fn push(&mut self, stmt: CStmt) {
        self.statements.push(stmt);
    }
}

/// A parameter declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDeclaration {
    pub name: String,
    pub ty: CType,
}

/// A local variable declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDeclaration {
    pub name: String,
    pub ty: CType,
}

/// A label declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDecl {
    /// Label name, derived from the block's address when known.
    pub name: String,
    /// True once a `goto` targets the label; printers may elide the rest.
    pub referenced: bool,
}

/// A generated function definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDefinition {
    /// Display name from the signature.
    pub name: String,
    /// Return type; `void` when the signature has no return value.
    pub return_type: CType,
    /// True for variadic signatures.
    pub variadic: bool,
    /// Comment carried over from the signature.
    pub comment: Option<String>,
    /// Parameters in signature order.
    pub parameters: Vec<ParameterDeclaration>,
    /// Locals in first-touch order; the index is the `v<N>` suffix.
    pub locals: Vec<LocalDeclaration>,
    /// Labels in first-use order.
    pub labels: Vec<LabelDecl>,
    /// The function body.
    pub body: Block,
}

/// A global variable declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalVariable {
    pub name: String,
    pub ty: CType,
}

/// Global declarations shared across the functions of one program.
///
/// Keyed by memory location; the first declaration of a location wins and
/// later requests reuse its name.
#[derive(Debug, Clone, Default)]
pub struct GlobalScope {
    decls: IndexMap<MemoryLocation, GlobalVariable>,
}

impl GlobalScope {
    /// Creates an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares (or finds) the global at a location and returns its name.
    pub fn declare(&mut self, location: MemoryLocation, ty: CType) -> String {
        let name = format!("g_{:x}", location.addr / recast_ir::CHAR_BIT);
        self.decls
            .entry(location)
            .or_insert_with(|| GlobalVariable {
                name: name.clone(),
                ty,
            })
            .name
            .clone()
    }

    /// Iterates over all declared globals in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&MemoryLocation, &GlobalVariable)> {
        self.decls.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_term_stops_at_attributed_nodes() {
        let mut inner = CExpr::int_literal(1, CType::int(32, false));
        inner.attach_term(TermId(7));
        let mut outer = CExpr::unary(CUnaryOp::Negation, inner);

        outer.attach_term(TermId(9));

        assert_eq!(outer.term, Some(TermId(9)));
        if let CExprKind::Unary { operand, .. } = &outer.kind {
            assert_eq!(operand.term, Some(TermId(7)));
        } else {
            panic!("expected unary");
        }
    }

    #[test]
    fn test_attach_origin_recurses_into_blocks() {
        let mut block = Block::new();
        block.push(CStmt::new(CStmtKind::Break));
        let mut stmt = CStmt::block(block);

        stmt.attach_origin(StmtId(3));

        assert_eq!(stmt.stmt, Some(StmtId(3)));
        if let CStmtKind::Block(b) = &stmt.kind {
            assert_eq!(b.statements[0].stmt, Some(StmtId(3)));
        } else {
            panic!("expected block");
        }
    }

    #[test]
    fn test_global_scope_reuses_names() {
        use recast_ir::{MemoryDomain, MemoryLocation};

        let mut scope = GlobalScope::new();
        let loc = MemoryLocation::new(MemoryDomain::Memory, 0x2000 * 8, 32);
        let a = scope.declare(loc, CType::int(32, true));
        let b = scope.declare(loc, CType::int(64, true));
        assert_eq!(a, "g_2000");
        assert_eq!(a, b);
        assert_eq!(scope.iter().count(), 1);
    }
}
