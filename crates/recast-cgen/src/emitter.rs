//! The per-function emitter.
//!
//! One [`FunctionEmitter`] is created per function, runs to completion on
//! one thread, and yields the function's C-out definition. It owns all of
//! its mutable state (declaration and label maps, the memoised inlining
//! oracle, the definition under construction) and makes read-only use of
//! the shared analysis results.
//!
//! The region walk threads three jump targets through every call: `next`,
//! the block that textually follows the emission point; `brk`, the block a
//! `break` would reach; and `cont`, the block a `continue` would reach.
//! Lowering a jump against those targets decides between emitting nothing,
//! `break`, `continue`, and a labelled `goto`.

use std::collections::HashMap;

use recast_ir::{
    BasicBlockId, CancellationToken, Cfg, Dataflow, DominatorTree, Function, Hooks, Image, IrType,
    JumpTarget, Liveness, MemoryDomain, MemoryLocation, NodeId, NodeKind, RegionKind, RegionTree,
    RegisterMap, Signature, Signatures, SizedValue, StatementKind, StmtId, SwitchData, TermId,
    TermKind, Types, UnaryOpKind, VariableId, Variables, CHAR_BIT,
};

use crate::ast::{
    Block, CBinaryOp, CExpr, CExprKind, CStmt, CStmtKind, CType, CUnaryOp, FunctionDefinition,
    GlobalScope, LabelDecl, LabelId, LocalDeclaration, LocalId, ParameterDeclaration, VarRef,
};
use crate::error::{Error, Result};
use crate::inline::InliningOracle;
use crate::options::GeneratorOptions;
use crate::switch_context::SwitchContext;

/// Integer sizes of the output target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetInfo {
    /// Pointer size in bits.
    pub pointer_size: u16,
    /// `int` size in bits.
    pub int_size: u16,
}

impl Default for TargetInfo {
    fn default() -> Self {
        Self {
            pointer_size: 64,
            int_size: 32,
        }
    }
}

/// The read-only inputs of one generation run.
#[derive(Clone, Copy)]
pub struct GeneratorContext<'a> {
    /// The function being generated.
    pub function: &'a Function,
    /// Dataflow facts for the function.
    pub dataflow: &'a Dataflow,
    /// Liveness facts for the function.
    pub liveness: &'a Liveness,
    /// Inferred variables of the function.
    pub variables: &'a Variables,
    /// The structured control-flow tree.
    pub regions: &'a RegionTree,
    /// Term types.
    pub types: &'a Types,
    /// The signature database.
    pub signatures: &'a Signatures,
    /// Entry/call/return hooks of the function.
    pub hooks: &'a Hooks,
    /// The loaded image, for the string-literal heuristic.
    pub image: Option<&'a Image>,
    /// The register file, for register-derived local names.
    pub registers: Option<&'a RegisterMap>,
    /// Output target sizes.
    pub target: TargetInfo,
}

/// Generates the C-out definition of one function.
pub struct FunctionEmitter<'a> {
    ctx: GeneratorContext<'a>,
    options: GeneratorOptions,
    globals: &'a mut GlobalScope,
    oracle: InliningOracle<'a>,
    signature: &'a Signature,
    definition: FunctionDefinition,
    var_decls: HashMap<VariableId, VarRef>,
    labels: HashMap<BasicBlockId, LabelId>,
}

impl<'a> FunctionEmitter<'a> {
    /// Creates an emitter for one function.
    ///
    /// Dominator-tree construction happens here and is the only point
    /// that observes the cancellation token; on cancellation no partial
    /// output exists yet.
    pub fn new(
        ctx: GeneratorContext<'a>,
        options: GeneratorOptions,
        globals: &'a mut GlobalScope,
        token: &CancellationToken,
    ) -> Result<Self> {
        let signature = ctx
            .signatures
            .of_function(&ctx.function.name)
            .ok_or_else(|| Error::MissingSignature(ctx.function.name.clone()))?;

        let cfg = Cfg::new(ctx.function);
        let dominators = DominatorTree::compute(&cfg, token)?;
        let oracle = InliningOracle::new(
            ctx.function,
            ctx.dataflow,
            ctx.liveness,
            ctx.variables,
            dominators,
            options.inline_intermediates,
        );

        let return_type = match &signature.return_value {
            Some(value) => Self::make_type(&value.ty),
            None => CType::Void,
        };
        let definition = FunctionDefinition {
            name: signature.name.clone(),
            return_type,
            variadic: signature.variadic,
            comment: signature.comment.clone(),
            parameters: Vec::new(),
            locals: Vec::new(),
            labels: Vec::new(),
            body: Block::new(),
        };

        Ok(Self {
            ctx,
            options,
            globals,
            oracle,
            signature,
            definition,
            var_decls: HashMap::new(),
            labels: HashMap::new(),
        })
    }

    /// Runs the generation and yields the finished definition.
    pub fn emit(mut self) -> Result<FunctionDefinition> {
        let mut body = Block::new();
        self.materialize_signature(&mut body)?;

        let mut switch_ctx = SwitchContext::new();
        let root = self.ctx.regions.root();
        self.emit_node(root, &mut body, None, None, None, &mut switch_ctx)?;

        self.definition.body = body;
        Ok(self.definition)
    }

    /// Binds each formal argument to a parameter declaration.
    ///
    /// When the argument term's location coincides with its variable's
    /// location the parameter *is* the variable declaration; otherwise a
    /// prelude assignment copies the parameter into the variable, covering
    /// conventions that pass an argument in a slot that only partially
    /// overlaps the variable's canonical storage.
    fn materialize_signature(&mut self, body: &mut Block) -> Result<()> {
        let Some(entry_hook) = self.ctx.hooks.entry() else {
            return Ok(());
        };
        let dataflow = self.ctx.dataflow;
        let variables = self.ctx.variables;

        for index in 0..self.signature.arguments.len() {
            let term = *entry_hook
                .argument_terms
                .get(index)
                .ok_or(Error::MissingArgumentTerm(index))?;
            let location = *dataflow
                .memory_location(term)
                .ok_or(Error::MissingMemoryLocation(term))?;
            let var = variables.var_of(term).ok_or(Error::MissingVariable(term))?;

            let param_index = self.definition.parameters.len();
            let ty = Self::make_type(&self.type_of(term));
            self.definition.parameters.push(ParameterDeclaration {
                name: format!("a{}", param_index + 1),
                ty,
            });

            if variables.var(var).memory_location == location {
                if self
                    .var_decls
                    .insert(var, VarRef::Param(param_index))
                    .is_some()
                {
                    return Err(Error::DuplicateArgumentVariable(term));
                }
            } else {
                let access = self.variable_access(term)?;
                body.push(CStmt::expression(CExpr::binary(
                    CBinaryOp::Assign,
                    access,
                    CExpr::identifier(VarRef::Param(param_index)),
                )));
            }
        }
        Ok(())
    }

    // ---- region walking -------------------------------------------------

    fn emit_node(
        &mut self,
        node: NodeId,
        block: &mut Block,
        next: Option<BasicBlockId>,
        brk: Option<BasicBlockId>,
        cont: Option<BasicBlockId>,
        switch_ctx: &mut SwitchContext,
    ) -> Result<()> {
        let regions = self.ctx.regions;
        match &regions.node(node).kind {
            NodeKind::Basic { block: bb } => {
                let bb = *bb;
                self.add_labels(bb, block, switch_ctx);
                let stmts = self
                    .ctx
                    .function
                    .block(bb)
                    .map(|b| b.statements.clone())
                    .unwrap_or_default();
                for stmt in stmts {
                    if let Some(lowered) = self.make_statement(stmt, next, brk, cont)? {
                        block.push(lowered);
                    }
                }
                Ok(())
            }
            NodeKind::Region {
                kind,
                children,
                entry,
                exit,
                loop_condition,
                switch,
            } => {
                let kind = *kind;
                let children = children.clone();
                let entry = *entry;
                let exit = *exit;
                let loop_condition = *loop_condition;
                let switch = switch.clone();
                self.emit_region(
                    node,
                    kind,
                    &children,
                    entry,
                    exit,
                    loop_condition,
                    switch.as_deref(),
                    block,
                    next,
                    brk,
                    cont,
                    switch_ctx,
                )
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_region(
        &mut self,
        node: NodeId,
        kind: RegionKind,
        children: &[NodeId],
        entry: NodeId,
        exit: Option<BasicBlockId>,
        loop_condition: Option<NodeId>,
        switch: Option<&SwitchData>,
        block: &mut Block,
        next: Option<BasicBlockId>,
        brk: Option<BasicBlockId>,
        cont: Option<BasicBlockId>,
        switch_ctx: &mut SwitchContext,
    ) -> Result<()> {
        let regions = self.ctx.regions;
        match kind {
            RegionKind::Unknown => {
                if children.is_empty() {
                    return Err(Error::MalformedRegion(node, "empty region"));
                }
                // DFS order tends to minimize the number of gotos.
                let nodes = regions.dfs_preorder(node);
                self.emit_sequence(&nodes, block, next, brk, cont, switch_ctx)
            }
            RegionKind::Block => {
                if children.is_empty() {
                    return Err(Error::MalformedRegion(node, "empty region"));
                }
                self.emit_sequence(children, block, next, brk, cont, switch_ctx)
            }
            RegionKind::CompoundCondition => {
                if children.len() != 2 {
                    return Err(Error::MalformedRegion(
                        node,
                        "compound condition must have two children",
                    ));
                }
                self.emit_sequence(children, block, next, brk, cont, switch_ctx)
            }
            RegionKind::IfThenElse => {
                if children.len() != 3 {
                    return Err(Error::MalformedRegion(
                        node,
                        "if-then-else must have three children",
                    ));
                }
                let then_bb = regions
                    .entry_basic_block(children[1])
                    .ok_or(Error::MalformedRegion(node, "then branch has no entry block"))?;
                let else_bb = regions
                    .entry_basic_block(children[2])
                    .ok_or(Error::MalformedRegion(node, "else branch has no entry block"))?;

                let condition =
                    self.make_condition(children[0], Some(block), then_bb, else_bb, switch_ctx)?;

                let mut then_block = Block::new();
                self.emit_node(children[1], &mut then_block, next, brk, cont, switch_ctx)?;
                let mut else_block = Block::new();
                self.emit_node(children[2], &mut else_block, next, brk, cont, switch_ctx)?;

                block.push(CStmt::new(CStmtKind::If {
                    condition,
                    then_stmt: Box::new(CStmt::block(then_block)),
                    else_stmt: Some(Box::new(CStmt::block(else_block))),
                }));
                Ok(())
            }
            RegionKind::IfThen => {
                if children.len() != 2 {
                    return Err(Error::MalformedRegion(node, "if-then must have two children"));
                }
                let exit_bb =
                    exit.ok_or(Error::MalformedRegion(node, "if-then region has no exit block"))?;
                let then_bb = regions
                    .entry_basic_block(children[1])
                    .ok_or(Error::MalformedRegion(node, "then branch has no entry block"))?;

                let condition =
                    self.make_condition(children[0], Some(block), then_bb, exit_bb, switch_ctx)?;

                let mut then_block = Block::new();
                self.emit_node(children[1], &mut then_block, next, brk, cont, switch_ctx)?;

                block.push(CStmt::new(CStmtKind::If {
                    condition,
                    then_stmt: Box::new(CStmt::block(then_block)),
                    else_stmt: None,
                }));
                Ok(())
            }
            RegionKind::Loop => {
                if children.is_empty() {
                    return Err(Error::MalformedRegion(node, "empty region"));
                }
                let entry_bb = regions
                    .entry_basic_block(entry)
                    .ok_or(Error::MalformedRegion(node, "loop has no entry block"))?;
                let condition = CExpr::int_literal(1, CType::int(self.ctx.target.int_size, false));

                let nodes = regions.dfs_preorder(node);
                let mut body = Block::new();
                self.emit_sequence(
                    &nodes,
                    &mut body,
                    Some(entry_bb),
                    next,
                    Some(entry_bb),
                    switch_ctx,
                )?;

                block.push(CStmt::new(CStmtKind::While {
                    condition,
                    body: Box::new(CStmt::block(body)),
                }));
                Ok(())
            }
            RegionKind::While => {
                if children.is_empty() {
                    return Err(Error::MalformedRegion(node, "empty region"));
                }
                let exit_bb =
                    exit.ok_or(Error::MalformedRegion(node, "while region has no exit block"))?;
                let header_bb = regions
                    .entry_basic_block(entry)
                    .ok_or(Error::MalformedRegion(node, "loop has no entry block"))?;

                self.add_labels(header_bb, block, switch_ctx);

                let body_entry = regions
                    .unique_successor(entry)
                    .and_then(|n| regions.entry_basic_block(n))
                    .unwrap_or(header_bb);
                let condition =
                    self.make_condition(entry, None, body_entry, exit_bb, switch_ctx)?;

                let mut nodes = regions.dfs_preorder(node);
                if nodes.first() != Some(&entry) {
                    return Err(Error::MalformedRegion(
                        node,
                        "loop header is not the region entry",
                    ));
                }
                nodes.remove(0);

                let mut body = Block::new();
                self.emit_sequence(
                    &nodes,
                    &mut body,
                    Some(header_bb),
                    Some(exit_bb),
                    Some(header_bb),
                    switch_ctx,
                )?;

                block.push(CStmt::new(CStmtKind::While {
                    condition,
                    body: Box::new(CStmt::block(body)),
                }));

                if let Some(jump) = self.make_jump_to_block(exit_bb, next, brk, cont) {
                    block.push(jump);
                }
                Ok(())
            }
            RegionKind::DoWhile => {
                if children.is_empty() {
                    return Err(Error::MalformedRegion(node, "empty region"));
                }
                let exit_bb = exit.ok_or(Error::MalformedRegion(
                    node,
                    "do-while region has no exit block",
                ))?;
                let condition_node = loop_condition.ok_or(Error::MalformedRegion(
                    node,
                    "do-while region has no loop condition",
                ))?;

                let mut nodes = regions.dfs_preorder(node);
                let position = nodes
                    .iter()
                    .position(|n| *n == condition_node)
                    .ok_or(Error::MalformedRegion(
                        node,
                        "loop condition is outside the region",
                    ))?;
                nodes.remove(position);

                let condition_bb = regions
                    .entry_basic_block(condition_node)
                    .ok_or(Error::MalformedRegion(node, "loop condition has no entry block"))?;
                let mut body = Block::new();
                self.emit_sequence(
                    &nodes,
                    &mut body,
                    Some(condition_bb),
                    next,
                    Some(condition_bb),
                    switch_ctx,
                )?;

                let then_bb = regions
                    .entry_basic_block(entry)
                    .ok_or(Error::MalformedRegion(node, "loop has no entry block"))?;
                let condition =
                    self.make_condition(condition_node, Some(&mut body), then_bb, exit_bb, switch_ctx)?;

                block.push(CStmt::new(CStmtKind::DoWhile {
                    body: Box::new(CStmt::block(body)),
                    condition,
                }));

                if let Some(jump) = self.make_jump_to_block(exit_bb, next, brk, cont) {
                    block.push(jump);
                }
                Ok(())
            }
            RegionKind::Switch => {
                self.emit_switch(node, exit, switch, block, next, brk, cont, switch_ctx)
            }
        }
    }

    /// Walks `nodes` in order: each node's `next` target is the entry
    /// block of the node that follows it, and the last inherits the
    /// caller's `next`.
    fn emit_sequence(
        &mut self,
        nodes: &[NodeId],
        block: &mut Block,
        next: Option<BasicBlockId>,
        brk: Option<BasicBlockId>,
        cont: Option<BasicBlockId>,
        switch_ctx: &mut SwitchContext,
    ) -> Result<()> {
        if nodes.is_empty() {
            return Ok(());
        }
        for i in 0..nodes.len() - 1 {
            let following = self.ctx.regions.entry_basic_block(nodes[i + 1]);
            self.emit_node(nodes[i], block, following, brk, cont, switch_ctx)?;
        }
        self.emit_node(nodes[nodes.len() - 1], block, next, brk, cont, switch_ctx)
    }

    // ---- switch reconstruction ------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn emit_switch(
        &mut self,
        node: NodeId,
        exit: Option<BasicBlockId>,
        switch: Option<&SwitchData>,
        block: &mut Block,
        next: Option<BasicBlockId>,
        brk: Option<BasicBlockId>,
        cont: Option<BasicBlockId>,
        switch_ctx: &mut SwitchContext,
    ) -> Result<()> {
        let regions = self.ctx.regions;
        let function = self.ctx.function;
        let data = switch.ok_or(Error::MalformedSwitch(node, "region carries no switch data"))?;

        // The bounds check and the dispatch block contribute their
        // statements to the enclosing block; their terminators are
        // consumed by the switch itself.
        if let Some(bounds_check) = data.bounds_check_node {
            let bb = Self::basic_block_of(regions, bounds_check).ok_or(Error::MalformedSwitch(
                node,
                "bounds check is not a basic node",
            ))?;
            self.emit_all_but_terminator(bb, block, switch_ctx)?;
        }
        let switch_bb = Self::basic_block_of(regions, data.switch_node)
            .ok_or(Error::MalformedSwitch(node, "switch node is not a basic node"))?;
        self.emit_all_but_terminator(switch_bb, block, switch_ctx)?;

        let jump = function
            .jump_of(switch_bb)
            .ok_or(Error::MalformedSwitch(node, "switch block has no jump"))?;
        let Some((condition, then_target, _)) = function.stmt(jump).as_jump() else {
            return Err(Error::BrokenInvariant("jump_of returned a non-jump"));
        };
        if condition.is_some() {
            return Err(Error::MalformedSwitch(node, "switch jump is conditional"));
        }
        let table = then_target
            .table
            .clone()
            .ok_or(Error::MalformedSwitch(node, "switch jump has no table"))?;
        if data.table_size > table.len() {
            return Err(Error::MalformedSwitch(node, "table shorter than declared size"));
        }

        let mut new_ctx = SwitchContext::new();
        let value_type = CType::int(function.term(data.switch_term).size, false);
        new_ctx.set_value_type(value_type.clone());
        for (index, entry) in table.iter().take(data.table_size).enumerate() {
            new_ctx.add_case_value(entry.address, index as i64);
        }
        if let Some(default_bb) = data.default_block {
            new_ctx.set_default_block(default_bb);
        }

        let exit = exit.or(next);

        let expression = CExpr::cast(value_type.clone(), self.make_expression(data.switch_term)?);

        let mut nodes = regions.dfs_preorder(node);
        nodes.retain(|n| Some(*n) != data.bounds_check_node && *n != data.switch_node);

        let mut body = Block::new();
        self.emit_sequence(&nodes, &mut body, exit, exit, cont, &mut new_ctx)?;

        // Jump-table entries that lie outside the structured region become
        // case-labelled gotos to their raw addresses.
        for (address, values) in new_ctx.take_remaining() {
            for value in values {
                body.push(CStmt::new(CStmtKind::CaseLabel {
                    value,
                    ty: value_type.clone(),
                }));
            }
            body.push(CStmt::new(CStmtKind::Goto(CExpr::int_literal(
                address,
                CType::int(self.ctx.target.pointer_size, true),
            ))));
        }

        block.push(CStmt::new(CStmtKind::Switch {
            expression,
            body: Box::new(CStmt::block(body)),
        }));

        if let Some(exit_bb) = exit {
            if let Some(jump) = self.make_jump_to_block(exit_bb, next, brk, cont) {
                block.push(jump);
            }
        }
        Ok(())
    }

    fn basic_block_of(regions: &RegionTree, node: NodeId) -> Option<BasicBlockId> {
        match &regions.node(node).kind {
            NodeKind::Basic { block } => Some(*block),
            NodeKind::Region { .. } => None,
        }
    }

    /// Emits a block's labels and all statements except the trailing one.
    fn emit_all_but_terminator(
        &mut self,
        bb: BasicBlockId,
        block: &mut Block,
        switch_ctx: &mut SwitchContext,
    ) -> Result<()> {
        self.add_labels(bb, block, switch_ctx);
        let stmts = self
            .ctx
            .function
            .block(bb)
            .map(|b| b.statements.clone())
            .unwrap_or_default();
        if stmts.is_empty() {
            return Ok(());
        }
        for &stmt in &stmts[..stmts.len() - 1] {
            if let Some(lowered) = self.make_statement(stmt, None, None, None)? {
                block.push(lowered);
            }
        }
        Ok(())
    }

    // ---- labels ---------------------------------------------------------

    /// Emits the block's label statement and any case labels the switch
    /// context registered for the block's address, consuming them.
    fn add_labels(&mut self, bb: BasicBlockId, block: &mut Block, switch_ctx: &mut SwitchContext) {
        let label = self.label_for(bb);
        block.push(CStmt::new(CStmtKind::Label(label)));

        let Some(address) = self.ctx.function.block(bb).and_then(|b| b.address) else {
            return;
        };
        if Some(bb) == switch_ctx.default_block() {
            block.push(CStmt::new(CStmtKind::DefaultLabel));
        } else {
            for &value in switch_ctx.case_values(address) {
                block.push(CStmt::new(CStmtKind::CaseLabel {
                    value,
                    ty: switch_ctx.value_type().clone(),
                }));
            }
        }
        switch_ctx.erase_case_values(address);
    }

    /// The label of a basic block, created on first request.
    fn label_for(&mut self, bb: BasicBlockId) -> LabelId {
        if let Some(&id) = self.labels.get(&bb) {
            return id;
        }
        let index = self.definition.labels.len();
        let name = match self.ctx.function.block(bb).and_then(|b| b.address) {
            Some(address) => format!("addr_0x{:x}_{}", address, index),
            None => format!("label_{}", index),
        };
        self.definition.labels.push(LabelDecl {
            name,
            referenced: false,
        });
        let id = LabelId(index as u32);
        self.labels.insert(bb, id);
        id
    }

    // ---- condition synthesis --------------------------------------------

    /// Produces one boolean expression for a condition node, negating when
    /// the terminator's then-edge leads to `else_bb`. Side-effect
    /// statements inside the node go into `side` when one is given;
    /// otherwise expression statements are comma-joined into the result.
    fn make_condition(
        &mut self,
        node: NodeId,
        mut side: Option<&mut Block>,
        then_bb: BasicBlockId,
        else_bb: BasicBlockId,
        switch_ctx: &mut SwitchContext,
    ) -> Result<CExpr> {
        let regions = self.ctx.regions;
        let function = self.ctx.function;

        match &regions.node(node).kind {
            NodeKind::Basic { block: bb } => {
                let bb = *bb;
                if let Some(block) = side.as_deref_mut() {
                    self.add_labels(bb, block, switch_ctx);
                }

                let stmts = function
                    .block(bb)
                    .map(|b| b.statements.clone())
                    .unwrap_or_default();
                let mut result: Option<CExpr> = None;

                for stmt_id in stmts {
                    let mut expression = None;

                    if let StatementKind::Jump {
                        condition,
                        then_target,
                        else_target,
                    } = &function.stmt(stmt_id).kind
                    {
                        let cond = condition.ok_or(Error::MalformedRegion(
                            node,
                            "condition node ends in an unconditional jump",
                        ))?;
                        let jump_then = then_target.basic_block;
                        let jump_else = else_target.as_ref().and_then(|t| t.basic_block);

                        let straight =
                            jump_then == Some(then_bb) && jump_else == Some(else_bb);
                        let inverted =
                            jump_then == Some(else_bb) && jump_else == Some(then_bb);
                        if !straight && !inverted {
                            return Err(Error::InconsistentCondition(node));
                        }

                        let mut e = self.make_expression(cond)?;
                        if inverted {
                            e = CExpr::unary(CUnaryOp::LogicalNot, e);
                        }
                        expression = Some(e);
                    } else if let Some(lowered) = self.make_statement(stmt_id, None, None, None)? {
                        match side.as_deref_mut() {
                            Some(block) => block.push(lowered),
                            None => {
                                if let CStmtKind::Expression(e) = lowered.kind {
                                    expression = Some(e);
                                }
                            }
                        }
                    }

                    if let Some(e) = expression {
                        result = Some(match result {
                            None => e,
                            Some(acc) => CExpr::binary(CBinaryOp::Comma, acc, e),
                        });
                    }
                }

                result.ok_or(Error::EmptyCondition(node))
            }
            NodeKind::Region {
                kind: RegionKind::CompoundCondition,
                children,
                ..
            } if children.len() == 2 => {
                let children = children.clone();

                // Whether the region is a disjunction or a conjunction
                // shows in where the *left* operand's final jump goes:
                //
                //   if (a || b):  a -> then | b,   b -> then | else
                //   if (a && b):  a -> b | else,   b -> then | else
                //
                // so we find the rightmost basic leaf of the left child
                // and look at its terminator.
                let mut n = children[0];
                let leaf_bb = loop {
                    match &regions.node(n).kind {
                        NodeKind::Basic { block } => break *block,
                        NodeKind::Region {
                            kind: RegionKind::CompoundCondition,
                            children: inner,
                            ..
                        } if inner.len() == 2 => n = inner[1],
                        NodeKind::Region { .. } => {
                            return Err(Error::MalformedRegion(
                                node,
                                "compound condition child is not a condition",
                            ))
                        }
                    }
                };
                let jump = function
                    .jump_of(leaf_bb)
                    .ok_or(Error::MalformedRegion(node, "condition leaf has no jump"))?;
                let Some((_, then_target, else_target)) = function.stmt(jump).as_jump() else {
                    return Err(Error::BrokenInvariant("jump_of returned a non-jump"));
                };
                let jump_then = then_target.basic_block;
                let jump_else = else_target.as_ref().and_then(|t| t.basic_block);

                let right_entry = regions
                    .entry_basic_block(children[1])
                    .ok_or(Error::MalformedRegion(node, "right condition has no entry block"))?;

                if jump_then == Some(then_bb) || jump_else == Some(then_bb) {
                    let left =
                        self.make_condition(children[0], side, then_bb, right_entry, switch_ctx)?;
                    let right =
                        self.make_condition(children[1], None, then_bb, else_bb, switch_ctx)?;
                    Ok(CExpr::binary(CBinaryOp::LogicalOr, left, right))
                } else if jump_then == Some(else_bb) || jump_else == Some(else_bb) {
                    let left =
                        self.make_condition(children[0], side, right_entry, else_bb, switch_ctx)?;
                    let right =
                        self.make_condition(children[1], None, then_bb, else_bb, switch_ctx)?;
                    Ok(CExpr::binary(CBinaryOp::LogicalAnd, left, right))
                } else {
                    Err(Error::InconsistentCondition(node))
                }
            }
            NodeKind::Region { .. } => {
                Err(Error::MalformedRegion(node, "node is not a condition"))
            }
        }
    }

    // ---- statement lowering ---------------------------------------------

    fn make_statement(
        &mut self,
        stmt: StmtId,
        next: Option<BasicBlockId>,
        brk: Option<BasicBlockId>,
        cont: Option<BasicBlockId>,
    ) -> Result<Option<CStmt>> {
        let mut result = self.do_make_statement(stmt, next, brk, cont)?;
        if let Some(s) = &mut result {
            s.attach_origin(stmt);
        }
        Ok(result)
    }

    fn do_make_statement(
        &mut self,
        id: StmtId,
        next: Option<BasicBlockId>,
        brk: Option<BasicBlockId>,
        cont: Option<BasicBlockId>,
    ) -> Result<Option<CStmt>> {
        let function = self.ctx.function;
        match &function.stmt(id).kind {
            StatementKind::InlineAssembly => {
                let text = function
                    .stmt(id)
                    .insn
                    .map(|insn| function.insn(insn).text.clone())
                    .unwrap_or_default();
                Ok(Some(CStmt::new(CStmtKind::InlineAsm(text))))
            }
            StatementKind::Assignment { left, right } => {
                let (left, right) = (*left, *right);
                if !self.ctx.liveness.is_live(left) {
                    return Ok(None);
                }
                if let Some(var) = self.ctx.variables.var_of(left) {
                    if self.oracle.is_intermediate(var) {
                        return Ok(None);
                    }
                }
                let left_expr = self.make_expression(left)?;
                let right_expr = self.make_expression(right)?;
                let ty = Self::make_type(&self.type_of(left));
                Ok(Some(CStmt::expression(CExpr::binary(
                    CBinaryOp::Assign,
                    left_expr,
                    CExpr::cast(ty, right_expr),
                ))))
            }
            StatementKind::Jump {
                condition,
                then_target,
                else_target,
            } => {
                let condition = *condition;
                let then_target = then_target.clone();
                let else_target = else_target.clone();

                if let Some(cond) = condition {
                    let mut then_jump = self.make_jump_target(&then_target, next, brk, cont)?;
                    let mut else_jump = match &else_target {
                        Some(target) => self.make_jump_target(target, next, brk, cont)?,
                        None => None,
                    };
                    let mut cond_expr = self.make_expression(cond)?;

                    if then_jump.is_none() {
                        if else_jump.is_none() {
                            return Ok(None);
                        }
                        std::mem::swap(&mut then_jump, &mut else_jump);
                        cond_expr = CExpr::unary(CUnaryOp::LogicalNot, cond_expr);
                    }
                    let then_stmt = Box::new(
                        then_jump.ok_or(Error::BrokenInvariant("conditional jump lost both arms"))?,
                    );
                    Ok(Some(CStmt::new(CStmtKind::If {
                        condition: cond_expr,
                        then_stmt,
                        else_stmt: else_jump.map(Box::new),
                    })))
                } else {
                    self.make_jump_target(&then_target, next, brk, cont)
                }
            }
            StatementKind::Call { target } => self.make_call(id, *target),
            StatementKind::Return => {
                if self.signature.return_value.is_some() {
                    if let Some(hook) = self.ctx.hooks.return_hook(id) {
                        let term = hook.return_value_term;
                        let expr = self.make_expression(term)?;
                        return Ok(Some(CStmt::new(CStmtKind::Return(Some(expr)))));
                    }
                }
                Ok(Some(CStmt::new(CStmtKind::Return(None))))
            }
            StatementKind::Touch { .. }
            | StatementKind::Callback
            | StatementKind::Comment(_)
            | StatementKind::Kill { .. } => Ok(None),
        }
    }

    fn make_call(&mut self, id: StmtId, target: TermId) -> Result<Option<CStmt>> {
        let signatures = self.ctx.signatures;
        let hooks = self.ctx.hooks;

        // A concrete callee address with a known signature renders as the
        // callee's identifier; anything else falls back to the lowered
        // target expression.
        let mut target_expr = None;
        if let Some(value) = self.ctx.dataflow.value(target) {
            if value.abstract_value().is_concrete() {
                let address = value.abstract_value().as_concrete().value();
                if let Some(callee) = signatures.of_address(address) {
                    let mut e = CExpr::new(CExprKind::FunctionRef(callee.name.clone()));
                    e.term = Some(target);
                    target_expr = Some(e);
                }
            }
        }
        let target_expr = match target_expr {
            Some(e) => e,
            None => self.make_expression(target)?,
        };

        if let Some(call_signature) = signatures.of_call(id) {
            if let Some(hook) = hooks.call_hook(id) {
                let mut arguments = Vec::new();
                for index in 0..call_signature.arguments.len() {
                    let term = *hook
                        .argument_terms
                        .get(index)
                        .ok_or(Error::MissingArgumentTerm(index))?;
                    arguments.push(self.make_expression(term)?);
                }
                let call_expr = CExpr::call(target_expr, arguments);

                if call_signature.return_value.is_some() {
                    let return_term = hook
                        .return_value_term
                        .ok_or(Error::BrokenInvariant("call hook lacks a return-value term"))?;
                    let return_type = Self::make_type(&self.type_of(return_term));
                    let lhs = self.make_expression(return_term)?;
                    return Ok(Some(CStmt::expression(CExpr::binary(
                        CBinaryOp::Assign,
                        lhs,
                        CExpr::cast(return_type, call_expr),
                    ))));
                }
                return Ok(Some(CStmt::expression(call_expr)));
            }
        }

        Ok(Some(CStmt::expression(CExpr::call(target_expr, Vec::new()))))
    }

    // ---- jump lowering --------------------------------------------------

    fn make_jump_target(
        &mut self,
        target: &JumpTarget,
        next: Option<BasicBlockId>,
        brk: Option<BasicBlockId>,
        cont: Option<BasicBlockId>,
    ) -> Result<Option<CStmt>> {
        if let Some(bb) = target.basic_block {
            Ok(self.make_jump_to_block(bb, next, brk, cont))
        } else if let Some(address) = target.address {
            Ok(Some(CStmt::new(CStmtKind::Goto(
                self.make_expression(address)?,
            ))))
        } else {
            Ok(Some(CStmt::new(CStmtKind::Goto(CExpr::string("???")))))
        }
    }

    fn make_jump_to_block(
        &mut self,
        target: BasicBlockId,
        next: Option<BasicBlockId>,
        brk: Option<BasicBlockId>,
        cont: Option<BasicBlockId>,
    ) -> Option<CStmt> {
        if Some(target) == next {
            None
        } else if Some(target) == brk {
            Some(CStmt::new(CStmtKind::Break))
        } else if Some(target) == cont {
            Some(CStmt::new(CStmtKind::Continue))
        } else {
            let label = self.label_for(target);
            self.definition.labels[label.0 as usize].referenced = true;
            Some(CStmt::new(CStmtKind::Goto(CExpr::new(CExprKind::LabelRef(
                label,
            )))))
        }
    }

    // ---- expression lowering --------------------------------------------

    fn make_expression(&mut self, term: TermId) -> Result<CExpr> {
        let mut expr = self.do_make_expression(term)?;
        expr.attach_term(term);
        Ok(expr)
    }

    fn do_make_expression(&mut self, term: TermId) -> Result<CExpr> {
        let function = self.ctx.function;

        if self.options.prefer_constants && function.term(term).is_read() {
            if let Some(value) = self.ctx.dataflow.value(term) {
                let abstract_value = *value.abstract_value();
                if abstract_value.is_concrete() {
                    return self.make_constant(term, abstract_value.as_concrete());
                }
            }
        }

        if let Some(var) = self.ctx.variables.var_of(term) {
            if self.oracle.is_intermediate(var) {
                let definition = self.oracle.single_definition(var).ok_or(
                    Error::BrokenInvariant("intermediate variable without a single definition"),
                )?;
                let source = function
                    .source_of(definition)
                    .ok_or(Error::BrokenInvariant("intermediate definition without a source"))?;
                return self.make_expression(source);
            }
            return self.variable_access(term);
        }

        match function.term(term).kind.clone() {
            TermKind::IntConst(value) => self.make_constant(term, value),
            TermKind::Intrinsic => Ok(CExpr::call(CExpr::string("intrinsic"), Vec::new())),
            TermKind::MemoryLocationAccess(_) => Err(Error::UnassignedMemoryAccess(term)),
            TermKind::Dereference { address } => {
                if self.ctx.dataflow.memory_location(term).is_some() {
                    // A dereference with a resolved location must have been
                    // folded into a variable upstream.
                    return Err(Error::MissingVariable(term));
                }
                let ty = self.type_of(term);
                let address_ty = self.type_of(address);
                let inner = self.make_expression(address)?;
                Ok(CExpr::unary(
                    CUnaryOp::Dereference,
                    CExpr::cast(
                        CType::pointer(address_ty.size, Self::make_type(&ty)),
                        inner,
                    ),
                ))
            }
            TermKind::UnaryOp { op, operand } => self.make_unary(term, op, operand),
            TermKind::BinaryOp { op, left, right } => self.make_binary(op, left, right),
            TermKind::Choice { preferred, default } => {
                if !self.ctx.dataflow.definitions(preferred).is_empty() {
                    self.make_expression(preferred)
                } else {
                    self.make_expression(default)
                }
            }
        }
    }

    fn make_unary(&mut self, term: TermId, op: UnaryOpKind, operand: TermId) -> Result<CExpr> {
        let function = self.ctx.function;
        let e = self.make_expression(operand)?;
        let expr = match op {
            UnaryOpKind::Not => {
                let ty = self.type_of(operand);
                CExpr::unary(
                    CUnaryOp::BitwiseNot,
                    CExpr::cast(CType::int(ty.size, ty.unsigned), e),
                )
            }
            UnaryOpKind::Negation => {
                let ty = self.type_of(operand);
                CExpr::unary(
                    CUnaryOp::Negation,
                    CExpr::cast(CType::int(ty.size, ty.unsigned), e),
                )
            }
            UnaryOpKind::SignExtend => {
                // Inner cast reinterprets as signed so the widening
                // replicates the sign bit; the outer cast fixes the final
                // width.
                let new_size = function.term(term).size;
                let old_size = function.term(operand).size;
                CExpr::cast(
                    CType::int(new_size, true),
                    CExpr::cast(CType::int(old_size, false), e),
                )
            }
            UnaryOpKind::ZeroExtend => {
                let new_size = function.term(term).size;
                let old_size = function.term(operand).size;
                CExpr::cast(
                    CType::int(new_size, true),
                    CExpr::cast(CType::int(old_size, true), e),
                )
            }
            UnaryOpKind::Truncate => CExpr::cast(Self::make_type(&self.type_of(term)), e),
        };
        Ok(expr)
    }

    fn make_binary(
        &mut self,
        op: recast_ir::BinaryOpKind,
        left: TermId,
        right: TermId,
    ) -> Result<CExpr> {
        use recast_ir::BinaryOpKind as Ir;

        let left_ty = self.type_of(left);
        let right_ty = self.type_of(right);
        let left_expr = self.make_expression(left)?;
        let right_expr = self.make_expression(right)?;

        let cast = |e: CExpr, size: u16, unsigned: bool| CExpr::cast(CType::int(size, unsigned), e);
        let (lts, rts) = (left_ty.size, right_ty.size);
        let (ltu, rtu) = (left_ty.unsigned, right_ty.unsigned);

        let expr = match op {
            Ir::And => CExpr::binary(
                CBinaryOp::BitAnd,
                cast(left_expr, lts, ltu),
                cast(right_expr, rts, rtu),
            ),
            Ir::Or => CExpr::binary(
                CBinaryOp::BitOr,
                cast(left_expr, lts, ltu),
                cast(right_expr, rts, rtu),
            ),
            Ir::Xor => CExpr::binary(
                CBinaryOp::BitXor,
                cast(left_expr, lts, ltu),
                cast(right_expr, rts, rtu),
            ),
            Ir::Shl => CExpr::binary(
                CBinaryOp::Shl,
                cast(left_expr, lts, ltu),
                cast(right_expr, rts, rtu),
            ),
            // A logical shift reads its left operand as unsigned, an
            // arithmetic shift as signed; C has only one `>>`.
            Ir::Shr => CExpr::binary(
                CBinaryOp::Shr,
                cast(left_expr, lts, true),
                cast(right_expr, rts, rtu),
            ),
            Ir::Sar => CExpr::binary(
                CBinaryOp::Shr,
                cast(left_expr, lts, false),
                cast(right_expr, rts, rtu),
            ),
            Ir::Add => CExpr::binary(
                CBinaryOp::Add,
                cast(left_expr, lts, ltu),
                cast(right_expr, rts, rtu),
            ),
            Ir::Sub => CExpr::binary(
                CBinaryOp::Sub,
                cast(left_expr, lts, ltu),
                cast(right_expr, rts, rtu),
            ),
            Ir::Mul => CExpr::binary(
                CBinaryOp::Mul,
                cast(left_expr, lts, ltu),
                cast(right_expr, rts, rtu),
            ),
            Ir::SignedDiv => CExpr::binary(
                CBinaryOp::Div,
                cast(left_expr, lts, false),
                cast(right_expr, rts, false),
            ),
            Ir::SignedRem => CExpr::binary(
                CBinaryOp::Rem,
                cast(left_expr, lts, false),
                cast(right_expr, rts, false),
            ),
            Ir::UnsignedDiv => CExpr::binary(
                CBinaryOp::Div,
                cast(left_expr, lts, true),
                cast(right_expr, rts, true),
            ),
            Ir::UnsignedRem => CExpr::binary(
                CBinaryOp::Rem,
                cast(left_expr, lts, true),
                cast(right_expr, rts, true),
            ),
            Ir::Equal => CExpr::binary(CBinaryOp::Eq, left_expr, right_expr),
            Ir::SignedLess => CExpr::binary(
                CBinaryOp::Lt,
                cast(left_expr, lts, false),
                cast(right_expr, rts, false),
            ),
            Ir::SignedLessOrEqual => CExpr::binary(
                CBinaryOp::Leq,
                cast(left_expr, lts, false),
                cast(right_expr, rts, false),
            ),
            Ir::UnsignedLess => CExpr::binary(
                CBinaryOp::Lt,
                cast(left_expr, lts, true),
                cast(right_expr, rts, true),
            ),
            Ir::UnsignedLessOrEqual => CExpr::binary(
                CBinaryOp::Leq,
                cast(left_expr, lts, true),
                cast(right_expr, rts, true),
            ),
        };
        Ok(expr)
    }

    fn make_constant(&mut self, term: TermId, value: SizedValue) -> Result<CExpr> {
        let ty = self.type_of(term);

        if self.options.prefer_cstrings {
            if let (Some(image), Some(pointee)) = (self.ctx.image, ty.pointee()) {
                if u64::from(pointee.size) == CHAR_BIT {
                    if let Some(section) = image.section_containing(value.value()) {
                        if section.allocated {
                            if let Some(s) = section.read_asciiz(value.value(), 1024) {
                                if s.is_ascii() {
                                    return Ok(CExpr::string(s));
                                }
                            }
                        }
                    }
                }
            }
        }

        if self.options.prefer_globals {
            if let Some(pointee) = ty.pointee() {
                if pointee.size > 0 {
                    let location = MemoryLocation::new(
                        MemoryDomain::Memory,
                        value.value() * CHAR_BIT,
                        u64::from(pointee.size),
                    );
                    let pointee_ty = Self::make_type(pointee);
                    let name = self.globals.declare(location, pointee_ty);
                    return Ok(CExpr::unary(
                        CUnaryOp::Reference,
                        CExpr::identifier(VarRef::Global(name)),
                    ));
                }
            }
        }

        Ok(CExpr::cast(
            Self::make_type(&ty),
            CExpr::int_literal(value.value(), CType::int(ty.size, ty.unsigned)),
        ))
    }

    // ---- variable access & declarations ---------------------------------

    /// Renders a term's access to its variable: the bare identifier when
    /// the term covers the variable's whole storage, pointer arithmetic
    /// into the variable otherwise.
    ///
    /// Sub-byte misalignment between the two locations is not handled;
    /// upstream passes must not produce it.
    fn variable_access(&mut self, term: TermId) -> Result<CExpr> {
        let location = *self
            .ctx
            .dataflow
            .memory_location(term)
            .ok_or(Error::MissingMemoryLocation(term))?;
        let var = self
            .ctx
            .variables
            .var_of(term)
            .ok_or(Error::MissingVariable(term))?;

        let decl = self.variable_declaration(var)?;
        let identifier = CExpr::identifier(decl);
        let var_location = self.ctx.variables.var(var).memory_location;

        if location == var_location {
            return Ok(identifier);
        }

        let uintptr = CType::int(self.ctx.target.pointer_size, true);
        let var_address = CExpr::cast(
            uintptr.clone(),
            CExpr::unary(CUnaryOp::Reference, identifier),
        );
        let term_address = if location.addr == var_location.addr {
            var_address
        } else {
            CExpr::binary(
                CBinaryOp::Add,
                var_address,
                CExpr::int_literal((location.addr - var_location.addr) / CHAR_BIT, uintptr),
            )
        };

        Ok(CExpr::unary(
            CUnaryOp::Dereference,
            CExpr::cast(
                CType::pointer(
                    self.ctx.target.pointer_size,
                    Self::make_type(&self.type_of(term)),
                ),
                term_address,
            ),
        ))
    }

    /// The declaration backing a variable, created on first touch. Locals
    /// are numbered densely in creation order; globals live in the shared
    /// scope.
    fn variable_declaration(&mut self, var: VariableId) -> Result<VarRef> {
        let variable = self.ctx.variables.var(var);
        if variable.is_global {
            let ty = CType::int(variable.memory_location.size as u16, true);
            let name = self.globals.declare(variable.memory_location, ty);
            return Ok(VarRef::Global(name));
        }

        if let Some(decl) = self.var_decls.get(&var) {
            return Ok(decl.clone());
        }

        let mut name = String::from("v");
        if self.options.register_variable_names {
            if let Some(registers) = self.ctx.registers {
                if let Some(register) = registers.covering(&variable.memory_location) {
                    name = register.name.to_lowercase();
                    if name.is_empty() || name.ends_with(|c: char| c.is_ascii_digit()) {
                        name.push('_');
                    }
                }
            }
        }
        let index = self.definition.locals.len();
        name.push_str(&index.to_string());

        self.definition.locals.push(LocalDeclaration {
            name,
            ty: CType::int(variable.memory_location.size as u16, true),
        });
        let decl = VarRef::Local(LocalId(index as u32));
        self.var_decls.insert(var, decl.clone());
        Ok(decl)
    }

    // ---- types ----------------------------------------------------------

    fn type_of(&self, term: TermId) -> IrType {
        self.ctx
            .types
            .get(term)
            .cloned()
            .unwrap_or_else(|| IrType::int(self.ctx.function.term(term).size, true))
    }

    fn make_type(ty: &IrType) -> CType {
        match ty.pointee() {
            Some(pointee) => CType::pointer(ty.size, Self::make_type(pointee)),
            None => CType::int(ty.size, ty.unsigned),
        }
    }
}
