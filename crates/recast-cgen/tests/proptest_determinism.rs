//! Property tests: generation is deterministic and linear control flow
//! never needs a goto.

use proptest::prelude::*;

use recast_cgen::{
    CStmtKind, FunctionDefinition, FunctionEmitter, GeneratorContext, GeneratorOptions,
    GlobalScope, TargetInfo,
};
use recast_ir::{
    BasicBlockId, CancellationToken, Dataflow, Function, Hooks, JumpTarget, Liveness,
    MemoryDomain, MemoryLocation, RegionKind, RegionTree, Signature, Signatures, StatementKind,
    Types, Variables,
};

struct Inputs {
    function: Function,
    dataflow: Dataflow,
    liveness: Liveness,
    variables: Variables,
    regions: RegionTree,
    types: Types,
    signatures: Signatures,
    hooks: Hooks,
}

/// A straight-line function: `len` blocks, each assigning one constant to
/// its own stack slot and falling through to the next.
fn chain(values: &[u64]) -> Inputs {
    let mut function = Function::new("chain", BasicBlockId::new(0));
    let mut dataflow = Dataflow::new();
    let mut liveness = Liveness::new();
    let mut variables = Variables::new();
    let mut regions = RegionTree::new();

    let len = values.len().max(1) as u32;
    for i in 0..len {
        function.add_block(BasicBlockId::new(i), Some(0x1000 + u64::from(i) * 0x10));
    }

    for (i, &value) in values.iter().enumerate() {
        let bb = BasicBlockId::new(i as u32);
        let loc = MemoryLocation::new(MemoryDomain::Stack, i as u64 * 64, 32);
        let var = variables.add_variable(loc, false);
        let left = function.mem_access(loc);
        dataflow.set_memory_location(left, loc);
        variables.attach_term(var, left, loc);
        liveness.mark_live(left);
        let right = function.int_const(value, 32);
        function.push_stmt(bb, StatementKind::Assignment { left, right }, None);

        if (i as u32) < len - 1 {
            function.push_stmt(
                bb,
                StatementKind::Jump {
                    condition: None,
                    then_target: JumpTarget::block(BasicBlockId::new(i as u32 + 1)),
                    else_target: None,
                },
                None,
            );
        }
    }
    function.push_stmt(BasicBlockId::new(len - 1), StatementKind::Return, None);

    let nodes: Vec<_> = (0..len)
        .map(|i| regions.add_basic(BasicBlockId::new(i)))
        .collect();
    for pair in nodes.windows(2) {
        regions.add_edge(pair[0], pair[1]);
    }
    let root = regions.add_region(RegionKind::Unknown, nodes.clone(), nodes[0]);
    regions.set_root(root);

    let mut signatures = Signatures::new();
    let sig = signatures.add(Signature::new("chain"));
    signatures.bind_function("chain", sig);

    Inputs {
        function,
        dataflow,
        liveness,
        variables,
        regions,
        types: Types::new(),
        signatures,
        hooks: Hooks::new(),
    }
}

fn emit(inputs: &Inputs) -> FunctionDefinition {
    let mut globals = GlobalScope::new();
    let ctx = GeneratorContext {
        function: &inputs.function,
        dataflow: &inputs.dataflow,
        liveness: &inputs.liveness,
        variables: &inputs.variables,
        regions: &inputs.regions,
        types: &inputs.types,
        signatures: &inputs.signatures,
        hooks: &inputs.hooks,
        image: None,
        registers: None,
        target: TargetInfo::default(),
    };
    FunctionEmitter::new(ctx, GeneratorOptions::default(), &mut globals, &CancellationToken::new())
        .and_then(|emitter| emitter.emit())
        .expect("generation failed")
}

fn count_gotos(def: &FunctionDefinition) -> usize {
    fn walk(kind: &CStmtKind, n: &mut usize) {
        match kind {
            CStmtKind::Goto(_) => *n += 1,
            CStmtKind::If {
                then_stmt,
                else_stmt,
                ..
            } => {
                walk(&then_stmt.kind, n);
                if let Some(e) = else_stmt {
                    walk(&e.kind, n);
                }
            }
            CStmtKind::While { body, .. }
            | CStmtKind::DoWhile { body, .. }
            | CStmtKind::Switch { body, .. } => walk(&body.kind, n),
            CStmtKind::Block(block) => {
                for s in &block.statements {
                    walk(&s.kind, n);
                }
            }
            _ => {}
        }
    }
    let mut n = 0;
    for s in &def.body.statements {
        walk(&s.kind, &mut n);
    }
    n
}

proptest! {
    #[test]
    fn generation_is_deterministic(values in prop::collection::vec(any::<u64>(), 1..16)) {
        let inputs = chain(&values);
        let first = emit(&inputs);
        let second = emit(&inputs);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn linear_flow_needs_no_gotos(values in prop::collection::vec(any::<u64>(), 1..16)) {
        let inputs = chain(&values);
        let def = emit(&inputs);
        prop_assert_eq!(count_gotos(&def), 0);
        prop_assert!(def.labels.iter().all(|l| !l.referenced));
    }

    #[test]
    fn locals_are_densely_numbered(values in prop::collection::vec(any::<u64>(), 1..16)) {
        let inputs = chain(&values);
        let def = emit(&inputs);
        for (index, local) in def.locals.iter().enumerate() {
            prop_assert_eq!(local.name.clone(), format!("v{}", index));
        }
    }
}
