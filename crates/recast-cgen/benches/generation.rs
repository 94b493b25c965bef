//! Benchmarks for function-body generation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use recast_cgen::{
    FunctionEmitter, GeneratorContext, GeneratorOptions, GlobalScope, TargetInfo,
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

/// A diamond ladder: `count` conditional diamonds chained in sequence,
/// each with an assignment per arm.
fn create_diamond_ladder(count: usize) -> Inputs {
    let mut function = Function::new("bench", BasicBlockId::new(0));
    let mut dataflow = Dataflow::new();
    let mut liveness = Liveness::new();
    let mut variables = Variables::new();
    let mut regions = RegionTree::new();

    let total_blocks = (count * 4) as u32;
    for i in 0..=total_blocks {
        function.add_block(BasicBlockId::new(i), Some(0x1000 + u64::from(i) * 0x10));
    }

    let mut region_nodes = Vec::new();
    for d in 0..count {
        let base = (d * 4) as u32;
        let head = BasicBlockId::new(base);
        let left = BasicBlockId::new(base + 1);
        let right = BasicBlockId::new(base + 2);
        let join = BasicBlockId::new(base + 3);
        let next_head = BasicBlockId::new(base + 4);

        let cond_loc = MemoryLocation::new(MemoryDomain::Stack, d as u64 * 192, 32);
        let cond_var = variables.add_variable(cond_loc, false);
        let cond = function.mem_access(cond_loc);
        dataflow.set_memory_location(cond, cond_loc);
        variables.attach_term(cond_var, cond, cond_loc);
        function.push_stmt(
            head,
            StatementKind::Jump {
                condition: Some(cond),
                then_target: JumpTarget::block(left),
                else_target: Some(JumpTarget::block(right)),
            },
            None,
        );

        for (arm, value) in [(left, 1u64), (right, 2u64)] {
            let loc = MemoryLocation::new(MemoryDomain::Stack, d as u64 * 192 + 64, 32);
            let var = variables.add_variable(loc, false);
            let w = function.mem_access(loc);
            dataflow.set_memory_location(w, loc);
            variables.attach_term(var, w, loc);
            liveness.mark_live(w);
            let k = function.int_const(value, 32);
            function.push_stmt(arm, StatementKind::Assignment { left: w, right: k }, None);
            function.push_stmt(
                arm,
                StatementKind::Jump {
                    condition: None,
                    then_target: JumpTarget::block(join),
                    else_target: None,
                },
                None,
            );
        }

        function.push_stmt(
            join,
            StatementKind::Jump {
                condition: None,
                then_target: JumpTarget::block(next_head),
                else_target: None,
            },
            None,
        );

        let n_head = regions.add_basic(head);
        let n_left = regions.add_basic(left);
        let n_right = regions.add_basic(right);
        let ifelse = regions.add_region(RegionKind::IfThenElse, vec![n_head, n_left, n_right], n_head);
        let n_join = regions.add_basic(join);
        region_nodes.push(ifelse);
        region_nodes.push(n_join);
    }
    function.push_stmt(BasicBlockId::new(total_blocks), StatementKind::Return, None);
    region_nodes.push(regions.add_basic(BasicBlockId::new(total_blocks)));

    let entry = region_nodes[0];
    let root = regions.add_region(RegionKind::Block, region_nodes, entry);
    regions.set_root(root);

    let mut signatures = Signatures::new();
    let sig = signatures.add(Signature::new("bench"));
    signatures.bind_function("bench", sig);

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

fn bench_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    for size in [8, 64, 256] {
        let inputs = create_diamond_ladder(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &inputs, |b, inputs| {
            b.iter(|| {
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
                let def = FunctionEmitter::new(
                    ctx,
                    GeneratorOptions::default(),
                    &mut globals,
                    &CancellationToken::new(),
                )
                .and_then(|e| e.emit())
                .expect("generation failed");
                black_box(def)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_generation);
criterion_main!(benches);
