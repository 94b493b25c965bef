//! Property tests for CFG construction and dominator computation.

use proptest::prelude::*;

use recast_ir::{
    BasicBlockId, CancellationToken, Cfg, DominatorTree, Function, JumpTarget, StatementKind,
};

/// Builds a function of `n` blocks where block `i` jumps to the blocks named
/// by `edges[i]` (conditional when there are two, unconditional when one,
/// plain return when none).
fn make_function(n: usize, edges: &[Vec<usize>]) -> Function {
    let mut f = Function::new("prop", BasicBlockId::new(0));
    for i in 0..n {
        f.add_block(BasicBlockId::new(i as u32), Some(0x1000 + i as u64 * 4));
    }
    for (i, succs) in edges.iter().enumerate() {
        let block = BasicBlockId::new(i as u32);
        match succs.as_slice() {
            [] => {
                f.push_stmt(block, StatementKind::Return, None);
            }
            [t] => {
                f.push_stmt(
                    block,
                    StatementKind::Jump {
                        condition: None,
                        then_target: JumpTarget::block(BasicBlockId::new(*t as u32)),
                        else_target: None,
                    },
                    None,
                );
            }
            [t, e, ..] => {
                let cond = f.int_const(1, 1);
                f.push_stmt(
                    block,
                    StatementKind::Jump {
                        condition: Some(cond),
                        then_target: JumpTarget::block(BasicBlockId::new(*t as u32)),
                        else_target: Some(JumpTarget::block(BasicBlockId::new(*e as u32))),
                    },
                    None,
                );
            }
        }
    }
    f
}

fn arb_edges(n: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    prop::collection::vec(prop::collection::vec(0..n, 0..=2), n)
}

fn reachable(cfg: &Cfg) -> Vec<BasicBlockId> {
    let mut seen = std::collections::HashSet::new();
    let mut stack = vec![cfg.entry];
    let mut out = Vec::new();
    while let Some(b) = stack.pop() {
        if !seen.insert(b) {
            continue;
        }
        out.push(b);
        stack.extend(cfg.successors(b).iter().copied());
    }
    out
}

proptest! {
    #[test]
    fn entry_dominates_every_reachable_block(
        (n, edges) in (1usize..12).prop_flat_map(|n| (Just(n), arb_edges(n)))
    ) {
        let f = make_function(n, &edges);
        let cfg = Cfg::new(&f);
        let dom = DominatorTree::compute(&cfg, &CancellationToken::new()).unwrap();

        for block in reachable(&cfg) {
            prop_assert!(dom.dominates(cfg.entry, block));
        }
    }

    #[test]
    fn idom_dominates_its_block(
        (n, edges) in (1usize..12).prop_flat_map(|n| (Just(n), arb_edges(n)))
    ) {
        let f = make_function(n, &edges);
        let cfg = Cfg::new(&f);
        let dom = DominatorTree::compute(&cfg, &CancellationToken::new()).unwrap();

        for block in reachable(&cfg) {
            prop_assert!(dom.dominates(block, block));
            if let Some(idom) = dom.idom(block) {
                prop_assert!(dom.dominates(idom, block));
            }
        }
    }

    #[test]
    fn dominator_computation_is_deterministic(
        (n, edges) in (1usize..10).prop_flat_map(|n| (Just(n), arb_edges(n)))
    ) {
        let f = make_function(n, &edges);
        let cfg = Cfg::new(&f);
        let token = CancellationToken::new();
        let a = DominatorTree::compute(&cfg, &token).unwrap();
        let b = DominatorTree::compute(&cfg, &token).unwrap();

        for block in reachable(&cfg) {
            prop_assert_eq!(a.idom(block), b.idom(block));
        }
    }
}
