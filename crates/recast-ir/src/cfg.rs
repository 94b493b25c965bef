//! Control-flow graph and dominator tree.

use indexmap::IndexMap;

use crate::cancel::CancellationToken;
use crate::error::Error;
use crate::function::{BasicBlockId, Function};
use crate::statement::StatementKind;

/// A control flow graph derived from a function's jump terminators.
///
/// Edges follow resolved jump targets: the then/else blocks of a jump, and
/// the entries of a jump table (resolved to blocks by their load address).
/// Unresolved targets contribute no edges.
#[derive(Debug)]
pub struct Cfg {
    /// Entry block ID.
    pub entry: BasicBlockId,
    successors: IndexMap<BasicBlockId, Vec<BasicBlockId>>,
    predecessors: IndexMap<BasicBlockId, Vec<BasicBlockId>>,
}

impl Cfg {
    /// Builds the CFG of a function.
    pub fn new(function: &Function) -> Self {
        let mut successors: IndexMap<BasicBlockId, Vec<BasicBlockId>> = IndexMap::new();
        let mut predecessors: IndexMap<BasicBlockId, Vec<BasicBlockId>> = IndexMap::new();

        for block in function.blocks() {
            successors.entry(block.id).or_default();
            predecessors.entry(block.id).or_default();
        }

        for block in function.blocks() {
            let Some(jump) = function.jump_of(block.id) else {
                continue;
            };
            let StatementKind::Jump {
                then_target,
                else_target,
                ..
            } = &function.stmt(jump).kind
            else {
                continue;
            };

            let mut targets = Vec::new();
            if let Some(bb) = then_target.basic_block {
                targets.push(bb);
            }
            if let Some(table) = &then_target.table {
                for entry in table {
                    if let Some(bb) = function.block_at_address(entry.address) {
                        targets.push(bb);
                    }
                }
            }
            if let Some(else_target) = else_target {
                if let Some(bb) = else_target.basic_block {
                    targets.push(bb);
                }
            }

            for to in targets {
                successors.entry(block.id).or_default().push(to);
                predecessors.entry(to).or_default().push(block.id);
            }
        }

        Self {
            entry: function.entry,
            successors,
            predecessors,
        }
    }

    /// Returns the successors of a block.
    pub fn successors(&self, id: BasicBlockId) -> &[BasicBlockId] {
        self.successors.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Returns the predecessors of a block.
    pub fn predecessors(&self, id: BasicBlockId) -> &[BasicBlockId] {
        self.predecessors
            .get(&id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Returns blocks in reverse post-order.
    pub fn reverse_post_order(&self) -> Vec<BasicBlockId> {
        let mut visited = std::collections::HashSet::new();
        let mut post_order = Vec::new();

        fn dfs(
            cfg: &Cfg,
            block: BasicBlockId,
            visited: &mut std::collections::HashSet<BasicBlockId>,
            post_order: &mut Vec<BasicBlockId>,
        ) {
            if !visited.insert(block) {
                return;
            }
            for &succ in cfg.successors(block) {
                dfs(cfg, succ, visited, post_order);
            }
            post_order.push(block);
        }

        dfs(self, self.entry, &mut visited, &mut post_order);

        for &id in self.successors.keys() {
            if !visited.contains(&id) {
                dfs(self, id, &mut visited, &mut post_order);
            }
        }

        post_order.reverse();
        post_order
    }
}

/// Dominator tree for a CFG.
///
/// Block A dominates block B if every path from entry to B must go through A.
#[derive(Debug)]
pub struct DominatorTree {
    /// Immediate dominator for each block.
    idom: IndexMap<BasicBlockId, BasicBlockId>,
}

impl DominatorTree {
    /// Computes the dominator tree with the iterative RPO algorithm.
    ///
    /// This is the one place in the workspace that polls the cancellation
    /// token; the fix point can take many rounds on pathological graphs.
    pub fn compute(cfg: &Cfg, token: &CancellationToken) -> Result<Self, Error> {
        let mut idom: IndexMap<BasicBlockId, BasicBlockId> = IndexMap::new();

        idom.insert(cfg.entry, cfg.entry);

        let rpo = cfg.reverse_post_order();
        let mut changed = true;

        while changed {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
            changed = false;

            for &block in &rpo {
                if block == cfg.entry {
                    continue;
                }

                let preds = cfg.predecessors(block);
                if preds.is_empty() {
                    continue;
                }

                let mut new_idom = None;
                for &pred in preds {
                    if idom.contains_key(&pred) {
                        new_idom = Some(pred);
                        break;
                    }
                }

                let Some(mut new_idom) = new_idom else {
                    continue;
                };

                for &pred in preds {
                    if pred == new_idom || !idom.contains_key(&pred) {
                        continue;
                    }
                    new_idom = Self::intersect(&idom, &rpo, pred, new_idom);
                }

                if idom.get(&block) != Some(&new_idom) {
                    idom.insert(block, new_idom);
                    changed = true;
                }
            }
        }

        Ok(Self { idom })
    }

    fn intersect(
        idom: &IndexMap<BasicBlockId, BasicBlockId>,
        rpo: &[BasicBlockId],
        a: BasicBlockId,
        b: BasicBlockId,
    ) -> BasicBlockId {
        let pos = |id: BasicBlockId| rpo.iter().position(|&x| x == id).unwrap_or(usize::MAX);

        let mut finger_a = a;
        let mut finger_b = b;

        while finger_a != finger_b {
            while pos(finger_a) > pos(finger_b) {
                finger_a = idom[&finger_a];
            }
            while pos(finger_b) > pos(finger_a) {
                finger_b = idom[&finger_b];
            }
        }

        finger_a
    }

    /// Returns the immediate dominator of a block.
    pub fn idom(&self, id: BasicBlockId) -> Option<BasicBlockId> {
        self.idom.get(&id).copied()
    }

    /// Returns true if `a` dominates `b` (reflexively).
    pub fn dominates(&self, a: BasicBlockId, b: BasicBlockId) -> bool {
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.idom.get(&current) {
                Some(&parent) if parent != current => current = parent,
                _ => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::JumpTarget;

    fn diamond() -> Function {
        // bb0 -> bb1, bb2; bb1 -> bb3; bb2 -> bb3
        let mut f = Function::new("diamond", BasicBlockId::new(0));
        for i in 0..4 {
            f.add_block(BasicBlockId::new(i), Some(0x1000 + i as u64 * 4));
        }
        let cond = f.int_const(1, 1);
        f.push_stmt(
            BasicBlockId::new(0),
            StatementKind::Jump {
                condition: Some(cond),
                then_target: JumpTarget::block(BasicBlockId::new(1)),
                else_target: Some(JumpTarget::block(BasicBlockId::new(2))),
            },
            None,
        );
        for i in 1..3 {
            f.push_stmt(
                BasicBlockId::new(i),
                StatementKind::Jump {
                    condition: None,
                    then_target: JumpTarget::block(BasicBlockId::new(3)),
                    else_target: None,
                },
                None,
            );
        }
        f.push_stmt(BasicBlockId::new(3), StatementKind::Return, None);
        f
    }

    #[test]
    fn test_cfg_edges() {
        let f = diamond();
        let cfg = Cfg::new(&f);
        assert_eq!(
            cfg.successors(BasicBlockId::new(0)),
            &[BasicBlockId::new(1), BasicBlockId::new(2)]
        );
        assert_eq!(
            cfg.predecessors(BasicBlockId::new(3)),
            &[BasicBlockId::new(1), BasicBlockId::new(2)]
        );
    }

    #[test]
    fn test_dominators_diamond() {
        let f = diamond();
        let cfg = Cfg::new(&f);
        let dom = DominatorTree::compute(&cfg, &CancellationToken::new()).unwrap();

        assert!(dom.dominates(BasicBlockId::new(0), BasicBlockId::new(3)));
        assert!(!dom.dominates(BasicBlockId::new(1), BasicBlockId::new(3)));
        assert!(dom.dominates(BasicBlockId::new(2), BasicBlockId::new(2)));
        assert_eq!(dom.idom(BasicBlockId::new(3)), Some(BasicBlockId::new(0)));
    }

    #[test]
    fn test_dominators_cancelled() {
        let f = diamond();
        let cfg = Cfg::new(&f);
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            DominatorTree::compute(&cfg, &token),
            Err(Error::Cancelled)
        ));
    }
}
