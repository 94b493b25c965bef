//! The structured control-flow tree.
//!
//! Structural analysis decomposes a function's CFG into nested regions:
//! sequences, if/else shapes, loops, and table-based switches. This module
//! holds the resulting tree in the form the code generator consumes; the
//! analysis that builds it lives upstream.

use crate::function::BasicBlockId;
use crate::term::TermId;

/// Unique identifier for a node of the region tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

/// The kind of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegionKind {
    /// No recognized shape; children are emitted in DFS preorder.
    Unknown,
    /// A straight-line sequence.
    Block,
    /// Two condition sub-nodes forming `&&` or `||`.
    CompoundCondition,
    /// `if (c) { ... }`.
    IfThen,
    /// `if (c) { ... } else { ... }`.
    IfThenElse,
    /// An infinite loop.
    Loop,
    /// A loop with the condition at the head.
    While,
    /// A loop with the condition at the tail.
    DoWhile,
    /// A jump-table switch.
    Switch,
}

/// The pieces of a switch region beyond its child list.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwitchData {
    /// The node doing the bounds check, if the compiler emitted one.
    pub bounds_check_node: Option<NodeId>,
    /// The node whose terminator jumps through the table.
    pub switch_node: NodeId,
    /// The dispatch value.
    pub switch_term: TermId,
    /// Number of jump-table entries actually used by the switch.
    pub table_size: usize,
    /// The default target, if any.
    pub default_block: Option<BasicBlockId>,
}

/// The kind of a node: a leaf basic block or a region with children.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    /// A leaf wrapping one basic block.
    Basic { block: BasicBlockId },
    /// A region over child nodes.
    Region {
        kind: RegionKind,
        /// Children in the order the structurer discovered them.
        children: Vec<NodeId>,
        /// The entry node of the region.
        entry: NodeId,
        /// The basic block control reaches when the region exits, if known.
        exit: Option<BasicBlockId>,
        /// For do-while regions, the node holding the loop condition.
        loop_condition: Option<NodeId>,
        /// For switch regions, the switch-specific pieces.
        switch: Option<Box<SwitchData>>,
    },
}

/// A node of the region tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    /// What the node is.
    pub kind: NodeKind,
    /// Region-local successor edges, used for DFS preorder.
    pub successors: Vec<NodeId>,
}

/// The structured control-flow tree of one function.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionTree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl RegionTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a leaf node for a basic block.
    pub fn add_basic(&mut self, block: BasicBlockId) -> NodeId {
        self.push(Node {
            kind: NodeKind::Basic { block },
            successors: Vec::new(),
        })
    }

    /// Adds a region node. The entry must be one of the children.
    pub fn add_region(&mut self, kind: RegionKind, children: Vec<NodeId>, entry: NodeId) -> NodeId {
        self.push(Node {
            kind: NodeKind::Region {
                kind,
                children,
                entry,
                exit: None,
                loop_condition: None,
                switch: None,
            },
            successors: Vec::new(),
        })
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Sets the exit basic block of a region.
    pub fn set_exit(&mut self, id: NodeId, bb: BasicBlockId) {
        if let NodeKind::Region { exit, .. } = &mut self.nodes[id.0 as usize].kind {
            *exit = Some(bb);
        }
    }

    /// Sets the loop-condition node of a do-while region.
    pub fn set_loop_condition(&mut self, id: NodeId, node: NodeId) {
        if let NodeKind::Region { loop_condition, .. } = &mut self.nodes[id.0 as usize].kind {
            *loop_condition = Some(node);
        }
    }

    /// Attaches switch data to a switch region.
    pub fn set_switch(&mut self, id: NodeId, data: SwitchData) {
        if let NodeKind::Region { switch, .. } = &mut self.nodes[id.0 as usize].kind {
            *switch = Some(Box::new(data));
        }
    }

    /// Adds a region-local edge between sibling nodes.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        self.nodes[from.0 as usize].successors.push(to);
    }

    /// Declares the root node.
    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// The root node. Panics when the tree is empty.
    pub fn root(&self) -> NodeId {
        self.root.expect("region tree has no root")
    }

    /// Returns a node by id.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    /// The basic block control enters through when entering a node.
    pub fn entry_basic_block(&self, id: NodeId) -> Option<BasicBlockId> {
        let mut current = id;
        loop {
            match &self.node(current).kind {
                NodeKind::Basic { block } => return Some(*block),
                NodeKind::Region { entry, .. } => current = *entry,
            }
        }
    }

    /// The single region-local successor of a node, if it has exactly one.
    pub fn unique_successor(&self, id: NodeId) -> Option<NodeId> {
        match self.node(id).successors.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// DFS preorder of a region's children, following region-local edges
    /// from the entry. Children unreachable over those edges are appended
    /// in child order so no node is lost.
    pub fn dfs_preorder(&self, region: NodeId) -> Vec<NodeId> {
        let NodeKind::Region {
            children, entry, ..
        } = &self.node(region).kind
        else {
            return vec![region];
        };

        let members: std::collections::HashSet<NodeId> = children.iter().copied().collect();
        let mut visited = std::collections::HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![*entry];

        while let Some(node) = stack.pop() {
            if !members.contains(&node) || !visited.insert(node) {
                continue;
            }
            order.push(node);
            for &succ in self.node(node).successors.iter().rev() {
                stack.push(succ);
            }
        }

        for &child in children {
            if visited.insert(child) {
                order.push(child);
            }
        }

        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_basic_block_recurses() {
        let mut rt = RegionTree::new();
        let leaf = rt.add_basic(BasicBlockId::new(7));
        let inner = rt.add_region(RegionKind::Block, vec![leaf], leaf);
        let outer = rt.add_region(RegionKind::Unknown, vec![inner], inner);
        assert_eq!(rt.entry_basic_block(outer), Some(BasicBlockId::new(7)));
    }

    #[test]
    fn test_dfs_preorder_follows_edges() {
        let mut rt = RegionTree::new();
        let a = rt.add_basic(BasicBlockId::new(0));
        let b = rt.add_basic(BasicBlockId::new(1));
        let c = rt.add_basic(BasicBlockId::new(2));
        let d = rt.add_basic(BasicBlockId::new(3));
        // a -> c, a -> b, b -> d; preorder should take a's edges in order.
        rt.add_edge(a, c);
        rt.add_edge(a, b);
        rt.add_edge(b, d);
        let region = rt.add_region(RegionKind::Unknown, vec![a, b, c, d], a);

        assert_eq!(rt.dfs_preorder(region), vec![a, c, b, d]);
    }

    #[test]
    fn test_dfs_preorder_appends_unreachable_children() {
        let mut rt = RegionTree::new();
        let a = rt.add_basic(BasicBlockId::new(0));
        let b = rt.add_basic(BasicBlockId::new(1));
        let region = rt.add_region(RegionKind::Unknown, vec![a, b], a);
        assert_eq!(rt.dfs_preorder(region), vec![a, b]);
    }

    #[test]
    fn test_dfs_preorder_ignores_foreign_edges() {
        let mut rt = RegionTree::new();
        let a = rt.add_basic(BasicBlockId::new(0));
        let outside = rt.add_basic(BasicBlockId::new(9));
        rt.add_edge(a, outside);
        let region = rt.add_region(RegionKind::Unknown, vec![a], a);
        assert_eq!(rt.dfs_preorder(region), vec![a]);
    }
}
