//! Control-flow graphs attached to functions and classes at body phase.

use super::ids::DeclId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CfgNodeKind {
    Enter,
    /// Statement `index` of the owner's body.
    Statement(u32),
    /// A property initializer or initializer block, in class order.
    Member(DeclId),
    Exit,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CfgNode {
    pub kind: CfgNodeKind,
    pub reachable: bool,
}

/// A straight-line control-flow graph.
///
/// Functions get one node per statement, and nodes after a `return` are
/// unreachable. Classes get one node per property initializer or
/// initializer block, in declaration order, which is the order the
/// instance state is initialized in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlFlowGraph {
    pub owner: DeclId,
    pub nodes: Vec<CfgNode>,
    /// Class graphs only: properties definitely initialized at exit, in
    /// initialization order.
    pub initialized: Vec<DeclId>,
    open: bool,
}

impl ControlFlowGraph {
    pub fn new(owner: DeclId) -> Self {
        Self {
            owner,
            nodes: vec![CfgNode {
                kind: CfgNodeKind::Enter,
                reachable: true,
            }],
            initialized: Vec::new(),
            open: true,
        }
    }

    /// Append a node; it is reachable unless flow already left the graph.
    pub fn push(&mut self, kind: CfgNodeKind) {
        self.nodes.push(CfgNode {
            kind,
            reachable: self.open,
        });
    }

    /// Control leaves the graph after the last node (a `return`).
    pub fn jump_to_exit(&mut self) {
        self.open = false;
    }

    /// Seal the graph with its exit node, which stays reachable through the
    /// jump even when the fallthrough is dead.
    pub fn finish(mut self) -> Self {
        self.nodes.push(CfgNode {
            kind: CfgNodeKind::Exit,
            reachable: true,
        });
        self
    }

    /// Statements that can never run.
    pub fn unreachable_statements(&self) -> impl Iterator<Item = u32> + '_ {
        self.nodes.iter().filter_map(|node| match node.kind {
            CfgNodeKind::Statement(index) if !node.reachable => Some(index),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_after_return_are_unreachable() {
        let mut cfg = ControlFlowGraph::new(DeclId::new(0));
        cfg.push(CfgNodeKind::Statement(0));
        cfg.jump_to_exit();
        cfg.push(CfgNodeKind::Statement(1));
        let cfg = cfg.finish();

        assert_eq!(cfg.unreachable_statements().collect::<Vec<_>>(), vec![1]);
        assert_eq!(cfg.nodes.last().map(|n| &n.kind), Some(&CfgNodeKind::Exit));
    }
}
