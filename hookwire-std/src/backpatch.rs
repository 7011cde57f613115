//! # Backpatcher
//!
//! Branches are emitted before their targets exist in two situations: a
//! failed character test jumps to the next sibling edge, whose operations are
//! emitted only after the current edge's whole subtree, and every failure
//! jumps to the shared epilogue, which is emitted last. Such branches are
//! emitted with [`Label::PENDING`] and queued here as [`PendingJump`]s; after
//! the whole trie is compiled, [`Backpatcher::resolve`] rewrites each one
//! exactly once.

use crate::{
    ops::{Label, Operation},
    trie::{NodeId, Trie},
};
use hookwire_core::CompileError;

/// What a pending branch resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpTarget {
    /// The first operation emitted for a trie node.
    Node(NodeId),
    /// The shared failure epilogue.
    Epilogue,
}

/// A branch waiting for its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingJump {
    /// The branch operation.
    pub op: Label,
    /// Where it must go.
    pub target: JumpTarget,
}

/// Queue of pending branches.
#[derive(Debug, Default)]
pub struct Backpatcher {
    pending: Vec<PendingJump>,
}

impl Backpatcher {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the branch at `op` for resolution to `target`.
    pub fn defer(&mut self, op: Label, target: JumpTarget) {
        self.pending.push(PendingJump { op, target });
    }

    /// Number of queued branches.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// The queued branches in emission order.
    pub fn pending(&self) -> &[PendingJump] {
        &self.pending
    }

    /// Rewrite every queued branch and check that none is left pending.
    ///
    /// Returns the number of branches resolved.
    pub fn resolve(
        self,
        ops: &mut [Operation],
        trie: &Trie,
        epilogue: Label,
    ) -> Result<usize, CompileError> {
        let resolved = self.pending.len();

        for jump in self.pending {
            let dest = match jump.target {
                JumpTarget::Node(node) => {
                    trie.node(node)
                        .first_op()
                        .ok_or(CompileError::UnresolvedJump {
                            op: jump.op.index(),
                            node: node.index(),
                        })?
                }
                JumpTarget::Epilogue => epilogue,
            };

            let slot = ops
                .get_mut(jump.op.index())
                .and_then(Operation::target_mut)
                .ok_or(CompileError::NotABranch(jump.op.index()))?;
            if !slot.is_pending() {
                return Err(CompileError::AlreadyResolved(jump.op.index()));
            }
            *slot = dest;
        }

        if let Some(index) = ops
            .iter()
            .position(|op| op.target().is_some_and(Label::is_pending))
        {
            return Err(CompileError::DanglingBranch(index));
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(resolved, epilogue = %epilogue, "Resolved pending jumps");

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::MethodId;

    fn two_edge_trie() -> (Trie, NodeId, NodeId) {
        let mut trie = Trie::new();
        let a = trie.insert("a", MethodId::new(0)).unwrap();
        let b = trie.insert("b", MethodId::new(1)).unwrap();
        (trie, a, b)
    }

    #[test]
    fn test_resolves_node_and_epilogue_targets() {
        let (mut trie, _a, b) = two_edge_trie();
        let mut ops = vec![
            Operation::BranchIfNotEqual(Label::PENDING),
            Operation::BranchIfGreaterOrEqual(Label::PENDING),
            Operation::LoadInputChar,
            Operation::LoadConst(false),
            Operation::Return,
        ];
        trie.set_first_op(b, Label::new(2));

        let mut patcher = Backpatcher::new();
        patcher.defer(Label::new(0), JumpTarget::Node(b));
        patcher.defer(Label::new(1), JumpTarget::Epilogue);
        assert_eq!(patcher.len(), 2);

        let resolved = patcher.resolve(&mut ops, &trie, Label::new(3)).unwrap();
        assert_eq!(resolved, 2);
        assert_eq!(ops[0].target(), Some(Label::new(2)));
        assert_eq!(ops[1].target(), Some(Label::new(3)));
    }

    #[test]
    fn test_unemitted_node_is_an_error() {
        let (trie, a, _b) = two_edge_trie();
        let mut ops = vec![Operation::BranchIfNotEqual(Label::PENDING)];

        let mut patcher = Backpatcher::new();
        patcher.defer(Label::new(0), JumpTarget::Node(a));
        assert_eq!(
            patcher.resolve(&mut ops, &trie, Label::new(0)),
            Err(CompileError::UnresolvedJump {
                op: 0,
                node: a.index()
            })
        );
    }

    #[test]
    fn test_double_resolution_is_an_error() {
        let (trie, _, _) = two_edge_trie();
        let mut ops = vec![Operation::BranchIfNotEqual(Label::PENDING)];

        let mut patcher = Backpatcher::new();
        patcher.defer(Label::new(0), JumpTarget::Epilogue);
        patcher.defer(Label::new(0), JumpTarget::Epilogue);
        assert_eq!(
            patcher.resolve(&mut ops, &trie, Label::new(0)),
            Err(CompileError::AlreadyResolved(0))
        );
    }

    #[test]
    fn test_non_branch_is_an_error() {
        let (trie, _, _) = two_edge_trie();
        let mut ops = vec![Operation::Advance];

        let mut patcher = Backpatcher::new();
        patcher.defer(Label::new(0), JumpTarget::Epilogue);
        assert_eq!(
            patcher.resolve(&mut ops, &trie, Label::new(0)),
            Err(CompileError::NotABranch(0))
        );
    }

    #[test]
    fn test_dangling_branch_is_an_error() {
        let (trie, _, _) = two_edge_trie();
        let mut ops = vec![
            Operation::BranchIfLess(Label::PENDING),
            Operation::Return,
        ];

        let patcher = Backpatcher::new();
        assert_eq!(
            patcher.resolve(&mut ops, &trie, Label::new(1)),
            Err(CompileError::DanglingBranch(0))
        );
    }
}
