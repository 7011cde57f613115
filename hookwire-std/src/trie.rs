//! # Trie Builder
//!
//! Builds a prefix trie over the collected signature keys. Nodes live in an
//! arena and refer to each other by [`NodeId`]; the parent link is a plain
//! index used to recover a node's key and its siblings, never ownership.
//!
//! Edges are UTF-8 code units. Children keep insertion order, so building the
//! same [`Signatures`] twice yields the same trie and the same operations.

use crate::{
    collect::{MethodId, Signatures},
    ops::Label,
};
use hookwire_core::CompileError;
use smallvec::SmallVec;
use std::{collections::HashMap, fmt};

/// Index of a node in the trie arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// The raw index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One code unit of one or more keys.
#[derive(Debug, Clone)]
pub struct TrieNode {
    byte: Option<u8>,
    terminal: Option<MethodId>,
    children: SmallVec<[NodeId; 4]>,
    parent: Option<NodeId>,
    first_op: Option<Label>,
}

impl TrieNode {
    fn new(byte: Option<u8>, parent: Option<NodeId>) -> Self {
        Self {
            byte,
            terminal: None,
            children: SmallVec::new(),
            parent,
            first_op: None,
        }
    }

    /// The code unit this node matches; `None` for the root.
    pub fn byte(&self) -> Option<u8> {
        self.byte
    }

    /// The hook a key ending exactly here resolves to.
    pub fn terminal(&self) -> Option<MethodId> {
        self.terminal
    }

    /// Child edges in insertion order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The parent node; `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// The first operation emitted for this node, once compiled.
    pub fn first_op(&self) -> Option<Label> {
        self.first_op
    }
}

/// A prefix trie over hook keys.
#[derive(Debug, Clone)]
pub struct Trie {
    nodes: Vec<TrieNode>,
    keys: usize,
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl Trie {
    /// Create a trie holding only the root.
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::new(None, None)],
            keys: 0,
        }
    }

    /// Build a trie over every collected key.
    ///
    /// With `aliases`, a bare method name that is not itself a key and
    /// belongs to exactly one key is inserted too, resolving to that key's
    /// method.
    pub fn build(signatures: &Signatures, aliases: bool) -> Result<Self, CompileError> {
        let mut trie = Self::new();
        for (id, signature, _) in signatures.iter() {
            trie.insert(signature.as_str(), id)?;
        }

        if aliases {
            let mut by_name: HashMap<&str, Option<MethodId>> = HashMap::new();
            let mut order = Vec::new();
            for (id, signature, _) in signatures.iter() {
                if !signature.has_params() {
                    continue;
                }
                let name = signature.bare_name();
                by_name
                    .entry(name)
                    .and_modify(|slot| *slot = None)
                    .or_insert_with(|| {
                        order.push(name);
                        Some(id)
                    });
            }
            for name in order {
                if let Some(Some(id)) = by_name.get(name) {
                    if signatures.id_of(name).is_none() {
                        trie.insert(name, *id)?;
                    }
                }
            }
        }

        Ok(trie)
    }

    /// The root node's id.
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> &TrieNode {
        &self.nodes[id.index()]
    }

    /// Number of nodes, the root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether only the root exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Number of keys inserted.
    pub fn key_count(&self) -> usize {
        self.keys
    }

    /// Insert `key`, marking its last node as resolving to `method`.
    ///
    /// An existing terminal is kept.
    pub fn insert(&mut self, key: &str, method: MethodId) -> Result<NodeId, CompileError> {
        if key.is_empty() {
            return Err(CompileError::EmptyKey);
        }

        let mut node = self.root();
        for &byte in key.as_bytes() {
            node = match self.child(node, byte) {
                Some(child) => child,
                None => self.push_child(node, byte),
            };
        }

        let slot = &mut self.nodes[node.index()].terminal;
        if slot.is_none() {
            *slot = Some(method);
            self.keys += 1;
        }
        Ok(node)
    }

    /// Follow `key` from the root.
    pub fn find(&self, key: &str) -> Option<NodeId> {
        key.as_bytes()
            .iter()
            .try_fold(self.root(), |node, &byte| self.child(node, byte))
    }

    /// Exact-match lookup.
    pub fn get(&self, key: &str) -> Option<MethodId> {
        self.find(key).and_then(|node| self.node(node).terminal)
    }

    /// The child of `node` on edge `byte`.
    pub fn child(&self, node: NodeId, byte: u8) -> Option<NodeId> {
        self.node(node)
            .children
            .iter()
            .copied()
            .find(|&c| self.node(c).byte == Some(byte))
    }

    /// The sibling tested after `node`, if any.
    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.node(node).parent?;
        let siblings = &self.node(parent).children;
        let pos = siblings.iter().position(|&s| s == node)?;
        siblings.get(pos + 1).copied()
    }

    /// Number of siblings tested after `node`.
    pub fn remaining_siblings(&self, node: NodeId) -> usize {
        let Some(parent) = self.node(node).parent else {
            return 0;
        };
        let siblings = &self.node(parent).children;
        siblings
            .iter()
            .position(|&s| s == node)
            .map_or(0, |pos| siblings.len() - pos - 1)
    }

    /// Number of edges between the root and `node`.
    pub fn depth(&self, node: NodeId) -> usize {
        let mut depth = 0;
        let mut cur = node;
        while let Some(parent) = self.node(cur).parent {
            depth += 1;
            cur = parent;
        }
        depth
    }

    /// The key spelled by the path from the root to `node`.
    pub fn key(&self, node: NodeId) -> String {
        let mut bytes = Vec::with_capacity(self.depth(node));
        let mut cur = node;
        while let Some(byte) = self.node(cur).byte {
            bytes.push(byte);
            match self.node(cur).parent {
                Some(parent) => cur = parent,
                None => break,
            }
        }
        bytes.reverse();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// The single remaining candidate below `node`, if the search can stop
    /// testing one code unit at a time.
    ///
    /// Holds when `node` and every single-child descendant after it are
    /// non-terminal until exactly one childless terminal is reached, at least
    /// one edge below `node`.
    pub fn collapse_target(&self, node: NodeId) -> Option<NodeId> {
        let mut cur = node;
        let mut steps = 0usize;
        loop {
            let n = self.node(cur);
            if n.terminal.is_some() {
                return (n.children.is_empty() && steps > 0).then_some(cur);
            }
            match n.children.as_slice() {
                [only] => {
                    cur = *only;
                    steps += 1;
                }
                _ => return None,
            }
        }
    }

    /// Record the first operation emitted for `node`.
    pub(crate) fn set_first_op(&mut self, node: NodeId, label: Label) {
        self.nodes[node.index()].first_op = Some(label);
    }

    fn push_child(&mut self, parent: NodeId, byte: u8) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(TrieNode::new(Some(byte), Some(parent)));
        self.nodes[parent.index()].children.push(id);
        id
    }
}
