//! # Dispatch Compiler
//!
//! Walks the trie depth-first and emits the [`Operation`] sequence of the
//! dispatch method:
//!
//! ```text
//! preamble   clear.result; br.empty -> epilogue; cursor.init
//! edges      br.ge -> epilogue                      (once per sibling group)
//!            ld.char; ceq c; br.ne -> next sibling   (per edge)
//!            cursor.next
//! terminal   br.lt -> epilogue | first child; <call sequence>
//! collapse   ceq.name key; br.ne -> epilogue; <call sequence>
//! epilogue   ld.const false; ret
//! ```
//!
//! Sibling and epilogue targets are not known while emitting, so branches go
//! through the [`Backpatcher`] and are resolved after the walk.

use crate::{
    backpatch::{Backpatcher, JumpTarget},
    collect::{MethodId, Signatures},
    marshal,
    ops::{Label, Operation, TempId},
    program::DispatchProgram,
    trie::{NodeId, Trie},
};
use hookwire_core::CompileError;
use smallvec::SmallVec;

/// Operation buffer shared by the compiler and the marshaller.
#[derive(Debug, Default)]
pub(crate) struct Emitter {
    ops: Vec<Operation>,
    patcher: Backpatcher,
    temps_in_use: usize,
    max_temps: usize,
}

impl Emitter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append an operation and return its label.
    pub(crate) fn emit(&mut self, op: Operation) -> Label {
        let label = Label::new(self.ops.len());
        self.ops.push(op);
        label
    }

    /// Append a branch whose target is resolved later.
    pub(crate) fn emit_branch(&mut self, op: Operation, target: JumpTarget) -> Label {
        let label = self.emit(op);
        self.patcher.defer(label, target);
        label
    }

    /// Start a new call sequence; temporaries of earlier calls are free again.
    pub(crate) fn begin_call(&mut self) {
        self.temps_in_use = 0;
    }

    pub(crate) fn alloc_temp(&mut self) -> TempId {
        let temp = TempId::new(self.temps_in_use);
        self.temps_in_use += 1;
        self.max_temps = self.max_temps.max(self.temps_in_use);
        temp
    }

    #[cfg(test)]
    pub(crate) fn ops(&self) -> &[Operation] {
        &self.ops
    }

    #[cfg(test)]
    pub(crate) fn temp_count(&self) -> usize {
        self.max_temps
    }
}

/// Lowers a trie into a [`DispatchProgram`].
pub struct DispatchCompiler<'a> {
    trie: &'a mut Trie,
    signatures: &'a Signatures,
    collapse: bool,
    emitter: Emitter,
}

impl<'a> DispatchCompiler<'a> {
    /// Create a compiler over a built trie and the signatures it was built from.
    pub fn new(trie: &'a mut Trie, signatures: &'a Signatures) -> Self {
        Self {
            trie,
            signatures,
            collapse: true,
            emitter: Emitter::new(),
        }
    }

    /// Enable or disable the single-path collapse.
    pub fn collapse_single_paths(mut self, enabled: bool) -> Self {
        self.collapse = enabled;
        self
    }

    /// Compile the whole trie for the plugin type `type_name`.
    pub fn compile(mut self, type_name: &str) -> Result<DispatchProgram, CompileError> {
        self.emitter.emit(Operation::ClearResult);
        self.emitter.emit_branch(
            Operation::BranchIfNameEmpty(Label::PENDING),
            JumpTarget::Epilogue,
        );
        self.emitter.emit(Operation::InitCursor);

        let root = self.trie.root();
        if !self.trie.node(root).children().is_empty() {
            self.compile_edges(root, true)?;
        }

        let epilogue = self.emitter.emit(Operation::LoadConst(false));
        self.emitter.emit(Operation::Return);

        let Emitter {
            mut ops,
            patcher,
            max_temps,
            ..
        } = self.emitter;
        patcher.resolve(&mut ops, self.trie, epilogue)?;

        let hooks = self
            .signatures
            .iter()
            .map(|(_, sig, method)| (sig.clone(), method.clone()))
            .collect();

        Ok(DispatchProgram {
            type_name: type_name.to_string(),
            ops,
            hooks,
            epilogue,
            temps: max_temps,
        })
    }

    /// Emit the tests for every child edge of `node`.
    ///
    /// `guard` emits the length check in front of the first edge. It is
    /// skipped when the only way in is a branch that already proved
    /// `position < length`.
    fn compile_edges(&mut self, node: NodeId, guard: bool) -> Result<(), CompileError> {
        let children: SmallVec<[NodeId; 4]> = SmallVec::from_slice(self.trie.node(node).children());

        if guard {
            self.emitter.emit_branch(
                Operation::BranchIfGreaterOrEqual(Label::PENDING),
                JumpTarget::Epilogue,
            );
        }

        for (i, &child) in children.iter().enumerate() {
            let byte = self.trie.node(child).byte().ok_or(CompileError::DeadEnd(child.index()))?;

            let first = self.emitter.emit(Operation::LoadInputChar);
            self.trie.set_first_op(child, first);
            self.emitter.emit(Operation::CompareEqual(byte));

            let on_mismatch = match children.get(i + 1) {
                Some(&next) => JumpTarget::Node(next),
                None => JumpTarget::Epilogue,
            };
            self.emitter
                .emit_branch(Operation::BranchIfNotEqual(Label::PENDING), on_mismatch);

            self.compile_node(child)?;
        }
        Ok(())
    }

    /// Emit what follows a successful test of `node`'s code unit.
    fn compile_node(&mut self, node: NodeId) -> Result<(), CompileError> {
        if self.collapse {
            if let Some(leaf) = self.trie.collapse_target(node) {
                let key = self.trie.key(leaf);
                let method = self.terminal(leaf)?;
                self.emitter.emit(Operation::CompareName(key));
                self.emitter.emit_branch(
                    Operation::BranchIfNotEqual(Label::PENDING),
                    JumpTarget::Epilogue,
                );
                return self.emit_call(method);
            }
        }

        self.emitter.emit(Operation::Advance);

        let n = self.trie.node(node);
        let first_child = n.children().first().copied();
        match (n.terminal(), first_child) {
            (Some(method), None) => {
                self.emitter.emit_branch(
                    Operation::BranchIfLess(Label::PENDING),
                    JumpTarget::Epilogue,
                );
                self.emit_call(method)
            }
            (Some(method), Some(first_child)) => {
                // Input left over: keep matching below this node.
                self.emitter.emit_branch(
                    Operation::BranchIfLess(Label::PENDING),
                    JumpTarget::Node(first_child),
                );
                self.emit_call(method)?;
                self.compile_edges(node, false)
            }
            (None, Some(_)) => self.compile_edges(node, true),
            (None, None) => Err(CompileError::DeadEnd(node.index())),
        }
    }

    fn terminal(&self, node: NodeId) -> Result<MethodId, CompileError> {
        self.trie
            .node(node)
            .terminal()
            .ok_or(CompileError::DeadEnd(node.index()))
    }

    fn emit_call(&mut self, method: MethodId) -> Result<(), CompileError> {
        let (signature, descriptor) = self
            .signatures
            .get(method)
            .ok_or(CompileError::DeadEnd(method.index()))?;
        marshal::emit_call(&mut self.emitter, method, signature, descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookwire_core::{HookSignature, MethodDescriptor, Parameter};

    fn signatures(methods: &[MethodDescriptor]) -> Signatures {
        let mut sigs = Signatures::new();
        for m in methods {
            sigs.insert(HookSignature::of(m), m.clone());
        }
        sigs
    }

    fn compile(sigs: &Signatures, aliases: bool, collapse: bool) -> DispatchProgram {
        let mut trie = Trie::build(sigs, aliases).unwrap();
        DispatchCompiler::new(&mut trie, sigs)
            .collapse_single_paths(collapse)
            .compile("Plugin")
            .unwrap()
    }

    #[test]
    fn test_empty_type_is_preamble_and_epilogue() {
        let program = compile(&Signatures::new(), true, true);
        assert_eq!(
            program.ops(),
            [
                Operation::ClearResult,
                Operation::BranchIfNameEmpty(Label::new(3)),
                Operation::InitCursor,
                Operation::LoadConst(false),
                Operation::Return,
            ]
        );
        assert_eq!(program.epilogue(), Label::new(3));
    }

    #[test]
    fn test_single_char_hook() {
        let sigs = signatures(&[MethodDescriptor::new("a", "P")]);
        let program = compile(&sigs, false, true);
        let epilogue = program.epilogue();
        assert_eq!(
            program.ops(),
            [
                Operation::ClearResult,
                Operation::BranchIfNameEmpty(epilogue),
                Operation::InitCursor,
                Operation::BranchIfGreaterOrEqual(epilogue),
                Operation::LoadInputChar,
                Operation::CompareEqual(b'a'),
                Operation::BranchIfNotEqual(epilogue),
                Operation::Advance,
                Operation::BranchIfLess(epilogue),
                Operation::Call(MethodId::new(0)),
                Operation::LoadConst(true),
                Operation::Return,
                Operation::LoadConst(false),
                Operation::Return,
            ]
        );
    }

    #[test]
    fn test_sibling_mismatch_jumps_to_next_sibling() {
        let sigs = signatures(&[MethodDescriptor::new("a", "P"), MethodDescriptor::new("b", "P")]);
        let program = compile(&sigs, false, true);
        let ops = program.ops();

        // First edge: ld.char at 4, br.ne at 6 goes to the second edge's ld.char.
        let second = ops
            .iter()
            .position(|op| *op == Operation::CompareEqual(b'b'))
            .unwrap()
            - 1;
        assert_eq!(ops[4], Operation::LoadInputChar);
        assert_eq!(ops[6], Operation::BranchIfNotEqual(Label::new(second)));
        assert_eq!(ops[second], Operation::LoadInputChar);
        // The last edge falls to the epilogue.
        assert_eq!(
            ops[second + 2],
            Operation::BranchIfNotEqual(program.epilogue())
        );
    }

    #[test]
    fn test_collapse_emits_one_name_comparison() {
        let sigs = signatures(&[MethodDescriptor::new("OnServerInitialized", "P")]);
        let program = compile(&sigs, false, true);

        let name_checks: Vec<_> = program
            .ops()
            .iter()
            .filter(|op| matches!(op, Operation::CompareName(_)))
            .collect();
        assert_eq!(
            name_checks,
            [&Operation::CompareName("OnServerInitialized".into())]
        );
        let char_checks = program
            .ops()
            .iter()
            .filter(|op| matches!(op, Operation::CompareEqual(_)))
            .count();
        assert_eq!(char_checks, 1);
    }

    #[test]
    fn test_without_collapse_tests_every_char() {
        let sigs = signatures(&[MethodDescriptor::new("OnTick", "P")]);
        let program = compile(&sigs, false, false);

        let char_checks = program
            .ops()
            .iter()
            .filter(|op| matches!(op, Operation::CompareEqual(_)))
            .count();
        assert_eq!(char_checks, "OnTick".len());
        assert!(!program
            .ops()
            .iter()
            .any(|op| matches!(op, Operation::CompareName(_))));
    }

    #[test]
    fn test_terminal_with_children_branches_into_first_child() {
        let sigs = signatures(&[
            MethodDescriptor::new("ab", "P"),
            MethodDescriptor::new("abc", "P"),
        ]);
        let program = compile(&sigs, false, false);
        let ops = program.ops();

        let call_ab = ops
            .iter()
            .position(|op| *op == Operation::Call(MethodId::new(0)))
            .unwrap();
        // br.lt right before the call sequence of "ab" targets the 'c' edge.
        let Operation::BranchIfLess(target) = ops[call_ab - 1] else {
            panic!("expected br.lt before the call, got {}", ops[call_ab - 1]);
        };
        assert_eq!(ops[target.index()], Operation::LoadInputChar);
        assert_eq!(ops[target.index() + 1], Operation::CompareEqual(b'c'));
        // No length guard in front of the 'c' edge: only reachable via br.lt.
        assert_ne!(
            ops[target.index() - 1],
            Operation::BranchIfGreaterOrEqual(program.epilogue())
        );
    }

    #[test]
    fn test_no_pending_labels_survive() {
        let sigs = signatures(&[
            MethodDescriptor::new("Init", "P"),
            MethodDescriptor::new("InitUser", "P").param(Parameter::value("u", "String")),
            MethodDescriptor::new("InitUserGroup", "P")
                .param(Parameter::value("u", "String"))
                .param(Parameter::value("g", "String")),
            MethodDescriptor::new("Unload", "P"),
        ]);
        for collapse in [true, false] {
            let program = compile(&sigs, true, collapse);
            for op in program.ops() {
                if let Some(target) = op.target() {
                    assert!(!target.is_pending());
                    assert!(target.index() < program.len());
                }
            }
        }
    }

    #[test]
    fn test_deterministic_output() {
        let sigs = signatures(&[
            MethodDescriptor::new("Foo", "P"),
            MethodDescriptor::new("Far", "P"),
            MethodDescriptor::new("Bar", "P").param(Parameter::by_ref("x", "i32")),
        ]);
        assert_eq!(compile(&sigs, true, true), compile(&sigs, true, true));
    }

    #[test]
    fn test_block_leaders() {
        let sigs = signatures(&[MethodDescriptor::new("a", "P")]);
        let program = compile(&sigs, false, true);
        let leaders: Vec<usize> = program.block_leaders().iter().map(|l| l.index()).collect();
        // entry, after br.empty, after br.ge, after br.ne, after br.lt, epilogue
        assert_eq!(leaders, [0, 2, 4, 7, 9, 12]);
    }

    #[test]
    fn test_listing_marks_epilogue() {
        let sigs = signatures(&[MethodDescriptor::new("a", "P")]);
        let listing = compile(&sigs, false, true).to_string();
        assert!(listing.starts_with("; dispatch for Plugin\n"));
        assert!(listing.contains(";   m0 = a\n"));
        assert!(listing.contains("epilogue:\n0012  ld.const     false\n"));
    }
}
