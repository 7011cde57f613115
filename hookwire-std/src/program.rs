//! The finished dispatch method body.

use crate::{
    collect::MethodId,
    ops::{Label, Operation},
};
use hookwire_core::{HookSignature, MethodDescriptor};
use std::fmt;

/// A compiled dispatch method.
///
/// Immutable once built; backends only read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchProgram {
    pub(crate) type_name: String,
    pub(crate) ops: Vec<Operation>,
    pub(crate) hooks: Vec<(HookSignature, MethodDescriptor)>,
    pub(crate) epilogue: Label,
    pub(crate) temps: usize,
}

impl DispatchProgram {
    /// Name of the plugin type the program dispatches for.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The operations in order.
    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the program has no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The first operation of the shared failure epilogue.
    pub fn epilogue(&self) -> Label {
        self.epilogue
    }

    /// Number of temporaries the marshalling code needs.
    pub fn temp_count(&self) -> usize {
        self.temps
    }

    /// Every hook the program can call, indexed by [`MethodId`].
    pub fn hooks(&self) -> &[(HookSignature, MethodDescriptor)] {
        &self.hooks
    }

    /// Look up a called hook.
    pub fn hook(&self, id: MethodId) -> Option<&(HookSignature, MethodDescriptor)> {
        self.hooks.get(id.index())
    }

    /// Operations that begin a basic block, in ascending order.
    ///
    /// The entry, every branch target and every operation following a branch
    /// or a return start a block.
    pub fn block_leaders(&self) -> Vec<Label> {
        let mut leaders = vec![false; self.ops.len()];
        if let Some(first) = leaders.first_mut() {
            *first = true;
        }
        for (i, op) in self.ops.iter().enumerate() {
            if let Some(target) = op.target() {
                if let Some(slot) = leaders.get_mut(target.index()) {
                    *slot = true;
                }
            }
            if op.target().is_some() || op.is_terminator() {
                if let Some(slot) = leaders.get_mut(i + 1) {
                    *slot = true;
                }
            }
        }
        leaders
            .iter()
            .enumerate()
            .filter(|&(_, &leader)| leader)
            .map(|(i, _)| Label::new(i))
            .collect()
    }
}

impl fmt::Display for DispatchProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; dispatch for {}", self.type_name)?;
        for (i, (sig, _)) in self.hooks.iter().enumerate() {
            writeln!(f, ";   {} = {}", MethodId::new(i), sig)?;
        }
        for (i, op) in self.ops.iter().enumerate() {
            if i == self.epilogue.index() {
                writeln!(f, "epilogue:")?;
            }
            writeln!(f, "{}  {}", Label::new(i), op)?;
        }
        Ok(())
    }
}
