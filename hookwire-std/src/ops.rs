//! The operation set of a generated dispatch method.
//!
//! The dispatch compiler emits a flat list of [`Operation`]s; backends lower
//! that list into whatever they execute. The machine model is small:
//!
//! - the input name as a byte string with a `length` and a `position` cursor
//! - a loaded input code unit and an equality flag
//! - an operand stack feeding [`Operation::Call`], plus numbered temporaries
//! - the output slot and the argument array of the contract
//!
//! Branch targets are [`Label`]s, i.e. operation indices. Branches emitted
//! before their target exists carry [`Label::PENDING`] until the backpatcher
//! rewrites them.

use crate::collect::MethodId;
use hookwire_core::TypeName;
use std::fmt;

/// Index of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(u32);

impl Label {
    /// Placeholder for a branch whose target is not known yet.
    pub const PENDING: Label = Label(u32::MAX);

    /// Create a label from an operation index.
    pub const fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// The operation index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this is still the placeholder.
    pub const fn is_pending(self) -> bool {
        self.0 == u32::MAX
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pending() {
            f.write_str("????")
        } else {
            write!(f, "{:04}", self.0)
        }
    }
}

/// Index of a temporary holding a by-reference argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TempId(u16);

impl TempId {
    /// Create a temp id.
    pub const fn new(index: usize) -> Self {
        Self(index as u16)
    }

    /// The raw index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// One unit of a generated dispatch method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Set the output slot to empty.
    ClearResult,
    /// Jump if the name is missing or empty.
    BranchIfNameEmpty(Label),
    /// `length = name.len(); position = 0`.
    InitCursor,
    /// Jump if `position >= length`.
    BranchIfGreaterOrEqual(Label),
    /// Jump if `position < length`.
    BranchIfLess(Label),
    /// Load the code unit at `position`.
    LoadInputChar,
    /// `flag = loaded == byte`.
    CompareEqual(u8),
    /// `flag = name == key`, comparing the whole input.
    CompareName(String),
    /// Jump if `flag` is false.
    BranchIfNotEqual(Label),
    /// `position += 1`.
    Advance,
    /// Unbox argument `index` as `ty` and push it.
    UnboxArg {
        /// Position in the argument array.
        index: usize,
        /// Type to unbox to.
        ty: TypeName,
    },
    /// Unbox argument `index` as `ty` into a temporary.
    UnboxToTemp {
        /// Position in the argument array.
        index: usize,
        /// Storage type of the temporary.
        ty: TypeName,
        /// The temporary.
        temp: TempId,
    },
    /// Push the address of a temporary.
    LoadTempAddress {
        /// The temporary.
        temp: TempId,
        /// Whether the callee may mutate it.
        mutable: bool,
    },
    /// Pop the method's arguments, invoke it on the instance and keep its
    /// return value.
    Call(MethodId),
    /// Store the return value through the output slot, boxing it first
    /// unless it already is an object.
    BoxAndStoreIndirect {
        /// The return type.
        ty: TypeName,
        /// Whether boxing is needed.
        boxed: bool,
    },
    /// Box a temporary and write it back into the argument array.
    BoxAndStoreElement {
        /// Position in the argument array.
        index: usize,
        /// The temporary.
        temp: TempId,
        /// Storage type of the temporary.
        ty: TypeName,
    },
    /// Push the handled flag.
    LoadConst(bool),
    /// Return the pushed handled flag.
    Return,
}

impl Operation {
    /// The branch target, if this is a branch.
    pub fn target(&self) -> Option<Label> {
        match *self {
            Operation::BranchIfNameEmpty(l)
            | Operation::BranchIfGreaterOrEqual(l)
            | Operation::BranchIfLess(l)
            | Operation::BranchIfNotEqual(l) => Some(l),
            _ => None,
        }
    }

    /// Mutable access to the branch target.
    pub fn target_mut(&mut self) -> Option<&mut Label> {
        match self {
            Operation::BranchIfNameEmpty(l)
            | Operation::BranchIfGreaterOrEqual(l)
            | Operation::BranchIfLess(l)
            | Operation::BranchIfNotEqual(l) => Some(l),
            _ => None,
        }
    }

    /// Whether control never falls through to the next operation.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Operation::Return)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::ClearResult => write!(f, "clear.result"),
            Operation::BranchIfNameEmpty(l) => write!(f, "br.empty     -> {l}"),
            Operation::InitCursor => write!(f, "cursor.init"),
            Operation::BranchIfGreaterOrEqual(l) => write!(f, "br.ge        -> {l}"),
            Operation::BranchIfLess(l) => write!(f, "br.lt        -> {l}"),
            Operation::LoadInputChar => write!(f, "ld.char"),
            Operation::CompareEqual(b) => write!(f, "ceq          {:?}", char::from(*b)),
            Operation::CompareName(key) => write!(f, "ceq.name     {key:?}"),
            Operation::BranchIfNotEqual(l) => write!(f, "br.ne        -> {l}"),
            Operation::Advance => write!(f, "cursor.next"),
            Operation::UnboxArg { index, ty } => write!(f, "unbox        args[{index}] : {ty}"),
            Operation::UnboxToTemp { index, ty, temp } => {
                write!(f, "unbox.tmp    args[{index}] : {ty} -> {temp}")
            }
            Operation::LoadTempAddress { temp, mutable } => {
                let kind = if *mutable { "&mut" } else { "&" };
                write!(f, "ld.addr      {kind} {temp}")
            }
            Operation::Call(m) => write!(f, "call         {m}"),
            Operation::BoxAndStoreIndirect { ty, boxed } => {
                if *boxed {
                    write!(f, "box.st.ret   {ty}")
                } else {
                    write!(f, "st.ret       {ty}")
                }
            }
            Operation::BoxAndStoreElement { index, temp, ty } => {
                write!(f, "box.st.arg   {temp} : {ty} -> args[{index}]")
            }
            Operation::LoadConst(v) => write!(f, "ld.const     {v}"),
            Operation::Return => write!(f, "ret"),
        }
    }
}
