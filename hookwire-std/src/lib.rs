//! # hookwire-std
//!
//! The dispatch generator engine for hookwire.
//!
//! This crate provides:
//! - **Signature Collector**: [`collect`] keys every hook method of a type by signature
//! - **Trie Builder**: [`Trie`] over the collected keys
//! - **Dispatch Compiler**: [`DispatchCompiler`] lowers the trie into [`Operation`]s
//! - **Backpatcher**: [`Backpatcher`] resolves forward branches after the walk
//! - **Pipeline**: [`Generator`] checks the contract, compiles and installs the override
//! - **Interpreter backend**: [`Dispatcher`] executes a [`DispatchProgram`]
//!
//! The argument marshaller is internal to the compiler; its output is visible
//! as the call sequences of a [`DispatchProgram`].

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core types
pub use hookwire_core;

// Modules
pub mod backpatch;
pub mod collect;
pub mod compile;
pub mod generator;
pub mod interp;
mod marshal;
pub mod ops;
pub mod program;
pub mod testing;
pub mod trie;

pub use backpatch::{Backpatcher, JumpTarget, PendingJump};
pub use collect::{MethodId, Signatures, SkipReason};
pub use compile::DispatchCompiler;
pub use generator::{Generator, GeneratorConfig};
pub use interp::{Dispatcher, ExecStats, Frame, HookTable, Hosted, Invoker};
pub use ops::{Label, Operation, TempId};
pub use program::DispatchProgram;
pub use trie::{NodeId, Trie, TrieNode};
