//! Error types for hookwire.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`HookwireError`] - Top-level error type
//! - [`GeneratorError`] - Fatal errors that abort a generation pass
//! - [`CompileError`] - Internal consistency errors raised while lowering the trie
//! - [`MarshalError`] - Errors raised while unpacking arguments at call time

use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all hookwire operations.
#[derive(Error, Debug)]
pub enum HookwireError {
    /// A generation pass failed.
    #[error("generator error: {0}")]
    Generator(#[from] GeneratorError),

    /// Lowering the trie into operations failed.
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    /// Marshalling arguments for a hook call failed.
    #[error("marshal error: {0}")]
    Marshal(#[from] MarshalError),

    /// A custom error occurred.
    #[error(transparent)]
    Custom(BoxError),
}

/// Errors that abort a generation pass for one plugin type.
///
/// None of these leave a partially generated method installed.
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// The framework does not expose the dispatch contract.
    #[error("framework `{framework}` does not declare contract method `{method}`")]
    ContractNotFound {
        /// Name of the framework descriptor that was searched.
        framework: String,
        /// Name of the missing contract method.
        method: String,
    },

    /// The framework exposes the contract with the wrong shape.
    #[error("contract method `{method}` has an unexpected shape: {reason}")]
    ContractMismatch {
        /// Name of the contract method.
        method: String,
        /// What did not match.
        reason: &'static str,
    },

    /// The type already declares a method occupying the contract slot.
    #[error("type `{0}` already declares a dispatch method")]
    AlreadyInstalled(String),

    /// A method in the dispatch program has no invoker bound to it.
    #[error("no invoker bound for hook `{0}`")]
    UnboundHook(String),

    /// Lowering failed.
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Internal consistency errors of the dispatch compiler.
///
/// These indicate a bug in the generator rather than a bad input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A pending jump targets a node that was never emitted.
    #[error("jump at {op} targets trie node {node} which was never emitted")]
    UnresolvedJump {
        /// Index of the branch operation.
        op: usize,
        /// Index of the trie node.
        node: usize,
    },

    /// A pending jump was registered on an operation that is not a branch.
    #[error("operation {0} is not a branch")]
    NotABranch(usize),

    /// A branch was emitted without ever being queued for resolution.
    #[error("branch at {0} has no target")]
    DanglingBranch(usize),

    /// A branch was resolved more than once.
    #[error("branch at {0} was already resolved")]
    AlreadyResolved(usize),

    /// A non-terminal trie node has no outgoing edges.
    #[error("trie node {0} is neither terminal nor has children")]
    DeadEnd(usize),

    /// A trie key was empty.
    #[error("empty hook name cannot be inserted")]
    EmptyKey,

    /// A method cannot be invoked through the fast path.
    #[error("hook `{0}` returns an unresolved generic type")]
    UnsupportedReturn(String),
}

/// Errors raised while unpacking the argument container of a hook call.
///
/// The caller is responsible for passing an argument array that matches the
/// matched signature, so these are precondition violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarshalError {
    /// The argument array is shorter than the parameter list.
    #[error("argument {index} is missing (got {len} arguments)")]
    MissingArgument {
        /// Position of the missing argument.
        index: usize,
        /// Length of the supplied argument array.
        len: usize,
    },

    /// An argument does not hold the parameter's type.
    #[error("argument {index} is not a `{expected}`")]
    ArgumentType {
        /// Position of the argument.
        index: usize,
        /// Type the parameter expected.
        expected: &'static str,
    },

    /// A value was written back to a parameter that is not `&mut`.
    #[error("parameter {0} is not passed by mutable reference")]
    NotByRef(usize),
}

// Convenience conversions
impl From<BoxError> for HookwireError {
    fn from(err: BoxError) -> Self {
        HookwireError::Custom(err)
    }
}
