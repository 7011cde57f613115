//! # hookwire-core
//!
//! Core data model for the hookwire dispatch generator.
//!
//! This crate has minimal dependencies and is shared by the generator engine
//! (`hookwire-std`), the proc-macro backend and plugins that only need the
//! contract.
//!
//! # Contents
//!
//! - [`TypeDescriptor`] / [`MethodDescriptor`]: the method table a generator reads
//! - [`TypeName`]: written types and their canonical rendering
//! - [`HookSignature`]: the key disambiguating one hook among overloads
//! - [`DirectCallHook`] / [`FrameworkDescriptor`]: the dispatch contract
//! - [`Object`]: erased values passed through the contract
//!
//! # Error Types
//!
//! - [`HookwireError`] - Top-level error type
//! - [`GeneratorError`] - Fatal generation errors
//! - [`CompileError`] - Lowering consistency errors
//! - [`MarshalError`] - Argument unpacking errors

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod contract;
mod descriptor;
mod error;
mod object;
mod signature;
mod types;

// Re-exports
pub use contract::{
    BASE_PLUGIN, DIRECT_CALL_HOOK, DirectCallHook, FRAMEWORK_NAME, FrameworkDescriptor,
};
pub use descriptor::{
    MethodDescriptor, MethodFlags, ParamMode, Parameter, ReturnType, TypeDescriptor,
};
pub use error::{BoxError, CompileError, GeneratorError, HookwireError, MarshalError};
pub use object::{Object, downcast, into_object, object_at, unbox, unbox_ref};
pub use signature::HookSignature;
pub use types::{OBJECT_TYPE, TypeName, canonicalize};
