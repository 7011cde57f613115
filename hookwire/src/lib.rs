//! # hookwire - Generated Hook Dispatch
//!
//! `hookwire` turns a plugin type's method table into a single specialised
//! dispatch method. Given a hook name and an argument array, the method walks
//! a compiled prefix trie over the plugin's hook signatures and calls the
//! matching method directly, with no reflection at call time.
//!
//! Two backends execute the same compiled [`DispatchProgram`]:
//!
//! - **Ahead of time** (feature `macros`): `#[hooks]` on an `impl` block emits
//!   the dispatcher as Rust source.
//! - **Interpreted**: a [`Dispatcher`] runs the program against typed
//!   invokers bound in a [`HookTable`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hookwire::prelude::*;
//!
//! struct Greeter { greeted: Vec<String> }
//!
//! #[hookwire::hooks]
//! impl Greeter {
//!     fn init_user(&mut self, user: String) {
//!         self.greeted.push(user);
//!     }
//! }
//!
//! let mut args = vec![into_object(String::from("bob"))];
//! let mut result = None;
//! assert!(greeter.direct_call_hook(Some("init_user"), &mut result, &mut args)?);
//! ```

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub use hookwire_core::{
    // Contract
    BASE_PLUGIN,
    // Error types
    BoxError,
    CompileError,
    DIRECT_CALL_HOOK,
    DirectCallHook,
    FRAMEWORK_NAME,
    FrameworkDescriptor,
    GeneratorError,
    // Signatures
    HookSignature,
    HookwireError,
    MarshalError,
    // Method tables
    MethodDescriptor,
    MethodFlags,
    // Objects
    OBJECT_TYPE,
    Object,
    ParamMode,
    Parameter,
    ReturnType,
    TypeDescriptor,
    TypeName,
    canonicalize,
    downcast,
    into_object,
    object_at,
    unbox,
    unbox_ref,
};

// Engine
pub use hookwire_std::{
    Backpatcher, DispatchCompiler, DispatchProgram, Generator, GeneratorConfig, JumpTarget,
    Label, MethodId, NodeId, Operation, PendingJump, Signatures, SkipReason, TempId, Trie,
    TrieNode,
    collect::{check, collect},
};

// Interpreter backend
pub use hookwire_std::{Dispatcher, ExecStats, Frame, HookTable, Hosted, Invoker};

/// Testing utilities.
pub mod testing {
    #![allow(clippy::wildcard_imports)]
    pub use hookwire_std::testing::*;
}

/// Prelude module - common imports for hookwire.
///
/// # Usage
///
/// ```rust,ignore
/// use hookwire::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        DirectCallHook, Dispatcher, FrameworkDescriptor, Generator, GeneratorConfig,
        HookTable, Hosted, MarshalError, MethodDescriptor, Object, Parameter, ReturnType,
        TypeDescriptor, downcast, into_object, unbox,
    };

    #[cfg(feature = "macros")]
    pub use crate::{hook, hooks};
}

#[cfg(feature = "macros")]
pub use hookwire_macros::{hook, hooks};
