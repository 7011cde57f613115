//! # Dispatch Contract
//!
//! The base framework declares one virtual method that every plugin type may
//! override with a generated body:
//!
//! ```text
//! direct_call_hook(name: Option<&str>, result: &mut Option<Object>, args: &mut [Object]) -> bool
//! ```
//!
//! The method returns `true` and stores the (possibly absent) return value in
//! `result` when a hook matching `name` was found and invoked. It returns
//! `false` and leaves `result` empty otherwise, including for a missing or
//! empty name. A caller that gets `false` is expected to fall back to some
//! slower lookup of its own.
//!
//! [`FrameworkDescriptor`] describes the framework side of this contract so a
//! generator can check it once before transforming any plugin type.

use crate::{
    descriptor::{MethodDescriptor, MethodFlags, Parameter, ReturnType},
    error::MarshalError,
    object::Object,
};

/// Name of the contract method.
pub const DIRECT_CALL_HOOK: &str = "direct_call_hook";

/// Name of the standard framework.
pub const FRAMEWORK_NAME: &str = "hookwire";

/// Name of the framework's base plugin type.
pub const BASE_PLUGIN: &str = "Plugin";

/// Fast hook dispatch by name.
///
/// Implemented by generated code; see the module documentation for the
/// meaning of the return value. Argument arrays must match the arity and
/// types of the hook selected by `name`; violations surface as
/// [`MarshalError`].
#[diagnostic::on_unimplemented(
    message = "`{Self}` has no generated hook dispatcher",
    label = "missing `DirectCallHook` implementation",
    note = "Annotate the plugin's `impl` block with `#[hookwire::hooks]`."
)]
pub trait DirectCallHook {
    /// Invoke the hook named `name` with `args`.
    fn direct_call_hook(
        &mut self,
        name: Option<&str>,
        result: &mut Option<Object>,
        args: &mut [Object],
    ) -> Result<bool, MarshalError>;
}

impl<T: DirectCallHook + ?Sized> DirectCallHook for Box<T> {
    fn direct_call_hook(
        &mut self,
        name: Option<&str>,
        result: &mut Option<Object>,
        args: &mut [Object],
    ) -> Result<bool, MarshalError> {
        (**self).direct_call_hook(name, result, args)
    }
}

/// The framework side of the dispatch contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkDescriptor {
    name: String,
    contracts: Vec<MethodDescriptor>,
}

impl FrameworkDescriptor {
    /// A framework exposing no contract methods.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contracts: Vec::new(),
        }
    }

    /// The framework declaring [`DIRECT_CALL_HOOK`] on its base plugin type.
    pub fn standard() -> Self {
        Self::new(FRAMEWORK_NAME).with_contract(
            MethodDescriptor::new(DIRECT_CALL_HOOK, BASE_PLUGIN)
                .param(Parameter::value("name", "Option<&str>"))
                .param(Parameter::by_ref("result", "Option<Object>"))
                .param(Parameter::by_ref("args", "[Object]"))
                .returns(ReturnType::Value("bool".into()))
                .flags(MethodFlags::PUBLIC | MethodFlags::VIRTUAL | MethodFlags::NEW_SLOT),
        )
    }

    /// Add a contract method.
    pub fn with_contract(mut self, method: MethodDescriptor) -> Self {
        self.contracts.push(method);
        self
    }

    /// The framework's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a contract method by name.
    pub fn contract(&self, name: &str) -> Option<&MethodDescriptor> {
        self.contracts.iter().find(|m| m.name() == name)
    }
}
