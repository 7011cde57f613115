//! The generation pipeline.
//!
//! A [`Generator`] checks the framework's dispatch contract once, then turns
//! any number of plugin types into dispatch programs:
//!
//! ```text
//! collect -> trie -> compile -> backpatch -> install override
//! ```
//!
//! Nothing is installed unless every step succeeded.

use crate::{
    collect::{self, Signatures},
    compile::DispatchCompiler,
    program::DispatchProgram,
    trie::Trie,
};
use hookwire_core::{
    DIRECT_CALL_HOOK, FrameworkDescriptor, GeneratorError, MethodDescriptor, MethodFlags,
    ParamMode, ReturnType, TypeDescriptor,
};

/// Knobs of the generation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorConfig {
    collapse_single_paths: bool,
    bare_name_aliases: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            collapse_single_paths: true,
            bare_name_aliases: true,
        }
    }
}

impl GeneratorConfig {
    /// The default configuration: collapse and aliases enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare the whole name once when only one key remains below a node.
    pub fn collapse_single_paths(mut self, enabled: bool) -> Self {
        self.collapse_single_paths = enabled;
        self
    }

    /// Let a unique bare method name select its only overload.
    pub fn bare_name_aliases(mut self, enabled: bool) -> Self {
        self.bare_name_aliases = enabled;
        self
    }

    /// Whether the single-path collapse is enabled.
    pub fn collapses_single_paths(&self) -> bool {
        self.collapse_single_paths
    }

    /// Whether bare-name aliases are enabled.
    pub fn has_bare_name_aliases(&self) -> bool {
        self.bare_name_aliases
    }
}

/// Generates dispatch methods against one framework contract.
#[derive(Debug, Clone)]
pub struct Generator {
    contract: MethodDescriptor,
    config: GeneratorConfig,
}

impl Generator {
    /// Check the framework's contract and create a generator for it.
    pub fn new(framework: &FrameworkDescriptor) -> Result<Self, GeneratorError> {
        let contract = framework.contract(DIRECT_CALL_HOOK).ok_or_else(|| {
            GeneratorError::ContractNotFound {
                framework: framework.name().to_string(),
                method: DIRECT_CALL_HOOK.to_string(),
            }
        })?;
        check_contract(contract)?;

        Ok(Self {
            contract: contract.clone(),
            config: GeneratorConfig::default(),
        })
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// The contract method generated bodies override.
    pub fn contract(&self) -> &MethodDescriptor {
        &self.contract
    }

    /// Compile the dispatch program for `ty` without touching it.
    pub fn compile(&self, ty: &TypeDescriptor) -> Result<DispatchProgram, GeneratorError> {
        let signatures = collect::collect(ty);
        self.compile_signatures(ty.name(), &signatures)
    }

    /// Compile an already collected set of hooks.
    pub fn compile_signatures(
        &self,
        type_name: &str,
        signatures: &Signatures,
    ) -> Result<DispatchProgram, GeneratorError> {
        let mut trie = Trie::build(signatures, self.config.bare_name_aliases)?;
        let program = DispatchCompiler::new(&mut trie, signatures)
            .collapse_single_paths(self.config.collapse_single_paths)
            .compile(type_name)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            ty = %type_name,
            hooks = signatures.len(),
            keys = trie.key_count(),
            nodes = trie.len(),
            ops = program.len(),
            temps = program.temp_count(),
            "Generated dispatcher"
        );

        Ok(program)
    }

    /// Compile the dispatch program for `ty` and install the overriding
    /// contract method into its method table.
    pub fn generate(&self, ty: &mut TypeDescriptor) -> Result<DispatchProgram, GeneratorError> {
        if ty.find_declared(self.contract.name()).is_some() {
            return Err(GeneratorError::AlreadyInstalled(ty.name().to_string()));
        }

        let program = self.compile(ty)?;
        ty.add_method(self.override_for(ty.name()));
        Ok(program)
    }

    /// The method a generated body is installed as on `type_name`.
    pub fn override_for(&self, type_name: &str) -> MethodDescriptor {
        let mut method = MethodDescriptor::new(self.contract.name(), type_name)
            .returns(self.contract.return_type().clone())
            .flags(MethodFlags::PUBLIC | MethodFlags::VIRTUAL | MethodFlags::OVERRIDE);
        for param in self.contract.params() {
            method = method.param(param.clone());
        }
        method
    }
}

fn check_contract(contract: &MethodDescriptor) -> Result<(), GeneratorError> {
    let mismatch = |reason| GeneratorError::ContractMismatch {
        method: contract.name().to_string(),
        reason,
    };

    if contract.has(MethodFlags::STATIC) {
        return Err(mismatch("must be an instance method"));
    }
    if !contract.has(MethodFlags::VIRTUAL) {
        return Err(mismatch("must be overridable"));
    }
    if contract.generic_param_count() > 0 {
        return Err(mismatch("must not be generic"));
    }
    let [name, result, args] = contract.params() else {
        return Err(mismatch("must take a name, a result slot and an argument array"));
    };
    if name.mode() != ParamMode::Value {
        return Err(mismatch("name must be passed by value"));
    }
    if result.mode() != ParamMode::Ref || args.mode() != ParamMode::Ref {
        return Err(mismatch("result slot and argument array must be mutable references"));
    }
    match contract.return_type() {
        ReturnType::Value(ty) if ty.canonical() == "bool" => Ok(()),
        _ => Err(mismatch("must return bool")),
    }
}
