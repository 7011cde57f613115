//! Method tables.
//!
//! A [`TypeDescriptor`] is the method table of one plugin type as supplied by
//! whatever loaded the plugin. Each [`MethodDescriptor`] describes one
//! discoverable, invocable method: its name, its parameters (each tagged with
//! how it is passed), its return type and a set of [`MethodFlags`].

use crate::types::TypeName;
use bitflags::bitflags;

bitflags! {
    /// Attributes of a declared method.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodFlags: u16 {
        /// The method has no receiver.
        const STATIC = 1 << 0;
        /// The method is part of the type's public surface.
        const PUBLIC = 1 << 1;
        /// The method is explicitly tagged as a hook.
        const HOOK = 1 << 2;
        /// The method is a property getter or setter.
        const ACCESSOR = 1 << 3;
        /// The method participates in virtual dispatch.
        const VIRTUAL = 1 << 4;
        /// The method reuses an inherited virtual slot.
        const OVERRIDE = 1 << 5;
        /// The method introduces a new virtual slot.
        const NEW_SLOT = 1 << 6;
        /// The signature carries a borrow the dispatcher cannot hold: a
        /// non-`'static` return, or a reference nested inside a parameter type.
        const BORROWED = 1 << 7;
    }
}

/// How an argument reaches the callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamMode {
    /// The unboxed value is moved into the call.
    Value,
    /// A temporary holds the unboxed value and the callee borrows it.
    Shared,
    /// A temporary holds the unboxed value, the callee borrows it mutably and
    /// the final value is written back into the argument array.
    Ref,
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    ty: TypeName,
    element: TypeName,
    mode: ParamMode,
    variadic: bool,
}

impl Parameter {
    /// A by-value parameter.
    pub fn value(name: impl Into<String>, ty: impl Into<TypeName>) -> Self {
        let ty = ty.into();
        Self {
            name: name.into(),
            element: ty.clone(),
            ty,
            mode: ParamMode::Value,
            variadic: false,
        }
    }

    /// A shared-borrow parameter `&element`.
    pub fn shared(name: impl Into<String>, element: impl Into<TypeName>) -> Self {
        let element = element.into();
        Self {
            name: name.into(),
            ty: TypeName::new(format!("&{}", element.source())),
            element,
            mode: ParamMode::Shared,
            variadic: false,
        }
    }

    /// A by-reference parameter `&mut element`.
    pub fn by_ref(name: impl Into<String>, element: impl Into<TypeName>) -> Self {
        let element = element.into();
        Self {
            name: name.into(),
            ty: TypeName::new(format!("&mut {}", element.source())),
            element,
            mode: ParamMode::Ref,
            variadic: false,
        }
    }

    /// Mark the parameter as a catch-all argument array.
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// The parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type, including any borrow.
    pub fn ty(&self) -> &TypeName {
        &self.ty
    }

    /// The borrowed type for `Shared`/`Ref`, the declared type otherwise.
    pub fn element(&self) -> &TypeName {
        &self.element
    }

    /// How the argument is passed.
    pub fn mode(&self) -> ParamMode {
        self.mode
    }

    /// Whether this parameter swallows all remaining arguments.
    pub fn is_variadic(&self) -> bool {
        self.variadic
    }
}

/// What a method returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnType {
    /// Nothing.
    Void,
    /// A concrete value that has to be boxed into an object.
    Value(TypeName),
    /// A value that already is an erased object.
    Object,
    /// A type parameter that is not resolved at this level.
    Generic(String),
}

impl ReturnType {
    /// Classify a written return type.
    pub fn from_type(ty: TypeName) -> Self {
        if ty.canonical() == "()" {
            ReturnType::Void
        } else if ty.is_object() {
            ReturnType::Object
        } else {
            ReturnType::Value(ty)
        }
    }

    /// Whether the method produces a value.
    pub fn is_void(&self) -> bool {
        matches!(self, ReturnType::Void)
    }
}

/// A discoverable, invocable method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    name: String,
    declaring_type: String,
    params: Vec<Parameter>,
    ret: ReturnType,
    flags: MethodFlags,
    generic_params: usize,
}

impl MethodDescriptor {
    /// Create a private instance method with no parameters returning nothing.
    pub fn new(name: impl Into<String>, declaring_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaring_type: declaring_type.into(),
            params: Vec::new(),
            ret: ReturnType::Void,
            flags: MethodFlags::empty(),
            generic_params: 0,
        }
    }

    /// Append a parameter.
    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    /// Set the return type.
    pub fn returns(mut self, ret: ReturnType) -> Self {
        self.ret = ret;
        self
    }

    /// Add flags.
    pub fn flags(mut self, flags: MethodFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Set the number of generic type parameters.
    pub fn generic_params(mut self, count: usize) -> Self {
        self.generic_params = count;
        self
    }

    /// The method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the type that declares the method.
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    /// The declared parameters in order.
    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// The return type.
    pub fn return_type(&self) -> &ReturnType {
        &self.ret
    }

    /// The method's flags.
    pub fn method_flags(&self) -> MethodFlags {
        self.flags
    }

    /// Number of generic type parameters.
    pub fn generic_param_count(&self) -> usize {
        self.generic_params
    }

    /// Shorthand for a flag check.
    pub fn has(&self, flag: MethodFlags) -> bool {
        self.flags.contains(flag)
    }
}

/// The method table of one plugin type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    name: String,
    methods: Vec<MethodDescriptor>,
}

impl TypeDescriptor {
    /// Create an empty method table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Append a method and return the table.
    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    /// Append a method.
    pub fn add_method(&mut self, method: MethodDescriptor) {
        self.methods.push(method);
    }

    /// The type's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All methods in discovery order, inherited ones included.
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// Methods declared directly on this type.
    pub fn declared_methods(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods
            .iter()
            .filter(move |m| m.declaring_type() == self.name)
    }

    /// Find a directly declared method by name.
    pub fn find_declared(&self, name: &str) -> Option<&MethodDescriptor> {
        self.declared_methods().find(|m| m.name() == name)
    }
}
