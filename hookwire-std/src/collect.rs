//! # Signature Collector
//!
//! Scans a type's method table and keys every eligible hook method by its
//! [`HookSignature`].
//!
//! A method is eligible when all of the following hold:
//!
//! - it is an instance method
//! - it is non-public, or explicitly tagged as a hook
//! - it has no generic type parameters and does not return an unresolved type parameter
//! - its signature holds no borrow that outlives the call
//! - it is declared directly on the type, not inherited
//! - it is not a property accessor
//! - its name contains no characters reserved for synthesised names
//! - it does not take a catch-all argument array
//!
//! Keys are first-registered-wins: a later method producing an existing key
//! is shadowed without an error.

use hookwire_core::{HookSignature, MethodDescriptor, MethodFlags, ReturnType, TypeDescriptor};
use indexmap::IndexMap;
use std::fmt;

/// Characters that only appear in synthesised method names.
pub const RESERVED_NAME_CHARS: &[char] = &['<', '>', '$', '#', '.', '(', ')', ','];

/// Prefix of synthesised method names.
pub const RESERVED_NAME_PREFIX: &str = "__";

/// Index of a collected hook method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(u32);

impl MethodId {
    /// Create an id from a raw index.
    pub const fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// The raw index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Why a method was left out of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The method has no receiver.
    Static,
    /// The method is public and not tagged as a hook.
    Public,
    /// The method declares generic type parameters.
    Generic,
    /// The method returns an unresolved type parameter.
    GenericReturn,
    /// The signature borrows beyond the call.
    Borrowed,
    /// The method is declared on another type.
    Inherited,
    /// The method is a property accessor.
    Accessor,
    /// The method name is reserved for synthesised code.
    ReservedName,
    /// The method takes a catch-all argument array.
    Variadic,
}

/// Collected hook methods keyed by signature, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct Signatures {
    map: IndexMap<HookSignature, MethodDescriptor>,
}

impl Signatures {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method under a key.
    ///
    /// Returns `false` when the key was already taken; the earlier method
    /// stays registered.
    pub fn insert(&mut self, signature: HookSignature, method: MethodDescriptor) -> bool {
        if self.map.contains_key(&signature) {
            return false;
        }
        self.map.insert(signature, method);
        true
    }

    /// Number of collected hooks.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no hooks were collected.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Look up a hook by id.
    pub fn get(&self, id: MethodId) -> Option<(&HookSignature, &MethodDescriptor)> {
        self.map.get_index(id.index())
    }

    /// Look up a hook's id by key.
    pub fn id_of(&self, key: &str) -> Option<MethodId> {
        self.map.get_index_of(key).map(MethodId::new)
    }

    /// Look up a hook's method by key.
    pub fn method(&self, key: &str) -> Option<&MethodDescriptor> {
        self.map.get(key)
    }

    /// Iterate hooks in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (MethodId, &HookSignature, &MethodDescriptor)> {
        self.map
            .iter()
            .enumerate()
            .map(|(i, (sig, method))| (MethodId::new(i), sig, method))
    }

    /// The keys in discovery order.
    pub fn keys(&self) -> impl Iterator<Item = &HookSignature> {
        self.map.keys()
    }
}

/// Decide whether a method of `ty` is a dispatchable hook.
pub fn check(ty: &TypeDescriptor, method: &MethodDescriptor) -> Result<(), SkipReason> {
    if method.has(MethodFlags::STATIC) {
        return Err(SkipReason::Static);
    }
    if method.has(MethodFlags::PUBLIC) && !method.has(MethodFlags::HOOK) {
        return Err(SkipReason::Public);
    }
    if method.generic_param_count() > 0 {
        return Err(SkipReason::Generic);
    }
    if matches!(method.return_type(), ReturnType::Generic(_)) {
        return Err(SkipReason::GenericReturn);
    }
    if method.has(MethodFlags::BORROWED) {
        return Err(SkipReason::Borrowed);
    }
    if method.declaring_type() != ty.name() {
        return Err(SkipReason::Inherited);
    }
    if method.has(MethodFlags::ACCESSOR) {
        return Err(SkipReason::Accessor);
    }
    let name = method.name();
    if name.is_empty()
        || name.starts_with(RESERVED_NAME_PREFIX)
        || name.contains(RESERVED_NAME_CHARS)
    {
        return Err(SkipReason::ReservedName);
    }
    if method.params().iter().any(|p| p.is_variadic()) {
        return Err(SkipReason::Variadic);
    }
    Ok(())
}

/// Collect every dispatchable hook of `ty`.
pub fn collect(ty: &TypeDescriptor) -> Signatures {
    let mut signatures = Signatures::new();

    for method in ty.methods() {
        if let Err(_reason) = check(ty, method) {
            #[cfg(feature = "tracing")]
            tracing::trace!(
                ty = %ty.name(),
                method = %method.name(),
                reason = ?_reason,
                "Skipping method"
            );
            continue;
        }

        let signature = HookSignature::of(method);
        if !signatures.insert(signature, method.clone()) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                ty = %ty.name(),
                signature = %HookSignature::of(method),
                "Hook signature shadowed by an earlier method"
            );
        }
    }

    signatures
}
