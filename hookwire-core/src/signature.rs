//! Hook signature keys.

use crate::descriptor::MethodDescriptor;
use std::{borrow::Borrow, fmt};

/// The key identifying one hook among overloads.
///
/// A method without parameters is keyed by its bare name. A method with
/// parameters is keyed as `name(T1, T2)` using the canonical rendering of
/// each declared parameter type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookSignature(String);

impl HookSignature {
    /// Build the key for a method.
    pub fn of(method: &MethodDescriptor) -> Self {
        let params = method.params();
        if params.is_empty() {
            return Self(method.name().to_string());
        }

        let mut key = String::with_capacity(method.name().len() + params.len() * 8);
        key.push_str(method.name());
        key.push('(');
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                key.push_str(", ");
            }
            key.push_str(param.ty().canonical());
        }
        key.push(')');
        Self(key)
    }

    /// The key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The method name part of the key.
    pub fn bare_name(&self) -> &str {
        match self.0.find('(') {
            Some(open) => &self.0[..open],
            None => &self.0,
        }
    }

    /// Whether the key carries a parameter list.
    pub fn has_params(&self) -> bool {
        self.0.len() != self.bare_name().len()
    }
}

impl Borrow<str> for HookSignature {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HookSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
