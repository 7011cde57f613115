//! Erased values passed through the dispatch contract.
//!
//! Arguments and results travel as [`Object`]s. Unboxing downcasts to the
//! parameter's concrete type and clones the value out, so the argument array
//! keeps its contents for the caller; boxing wraps a value in a new `Arc`.

use crate::error::MarshalError;
use std::{any::Any, sync::Arc};

/// A boxed, type-erased value.
pub type Object = Arc<dyn Any + Send + Sync>;

/// Box a value.
pub fn into_object<T: Any + Send + Sync>(value: T) -> Object {
    Arc::new(value)
}

/// Borrow the argument at `index` as a `T`.
pub fn unbox_ref<T: Any>(args: &[Object], index: usize) -> Result<&T, MarshalError> {
    let object = args.get(index).ok_or(MarshalError::MissingArgument {
        index,
        len: args.len(),
    })?;
    (**object)
        .downcast_ref::<T>()
        .ok_or(MarshalError::ArgumentType {
            index,
            expected: std::any::type_name::<T>(),
        })
}

/// Unbox a copy of the argument at `index`.
pub fn unbox<T: Any + Clone>(args: &[Object], index: usize) -> Result<T, MarshalError> {
    unbox_ref::<T>(args, index).cloned()
}

/// The argument at `index` as it is, for parameters of the erased type.
pub fn object_at(args: &[Object], index: usize) -> Result<Object, MarshalError> {
    args.get(index).cloned().ok_or(MarshalError::MissingArgument {
        index,
        len: args.len(),
    })
}

/// Downcast a result object.
pub fn downcast<T: Any>(object: &Object) -> Option<&T> {
    (**object).downcast_ref::<T>()
}
