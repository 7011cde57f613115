//! # Argument Marshaller
//!
//! Emits the call sequence for one matched hook:
//!
//! 1. unpack each positional argument from the argument array; `Shared` and
//!    `Ref` parameters go through a fresh temporary whose address is passed
//! 2. call the hook on the current instance
//! 3. store a non-void return value through the output slot, boxing it unless
//!    it already is an object
//! 4. box each `Ref` temporary and write it back into its argument slot
//! 5. return "handled"

use crate::{
    collect::MethodId,
    compile::Emitter,
    ops::{Operation, TempId},
};
use hookwire_core::{CompileError, HookSignature, MethodDescriptor, ParamMode, ReturnType, TypeName};
use smallvec::SmallVec;

/// Emit the full call sequence for `method`.
pub(crate) fn emit_call(
    emitter: &mut Emitter,
    id: MethodId,
    signature: &HookSignature,
    method: &MethodDescriptor,
) -> Result<(), CompileError> {
    let store_result = match method.return_type() {
        ReturnType::Void => None,
        ReturnType::Object => Some(Operation::BoxAndStoreIndirect {
            ty: TypeName::object(),
            boxed: false,
        }),
        ReturnType::Value(ty) => Some(Operation::BoxAndStoreIndirect {
            ty: ty.clone(),
            boxed: true,
        }),
        ReturnType::Generic(_) => {
            return Err(CompileError::UnsupportedReturn(signature.to_string()));
        }
    };

    emitter.begin_call();
    let mut write_back: SmallVec<[(usize, TempId, TypeName); 2]> = SmallVec::new();

    for (index, param) in method.params().iter().enumerate() {
        match param.mode() {
            ParamMode::Value => {
                emitter.emit(Operation::UnboxArg {
                    index,
                    ty: param.ty().clone(),
                });
            }
            mode @ (ParamMode::Shared | ParamMode::Ref) => {
                let ty = param.element().storage();
                let temp = emitter.alloc_temp();
                emitter.emit(Operation::UnboxToTemp {
                    index,
                    ty: ty.clone(),
                    temp,
                });
                let mutable = mode == ParamMode::Ref;
                emitter.emit(Operation::LoadTempAddress { temp, mutable });
                if mutable {
                    write_back.push((index, temp, ty));
                }
            }
        }
    }

    emitter.emit(Operation::Call(id));
    if let Some(store) = store_result {
        emitter.emit(store);
    }
    for (index, temp, ty) in write_back {
        emitter.emit(Operation::BoxAndStoreElement { index, temp, ty });
    }
    emitter.emit(Operation::LoadConst(true));
    emitter.emit(Operation::Return);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookwire_core::Parameter;

    fn emit(method: &MethodDescriptor) -> Result<Emitter, CompileError> {
        let mut emitter = Emitter::new();
        emit_call(
            &mut emitter,
            MethodId::new(3),
            &HookSignature::of(method),
            method,
        )?;
        Ok(emitter)
    }

    #[test]
    fn test_void_no_params() {
        let emitter = emit(&MethodDescriptor::new("Init", "P")).unwrap();
        assert_eq!(
            emitter.ops(),
            [
                Operation::Call(MethodId::new(3)),
                Operation::LoadConst(true),
                Operation::Return,
            ]
        );
    }

    #[test]
    fn test_by_value_and_boxed_return() {
        let m = MethodDescriptor::new("Add", "P")
            .param(Parameter::value("a", "i32"))
            .param(Parameter::value("b", "i32"))
            .returns(ReturnType::Value("i32".into()));
        let emitter = emit(&m).unwrap();
        assert_eq!(
            emitter.ops(),
            [
                Operation::UnboxArg { index: 0, ty: "i32".into() },
                Operation::UnboxArg { index: 1, ty: "i32".into() },
                Operation::Call(MethodId::new(3)),
                Operation::BoxAndStoreIndirect { ty: "i32".into(), boxed: true },
                Operation::LoadConst(true),
                Operation::Return,
            ]
        );
    }

    #[test]
    fn test_object_return_is_not_boxed() {
        let m = MethodDescriptor::new("Get", "P").returns(ReturnType::Object);
        let emitter = emit(&m).unwrap();
        assert!(emitter.ops().contains(&Operation::BoxAndStoreIndirect {
            ty: TypeName::object(),
            boxed: false
        }));
    }

    #[test]
    fn test_by_ref_written_back_after_call() {
        let m = MethodDescriptor::new("Bump", "P")
            .param(Parameter::shared("label", "str"))
            .param(Parameter::by_ref("count", "i32"));
        let emitter = emit(&m).unwrap();
        let t0 = TempId::new(0);
        let t1 = TempId::new(1);
        assert_eq!(
            emitter.ops(),
            [
                Operation::UnboxToTemp { index: 0, ty: "String".into(), temp: t0 },
                Operation::LoadTempAddress { temp: t0, mutable: false },
                Operation::UnboxToTemp { index: 1, ty: "i32".into(), temp: t1 },
                Operation::LoadTempAddress { temp: t1, mutable: true },
                Operation::Call(MethodId::new(3)),
                Operation::BoxAndStoreElement { index: 1, temp: t1, ty: "i32".into() },
                Operation::LoadConst(true),
                Operation::Return,
            ]
        );
        assert_eq!(emitter.temp_count(), 2);
    }

    #[test]
    fn test_generic_return_rejected() {
        let m = MethodDescriptor::new("Make", "P").returns(ReturnType::Generic("T".into()));
        assert!(matches!(emit(&m), Err(CompileError::UnsupportedReturn(_))));
    }
}
