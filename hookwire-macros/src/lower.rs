//! Lowering a dispatch program into Rust source.
//!
//! The program becomes a `loop { match __pc { .. } }` state machine with one
//! arm per basic block. Straight-line operations inside a block become
//! statements; the marshalling operations push their results onto a
//! symbolic operand stack that [`Operation::Call`] drains into the argument
//! list of the method call.

use hookwire_core::TypeName;
use hookwire_std::{DispatchProgram, Label, Operation};
use proc_macro2::{Literal, Span, TokenStream};
use quote::{format_ident, quote};
use std::collections::HashMap;
use syn::{Ident, LitByteStr, Type};

/// Lower `program` into the body of `direct_call_hook`.
///
/// `idents` maps method names in the program's hook table to the identifiers
/// to call on `self`.
pub(crate) fn lower(
    program: &DispatchProgram,
    idents: &HashMap<String, Ident>,
) -> syn::Result<TokenStream> {
    let leaders = program.block_leaders();
    let mut arms = Vec::with_capacity(leaders.len());

    for (i, leader) in leaders.iter().enumerate() {
        let start = leader.index();
        let end = leaders.get(i + 1).map_or(program.len(), |next| next.index());
        let body = lower_block(program, idents, start, end)?;
        let state = Literal::usize_unsuffixed(start);
        arms.push(quote! { #state => { #body } });
    }

    Ok(quote! {
        let __name: &[u8] = match name {
            ::core::option::Option::Some(name) => name.as_bytes(),
            ::core::option::Option::None => &[],
        };
        let mut __len = 0usize;
        let mut __pos = 0usize;
        let mut __ch: ::core::option::Option<u8> = ::core::option::Option::None;
        let mut __eq = false;
        let mut __pc = 0usize;
        loop {
            match __pc {
                #(#arms)*
                _ => return ::core::result::Result::Ok(false),
            }
        }
    })
}

fn lower_block(
    program: &DispatchProgram,
    idents: &HashMap<String, Ident>,
    start: usize,
    end: usize,
) -> syn::Result<TokenStream> {
    let mut stmts = Vec::new();
    let mut stack: Vec<TokenStream> = Vec::new();
    let mut values = 0usize;
    let mut falls_through = true;

    for op in &program.ops()[start..end] {
        match op {
            Operation::ClearResult => {
                stmts.push(quote! { *result = ::core::option::Option::None; });
            }
            Operation::BranchIfNameEmpty(target) => {
                stmts.push(branch(quote! { __name.is_empty() }, *target, end));
                falls_through = false;
            }
            Operation::InitCursor => {
                stmts.push(quote! {
                    __len = __name.len();
                    __pos = 0;
                });
            }
            Operation::BranchIfGreaterOrEqual(target) => {
                stmts.push(branch(quote! { __pos >= __len }, *target, end));
                falls_through = false;
            }
            Operation::BranchIfLess(target) => {
                stmts.push(branch(quote! { __pos < __len }, *target, end));
                falls_through = false;
            }
            Operation::LoadInputChar => {
                stmts.push(quote! { __ch = __name.get(__pos).copied(); });
            }
            Operation::CompareEqual(byte) => {
                let byte = Literal::u8_suffixed(*byte);
                stmts.push(quote! { __eq = __ch == ::core::option::Option::Some(#byte); });
            }
            Operation::CompareName(key) => {
                let key = LitByteStr::new(key.as_bytes(), Span::call_site());
                stmts.push(quote! { __eq = __name == #key; });
            }
            Operation::BranchIfNotEqual(target) => {
                stmts.push(branch(quote! { !__eq }, *target, end));
                falls_through = false;
            }
            Operation::Advance => stmts.push(quote! { __pos += 1; }),
            Operation::UnboxArg { index, ty } => {
                let value = format_ident!("__a{}", values);
                values += 1;
                let unboxed = unbox(ty, *index)?;
                stmts.push(quote! { let #value = #unboxed; });
                stack.push(quote! { #value });
            }
            Operation::UnboxToTemp { index, ty, temp } => {
                let temp = format_ident!("__t{}", temp.index());
                let unboxed = unbox(ty, *index)?;
                stmts.push(quote! { let mut #temp = #unboxed; });
            }
            Operation::LoadTempAddress { temp, mutable } => {
                let temp = format_ident!("__t{}", temp.index());
                stack.push(if *mutable {
                    quote! { &mut #temp }
                } else {
                    quote! { &#temp }
                });
            }
            Operation::Call(method) => {
                let (signature, descriptor) = program.hook(*method).ok_or_else(|| {
                    syn::Error::new(Span::call_site(), format!("no hook bound to {method}"))
                })?;
                let ident = idents.get(descriptor.name()).ok_or_else(|| {
                    syn::Error::new(Span::call_site(), format!("no method for hook `{signature}`"))
                })?;
                let call_args = stack.drain(..);
                if descriptor.return_type().is_void() {
                    stmts.push(quote! { self.#ident(#(#call_args),*); });
                } else {
                    stmts.push(quote! { let __ret = self.#ident(#(#call_args),*); });
                }
            }
            Operation::BoxAndStoreIndirect { boxed, .. } => {
                stmts.push(if *boxed {
                    quote! {
                        *result = ::core::option::Option::Some(::hookwire::into_object(__ret));
                    }
                } else {
                    quote! { *result = ::core::option::Option::Some(__ret); }
                });
            }
            Operation::BoxAndStoreElement { index, temp, ty } => {
                let temp = format_ident!("__t{}", temp.index());
                stmts.push(if ty.is_object() {
                    quote! { args[#index] = #temp; }
                } else {
                    quote! { args[#index] = ::hookwire::into_object(#temp); }
                });
            }
            Operation::LoadConst(value) => stack.push(quote! { #value }),
            Operation::Return => {
                let handled = stack.pop().unwrap_or_else(|| quote! { false });
                stmts.push(quote! { return ::core::result::Result::Ok(#handled); });
                falls_through = false;
            }
        }
    }

    if falls_through {
        let next = Literal::usize_unsuffixed(end);
        stmts.push(quote! { __pc = #next; });
    }
    Ok(quote! { #(#stmts)* })
}

/// `__pc = if cond { target } else { fallthrough };`
fn branch(cond: TokenStream, target: Label, fallthrough: usize) -> TokenStream {
    let target = Literal::usize_unsuffixed(target.index());
    let fallthrough = Literal::usize_unsuffixed(fallthrough);
    quote! { __pc = if #cond { #target } else { #fallthrough }; }
}

/// The expression reading argument `index` as `ty`.
///
/// Erased objects are passed through; everything else is unboxed.
fn unbox(ty: &TypeName, index: usize) -> syn::Result<TokenStream> {
    if ty.is_object() {
        return Ok(quote! { ::hookwire::object_at(&*args, #index)? });
    }
    let ty: Type = syn::parse_str(ty.source())?;
    Ok(quote! { ::hookwire::unbox::<#ty>(&*args, #index)? })
}
