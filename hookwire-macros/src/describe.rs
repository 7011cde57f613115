//! Method tables from `impl` blocks.
//!
//! Turns the methods of an inherent `impl` block into [`MethodDescriptor`]s so
//! the generator sees the same method table it would get from a loaded type.

use hookwire_core::{MethodDescriptor, MethodFlags, Parameter, ReturnType, TypeDescriptor, TypeName};
use proc_macro2::{TokenStream, TokenTree};
use quote::ToTokens;
use std::collections::HashMap;
use syn::{
    Attribute, FnArg, GenericParam, Ident, ImplItem, ItemImpl, Meta, Pat, Type, Visibility,
    ext::IdentExt,
};

/// Whether `attr` is the hook tag (`#[hook]`, `#[hookwire::hook]`).
pub(crate) fn is_hook_attr(attr: &Attribute) -> bool {
    attr.path()
        .segments
        .last()
        .is_some_and(|segment| segment.ident == "hook")
}

/// How a `#[hook]` tag marks its method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HookTag {
    /// `#[hook]`
    Hook,
    /// `#[hook(skip)]`
    Skip,
}

fn hook_tag(attrs: &[Attribute]) -> syn::Result<Option<HookTag>> {
    let mut tag = None;
    for attr in attrs.iter().filter(|attr| is_hook_attr(attr)) {
        let this = match &attr.meta {
            Meta::Path(_) => HookTag::Hook,
            Meta::List(list) => {
                let arg: Ident = list.parse_args()?;
                if arg != "skip" {
                    return Err(syn::Error::new(
                        arg.span(),
                        format!("unknown hook option: {}", arg),
                    ));
                }
                HookTag::Skip
            }
            Meta::NameValue(nv) => {
                return Err(syn::Error::new_spanned(
                    nv,
                    "expected `#[hook]` or `#[hook(skip)]`",
                ));
            }
        };
        if tag != Some(HookTag::Skip) {
            tag = Some(this);
        }
    }
    Ok(tag)
}

/// The method table of an `impl` block, plus the Rust name of each method.
pub(crate) struct Described {
    pub ty: TypeDescriptor,
    /// Method name in the table -> identifier to call.
    pub idents: HashMap<String, Ident>,
}

/// Describe every method of `item`.
///
/// Methods that cannot be called through a borrowed receiver (no receiver,
/// `self` by value, `async`, `unsafe`) are marked static so they never become
/// hooks. Signatures holding borrows beyond the call are marked
/// [`MethodFlags::BORROWED`]. Methods tagged `#[hook(skip)]` are left out of
/// the table.
pub(crate) fn describe(item: &ItemImpl) -> syn::Result<Described> {
    let type_name = render(&item.self_ty);
    let impl_generics: Vec<String> = item
        .generics
        .params
        .iter()
        .filter_map(|param| match param {
            GenericParam::Type(t) => Some(t.ident.to_string()),
            _ => None,
        })
        .collect();

    let mut ty = TypeDescriptor::new(type_name.clone());
    let mut idents = HashMap::new();

    for impl_item in &item.items {
        let ImplItem::Fn(func) = impl_item else {
            continue;
        };
        let tag = hook_tag(&func.attrs)?;
        if tag == Some(HookTag::Skip) {
            continue;
        }
        let sig = &func.sig;
        let name = sig.ident.unraw().to_string();

        let mut flags = MethodFlags::empty();
        if matches!(func.vis, Visibility::Public(_)) {
            flags |= MethodFlags::PUBLIC;
        }
        if tag == Some(HookTag::Hook) {
            flags |= MethodFlags::HOOK;
        }
        // `&self` and `self: &Self` alike.
        let borrowed_receiver = sig
            .receiver()
            .is_some_and(|receiver| matches!(*receiver.ty, Type::Reference(_)));
        if !borrowed_receiver || sig.asyncness.is_some() || sig.unsafety.is_some() {
            flags |= MethodFlags::STATIC;
        }

        let mut generic_params = sig
            .generics
            .params
            .iter()
            .filter(|param| !matches!(param, GenericParam::Lifetime(_)))
            .count();

        let mut method = MethodDescriptor::new(name.clone(), type_name.clone());
        for (index, input) in sig.inputs.iter().enumerate() {
            let FnArg::Typed(pat_type) = input else {
                continue;
            };
            if matches!(*pat_type.ty, Type::ImplTrait(_)) {
                generic_params += 1;
            }
            let param_name = match &*pat_type.pat {
                Pat::Ident(pat) => pat.ident.unraw().to_string(),
                _ => format!("arg{index}"),
            };
            let elem = match &*pat_type.ty {
                Type::Reference(reference) => &reference.elem,
                ty => ty,
            };
            if borrows(elem.to_token_stream()) {
                flags |= MethodFlags::BORROWED;
            }
            method = method.param(parameter(param_name, &pat_type.ty));
        }

        let ret = match &sig.output {
            syn::ReturnType::Default => ReturnType::Void,
            syn::ReturnType::Type(_, ret) => {
                if borrows(ret.to_token_stream()) {
                    flags |= MethodFlags::BORROWED;
                }
                classify_return(ret, &impl_generics)
            }
        };

        ty.add_method(
            method
                .returns(ret)
                .flags(flags)
                .generic_params(generic_params),
        );
        idents.entry(name).or_insert_with(|| sig.ident.clone());
    }

    Ok(Described { ty, idents })
}

/// Whether a type mentions a reference or lifetime other than `'static`.
fn borrows(tokens: TokenStream) -> bool {
    let mut tokens = tokens.into_iter().peekable();
    while let Some(token) = tokens.next() {
        match token {
            TokenTree::Group(group) => {
                if borrows(group.stream()) {
                    return true;
                }
            }
            TokenTree::Punct(punct) if punct.as_char() == '&' => {
                // `&'a T` is decided by its lifetime.
                let lifetime = matches!(
                    tokens.peek(),
                    Some(TokenTree::Punct(next)) if next.as_char() == '\''
                );
                if !lifetime {
                    return true;
                }
            }
            TokenTree::Punct(punct) if punct.as_char() == '\'' => match tokens.next() {
                Some(TokenTree::Ident(ident)) if ident == "static" => {}
                _ => return true,
            },
            _ => {}
        }
    }
    false
}

fn parameter(name: String, ty: &Type) -> Parameter {
    let param = match ty {
        Type::Reference(reference) if reference.mutability.is_some() => {
            Parameter::by_ref(name, TypeName::new(render(&reference.elem)))
        }
        Type::Reference(reference) => {
            Parameter::shared(name, TypeName::new(render(&reference.elem)))
        }
        _ => Parameter::value(name, TypeName::new(render(ty))),
    };

    let element = param.element().canonical();
    if element == "[Object]" || element == "Vec[Object]" || element.ends_with("::Object]") {
        param.variadic()
    } else {
        param
    }
}

fn classify_return(ty: &Type, impl_generics: &[String]) -> ReturnType {
    match ty {
        Type::ImplTrait(_) => ReturnType::Generic(render(ty)),
        Type::Path(path)
            if path.qself.is_none()
                && path
                    .path
                    .get_ident()
                    .is_some_and(|ident| impl_generics.iter().any(|g| ident == g)) =>
        {
            ReturnType::Generic(render(ty))
        }
        _ => ReturnType::from_type(TypeName::new(render(ty))),
    }
}

fn render(tokens: &impl ToTokens) -> String {
    tokens.to_token_stream().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookwire_core::ParamMode;

    fn describe_str(src: &str) -> Described {
        describe(&syn::parse_str::<ItemImpl>(src).unwrap()).unwrap()
    }

    #[test]
    fn test_receivers_and_visibility() {
        let d = describe_str(
            "impl Plugin {
                fn a(&self) {}
                fn b(&mut self) {}
                fn c() {}
                fn d(self) {}
                pub fn e(&self) {}
                #[hook] pub fn f(&self) {}
                async fn g(&self) {}
            }",
        );
        let flags: Vec<MethodFlags> = d.ty.methods().iter().map(|m| m.method_flags()).collect();
        assert_eq!(flags[0], MethodFlags::empty());
        assert_eq!(flags[1], MethodFlags::empty());
        assert!(flags[2].contains(MethodFlags::STATIC));
        assert!(flags[3].contains(MethodFlags::STATIC));
        assert_eq!(flags[4], MethodFlags::PUBLIC);
        assert_eq!(flags[5], MethodFlags::PUBLIC | MethodFlags::HOOK);
        assert!(flags[6].contains(MethodFlags::STATIC));
        assert_eq!(d.ty.name(), "Plugin");
    }

    #[test]
    fn test_parameter_modes() {
        let d = describe_str(
            "impl P { fn on(&mut self, a: i32, b: &str, c: &mut Vec<u8>, _: (u8, u8)) -> bool { true } }",
        );
        let m = &d.ty.methods()[0];
        let modes: Vec<ParamMode> = m.params().iter().map(|p| p.mode()).collect();
        assert_eq!(
            modes,
            [ParamMode::Value, ParamMode::Shared, ParamMode::Ref, ParamMode::Value]
        );
        assert_eq!(m.params()[1].element().storage().canonical(), "String");
        assert_eq!(m.params()[3].name(), "arg4");
        assert_eq!(m.return_type(), &ReturnType::Value("bool".into()));
    }

    #[test]
    fn test_generic_shapes() {
        let d = describe_str(
            "impl<T> P<T> {
                fn a<U>(&self, u: U) {}
                fn b(&self, x: impl Into<u8>) {}
                fn c(&self) -> T { todo!() }
                fn d(&self) -> impl Fn() { || {} }
                fn e<'a>(&self, s: &'a str) {}
            }",
        );
        let methods = d.ty.methods();
        assert_eq!(methods[0].generic_param_count(), 1);
        assert_eq!(methods[1].generic_param_count(), 1);
        assert!(matches!(methods[2].return_type(), ReturnType::Generic(_)));
        assert!(matches!(methods[3].return_type(), ReturnType::Generic(_)));
        assert_eq!(methods[4].generic_param_count(), 0);
    }

    #[test]
    fn test_variadic_and_object() {
        let d = describe_str(
            "impl P {
                fn any(&self, rest: &[Object]) {}
                fn get(&self) -> hookwire::Object { todo!() }
            }",
        );
        let methods = d.ty.methods();
        assert!(methods[0].params()[0].is_variadic());
        assert_eq!(methods[1].return_type(), &ReturnType::Object);
    }

    #[test]
    fn test_raw_identifiers() {
        let d = describe_str("impl P { fn r#match(&self) {} }");
        assert_eq!(d.ty.methods()[0].name(), "match");
        assert_eq!(d.idents["match"].to_string(), "r#match");
    }

    #[test]
    fn test_typed_receivers() {
        let d = describe_str(
            "impl P {
                fn a(self: &Self) {}
                fn b(self: &mut Self) {}
                fn c(self: Box<Self>) {}
            }",
        );
        let flags: Vec<MethodFlags> = d.ty.methods().iter().map(|m| m.method_flags()).collect();
        assert_eq!(flags[0], MethodFlags::empty());
        assert_eq!(flags[1], MethodFlags::empty());
        assert!(flags[2].contains(MethodFlags::STATIC));
    }

    #[test]
    fn test_borrowed_signatures() {
        let d = describe_str(
            "impl P {
                fn name_ref(&self) -> &str { todo!() }
                fn tagged<'a>(&'a self) -> Option<&'a str> { todo!() }
                fn label(&self) -> &'static str { \"p\" }
                fn take(&mut self, s: &str, v: &mut Vec<u8>) {}
                fn nested(&mut self, s: Option<&str>) {}
                fn cow(&mut self, s: std::borrow::Cow<'_, str>) {}
            }",
        );
        let borrowed: Vec<bool> = d
            .ty
            .methods()
            .iter()
            .map(|m| m.has(MethodFlags::BORROWED))
            .collect();
        assert_eq!(borrowed, [true, true, false, false, true, true]);
    }

    #[test]
    fn test_skip_tag() {
        let d = describe_str(
            "impl P {
                #[hook(skip)] fn accept(&mut self, c: Conn) {}
                #[hook] pub fn open(&self) {}
            }",
        );
        let names: Vec<&str> = d.ty.methods().iter().map(|m| m.name()).collect();
        assert_eq!(names, ["open"]);
        assert!(!d.idents.contains_key("accept"));

        let bad = syn::parse_str::<ItemImpl>("impl P { #[hook(later)] fn a(&self) {} }").unwrap();
        assert!(describe(&bad).is_err());
    }
}
