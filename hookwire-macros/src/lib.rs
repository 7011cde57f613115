use proc_macro::TokenStream;
use quote::quote;
use syn::{
    Ident, ImplItem, ItemImpl, LitBool, Token,
    parse::{Parse, ParseStream},
    parse_macro_input,
};

mod describe;
mod lower;

use hookwire_core::FrameworkDescriptor;
use hookwire_std::{Generator, GeneratorConfig};

/// Generate a `DirectCallHook` implementation from an inherent `impl` block.
///
/// Every private instance method of the block, and every `pub` method tagged
/// `#[hook]`, becomes reachable by its signature key. The block is emitted
/// unchanged apart from the `#[hook]` tags.
///
/// Methods whose signature borrows beyond the call (`-> &str`,
/// `Option<&T>` parameters) are left out. Arguments are unboxed by clone, so
/// a helper taking a type that is not `Clone + Send + Sync + 'static` has to
/// opt out with `#[hook(skip)]`.
///
/// # Options
///
/// - `collapse = bool`: compare the whole name once when a single candidate
///   remains (default `true`)
/// - `aliases = bool`: let a unique bare name select its only overload
///   (default `true`)
///
/// # Example
///
/// ```rust,ignore
/// #[hookwire::hooks]
/// impl Greeter {
///     fn init(&mut self) { .. }
///     fn on_chat(&mut self, msg: String) -> bool { .. }
/// }
///
/// let mut result = None;
/// greeter.direct_call_hook(Some("on_chat"), &mut result, &mut args)?;
/// ```
#[proc_macro_attribute]
pub fn hooks(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as HooksArgs);
    let mut input = parse_macro_input!(item as ItemImpl);

    match expand(&args, &mut input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Tag a `pub` method as a hook, or with `#[hook(skip)]` keep any method
/// out of the dispatcher.
///
/// Only meaningful inside a `#[hooks]` block, which removes it.
#[proc_macro_attribute]
pub fn hook(_attr: TokenStream, item: TokenStream) -> TokenStream {
    item
}

fn expand(args: &HooksArgs, input: &mut ItemImpl) -> syn::Result<proc_macro2::TokenStream> {
    if let Some((_, path, _)) = &input.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "#[hooks] must be placed on an inherent impl block",
        ));
    }

    let described = describe::describe(input)?;
    let mut ty = described.ty;

    let config = GeneratorConfig::new()
        .collapse_single_paths(args.collapse.unwrap_or(true))
        .bare_name_aliases(args.aliases.unwrap_or(true));
    let generator = Generator::new(&FrameworkDescriptor::standard())
        .map_err(|e| syn::Error::new_spanned(&input.self_ty, e.to_string()))?
        .with_config(config);
    let program = generator
        .generate(&mut ty)
        .map_err(|e| syn::Error::new_spanned(&input.self_ty, e.to_string()))?;

    let body = lower::lower(&program, &described.idents)?;
    let signatures = program.hooks().iter().map(|(sig, _)| sig.as_str());

    strip_hook_attrs(input);
    let self_ty = &input.self_ty;
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        #input

        impl #impl_generics #self_ty #where_clause {
            /// Signature keys reachable through `direct_call_hook`, in discovery order.
            #[allow(dead_code)]
            pub const HOOK_SIGNATURES: &'static [&'static str] = &[#(#signatures),*];
        }

        impl #impl_generics ::hookwire::DirectCallHook for #self_ty #where_clause {
            #[allow(
                unused_assignments,
                unused_mut,
                unused_variables,
                unreachable_code,
                clippy::all
            )]
            fn direct_call_hook(
                &mut self,
                name: ::core::option::Option<&str>,
                result: &mut ::core::option::Option<::hookwire::Object>,
                args: &mut [::hookwire::Object],
            ) -> ::core::result::Result<bool, ::hookwire::MarshalError> {
                #body
            }
        }
    })
}

fn strip_hook_attrs(input: &mut ItemImpl) {
    for item in &mut input.items {
        if let ImplItem::Fn(func) = item {
            func.attrs.retain(|attr| !describe::is_hook_attr(attr));
        }
    }
}

struct HooksArgs {
    collapse: Option<bool>,
    aliases: Option<bool>,
}

impl Parse for HooksArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut collapse = None;
        let mut aliases = None;

        while !input.is_empty() {
            let ident: Ident = input.parse()?;
            input.parse::<Token![=]>()?;

            match ident.to_string().as_str() {
                "collapse" => {
                    let lit: LitBool = input.parse()?;
                    collapse = Some(lit.value);
                }
                "aliases" => {
                    let lit: LitBool = input.parse()?;
                    aliases = Some(lit.value);
                }
                other => {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("unknown attribute: {}", other),
                    ));
                }
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(HooksArgs { collapse, aliases })
    }
}
