use darling::{ast, FromDeriveInput, FromField, FromVariant};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, parse_quote, DeriveInput};

#[derive(Debug, FromDeriveInput)]
#[darling(attributes(vdl), supports(struct_named, enum_unit, enum_newtype))]
struct VdlArgs {
    ident: syn::Ident,
    generics: syn::Generics,
    data: ast::Data<VdlVariant, VdlField>,
    /// VDL type name; defaults to the Rust module path and identifier.
    #[darling(default)]
    name: Option<String>,
}

#[derive(Debug, FromField)]
#[darling(attributes(vdl))]
struct VdlField {
    ident: Option<syn::Ident>,
    ty: syn::Type,
    #[darling(default)]
    name: Option<String>,
    #[darling(default)]
    skip: bool,
}

#[derive(Debug, FromVariant)]
#[darling(attributes(vdl))]
struct VdlVariant {
    ident: syn::Ident,
    fields: ast::Fields<VdlField>,
    #[darling(default)]
    name: Option<String>,
}

/// Implements `vom::VdlType`.
///
/// Structs with named fields become named VDL structs, enums of unit
/// variants named VDL enums, and enums whose variants each hold one value
/// named VDL unions. Field, label and union field names default to the Rust
/// identifiers; `#[vdl(name = "...")]` overrides them and `#[vdl(skip)]`
/// leaves a struct field out of the VDL type (it is rebuilt with `Default`).
#[proc_macro_derive(Vdl, attributes(vdl))]
pub fn derive_vdl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let args = match VdlArgs::from_derive_input(&input) {
        Ok(v) => v,
        Err(e) => return TokenStream::from(e.write_errors()),
    };
    match expand(args) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand(args: VdlArgs) -> syn::Result<TokenStream2> {
    let ident = &args.ident;
    let name = match &args.name {
        Some(n) => quote!(#n),
        None => quote!(concat!(module_path!(), ".", stringify!(#ident))),
    };

    let (build, to_value, from_value) = match &args.data {
        ast::Data::Struct(fields) => expand_struct(&name, &fields.fields),
        ast::Data::Enum(variants) if variants.iter().all(|v| v.fields.is_unit()) => expand_enum(&name, variants),
        ast::Data::Enum(variants) if variants.iter().all(|v| v.fields.is_newtype()) => {
            expand_union(&name, variants)
        }
        ast::Data::Enum(_) => {
            return Err(syn::Error::new(
                ident.span(),
                "Vdl enums must have only unit variants or only single-field variants",
            ));
        }
    };

    // A static in a generic impl would be shared by every instantiation.
    let vdl_type = if args.generics.params.is_empty() {
        quote! {
            static CACHE: ::std::sync::OnceLock<::vom::Type> = ::std::sync::OnceLock::new();
            if let Some(t) = CACHE.get() {
                return Ok(*t);
            }
            let t: ::vom::Type = { #build };
            Ok(*CACHE.get_or_init(|| t))
        }
    } else {
        quote!(Ok({ #build }))
    };

    let mut generics = args.generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(parse_quote!(::vom::VdlType));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::vom::VdlType for #ident #ty_generics #where_clause {
            fn vdl_type() -> ::vom::Result<::vom::Type> {
                #vdl_type
            }

            fn to_value(&self) -> ::vom::Result<::vom::Value> {
                let ty = <Self as ::vom::VdlType>::vdl_type()?;
                #to_value
            }

            fn from_value(v: &::vom::Value) -> ::vom::Result<Self> {
                let ty = <Self as ::vom::VdlType>::vdl_type()?;
                let v = ::vom::conform(v, ty)?;
                #from_value
            }
        }
    })
}

fn expand_struct(name: &TokenStream2, fields: &[VdlField]) -> (TokenStream2, TokenStream2, TokenStream2) {
    let kept: Vec<&VdlField> = fields.iter().filter(|f| !f.skip).collect();
    let skipped: Vec<&syn::Ident> = fields.iter().filter(|f| f.skip).filter_map(|f| f.ident.as_ref()).collect();
    let idents: Vec<&syn::Ident> = kept.iter().filter_map(|f| f.ident.as_ref()).collect();
    let tys: Vec<&syn::Type> = kept.iter().map(|f| &f.ty).collect();
    let names: Vec<String> = kept
        .iter()
        .map(|f| match (&f.name, &f.ident) {
            (Some(n), _) => n.clone(),
            (None, Some(i)) => i.to_string(),
            (None, None) => String::new(),
        })
        .collect();
    let indices = 0..kept.len();

    let build = quote! {
        ::vom::Type::struct_of(#name, &[#((#names, <#tys as ::vom::VdlType>::vdl_type()?)),*])?
    };
    let to_value = quote! {
        ::vom::Value::struct_of(ty, vec![#(::vom::VdlType::to_value(&self.#idents)?),*])
    };
    let from_value = quote! {
        Ok(Self {
            #(#idents: <#tys as ::vom::VdlType>::from_value(v.struct_field(#indices)?)?,)*
            #(#skipped: ::core::default::Default::default(),)*
        })
    };
    (build, to_value, from_value)
}

fn variant_name(v: &VdlVariant) -> String {
    v.name.clone().unwrap_or_else(|| v.ident.to_string())
}

fn expand_enum(name: &TokenStream2, variants: &[VdlVariant]) -> (TokenStream2, TokenStream2, TokenStream2) {
    let idents: Vec<&syn::Ident> = variants.iter().map(|v| &v.ident).collect();
    let labels: Vec<String> = variants.iter().map(variant_name).collect();
    let indices: Vec<usize> = (0..variants.len()).collect();

    let build = quote! {
        ::vom::Type::enum_of(#name, &[#(#labels),*])?
    };
    let to_value = quote! {
        let index = match self {
            #(Self::#idents => #indices,)*
        };
        ::vom::Value::enum_index(ty, index)
    };
    let from_value = quote! {
        match v.label_index() {
            #(Some(#indices) => Ok(Self::#idents),)*
            _ => Err(::vom::Error::InvalidValue(format!("{} is not a label of {}", v, ty))),
        }
    };
    (build, to_value, from_value)
}

fn expand_union(name: &TokenStream2, variants: &[VdlVariant]) -> (TokenStream2, TokenStream2, TokenStream2) {
    let idents: Vec<&syn::Ident> = variants.iter().map(|v| &v.ident).collect();
    let names: Vec<String> = variants.iter().map(variant_name).collect();
    let tys: Vec<&syn::Type> = variants.iter().filter_map(|v| v.fields.fields.first()).map(|f| &f.ty).collect();
    let indices: Vec<usize> = (0..variants.len()).collect();
    let len = variants.len();

    let build = quote! {
        ::vom::Type::union_of(#name, &[#((#names, <#tys as ::vom::VdlType>::vdl_type()?)),*])?
    };
    let to_value = quote! {
        match self {
            #(Self::#idents(x) => ::vom::Value::union_of(ty, #indices, ::vom::VdlType::to_value(x)?),)*
        }
    };
    let from_value = quote! {
        match v.union_field() {
            #(Some((#indices, x)) => Ok(Self::#idents(<#tys as ::vom::VdlType>::from_value(x)?)),)*
            Some((index, _)) => Err(::vom::Error::IndexOutOfRange { index: index as u64, len: #len, ty: ty.to_string() }),
            None => Err(::vom::Error::InvalidValue(format!("{} is not a union value", v))),
        }
    };
    (build, to_value, from_value)
}
