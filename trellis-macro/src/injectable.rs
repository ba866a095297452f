use darling::ast::Data;
use darling::util::Ignored;
use darling::{FromDeriveInput, FromField};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, GenericArgument, PathArguments, Type};

#[derive(FromDeriveInput)]
#[darling(supports(struct_named, struct_unit))]
struct InjectableInput {
    ident: syn::Ident,
    generics: syn::Generics,
    data: Data<Ignored, InjectField>,
}

#[derive(FromField)]
#[darling(attributes(inject))]
struct InjectField {
    ident: Option<syn::Ident>,
    ty: Type,
    #[darling(default)]
    default: Option<syn::Expr>,
    #[darling(default)]
    bound: bool,
    #[darling(default)]
    name: Option<String>,
}

/// How a field is obtained from the container.
enum Shape<'a> {
    /// `Arc<dyn Trait>`
    TraitObject(&'a Type),
    /// `Arc<T>`
    Service(&'a Type),
    /// anything else
    Value,
}

pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match InjectableInput::from_derive_input(&input) {
        Ok(parsed) => generate_injectable_impl(&parsed).into(),
        Err(err) => err.write_errors().into(),
    }
}

fn generate_injectable_impl(input: &InjectableInput) -> TokenStream2 {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(fields) => fields.fields.iter().collect::<Vec<_>>(),
        Data::Enum(_) => Vec::new(),
    };

    let parameters = fields.iter().map(|field| parameter_tokens(field));
    let assignments = fields.iter().map(|field| {
        let field_name = &field.ident;
        let fetch = match shape_of(&field.ty) {
            Shape::TraitObject(inner) => quote!(args.service_trait::<#inner>()?),
            Shape::Service(inner) => quote!(args.service::<#inner>()?),
            Shape::Value => {
                let ty = &field.ty;
                quote!(args.value::<#ty>()?)
            }
        };
        quote!(#field_name: #fetch)
    });

    quote! {
        impl #impl_generics ::trellis::di::Injectable for #struct_name #ty_generics #where_clause {
            fn parameters() -> ::std::vec::Vec<::trellis::di::Parameter> {
                ::std::vec![#(#parameters),*]
            }

            #[allow(unused_mut, unused_variables)]
            fn construct(mut args: ::trellis::di::Arguments) -> ::trellis::Result<Self> {
                ::std::result::Result::Ok(Self {
                    #(#assignments),*
                })
            }
        }
    }
}

fn parameter_tokens(field: &InjectField) -> TokenStream2 {
    let name = field
        .name
        .clone()
        .or_else(|| field.ident.as_ref().map(ToString::to_string))
        .unwrap_or_default();

    let (declaration, default_type) = match shape_of(&field.ty) {
        Shape::TraitObject(inner) => (
            quote!(::trellis::di::Parameter::service::<#inner>(#name)),
            field.ty.clone(),
        ),
        Shape::Service(inner) if field.bound => (
            quote!(::trellis::di::Parameter::service::<#inner>(#name)),
            inner.clone(),
        ),
        Shape::Service(inner) => (
            quote!(::trellis::di::Parameter::injectable::<#inner>(#name)),
            inner.clone(),
        ),
        Shape::Value => (
            quote!(::trellis::di::Parameter::value(#name)),
            field.ty.clone(),
        ),
    };

    match &field.default {
        Some(default) => quote!(#declaration.with_default::<#default_type>(#default)),
        None => declaration,
    }
}

/// Classify `Arc<dyn Trait>`, `Arc<T>` and plain value fields.
fn shape_of(ty: &Type) -> Shape<'_> {
    let Type::Path(type_path) = ty else {
        return Shape::Value;
    };
    let Some(segment) = type_path.path.segments.last() else {
        return Shape::Value;
    };
    if segment.ident != "Arc" {
        return Shape::Value;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return Shape::Value;
    };
    match args.args.first() {
        Some(GenericArgument::Type(inner @ Type::TraitObject(_))) => Shape::TraitObject(inner),
        Some(GenericArgument::Type(inner)) => Shape::Service(inner),
        _ => Shape::Value,
    }
}
