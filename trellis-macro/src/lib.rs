use proc_macro::TokenStream;

mod injectable;

/// Derive macro for automatic dependency injection
///
/// Every named field becomes a constructor parameter, in declaration order:
///
/// - `Arc<dyn Trait>` must be bound in the container under `dyn Trait`
/// - `Arc<T>` is resolved from the container, or built from `T`'s own
///   `Injectable` impl when nothing is bound (`#[inject(bound)]` requires a binding)
/// - any other type is a plain value, satisfied by an override or a default
///
/// Field attributes:
///
/// - `#[inject(default = "expr")]`: value used when nothing else satisfies the field
/// - `#[inject(name = "key")]`: parameter name used for overrides (defaults to the field name)
/// - `#[inject(bound)]`: see above
///
/// # Example
/// ```ignore
/// use trellis::Injectable;
/// use std::sync::Arc;
///
/// #[derive(Injectable)]
/// pub struct UserService {
///     repository: Arc<dyn UserRepository>,
///     mailer: Arc<Mailer>,
///     #[inject(default = "25")]
///     page_size: usize,
/// }
/// ```
#[proc_macro_derive(Injectable, attributes(inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable::derive_injectable(input)
}
