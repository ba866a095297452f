use crate::error::{Result, TrellisError};
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A type-erased resolved service.
///
/// The erased `Arc` holds the value directly. Trait-object services are stored
/// as an `Arc<dyn Trait>` value inside it.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// The identifier a typed service is registered and resolved under.
pub fn identifier_of<T: ?Sized + 'static>() -> &'static str {
    std::any::type_name::<T>()
}

/// Trait for types the container can build from their declared parameters
///
/// This trait is typically implemented automatically via the `#[derive(Injectable)]` macro.
///
/// # Example
/// ```
/// use trellis::di::{Arguments, Parameter};
/// use trellis::{Injectable, Result};
/// use std::sync::Arc;
///
/// struct Transport;
///
/// impl Injectable for Transport {
///     fn construct(_args: Arguments) -> Result<Self> {
///         Ok(Transport)
///     }
/// }
///
/// struct Mailer {
///     transport: Arc<Transport>,
///     sender: String,
/// }
///
/// impl Injectable for Mailer {
///     fn parameters() -> Vec<Parameter> {
///         vec![
///             Parameter::injectable::<Transport>("transport"),
///             Parameter::value("sender").with_default(String::from("noreply@localhost")),
///         ]
///     }
///
///     fn construct(mut args: Arguments) -> Result<Self> {
///         Ok(Self {
///             transport: args.service()?,
///             sender: args.value()?,
///         })
///     }
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// The constructor parameter list, in declared order.
    fn parameters() -> Vec<Parameter> {
        Vec::new()
    }

    /// Build the value from arguments resolved in the order of [`Injectable::parameters`].
    ///
    /// # Errors
    /// Returns an error if an argument has an unexpected type or the value cannot be built.
    fn construct(args: Arguments) -> Result<Self>;
}

/// Object-safe constructor, stored in the registry for class bindings.
pub trait Constructor: Send + Sync + 'static {
    fn type_name(&self) -> &'static str;

    fn parameters(&self) -> Vec<Parameter>;

    fn construct(&self, args: Arguments) -> Result<Instance>;
}

/// [`Constructor`] for any [`Injectable`] type.
pub struct Class<T>(PhantomData<fn() -> T>);

impl<T: Injectable> Class<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }

    pub fn shared() -> Arc<dyn Constructor> {
        Arc::new(Self::new())
    }
}

impl<T: Injectable> Default for Class<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Injectable> Constructor for Class<T> {
    fn type_name(&self) -> &'static str {
        identifier_of::<T>()
    }

    fn parameters(&self) -> Vec<Parameter> {
        T::parameters()
    }

    fn construct(&self, args: Arguments) -> Result<Instance> {
        Ok(Arc::new(T::construct(args)?))
    }
}

/// The declared type of a service parameter.
#[derive(Clone)]
pub struct Declared {
    pub identifier: String,
    /// Used to build the type when nothing is bound under `identifier`.
    pub constructor: Option<Arc<dyn Constructor>>,
}

/// One constructor parameter, as seen by the resolver.
#[derive(Clone)]
pub struct Parameter {
    name: String,
    declared: Option<Declared>,
    default: Option<Instance>,
}

impl Parameter {
    /// A parameter whose type must be bound in the container (works for `dyn Trait`).
    pub fn service<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::service_id(name, identifier_of::<T>())
    }

    /// A parameter declared by identifier rather than by type.
    pub fn service_id(name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared: Some(Declared {
                identifier: identifier.into(),
                constructor: None,
            }),
            default: None,
        }
    }

    /// A parameter of a concrete type that is built on demand when it is not bound.
    pub fn injectable<T: Injectable>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared: Some(Declared {
                identifier: identifier_of::<T>().to_string(),
                constructor: Some(Class::<T>::shared()),
            }),
            default: None,
        }
    }

    /// A built-in parameter: satisfied only by an override or a default.
    pub fn value(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared: None,
            default: None,
        }
    }

    /// Default used when nothing else satisfies the parameter.
    ///
    /// For service parameters the default is the service value itself (`T`, or
    /// `Arc<dyn Trait>` for trait objects).
    pub fn with_default<V: Send + Sync + 'static>(mut self, value: V) -> Self {
        self.default = Some(Arc::new(value));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared(&self) -> Option<&Declared> {
        self.declared.as_ref()
    }

    pub fn default_value(&self) -> Option<&Instance> {
        self.default.as_ref()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("declared", &self.declared.as_ref().map(|d| &d.identifier))
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// Resolved constructor arguments, consumed in declared order.
pub struct Arguments {
    owner: String,
    values: VecDeque<(String, Instance)>,
}

impl Arguments {
    pub fn new(owner: impl Into<String>, values: Vec<(String, Instance)>) -> Self {
        Self {
            owner: owner.into(),
            values: values.into(),
        }
    }

    /// The identifier being constructed.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Take the next argument as a concrete service.
    pub fn service<T: Send + Sync + 'static>(&mut self) -> Result<Arc<T>> {
        let (name, value) = self.next_value::<T>()?;
        value
            .downcast::<T>()
            .map_err(|_| self.mismatch(&name, identifier_of::<T>()))
    }

    /// Take the next argument as a trait-object service.
    pub fn service_trait<T: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<T>> {
        let (name, value) = self.next_value::<T>()?;
        value
            .downcast::<Arc<T>>()
            .map(|wrapper| wrapper.as_ref().clone())
            .map_err(|_| self.mismatch(&name, identifier_of::<T>()))
    }

    /// Take the next argument as a plain value.
    pub fn value<V: Clone + Send + Sync + 'static>(&mut self) -> Result<V> {
        let (name, value) = self.next_value::<V>()?;
        value
            .downcast_ref::<V>()
            .cloned()
            .ok_or_else(|| self.mismatch(&name, identifier_of::<V>()))
    }

    fn next_value<T: ?Sized + 'static>(&mut self) -> Result<(String, Instance)> {
        self.values.pop_front().ok_or_else(|| {
            TrellisError::construction(
                &self.owner,
                format!("missing argument for `{}`", identifier_of::<T>()),
            )
        })
    }

    fn mismatch(&self, name: &str, expected: &str) -> TrellisError {
        TrellisError::construction(
            &self.owner,
            format!("argument `{name}` is not a `{expected}`"),
        )
    }
}
