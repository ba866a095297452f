use crate::di::{Concrete, Container, Injectable, Lifecycle};
use std::sync::Arc;

/// Builder for constructing a dependency injection container
///
/// Use this to configure and register services before sharing the final container.
///
/// # Example
/// ```
/// use trellis::di::{Concrete, ContainerBuilder};
///
/// let container = ContainerBuilder::new()
///     .instance("app.name", String::from("demo"))
///     .singleton("greeting", Concrete::value("hello"))
///     .build();
///
/// assert!(container.has("greeting"));
/// ```
pub struct ContainerBuilder {
    container: Container,
}

impl ContainerBuilder {
    /// Create a new container builder
    pub fn new() -> Self {
        Self {
            container: Container::new(),
        }
    }

    /// Bind an identifier with a transient lifecycle
    pub fn bind(mut self, identifier: impl Into<String>, concrete: Concrete) -> Self {
        self.container.bind(identifier, concrete);
        self
    }

    /// Bind an identifier with a singleton lifecycle
    pub fn singleton(mut self, identifier: impl Into<String>, concrete: Concrete) -> Self {
        self.container.singleton(identifier, concrete);
        self
    }

    /// Register a ready-made value
    pub fn instance<T: Send + Sync + 'static>(
        mut self,
        identifier: impl Into<String>,
        value: T,
    ) -> Self {
        self.container.instance(identifier, value);
        self
    }

    /// Register a ready-made value under its own type name
    pub fn register<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.container.instance_of(value);
        self
    }

    /// Register `T` to be built from its constructor
    pub fn provide<T: Injectable>(mut self, lifecycle: Lifecycle) -> Self {
        match lifecycle {
            Lifecycle::Transient => self.container.bind_type::<T>(),
            Lifecycle::Singleton => self.container.singleton_type::<T>(),
        };
        self
    }

    /// Bind a trait to a concrete implementation
    ///
    /// This enables resolving `Arc<dyn Trait>` to the registered implementation.
    pub fn bind_trait<Trait, Impl, F>(mut self, caster: F, lifecycle: Lifecycle) -> Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        Impl: Injectable,
        F: Fn(Arc<Impl>) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.container.bind_trait::<Trait, Impl, F>(caster, lifecycle);
        self
    }

    /// Build the container
    pub fn build(self) -> Container {
        self.container
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
