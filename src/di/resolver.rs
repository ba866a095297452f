use crate::di::container::{Binding, Concrete, Container, Lifecycle};
use crate::di::injectable::{Arguments, Class, Constructor, Instance, Parameter, identifier_of};
use crate::di::Injectable;
use crate::error::{Result, TrellisError};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

/// Named constructor arguments that take precedence over everything else.
///
/// Overrides apply to the parameters of the requested target only, never to its
/// nested dependencies.
#[derive(Clone, Default)]
pub struct Overrides {
    values: HashMap<String, Instance>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<V: Send + Sync + 'static>(mut self, name: impl Into<String>, value: V) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert<V: Send + Sync + 'static>(&mut self, name: impl Into<String>, value: V) {
        self.values.insert(name.into(), Arc::new(value));
    }

    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A single resolution pass over a [`Container`].
///
/// The resolver carries the stack of identifiers currently being built, so a
/// dependency that re-enters one of them fails with
/// [`TrellisError::CyclicDependency`] instead of recursing forever. Factories
/// receive the resolver so their own lookups join the same pass.
pub struct Resolver<'a> {
    container: &'a Container,
    stack: RefCell<Vec<String>>,
}

impl<'a> Resolver<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self {
            container,
            stack: RefCell::new(Vec::new()),
        }
    }

    /// Identifiers currently being resolved, outermost first.
    pub fn chain(&self) -> Vec<String> {
        self.stack.borrow().clone()
    }

    pub fn resolve_id(&self, identifier: &str) -> Result<Instance> {
        self.resolve_entry(identifier, &Overrides::default(), None)
    }

    pub fn resolve_with(&self, identifier: &str, overrides: &Overrides) -> Result<Instance> {
        self.resolve_entry(identifier, overrides, None)
    }

    /// Resolve `T`, building it from its own constructor when nothing is bound.
    pub fn resolve<T: Injectable>(&self) -> Result<Arc<T>> {
        self.resolve_type_with(&Overrides::default())
    }

    pub fn resolve_type_with<T: Injectable>(&self, overrides: &Overrides) -> Result<Arc<T>> {
        let constructor = Class::<T>::shared();
        let instance = self.resolve_entry(identifier_of::<T>(), overrides, Some(&constructor))?;
        downcast::<T>(instance)
    }

    /// Resolve `T` from an explicit binding or instance only.
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        downcast::<T>(self.resolve_id(identifier_of::<T>())?)
    }

    pub fn resolve_trait<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        downcast_trait::<T>(self.resolve_id(identifier_of::<T>())?)
    }

    pub(crate) fn resolve_entry(
        &self,
        identifier: &str,
        overrides: &Overrides,
        fallback: Option<&Arc<dyn Constructor>>,
    ) -> Result<Instance> {
        if let Some(instance) = self.container.cached(identifier) {
            tracing::trace!(identifier, "Resolved cached instance");
            return Ok(instance);
        }

        self.enter(identifier)?;
        let result = self.produce(identifier, overrides, fallback);
        self.stack.borrow_mut().pop();
        result
    }

    fn enter(&self, identifier: &str) -> Result<()> {
        let mut stack = self.stack.borrow_mut();
        if stack.iter().any(|entry| entry == identifier) {
            let mut chain = stack.clone();
            chain.push(identifier.to_string());
            tracing::debug!(chain = %chain.join(" -> "), "Dependency cycle detected");
            return Err(TrellisError::CyclicDependency { chain });
        }
        stack.push(identifier.to_string());
        Ok(())
    }

    fn produce(
        &self,
        identifier: &str,
        overrides: &Overrides,
        fallback: Option<&Arc<dyn Constructor>>,
    ) -> Result<Instance> {
        match self.container.binding(identifier) {
            Some(binding) if binding.lifecycle == Lifecycle::Singleton => {
                self.produce_shared(identifier, &binding, overrides)
            }
            Some(binding) => self.build(identifier, &binding.concrete, overrides),
            None => {
                let constructor = fallback
                    .cloned()
                    .or_else(|| self.container.discovered(identifier))
                    .ok_or_else(|| TrellisError::NotFound {
                        identifier: identifier.to_string(),
                        chain: self.chain(),
                    })?;
                self.container.discover(identifier, &constructor);
                tracing::debug!(identifier, "Auto-building unbound type");
                self.build_class(identifier, constructor.as_ref(), overrides)
            }
        }
    }

    fn produce_shared(
        &self,
        identifier: &str,
        binding: &Binding,
        overrides: &Overrides,
    ) -> Result<Instance> {
        let _guard = self.container.lock_singletons();

        // Another pass may have finished while we waited for the lock.
        if let Some(instance) = self.container.cached(identifier) {
            return Ok(instance);
        }

        let instance = self.build(identifier, &binding.concrete, overrides)?;
        self.container.cache(identifier, Arc::clone(&instance));
        tracing::debug!(identifier, "Singleton instance cached");
        Ok(instance)
    }

    fn build(&self, identifier: &str, concrete: &Concrete, overrides: &Overrides) -> Result<Instance> {
        match concrete {
            Concrete::Value(value) => Ok(Arc::clone(value)),
            Concrete::Factory(factory) => factory(self),
            Concrete::Class(constructor) => {
                self.build_class(identifier, constructor.as_ref(), overrides)
            }
            Concrete::Alias(target) => self.resolve_entry(target, overrides, None),
        }
    }

    fn build_class(
        &self,
        identifier: &str,
        constructor: &dyn Constructor,
        overrides: &Overrides,
    ) -> Result<Instance> {
        let parameters = constructor.parameters();
        let mut values = Vec::with_capacity(parameters.len());
        for parameter in &parameters {
            let value = self.argument(identifier, parameter, overrides)?;
            values.push((parameter.name().to_string(), value));
        }

        constructor
            .construct(Arguments::new(identifier, values))
            .map_err(|err| match err {
                TrellisError::ConstructionFailure {
                    identifier, reason, ..
                } => TrellisError::ConstructionFailure {
                    identifier,
                    reason,
                    chain: self.chain(),
                },
                other => other,
            })
    }

    fn argument(
        &self,
        identifier: &str,
        parameter: &Parameter,
        overrides: &Overrides,
    ) -> Result<Instance> {
        if let Some(value) = overrides.get(parameter.name()) {
            return Ok(Arc::clone(value));
        }

        if let Some(declared) = parameter.declared() {
            let resolved = self.resolve_entry(
                &declared.identifier,
                &Overrides::default(),
                declared.constructor.as_ref(),
            );
            return match (resolved, parameter.default_value()) {
                (Ok(value), _) => Ok(value),
                (Err(err), Some(default)) => {
                    tracing::warn!(
                        identifier,
                        parameter = parameter.name(),
                        error = %err,
                        "Dependency failed to resolve, using default value"
                    );
                    Ok(Arc::clone(default))
                }
                (Err(err), None) => Err(err),
            };
        }

        if let Some(default) = parameter.default_value() {
            return Ok(Arc::clone(default));
        }

        Err(TrellisError::UnresolvableParameter {
            identifier: identifier.to_string(),
            parameter: parameter.name().to_string(),
            chain: self.chain(),
        })
    }
}

pub(crate) fn downcast<T: Send + Sync + 'static>(instance: Instance) -> Result<Arc<T>> {
    instance
        .downcast::<T>()
        .map_err(|_| TrellisError::DowncastFailed {
            type_name: identifier_of::<T>().to_string(),
        })
}

pub(crate) fn downcast_trait<T: ?Sized + Send + Sync + 'static>(instance: Instance) -> Result<Arc<T>> {
    instance
        .downcast::<Arc<T>>()
        .map(|wrapper| wrapper.as_ref().clone())
        .map_err(|_| TrellisError::DowncastFailed {
            type_name: identifier_of::<T>().to_string(),
        })
}
