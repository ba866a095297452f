use crate::di::injectable::{Class, Constructor, Injectable, Instance, identifier_of};
use crate::di::resolver::{Overrides, Resolver};
use crate::error::Result;
use dashmap::DashMap;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::fmt;
use std::sync::Arc;

/// Factory strategy: receives the resolver of the current pass.
pub type Factory = Arc<dyn Fn(&Resolver<'_>) -> Result<Instance> + Send + Sync>;

/// Whether a resolved instance is cached for the lifetime of the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Transient,
    Singleton,
}

/// How a binding produces its instance. Nothing runs at bind time.
#[derive(Clone)]
pub enum Concrete {
    /// A ready-made value, returned as-is.
    Value(Instance),
    /// A factory invoked with the resolver.
    Factory(Factory),
    /// A type built from its declared constructor parameters.
    Class(Arc<dyn Constructor>),
    /// Another identifier, resolved on demand.
    Alias(String),
}

impl Concrete {
    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        Self::Value(Arc::new(value))
    }

    pub fn factory<T, F>(build: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<T> + Send + Sync + 'static,
    {
        Self::Factory(Arc::new(move |resolver: &Resolver<'_>| {
            build(resolver).map(|value| Arc::new(value) as Instance)
        }))
    }

    pub fn class<T: Injectable>() -> Self {
        Self::Class(Class::<T>::shared())
    }

    pub fn alias(identifier: impl Into<String>) -> Self {
        Self::Alias(identifier.into())
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::Factory(_) => "factory",
            Self::Class(_) => "class",
            Self::Alias(_) => "alias",
        }
    }
}

impl fmt::Debug for Concrete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class(constructor) => write!(f, "Class({})", constructor.type_name()),
            Self::Alias(target) => write!(f, "Alias({target})"),
            other => f.write_str(other.kind()),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Binding {
    pub(crate) concrete: Concrete,
    pub(crate) lifecycle: Lifecycle,
}

/// Thread-safe dependency injection container.
///
/// Registration takes `&mut self`, resolution takes `&self`: once the container
/// is shared (usually behind an `Arc`) its bindings are fixed, and only the
/// singleton cache changes.
pub struct Container {
    bindings: DashMap<String, Binding>,
    instances: DashMap<String, Instance>,
    catalog: DashMap<String, Arc<dyn Constructor>>,
    /// Serialises first construction of singletons. Reentrant, so the pass
    /// holding it reaches its own cycle check instead of waiting on itself.
    singletons: ReentrantMutex<()>,
}

impl Container {
    pub fn new() -> Self {
        Self {
            bindings: DashMap::new(),
            instances: DashMap::new(),
            catalog: DashMap::new(),
            singletons: ReentrantMutex::new(()),
        }
    }

    /// Bind `identifier` with a transient lifecycle. Re-binding replaces the prior binding.
    pub fn bind(&mut self, identifier: impl Into<String>, concrete: Concrete) -> &mut Self {
        self.bind_with(identifier, concrete, Lifecycle::Transient)
    }

    pub fn singleton(&mut self, identifier: impl Into<String>, concrete: Concrete) -> &mut Self {
        self.bind_with(identifier, concrete, Lifecycle::Singleton)
    }

    pub fn bind_with(
        &mut self,
        identifier: impl Into<String>,
        concrete: Concrete,
        lifecycle: Lifecycle,
    ) -> &mut Self {
        let identifier = identifier.into();
        if let Concrete::Class(constructor) = &concrete {
            self.discover(constructor.type_name(), constructor);
        }
        tracing::debug!(identifier = %identifier, concrete = ?concrete, ?lifecycle, "Binding registered");

        self.instances.remove(&identifier);
        self.bindings.insert(identifier, Binding { concrete, lifecycle });
        self
    }

    /// Register an already-built value as the permanent result for `identifier`.
    pub fn instance<T: Send + Sync + 'static>(
        &mut self,
        identifier: impl Into<String>,
        value: T,
    ) -> &mut Self {
        self.instance_arc(identifier, Arc::new(value))
    }

    pub fn instance_arc(&mut self, identifier: impl Into<String>, instance: Instance) -> &mut Self {
        let identifier = identifier.into();
        tracing::debug!(identifier = %identifier, "Instance registered");
        self.instances.insert(identifier, instance);
        self
    }

    /// Register a value under its own type name.
    pub fn instance_of<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.instance(identifier_of::<T>(), value)
    }

    /// Bind `T` to itself, built fresh on every resolution.
    pub fn bind_type<T: Injectable>(&mut self) -> &mut Self {
        self.bind(identifier_of::<T>(), Concrete::class::<T>())
    }

    /// Bind `T` to itself, built once and cached.
    pub fn singleton_type<T: Injectable>(&mut self) -> &mut Self {
        self.singleton(identifier_of::<T>(), Concrete::class::<T>())
    }

    /// Bind a trait object to an implementation built by the container.
    ///
    /// This enables resolving `Arc<dyn Trait>` to the registered implementation.
    pub fn bind_trait<Trait, Impl, F>(&mut self, caster: F, lifecycle: Lifecycle) -> &mut Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        Impl: Injectable,
        F: Fn(Arc<Impl>) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.bind_trait_as::<Trait, Impl, F>(identifier_of::<Trait>(), caster, lifecycle)
    }

    /// Like [`Container::bind_trait`], under an explicit identifier.
    pub fn bind_trait_as<Trait, Impl, F>(
        &mut self,
        identifier: impl Into<String>,
        caster: F,
        lifecycle: Lifecycle,
    ) -> &mut Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        Impl: Injectable,
        F: Fn(Arc<Impl>) -> Arc<Trait> + Send + Sync + 'static,
    {
        let concrete = Concrete::factory(move |resolver: &Resolver<'_>| {
            resolver.resolve::<Impl>().map(&caster)
        });
        self.bind_with(identifier, concrete, lifecycle)
    }

    pub fn resolve_id(&self, identifier: &str) -> Result<Instance> {
        Resolver::new(self).resolve_id(identifier)
    }

    pub fn resolve_with(&self, identifier: &str, overrides: &Overrides) -> Result<Instance> {
        Resolver::new(self).resolve_with(identifier, overrides)
    }

    /// Resolve `T`, building it from its own constructor when nothing is bound.
    pub fn resolve<T: Injectable>(&self) -> Result<Arc<T>> {
        Resolver::new(self).resolve::<T>()
    }

    pub fn resolve_type_with<T: Injectable>(&self, overrides: &Overrides) -> Result<Arc<T>> {
        Resolver::new(self).resolve_type_with::<T>(overrides)
    }

    /// Resolve `T` from an explicit binding or instance only.
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        Resolver::new(self).get::<T>()
    }

    pub fn resolve_trait<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        Resolver::new(self).resolve_trait::<T>()
    }

    /// True if `identifier` is bound, already instantiated, or a type the container has
    /// learned how to build.
    ///
    /// A bare identifier carries no constructor, so an unbound type is only known
    /// here once it has been bound or resolved. Use [`Container::has_injectable`]
    /// to ask about a type before that.
    pub fn has(&self, identifier: &str) -> bool {
        self.bindings.contains_key(identifier)
            || self.instances.contains_key(identifier)
            || self.catalog.contains_key(identifier)
    }

    pub fn has_type<T: ?Sized + 'static>(&self) -> bool {
        self.has(identifier_of::<T>())
    }

    /// True if `T` is registered, or could be built from its own constructor:
    /// every parameter has a default, names a registered identifier, or is a
    /// type that is itself buildable.
    pub fn has_injectable<T: Injectable>(&self) -> bool {
        self.has_type::<T>() || self.buildable(Class::<T>::shared().as_ref(), &mut Vec::new())
    }

    fn buildable(&self, constructor: &dyn Constructor, visiting: &mut Vec<&'static str>) -> bool {
        let name = constructor.type_name();
        if visiting.contains(&name) {
            return false;
        }
        visiting.push(name);
        let buildable = constructor.parameters().iter().all(|parameter| {
            if parameter.has_default() {
                return true;
            }
            match parameter.declared() {
                Some(declared) => {
                    self.has(&declared.identifier)
                        || declared
                            .constructor
                            .as_ref()
                            .is_some_and(|nested| self.buildable(nested.as_ref(), visiting))
                }
                None => false,
            }
        });
        visiting.pop();
        buildable
    }

    /// Number of registered identifiers (bindings and instances).
    pub fn len(&self) -> usize {
        let unbound_instances = self
            .instances
            .iter()
            .filter(|entry| !self.bindings.contains_key(entry.key()))
            .count();
        self.bindings.len() + unbound_instances
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.instances.is_empty()
    }

    pub(crate) fn cached(&self, identifier: &str) -> Option<Instance> {
        self.instances.get(identifier).map(|entry| Arc::clone(entry.value()))
    }

    pub(crate) fn cache(&self, identifier: &str, instance: Instance) {
        self.instances.insert(identifier.to_string(), instance);
    }

    pub(crate) fn binding(&self, identifier: &str) -> Option<Binding> {
        self.bindings.get(identifier).map(|entry| entry.value().clone())
    }

    pub(crate) fn discovered(&self, identifier: &str) -> Option<Arc<dyn Constructor>> {
        self.catalog.get(identifier).map(|entry| Arc::clone(entry.value()))
    }

    pub(crate) fn discover(&self, identifier: &str, constructor: &Arc<dyn Constructor>) {
        if !self.catalog.contains_key(identifier) {
            self.catalog
                .insert(identifier.to_string(), Arc::clone(constructor));
        }
    }

    pub(crate) fn lock_singletons(&self) -> ReentrantMutexGuard<'_, ()> {
        self.singletons.lock()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::{Arguments, Parameter};
    use crate::error::TrellisError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    struct Database {
        url: String,
    }

    impl Injectable for Database {
        fn parameters() -> Vec<Parameter> {
            vec![Parameter::value("url").with_default(String::from("sqlite::memory:"))]
        }

        fn construct(mut args: Arguments) -> Result<Self> {
            Ok(Self { url: args.value()? })
        }
    }

    struct UserRepository {
        db: Arc<Database>,
    }

    impl Injectable for UserRepository {
        fn parameters() -> Vec<Parameter> {
            vec![Parameter::injectable::<Database>("db")]
        }

        fn construct(mut args: Arguments) -> Result<Self> {
            Ok(Self { db: args.service()? })
        }
    }

    struct UserService {
        repository: Arc<UserRepository>,
        page_size: u32,
    }

    impl Injectable for UserService {
        fn parameters() -> Vec<Parameter> {
            vec![
                Parameter::injectable::<UserRepository>("repository"),
                Parameter::value("page_size").with_default(20u32),
            ]
        }

        fn construct(mut args: Arguments) -> Result<Self> {
            Ok(Self {
                repository: args.service()?,
                page_size: args.value()?,
            })
        }
    }

    struct NeedsPort {
        port: u16,
    }

    impl Injectable for NeedsPort {
        fn parameters() -> Vec<Parameter> {
            vec![Parameter::value("port")]
        }

        fn construct(mut args: Arguments) -> Result<Self> {
            Ok(Self { port: args.value()? })
        }
    }

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct EnglishGreeter;

    impl Greeter for EnglishGreeter {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    impl Injectable for EnglishGreeter {
        fn construct(_args: Arguments) -> Result<Self> {
            Ok(EnglishGreeter)
        }
    }

    #[test]
    fn test_auto_builds_unbound_graph() {
        let container = Container::new();
        let service = container.resolve::<UserService>().unwrap();
        assert_eq!(service.page_size, 20);
        assert_eq!(service.repository.db.url, "sqlite::memory:");
        assert!(container.has_type::<UserService>());
        assert!(container.has_type::<Database>());
    }

    #[test]
    fn test_singleton_returns_same_instance() {
        let mut container = Container::new();
        container.singleton_type::<Database>();

        let first = container.resolve::<Database>().unwrap();
        let second = container.resolve::<Database>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_transient_returns_distinct_instances() {
        let mut container = Container::new();
        container.bind_type::<Database>();

        let first = container.resolve::<Database>().unwrap();
        let second = container.resolve::<Database>().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_auto_discovered_types_are_transient() {
        let container = Container::new();
        let first = container.resolve::<Database>().unwrap();
        let second = container.resolve::<Database>().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_singleton_dependency_is_shared_between_dependents() {
        let mut container = Container::new();
        container.singleton_type::<Database>();

        let a = container.resolve::<UserRepository>().unwrap();
        let b = container.resolve::<UserRepository>().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a.db, &b.db));
    }

    #[test]
    fn test_instance_is_permanent_result() {
        let mut container = Container::new();
        container.instance_of(Database {
            url: "postgres://localhost".to_string(),
        });

        let repository = container.resolve::<UserRepository>().unwrap();
        assert_eq!(repository.db.url, "postgres://localhost");
        assert!(Arc::ptr_eq(
            &repository.db,
            &container.get::<Database>().unwrap()
        ));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let container = Container::new();
        let overrides = Overrides::new().with("page_size", 50u32);
        let service = container.resolve_type_with::<UserService>(&overrides).unwrap();
        assert_eq!(service.page_size, 50);

        let overrides = Overrides::new().with("port", 8080u16);
        let needs_port = container.resolve_type_with::<NeedsPort>(&overrides).unwrap();
        assert_eq!(needs_port.port, 8080);
    }

    #[test]
    fn test_builtin_parameter_without_default_is_unresolvable() {
        let container = Container::new();
        let err = container.resolve::<NeedsPort>().err().unwrap();
        match err {
            TrellisError::UnresolvableParameter {
                identifier,
                parameter,
                ..
            } => {
                assert_eq!(parameter, "port");
                assert_eq!(identifier, identifier_of::<NeedsPort>());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_factory_receives_resolver() {
        let mut container = Container::new();
        container.bind(
            "db.url",
            Concrete::factory(|_| Ok(String::from("mysql://db"))),
        );
        container.bind(
            identifier_of::<Database>(),
            Concrete::factory(|resolver| {
                let url = resolver.resolve_id("db.url")?;
                let url = url.downcast_ref::<String>().cloned().unwrap_or_default();
                Ok(Database { url })
            }),
        );

        let repository = container.resolve::<UserRepository>().unwrap();
        assert_eq!(repository.db.url, "mysql://db");
    }

    #[test]
    fn test_alias_resolves_target() {
        let mut container = Container::new();
        container.bind_type::<Database>();
        container.singleton("database", Concrete::alias(identifier_of::<Database>()));

        let instance = container.resolve_id("database").unwrap();
        assert!(instance.downcast_ref::<Database>().is_some());
        assert!(Arc::ptr_eq(
            &instance,
            &container.resolve_id("database").unwrap()
        ));
    }

    #[test]
    fn test_unknown_identifier_is_not_found() {
        let container = Container::new();
        let err = container.resolve_id("mailer").err().unwrap();
        assert!(matches!(err, TrellisError::NotFound { ref identifier, .. } if identifier == "mailer"));
        assert!(!container.has("mailer"));
    }

    #[test]
    fn test_missing_dependency_reports_chain() {
        struct NeedsMailer;
        impl Injectable for NeedsMailer {
            fn parameters() -> Vec<Parameter> {
                vec![Parameter::service_id("mailer", "mailer")]
            }
            fn construct(_args: Arguments) -> Result<Self> {
                Ok(NeedsMailer)
            }
        }

        let container = Container::new();
        let err = container.resolve::<NeedsMailer>().err().unwrap();
        assert_eq!(
            err.chain().unwrap(),
            [identifier_of::<NeedsMailer>().to_string(), "mailer".to_string()]
        );
    }

    #[test]
    fn test_failed_dependency_falls_back_to_default() {
        struct Optional {
            mailer: Arc<String>,
        }
        impl Injectable for Optional {
            fn parameters() -> Vec<Parameter> {
                vec![Parameter::service_id("mailer", "mailer").with_default(String::from("null-mailer"))]
            }
            fn construct(mut args: Arguments) -> Result<Self> {
                Ok(Self {
                    mailer: args.service()?,
                })
            }
        }

        let container = Container::new();
        let optional = container.resolve::<Optional>().unwrap();
        assert_eq!(optional.mailer.as_str(), "null-mailer");
    }

    #[test]
    fn test_mutual_dependency_is_cycle_error() {
        struct A;
        struct B;
        impl Injectable for A {
            fn parameters() -> Vec<Parameter> {
                vec![Parameter::injectable::<B>("b")]
            }
            fn construct(_args: Arguments) -> Result<Self> {
                Ok(A)
            }
        }
        impl Injectable for B {
            fn parameters() -> Vec<Parameter> {
                vec![Parameter::injectable::<A>("a")]
            }
            fn construct(_args: Arguments) -> Result<Self> {
                Ok(B)
            }
        }

        let container = Container::new();
        let err = container.resolve::<A>().err().unwrap();
        match err {
            TrellisError::CyclicDependency { chain } => {
                assert_eq!(
                    chain,
                    vec![
                        identifier_of::<A>().to_string(),
                        identifier_of::<B>().to_string(),
                        identifier_of::<A>().to_string(),
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }

        // The failed pass leaves nothing behind.
        assert!(matches!(
            container.resolve::<B>(),
            Err(TrellisError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn test_cycle_through_factories_is_detected() {
        let mut container = Container::new();
        container.bind("a", Concrete::factory(|r| r.resolve_id("b").map(|_| ())));
        container.bind("b", Concrete::factory(|r| r.resolve_id("a").map(|_| ())));

        let err = container.resolve_id("a").err().unwrap();
        assert!(matches!(err, TrellisError::CyclicDependency { ref chain } if chain.len() == 3));
    }

    #[test]
    fn test_resolve_trait_binding() {
        let mut container = Container::new();
        container.bind_trait::<dyn Greeter, EnglishGreeter, _>(
            |g| g as Arc<dyn Greeter>,
            Lifecycle::Singleton,
        );

        let greeter = container.resolve_trait::<dyn Greeter>().unwrap();
        assert_eq!(greeter.greet(), "hello");
        assert!(Arc::ptr_eq(
            &greeter,
            &container.resolve_trait::<dyn Greeter>().unwrap()
        ));
    }

    #[test]
    fn test_wrong_type_is_downcast_failure() {
        let mut container = Container::new();
        container.instance(identifier_of::<Database>(), 42u8);
        assert!(matches!(
            container.get::<Database>(),
            Err(TrellisError::DowncastFailed { .. })
        ));
    }

    #[test]
    fn test_rebinding_replaces_prior_binding() {
        let mut container = Container::new();
        container.bind("greeting", Concrete::value("hi"));
        container.bind("greeting", Concrete::value("hello"));

        let greeting = container.resolve_id("greeting").unwrap();
        assert_eq!(greeting.downcast_ref::<&str>(), Some(&"hello"));
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_concurrent_singleton_is_built_once() {
        static BUILT: AtomicUsize = AtomicUsize::new(0);

        let mut container = Container::new();
        container.singleton(
            "slow",
            Concrete::factory(|_| {
                BUILT.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                Ok(String::from("ready"))
            }),
        );

        let container = Arc::new(container);
        let instances: Vec<Instance> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let container = Arc::clone(&container);
                    scope.spawn(move || container.resolve_id("slow").unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
        assert!(instances.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_singleton_cycle_across_threads_is_reported() {
        let mut container = Container::new();
        container.singleton(
            "a",
            Concrete::factory(|r| {
                std::thread::sleep(Duration::from_millis(20));
                r.resolve_id("b").map(|_| String::from("a"))
            }),
        );
        container.singleton(
            "b",
            Concrete::factory(|r| {
                std::thread::sleep(Duration::from_millis(20));
                r.resolve_id("a").map(|_| String::from("b"))
            }),
        );

        let container = Arc::new(container);
        let (tx, rx) = mpsc::channel();
        for first in ["a", "b"] {
            let container = Arc::clone(&container);
            let tx = tx.clone();
            std::thread::spawn(move || {
                let _ = tx.send(container.resolve_id(first).map(|_| ()));
            });
        }

        for _ in 0..2 {
            let result = rx
                .recv_timeout(Duration::from_secs(3))
                .expect("resolution blocked");
            assert!(matches!(result, Err(TrellisError::CyclicDependency { .. })));
        }
    }

    #[test]
    fn test_self_referential_singleton_factory_is_cycle_error() {
        let mut container = Container::new();
        container.singleton(
            "self",
            Concrete::factory(|r| r.resolve_id("self").map(|_| String::from("self"))),
        );

        let container = Arc::new(container);
        let (tx, rx) = mpsc::channel();
        let worker = Arc::clone(&container);
        std::thread::spawn(move || {
            let _ = tx.send(worker.resolve_id("self").map(|_| ()));
        });

        let result = rx
            .recv_timeout(Duration::from_secs(3))
            .expect("resolution blocked");
        match result {
            Err(TrellisError::CyclicDependency { chain }) => {
                assert_eq!(chain, vec!["self", "self"]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_has_injectable_before_first_resolve() {
        let container = Container::new();

        assert!(!container.has_type::<Database>());
        assert!(container.has_injectable::<Database>());
        assert!(container.has_injectable::<UserService>());
        assert!(!container.has_injectable::<NeedsPort>());
        assert!(!container.has(identifier_of::<UserService>()));
    }

    #[test]
    fn test_has_injectable_accepts_bound_type() {
        let mut container = Container::new();
        assert!(!container.has_injectable::<NeedsPort>());

        container.instance_of(NeedsPort { port: 80 });
        assert!(container.has_injectable::<NeedsPort>());
    }

    #[test]
    fn test_overrides_do_not_reach_nested_dependencies() {
        let container = Container::new();
        let overrides = Overrides::new().with("url", String::from("postgres://x"));

        let repository = container
            .resolve_type_with::<UserRepository>(&overrides)
            .unwrap();
        assert_eq!(repository.db.url, "sqlite::memory:");

        let database = container.resolve_type_with::<Database>(&overrides).unwrap();
        assert_eq!(database.url, "postgres://x");
    }
}
