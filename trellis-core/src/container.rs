// Service container

use crate::logging::{debug, trace};
use crate::middleware::Middleware;
use crate::Error;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

type AnyService = dyn Any + Send + Sync;
type Factory<T> = Arc<dyn Fn(&Container) -> Result<Arc<T>, Error> + Send + Sync>;
type Delegator<T> = Arc<dyn Fn(&Container, Arc<T>) -> Result<Arc<T>, Error> + Send + Sync>;

/// Named instances, factories and delegators for one capability.
struct Registry<T: ?Sized> {
    instances: HashMap<String, Arc<T>>,
    factories: HashMap<String, Factory<T>>,
    delegators: HashMap<String, Vec<Delegator<T>>>,
}

impl<T: ?Sized> Registry<T> {
    fn new() -> Self {
        Self {
            instances: HashMap::new(),
            factories: HashMap::new(),
            delegators: HashMap::new(),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.instances.contains_key(name) || self.factories.contains_key(name)
    }

    fn len(&self) -> usize {
        self.factories
            .keys()
            .filter(|name| !self.instances.contains_key(*name))
            .count()
            + self.instances.len()
    }
}

struct Inner {
    allow_override: RwLock<bool>,
    middleware: RwLock<Registry<dyn Middleware>>,
    services: RwLock<Registry<AnyService>>,
}

/// Name-keyed service container.
///
/// Holds two registries: pipeline stages (anything implementing
/// [`Middleware`]) and arbitrary typed services. Each name may be bound to a
/// ready instance or to a factory that builds it on first use; delegators
/// registered for a name decorate the factory's output in registration order.
/// Built services are cached, so every later lookup sees the same instance.
///
/// Cloning is cheap and every clone shares the same registrations.
///
/// ```rust
/// use trellis_core::{Container, PassThroughMiddleware};
///
/// let container = Container::new();
/// container.set_middleware("auth", PassThroughMiddleware).unwrap();
/// container.set_service("greeting", String::from("hello")).unwrap();
///
/// assert!(container.has("auth"));
/// assert_eq!(*container.get::<String>("greeting").unwrap(), "hello");
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

/// Non-owning handle to a [`Container`].
///
/// Services that need to call back into the container they live in hold one
/// of these instead of a `Container`, which would keep it alive forever.
#[derive(Clone)]
pub struct WeakContainer {
    inner: Weak<Inner>,
}

impl WeakContainer {
    pub fn upgrade(&self) -> Option<Container> {
        self.inner.upgrade().map(|inner| Container { inner })
    }
}

impl fmt::Debug for WeakContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakContainer")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl Container {
    pub fn new() -> Self {
        debug!("Creating new service container");
        Self {
            inner: Arc::new(Inner {
                allow_override: RwLock::new(false),
                middleware: RwLock::new(Registry::new()),
                services: RwLock::new(Registry::new()),
            }),
        }
    }

    /// Permit replacing names that are already registered.
    pub fn set_allow_override(&self, allow: bool) {
        *self.inner.allow_override.write() = allow;
        debug!(allow_override = allow, "Container override policy changed");
    }

    pub fn allows_override(&self) -> bool {
        *self.inner.allow_override.read()
    }

    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Check whether anything is registered under `name`.
    pub fn has(&self, name: &str) -> bool {
        let exists = self.inner.middleware.read().contains(name)
            || self.inner.services.read().contains(name);
        trace!(service = name, exists, "Checked service existence");
        exists
    }

    /// Number of distinct registered names across both registries.
    pub fn len(&self) -> usize {
        self.inner.middleware.read().len() + self.inner.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_override(&self, name: &str, exists: bool) -> Result<(), Error> {
        if exists && !self.allows_override() {
            debug!(service = name, "Refusing to override registered service");
            return Err(Error::OverrideNotAllowed(name.to_string()));
        }
        Ok(())
    }

    // ========== Middleware ==========

    /// Bind a middleware instance to `name`.
    pub fn set_middleware<M>(&self, name: impl Into<String>, middleware: M) -> Result<(), Error>
    where
        M: Middleware + 'static,
    {
        self.set_middleware_arc(name, Arc::new(middleware))
    }

    /// Bind an already shared middleware instance to `name`.
    pub fn set_middleware_arc(
        &self,
        name: impl Into<String>,
        middleware: Arc<dyn Middleware>,
    ) -> Result<(), Error> {
        let name = name.into();
        let mut registry = self.inner.middleware.write();
        self.check_override(&name, registry.contains(&name))?;

        registry.factories.remove(&name);
        registry.instances.insert(name.clone(), middleware);
        debug!(middleware = %name, "Middleware registered");
        Ok(())
    }

    /// Bind a factory that builds the middleware for `name` on first use.
    pub fn register_middleware<M, F>(
        &self,
        name: impl Into<String>,
        factory: F,
    ) -> Result<(), Error>
    where
        M: Middleware + 'static,
        F: Fn(&Container) -> Result<M, Error> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut registry = self.inner.middleware.write();
        self.check_override(&name, registry.contains(&name))?;

        registry.instances.remove(&name);
        registry.factories.insert(
            name.clone(),
            Arc::new(move |container: &Container| {
                factory(container).map(|m| Arc::new(m) as Arc<dyn Middleware>)
            }),
        );
        debug!(middleware = %name, "Middleware factory registered");
        Ok(())
    }

    /// Resolve the middleware bound to `name`.
    pub fn get_middleware(&self, name: &str) -> Result<Arc<dyn Middleware>, Error> {
        trace!(middleware = name, "Attempting to resolve middleware");
        match self.resolve(&self.inner.middleware, name)? {
            Some(middleware) => Ok(middleware),
            None if self.inner.services.read().contains(name) => Err(Error::ServiceType {
                name: name.to_string(),
                expected: "middleware",
            }),
            None => {
                debug!(middleware = name, "Middleware not found in container");
                Err(Error::ServiceNotFound(name.to_string()))
            }
        }
    }

    /// Decorate the middleware built for `name`, e.g. to wrap a stage.
    ///
    /// Same ordering and caching rules as [`Container::add_delegator`].
    pub fn add_middleware_delegator<F>(&self, name: impl Into<String>, delegator: F)
    where
        F: Fn(&Container, Arc<dyn Middleware>) -> Result<Arc<dyn Middleware>, Error>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        self.inner
            .middleware
            .write()
            .delegators
            .entry(name.clone())
            .or_default()
            .push(Arc::new(delegator));
        debug!(middleware = %name, "Middleware delegator registered");
    }

    // ========== Typed services ==========

    /// Bind a service instance to `name`.
    pub fn set_service<T>(&self, name: impl Into<String>, service: T) -> Result<(), Error>
    where
        T: Any + Send + Sync,
    {
        let name = name.into();
        let mut registry = self.inner.services.write();
        self.check_override(&name, registry.contains(&name))?;

        registry.factories.remove(&name);
        registry.instances.insert(name.clone(), Arc::new(service));
        debug!(
            service = %name,
            service_type = std::any::type_name::<T>(),
            "Service registered"
        );
        Ok(())
    }

    /// Bind a factory that builds the service for `name` on first use.
    pub fn register_factory<T, F>(&self, name: impl Into<String>, factory: F) -> Result<(), Error>
    where
        T: Any + Send + Sync,
        F: Fn(&Container) -> Result<T, Error> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut registry = self.inner.services.write();
        self.check_override(&name, registry.contains(&name))?;

        registry.instances.remove(&name);
        registry.factories.insert(
            name.clone(),
            Arc::new(move |container: &Container| {
                factory(container).map(|s| Arc::new(s) as Arc<AnyService>)
            }),
        );
        debug!(
            service = %name,
            service_type = std::any::type_name::<T>(),
            "Service factory registered"
        );
        Ok(())
    }

    /// Decorate the service built for `name`.
    ///
    /// Delegators run after the factory, in the order they were added, each
    /// receiving the previous result. They only apply to factory-built
    /// services and have no effect on an instance that was already cached.
    pub fn add_delegator<T, F>(&self, name: impl Into<String>, delegator: F)
    where
        T: Any + Send + Sync,
        F: Fn(&Container, Arc<T>) -> Result<Arc<T>, Error> + Send + Sync + 'static,
    {
        let name = name.into();
        let key = name.clone();
        let wrapped: Delegator<AnyService> =
            Arc::new(move |container: &Container, service: Arc<AnyService>| {
                let typed = service.downcast::<T>().map_err(|_| Error::ServiceType {
                    name: key.clone(),
                    expected: std::any::type_name::<T>(),
                })?;
                delegator(container, typed).map(|s| s as Arc<AnyService>)
            });

        self.inner
            .services
            .write()
            .delegators
            .entry(name.clone())
            .or_default()
            .push(wrapped);
        debug!(service = %name, "Delegator registered");
    }

    /// Resolve the service bound to `name` as a `T`.
    pub fn get<T>(&self, name: &str) -> Result<Arc<T>, Error>
    where
        T: Any + Send + Sync,
    {
        let type_name = std::any::type_name::<T>();
        trace!(service = name, service_type = type_name, "Attempting to resolve service");

        let service = self.resolve(&self.inner.services, name)?.ok_or_else(|| {
            debug!(service = name, "Service not found in container");
            Error::ServiceNotFound(name.to_string())
        })?;

        service.downcast::<T>().map_err(|_| Error::ServiceType {
            name: name.to_string(),
            expected: type_name,
        })
    }

    /// Look up a cached instance, or build, decorate and cache one.
    ///
    /// The registry lock is released while factories and delegators run so
    /// they can resolve their own dependencies from this container.
    fn resolve<T: ?Sized>(
        &self,
        registry: &RwLock<Registry<T>>,
        name: &str,
    ) -> Result<Option<Arc<T>>, Error> {
        let (factory, delegators) = {
            let registry = registry.read();
            if let Some(instance) = registry.instances.get(name) {
                trace!(service = name, "Resolved cached instance");
                return Ok(Some(instance.clone()));
            }
            match registry.factories.get(name) {
                Some(factory) => (
                    factory.clone(),
                    registry.delegators.get(name).cloned().unwrap_or_default(),
                ),
                None => return Ok(None),
            }
        };

        let mut instance = factory(self)?;
        for delegator in &delegators {
            instance = delegator(self, instance)?;
        }
        debug!(
            service = name,
            delegator_count = delegators.len(),
            "Service built from factory"
        );

        let mut registry = registry.write();
        let cached = registry
            .instances
            .entry(name.to_string())
            .or_insert(instance)
            .clone();
        Ok(Some(cached))
    }

    /// Drop every registration.
    pub fn clear(&self) {
        let count = self.len();
        *self.inner.middleware.write() = Registry::new();
        *self.inner.services.write() = Registry::new();
        debug!(service_count = count, "Cleared all services from container");
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let middleware = self.inner.middleware.read();
        let services = self.inner.services.read();
        let mut middleware_names: Vec<&String> =
            middleware.instances.keys().chain(middleware.factories.keys()).collect();
        middleware_names.sort();
        middleware_names.dedup();
        let mut service_names: Vec<&String> =
            services.instances.keys().chain(services.factories.keys()).collect();
        service_names.sort();
        service_names.dedup();

        f.debug_struct("Container")
            .field("allow_override", &*self.inner.allow_override.read())
            .field("middleware", &middleware_names)
            .field("services", &service_names)
            .finish()
    }
}
