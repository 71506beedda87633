//! # Resource Registry
//!
//! Explicit mapping from `(ResourceKind, name)` to a factory, populated once at
//! startup. The dispatcher resolves controllers, the security policy and
//! handler dependencies through it; a missing entry is a typed [`NotFound`],
//! never a silent `None`.
//!
//! Names are matched ASCII case-insensitively, so a route `Blog/Show` reaches
//! the controller registered as `blog`.
//!
//! ```rust
//! use mvc_dispatch::registry::{Registry, ResourceKind};
//! use mvc_dispatch::security::AllowAll;
//!
//! let registry = Registry::new().security_policy("open", || AllowAll);
//! assert!(registry.contains(ResourceKind::SecurityPolicy, "OPEN"));
//! assert!(registry.resolve(ResourceKind::Controller, "open").is_err());
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::assert::AssertionFailure;
use crate::controller::{bind, Controller, Handler};
use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::security::Authentication;

/// Category of a registered resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Controller,
    /// Object built on demand for handlers (see [`Dispatcher::load_dependency`]).
    Dependency,
    SecurityPolicy,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Controller => "controller",
            ResourceKind::Dependency => "dependency",
            ResourceKind::SecurityPolicy => "security policy",
        };
        f.write_str(name)
    }
}

/// No resource of this kind is registered under this name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFound {
    pub kind: ResourceKind,
    pub name: String,
}

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "The resource '{}' of type '{}' cannot be found.",
            self.name, self.kind
        )
    }
}

impl std::error::Error for NotFound {}

impl From<NotFound> for AssertionFailure {
    fn from(err: NotFound) -> Self {
        AssertionFailure::new(err.to_string())
    }
}

/// Builds a controller instance bound to the calling dispatcher.
pub type ControllerFactory =
    Arc<dyn Fn(&mut Dispatcher) -> Result<Box<dyn Handler>, DispatchError> + Send + Sync>;

/// Builds a fresh security policy for one request.
pub type SecurityFactory = Arc<dyn Fn() -> Box<dyn Authentication> + Send + Sync>;

/// Builds a dependency for a handler; the value is downcast by the caller.
pub type DependencyFactory =
    Arc<dyn Fn(&mut Dispatcher) -> Result<Box<dyn Any>, DispatchError> + Send + Sync>;

/// One registered factory.
#[derive(Clone)]
pub enum Resource {
    Controller(ControllerFactory),
    Dependency(DependencyFactory),
    SecurityPolicy(SecurityFactory),
}

impl Resource {
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Controller(_) => ResourceKind::Controller,
            Resource::Dependency(_) => ResourceKind::Dependency,
            Resource::SecurityPolicy(_) => ResourceKind::SecurityPolicy,
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resource::{:?}", self.kind())
    }
}

/// Startup-populated resource table shared by every request.
#[derive(Clone, Default)]
pub struct Registry {
    entries: HashMap<(ResourceKind, String), Resource>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .entries
            .keys()
            .map(|(kind, name)| format!("{kind}:{name}"))
            .collect();
        keys.sort();
        f.debug_struct("Registry").field("entries", &keys).finish()
    }
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register controller type `C` under `name`.
    #[must_use]
    pub fn controller<C: Controller>(mut self, name: &str) -> Self {
        self.insert(name, Resource::Controller(bind::<C>()));
        self
    }

    /// Register a security policy factory under `name`.
    #[must_use]
    pub fn security_policy<F, A>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn() -> A + Send + Sync + 'static,
        A: Authentication + 'static,
    {
        let factory: SecurityFactory =
            Arc::new(move || Box::new(factory()) as Box<dyn Authentication>);
        self.insert(name, Resource::SecurityPolicy(factory));
        self
    }

    /// Register a dependency factory under `name`.
    #[must_use]
    pub fn dependency<F, T>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&mut Dispatcher) -> Result<T, DispatchError> + Send + Sync + 'static,
        T: 'static,
    {
        let factory: DependencyFactory = Arc::new(move |dispatcher: &mut Dispatcher| {
            Ok(Box::new(factory(dispatcher)?) as Box<dyn Any>)
        });
        self.insert(name, Resource::Dependency(factory));
        self
    }

    /// Add or replace an entry.
    ///
    /// The resource kind is taken from `resource`; registering the same name
    /// twice keeps the last factory.
    pub fn insert(&mut self, name: &str, resource: Resource) {
        let kind = resource.kind();
        let key = (kind, normalize(name));
        if self.entries.insert(key, resource).is_some() {
            warn!(kind = %kind, name, "Replaced existing registry entry");
        } else {
            debug!(kind = %kind, name, total = self.entries.len(), "Registry entry added");
        }
    }

    /// Look up a resource.
    pub fn resolve(&self, kind: ResourceKind, name: &str) -> Result<&Resource, NotFound> {
        self.entries
            .get(&(kind, normalize(name)))
            .ok_or_else(|| NotFound {
                kind,
                name: name.to_string(),
            })
    }

    #[must_use]
    pub fn contains(&self, kind: ResourceKind, name: &str) -> bool {
        self.resolve(kind, name).is_ok()
    }

    /// Controller factory registered under `name`.
    pub fn controller_factory(&self, name: &str) -> Result<ControllerFactory, NotFound> {
        match self.resolve(ResourceKind::Controller, name)? {
            Resource::Controller(factory) => Ok(Arc::clone(factory)),
            _ => Err(not_found(ResourceKind::Controller, name)),
        }
    }

    /// Security policy factory registered under `name`.
    pub fn security_factory(&self, name: &str) -> Result<SecurityFactory, NotFound> {
        match self.resolve(ResourceKind::SecurityPolicy, name)? {
            Resource::SecurityPolicy(factory) => Ok(Arc::clone(factory)),
            _ => Err(not_found(ResourceKind::SecurityPolicy, name)),
        }
    }

    /// Dependency factory registered under `name`.
    pub fn dependency_factory(&self, name: &str) -> Result<DependencyFactory, NotFound> {
        match self.resolve(ResourceKind::Dependency, name)? {
            Resource::Dependency(factory) => Ok(Arc::clone(factory)),
            _ => Err(not_found(ResourceKind::Dependency, name)),
        }
    }

    /// Registered names of one kind, sorted.
    #[must_use]
    pub fn names(&self, kind: ResourceKind) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .entries
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, name)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.to_ascii_lowercase()
}

fn not_found(kind: ResourceKind, name: &str) -> NotFound {
    NotFound {
        kind,
        name: name.to_string(),
    }
}
