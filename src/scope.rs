//! Service scope policies and the per-request instance cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use crate::key::ServiceKey;
use crate::registry::Instance;

/// Instance lifetime policy for a registration.
///
/// - **Singleton** (default): constructed at most once, cached in the
///   registry, shared by every caller.
/// - **Transient**: constructed on every resolve, owned by the caller.
/// - **Request**: cached in the [`RequestScope`] carried by the resolving
///   context; one instance per request.
/// - **Pooled**: drawn from a bounded pool when available, otherwise
///   constructed; returned with [`Container::release`].
///
/// [`Container::release`]: crate::Container::release
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Scope {
    #[default]
    Singleton,
    Transient,
    Request,
    Pooled,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scope::Singleton => "singleton",
            Scope::Transient => "transient",
            Scope::Request => "request",
            Scope::Pooled => "pooled",
        };
        f.write_str(name)
    }
}

/// Per-request instance cache, bound to a [`Context`] via
/// [`Context::with_request_scope`].
///
/// Resolving a [`Scope::Request`] service through the same scope returns the
/// same instance; distinct scopes hold distinct instances.
///
/// [`Context`]: crate::Context
/// [`Context::with_request_scope`]: crate::Context::with_request_scope
#[derive(Default)]
pub struct RequestScope {
    instances: RwLock<HashMap<ServiceKey, Instance>>,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the cached instance for a key.
    pub fn get(&self, key: &ServiceKey) -> Option<Instance> {
        self.instances.read().unwrap().get(key).cloned()
    }

    /// Caches an instance for a key, replacing any previous one.
    pub fn set(&self, key: ServiceKey, instance: Instance) {
        self.instances.write().unwrap().insert(key, instance);
    }

    /// Number of instances cached in this scope.
    pub fn len(&self) -> usize {
        self.instances.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScope")
            .field("instances", &self.len())
            .finish()
    }
}
