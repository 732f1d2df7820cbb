//! Service keys and the type-key service.
//!
//! Every registration in the container is addressed by a [`ServiceKey`]: an
//! opaque string whose only contract is uniqueness. The helpers in this
//! module mint keys from Rust types via [`std::any::type_name`], optionally
//! suffixed with `#<name>` for named registrations. Nothing in the container
//! core interprets the key text beyond that suffix.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Opaque identifier for a service registration.
///
/// Keys are interned strings (`Arc<str>` internally), so cloning one is a
/// reference-count bump. They are freely copied into the dependency graph,
/// the registry, and error values.
///
/// # Examples
///
/// ```
/// use weft_di::{key_of, key_of_named, ServiceKey};
///
/// struct Database;
///
/// let key = key_of::<Database>();
/// assert!(key.as_str().ends_with("Database"));
/// assert_eq!(key.service_name(), None);
///
/// let named = key_of_named::<Database>("replica");
/// assert_eq!(named.service_name(), Some("replica"));
/// assert_ne!(key, named);
///
/// let raw = ServiceKey::from("external.cache");
/// assert_eq!(raw.as_str(), "external.cache");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey(Arc<str>);

impl ServiceKey {
    /// Creates a key from an arbitrary string.
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    /// The full key text, including any `#<name>` suffix.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The type-identity portion of the key (text before the `#` suffix).
    pub fn type_identity(&self) -> &str {
        match self.0.split_once('#') {
            Some((ty, _)) => ty,
            None => &self.0,
        }
    }

    /// The service name for named registrations, or `None` for unnamed ones.
    pub fn service_name(&self) -> Option<&str> {
        self.0.split_once('#').map(|(_, name)| name)
    }

    /// Derives the named variant of this key: `<key>#<name>`.
    pub fn with_name(&self, name: &str) -> ServiceKey {
        ServiceKey(format!("{}#{}", self.0, name).into())
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceKey({:?})", &*self.0)
    }
}

impl From<&str> for ServiceKey {
    fn from(key: &str) -> Self {
        Self(key.into())
    }
}

impl From<String> for ServiceKey {
    fn from(key: String) -> Self {
        Self(key.into())
    }
}

impl Borrow<str> for ServiceKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Mints the key for a type.
///
/// Deterministic within a run for the same `T`. Works for unsized types,
/// so trait objects can be keyed directly: `key_of::<dyn MyTrait>()`.
pub fn key_of<T: ?Sized>() -> ServiceKey {
    ServiceKey(std::any::type_name::<T>().into())
}

/// Mints the named key for a type: `<type-identity>#<name>`.
pub fn key_of_named<T: ?Sized>(name: &str) -> ServiceKey {
    key_of::<T>().with_name(name)
}
