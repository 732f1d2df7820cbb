//! Typed resolution facade.
//!
//! Thin wrappers over [`Container::resolve`] that mint the key from the
//! requested type and downcast the erased instance. A failed downcast is an
//! error (`TypeMismatch`), never a panic.

use std::any::type_name;
use std::sync::Arc;

use crate::container::Container;
use crate::context::Context;
use crate::error::{DiError, DiResult};
use crate::key::{key_of, key_of_named, ServiceKey};
use crate::registry::Instance;

fn downcast<T: Send + Sync + 'static>(key: ServiceKey, instance: Instance) -> DiResult<Arc<T>> {
    instance.downcast::<T>().map_err(|_| DiError::TypeMismatch {
        key,
        expected: type_name::<T>(),
    })
}

/// Resolves `T` by its type key.
pub async fn invoke<T: Send + Sync + 'static>(
    container: &Container,
    ctx: &Context,
) -> DiResult<Arc<T>> {
    let key = key_of::<T>();
    let instance = container.resolve(ctx, &key).await?;
    downcast(key, instance)
}

/// Resolves `T` by its named key `<T>#<name>`.
pub async fn invoke_named<T: Send + Sync + 'static>(
    container: &Container,
    ctx: &Context,
    name: &str,
) -> DiResult<Arc<T>> {
    let key = key_of_named::<T>(name);
    let instance = container.resolve(ctx, &key).await?;
    downcast(key, instance)
}

/// Resolves a bound interface `I` (usually a trait object) by its type key.
///
/// Pairs with [`bind`](crate::bind): the interface entry stores the coerced
/// `Arc<I>`, which shares the implementation's allocation.
pub async fn invoke_trait<I: ?Sized + Send + Sync + 'static>(
    container: &Container,
    ctx: &Context,
) -> DiResult<Arc<I>> {
    let key = key_of::<I>();
    let instance = container.resolve(ctx, &key).await?;
    match instance.downcast::<Arc<I>>() {
        Ok(wrapped) => Ok((*wrapped).clone()),
        Err(_) => Err(DiError::TypeMismatch {
            key,
            expected: type_name::<I>(),
        }),
    }
}

/// Resolves a bound interface `I` by its named key `<I>#<name>`.
pub async fn invoke_trait_named<I: ?Sized + Send + Sync + 'static>(
    container: &Container,
    ctx: &Context,
    name: &str,
) -> DiResult<Arc<I>> {
    let key = key_of_named::<I>(name);
    let instance = container.resolve(ctx, &key).await?;
    match instance.downcast::<Arc<I>>() {
        Ok(wrapped) => Ok((*wrapped).clone()),
        Err(_) => Err(DiError::TypeMismatch {
            key,
            expected: type_name::<I>(),
        }),
    }
}

/// Like [`invoke`], returning `None` on any failure.
pub async fn try_invoke<T: Send + Sync + 'static>(
    container: &Container,
    ctx: &Context,
) -> Option<Arc<T>> {
    invoke::<T>(container, ctx).await.ok()
}

/// Like [`invoke_named`], returning `None` on any failure.
pub async fn try_invoke_named<T: Send + Sync + 'static>(
    container: &Container,
    ctx: &Context,
    name: &str,
) -> Option<Arc<T>> {
    invoke_named::<T>(container, ctx, name).await.ok()
}

/// Whether `T`'s type key is registered.
pub fn has<T: ?Sized>(container: &Container) -> bool {
    container.has(&key_of::<T>())
}

/// Whether the named key `<T>#<name>` is registered.
pub fn has_named<T: ?Sized>(container: &Container, name: &str) -> bool {
    container.has(&key_of_named::<T>(name))
}

/// The cached instance for `T`, if it has been instantiated. Does not
/// construct.
pub fn instance_of<T: Send + Sync + 'static>(container: &Container) -> Option<Arc<T>> {
    container
        .instance_of(&key_of::<T>())
        .and_then(|instance| instance.downcast::<T>().ok())
}
