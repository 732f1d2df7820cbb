//! Interface binding and typed decoration.
//!
//! [`bind`] aliases an interface key to an implementation key: the interface
//! entry's provider resolves the implementation and returns the same
//! underlying instance, and the declared dependency edge keeps the graph
//! ordering both correctly. Because Rust has no implicit interface
//! satisfaction, the caller supplies the unsize coercion — typically
//! `|t| t as Arc<dyn Trait>`.
//!
//! [`decorate`] and friends push wrap functions that run after construction
//! in registration order; a decorator must accept and return the same
//! logical type, and a runtime downcast failure surfaces
//! `DecoratorTypeMismatch`.

use std::any::type_name;
use std::future::Future;
use std::sync::Arc;

use crate::container::Container;
use crate::context::Context;
use crate::error::{BoxError, DiError, DiResult};
use crate::key::{key_of, key_of_named, ServiceKey};
use crate::registry::{BoxFuture, DecoratorFn, Instance, ProviderFn};

pub(crate) type CoerceFn<I, T> = Arc<dyn Fn(Arc<T>) -> Arc<I> + Send + Sync>;

/// Binds interface `I` to implementation `T`.
///
/// Resolving `I`'s key resolves `T` and yields the same instance (the
/// coercion preserves the allocation). The interface entry declares a
/// dependency on `T`, so startup constructs `T` first.
///
/// ```
/// use std::sync::Arc;
/// use weft_di::{bind, invoke_trait, provide, Container, Context};
///
/// trait Notifier: Send + Sync {
///     fn channel(&self) -> &str;
/// }
///
/// struct EmailNotifier;
/// impl Notifier for EmailNotifier {
///     fn channel(&self) -> &str {
///         "email"
///     }
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let container = Container::new();
/// provide::<EmailNotifier, _, _>(&container, |_ctx, _c| async { Ok(EmailNotifier) }).unwrap();
/// bind::<dyn Notifier, EmailNotifier, _>(&container, |t| t).unwrap();
///
/// let ctx = Context::background();
/// let notifier = invoke_trait::<dyn Notifier>(&container, &ctx).await.unwrap();
/// assert_eq!(notifier.channel(), "email");
/// # });
/// ```
pub fn bind<I, T, F>(container: &Container, coerce: F) -> DiResult<()>
where
    I: ?Sized + Send + Sync + 'static,
    T: Send + Sync + 'static,
    F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
{
    bind_key::<I, T>(container, key_of::<I>(), Arc::new(coerce))
}

/// Binds interface `I` to implementation `T` under the named key
/// `<I>#<name>`.
pub fn bind_named<I, T, F>(container: &Container, name: &str, coerce: F) -> DiResult<()>
where
    I: ?Sized + Send + Sync + 'static,
    T: Send + Sync + 'static,
    F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
{
    bind_key::<I, T>(container, key_of_named::<I>(name), Arc::new(coerce))
}

pub(crate) fn bind_key<I, T>(
    container: &Container,
    interface_key: ServiceKey,
    coerce: CoerceFn<I, T>,
) -> DiResult<()>
where
    I: ?Sized + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    let impl_key = key_of::<T>();
    let provider_impl_key = impl_key.clone();

    let provider: ProviderFn = Arc::new(move |ctx, c| {
        let impl_key = provider_impl_key.clone();
        let coerce = Arc::clone(&coerce);
        Box::pin(async move {
            let instance = c.resolve(&ctx, &impl_key).await?;
            let typed = instance
                .downcast::<T>()
                .map_err(|_| DiError::TypeMismatch {
                    key: impl_key,
                    expected: type_name::<T>(),
                })?;
            let interface: Arc<I> = coerce(typed);
            Ok(Arc::new(interface) as Instance)
        })
    });

    container.register(interface_key, provider, vec![impl_key])
}

/// Pushes a decorator for the concrete type `T`.
pub fn decorate<T, F, Fut>(container: &Container, decorator: F)
where
    T: Send + Sync + 'static,
    F: Fn(Context, Container, Arc<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<T>, BoxError>> + Send + 'static,
{
    decorate_key::<T, F, Fut>(container, key_of::<T>(), decorator);
}

/// Pushes a decorator for the named key `<T>#<name>`.
pub fn decorate_named<T, F, Fut>(container: &Container, name: &str, decorator: F)
where
    T: Send + Sync + 'static,
    F: Fn(Context, Container, Arc<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<T>, BoxError>> + Send + 'static,
{
    decorate_key::<T, F, Fut>(container, key_of_named::<T>(name), decorator);
}

pub(crate) fn decorate_key<T, F, Fut>(container: &Container, key: ServiceKey, decorator: F)
where
    T: Send + Sync + 'static,
    F: Fn(Context, Container, Arc<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<T>, BoxError>> + Send + 'static,
{
    let mismatch_key = key.clone();
    let wrapped: DecoratorFn = Arc::new(move |ctx, c, instance| {
        let fut: BoxFuture<Result<Instance, BoxError>> = match instance.downcast::<T>() {
            Ok(typed) => {
                let inner = decorator(ctx, c, typed);
                Box::pin(async move {
                    let decorated: Instance = inner.await?;
                    Ok(decorated)
                })
            }
            Err(_) => {
                let key = mismatch_key.clone();
                Box::pin(async move {
                    Err(Box::new(DiError::DecoratorTypeMismatch {
                        key,
                        expected: type_name::<T>(),
                    }) as BoxError)
                })
            }
        };
        fut
    });
    container.add_decorator(key, wrapped);
}

/// Pushes a decorator for a bound interface `I` (the entry registered by
/// [`bind`], storing `Arc<I>`).
pub fn decorate_trait<I, F, Fut>(container: &Container, decorator: F)
where
    I: ?Sized + Send + Sync + 'static,
    F: Fn(Context, Container, Arc<I>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<I>, BoxError>> + Send + 'static,
{
    let key = key_of::<I>();
    let mismatch_key = key.clone();
    let wrapped: DecoratorFn = Arc::new(move |ctx, c, instance| {
        let fut: BoxFuture<Result<Instance, BoxError>> = match instance.downcast::<Arc<I>>() {
            Ok(interface) => {
                let inner = decorator(ctx, c, (*interface).clone());
                Box::pin(async move {
                    let decorated = inner.await?;
                    Ok(Arc::new(decorated) as Instance)
                })
            }
            Err(_) => {
                let key = mismatch_key.clone();
                Box::pin(async move {
                    Err(Box::new(DiError::DecoratorTypeMismatch {
                        key,
                        expected: type_name::<I>(),
                    }) as BoxError)
                })
            }
        };
        fut
    });
    container.add_decorator(key, wrapped);
}
