//! Cancellation- and deadline-aware context passed to providers and hooks.
//!
//! A [`Context`] is a cheap-clone handle carrying three things: an optional
//! deadline, a cancellation flag with parent chaining, and an optional
//! [`RequestScope`]. Every provider, hook, decorator, and probe receives
//! one. The lifecycle orchestrator never forcibly unwinds a callback; the
//! context is how cancellation is communicated, and callbacks are expected
//! to honor it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::DiError;
use crate::scope::RequestScope;

/// Execution context for container operations.
///
/// Children created via [`with_timeout`](Context::with_timeout) or
/// [`with_request_scope`](Context::with_request_scope) inherit the parent's
/// deadline (taking the minimum) and request scope, and observe the parent's
/// cancellation.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use weft_di::Context;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let ctx = Context::background();
/// assert!(ctx.err().is_none());
///
/// let bounded = ctx.with_timeout(Duration::from_millis(10));
/// bounded.cancelled().await; // completes when the deadline passes
/// assert!(bounded.err().is_some());
/// assert!(ctx.err().is_none()); // parent unaffected
/// # });
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    cancelled: AtomicBool,
    parent: Option<Context>,
    scope: Option<Arc<RequestScope>>,
}

impl Context {
    /// The root context: no deadline, no cancellation, no request scope.
    pub fn background() -> Self {
        Self {
            inner: Arc::new(ContextInner {
                deadline: None,
                cancelled: AtomicBool::new(false),
                parent: None,
                scope: None,
            }),
        }
    }

    fn child(&self, deadline: Option<Instant>, scope: Option<Arc<RequestScope>>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                deadline,
                cancelled: AtomicBool::new(false),
                parent: Some(self.clone()),
                scope: scope.or_else(|| self.inner.scope.clone()),
            }),
        }
    }

    /// Derives a child context whose deadline is at most `timeout` from now
    /// (tighter inherited deadlines win).
    pub fn with_timeout(&self, timeout: Duration) -> Context {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a child context with an absolute deadline (tighter inherited
    /// deadlines win).
    pub fn with_deadline(&self, at: Instant) -> Context {
        let deadline = match self.inner.deadline {
            Some(inherited) => Some(inherited.min(at)),
            None => Some(at),
        };
        self.child(deadline, None)
    }

    /// Derives a child context carrying a fresh [`RequestScope`].
    ///
    /// Required before resolving [`Scope::Request`](crate::Scope::Request)
    /// services.
    pub fn with_request_scope(&self) -> Context {
        self.child(self.inner.deadline, Some(Arc::new(RequestScope::new())))
    }

    /// The request scope bound to this context, if any.
    pub fn request_scope(&self) -> Option<Arc<RequestScope>> {
        self.inner.scope.clone()
    }

    /// The effective deadline, if one is set.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Cancels this context and its descendants.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    /// True once cancelled explicitly, past the deadline, or once any
    /// ancestor is cancelled.
    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return true;
        }
        if matches!(self.inner.deadline, Some(d) if Instant::now() >= d) {
            return true;
        }
        match &self.inner.parent {
            Some(parent) => parent.is_cancelled(),
            None => false,
        }
    }

    /// The error describing why this context is done, or `None` while live.
    ///
    /// Deadline expiry reports [`DiError::Timeout`]; explicit cancellation
    /// reports [`DiError::Cancelled`].
    pub fn err(&self) -> Option<DiError> {
        if matches!(self.inner.deadline, Some(d) if Instant::now() >= d) {
            return Some(DiError::Timeout);
        }
        if self.is_cancelled() {
            return Some(DiError::Cancelled);
        }
        None
    }

    /// Completes when the context is cancelled or its deadline passes.
    ///
    /// Intended for `tokio::select!` against long-running work inside hooks
    /// and providers. Polls at millisecond granularity, so explicit
    /// cancellation is observed within ~1ms.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            match self.inner.deadline {
                // Deadlines wake precisely; explicit cancel is covered by the
                // 1ms re-check below.
                Some(d) => {
                    let tick = Instant::now() + Duration::from_millis(1);
                    tokio::time::sleep_until(d.min(tick).into()).await;
                }
                None => tokio::time::sleep(Duration::from_millis(1)).await,
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.inner.deadline)
            .field("cancelled", &self.is_cancelled())
            .field("request_scope", &self.inner.scope.is_some())
            .finish()
    }
}
