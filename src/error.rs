//! Error types for the dependency injection container.
//!
//! User-supplied providers, hooks, decorators, and probes return plain
//! [`BoxError`] values; the container wraps them with context (which key,
//! which stage) as it propagates them. Startup errors short-circuit at the
//! first failure; shutdown errors are aggregated into a single
//! [`DiError::ShutdownFailed`].

use std::fmt;

use thiserror::Error;

use crate::key::ServiceKey;

/// Boxed error type accepted from user callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for DI operations.
pub type DiResult<T> = Result<T, DiError>;

/// Errors surfaced by the container.
#[derive(Debug, Error)]
pub enum DiError {
    /// Resolve was called for a key with no registration.
    #[error("no provider registered for {0}")]
    ServiceNotFound(ServiceKey),

    /// Register was called for a key that already has a registration.
    #[error("service already registered: {0}")]
    DuplicateService(ServiceKey),

    /// A registration would create a cycle, or the resolver re-entered a key
    /// already under construction.
    #[error("circular dependency detected: {}", join_keys(.0))]
    CircularDependency(Vec<ServiceKey>),

    /// Resolution failed below this key (a dependency failed, or a typed
    /// facade could not produce the requested type).
    #[error("failed to resolve {key}")]
    ResolutionFailed {
        key: ServiceKey,
        #[source]
        source: BoxError,
    },

    /// The provider body itself returned an error.
    #[error("provider for {key} returned error")]
    ProviderFailed {
        key: ServiceKey,
        #[source]
        source: BoxError,
    },

    /// A decorator returned an error; the instance is discarded.
    #[error("decorator failed for {key}")]
    DecoratorFailed {
        key: ServiceKey,
        #[source]
        source: BoxError,
    },

    /// A typed decorator received an instance that is not the decorated type.
    #[error("decorator type mismatch for {key}: expected {expected}")]
    DecoratorTypeMismatch {
        key: ServiceKey,
        expected: &'static str,
    },

    /// A typed accessor could not downcast the stored instance.
    #[error("type mismatch for {key}: expected {expected}")]
    TypeMismatch {
        key: ServiceKey,
        expected: &'static str,
    },

    /// A request-scoped service was resolved without a request scope bound to
    /// the context.
    #[error("request scope not found in context for {0}; use Context::with_request_scope")]
    ScopeNotFound(ServiceKey),

    /// Resolve or an on-start hook failed while starting a service.
    #[error("failed to start {key}")]
    StartupFailed {
        key: ServiceKey,
        #[source]
        source: BoxError,
    },

    /// An on-stop hook failed while stopping a service.
    #[error("failed to stop {key}")]
    StopFailed {
        key: ServiceKey,
        #[source]
        source: BoxError,
    },

    /// Aggregate of every error collected during shutdown.
    #[error("shutdown errors: [{}]", join_errors(.0))]
    ShutdownFailed(Vec<DiError>),

    /// A health or readiness probe reported down.
    #[error("health check failed for {name}")]
    HealthCheckFailed {
        name: ServiceKey,
        #[source]
        source: Option<BoxError>,
    },

    /// Validate found dangling dependencies or cycles.
    #[error("container validation failed: {}", validation_detail(.missing, .cycles))]
    ValidationFailed {
        missing: Vec<ServiceKey>,
        cycles: Vec<Vec<ServiceKey>>,
    },

    /// A module failed partway through apply.
    #[error("failed to apply module {module}")]
    ModuleApplyFailed {
        module: String,
        #[source]
        source: Box<DiError>,
    },

    /// Start was called while the container was Starting or Running.
    #[error("container already started")]
    ContainerAlreadyStarted,

    /// The context deadline expired.
    #[error("deadline exceeded")]
    Timeout,

    /// The context was cancelled.
    #[error("context cancelled")]
    Cancelled,
}

impl DiError {
    /// The kind of this error, for matching without destructuring.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DiError::ServiceNotFound(_) => ErrorKind::ServiceNotFound,
            DiError::DuplicateService(_) => ErrorKind::DuplicateService,
            DiError::CircularDependency(_) => ErrorKind::CircularDependency,
            DiError::ResolutionFailed { .. } => ErrorKind::ResolutionFailed,
            DiError::ProviderFailed { .. } => ErrorKind::ProviderFailed,
            DiError::DecoratorFailed { .. } => ErrorKind::DecoratorFailed,
            DiError::DecoratorTypeMismatch { .. } => ErrorKind::DecoratorTypeMismatch,
            DiError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            DiError::ScopeNotFound(_) => ErrorKind::ScopeNotFound,
            DiError::StartupFailed { .. } => ErrorKind::StartupFailed,
            DiError::StopFailed { .. } => ErrorKind::StopFailed,
            DiError::ShutdownFailed(_) => ErrorKind::ShutdownFailed,
            DiError::HealthCheckFailed { .. } => ErrorKind::HealthCheckFailed,
            DiError::ValidationFailed { .. } => ErrorKind::ValidationFailed,
            DiError::ModuleApplyFailed { .. } => ErrorKind::ModuleApplyFailed,
            DiError::ContainerAlreadyStarted => ErrorKind::ContainerAlreadyStarted,
            DiError::Timeout => ErrorKind::Timeout,
            DiError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// True for [`DiError::ServiceNotFound`].
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::ServiceNotFound
    }

    /// True for [`DiError::CircularDependency`].
    pub fn is_circular(&self) -> bool {
        self.kind() == ErrorKind::CircularDependency
    }

    /// True if this error, or any error in its source chain, is a deadline
    /// expiry.
    pub fn is_timeout(&self) -> bool {
        if self.kind() == ErrorKind::Timeout {
            return true;
        }
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            if matches!(err.downcast_ref::<DiError>(), Some(e) if e.kind() == ErrorKind::Timeout) {
                return true;
            }
            source = err.source();
        }
        if let DiError::ShutdownFailed(errors) = self {
            return errors.iter().any(DiError::is_timeout);
        }
        false
    }
}

/// Discriminant of [`DiError`], mirroring the error taxonomy one-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ServiceNotFound,
    DuplicateService,
    CircularDependency,
    ResolutionFailed,
    ProviderFailed,
    DecoratorFailed,
    DecoratorTypeMismatch,
    TypeMismatch,
    ScopeNotFound,
    StartupFailed,
    StopFailed,
    ShutdownFailed,
    HealthCheckFailed,
    ValidationFailed,
    ModuleApplyFailed,
    ContainerAlreadyStarted,
    Timeout,
    Cancelled,
}

fn join_keys(keys: &[ServiceKey]) -> String {
    keys.iter()
        .map(ServiceKey::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn join_errors(errors: &[DiError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn validation_detail(missing: &[ServiceKey], cycles: &[Vec<ServiceKey>]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing dependencies: [{}]", join_keys(missing)));
    }
    if !cycles.is_empty() {
        let rendered = cycles
            .iter()
            .map(|c| join_keys(c))
            .collect::<Vec<_>>()
            .join("], [");
        parts.push(format!("cycles: [{rendered}]"));
    }
    parts.join("; ")
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ServiceNotFound => "SERVICE_NOT_FOUND",
            ErrorKind::DuplicateService => "DUPLICATE_SERVICE",
            ErrorKind::CircularDependency => "CIRCULAR_DEPENDENCY",
            ErrorKind::ResolutionFailed => "RESOLUTION_FAILED",
            ErrorKind::ProviderFailed => "PROVIDER_FAILED",
            ErrorKind::DecoratorFailed => "DECORATOR_FAILED",
            ErrorKind::DecoratorTypeMismatch => "DECORATOR_TYPE_MISMATCH",
            ErrorKind::TypeMismatch => "TYPE_MISMATCH",
            ErrorKind::ScopeNotFound => "SCOPE_NOT_FOUND",
            ErrorKind::StartupFailed => "STARTUP_FAILED",
            ErrorKind::StopFailed => "STOP_FAILED",
            ErrorKind::ShutdownFailed => "SHUTDOWN_FAILED",
            ErrorKind::HealthCheckFailed => "HEALTH_CHECK_FAILED",
            ErrorKind::ValidationFailed => "VALIDATION_FAILED",
            ErrorKind::ModuleApplyFailed => "MODULE_APPLY_FAILED",
            ErrorKind::ContainerAlreadyStarted => "CONTAINER_ALREADY_STARTED",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_display_joins_path() {
        let err = DiError::CircularDependency(vec![
            ServiceKey::from("A"),
            ServiceKey::from("B"),
            ServiceKey::from("A"),
        ]);
        assert_eq!(
            err.to_string(),
            "circular dependency detected: A -> B -> A"
        );
        assert!(err.is_circular());
    }

    #[test]
    fn wrapped_errors_expose_source() {
        let inner = DiError::ServiceNotFound(ServiceKey::from("db"));
        let outer = DiError::ResolutionFailed {
            key: ServiceKey::from("server"),
            source: Box::new(inner),
        };
        let source = std::error::Error::source(&outer).expect("source");
        assert!(source.to_string().contains("db"));
        assert_eq!(outer.kind(), ErrorKind::ResolutionFailed);
    }

    #[test]
    fn timeout_detected_through_aggregation() {
        let err = DiError::ShutdownFailed(vec![DiError::StopFailed {
            key: ServiceKey::from("slow"),
            source: Box::new(DiError::Timeout),
        }]);
        assert!(err.is_timeout());
    }
}
