//! Error types for the dependency injection container.

use thiserror::Error;

/// Dependency injection errors.
///
/// Every failure the container can report while validating registrations,
/// compiling call sites or executing them. An unregistered service is *not*
/// an error at this level: [`resolve`](crate::ServiceProvider::resolve)
/// reports it as `Ok(None)`, and only the typed helpers turn it into
/// [`DiError::NotFound`].
///
/// # Examples
///
/// ```rust
/// use callsite_di::{DiError, ServiceCollection, Resolver};
///
/// let provider = ServiceCollection::new().build().unwrap();
/// match provider.get::<String>() {
///     Err(DiError::NotFound(name)) => assert_eq!(name, "alloc::string::String"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// A registration is malformed, or an open generic cannot be closed.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// No constructor of an implementation could be selected.
    #[error(transparent)]
    ConstructorResolution(#[from] ConstructorError),

    /// The dependency graph contains a cycle. `path` lists every service on
    /// the way down, ending with the repeated one.
    #[error("a circular dependency was detected for the service of type '{service}': {}", .path.join(" -> "))]
    CircularDependency { service: String, path: Vec<String> },

    /// A scoped service escaped into the root scope or a singleton.
    #[error(transparent)]
    ScopeValidation(#[from] ScopeValidationError),

    /// The scope or container was already disposed.
    #[error("cannot access a disposed {0}")]
    ObjectDisposed(&'static str),

    /// Build-time validation found one or more unconstructable services.
    #[error("some services are not able to be constructed ({})", join_failures(.0))]
    AggregateConstruction(Vec<DescriptorFailure>),

    /// Maximum graph or resolution depth exceeded.
    #[error("max depth {0} exceeded")]
    DepthExceeded(usize),

    /// A resolved value could not be downcast to the requested type.
    #[error("type mismatch for: {0}")]
    TypeMismatch(String),

    /// A typed accessor required a service that is not registered.
    #[error("service not found: {0}")]
    NotFound(String),

    /// A constructor or factory failed while producing its value.
    #[error("failed to activate '{implementation}': {message}")]
    Activation { implementation: String, message: String },

    /// A provider option could not be read from its source.
    #[error("invalid option '{key}': {message}")]
    InvalidOption { key: String, message: String },
}

/// Registration-shape errors raised when the container is built, or when an
/// open generic is closed over type arguments it cannot accept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("open generic service type '{service}' requires registering an open generic implementation type")]
    OpenServiceWithoutOpenImplementation { service: String },

    #[error("cannot instantiate implementation type '{implementation}' for service type '{service}'")]
    ClosedServiceWithOpenImplementation { service: String, implementation: String },

    #[error("arity of '{implementation}' ({actual}) does not match service type '{service}' ({expected})")]
    ArityMismatch {
        service: String,
        implementation: String,
        expected: usize,
        actual: usize,
    },

    #[error("generic parameter '{parameter}' of '{implementation}' has constraints that service type '{service}' does not declare")]
    ConstraintMismatch {
        service: String,
        implementation: String,
        parameter: String,
    },

    #[error("implementation '{implementation}' cannot be closed for service type '{service}'")]
    ClosingRejected { service: String, implementation: String },
}

/// Constructor selection failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructorError {
    #[error("a suitable constructor for type '{implementation}' could not be located")]
    NoConstructor { implementation: String },

    #[error("unable to resolve service for type '{service}' while attempting to activate '{implementation}'")]
    UnresolvableParameter { service: String, implementation: String },

    #[error("no constructor for type '{implementation}' can be instantiated using services from the service container and default values")]
    NoResolvableConstructor { implementation: String },

    #[error("unable to activate type '{implementation}': constructors '{first}' and '{second}' are ambiguous")]
    Ambiguous {
        implementation: String,
        first: String,
        second: String,
    },
}

/// Scoped-lifetime leaks detected when scope validation is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeValidationError {
    #[error("cannot resolve scoped service '{service}' from root provider")]
    DirectScopedFromRoot { service: String },

    #[error("cannot resolve '{service}' from root provider because it requires scoped service '{scoped}'")]
    ScopedDependencyFromRoot { service: String, scoped: String },

    #[error("cannot consume scoped service '{scoped}' from singleton '{singleton}'")]
    ScopedInSingleton { scoped: String, singleton: String },
}

/// One descriptor that failed build-time validation.
#[derive(Debug, Clone, Error)]
#[error("error while validating the service descriptor '{descriptor}': {error}")]
pub struct DescriptorFailure {
    pub descriptor: String,
    #[source]
    pub error: Box<DiError>,
}

fn join_failures(failures: &[DescriptorFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for DI operations.
///
/// ```rust
/// use callsite_di::{DiResult, DiError};
///
/// fn failing_operation() -> DiResult<()> {
///     Err(DiError::NotFound("some_service".to_string()))
/// }
///
/// assert!(failing_operation().is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_message_lists_path() {
        let err = DiError::CircularDependency {
            service: "A".into(),
            path: vec!["A(AImpl)".into(), "B".into(), "A".into()],
        };
        assert_eq!(
            err.to_string(),
            "a circular dependency was detected for the service of type 'A': A(AImpl) -> B -> A"
        );
    }

    #[test]
    fn aggregate_message_wraps_each_descriptor() {
        let err = DiError::AggregateConstruction(vec![DescriptorFailure {
            descriptor: "Service: Handler Lifetime: Transient".into(),
            error: Box::new(DiError::NotFound("Logger".into())),
        }]);
        let text = err.to_string();
        assert!(text.starts_with("some services are not able to be constructed"));
        assert!(text.contains("Service: Handler Lifetime: Transient"));
        assert!(text.contains("service not found: Logger"));
    }

    #[test]
    fn nested_errors_convert() {
        let err: DiError = ConstructorError::NoConstructor { implementation: "X".into() }.into();
        assert!(matches!(err, DiError::ConstructorResolution(_)));
    }
}
