//! Implementation types: explicit constructors instead of reflection.
//!
//! An [`Implementation`] lists one or more [`Constructor`]s. Each constructor
//! declares the service types of its parameters (optionally with a default
//! value) and an activation closure that receives the resolved arguments in
//! declaration order. When several constructors are declared, the container
//! picks the longest one whose parameters are all satisfiable.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::instance::{downcast, erase, AnyArc, Instance, OptionalValue, ServiceList};
use crate::key::{GenericParameter, ServiceType};

type Activator = Arc<dyn Fn(&mut Arguments) -> DiResult<Instance> + Send + Sync>;
type Closer = Arc<dyn Fn(&[ServiceType]) -> Option<Implementation> + Send + Sync>;

/// A declared constructor parameter.
#[derive(Clone)]
pub struct Parameter {
    service_type: ServiceType,
    default: Option<AnyArc>,
}

impl Parameter {
    pub fn service_type(&self) -> &ServiceType {
        &self.service_type
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub(crate) fn default_value(&self) -> Option<&AnyArc> {
        self.default.as_ref()
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("service_type", &self.service_type)
            .field("has_default", &self.has_default())
            .finish()
    }
}

/// One way of constructing an implementation.
#[derive(Clone)]
pub struct Constructor {
    name: &'static str,
    parameters: Vec<Parameter>,
    activate: Activator,
}

impl Constructor {
    /// Starts declaring a constructor called `name`.
    pub fn new(name: &'static str) -> ConstructorBuilder {
        ConstructorBuilder {
            name,
            parameters: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub(crate) fn activate(&self, implementation: &'static str, values: Vec<AnyArc>) -> DiResult<Instance> {
        let mut arguments = Arguments {
            implementation,
            values: values.into_iter(),
        };
        (self.activate)(&mut arguments)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Builder returned by [`Constructor::new`].
pub struct ConstructorBuilder {
    name: &'static str,
    parameters: Vec<Parameter>,
}

impl ConstructorBuilder {
    /// Declares a parameter of type `T`.
    pub fn param<T: ?Sized + 'static>(self) -> Self {
        self.param_type(ServiceType::of::<T>())
    }

    /// Declares a parameter of an arbitrary service type (sequences,
    /// optionals, closed generics).
    pub fn param_type(mut self, service_type: ServiceType) -> Self {
        self.parameters.push(Parameter {
            service_type,
            default: None,
        });
        self
    }

    /// Declares a parameter of type `T` that falls back to `default` when
    /// `T` cannot be resolved.
    pub fn param_or<T: ?Sized + Send + Sync + 'static>(mut self, default: Arc<T>) -> Self {
        self.parameters.push(Parameter {
            service_type: ServiceType::of::<T>(),
            default: Some(erase(default)),
        });
        self
    }

    /// Finishes with an activation closure producing the service value.
    pub fn build<S, F>(self, activate: F) -> Constructor
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&mut Arguments) -> DiResult<Arc<S>> + Send + Sync + 'static,
    {
        self.build_instance(move |args| activate(args).map(Instance::new))
    }

    /// Finishes with an activation closure producing an [`Instance`], for
    /// values that carry a disposer.
    pub fn build_instance<F>(self, activate: F) -> Constructor
    where
        F: Fn(&mut Arguments) -> DiResult<Instance> + Send + Sync + 'static,
    {
        Constructor {
            name: self.name,
            parameters: self.parameters,
            activate: Arc::new(activate),
        }
    }
}

/// Resolved constructor arguments, consumed in declaration order.
pub struct Arguments {
    implementation: &'static str,
    values: std::vec::IntoIter<AnyArc>,
}

impl Arguments {
    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    /// Next argument, as declared with `param::<T>()`.
    pub fn next<T: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<Arc<T>> {
        let value = self.next_any()?;
        downcast::<T>(&value).ok_or_else(|| self.mismatch::<T>())
    }

    /// Next argument, as declared with `param_type(ServiceType::sequence_of::<T>())`.
    pub fn next_all<T: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<Vec<Arc<T>>> {
        let value = self.next_any()?;
        let list = downcast::<ServiceList>(&value).ok_or_else(|| self.mismatch::<Vec<Arc<T>>>())?;
        list.0
            .iter()
            .map(|v| downcast::<T>(v).ok_or_else(|| self.mismatch::<T>()))
            .collect()
    }

    /// Next argument, as declared with `param_type(ServiceType::optional_of::<T>())`.
    pub fn next_optional<T: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<Option<Arc<T>>> {
        let value = self.next_any()?;
        let optional = downcast::<OptionalValue>(&value).ok_or_else(|| self.mismatch::<Option<Arc<T>>>())?;
        match &optional.0 {
            None => Ok(None),
            Some(inner) => downcast::<T>(inner).map(Some).ok_or_else(|| self.mismatch::<T>()),
        }
    }

    pub fn next_any(&mut self) -> DiResult<AnyArc> {
        self.values.next().ok_or_else(|| DiError::Activation {
            implementation: self.implementation.to_string(),
            message: "more arguments requested than declared".to_string(),
        })
    }

    fn mismatch<T: ?Sized>(&self) -> DiError {
        DiError::Activation {
            implementation: self.implementation.to_string(),
            message: format!("argument is not a {}", type_name::<T>()),
        }
    }
}

/// A closed implementation: a name and its constructors.
///
/// ```
/// use callsite_di::{Constructor, Implementation, Lifetime, ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Logger;
/// struct Handler { logger: Arc<Logger> }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Logger);
/// services.add_implementation::<Handler>(
///     Lifetime::Transient,
///     Implementation::new("Handler").constructor(
///         Constructor::new("new")
///             .param::<Logger>()
///             .build(|args| Ok(Arc::new(Handler { logger: args.next()? }))),
///     ),
/// );
///
/// let provider = services.build().unwrap();
/// let handler = provider.get_required::<Handler>();
/// assert!(Arc::ptr_eq(&handler.logger, &provider.get_required::<Logger>()));
/// ```
#[derive(Clone, Debug)]
pub struct Implementation {
    name: &'static str,
    constructors: Vec<Arc<Constructor>>,
}

impl Implementation {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            constructors: Vec::new(),
        }
    }

    /// Implementation with a single parameterless constructor.
    pub fn of<T, F>(name: &'static str, create: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::new(name).constructor(Constructor::new("new").build(move |_| Ok(Arc::new(create()))))
    }

    pub fn constructor(mut self, constructor: Constructor) -> Self {
        self.constructors.push(Arc::new(constructor));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn constructors(&self) -> &[Arc<Constructor>] {
        &self.constructors
    }
}

/// An open generic implementation.
///
/// `close` receives the requested type arguments and builds the closed
/// [`Implementation`], or returns `None` when the arguments violate the
/// implementation's constraints.
#[derive(Clone)]
pub struct OpenImplementation {
    name: &'static str,
    parameters: Arc<[GenericParameter]>,
    close: Closer,
}

impl OpenImplementation {
    pub fn new<F>(name: &'static str, parameters: Vec<GenericParameter>, close: F) -> Self
    where
        F: Fn(&[ServiceType]) -> Option<Implementation> + Send + Sync + 'static,
    {
        Self {
            name,
            parameters: parameters.into(),
            close: Arc::new(close),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    pub fn parameters(&self) -> &[GenericParameter] {
        &self.parameters
    }

    pub(crate) fn close(&self, arguments: &[ServiceType]) -> Option<Implementation> {
        (self.close)(arguments)
    }
}

impl fmt::Debug for OpenImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenImplementation")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}
