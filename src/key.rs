//! Service identity: concrete types, generic definitions and closed generics.
//!
//! Rust has no runtime generic instantiation, so generic services are
//! described structurally: a [`GenericDefinition`] names the open type and
//! its parameters, and [`ServiceType::closed`] pairs it with concrete type
//! arguments. Two closed types are equal when their definitions and
//! arguments are equal.

use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use once_cell::sync::Lazy;

/// A generic type parameter together with the constraint tags it declares.
///
/// Constraint tags stand in for trait bounds: an open implementation may
/// only serve an open service whose matching parameter declares at least
/// the same tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericParameter {
    name: Cow<'static, str>,
    constraints: Vec<&'static str>,
}

impl GenericParameter {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            constraints: Vec::new(),
        }
    }

    /// Adds a constraint tag.
    pub fn with_constraint(mut self, tag: &'static str) -> Self {
        if !self.constraints.contains(&tag) {
            self.constraints.push(tag);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn constraints(&self) -> &[&'static str] {
        &self.constraints
    }

    /// True when every tag of `self` is also declared by `other`.
    pub(crate) fn constraints_within(&self, other: &GenericParameter) -> bool {
        self.constraints.iter().all(|tag| other.constraints.contains(tag))
    }
}

/// Identity of an open generic type such as `Repository<T>`.
///
/// The identity is a marker type chosen by the caller; the name is only used
/// for display.
///
/// ```rust
/// use callsite_di::{GenericDefinition, GenericParameter, ServiceType};
///
/// struct RepositoryMarker;
/// struct User;
///
/// let repository = GenericDefinition::new::<RepositoryMarker>(
///     "Repository",
///     vec![GenericParameter::new("T")],
/// );
/// let closed = ServiceType::closed(&repository, [ServiceType::of::<User>()]);
/// assert_eq!(closed.definition(), Some(&repository));
/// assert!(closed.to_string().starts_with("Repository<"));
/// ```
#[derive(Clone)]
pub struct GenericDefinition {
    id: TypeId,
    name: &'static str,
    parameters: Arc<[GenericParameter]>,
}

impl GenericDefinition {
    pub fn new<M: ?Sized + 'static>(name: &'static str, parameters: Vec<GenericParameter>) -> Self {
        Self {
            id: TypeId::of::<M>(),
            name,
            parameters: parameters.into(),
        }
    }

    /// Definition with `arity` unconstrained parameters named `T0`, `T1`, ...
    pub fn with_arity<M: ?Sized + 'static>(name: &'static str, arity: usize) -> Self {
        let parameters = (0..arity)
            .map(|i| GenericParameter::new(format!("T{i}")))
            .collect();
        Self::new::<M>(name, parameters)
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

    /// Closes this definition over `arguments`.
    pub fn close(&self, arguments: impl IntoIterator<Item = ServiceType>) -> ServiceType {
        ServiceType::closed(self, arguments)
    }
}

impl PartialEq for GenericDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for GenericDefinition {}

impl Hash for GenericDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for GenericDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<", self.name)?;
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(p.name())?;
        }
        f.write_str(">")
    }
}

impl fmt::Display for GenericDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

struct SequenceMarker;
struct OptionalMarker;

static SEQUENCE: Lazy<GenericDefinition> =
    Lazy::new(|| GenericDefinition::new::<SequenceMarker>("Sequence", vec![GenericParameter::new("T")]));

static OPTIONAL: Lazy<GenericDefinition> =
    Lazy::new(|| GenericDefinition::new::<OptionalMarker>("Optional", vec![GenericParameter::new("T")]));

/// Identity of a requested or registered service.
///
/// Concrete types (including `dyn Trait` objects) compare by [`TypeId`];
/// closed generics compare by definition and arguments.
#[derive(Clone)]
pub struct ServiceType(Repr);

#[derive(Clone)]
enum Repr {
    Concrete { id: TypeId, name: &'static str },
    Generic {
        definition: GenericDefinition,
        arguments: Arc<[ServiceType]>,
    },
}

impl ServiceType {
    /// Identity of a Rust type.
    pub fn of<T: ?Sized + 'static>() -> Self {
        ServiceType(Repr::Concrete {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        })
    }

    /// A generic definition closed over `arguments`. The argument count is
    /// not checked here; mismatches surface when the type is resolved.
    pub fn closed(definition: &GenericDefinition, arguments: impl IntoIterator<Item = ServiceType>) -> Self {
        ServiceType(Repr::Generic {
            definition: definition.clone(),
            arguments: arguments.into_iter().collect(),
        })
    }

    /// The ordered sequence of every registration of `item`.
    pub fn sequence(item: ServiceType) -> Self {
        Self::closed(&SEQUENCE, [item])
    }

    pub fn sequence_of<T: ?Sized + 'static>() -> Self {
        Self::sequence(Self::of::<T>())
    }

    /// The soft-optional wrapper around `inner`.
    pub fn optional(inner: ServiceType) -> Self {
        Self::closed(&OPTIONAL, [inner])
    }

    pub fn optional_of<T: ?Sized + 'static>() -> Self {
        Self::optional(Self::of::<T>())
    }

    /// Built-in definition backing [`ServiceType::sequence`].
    pub fn sequence_definition() -> &'static GenericDefinition {
        &SEQUENCE
    }

    /// Built-in definition backing [`ServiceType::optional`].
    pub fn optional_definition() -> &'static GenericDefinition {
        &OPTIONAL
    }

    pub fn is_generic(&self) -> bool {
        matches!(self.0, Repr::Generic { .. })
    }

    pub fn definition(&self) -> Option<&GenericDefinition> {
        match &self.0 {
            Repr::Generic { definition, .. } => Some(definition),
            Repr::Concrete { .. } => None,
        }
    }

    pub fn arguments(&self) -> &[ServiceType] {
        match &self.0 {
            Repr::Generic { arguments, .. } => arguments,
            Repr::Concrete { .. } => &[],
        }
    }

    /// Item type when this is `Sequence<T>`.
    pub fn sequence_item(&self) -> Option<&ServiceType> {
        self.single_argument_of(&SEQUENCE)
    }

    /// Inner type when this is `Optional<T>`.
    pub fn optional_inner(&self) -> Option<&ServiceType> {
        self.single_argument_of(&OPTIONAL)
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        matches!(self.0, Repr::Concrete { id, .. } if id == TypeId::of::<T>())
    }

    fn single_argument_of(&self, definition: &GenericDefinition) -> Option<&ServiceType> {
        match &self.0 {
            Repr::Generic { definition: d, arguments } if d == definition && arguments.len() == 1 => {
                arguments.first()
            }
            _ => None,
        }
    }
}

impl PartialEq for ServiceType {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Repr::Concrete { id: a, .. }, Repr::Concrete { id: b, .. }) => a == b,
            (
                Repr::Generic { definition: da, arguments: aa },
                Repr::Generic { definition: db, arguments: ab },
            ) => da == db && aa == ab,
            _ => false,
        }
    }
}

impl Eq for ServiceType {}

impl Hash for ServiceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Repr::Concrete { id, .. } => {
                0u8.hash(state);
                id.hash(state);
            }
            Repr::Generic { definition, arguments } => {
                1u8.hash(state);
                definition.hash(state);
                arguments.hash(state);
            }
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Concrete { name, .. } => f.write_str(name),
            Repr::Generic { definition, arguments } => {
                write!(f, "{}<", definition.name())?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    fmt::Display::fmt(arg, f)?;
                }
                f.write_str(">")
            }
        }
    }
}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceType({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct RepoMarker;
    struct User;
    struct Order;
    trait Logger {}

    fn repo() -> GenericDefinition {
        GenericDefinition::new::<RepoMarker>("Repository", vec![GenericParameter::new("T")])
    }

    #[test]
    fn closed_generics_compare_structurally() {
        let a = ServiceType::closed(&repo(), [ServiceType::of::<User>()]);
        let b = repo().close([ServiceType::of::<User>()]);
        let c = ServiceType::closed(&repo(), [ServiceType::of::<Order>()]);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a.clone(), b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn trait_objects_have_identity() {
        let t = ServiceType::of::<dyn Logger>();
        assert!(t.is::<dyn Logger>());
        assert!(!t.is_generic());
        assert!(t.to_string().contains("Logger"));
    }

    #[test]
    fn sequence_and_optional_unwrap() {
        let seq = ServiceType::sequence_of::<User>();
        assert_eq!(seq.sequence_item(), Some(&ServiceType::of::<User>()));
        assert_eq!(seq.optional_inner(), None);

        let opt = ServiceType::optional_of::<User>();
        assert_eq!(opt.optional_inner(), Some(&ServiceType::of::<User>()));
        assert_ne!(seq, opt);
    }

    #[test]
    fn constraint_subset() {
        let loose = GenericParameter::new("T");
        let strict = GenericParameter::new("T").with_constraint("entity").with_constraint("entity");
        assert_eq!(strict.constraints().len(), 1);
        assert!(loose.constraints_within(&strict));
        assert!(!strict.constraints_within(&loose));
    }

    #[test]
    fn display_of_arity_definition() {
        struct PairMarker;
        let def = GenericDefinition::with_arity::<PairMarker>("Pair", 2);
        assert_eq!(def.to_string(), "Pair<T0, T1>");
    }
}
