//! Descriptor lookup grouped by service, validated when a container is built.

use std::collections::HashMap;
use std::sync::Arc;

use crate::descriptors::{RegisteredService, ServiceDescriptor, ServiceSource};
use crate::error::{ConfigurationError, DiResult};
use crate::key::{GenericDefinition, ServiceType};

#[derive(Clone, PartialEq, Eq, Hash)]
enum RegistrationKey {
    Closed(ServiceType),
    Open(GenericDefinition),
}

/// Ordered descriptors sharing one service. Slot 0 is the last one added.
pub(crate) struct DescriptorGroup {
    descriptors: Vec<Arc<ServiceDescriptor>>,
}

impl DescriptorGroup {
    pub(crate) fn last(&self) -> &Arc<ServiceDescriptor> {
        // Groups are created with their first descriptor.
        &self.descriptors[self.descriptors.len() - 1]
    }

    pub(crate) fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Descriptors in registration order, each paired with its slot.
    pub(crate) fn with_slots(&self) -> impl Iterator<Item = (usize, &Arc<ServiceDescriptor>)> {
        let count = self.descriptors.len();
        self.descriptors
            .iter()
            .enumerate()
            .map(move |(i, d)| (count - i - 1, d))
    }

    fn slot_of(&self, descriptor: &Arc<ServiceDescriptor>) -> Option<usize> {
        let count = self.descriptors.len();
        self.descriptors
            .iter()
            .position(|d| Arc::ptr_eq(d, descriptor))
            .map(|i| count - i - 1)
    }
}

/// Registration snapshot used by one compiled engine.
pub(crate) struct Registry {
    descriptors: Vec<Arc<ServiceDescriptor>>,
    lookup: HashMap<RegistrationKey, DescriptorGroup>,
}

impl Registry {
    /// Validates descriptor shapes and groups them by service.
    pub(crate) fn build(descriptors: Vec<Arc<ServiceDescriptor>>) -> DiResult<Self> {
        let mut lookup: HashMap<RegistrationKey, DescriptorGroup> = HashMap::new();

        for descriptor in &descriptors {
            validate_shape(descriptor)?;
            let key = match descriptor.service() {
                RegisteredService::Closed(t) => RegistrationKey::Closed(t.clone()),
                RegisteredService::Open(d) => RegistrationKey::Open(d.clone()),
            };
            lookup
                .entry(key)
                .or_insert_with(|| DescriptorGroup { descriptors: Vec::new() })
                .descriptors
                .push(descriptor.clone());
        }

        Ok(Self { descriptors, lookup })
    }

    pub(crate) fn descriptors(&self) -> &[Arc<ServiceDescriptor>] {
        &self.descriptors
    }

    pub(crate) fn exact(&self, service_type: &ServiceType) -> Option<&DescriptorGroup> {
        self.lookup.get(&RegistrationKey::Closed(service_type.clone()))
    }

    pub(crate) fn open(&self, definition: &GenericDefinition) -> Option<&DescriptorGroup> {
        self.lookup.get(&RegistrationKey::Open(definition.clone()))
    }

    pub(crate) fn slot_of(&self, descriptor: &Arc<ServiceDescriptor>) -> usize {
        let key = match descriptor.service() {
            RegisteredService::Closed(t) => RegistrationKey::Closed(t.clone()),
            RegisteredService::Open(d) => RegistrationKey::Open(d.clone()),
        };
        self.lookup
            .get(&key)
            .and_then(|g| g.slot_of(descriptor))
            .unwrap_or(0)
    }
}

pub(crate) fn validate_shape(descriptor: &ServiceDescriptor) -> DiResult<()> {
    match (descriptor.service(), descriptor.source()) {
        (RegisteredService::Open(definition), ServiceSource::OpenImplementation(implementation)) => {
            if definition.arity() != implementation.arity() {
                return Err(ConfigurationError::ArityMismatch {
                    service: definition.to_string(),
                    implementation: implementation.name().to_string(),
                    expected: definition.arity(),
                    actual: implementation.arity(),
                }
                .into());
            }
            let mismatch = implementation
                .parameters()
                .iter()
                .zip(definition.parameters())
                .find(|(imp, svc)| !imp.constraints_within(svc));
            if let Some((parameter, _)) = mismatch {
                return Err(ConfigurationError::ConstraintMismatch {
                    service: definition.to_string(),
                    implementation: implementation.name().to_string(),
                    parameter: parameter.name().to_string(),
                }
                .into());
            }
            Ok(())
        }
        (RegisteredService::Open(definition), _) => Err(ConfigurationError::OpenServiceWithoutOpenImplementation {
            service: definition.to_string(),
        }
        .into()),
        (RegisteredService::Closed(service), ServiceSource::OpenImplementation(implementation)) => {
            Err(ConfigurationError::ClosedServiceWithOpenImplementation {
                service: service.to_string(),
                implementation: implementation.name().to_string(),
            }
            .into())
        }
        (RegisteredService::Closed(_), _) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::OpenImplementation;
    use crate::error::DiError;
    use crate::instance::erase;
    use crate::key::GenericParameter;
    use crate::lifetime::Lifetime;

    struct RepoMarker;

    fn open_impl(params: Vec<GenericParameter>) -> OpenImplementation {
        OpenImplementation::new("SqlRepository", params, |_| None)
    }

    #[test]
    fn slots_count_from_the_end() {
        let t = ServiceType::of::<u8>();
        let descriptors: Vec<_> = (0..3u8)
            .map(|i| Arc::new(ServiceDescriptor::instance(t.clone(), erase(Arc::new(i)))))
            .collect();
        let registry = Registry::build(descriptors.clone()).unwrap();
        let group = registry.exact(&t).unwrap();
        assert_eq!(group.len(), 3);
        assert!(Arc::ptr_eq(group.last(), &descriptors[2]));
        assert_eq!(registry.slot_of(&descriptors[0]), 2);
        assert_eq!(registry.slot_of(&descriptors[2]), 0);
        let slots: Vec<_> = group.with_slots().map(|(s, _)| s).collect();
        assert_eq!(slots, vec![2, 1, 0]);
    }

    #[test]
    fn open_service_needs_open_implementation() {
        let def = GenericDefinition::new::<RepoMarker>("Repository", vec![GenericParameter::new("T")]);
        let bad = ServiceDescriptor::new(
            RegisteredService::Open(def),
            Lifetime::Scoped,
            ServiceSource::Instance(erase(Arc::new(1u8))),
        );
        let err = Registry::build(vec![Arc::new(bad)]).err().unwrap();
        assert!(matches!(
            err,
            DiError::Configuration(ConfigurationError::OpenServiceWithoutOpenImplementation { .. })
        ));
    }

    #[test]
    fn arity_and_constraints_are_checked() {
        let def = GenericDefinition::new::<RepoMarker>("Repository", vec![GenericParameter::new("T")]);
        let wrong_arity = ServiceDescriptor::open_generic(
            def.clone(),
            Lifetime::Scoped,
            open_impl(vec![GenericParameter::new("T"), GenericParameter::new("U")]),
        );
        assert!(matches!(
            Registry::build(vec![Arc::new(wrong_arity)]).err().unwrap(),
            DiError::Configuration(ConfigurationError::ArityMismatch { expected: 1, actual: 2, .. })
        ));

        let constrained = ServiceDescriptor::open_generic(
            def,
            Lifetime::Scoped,
            open_impl(vec![GenericParameter::new("T").with_constraint("entity")]),
        );
        assert!(matches!(
            Registry::build(vec![Arc::new(constrained)]).err().unwrap(),
            DiError::Configuration(ConfigurationError::ConstraintMismatch { .. })
        ));
    }

    #[test]
    fn closed_service_rejects_open_implementation() {
        let bad = ServiceDescriptor::new(
            RegisteredService::Closed(ServiceType::of::<u8>()),
            Lifetime::Transient,
            ServiceSource::OpenImplementation(Arc::new(open_impl(vec![GenericParameter::new("T")]))),
        );
        assert!(matches!(
            Registry::build(vec![Arc::new(bad)]).err().unwrap(),
            DiError::Configuration(ConfigurationError::ClosedServiceWithOpenImplementation { .. })
        ));
    }
}
