//! Graph builder: turns a requested service type into a call site.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};

use super::chain::CallSiteChain;
use super::{CacheKey, CacheLocation, CallSite, CallSiteKind, ResultCache, SelfReference};
use crate::activation::{Constructor, Implementation};
use crate::descriptors::{RegisteredService, ServiceDescriptor, ServiceSource};
use crate::error::{ConfigurationError, ConstructorError, DiResult};
use crate::key::ServiceType;
use crate::overrides::ServiceOverride;
use crate::provider::{Scope, ServiceProvider};
use crate::registration::Registry;

/// Builds and caches call sites for one registration snapshot.
///
/// Lookup order for a requested type: exact registration (last added
/// wins), open generic closing, sequence synthesis, then overrides.
pub(crate) struct CallSiteFactory {
    registry: Registry,
    cache: Mutex<HashMap<CacheKey, Arc<CallSite>>>,
    locks: Mutex<HashMap<ServiceType, Arc<ReentrantMutex<()>>>>,
    overrides: Arc<[ServiceOverride]>,
}

impl CallSiteFactory {
    pub(crate) fn new(registry: Registry, overrides: Arc<[ServiceOverride]>) -> Self {
        let mut cache = HashMap::new();
        for (service_type, reference) in [
            (ServiceType::of::<ServiceProvider>(), SelfReference::Provider),
            (ServiceType::of::<Scope>(), SelfReference::Scope),
        ] {
            let site = CallSite::new(
                service_type.clone(),
                ResultCache::none(service_type.clone()),
                CallSiteKind::SelfReference(reference),
            );
            cache.insert(CacheKey::new(service_type, 0), Arc::new(site));
        }

        Self {
            registry,
            cache: Mutex::new(cache),
            locks: Mutex::new(HashMap::new()),
            overrides,
        }
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Call site for `service_type`, or `None` if nothing can produce it.
    pub(crate) fn get_call_site(
        &self,
        service_type: &ServiceType,
        chain: &mut CallSiteChain,
    ) -> DiResult<Option<Arc<CallSite>>> {
        if let Some(site) = self.cached(&CacheKey::new(service_type.clone(), 0)) {
            return Ok(Some(site));
        }
        self.create_call_site(service_type, chain)
    }

    /// Call site for one specific closed descriptor, at its own slot.
    pub(crate) fn get_call_site_for(
        &self,
        descriptor: &Arc<ServiceDescriptor>,
        chain: &mut CallSiteChain,
    ) -> DiResult<Option<Arc<CallSite>>> {
        let Some(service_type) = descriptor.service_type() else {
            return Ok(None);
        };
        let slot = self.registry.slot_of(descriptor);
        self.try_exact_descriptor(descriptor, service_type, chain, slot)
    }

    /// Whether a request for `service_type` could be satisfied by a
    /// registration, a sequence or a built-in.
    pub(crate) fn is_service(&self, service_type: &ServiceType) -> bool {
        if self.registry.exact(service_type).is_some() {
            return true;
        }
        if let Some(definition) = service_type.definition() {
            return service_type.sequence_item().is_some() || self.registry.open(definition).is_some();
        }
        service_type.is::<ServiceProvider>() || service_type.is::<Scope>()
    }

    /// Every call site compiled so far.
    #[cfg(feature = "diagnostics")]
    pub(crate) fn compiled(&self) -> Vec<Arc<CallSite>> {
        self.cache.lock().values().cloned().collect()
    }

    fn cached(&self, key: &CacheKey) -> Option<Arc<CallSite>> {
        self.cache.lock().get(key).cloned()
    }

    /// First published call site for `key` wins.
    fn publish(&self, key: CacheKey, site: Arc<CallSite>) -> Arc<CallSite> {
        self.cache.lock().entry(key).or_insert(site).clone()
    }

    fn lock_for(&self, service_type: &ServiceType) -> Arc<ReentrantMutex<()>> {
        self.locks
            .lock()
            .entry(service_type.clone())
            .or_insert_with(|| Arc::new(ReentrantMutex::new(())))
            .clone()
    }

    fn create_call_site(
        &self,
        service_type: &ServiceType,
        chain: &mut CallSiteChain,
    ) -> DiResult<Option<Arc<CallSite>>> {
        let lock = self.lock_for(service_type);
        let _guard = lock.lock();

        chain.check_circular(service_type)?;
        if let Some(site) = self.cached(&CacheKey::new(service_type.clone(), 0)) {
            return Ok(Some(site));
        }

        chain.add(service_type)?;
        let result = self.build(service_type, chain);
        chain.remove(service_type);
        result
    }

    fn build(&self, service_type: &ServiceType, chain: &mut CallSiteChain) -> DiResult<Option<Arc<CallSite>>> {
        if let Some(site) = self.try_exact(service_type, chain)? {
            return Ok(Some(site));
        }
        if let Some(site) = self.try_open_generic(service_type, chain)? {
            return Ok(Some(site));
        }
        if let Some(site) = self.try_enumerable(service_type, chain)? {
            return Ok(Some(site));
        }
        Ok(self.try_override(service_type))
    }

    fn try_exact(&self, service_type: &ServiceType, chain: &mut CallSiteChain) -> DiResult<Option<Arc<CallSite>>> {
        match self.registry.exact(service_type) {
            Some(group) => self.try_exact_descriptor(group.last(), service_type, chain, 0),
            None => Ok(None),
        }
    }

    fn try_open_generic(
        &self,
        service_type: &ServiceType,
        chain: &mut CallSiteChain,
    ) -> DiResult<Option<Arc<CallSite>>> {
        let Some(group) = service_type.definition().and_then(|d| self.registry.open(d)) else {
            return Ok(None);
        };
        self.try_open_descriptor(group.last(), service_type, chain, 0, true)
    }

    fn try_enumerable(
        &self,
        service_type: &ServiceType,
        chain: &mut CallSiteChain,
    ) -> DiResult<Option<Arc<CallSite>>> {
        let Some(item_type) = service_type.sequence_item() else {
            return Ok(None);
        };
        let key = CacheKey::new(service_type.clone(), 0);
        if let Some(site) = self.cached(&key) {
            return Ok(Some(site));
        }

        let mut location = CacheLocation::Root;
        let mut items = Vec::new();

        match self.registry.exact(item_type).filter(|_| !item_type.is_generic()) {
            Some(group) => {
                for (slot, descriptor) in group.with_slots() {
                    if let Some(site) = self.try_exact_descriptor(descriptor, item_type, chain, slot)? {
                        location = location.combine(site.location());
                        items.push(site);
                    }
                }
            }
            None => {
                // Closed registrations keep their own slots; closed-over open
                // ones are numbered after them so the keys never collide.
                let exact_count = self.registry.exact(item_type).map_or(0, |g| g.len());
                let mut open_slot = exact_count;
                for descriptor in self.registry.descriptors().iter().rev() {
                    let exact_slot = self.registry.slot_of(descriptor);
                    let site = match self.try_exact_descriptor(descriptor, item_type, chain, exact_slot)? {
                        Some(site) => Some(site),
                        None => {
                            let site = self.try_open_descriptor(descriptor, item_type, chain, open_slot, false)?;
                            if site.is_some() {
                                open_slot += 1;
                            }
                            site
                        }
                    };
                    if let Some(site) = site {
                        location = location.combine(site.location());
                        items.push(site);
                    }
                }
                items.reverse();
            }
        }

        let location = match location {
            CacheLocation::Root | CacheLocation::Scope => location,
            _ => CacheLocation::None,
        };
        let cache = ResultCache {
            location,
            key: key.clone(),
        };
        let site = CallSite::new(
            service_type.clone(),
            cache,
            CallSiteKind::Enumerable { items },
        );
        Ok(Some(self.publish(key, Arc::new(site))))
    }

    fn try_override(&self, service_type: &ServiceType) -> Option<Arc<CallSite>> {
        let found = self.overrides.iter().find(|o| o.matches(service_type))?;
        let site = CallSite::new(
            service_type.clone(),
            ResultCache::none(service_type.clone()),
            CallSiteKind::Override(found.factory().clone()),
        );
        Some(self.publish(CacheKey::new(service_type.clone(), 0), Arc::new(site)))
    }

    fn try_exact_descriptor(
        &self,
        descriptor: &Arc<ServiceDescriptor>,
        service_type: &ServiceType,
        chain: &mut CallSiteChain,
        slot: usize,
    ) -> DiResult<Option<Arc<CallSite>>> {
        let RegisteredService::Closed(registered) = descriptor.service() else {
            return Ok(None);
        };
        if registered != service_type {
            return Ok(None);
        }

        let key = CacheKey::new(service_type.clone(), slot);
        if let Some(site) = self.cached(&key) {
            return Ok(Some(site));
        }

        let cache = ResultCache::new(descriptor.lifetime(), service_type.clone(), slot);
        let site = match descriptor.source() {
            ServiceSource::Instance(value) => CallSite::new(
                service_type.clone(),
                ResultCache {
                    location: CacheLocation::None,
                    key: key.clone(),
                },
                CallSiteKind::Constant(value.clone()),
            ),
            ServiceSource::Factory(factory) => {
                CallSite::new(service_type.clone(), cache, CallSiteKind::Factory(factory.clone()))
            }
            ServiceSource::Implementation(implementation) => {
                let site = self.create_constructor_site(cache, service_type, implementation, chain)?;
                return Ok(Some(self.publish(key, site)));
            }
            ServiceSource::OpenImplementation(implementation) => {
                return Err(ConfigurationError::ClosedServiceWithOpenImplementation {
                    service: service_type.to_string(),
                    implementation: implementation.name().to_string(),
                }
                .into());
            }
        };
        Ok(Some(self.publish(key, Arc::new(site))))
    }

    fn try_open_descriptor(
        &self,
        descriptor: &Arc<ServiceDescriptor>,
        service_type: &ServiceType,
        chain: &mut CallSiteChain,
        slot: usize,
        throw: bool,
    ) -> DiResult<Option<Arc<CallSite>>> {
        let RegisteredService::Open(definition) = descriptor.service() else {
            return Ok(None);
        };
        if service_type.definition() != Some(definition) {
            return Ok(None);
        }
        let ServiceSource::OpenImplementation(implementation) = descriptor.source() else {
            return Ok(None);
        };

        let key = CacheKey::new(service_type.clone(), slot);
        if let Some(site) = self.cached(&key) {
            return Ok(Some(site));
        }

        let arguments = service_type.arguments();
        if arguments.len() != definition.arity() {
            if !throw {
                return Ok(None);
            }
            return Err(ConfigurationError::ArityMismatch {
                service: service_type.to_string(),
                implementation: implementation.name().to_string(),
                expected: definition.arity(),
                actual: arguments.len(),
            }
            .into());
        }

        let Some(closed) = implementation.close(arguments) else {
            if !throw {
                return Ok(None);
            }
            return Err(ConfigurationError::ClosingRejected {
                service: service_type.to_string(),
                implementation: implementation.name().to_string(),
            }
            .into());
        };

        let cache = ResultCache::new(descriptor.lifetime(), service_type.clone(), slot);
        let site = self.create_constructor_site(cache, service_type, &closed, chain)?;
        Ok(Some(self.publish(key, site)))
    }

    fn create_constructor_site(
        &self,
        cache: ResultCache,
        service_type: &ServiceType,
        implementation: &Implementation,
        chain: &mut CallSiteChain,
    ) -> DiResult<Arc<CallSite>> {
        let entered = chain.enter_implementation(service_type, implementation.name())?;
        let result = self.select_constructor(cache, service_type, implementation, chain);
        if entered {
            chain.remove(service_type);
        }
        result
    }

    fn select_constructor(
        &self,
        cache: ResultCache,
        service_type: &ServiceType,
        implementation: &Implementation,
        chain: &mut CallSiteChain,
    ) -> DiResult<Arc<CallSite>> {
        let name = implementation.name();
        let no_resolvable = || ConstructorError::NoResolvableConstructor {
            implementation: name.to_string(),
        };

        let (constructor, parameters) = match implementation.constructors() {
            [] => {
                return Err(ConstructorError::NoConstructor {
                    implementation: name.to_string(),
                }
                .into())
            }
            [only] => {
                let parameters = self
                    .create_argument_sites(only, name, chain, true)?
                    .ok_or_else(no_resolvable)?;
                (only.clone(), parameters)
            }
            many => {
                let mut ordered: Vec<&Arc<Constructor>> = many.iter().collect();
                ordered.sort_by(|a, b| b.parameters().len().cmp(&a.parameters().len()));

                let mut best: Option<(Arc<Constructor>, Vec<Arc<CallSite>>)> = None;
                let mut best_types: Option<HashSet<ServiceType>> = None;

                for candidate in ordered {
                    let Some(sites) = self.create_argument_sites(candidate, name, chain, false)? else {
                        continue;
                    };
                    match &best {
                        None => best = Some((candidate.clone(), sites)),
                        Some((chosen, _)) => {
                            let types = best_types.get_or_insert_with(|| {
                                chosen.parameters().iter().map(|p| p.service_type().clone()).collect()
                            });
                            if !candidate.parameters().iter().all(|p| types.contains(p.service_type())) {
                                return Err(ConstructorError::Ambiguous {
                                    implementation: name.to_string(),
                                    first: chosen.name().to_string(),
                                    second: candidate.name().to_string(),
                                }
                                .into());
                            }
                        }
                    }
                }

                best.ok_or_else(no_resolvable)?
            }
        };

        Ok(Arc::new(CallSite::new(
            service_type.clone(),
            cache,
            CallSiteKind::Constructor {
                implementation: name,
                constructor,
                parameters,
            },
        )))
    }

    fn create_argument_sites(
        &self,
        constructor: &Constructor,
        implementation: &'static str,
        chain: &mut CallSiteChain,
        throw: bool,
    ) -> DiResult<Option<Vec<Arc<CallSite>>>> {
        let mut sites = Vec::with_capacity(constructor.parameters().len());
        for parameter in constructor.parameters() {
            let service_type = parameter.service_type();
            let site = match self.get_call_site(service_type, chain)? {
                Some(site) => site,
                None => match parameter.default_value() {
                    Some(default) => Arc::new(CallSite::new(
                        service_type.clone(),
                        ResultCache::none(service_type.clone()),
                        CallSiteKind::Constant(default.clone()),
                    )),
                    None if throw => {
                        return Err(ConstructorError::UnresolvableParameter {
                            service: service_type.to_string(),
                            implementation: implementation.to_string(),
                        }
                        .into())
                    }
                    None => return Ok(None),
                },
            };
            sites.push(site);
        }
        Ok(Some(sites))
    }
}
