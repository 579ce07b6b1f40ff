//! Scope validation over compiled call sites.
//!
//! Enabled with [`ProviderOptions::validate_scopes`](crate::ProviderOptions::validate_scopes).
//! Each call site is walked once when it is realized; the walk records the
//! first scoped service it reaches and rejects scoped services captured by
//! singletons. Every later resolution from the root scope checks that record.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::call_site::{CacheKey, CacheLocation, CallSite, CallSiteKind};
use crate::error::{DiResult, ScopeValidationError};
use crate::key::ServiceType;

#[derive(Default, Clone, Copy)]
struct ValidationState<'a> {
    singleton: Option<&'a ServiceType>,
}

#[derive(Default)]
pub(crate) struct CallSiteValidator {
    scoped_services: Mutex<HashMap<CacheKey, ServiceType>>,
}

impl CallSiteValidator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Walks `site`, failing on a scoped service beneath a singleton.
    pub(crate) fn validate_call_site(&self, site: &Arc<CallSite>) -> DiResult<()> {
        if let Some(scoped) = self.visit(site, ValidationState::default())? {
            self.scoped_services.lock().insert(site.cache.key.clone(), scoped);
        }
        Ok(())
    }

    /// Rejects resolving `site` from the root scope when it is, or depends
    /// on, a scoped service.
    pub(crate) fn validate_resolution(&self, site: &CallSite, from_root: bool) -> DiResult<()> {
        if !from_root {
            return Ok(());
        }
        let scoped = self.scoped_services.lock().get(&site.cache.key).cloned();
        match scoped {
            None => Ok(()),
            Some(scoped) if scoped == site.service_type => Err(ScopeValidationError::DirectScopedFromRoot {
                service: scoped.to_string(),
            }
            .into()),
            Some(scoped) => Err(ScopeValidationError::ScopedDependencyFromRoot {
                service: site.service_type.to_string(),
                scoped: scoped.to_string(),
            }
            .into()),
        }
    }

    fn visit<'a>(&self, site: &'a CallSite, mut state: ValidationState<'a>) -> DiResult<Option<ServiceType>> {
        match site.location() {
            CacheLocation::Root => {
                state.singleton = Some(&site.service_type);
                self.visit_main(site, state)
            }
            CacheLocation::Scope => {
                if let Some(singleton) = state.singleton {
                    return Err(ScopeValidationError::ScopedInSingleton {
                        scoped: site.service_type.to_string(),
                        singleton: singleton.to_string(),
                    }
                    .into());
                }
                self.visit_main(site, state)?;
                Ok(Some(site.service_type.clone()))
            }
            CacheLocation::Dispose | CacheLocation::None => self.visit_main(site, state),
        }
    }

    fn visit_main<'a>(&self, site: &'a CallSite, state: ValidationState<'a>) -> DiResult<Option<ServiceType>> {
        match &site.kind {
            CallSiteKind::Constructor { parameters: children, .. } | CallSiteKind::Enumerable { items: children, .. } => {
                let mut first_scoped = None;
                for child in children {
                    let scoped = self.visit(child, state)?;
                    if first_scoped.is_none() {
                        first_scoped = scoped;
                    }
                }
                Ok(first_scoped)
            }
            CallSiteKind::Constant(_)
            | CallSiteKind::Factory(_)
            | CallSiteKind::SelfReference(_)
            | CallSiteKind::Override(_) => Ok(None),
        }
    }
}
