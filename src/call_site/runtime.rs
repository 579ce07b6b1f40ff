//! Call-site executor.
//!
//! Walks a compiled call site against a scope, honouring its cache
//! location:
//!
//! - `Root`: built once against the root scope and memoised on the call site
//! - `Scope`: built once per scope through a per-key one-shot cell
//! - `Dispose`: built fresh, disposer captured by the resolving scope
//! - `None`: built fresh, nothing captured
//!
//! Parameters are executed before their constructor, left to right.

use std::sync::Arc;

use super::{CacheLocation, CallSite, CallSiteKind, SelfReference};
use crate::error::DiResult;
use crate::instance::{AnyArc, Instance, ServiceList};
use crate::internal::{catch_resolution_panic, StackGuard, ROOT_OWNER};
use crate::provider::{Engine, ResolverContext, Scope};

pub(crate) fn resolve(site: &Arc<CallSite>, scope: &Scope, engine: &Arc<Engine>) -> DiResult<AnyArc> {
    visit_cache(site, scope, engine)
}

fn visit_cache(site: &Arc<CallSite>, scope: &Scope, engine: &Arc<Engine>) -> DiResult<AnyArc> {
    match site.location() {
        CacheLocation::Root => visit_root(site, scope, engine),
        CacheLocation::Scope => visit_scope(site, scope, engine),
        CacheLocation::Dispose => {
            let _guard = enter(site, scope)?;
            let instance = construct(site, scope, engine)?;
            scope.capture(instance)
        }
        CacheLocation::None => {
            let _guard = enter(site, scope)?;
            Ok(construct(site, scope, engine)?.value)
        }
    }
}

fn visit_root(site: &Arc<CallSite>, scope: &Scope, engine: &Arc<Engine>) -> DiResult<AnyArc> {
    if let Some(value) = site.value.get() {
        return Ok(value.clone());
    }

    let _guard = StackGuard::enter(&site.cache.key, ROOT_OWNER, site.implementation_name())?;
    let root = scope.root();
    site.value
        .get_or_try_init(|| {
            let instance = construct(site, &root, engine)?;
            root.capture(instance)
        })
        .cloned()
}

fn visit_scope(site: &Arc<CallSite>, scope: &Scope, engine: &Arc<Engine>) -> DiResult<AnyArc> {
    let cell = scope.state.cell_for(&site.cache.key, engine.generation);
    if let Some(value) = cell.get() {
        return Ok(value.clone());
    }

    let _guard = enter(site, scope)?;
    cell.get_or_try_init(|| {
        let instance = construct(site, scope, engine)?;
        scope.capture(instance)
    })
    .cloned()
}

/// Guards a call site whose result belongs to `scope`.
fn enter(site: &CallSite, scope: &Scope) -> DiResult<StackGuard> {
    let owner = Arc::as_ptr(&scope.state) as usize;
    StackGuard::enter(&site.cache.key, owner, site.implementation_name())
}

fn construct(site: &Arc<CallSite>, scope: &Scope, engine: &Arc<Engine>) -> DiResult<Instance> {
    match &site.kind {
        CallSiteKind::Constant(value) => Ok(Instance::shared(value.clone())),
        CallSiteKind::Factory(factory) => {
            let context = ResolverContext::new(scope, engine);
            catch_resolution_panic(|| factory(&context))
        }
        CallSiteKind::Constructor {
            implementation,
            constructor,
            parameters,
        } => {
            let values = parameters
                .iter()
                .map(|p| visit_cache(p, scope, engine))
                .collect::<DiResult<Vec<_>>>()?;
            catch_resolution_panic(|| constructor.activate(*implementation, values))
        }
        CallSiteKind::Enumerable { items, .. } => {
            let values = items
                .iter()
                .map(|item| visit_cache(item, scope, engine))
                .collect::<DiResult<Vec<_>>>()?;
            Ok(Instance::new(Arc::new(ServiceList(values))))
        }
        CallSiteKind::SelfReference(SelfReference::Provider) => Ok(Instance::new(Arc::new(scope.provider()))),
        CallSiteKind::SelfReference(SelfReference::Scope) => Ok(Instance::new(Arc::new(scope.clone()))),
        CallSiteKind::Override(factory) => {
            let context = ResolverContext::new(scope, engine);
            catch_resolution_panic(|| factory(&site.service_type, &context)).map(Instance::shared)
        }
    }
}
