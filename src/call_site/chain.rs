//! Path-local cycle tracking while a call-site graph is being built.

use std::collections::HashMap;

use crate::error::{DiError, DiResult};
use crate::internal::circular::MAX_DEPTH;
use crate::key::ServiceType;

struct ChainItem {
    order: usize,
    implementation: Option<&'static str>,
}

/// Services currently under construction on one build path.
///
/// Entries are pushed on descent and removed on return, so a diamond
/// (two paths reaching the same service) is legal while a service that
/// reaches itself is not.
#[derive(Default)]
pub(crate) struct CallSiteChain {
    entries: HashMap<ServiceType, ChainItem>,
    next_order: usize,
}

impl CallSiteChain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn check_circular(&self, service_type: &ServiceType) -> DiResult<()> {
        if self.entries.contains_key(service_type) {
            return Err(DiError::CircularDependency {
                service: service_type.to_string(),
                path: self.path_to(service_type),
            });
        }
        Ok(())
    }

    pub(crate) fn add(&mut self, service_type: &ServiceType) -> DiResult<()> {
        if self.entries.len() >= MAX_DEPTH {
            return Err(DiError::DepthExceeded(self.entries.len()));
        }
        self.entries.insert(
            service_type.clone(),
            ChainItem {
                order: self.next_order,
                implementation: None,
            },
        );
        self.next_order += 1;
        Ok(())
    }

    pub(crate) fn remove(&mut self, service_type: &ServiceType) {
        self.entries.remove(service_type);
    }

    /// Records the implementation chosen for `service_type`.
    ///
    /// Returns `Ok(false)` when `service_type` is the entry most recently
    /// added without an implementation (the caller's own frame). Otherwise
    /// the service is entered as a new frame (`Ok(true)`, caller must
    /// remove it) after checking it is not already on the path.
    pub(crate) fn enter_implementation(
        &mut self,
        service_type: &ServiceType,
        implementation: &'static str,
    ) -> DiResult<bool> {
        let latest = self.entries.values().map(|e| e.order).max();
        if let Some(item) = self.entries.get_mut(service_type) {
            if item.implementation.is_none() && Some(item.order) == latest {
                item.implementation = Some(implementation);
                return Ok(false);
            }
        }
        self.check_circular(service_type)?;
        self.add(service_type)?;
        if let Some(item) = self.entries.get_mut(service_type) {
            item.implementation = Some(implementation);
        }
        Ok(true)
    }

    fn path_to(&self, service_type: &ServiceType) -> Vec<String> {
        let mut ordered: Vec<(&ServiceType, &ChainItem)> = self.entries.iter().collect();
        ordered.sort_by_key(|(_, item)| item.order);

        let mut path: Vec<String> = ordered
            .into_iter()
            .map(|(service, item)| match item.implementation {
                Some(implementation) if !service.to_string().ends_with(implementation) => {
                    format!("{service}({implementation})")
                }
                _ => service.to_string(),
            })
            .collect();
        path.push(service_type.to_string());
        path
    }
}
