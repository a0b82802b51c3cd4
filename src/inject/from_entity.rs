use super::{ComponentDependencies, InjectionData};
use crate::storage::EntityManager;

pub(crate) type LookupWriter<S> = Box<dyn Fn(&mut S, &EntityManager, bool) + Send + Sync>;

pub(crate) struct LookupSlot<S> {
    pub(crate) data:  InjectionData,
    pub(crate) write: LookupWriter<S>,
}

/// The per-entity lookups declared by a system of type `S`.
pub struct InjectFromEntityData<S> {
    pub(crate) components: Vec<LookupSlot<S>>,
    pub(crate) buffers:    Vec<LookupSlot<S>>,
}

impl<S> Default for InjectFromEntityData<S> {
    fn default() -> Self { Self { components: Vec::new(), buffers: Vec::new() } }
}

impl<S> InjectFromEntityData<S> {
    /// Rebinds every lookup in `target` to `store`.
    pub fn update_injection(&self, target: &mut S, store: &EntityManager) {
        for slot in self.components.iter().chain(&self.buffers) {
            (slot.write)(target, store, slot.data.is_read_only);
        }
    }

    /// Registers the component types accessed through the lookups.
    pub fn extract_job_dependency_types(&self, deps: &mut ComponentDependencies) {
        for slot in self.components.iter().chain(&self.buffers) {
            deps.add_reader_writer(slot.data.component_type);
        }
    }

    /// The declared component lookups.
    pub fn component_lookups(&self) -> impl Iterator<Item = &InjectionData> + '_ {
        self.components.iter().map(|slot| &slot.data)
    }

    /// The declared buffer lookups.
    pub fn buffer_lookups(&self) -> impl Iterator<Item = &InjectionData> + '_ {
        self.buffers.iter().map(|slot| &slot.data)
    }

    /// Whether no lookups are declared.
    pub fn is_empty(&self) -> bool { self.components.is_empty() && self.buffers.is_empty() }
}
