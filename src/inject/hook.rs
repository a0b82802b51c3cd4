//! Hooks teach the injection layer to bind field types beyond the built-in shapes.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::decl::CustomSlot;
use super::FieldInfo;
use crate::comp::ComponentType;
use crate::error::SetupError;
use crate::group::{ChunkIterator, ComponentGroup};
use crate::util::DbgTypeId;

/// A pluggable binding for fields declared with
/// [`AggregateDecl::custom`](super::AggregateDecl::custom).
pub trait InjectionHook: Send + Sync {
    /// A name for this hook used in diagnostics.
    fn name(&self) -> &str;

    /// The field type this hook binds.
    fn field_type(&self) -> DbgTypeId;

    /// Whether this hook handles `field`.
    ///
    /// This must be a pure function of the field.
    fn is_interested_in_field(&self, field: &FieldInfo) -> bool {
        field.field_type == self.field_type()
    }

    /// Rejects field declarations the hook cannot bind.
    fn validate_field(&self, field: &FieldInfo) -> Result<(), String> {
        let _ = field;
        Ok(())
    }

    /// Component types that entities must have (or lack) for the field to be bound.
    ///
    /// These requirements join the query of the aggregate declaring the field.
    fn component_requirements(&self, field: &FieldInfo) -> Vec<ComponentType> {
        let _ = field;
        Vec::new()
    }

    /// Called once after the query of the aggregate is resolved.
    fn prepare_entry(&self, entry: &mut HookEntry, group: &ComponentGroup) {
        let _ = (entry, group);
    }

    /// Refreshes the field on every tick.
    ///
    /// `target` is the declared field and `length` is the length of `iter`.
    fn inject_entry(
        &self,
        entry: &HookEntry,
        group: &ComponentGroup,
        iter: &ChunkIterator,
        length: usize,
        target: &mut dyn Any,
    );
}

/// Identifies a hook in a [`HookRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HookId(u64);

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "hook #{}", self.0) }
}

/// The set of hooks consulted when a system is injected.
///
/// Hooks only affect systems injected while they are registered.
#[derive(Default)]
pub struct HookRegistry {
    hooks:   IndexMap<HookId, Arc<dyn InjectionHook>>,
    next_id: u64,
}

impl HookRegistry {
    /// Registers a hook.
    pub fn register(&mut self, hook: Arc<dyn InjectionHook>) -> HookId {
        let id = HookId(self.next_id);
        self.next_id += 1;
        log::debug!("Registered injection hook `{}` as {id}", hook.name());
        self.hooks.insert(id, hook);
        id
    }

    /// Unregisters a hook. Returns `false` if `id` is not registered.
    pub fn unregister(&mut self, id: HookId) -> bool {
        match self.hooks.shift_remove(&id) {
            Some(hook) => {
                log::debug!("Unregistered injection hook `{}`", hook.name());
                true
            }
            None => {
                log::warn!("Attempt to unregister unknown {id}");
                false
            }
        }
    }

    /// The number of registered hooks.
    pub fn len(&self) -> usize { self.hooks.len() }

    /// Whether no hooks are registered.
    pub fn is_empty(&self) -> bool { self.hooks.is_empty() }

    /// Finds the only hook interested in `field`.
    pub(crate) fn resolve(
        &self,
        field: &FieldInfo,
    ) -> Result<Option<Arc<dyn InjectionHook>>, SetupError> {
        let mut interested = self.hooks.values().filter(|hook| hook.is_interested_in_field(field));
        let first = match interested.next() {
            Some(first) => first,
            None => return Ok(None),
        };
        if let Some(second) = interested.next() {
            return Err(SetupError::AmbiguousHook {
                system: field.system,
                field:  field.path.clone(),
                first:  first.name().to_string(),
                second: second.name().to_string(),
            });
        }
        Ok(Some(Arc::clone(first)))
    }
}

/// A field bound by a hook.
pub struct HookEntry {
    /// The declared field.
    pub field:            FieldInfo,
    /// The requirements the hook contributed to the query.
    pub requirements:     Vec<ComponentType>,
    /// The index in group of each positive requirement, aligned with `requirements`.
    ///
    /// Subtractive requirements have `None`.
    pub indices_in_group: Vec<Option<usize>>,
    /// State stored by [`InjectionHook::prepare_entry`].
    pub state:            Option<Box<dyn Any + Send + Sync>>,
}

struct ContextEntry<S> {
    entry: HookEntry,
    hook:  Arc<dyn InjectionHook>,
    slot:  Box<dyn CustomSlot<S>>,
}

/// The hook-bound fields of one aggregate.
pub struct InjectionContext<S> {
    entries: Vec<ContextEntry<S>>,
}

impl<S> Default for InjectionContext<S> {
    fn default() -> Self { Self { entries: Vec::new() } }
}

impl<S> InjectionContext<S> {
    pub(crate) fn add(
        &mut self,
        hook: Arc<dyn InjectionHook>,
        field: FieldInfo,
        slot: Box<dyn CustomSlot<S>>,
    ) {
        let requirements = hook.component_requirements(&field);
        let entry = HookEntry {
            field,
            indices_in_group: vec![None; requirements.len()],
            requirements,
            state: None,
        };
        self.entries.push(ContextEntry { entry, hook, slot });
    }

    /// Whether any field is bound by a hook.
    pub fn has_entries(&self) -> bool { !self.entries.is_empty() }

    /// Iterates over the hook-bound fields.
    pub fn entries(&self) -> impl Iterator<Item = &HookEntry> + '_ {
        self.entries.iter().map(|entry| &entry.entry)
    }

    /// The requirements contributed by all hooks, with field paths for diagnostics.
    pub fn component_requirements(&self) -> impl Iterator<Item = (&str, ComponentType)> + '_ {
        self.entries.iter().flat_map(|entry| {
            entry.entry.requirements.iter().map(move |&req| (entry.entry.field.path.as_str(), req))
        })
    }

    /// Resolves the indices of hook requirements and lets each hook prepare its entry.
    pub fn prepare_entries(&mut self, group: &ComponentGroup) {
        for ContextEntry { entry, hook, .. } in &mut self.entries {
            for (req, index) in entry.requirements.iter().zip(&mut entry.indices_in_group) {
                if !req.is_subtractive() {
                    *index = group.index_in_group(req.ty);
                }
            }
            hook.prepare_entry(entry, group);
        }
    }

    /// Lets each hook refresh its field in `target`.
    pub fn update_entries(
        &self,
        target: &mut S,
        group: &ComponentGroup,
        iter: &ChunkIterator,
        length: usize,
    ) {
        for ContextEntry { entry, hook, slot } in &self.entries {
            hook.inject_entry(entry, group, iter, length, slot.get(target));
        }
    }
}
