use std::collections::BTreeMap;

use super::decl::{
    ArrayWriter, CounterWriter, DeclaredField, EntityWriter, FieldShape, GROUP_INDEX_FIELD,
    LENGTH_FIELD, SUPPORTED_SHAPES,
};
use super::{FieldInfo, HookRegistry, InjectionContext, InjectionData};
use crate::comp::{AccessMode, ComponentType};
use crate::error::SetupError;
use crate::group::ComponentGroup;
use crate::storage::EntityManager;
use crate::util::DbgTypeId;

/// The distinct groups resolved by one system, in first-use order.
#[derive(Debug, Default)]
pub struct SystemGroups {
    groups: Vec<ComponentGroup>,
}

impl SystemGroups {
    /// Resolves the group for `requirements`,
    /// reusing a group previously resolved by this system if it is the same query.
    ///
    /// Returns the group and its position in this system.
    pub fn get_component_group(
        &mut self,
        store: &EntityManager,
        requirements: &[ComponentType],
    ) -> (ComponentGroup, usize) {
        let group = store.resolve_group(requirements);
        let index = match self.groups.iter().position(|existing| *existing == group) {
            Some(index) => index,
            None => {
                self.groups.push(group.clone());
                self.groups.len() - 1
            }
        };
        (group, index)
    }

    /// The resolved groups.
    pub fn groups(&self) -> &[ComponentGroup] { &self.groups }
}

struct ArraySlot<S> {
    data:  InjectionData,
    write: ArrayWriter<S>,
}

/// The injection state of one aggregate field of a system of type `S`.
pub struct InjectComponentGroupData<S> {
    group:            ComponentGroup,
    group_index:      usize,
    field_name:       &'static str,
    component_arrays: Vec<ArraySlot<S>>,
    shared_arrays:    Vec<ArraySlot<S>>,
    buffer_arrays:    Vec<ArraySlot<S>>,
    entity_array:     Option<EntityWriter<S>>,
    length:           Option<CounterWriter<S>>,
    context:          InjectionContext<S>,
}

impl<S: 'static> InjectComponentGroupData<S> {
    /// Classifies the fields of an aggregate, resolves its query and binds every field.
    ///
    /// A declared `group_index` counter is written to `target` immediately.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        system: &'static str,
        field_name: &'static str,
        fields: Vec<DeclaredField<S>>,
        target: &mut S,
        groups: &mut SystemGroups,
        store: &EntityManager,
        hooks: &HookRegistry,
    ) -> Result<Self, SetupError> {
        let path = |name: &str| format!("{field_name}.{name}");

        let mut component_arrays = Vec::new();
        let mut shared_arrays = Vec::new();
        let mut buffer_arrays = Vec::new();
        let mut subtractive = Vec::new();
        let mut entity_array: Option<(&'static str, EntityWriter<S>)> = None;
        let mut length: Option<CounterWriter<S>> = None;
        let mut group_index_writer: Option<CounterWriter<S>> = None;
        let mut context = InjectionContext::default();

        for DeclaredField { name, read_only, shape } in fields {
            match shape {
                FieldShape::ComponentArray { ty, write } => component_arrays
                    .push(ArraySlot { data: InjectionData::new(ty, name, read_only), write }),
                FieldShape::BufferArray { ty, write } => buffer_arrays
                    .push(ArraySlot { data: InjectionData::new(ty, name, read_only), write }),
                FieldShape::SharedComponentArray { ty, write } => {
                    if !read_only {
                        return Err(SetupError::WritableSharedComponent {
                            system,
                            field: path(name),
                        });
                    }
                    let data = InjectionData::new(ty, name, true);
                    shared_arrays.push(ArraySlot { data, write });
                }
                FieldShape::Subtractive { ty } => subtractive.push((name, ty)),
                FieldShape::EntityArray { write } => {
                    if let Some((first, _)) = entity_array {
                        return Err(SetupError::DuplicateEntityArray {
                            system,
                            field: path(name),
                            first,
                        });
                    }
                    entity_array = Some((name, write));
                }
                FieldShape::Int { write } => {
                    let slot = match name {
                        LENGTH_FIELD => &mut length,
                        GROUP_INDEX_FIELD => &mut group_index_writer,
                        _ => {
                            return Err(SetupError::UnsupportedField {
                                system,
                                field: path(name),
                                shape: format!("usize named `{name}`"),
                                supported: SUPPORTED_SHAPES.to_string(),
                            })
                        }
                    };
                    if !read_only {
                        return Err(SetupError::MutableCounter { system, field: path(name) });
                    }
                    if slot.is_some() {
                        return Err(SetupError::DuplicateCounter { system, field: path(name) });
                    }
                    *slot = Some(write);
                }
                FieldShape::Custom { field_type, slot } => {
                    let info = FieldInfo { system, path: path(name), field_type, read_only };
                    let hook = match hooks.resolve(&info)? {
                        Some(hook) => hook,
                        None => {
                            return Err(SetupError::UnsupportedField {
                                system,
                                field: info.path,
                                shape: field_type.to_string(),
                                supported: SUPPORTED_SHAPES.to_string(),
                            })
                        }
                    };
                    if let Err(message) = hook.validate_field(&info) {
                        return Err(SetupError::HookRejected {
                            system,
                            field: info.path,
                            hook: hook.name().to_string(),
                            message,
                        });
                    }
                    context.add(hook, info, slot);
                }
            }
        }

        let mut requirements: BTreeMap<DbgTypeId, ComponentType> = BTreeMap::new();
        let declared = component_arrays
            .iter()
            .chain(&shared_arrays)
            .chain(&buffer_arrays)
            .map(|slot| (slot.data.field_name, slot.data.component_type))
            .chain(subtractive.iter().copied());
        for (name, ty) in declared {
            if let Some(existing) = requirements.get(&ty.ty) {
                let component = ty.ty.to_string();
                return Err(if existing.is_subtractive() != ty.is_subtractive() {
                    SetupError::ConflictingRequirement { system, field: path(name), component }
                } else {
                    SetupError::DuplicateComponent { system, field: path(name), component }
                });
            }
            requirements.insert(ty.ty, ty);
        }

        for (hook_path, ty) in context.component_requirements() {
            match requirements.get_mut(&ty.ty) {
                Some(existing) => {
                    if existing.is_subtractive() != ty.is_subtractive() {
                        return Err(SetupError::ConflictingRequirement {
                            system,
                            field: hook_path.to_string(),
                            component: ty.ty.to_string(),
                        });
                    }
                    if ty.access == AccessMode::ReadWrite {
                        existing.access = AccessMode::ReadWrite;
                    }
                }
                None => {
                    requirements.insert(ty.ty, ty);
                }
            }
        }

        let requirements: Vec<ComponentType> = requirements.into_values().collect();
        let (group, group_index) = groups.get_component_group(store, &requirements);

        let slots = component_arrays.iter_mut().chain(&mut shared_arrays).chain(&mut buffer_arrays);
        for slot in slots {
            let index = group
                .index_in_group(slot.data.component_type.ty)
                .expect("declared types are required by the group");
            slot.data.bind(index);
        }

        if let Some(write) = group_index_writer {
            write(target, group_index);
        }

        context.prepare_entries(&group);

        log::debug!(
            "Injected aggregate {system}::{field_name} with group {} at index {group_index}",
            group.id()
        );

        Ok(Self {
            group,
            group_index,
            field_name,
            component_arrays,
            shared_arrays,
            buffer_arrays,
            entity_array: entity_array.map(|(_, write)| write),
            length,
            context,
        })
    }

    /// Refreshes all fields of the aggregate in `target` from a new snapshot of the group.
    pub fn update_injection(&self, target: &mut S) {
        let iter = self.group.iterator();
        let length = iter.length();

        for slot in &self.component_arrays {
            (slot.write)(target, &iter, slot.data.bound_index(), slot.data.is_read_only);
        }
        for slot in &self.shared_arrays {
            (slot.write)(target, &iter, slot.data.bound_index(), true);
        }
        for slot in &self.buffer_arrays {
            (slot.write)(target, &iter, slot.data.bound_index(), slot.data.is_read_only);
        }
        if let Some(write) = &self.entity_array {
            write(target, &iter);
        }
        if self.context.has_entries() {
            self.context.update_entries(target, &self.group, &iter, length);
        }
        if let Some(write) = &self.length {
            write(target, length);
        }

        log::trace!("Refreshed aggregate {} with {length} entities", self.field_name);
    }

    /// The group the aggregate iterates.
    pub fn group(&self) -> &ComponentGroup { &self.group }

    /// The position of the group among the groups of the system.
    pub fn group_index(&self) -> usize { self.group_index }

    /// The name of the aggregate field.
    pub fn field_name(&self) -> &'static str { self.field_name }

    /// The bound component, shared component and buffer arrays.
    pub fn injection_data(&self) -> impl Iterator<Item = &InjectionData> + '_ {
        self.component_arrays
            .iter()
            .chain(&self.shared_arrays)
            .chain(&self.buffer_arrays)
            .map(|slot| &slot.data)
    }

    /// The hook-bound fields.
    pub fn context(&self) -> &InjectionContext<S> { &self.context }
}
