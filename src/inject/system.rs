use std::any;
use std::sync::Arc;

use super::decl::{access_mode, DeclaredField};
use super::from_entity::{LookupSlot, LookupWriter};
use super::{
    AggregateDecl, ComponentDependencies, GroupData, HookRegistry, InjectComponentGroupData,
    InjectFromEntityData, InjectionData, SystemGroups,
};
use crate::comp::{self, ComponentType};
use crate::error::{SetupError, WorldError};
use crate::group::{BufferLookup, ComponentGroup, ComponentLookup};
use crate::storage::EntityManager;
use crate::world::Manager;
use crate::World;

/// A system whose data dependencies are injected.
pub trait InjectSystem: Send + 'static {
    /// Declares the injected fields of the system.
    fn declare(decl: &mut SystemDecl<Self>)
    where
        Self: Sized;
}

type ManagerResolver<S> = Box<dyn FnOnce(&mut S, &World) -> Result<(), WorldError>>;

/// Collects the field declarations of a system of type `S`.
pub struct SystemDecl<S> {
    managers: Vec<(&'static str, ManagerResolver<S>)>,
    lookups:  InjectFromEntityData<S>,
    groups:   Vec<(&'static str, Vec<DeclaredField<S>>)>,
    statics:  Vec<&'static str>,
}

impl<S: 'static> SystemDecl<S> {
    fn new() -> Self {
        Self {
            managers: Vec::new(),
            lookups:  InjectFromEntityData::default(),
            groups:   Vec::new(),
            statics:  Vec::new(),
        }
    }

    /// Declares a reference to the manager `M`, created in the world if it does not exist yet.
    pub fn manager<M: Manager + Default>(
        &mut self,
        name: &'static str,
        accessor: fn(&mut S) -> &mut Option<Arc<M>>,
    ) -> &mut Self {
        let resolve: ManagerResolver<S> = Box::new(move |target: &mut S, world: &World| {
            *accessor(target) = Some(world.get_or_create_manager::<M>()?);
            Ok(())
        });
        self.managers.push((name, resolve));
        self
    }

    /// Declares an aggregate of arrays over the entities matching the query `G` declares.
    pub fn group<G: GroupData>(
        &mut self,
        name: &'static str,
        accessor: fn(&mut S) -> &mut G,
    ) -> &mut Self {
        let mut decl = AggregateDecl::<G>::new();
        G::declare(&mut decl);
        let fields = decl.fields.into_iter().map(|field| field.nest(accessor)).collect();
        self.groups.push((name, fields));
        self
    }

    /// Declares random access to a data component by entity.
    pub fn component_lookup<T: comp::Component>(
        &mut self,
        name: &'static str,
        read_only: bool,
        accessor: fn(&mut S) -> &mut ComponentLookup<T>,
    ) -> &mut Self {
        let ty = ComponentType::component::<T>(access_mode(read_only));
        let write: LookupWriter<S> =
            Box::new(move |target: &mut S, store: &EntityManager, read_only: bool| {
                *accessor(target) = store.component_lookup::<T>(read_only);
            });
        let data = InjectionData::new(ty, name, read_only);
        self.lookups.components.push(LookupSlot { data, write });
        self
    }

    /// Declares random access to a buffer by entity.
    pub fn buffer_lookup<T: comp::BufferElement>(
        &mut self,
        name: &'static str,
        read_only: bool,
        accessor: fn(&mut S) -> &mut BufferLookup<T>,
    ) -> &mut Self {
        let ty = ComponentType::buffer::<T>(access_mode(read_only));
        let write: LookupWriter<S> =
            Box::new(move |target: &mut S, store: &EntityManager, read_only: bool| {
                *accessor(target) = store.buffer_lookup::<T>(read_only);
            });
        let data = InjectionData::new(ty, name, read_only);
        self.lookups.buffers.push(LookupSlot { data, write });
        self
    }

    /// Declares a field shared by all instances of the system.
    ///
    /// Injection is per system instance, so any such declaration fails the setup.
    pub fn static_field(&mut self, name: &'static str) -> &mut Self {
        self.statics.push(name);
        self
    }
}

/// Injects systems with the managers of a world and the entities of a store.
pub struct ComponentSystemInjection<'t> {
    world: &'t World,
    store: &'t Arc<EntityManager>,
    hooks: &'t HookRegistry,
}

impl<'t> ComponentSystemInjection<'t> {
    /// Creates an injector.
    ///
    /// Only hooks registered in `hooks` at the time of [`inject`](Self::inject) are consulted.
    pub fn new(world: &'t World, store: &'t Arc<EntityManager>, hooks: &'t HookRegistry) -> Self {
        Self { world, store, hooks }
    }

    /// Classifies the declared fields of `system` and binds them.
    ///
    /// Manager fields and `group_index` counters are written immediately;
    /// everything else is written by [`Injection::update_injection`].
    pub fn inject<S: InjectSystem>(&self, system: &mut S) -> Result<Injection<S>, SetupError> {
        let name = any::type_name::<S>();
        let mut decl = SystemDecl::new();
        S::declare(&mut decl);

        if let Some(&field) = decl.statics.first() {
            return Err(SetupError::StaticField { system: name, field: field.to_string() });
        }

        for (field, resolve) in decl.managers {
            resolve(system, self.world).map_err(|source| SetupError::Manager {
                system: name,
                field: field.to_string(),
                source,
            })?;
        }

        let mut groups = SystemGroups::default();
        let group_data = decl
            .groups
            .into_iter()
            .map(|(field, fields)| {
                InjectComponentGroupData::new(
                    name,
                    field,
                    fields,
                    system,
                    &mut groups,
                    self.store,
                    self.hooks,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "Injected system {name} with {} aggregates over {} groups and {} lookups",
            group_data.len(),
            groups.groups().len(),
            decl.lookups.component_lookups().count() + decl.lookups.buffer_lookups().count(),
        );

        Ok(Injection {
            system: name,
            store: Arc::clone(self.store),
            groups,
            group_data,
            from_entity: decl.lookups,
        })
    }
}

/// The injected bindings of one system instance.
pub struct Injection<S> {
    system:      &'static str,
    store:       Arc<EntityManager>,
    groups:      SystemGroups,
    group_data:  Vec<InjectComponentGroupData<S>>,
    from_entity: InjectFromEntityData<S>,
}

impl<S: 'static> Injection<S> {
    /// Refreshes all aggregates and lookups of `system`.
    ///
    /// This must be called before the system runs on each tick,
    /// and structural changes must not happen between the refresh and the system run.
    pub fn update_injection(&self, system: &mut S) {
        for data in &self.group_data {
            data.update_injection(system);
        }
        self.from_entity.update_injection(system, &self.store);
        log::trace!("Refreshed system {}", self.system);
    }

    /// The bound aggregates, in declaration order.
    pub fn groups(&self) -> &[InjectComponentGroupData<S>] { &self.group_data }

    /// The bound lookups.
    pub fn from_entity(&self) -> &InjectFromEntityData<S> { &self.from_entity }

    /// The distinct groups the system iterates.
    pub fn component_groups(&self) -> &[ComponentGroup] { self.groups.groups() }

    /// The component types the system reads and writes.
    pub fn job_dependencies(&self) -> ComponentDependencies {
        let mut deps = ComponentDependencies::default();
        for group in self.groups.groups() {
            for &ty in group.requirements() {
                deps.add_reader_writer(ty);
            }
        }
        self.from_entity.extract_job_dependency_types(&mut deps);
        deps
    }
}
