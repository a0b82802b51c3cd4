//! The world owns the long-lived managers of an application.
//!
//! Managers are created lazily on first request and live until they are destroyed explicitly
//! or the world is disposed.
//! Each manager is reachable by its concrete type
//! and by the capabilities it declares through [`Manager::declare_capabilities`].
//! If a type key is already claimed by an earlier manager, the earlier manager keeps it.
//!
//! # Threading
//! A world is [`Send`] but not [`Sync`]:
//! manager creation and destruction are single-threaded relative to a given world.
//! The managers themselves are shared through [`Arc`] and may be used from any thread.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::WorldError;
use crate::util::DbgTypeId;

mod builder;
pub use builder::{Builder, DEFAULT_CAPACITY_HINT};

mod manager;
pub use manager::{Capabilities, Manager};

#[cfg(test)]
mod tests;

/// Uniquely identifies a [`World`] within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorldId(u64);

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "#{}", self.0) }
}

static NEXT_WORLD_ID: AtomicU64 = AtomicU64::new(0);

static LIVE_WORLDS: Mutex<Vec<(WorldId, String)>> = parking_lot::const_mutex(Vec::new());

/// Returns the ID and name of every world in the process that has not been disposed,
/// in creation order.
pub fn live_worlds() -> Vec<(WorldId, String)> { LIVE_WORLDS.lock().clone() }

/// A registry of singleton [`Manager`]s with ordered creation and teardown.
pub struct World {
    id:            WorldId,
    name:          String,
    capacity_hint: usize,
    registry:      RefCell<Registry>,
    /// Number of managers currently running [`Manager::on_destroy`].
    tearing_down:  Cell<usize>,
    disposing:     Cell<bool>,
    disposed:      Cell<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ManagerId(u64);

#[derive(Default)]
struct Registry {
    /// All managers in creation order.
    managers: Vec<Entry>,
    /// The manager claiming each type key.
    lookup:   HashMap<TypeId, ManagerId>,
    next_id:  u64,
}

struct Entry {
    id:       ManagerId,
    ty:       DbgTypeId,
    instance: Arc<dyn Manager>,
    keys:     Vec<Key>,
}

/// A type key a manager can be looked up by.
struct Key {
    ty:     DbgTypeId,
    /// 0 for the concrete type, increasing for less specific capabilities.
    depth:  usize,
    /// An `Arc<T>` where `T` is `ty`.
    handle: Box<dyn Any + Send + Sync>,
}

impl Registry {
    fn insert(&mut self, ty: DbgTypeId, instance: Arc<dyn Manager>, keys: Vec<Key>) -> ManagerId {
        let id = ManagerId(self.next_id);
        self.next_id += 1;

        for key in &keys {
            self.lookup.entry(key.ty.id).or_insert(id);
        }
        self.managers.push(Entry { id, ty, instance, keys });
        id
    }

    fn position_of_ptr(&self, ptr: *const ()) -> Option<usize> {
        self.managers.iter().position(|entry| Arc::as_ptr(&entry.instance).cast::<()>() == ptr)
    }

    /// Removes a manager and hands its vacated keys to the closest remaining manager.
    fn remove(&mut self, position: usize) -> Entry {
        let entry = self.managers.remove(position);

        let vacated: Vec<TypeId> = entry
            .keys
            .iter()
            .map(|key| key.ty.id)
            .filter(|ty| self.lookup.get(ty) == Some(&entry.id))
            .collect();

        for ty in vacated {
            self.lookup.remove(&ty);

            let successor = self
                .managers
                .iter()
                .filter_map(|other| {
                    let key = other.keys.iter().find(|key| key.ty.id == ty)?;
                    Some((key.depth, other.id))
                })
                .min_by_key(|&(depth, _)| depth);
            if let Some((_, successor)) = successor {
                self.lookup.insert(ty, successor);
            }
        }

        entry
    }

    fn get(&self, id: ManagerId) -> &Entry {
        self.managers.iter().find(|entry| entry.id == id).expect("lookup points to a live manager")
    }
}

impl World {
    /// Creates a world with the given name and the default configuration.
    pub fn new(name: impl Into<String>) -> Self { Builder::new().name(name).build() }

    fn from_builder(builder: Builder) -> Self {
        let id = WorldId(NEXT_WORLD_ID.fetch_add(1, Ordering::SeqCst));
        LIVE_WORLDS.lock().push((id, builder.name.clone()));
        log::debug!("Created world {id} `{}`", builder.name);

        Self {
            id,
            name: builder.name,
            capacity_hint: builder.capacity_hint,
            registry: RefCell::default(),
            tearing_down: Cell::new(0),
            disposing: Cell::new(false),
            disposed: Cell::new(false),
        }
    }

    /// The process-unique ID of this world.
    pub fn id(&self) -> WorldId { self.id }

    /// The name of this world.
    pub fn name(&self) -> &str { &self.name }

    /// Whether [`dispose`](Self::dispose) has completed.
    pub fn is_disposed(&self) -> bool { self.disposed.get() }

    /// The type names of all managers in creation order.
    pub fn managers(&self) -> Vec<&'static str> {
        self.registry.borrow().managers.iter().map(|entry| entry.ty.name).collect()
    }

    fn ensure_not_disposed(&self) -> Result<(), WorldError> {
        if self.disposed.get() {
            return Err(WorldError::Disposed { world: self.name.clone() });
        }
        Ok(())
    }

    /// Registers a new manager and invokes its [`Manager::on_create`] hook.
    ///
    /// The manager is registered under its concrete type
    /// and every declared capability that is not claimed yet.
    /// If the hook fails, the registration is rolled back before the error is returned.
    pub fn create_manager<M: Manager>(&self, manager: M) -> Result<Arc<M>, WorldError> {
        self.ensure_not_disposed()?;
        if self.disposing.get() || self.tearing_down.get() > 0 {
            return Err(WorldError::CreateDuringTeardown {
                world:   self.name.clone(),
                manager: DbgTypeId::of::<M>().name,
            });
        }

        let ty = DbgTypeId::of::<M>();
        let instance = Arc::new(manager);

        let mut caps = Capabilities::<M>::new();
        M::declare_capabilities(&mut caps);

        let mut keys = vec![Key { ty, depth: 0, handle: Box::new(Arc::clone(&instance)) }];
        for (depth, (cap_ty, cast)) in caps.entries.into_iter().enumerate() {
            keys.push(Key { ty: cap_ty, depth: depth + 1, handle: cast(Arc::clone(&instance)) });
        }

        let dyn_instance: Arc<dyn Manager> = Arc::clone(&instance) as Arc<dyn Manager>;
        self.registry.borrow_mut().insert(ty, dyn_instance, keys);
        log::debug!("Created manager {ty} in world `{}`", self.name);

        if let Err(err) = instance.on_create(self, self.capacity_hint) {
            let mut registry = self.registry.borrow_mut();
            if let Some(position) = registry.position_of_ptr(Arc::as_ptr(&instance).cast()) {
                registry.remove(position);
            }
            return Err(WorldError::ManagerInit {
                world:   self.name.clone(),
                manager: ty.name,
                source:  err,
            });
        }

        Ok(instance)
    }

    /// Returns the manager registered under `M`, or creates a default one.
    pub fn get_or_create_manager<M: Manager + Default>(&self) -> Result<Arc<M>, WorldError> {
        match self.get_existing_manager::<M>()? {
            Some(manager) => Ok(manager),
            None => self.create_manager(M::default()),
        }
    }

    /// Looks up the manager registered under the concrete type or capability `T`.
    ///
    /// Returns `Ok(None)` if no manager claims `T`.
    pub fn get_existing_manager<T: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> Result<Option<Arc<T>>, WorldError> {
        self.ensure_not_disposed()?;

        let registry = self.registry.borrow();
        let id = match registry.lookup.get(&TypeId::of::<T>()) {
            Some(&id) => id,
            None => return Ok(None),
        };
        let key = registry
            .get(id)
            .keys
            .iter()
            .find(|key| key.ty.id == TypeId::of::<T>())
            .expect("lookup only contains declared keys");
        let handle = key.handle.downcast_ref::<Arc<T>>().expect("TypeId mismatch");
        Ok(Some(Arc::clone(handle)))
    }

    /// Unregisters a manager and invokes its [`Manager::on_destroy`] hook.
    ///
    /// Every type key the manager claimed is reassigned
    /// to the remaining manager that declares it most specifically.
    pub fn destroy_manager<M: ?Sized>(&self, manager: &Arc<M>) -> Result<(), WorldError> {
        self.ensure_not_disposed()?;

        let entry = {
            let mut registry = self.registry.borrow_mut();
            let position = registry.position_of_ptr(Arc::as_ptr(manager).cast()).ok_or_else(|| {
                WorldError::UnknownManager {
                    world:   self.name.clone(),
                    manager: std::any::type_name::<M>(),
                }
            })?;
            registry.remove(position)
        };

        self.tear_down(&entry).map_err(|source| WorldError::ManagerTeardown {
            world: self.name.clone(),
            manager: entry.ty.name,
            source,
        })
    }

    fn tear_down(&self, entry: &Entry) -> anyhow::Result<()> {
        log::debug!("Destroying manager {} in world `{}`", entry.ty, self.name);

        self.tearing_down.set(self.tearing_down.get() + 1);
        let result = panic::catch_unwind(AssertUnwindSafe(|| entry.instance.on_destroy()));
        self.tearing_down.set(self.tearing_down.get() - 1);

        match result {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| String::from("unknown panic payload"));
                Err(anyhow::anyhow!("panicked: {message}"))
            }
        }
    }

    /// Destroys all managers and releases the world.
    ///
    /// Managers are destroyed in reverse creation order,
    /// except that managers returning `true` from [`Manager::destroy_last`] go after all others.
    /// A failing teardown is logged and does not prevent the remaining managers from tearing down.
    pub fn dispose(&self) -> Result<(), WorldError> {
        if self.disposed.get() || self.disposing.get() {
            return Err(WorldError::AlreadyDisposed { world: self.name.clone() });
        }
        self.disposing.set(true);

        let order: Vec<ManagerId> = {
            let registry = self.registry.borrow();
            let (last, rest): (Vec<&Entry>, Vec<&Entry>) =
                registry.managers.iter().partition(|entry| entry.instance.destroy_last());
            rest.iter().rev().chain(last.iter().rev()).map(|entry| entry.id).collect()
        };

        for id in order {
            let entry = {
                let mut registry = self.registry.borrow_mut();
                match registry.managers.iter().position(|entry| entry.id == id) {
                    Some(position) => registry.remove(position),
                    None => continue, // destroyed by another manager's teardown
                }
            };

            if let Err(err) = self.tear_down(&entry) {
                log::error!(
                    "Error tearing down manager {} in world `{}`: {err:?}",
                    entry.ty,
                    self.name
                );
            }
        }

        *self.registry.borrow_mut() = Registry::default();

        self.disposing.set(false);
        self.disposed.set(true);
        LIVE_WORLDS.lock().retain(|&(id, _)| id != self.id);
        log::debug!("Disposed world {} `{}`", self.id, self.name);
        Ok(())
    }
}

impl Drop for World {
    fn drop(&mut self) {
        if !self.disposed.get() {
            if let Err(err) = self.dispose() {
                log::error!("Error disposing world `{}` on drop: {err}", self.name);
            }
        }
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("World")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("managers", &self.managers())
            .field("disposed", &self.disposed.get())
            .finish()
    }
}
