//! Managers are long-lived singleton services owned by a [`World`].

use std::any::Any;
use std::sync::Arc;

use super::World;
use crate::util::DbgTypeId;

/// A singleton service owned by a [`World`].
///
/// A manager is always reachable through its concrete type.
/// It can additionally be reached through the capabilities it declares
/// in [`declare_capabilities`](Self::declare_capabilities),
/// which typically are `dyn Trait` types implemented by the manager.
///
/// The lifecycle hooks are invoked exactly once each by the world.
/// Since the manager is already shared when the hooks run,
/// they receive `&self` and managers use interior mutability for their state.
pub trait Manager: Any + Send + Sync {
    /// Called after the manager is registered in `world`.
    ///
    /// `capacity` is the allocation hint configured on the world.
    /// Returning an error unregisters the manager again.
    fn on_create(&self, world: &World, capacity: usize) -> anyhow::Result<()> {
        let _ = (world, capacity);
        Ok(())
    }

    /// Called after the manager is removed from the world.
    fn on_destroy(&self) -> anyhow::Result<()> { Ok(()) }

    /// Whether this manager must be destroyed after all other managers
    /// when the world is disposed.
    ///
    /// The entity store overrides this,
    /// because other managers may still access entities during their teardown.
    fn destroy_last(&self) -> bool { false }

    /// Declares the capability types this manager can be looked up by,
    /// ordered from the most specific to the least specific.
    fn declare_capabilities(caps: &mut Capabilities<Self>)
    where
        Self: Sized,
    {
        let _ = caps;
    }
}

type CastFn<M> = Box<dyn Fn(Arc<M>) -> Box<dyn Any + Send + Sync>>;

/// The capability list of a manager type `M`.
pub struct Capabilities<M> {
    pub(super) entries: Vec<(DbgTypeId, CastFn<M>)>,
}

impl<M: Manager> Capabilities<M> {
    pub(super) fn new() -> Self { Self { entries: Vec::new() } }

    /// Declares that `M` can be looked up as `C`.
    ///
    /// `cast` is usually an unsizing coercion such as `|m| m as Arc<dyn Trait>`.
    /// Capabilities declared earlier are considered more specific;
    /// when a manager claiming `C` is destroyed,
    /// the key is reassigned to the remaining manager declaring `C` most specifically.
    pub fn provide<C: ?Sized + Send + Sync + 'static>(
        &mut self,
        cast: fn(Arc<M>) -> Arc<C>,
    ) -> &mut Self {
        let ty = DbgTypeId::of::<C>();
        if ty == DbgTypeId::of::<M>() || self.entries.iter().any(|(other, _)| *other == ty) {
            log::warn!("Capability {ty} is declared twice for {}", DbgTypeId::of::<M>());
            return self;
        }

        self.entries.push((
            ty,
            Box::new(move |manager| -> Box<dyn Any + Send + Sync> { Box::new(cast(manager)) }),
        ));
        self
    }
}
