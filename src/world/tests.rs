use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{live_worlds, Builder, Capabilities, Manager, World};
use crate::error::WorldError;
use crate::storage::EntityManager;
use crate::test_util::{self, EventTracer};

static_assertions::assert_impl_all!(World: Send);
static_assertions::assert_not_impl_any!(World: Sync);

type Log = Arc<Mutex<Vec<&'static str>>>;

/// A manager that records its teardown into a shared log.
struct Named {
    name: &'static str,
    log:  Log,
}

impl Manager for Named {
    fn on_destroy(&self) -> anyhow::Result<()> {
        self.log.lock().push(self.name);
        Ok(())
    }
}

struct A(Named);
impl Manager for A {
    fn on_destroy(&self) -> anyhow::Result<()> { self.0.on_destroy() }
}
struct B(Named);
impl Manager for B {
    fn on_destroy(&self) -> anyhow::Result<()> { self.0.on_destroy() }
}
struct C(Named);
impl Manager for C {
    fn on_destroy(&self) -> anyhow::Result<()> { self.0.on_destroy() }
}

fn named(name: &'static str, log: &Log) -> Named { Named { name, log: Arc::clone(log) } }

#[test]
fn test_dispose_reverse_creation_order() {
    test_util::init();

    let log = Log::default();
    let world = World::new("dispose order");
    world.create_manager(A(named("A", &log))).expect("create A");
    world.create_manager(B(named("B", &log))).expect("create B");
    world.create_manager(C(named("C", &log))).expect("create C");
    assert_eq!(world.managers().len(), 3);

    world.dispose().expect("first dispose");
    assert_eq!(*log.lock(), ["C", "B", "A"]);
    assert!(world.is_disposed());
}

#[test]
fn test_entity_manager_destroyed_last() {
    test_util::init();

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Event {
        Before,
        Entities,
        After,
    }

    struct Other(Event, Arc<EventTracer<Event>>);
    impl Manager for Other {
        fn on_destroy(&self) -> anyhow::Result<()> {
            self.1.trace(self.0);
            Ok(())
        }
    }
    struct OtherBefore(Other);
    impl Manager for OtherBefore {
        fn on_destroy(&self) -> anyhow::Result<()> { self.0.on_destroy() }
    }

    struct TracedEntities(EntityManager, Arc<EventTracer<Event>>);
    impl Manager for TracedEntities {
        fn on_destroy(&self) -> anyhow::Result<()> {
            self.1.trace(Event::Entities);
            self.0.on_destroy()
        }

        fn destroy_last(&self) -> bool { self.0.destroy_last() }
    }

    let tracer = Arc::new(EventTracer::new([
        (Event::After, Event::Before),
        (Event::Before, Event::Entities),
        (Event::After, Event::Entities),
    ]));
    let world = World::new("destroy last");
    world
        .create_manager(OtherBefore(Other(Event::Before, Arc::clone(&tracer))))
        .expect("create manager before the store");
    world
        .create_manager(TracedEntities(EntityManager::default(), Arc::clone(&tracer)))
        .expect("create entities");
    world
        .create_manager(Other(Event::After, Arc::clone(&tracer)))
        .expect("create manager after the store");

    world.dispose().expect("dispose");
    assert_eq!(tracer.get_events(), [Event::After, Event::Before, Event::Entities]);
}

#[test]
fn test_failed_teardown_does_not_stop_dispose() {
    test_util::init();

    struct Failing(Arc<AtomicUsize>);
    impl Manager for Failing {
        fn on_destroy(&self) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("cannot release resource")
        }
    }

    struct Panicking(Arc<AtomicUsize>);
    impl Manager for Panicking {
        fn on_destroy(&self) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            panic!("teardown panic")
        }
    }

    let log = Log::default();
    let failures = Arc::new(AtomicUsize::new(0));
    let panics = Arc::new(AtomicUsize::new(0));

    let world = World::new("isolation");
    world.create_manager(A(named("A", &log))).expect("create A");
    world.create_manager(Failing(Arc::clone(&failures))).expect("create failing");
    world.create_manager(Panicking(Arc::clone(&panics))).expect("create panicking");
    world.create_manager(B(named("B", &log))).expect("create B");

    world.dispose().expect("dispose");
    assert_eq!(*log.lock(), ["B", "A"]);
    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert_eq!(panics.load(Ordering::SeqCst), 1);
}

#[test]
fn test_destroy_manager_reports_teardown_error() {
    struct Failing;
    impl Manager for Failing {
        fn on_destroy(&self) -> anyhow::Result<()> { anyhow::bail!("busy") }
    }

    let world = World::new("destroy error");
    let failing = world.create_manager(Failing).expect("create");
    let err = world.destroy_manager(&failing).expect_err("teardown should fail");
    assert!(matches!(err, WorldError::ManagerTeardown { .. }), "{err:?}");

    assert!(world.get_existing_manager::<Failing>().expect("lookup").is_none());
    let err = world.destroy_manager(&failing).expect_err("already destroyed");
    assert!(matches!(err, WorldError::UnknownManager { .. }), "{err:?}");
}

trait Renderer: Send + Sync {
    fn backend(&self) -> &'static str;
}

trait Service: Send + Sync {
    fn service_name(&self) -> &'static str;
}

#[derive(Default)]
struct BaseRenderer;
impl Renderer for BaseRenderer {
    fn backend(&self) -> &'static str { "base" }
}
impl Manager for BaseRenderer {
    fn declare_capabilities(caps: &mut Capabilities<Self>) {
        caps.provide::<dyn Renderer>(|m| m as Arc<dyn Renderer>);
    }
}

#[derive(Default)]
struct VulkanRenderer;
impl Renderer for VulkanRenderer {
    fn backend(&self) -> &'static str { "vulkan" }
}
impl Service for VulkanRenderer {
    fn service_name(&self) -> &'static str { "vulkan" }
}
impl Manager for VulkanRenderer {
    fn declare_capabilities(caps: &mut Capabilities<Self>) {
        caps.provide::<dyn Renderer>(|m| m as Arc<dyn Renderer>)
            .provide::<dyn Service>(|m| m as Arc<dyn Service>);
    }
}

#[derive(Default)]
struct Logger;
impl Service for Logger {
    fn service_name(&self) -> &'static str { "logger" }
}
impl Manager for Logger {
    fn declare_capabilities(caps: &mut Capabilities<Self>) {
        caps.provide::<dyn Service>(|m| m as Arc<dyn Service>);
    }
}

#[test]
fn test_first_registered_keeps_capability() {
    let world = World::new("first wins");
    world.get_or_create_manager::<BaseRenderer>().expect("create base");
    world.get_or_create_manager::<VulkanRenderer>().expect("create vulkan");

    let renderer = world.get_existing_manager::<dyn Renderer>().expect("lookup").expect("claimed");
    assert_eq!(renderer.backend(), "base");
    let service = world.get_existing_manager::<dyn Service>().expect("lookup").expect("claimed");
    assert_eq!(service.service_name(), "vulkan");
}

#[test]
fn test_capability_reassigned_on_destroy() {
    test_util::init();

    let world = World::new("reassign");
    let base = world.get_or_create_manager::<BaseRenderer>().expect("create base");
    world.get_or_create_manager::<Logger>().expect("create logger");
    world.get_or_create_manager::<VulkanRenderer>().expect("create vulkan");

    world.destroy_manager(&base).expect("destroy base");

    let renderer = world.get_existing_manager::<dyn Renderer>().expect("lookup").expect("claimed");
    assert_eq!(renderer.backend(), "vulkan");
    assert!(world.get_existing_manager::<BaseRenderer>().expect("lookup").is_none());

    // Logger is still alive and keeps its claim.
    let service = world.get_existing_manager::<dyn Service>().expect("lookup").expect("claimed");
    assert_eq!(service.service_name(), "logger");
}

#[test]
fn test_closest_declaration_wins_reassignment() {
    let world = World::new("closest");
    let logger = world.get_or_create_manager::<Logger>().expect("create logger");
    world.get_or_create_manager::<VulkanRenderer>().expect("create vulkan");
    #[derive(Default)]
    struct AuditLog;
    impl Service for AuditLog {
        fn service_name(&self) -> &'static str { "audit" }
    }
    impl Manager for AuditLog {
        fn declare_capabilities(caps: &mut Capabilities<Self>) {
            caps.provide::<dyn Service>(|m| m as Arc<dyn Service>);
        }
    }
    world.get_or_create_manager::<AuditLog>().expect("create audit");

    world.destroy_manager(&logger).expect("destroy logger");

    // VulkanRenderer declares `dyn Service` after `dyn Renderer`, AuditLog declares it first.
    let service = world.get_existing_manager::<dyn Service>().expect("lookup").expect("claimed");
    assert_eq!(service.service_name(), "audit");
}

#[test]
fn test_get_or_create_returns_same_instance() {
    let world = World::new("singleton");
    let first = world.get_or_create_manager::<Logger>().expect("create");
    let second = world.get_or_create_manager::<Logger>().expect("get");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(world.managers().len(), 1);
}

#[test]
fn test_failed_create_rolls_back() {
    struct Broken;
    impl Manager for Broken {
        fn on_create(&self, _: &World, _: usize) -> anyhow::Result<()> {
            anyhow::bail!("missing device")
        }
        fn declare_capabilities(caps: &mut Capabilities<Self>) {
            caps.provide::<dyn Service>(|_| Arc::new(Logger) as Arc<dyn Service>);
        }
    }

    let world = World::new("rollback");
    let err = world.create_manager(Broken).err().expect("on_create fails");
    assert!(matches!(err, WorldError::ManagerInit { .. }), "{err:?}");
    assert!(world.managers().is_empty());
    assert!(world.get_existing_manager::<Broken>().expect("lookup").is_none());
    assert!(world.get_existing_manager::<dyn Service>().expect("lookup").is_none());
}

#[test]
fn test_capacity_hint_passed_to_managers() {
    struct Hinted(AtomicUsize);
    impl Manager for Hinted {
        fn on_create(&self, _: &World, capacity: usize) -> anyhow::Result<()> {
            self.0.store(capacity, Ordering::SeqCst);
            Ok(())
        }
    }

    let world = Builder::new().name("hint").capacity_hint(64).build();
    let manager = world.create_manager(Hinted(AtomicUsize::new(0))).expect("create");
    assert_eq!(manager.0.load(Ordering::SeqCst), 64);
}

#[test]
fn test_create_during_teardown_rejected() {
    struct Recreating {
        world:  *const World,
        result: Arc<Mutex<Option<bool>>>,
    }
    // The pointer is only dereferenced while the world is alive on the test thread.
    unsafe impl Send for Recreating {}
    unsafe impl Sync for Recreating {}
    impl Manager for Recreating {
        fn on_destroy(&self) -> anyhow::Result<()> {
            let world = unsafe { &*self.world };
            let rejected = matches!(
                world.create_manager(Logger),
                Err(WorldError::CreateDuringTeardown { .. })
            );
            *self.result.lock() = Some(rejected);
            Ok(())
        }
    }

    let result = Arc::new(Mutex::new(None));
    let world = World::new("teardown");
    let manager = world
        .create_manager(Recreating { world: &world, result: Arc::clone(&result) })
        .expect("create");
    world.destroy_manager(&manager).expect("destroy");
    assert_eq!(*result.lock(), Some(true));

    // Creation works again once teardown has finished.
    world.create_manager(Logger).expect("create after teardown");
}

#[test]
fn test_dispose_twice_is_an_error() {
    let world = World::new("twice");
    world.dispose().expect("first dispose");
    let err = world.dispose().expect_err("second dispose");
    assert!(matches!(err, WorldError::AlreadyDisposed { .. }), "{err:?}");
}

#[test]
fn test_disposed_world_rejects_access() {
    let world = World::new("disposed");
    world.dispose().expect("dispose");

    assert!(matches!(world.get_existing_manager::<Logger>(), Err(WorldError::Disposed { .. })));
    assert!(matches!(world.get_or_create_manager::<Logger>(), Err(WorldError::Disposed { .. })));
    assert!(matches!(world.create_manager(Logger), Err(WorldError::Disposed { .. })));
}

#[test]
fn test_live_worlds_tracks_disposal() {
    let first = World::new("live first");
    let second = World::new("live second");

    let ids: Vec<_> = live_worlds().into_iter().map(|(id, _)| id).collect();
    assert!(ids.contains(&first.id()));
    assert!(ids.contains(&second.id()));

    first.dispose().expect("dispose");
    let ids: Vec<_> = live_worlds().into_iter().map(|(id, _)| id).collect();
    assert!(!ids.contains(&first.id()));
    assert!(ids.contains(&second.id()));

    let second_id = second.id();
    drop(second);
    assert!(live_worlds().iter().all(|&(id, _)| id != second_id));
}

#[test]
fn test_drop_disposes_managers() {
    let log = Log::default();
    {
        let world = World::new("drop");
        world.create_manager(A(named("A", &log))).expect("create A");
    }
    assert_eq!(*log.lock(), ["A"]);
}
