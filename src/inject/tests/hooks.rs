//! Tests fields bound by injection hooks.

use std::any::Any;
use std::sync::Arc;

use super::{inject, setup};
use crate::comp::{AccessMode, ComponentType};
use crate::error::SetupError;
use crate::group::{ChunkIterator, ComponentArray, ComponentGroup};
use crate::inject::{
    AggregateDecl, FieldInfo, GroupData, HookEntry, HookRegistry, InjectSystem, InjectionHook,
    SystemDecl, LENGTH_FIELD,
};
use crate::storage::ComponentSet;
use crate::test_util::{spawn_mover, Health, Position};
use crate::util::DbgTypeId;

/// The total health of all entities in a group.
#[derive(Debug, Default, PartialEq)]
struct HealthSum(i64);

/// Binds [`HealthSum`] fields, requiring read access to [`Health`].
struct HealthSumHook {
    name:            &'static str,
    reject_writable: bool,
}

impl HealthSumHook {
    fn new(name: &'static str) -> Arc<Self> { Arc::new(Self { name, reject_writable: false }) }
}

impl InjectionHook for HealthSumHook {
    fn name(&self) -> &str { self.name }

    fn field_type(&self) -> DbgTypeId { DbgTypeId::of::<HealthSum>() }

    fn validate_field(&self, field: &FieldInfo) -> Result<(), String> {
        if self.reject_writable && !field.read_only {
            return Err(String::from("health sums are computed, not written"));
        }
        Ok(())
    }

    fn component_requirements(&self, _: &FieldInfo) -> Vec<ComponentType> {
        vec![ComponentType::read_only::<Health>()]
    }

    fn prepare_entry(&self, entry: &mut HookEntry, group: &ComponentGroup) {
        entry.state = Some(Box::new(group.id()));
    }

    fn inject_entry(
        &self,
        entry: &HookEntry,
        group: &ComponentGroup,
        iter: &ChunkIterator,
        length: usize,
        target: &mut dyn Any,
    ) {
        let prepared = entry.state.as_ref().and_then(|state| state.downcast_ref::<usize>());
        assert_eq!(prepared, Some(&group.id()), "entry is prepared with the same group");

        let index = entry.indices_in_group[0].expect("Health is required by the group");
        let health = iter.component_array::<Health>(index, true);
        assert_eq!(health.len(), length);

        let mut sum = 0;
        health.for_each_chunk(|chunk| sum += chunk.iter().map(|h| i64::from(h.0)).sum::<i64>());
        *target.downcast_mut::<HealthSum>().expect("field type is checked") = HealthSum(sum);
    }
}

#[derive(Default)]
struct Units {
    position: ComponentArray<Position>,
    total:    HealthSum,
    length:   usize,
}

impl GroupData for Units {
    fn declare(decl: &mut AggregateDecl<Self>) {
        decl.component_array("position", true, |g| &mut g.position)
            .custom("total", true, |g| &mut g.total)
            .int(LENGTH_FIELD, true, |g| &mut g.length);
    }
}

#[derive(Default)]
struct Census {
    units: Units,
}

impl InjectSystem for Census {
    fn declare(decl: &mut SystemDecl<Self>) { decl.group("units", |s| &mut s.units); }
}

#[test]
fn test_hook_requirements_join_query() {
    let (world, store) = setup();
    spawn_mover(&store, 0, false);
    for health in [3, 4, 5] {
        store.create_entity(ComponentSet::new().with(Position::default()).with(Health(health)));
    }
    store.create_entity(ComponentSet::new().with(Health(100)));

    let mut hooks = HookRegistry::default();
    hooks.register(HealthSumHook::new("health-sum"));

    let mut system = Census::default();
    let injection = inject(&world, &store, &hooks, &mut system).expect("HealthSum is claimed");
    let data = &injection.groups()[0];
    assert!(data.context().has_entries());
    assert!(data.group().index_in_group(DbgTypeId::of::<Health>()).is_some());

    injection.update_injection(&mut system);
    assert_eq!(system.units.length, 3);
    assert_eq!(system.units.position.len(), 3);
    assert_eq!(system.units.total, HealthSum(12));

    let deps = injection.job_dependencies();
    assert!(deps.is_reader(DbgTypeId::of::<Health>()));
}

#[test]
fn test_hook_requirement_merges_with_declared_array() {
    #[derive(Default)]
    struct Medics {
        health: ComponentArray<Health>,
        total:  HealthSum,
    }
    impl GroupData for Medics {
        fn declare(decl: &mut AggregateDecl<Self>) {
            decl.component_array("health", false, |g| &mut g.health)
                .custom("total", true, |g| &mut g.total);
        }
    }
    #[derive(Default)]
    struct Healing {
        medics: Medics,
    }
    impl InjectSystem for Healing {
        fn declare(decl: &mut SystemDecl<Self>) { decl.group("medics", |s| &mut s.medics); }
    }

    let (world, store) = setup();
    store.create_entity(ComponentSet::new().with(Health(7)));
    let mut hooks = HookRegistry::default();
    hooks.register(HealthSumHook::new("health-sum"));

    let mut system = Healing::default();
    let injection = inject(&world, &store, &hooks, &mut system).expect("requirements merge");
    assert_eq!(injection.component_groups()[0].types(), &[ComponentType::read_write::<Health>()]);

    injection.update_injection(&mut system);
    system.medics.health.update(0, |health| health.0 += 1);
    assert_eq!(system.medics.total, HealthSum(7));
    injection.update_injection(&mut system);
    assert_eq!(system.medics.total, HealthSum(8));
}

#[test]
fn test_ambiguous_hooks_rejected() {
    let (world, store) = setup();
    let mut hooks = HookRegistry::default();
    hooks.register(HealthSumHook::new("first"));
    let second = hooks.register(HealthSumHook::new("second"));
    assert_eq!(hooks.len(), 2);

    let mut system = Census::default();
    let err = inject(&world, &store, &hooks, &mut system)
        .err()
        .expect("two hooks claim HealthSum");
    match &err {
        SetupError::AmbiguousHook { field, first, second, .. } => {
            assert_eq!(field, "units.total");
            assert_eq!(first, "first");
            assert_eq!(second, "second");
        }
        _ => panic!("unexpected error {err}"),
    }

    assert!(hooks.unregister(second));
    assert!(!hooks.unregister(second));
    let mut system = Census::default();
    inject(&world, &store, &hooks, &mut system).expect("only one hook claims HealthSum");
}

#[test]
fn test_hook_rejects_field() {
    #[derive(Default)]
    struct WritableTotal {
        total: HealthSum,
    }
    impl GroupData for WritableTotal {
        fn declare(decl: &mut AggregateDecl<Self>) {
            decl.custom("total", false, |g| &mut g.total);
        }
    }
    #[derive(Default)]
    struct Summing {
        group: WritableTotal,
    }
    impl InjectSystem for Summing {
        fn declare(decl: &mut SystemDecl<Self>) { decl.group("group", |s| &mut s.group); }
    }

    let (world, store) = setup();
    let mut hooks = HookRegistry::default();
    hooks.register(Arc::new(HealthSumHook { name: "strict", reject_writable: true }));

    let mut system = Summing::default();
    let err = inject(&world, &store, &hooks, &mut system).err().expect("hook rejects the field");
    match &err {
        SetupError::HookRejected { hook, message, .. } => {
            assert_eq!(hook, "strict");
            assert!(message.contains("computed"), "{message}");
        }
        _ => panic!("unexpected error {err}"),
    }
}

#[test]
fn test_hook_requirement_conflicts_with_exclusion() {
    #[derive(Default)]
    struct Healthless {
        total: HealthSum,
    }
    impl GroupData for Healthless {
        fn declare(decl: &mut AggregateDecl<Self>) {
            decl.subtractive::<Health>("no_health").custom("total", true, |g| &mut g.total);
        }
    }
    #[derive(Default)]
    struct Paradox {
        group: Healthless,
    }
    impl InjectSystem for Paradox {
        fn declare(decl: &mut SystemDecl<Self>) { decl.group("group", |s| &mut s.group); }
    }

    let (world, store) = setup();
    let mut hooks = HookRegistry::default();
    hooks.register(HealthSumHook::new("health-sum"));

    let mut system = Paradox::default();
    let err = inject(&world, &store, &hooks, &mut system).err().expect("Health is excluded");
    assert!(
        matches!(
            &err,
            SetupError::ConflictingRequirement { field, .. } if field == "group.total"
        ),
        "{err}"
    );
}

#[test]
fn test_hook_only_sees_its_field_type() {
    let hook = HealthSumHook::new("health-sum");
    let field = |field_type| FieldInfo {
        system: "System",
        path: String::from("group.field"),
        field_type,
        read_only: true,
    };
    assert!(hook.is_interested_in_field(&field(DbgTypeId::of::<HealthSum>())));
    assert!(!hook.is_interested_in_field(&field(DbgTypeId::of::<i64>())));
    assert_eq!(
        hook.component_requirements(&field(DbgTypeId::of::<HealthSum>()))[0].access,
        AccessMode::ReadOnly
    );
}
