use hive_ecs::prelude::*;

#[derive(Clone, Debug, PartialEq)]
struct Score(i32);
impl Component for Score {}
impl ReflectFields for Score {
    fn visit_fields(&self, v: &mut dyn FieldVisitor) {
        v.visit_field("0", &self.0);
    }
}

#[test]
fn basic_lifecycle() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut world = World::new(10);
    let e = world.create_entity().unwrap();
    world.pool::<Score>().borrow_mut().set(e.entity_id(), Score(42)).unwrap();

    assert_eq!(world.pool::<Score>().borrow().get(e.entity_id()), Some(&Score(42)));
    assert!(world.pool::<Score>().borrow().has(e.entity_id()));
    assert!(world.is_alive(e));

    world.dispose_entity(e);
    assert!(!world.is_alive(e));

    let e2 = world.create_entity().unwrap();
    assert_eq!(e2.entity_id(), e.entity_id());
    assert_eq!(e2.version(), e.version() + 1);
}

#[test]
fn version_recycling_invalidates_stale_handles() {
    let mut world = World::new(4);
    let e = world.create_entity().unwrap();
    world.dispose_entity(e);
    let e2 = world.create_entity().unwrap();

    assert_ne!(e, e2);
    assert!(!world.is_alive(e));
    assert!(world.is_alive(e2));
}

#[test]
fn has_mapping_and_filter_membership_agree() {
    let mut world = World::new(10);
    let flag = world.flag_of::<Score>();
    let set = EntitySet::new(&world, Filter::new().with(flag));
    let e = world.create_entity().unwrap();

    assert!(!world.pool::<Score>().borrow().has(e.entity_id()));
    assert!(!set.borrow().contains(e));

    world.pool::<Score>().borrow_mut().set(e.entity_id(), Score(1)).unwrap();
    assert!(world.pool::<Score>().borrow().has(e.entity_id()));
    assert!(set.borrow().contains(e));

    world.pool::<Score>().borrow_mut().remove(e.entity_id()).unwrap();
    assert!(!world.pool::<Score>().borrow().has(e.entity_id()));
    assert!(!set.borrow().contains(e));
}
