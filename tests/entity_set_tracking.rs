use hive_ecs::prelude::*;

#[derive(Clone, Debug)]
struct Flag(bool);
impl Component for Flag {}
impl ReflectFields for Flag {
    fn visit_fields(&self, v: &mut dyn FieldVisitor) {
        v.visit_field("0", &self.0);
    }
}

#[test]
fn when_added_requires_a_touch_each_frame() {
    let mut world = World::new(10);
    let flag = world.flag_of::<Flag>();
    let set = EntitySet::new(&world, Filter::new().with(flag).added(flag));
    let e = world.create_entity().unwrap();

    world.pool::<Flag>().borrow_mut().set(e.entity_id(), Flag(true)).unwrap();
    assert_eq!(set.borrow().count(), 1);

    set.borrow_mut().complete();
    assert_eq!(set.borrow().count(), 0);

    world.pool::<Flag>().borrow_mut().set(e.entity_id(), Flag(false)).unwrap();
    assert_eq!(set.borrow().count(), 1);
}

#[test]
fn enable_disable_toggles_membership() {
    let mut world = World::new(10);
    let flag = world.flag_of::<Flag>();
    let set = EntitySet::new(&world, Filter::new().with(flag));
    let e = world.create_entity().unwrap();
    world.pool::<Flag>().borrow_mut().set(e.entity_id(), Flag(true)).unwrap();
    assert!(set.borrow().contains(e));

    world.disable(e).unwrap();
    assert!(!set.borrow().contains(e));

    world.enable(e).unwrap();
    assert!(set.borrow().contains(e));
}
