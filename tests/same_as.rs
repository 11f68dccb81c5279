use hive_ecs::prelude::*;

#[derive(Clone, Debug, PartialEq)]
struct Str(&'static str);
impl Component for Str {}
impl ReflectFields for Str {
    fn visit_fields(&self, v: &mut dyn FieldVisitor) {
        v.visit_field("0", &self.0);
    }
}

#[test]
fn same_as_aliasing_ref_counts_and_reassigns_owner() {
    let mut world = World::new(10);
    let e1 = world.create_entity().unwrap();
    let e2 = world.create_entity().unwrap();
    let e3 = world.create_entity().unwrap();

    world.pool::<Str>().borrow_mut().set(e1.entity_id(), Str("x")).unwrap();
    world.pool::<Str>().borrow_mut().set_same_as(e2.entity_id(), e1.entity_id()).unwrap();
    world.pool::<Str>().borrow_mut().set_same_as(e3.entity_id(), e1.entity_id()).unwrap();

    assert_eq!(world.pool::<Str>().borrow().slot_count(), 1);

    world.pool::<Str>().borrow_mut().remove(e1.entity_id()).unwrap();
    assert_eq!(world.pool::<Str>().borrow().get(e2.entity_id()), Some(&Str("x")));
    assert_eq!(world.pool::<Str>().borrow().get(e3.entity_id()), Some(&Str("x")));
    assert_eq!(world.pool::<Str>().borrow().slot_count(), 1);

    world.pool::<Str>().borrow_mut().remove(e3.entity_id()).unwrap();
    assert_eq!(world.pool::<Str>().borrow().slot_count(), 1);
    world.pool::<Str>().borrow_mut().remove(e2.entity_id()).unwrap();
    assert_eq!(world.pool::<Str>().borrow().slot_count(), 0);
}

#[test]
fn set_same_as_across_worlds_is_rejected_before_touching_the_pool() {
    let mut a = World::new(4);
    let b = World::new(4);
    let ea = a.create_entity().unwrap();
    let eb = b.create_entity().unwrap();
    a.pool::<Str>().borrow_mut().set(ea.entity_id(), Str("x")).unwrap();

    assert!(hive_ecs::component::check_same_world(ea, eb).is_err());
}
