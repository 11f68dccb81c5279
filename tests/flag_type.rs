use hive_ecs::prelude::*;

#[derive(Clone, Debug)]
struct Tag;
impl Component for Tag {
    const IS_FLAG: bool = true;
}
impl ReflectFields for Tag {
    fn visit_fields(&self, _v: &mut dyn FieldVisitor) {}
}

#[test]
fn flag_type_shares_one_slot_across_many_entities() {
    let mut world = World::new(1100);
    let mut entities = Vec::with_capacity(1000);
    for _ in 0..1000 {
        let e = world.create_entity().unwrap();
        world.pool::<Tag>().borrow_mut().set(e.entity_id(), Tag).unwrap();
        entities.push(e);
    }

    assert_eq!(world.pool::<Tag>().borrow().slot_count(), 1);
    assert_eq!(world.pool::<Tag>().borrow().max_components(), 1);
    for e in &entities {
        assert!(world.pool::<Tag>().borrow().has(e.entity_id()));
    }
}
