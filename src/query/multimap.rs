//! `EntityMultiMap<K>`: like [`super::map::EntityMap`], but each key owns an
//! ordered bucket of entities rather than a single one.

use std::cell::RefCell;
use ahash::AHashMap as HashMap;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use crate::component::{Component, ComponentAdded, ComponentChanged, ComponentRemoved};
use crate::entity::{Entity, EntityId};
use crate::publisher::{Disposable, Subscription};
use crate::world::{EntityDisposed, World};

/// A mapping from component values of type `K` to the ordered bucket of
/// entities currently holding that value.
///
/// Unlike [`super::map::EntityMap`], collisions don't evict: every entity
/// sharing a `K` value stays in that key's bucket, in the order it joined.
/// Removal is `O(bucket)`, since it's a linear scan-and-shift of the bucket
/// `Vec`.
pub struct EntityMultiMap<K: Component + Clone + Eq + Hash> {
    buckets: HashMap<K, Vec<Entity>>,
    key_of: HashMap<EntityId, K>,
    subs: Vec<Subscription>,
}

impl<K> EntityMultiMap<K>
where
    K: Component + Clone + Eq + Hash + crate::serialize::ReflectFields + 'static,
{
    /// Builds a multimap over `world`'s pool for `K`, back-filling from
    /// whatever the pool already holds.
    pub fn new(world: &mut World) -> Rc<RefCell<Self>> {
        let pool = world.pool::<K>();
        let map = Rc::new(RefCell::new(EntityMultiMap {
            buckets: HashMap::default(),
            key_of: HashMap::default(),
            subs: Vec::new(),
        }));

        subscribe(world, &map);

        let entities: Vec<Entity> = world.alive_entities();
        for e in entities {
            if let Some(key) = pool.borrow().get(e.entity_id()).cloned() {
                map.borrow_mut().on_set(e, key);
            }
        }
        map
    }

    /// The bucket of entities currently bound to `key`, if any.
    pub fn get(&self, key: &K) -> &[Entity] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `true` iff `key` currently has at least one member.
    pub fn contains_key(&self, key: &K) -> bool {
        self.buckets.get(key).is_some_and(|b| !b.is_empty())
    }

    /// Number of distinct keys with at least one member.
    pub fn key_count(&self) -> usize {
        self.buckets.values().filter(|b| !b.is_empty()).count()
    }

    /// No-op; `EntityMultiMap` has no change-tracked frame state.
    pub fn complete(&mut self) {}

    fn on_set(&mut self, entity: Entity, key: K) {
        if let Some(old_key) = self.key_of.get(&entity.entity_id()).cloned() {
            if old_key == key {
                return;
            }
            self.remove_from_bucket(&old_key, entity);
        }
        self.buckets.entry(key.clone()).or_default().push(entity);
        self.key_of.insert(entity.entity_id(), key);
    }

    fn on_remove(&mut self, entity: Entity) {
        if let Some(key) = self.key_of.remove(&entity.entity_id()) {
            self.remove_from_bucket(&key, entity);
        }
    }

    fn remove_from_bucket(&mut self, key: &K, entity: Entity) {
        if let Some(bucket) = self.buckets.get_mut(key) {
            if let Some(pos) = bucket.iter().position(|&e| e == entity) {
                bucket.remove(pos);
            }
            if bucket.is_empty() {
                self.buckets.remove(key);
            }
        }
    }
}

impl<K: Component + Clone + Eq + Hash> Disposable for Rc<RefCell<EntityMultiMap<K>>> {
    fn dispose(self) {
        self.borrow_mut().subs.clear();
    }
}

fn subscribe<K>(world: &World, map: &Rc<RefCell<EntityMultiMap<K>>>)
where
    K: Component + Clone + Eq + Hash + crate::serialize::ReflectFields + 'static,
{
    let publisher = world.publisher();
    let mut subs = Vec::new();

    let weak: Weak<RefCell<EntityMultiMap<K>>> = Rc::downgrade(map);
    subs.push(publisher.subscribe::<ComponentAdded<K>, _>(move |msg: &ComponentAdded<K>| {
        if let Some(map) = weak.upgrade() {
            map.borrow_mut().on_set(msg.entity, msg.value.clone());
        }
    }));

    let weak: Weak<RefCell<EntityMultiMap<K>>> = Rc::downgrade(map);
    subs.push(publisher.subscribe::<ComponentChanged<K>, _>(move |msg: &ComponentChanged<K>| {
        if let Some(map) = weak.upgrade() {
            map.borrow_mut().on_set(msg.entity, msg.value.clone());
        }
    }));

    let weak: Weak<RefCell<EntityMultiMap<K>>> = Rc::downgrade(map);
    subs.push(publisher.subscribe::<ComponentRemoved<K>, _>(move |msg: &ComponentRemoved<K>| {
        if let Some(map) = weak.upgrade() {
            map.borrow_mut().on_remove(msg.entity);
        }
    }));

    let weak: Weak<RefCell<EntityMultiMap<K>>> = Rc::downgrade(map);
    subs.push(publisher.subscribe::<EntityDisposed, _>(move |msg: &EntityDisposed| {
        if let Some(map) = weak.upgrade() {
            map.borrow_mut().on_remove(msg.0);
        }
    }));

    drop(publisher);
    map.borrow_mut().subs = subs;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::FieldVisitor;

    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    struct Team(&'static str);
    impl Component for Team {}
    impl crate::serialize::ReflectFields for Team {
        fn visit_fields(&self, v: &mut dyn FieldVisitor) {
            v.visit_field("0", &self.0);
        }
    }

    #[test]
    fn buckets_multiple_entities_under_one_key() {
        let mut world = World::new(8);
        let map = EntityMultiMap::<Team>::new(&mut world);

        let e1 = world.create_entity().unwrap();
        let e2 = world.create_entity().unwrap();
        world.pool::<Team>().borrow_mut().set(e1.entity_id(), Team("red")).unwrap();
        world.pool::<Team>().borrow_mut().set(e2.entity_id(), Team("red")).unwrap();

        assert_eq!(map.borrow().get(&Team("red")), &[e1, e2]);
    }

    #[test]
    fn moving_key_relocates_between_buckets() {
        let mut world = World::new(8);
        let map = EntityMultiMap::<Team>::new(&mut world);
        let e = world.create_entity().unwrap();
        world.pool::<Team>().borrow_mut().set(e.entity_id(), Team("red")).unwrap();
        world.pool::<Team>().borrow_mut().set(e.entity_id(), Team("blue")).unwrap();

        assert!(map.borrow().get(&Team("red")).is_empty());
        assert_eq!(map.borrow().get(&Team("blue")), &[e]);
    }

    #[test]
    fn removal_shrinks_bucket() {
        let mut world = World::new(8);
        let map = EntityMultiMap::<Team>::new(&mut world);
        let e = world.create_entity().unwrap();
        world.pool::<Team>().borrow_mut().set(e.entity_id(), Team("red")).unwrap();
        world.pool::<Team>().borrow_mut().remove(e.entity_id()).unwrap();
        assert!(!map.borrow().contains_key(&Team("red")));
    }
}
