//! `EntityMap<K>`: a unique-key index, `K -> Entity`, over a required
//! component type implementing `Eq + Hash + Clone`.

use std::cell::RefCell;
use ahash::AHashMap as HashMap;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use crate::component::{Component, ComponentAdded, ComponentChanged, ComponentRemoved};
use crate::entity::{Entity, EntityId};
use crate::publisher::{Disposable, Subscription};
use crate::world::{EntityDisposed, World};

/// A unique mapping from component values of type `K` to the entity
/// currently holding that value.
///
/// On collision (`set<K>` gives two entities the same value), the most
/// recently written entity wins; the entity that previously held the key
/// loses its binding (its own `K` value is untouched, it simply no longer
/// resolves through this map).
pub struct EntityMap<K: Component + Clone + Eq + Hash> {
    by_key: HashMap<K, Entity>,
    key_of: HashMap<EntityId, K>,
    subs: Vec<Subscription>,
}

impl<K> EntityMap<K>
where
    K: Component + Clone + Eq + Hash + crate::serialize::ReflectFields + 'static,
{
    /// Builds a map over `world`'s pool for `K`, back-filling from whatever
    /// the pool already holds.
    pub fn new(world: &mut World) -> Rc<RefCell<Self>> {
        let pool = world.pool::<K>();
        let map = Rc::new(RefCell::new(EntityMap {
            by_key: HashMap::default(),
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

    /// The entity currently bound to `key`, if any.
    pub fn get(&self, key: &K) -> Option<Entity> {
        self.by_key.get(key).copied()
    }

    /// `true` iff `key` currently resolves to an entity.
    pub fn contains_key(&self, key: &K) -> bool {
        self.by_key.contains_key(key)
    }

    /// Number of distinct keys currently bound.
    pub fn count(&self) -> usize {
        self.by_key.len()
    }

    /// No-op; `EntityMap` has no change-tracked frame state.
    pub fn complete(&mut self) {}

    fn on_set(&mut self, entity: Entity, key: K) {
        if let Some(old_key) = self.key_of.get(&entity.entity_id()) {
            if *old_key != key {
                self.by_key.remove(old_key);
            }
        }
        if let Some(prev_holder) = self.by_key.get(&key).copied() {
            if prev_holder != entity {
                self.key_of.remove(&prev_holder.entity_id());
            }
        }
        self.by_key.insert(key.clone(), entity);
        self.key_of.insert(entity.entity_id(), key);
    }

    fn on_remove(&mut self, entity: Entity) {
        if let Some(key) = self.key_of.remove(&entity.entity_id()) {
            if self.by_key.get(&key) == Some(&entity) {
                self.by_key.remove(&key);
            }
        }
    }
}

impl<K: Component + Clone + Eq + Hash> Disposable for Rc<RefCell<EntityMap<K>>> {
    fn dispose(self) {
        self.borrow_mut().subs.clear();
    }
}

fn subscribe<K>(world: &World, map: &Rc<RefCell<EntityMap<K>>>)
where
    K: Component + Clone + Eq + Hash + crate::serialize::ReflectFields + 'static,
{
    let publisher = world.publisher();
    let mut subs = Vec::new();

    let weak: Weak<RefCell<EntityMap<K>>> = Rc::downgrade(map);
    subs.push(publisher.subscribe::<ComponentAdded<K>, _>(move |msg: &ComponentAdded<K>| {
        if let Some(map) = weak.upgrade() {
            map.borrow_mut().on_set(msg.entity, msg.value.clone());
        }
    }));

    let weak: Weak<RefCell<EntityMap<K>>> = Rc::downgrade(map);
    subs.push(publisher.subscribe::<ComponentChanged<K>, _>(move |msg: &ComponentChanged<K>| {
        if let Some(map) = weak.upgrade() {
            map.borrow_mut().on_set(msg.entity, msg.value.clone());
        }
    }));

    let weak: Weak<RefCell<EntityMap<K>>> = Rc::downgrade(map);
    subs.push(publisher.subscribe::<ComponentRemoved<K>, _>(move |msg: &ComponentRemoved<K>| {
        if let Some(map) = weak.upgrade() {
            map.borrow_mut().on_remove(msg.entity);
        }
    }));

    let weak: Weak<RefCell<EntityMap<K>>> = Rc::downgrade(map);
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
    struct Name(&'static str);
    impl Component for Name {}
    impl crate::serialize::ReflectFields for Name {
        fn visit_fields(&self, v: &mut dyn FieldVisitor) {
            v.visit_field("0", &self.0);
        }
    }

    #[test]
    fn last_writer_wins_on_collision() {
        let mut world = World::new(8);
        let map = EntityMap::<Name>::new(&mut world);

        let e1 = world.create_entity().unwrap();
        let e2 = world.create_entity().unwrap();
        world.pool::<Name>().borrow_mut().set(e1.entity_id(), Name("hero")).unwrap();
        assert_eq!(map.borrow().get(&Name("hero")), Some(e1));

        world.pool::<Name>().borrow_mut().set(e2.entity_id(), Name("hero")).unwrap();
        assert_eq!(map.borrow().get(&Name("hero")), Some(e2));
    }

    #[test]
    fn removal_clears_the_binding() {
        let mut world = World::new(8);
        let map = EntityMap::<Name>::new(&mut world);
        let e = world.create_entity().unwrap();
        world.pool::<Name>().borrow_mut().set(e.entity_id(), Name("a")).unwrap();
        assert!(map.borrow().contains_key(&Name("a")));
        world.pool::<Name>().borrow_mut().remove(e.entity_id()).unwrap();
        assert!(!map.borrow().contains_key(&Name("a")));
    }
}
