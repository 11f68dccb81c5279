//! `EntitySet`: an unordered, densely-packed index of entities matching a
//! [`Filter`].

use std::cell::RefCell;
use std::collections::HashSet;
use ahash::AHashMap as HashMap;
use std::rc::{Rc, Weak};

use crate::bitset::ComponentEnum;
use crate::component::{ChangeKind, ComponentFlagChanged};
use crate::entity::{Entity, EntityId};
use crate::filter::{ChangeClass, Filter};
use crate::publisher::{Disposable, Subscription};
use crate::world::{shared_handle, EntityCreated, EntityDisabled, EntityDisposed, EntityEnabled, World, WorldShared};

fn component_enum_of(shared: &Rc<RefCell<WorldShared>>, e: Entity) -> Option<ComponentEnum> {
    let s = shared.borrow();
    if e.is_unbound() || e.world_id() != s.id {
        return None;
    }
    s.infos
        .get(e.entity_id() as usize)
        .filter(|i| i.version == e.version())
        .map(|i| i.components.clone())
}

/// An ordered-by-insertion, densely-packed array of entities currently
/// matching `filter`, plus a sparse `EntityId -> index` lookup.
///
/// Membership updates synchronously, in response to the world's bus.
/// Filters configured with `added`/`changed`/`removed` classes additionally
/// require the entity to have been "touched" by one of those classes since
/// the last [`EntitySet::complete`] call, or it's evicted at `complete()`
/// time even if it still statically matches.
pub struct EntitySet {
    shared: Rc<RefCell<WorldShared>>,
    filter: Filter,
    dense: Vec<Entity>,
    index: HashMap<EntityId, usize>,
    touched: HashSet<EntityId>,
    subs: Vec<Subscription>,
}

impl EntitySet {
    /// Builds a set over `world` matching `filter`, back-filling with every
    /// currently-matching entity.
    pub fn new(world: &World, filter: Filter) -> Rc<RefCell<Self>> {
        let shared = shared_handle(world);
        let set = Rc::new(RefCell::new(EntitySet {
            shared: shared.clone(),
            filter,
            dense: Vec::new(),
            index: HashMap::default(),
            touched: HashSet::new(),
            subs: Vec::new(),
        }));

        subscribe(world, &set);

        for e in world.alive_entities() {
            set.borrow_mut().reevaluate(e);
        }
        set.borrow_mut().reevaluate(world.world_entity());
        set
    }

    /// Entities currently in the set, in dense (insertion/swap) order.
    pub fn entities(&self) -> &[Entity] {
        &self.dense
    }

    /// `true` iff `e` is currently a member.
    pub fn contains(&self, e: Entity) -> bool {
        self.index.contains_key(&e.entity_id())
    }

    /// Number of members.
    pub fn count(&self) -> usize {
        self.dense.len()
    }

    /// For change-tracked filters, every current member only got there by
    /// being touched this frame (see `reevaluate`), so membership lasts
    /// exactly one `complete()` cycle: evict everyone, then reset `touched`
    /// for the next frame.
    pub fn complete(&mut self) {
        if self.filter.has_change_classes() {
            let ids: Vec<EntityId> = self.dense.iter().map(|e| e.entity_id()).collect();
            for id in ids {
                self.remove_id(id);
            }
        }
        self.touched.clear();
    }

    fn remove_id(&mut self, id: EntityId) {
        if let Some(pos) = self.index.remove(&id) {
            let last = self.dense.len() - 1;
            self.dense.swap(pos, last);
            self.dense.pop();
            if pos < self.dense.len() {
                let moved = self.dense[pos];
                self.index.insert(moved.entity_id(), pos);
            }
        }
    }

    fn mark_touched(&mut self, kind: ChangeKind, flag: u32, id: EntityId) {
        let class = match kind {
            ChangeKind::Added => ChangeClass::Added,
            ChangeKind::Changed => ChangeClass::Changed,
            ChangeKind::Removed => ChangeClass::Removed,
        };
        if self.filter.tracks(class, flag) {
            self.touched.insert(id);
        }
    }

    fn reevaluate(&mut self, e: Entity) {
        let statically_matches = component_enum_of(&self.shared, e)
            .map(|c| self.filter.matches(&c))
            .unwrap_or(false);
        let id = e.entity_id();
        let now_matches = statically_matches
            && (!self.filter.has_change_classes() || self.touched.contains(&id));
        let present = self.index.contains_key(&id);

        if now_matches && !present {
            self.index.insert(id, self.dense.len());
            self.dense.push(e);
        } else if !now_matches && present {
            self.remove_id(id);
        }
    }
}

impl Disposable for Rc<RefCell<EntitySet>> {
    fn dispose(self) {
        self.borrow_mut().subs.clear();
    }
}

fn subscribe(world: &World, set: &Rc<RefCell<EntitySet>>) {
    let publisher = world.publisher();
    let mut subs = Vec::new();

    let weak: Weak<RefCell<EntitySet>> = Rc::downgrade(set);
    subs.push(publisher.subscribe::<EntityCreated, _>(move |msg: &EntityCreated| {
        if let Some(set) = weak.upgrade() {
            set.borrow_mut().reevaluate(msg.0);
        }
    }));

    let weak: Weak<RefCell<EntitySet>> = Rc::downgrade(set);
    subs.push(publisher.subscribe::<EntityDisposed, _>(move |msg: &EntityDisposed| {
        if let Some(set) = weak.upgrade() {
            set.borrow_mut().remove_id(msg.0.entity_id());
        }
    }));

    let weak: Weak<RefCell<EntitySet>> = Rc::downgrade(set);
    subs.push(publisher.subscribe::<EntityEnabled, _>(move |msg: &EntityEnabled| {
        if let Some(set) = weak.upgrade() {
            set.borrow_mut().reevaluate(msg.0);
        }
    }));

    let weak: Weak<RefCell<EntitySet>> = Rc::downgrade(set);
    subs.push(publisher.subscribe::<EntityDisabled, _>(move |msg: &EntityDisabled| {
        if let Some(set) = weak.upgrade() {
            set.borrow_mut().reevaluate(msg.0);
        }
    }));

    let weak: Weak<RefCell<EntitySet>> = Rc::downgrade(set);
    subs.push(
        publisher.subscribe::<ComponentFlagChanged, _>(move |msg: &ComponentFlagChanged| {
            if let Some(set) = weak.upgrade() {
                let mut set = set.borrow_mut();
                set.mark_touched(msg.kind, msg.flag, msg.entity.entity_id());
                set.reevaluate(msg.entity);
            }
        }),
    );

    drop(publisher);
    set.borrow_mut().subs = subs;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::serialize::{FieldVisitor, ReflectFields};

    #[derive(Clone, Debug)]
    struct Position(f32);
    impl Component for Position {}
    impl ReflectFields for Position {
        fn visit_fields(&self, v: &mut dyn FieldVisitor) {
            v.visit_field("0", &self.0);
        }
    }

    #[test]
    fn tracks_membership_through_add_and_remove() {
        let mut world = World::new(8);
        let flag = world.flag_of::<Position>();
        let set = EntitySet::new(&world, Filter::new().with(flag));

        let e = world.create_entity().unwrap();
        assert_eq!(set.borrow().count(), 0);

        world.pool::<Position>().borrow_mut().set(e.entity_id(), Position(1.0)).unwrap();
        assert!(set.borrow().contains(e));

        world.pool::<Position>().borrow_mut().remove(e.entity_id()).unwrap();
        assert!(!set.borrow().contains(e));
    }

    #[test]
    fn disposing_entity_removes_it() {
        let mut world = World::new(8);
        let flag = world.flag_of::<Position>();
        let set = EntitySet::new(&world, Filter::new().with(flag));
        let e = world.create_entity().unwrap();
        world.pool::<Position>().borrow_mut().set(e.entity_id(), Position(1.0)).unwrap();
        assert!(set.borrow().contains(e));
        world.dispose_entity(e);
        assert!(!set.borrow().contains(e));
    }

    #[test]
    fn changed_class_requires_touch_before_complete() {
        let mut world = World::new(8);
        let flag = world.flag_of::<Position>();
        // `.changed(flag)` tracks only `ComponentChanged`, not the fresh-insert
        // `ComponentAdded` the first `set` below fires — so the entity statically
        // matches `with(flag)` but isn't yet a member until an actual change touches it.
        let set = EntitySet::new(&world, Filter::new().with(flag).changed(flag));
        let e = world.create_entity().unwrap();
        world.pool::<Position>().borrow_mut().set(e.entity_id(), Position(1.0)).unwrap();
        assert!(!set.borrow().contains(e));

        world.pool::<Position>().borrow_mut().set(e.entity_id(), Position(2.0)).unwrap();
        assert!(set.borrow().contains(e));

        set.borrow_mut().complete();
        assert!(!set.borrow().contains(e));
    }
}
