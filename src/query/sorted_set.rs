//! `EntitySortedSet<Comp>`: like [`super::set::EntitySet`] but kept ordered
//! by a caller-supplied comparator over a required component type.

use std::cell::RefCell;
use std::cmp::Ordering;
use ahash::AHashMap as HashMap;
use std::rc::{Rc, Weak};

use crate::component::{Component, ComponentAdded, ComponentChanged, ComponentFlagChanged, ComponentRemoved};
use crate::entity::{Entity, EntityId};
use crate::filter::Filter;
use crate::publisher::{Disposable, Subscription};
use crate::world::{shared_handle, EntityDisposed, Optimize, World, WorldShared};

fn component_enum_of(shared: &Rc<RefCell<WorldShared>>, e: Entity) -> Option<crate::bitset::ComponentEnum> {
    let s = shared.borrow();
    if e.is_unbound() || e.world_id() != s.id {
        return None;
    }
    s.infos
        .get(e.entity_id() as usize)
        .filter(|i| i.version == e.version())
        .map(|i| i.components.clone())
}

/// A `Vec<Entity>` kept sorted by `comparator` applied to each entity's
/// `Comp`, restricted to entities also matching `filter`.
///
/// Placement uses `binary_search_by`, shifting the backing `Vec` — simpler
/// than the dense swap-pop layout of [`super::set::EntitySet`] at the cost
/// of `O(n)` shifts per insert/remove, which is the usual trade for an
/// ordered index. Re-placement on `ComponentChanged<Comp>` is eager rather
/// than deferred behind a dirty flag; [`EntitySortedSet::complete`] and the
/// world's `optimize()` message are accepted as no-ops for that reason.
///
/// Comparisons are done against a local cache of `Comp` values, kept in
/// sync from the `ComponentAdded<Comp>`/`ComponentChanged<Comp>` messages'
/// carried value rather than by reading the pool — the pool is typically
/// still mutably borrowed by the caller that triggered the message.
pub struct EntitySortedSet<Comp: Component> {
    shared: Rc<RefCell<WorldShared>>,
    comp_flag: u32,
    filter: Filter,
    comparator: Box<dyn Fn(&Comp, &Comp) -> Ordering>,
    order: Vec<Entity>,
    values: HashMap<EntityId, Comp>,
    subs: Vec<Subscription>,
}

impl<Comp: Component + Clone + crate::serialize::ReflectFields + 'static> EntitySortedSet<Comp> {
    /// Builds a sorted set over `world`, requiring `Comp` (the caller's
    /// `filter` should already include `with(world.flag_of::<Comp>())`) and
    /// ordering members by `comparator`.
    pub fn new(
        world: &mut World,
        filter: Filter,
        comparator: impl Fn(&Comp, &Comp) -> Ordering + 'static,
    ) -> Rc<RefCell<Self>> {
        let shared = shared_handle(world);
        let pool = world.pool::<Comp>();
        let comp_flag = world.flag_of::<Comp>();

        let set = Rc::new(RefCell::new(EntitySortedSet {
            shared: shared.clone(),
            comp_flag,
            filter,
            comparator: Box::new(comparator),
            order: Vec::new(),
            values: HashMap::default(),
            subs: Vec::new(),
        }));

        subscribe(world, &set);

        let entities: Vec<Entity> = world.alive_entities();
        for e in &entities {
            if let Some(value) = pool.borrow().get(e.entity_id()).cloned() {
                set.borrow_mut().values.insert(e.entity_id(), value);
            }
        }
        for e in entities {
            set.borrow_mut().reevaluate(e);
        }
        set
    }

    /// Members in sorted order.
    pub fn entities(&self) -> &[Entity] {
        &self.order
    }

    /// `true` iff `e` is currently a member.
    pub fn contains(&self, e: Entity) -> bool {
        self.position_of(e).is_some()
    }

    /// Number of members.
    pub fn count(&self) -> usize {
        self.order.len()
    }

    /// No-op: placement here is always eager. Kept for API parity with the
    /// other query-set variants.
    pub fn complete(&mut self) {}

    fn position_of(&self, e: Entity) -> Option<usize> {
        self.order.iter().position(|&o| o == e)
    }

    fn remove_entity(&mut self, e: Entity) {
        if let Some(pos) = self.position_of(e) {
            self.order.remove(pos);
        }
    }

    /// Removes `e` if present, then — if it still matches — re-inserts it at
    /// the sorted position dictated by its current `Comp` value. Handles
    /// fresh inserts, re-placement on `ComponentChanged<Comp>`, and eviction
    /// uniformly.
    fn reevaluate(&mut self, e: Entity) {
        let matches = component_enum_of(&self.shared, e)
            .map(|c| self.filter.matches(&c))
            .unwrap_or(false);
        if self.position_of(e).is_some() {
            self.remove_entity(e);
        }
        if !matches {
            return;
        }

        let values = &self.values;
        let value = match values.get(&e.entity_id()) {
            Some(v) => v,
            None => return,
        };
        let at = self
            .order
            .binary_search_by(|probe| {
                let probe_value = values.get(&probe.entity_id()).expect("member has cached Comp");
                (self.comparator)(probe_value, value)
            })
            .unwrap_or_else(|i| i);
        self.order.insert(at, e);
    }
}

impl<Comp: Component> Disposable for Rc<RefCell<EntitySortedSet<Comp>>> {
    fn dispose(self) {
        self.borrow_mut().subs.clear();
    }
}

fn subscribe<Comp>(world: &World, set: &Rc<RefCell<EntitySortedSet<Comp>>>)
where
    Comp: Component + Clone + crate::serialize::ReflectFields + 'static,
{
    let publisher = world.publisher();
    let mut subs = Vec::new();

    let weak: Weak<RefCell<EntitySortedSet<Comp>>> = Rc::downgrade(set);
    subs.push(publisher.subscribe::<ComponentAdded<Comp>, _>(move |msg: &ComponentAdded<Comp>| {
        if let Some(set) = weak.upgrade() {
            let mut set = set.borrow_mut();
            set.values.insert(msg.entity.entity_id(), msg.value.clone());
            set.reevaluate(msg.entity);
        }
    }));

    let weak: Weak<RefCell<EntitySortedSet<Comp>>> = Rc::downgrade(set);
    subs.push(publisher.subscribe::<ComponentChanged<Comp>, _>(move |msg: &ComponentChanged<Comp>| {
        if let Some(set) = weak.upgrade() {
            let mut set = set.borrow_mut();
            set.values.insert(msg.entity.entity_id(), msg.value.clone());
            set.reevaluate(msg.entity);
        }
    }));

    let weak: Weak<RefCell<EntitySortedSet<Comp>>> = Rc::downgrade(set);
    subs.push(publisher.subscribe::<ComponentRemoved<Comp>, _>(move |msg: &ComponentRemoved<Comp>| {
        if let Some(set) = weak.upgrade() {
            let mut set = set.borrow_mut();
            set.values.remove(&msg.entity.entity_id());
            set.remove_entity(msg.entity);
        }
    }));

    let weak: Weak<RefCell<EntitySortedSet<Comp>>> = Rc::downgrade(set);
    subs.push(publisher.subscribe::<EntityDisposed, _>(move |msg: &EntityDisposed| {
        if let Some(set) = weak.upgrade() {
            let mut set = set.borrow_mut();
            set.values.remove(&msg.0.entity_id());
            set.remove_entity(msg.0);
        }
    }));

    // Other flags in the filter (not `Comp` itself, which the dedicated
    // subscriptions above already handle) can still flip membership.
    let weak: Weak<RefCell<EntitySortedSet<Comp>>> = Rc::downgrade(set);
    subs.push(
        publisher.subscribe::<ComponentFlagChanged, _>(move |msg: &ComponentFlagChanged| {
            if let Some(set) = weak.upgrade() {
                if msg.flag != set.borrow().comp_flag {
                    set.borrow_mut().reevaluate(msg.entity);
                }
            }
        }),
    );

    // `optimize()` only matters for deferred implementations; accepted here
    // as a documented no-op.
    let weak: Weak<RefCell<EntitySortedSet<Comp>>> = Rc::downgrade(set);
    subs.push(publisher.subscribe::<Optimize, _>(move |_: &Optimize| {
        let _ = weak.upgrade();
    }));

    drop(publisher);
    set.borrow_mut().subs = subs;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::FieldVisitor;

    #[derive(Clone, Debug)]
    struct Score(i32);
    impl Component for Score {}
    impl crate::serialize::ReflectFields for Score {
        fn visit_fields(&self, v: &mut dyn FieldVisitor) {
            v.visit_field("0", &self.0);
        }
    }

    #[test]
    fn stays_sorted_across_inserts_and_updates() {
        let mut world = World::new(8);
        let flag = world.flag_of::<Score>();
        let set = EntitySortedSet::new(&mut world, Filter::new().with(flag), |a: &Score, b: &Score| a.0.cmp(&b.0));

        let e1 = world.create_entity().unwrap();
        let e2 = world.create_entity().unwrap();
        let e3 = world.create_entity().unwrap();
        world.pool::<Score>().borrow_mut().set(e1.entity_id(), Score(5)).unwrap();
        world.pool::<Score>().borrow_mut().set(e2.entity_id(), Score(1)).unwrap();
        world.pool::<Score>().borrow_mut().set(e3.entity_id(), Score(3)).unwrap();

        let order: Vec<Entity> = set.borrow().entities().to_vec();
        assert_eq!(order, vec![e2, e3, e1]);

        world.pool::<Score>().borrow_mut().set(e1.entity_id(), Score(0)).unwrap();
        let order: Vec<Entity> = set.borrow().entities().to_vec();
        assert_eq!(order, vec![e1, e2, e3]);
    }
}
