//! The `World`: a capacity-bounded registry of entity slots, their
//! liveness/parent/component metadata, and the per-world publisher and
//! component-pool registry.
//!
//! Grounded in the teacher crate's `world/entity.rs` (`Allocator`,
//! `Generation`, `EntitiesRes`) for the free-list + version-recycling shape,
//! generalized to the spec's multi-world, ref-counted-component model; the
//! registry of typed pools plays the role the teacher's `shred::World`
//! dynamic resource map plays for `register::<T>()`/`read_storage::<T>()`.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use ahash::AHashMap as HashMap;
use std::rc::Rc;

use hibitset::BitSet;
use log::{debug, trace, warn};

use crate::bitset::{ComponentEnum, FlagRegistry};
use crate::component::{Component, ComponentPool, EntityCopy};
use crate::entity::{Entity, EntityId, Version, WorldId};
use crate::error::{Error, InvalidHandle, NullArgument};
use crate::publisher::Publisher;
use crate::registry;
use crate::serialize::{ComponentReader, ComponentTypeReader, ReflectFields};

/// Fired after a fresh entity slot has been allocated and marked enabled.
#[derive(Clone, Copy, Debug)]
pub struct EntityCreated(pub Entity);

/// Fired before a pool has had a chance to drop its components for the
/// entity. Query sets still see the entity as a member during this message.
#[derive(Clone, Copy, Debug)]
pub struct EntityDisposing(pub Entity);

/// Fired after every pool has removed its entry for the entity; the version
/// is incremented immediately afterwards.
#[derive(Clone, Copy, Debug)]
pub struct EntityDisposed(pub Entity);

/// Fired when an entity's world-local `enabled` flag transitions to set.
#[derive(Clone, Copy, Debug)]
pub struct EntityEnabled(pub Entity);

/// Fired when an entity's world-local `enabled` flag transitions to clear.
#[derive(Clone, Copy, Debug)]
pub struct EntityDisabled(pub Entity);

/// Fired by [`World::optimize`]; sorted/deferred query-set indices resolve
/// their pending work in response.
#[derive(Clone, Copy, Debug)]
pub struct Optimize;

/// Fired by [`World::trim_excess`]; pools shrink their backing storage to fit.
#[derive(Clone, Copy, Debug)]
pub struct TrimExcess;

/// Per-entity metadata: liveness generation, parent links, and the
/// component-membership bitset.
pub(crate) struct EntityInfo {
    pub(crate) version: Version,
    pub(crate) parents: BitSet,
    pub(crate) components: ComponentEnum,
}

impl EntityInfo {
    fn new() -> Self {
        EntityInfo {
            version: 0,
            parents: BitSet::new(),
            components: ComponentEnum::new(),
        }
    }
}

/// State shared (via `Rc<RefCell<_>>`) between the [`World`] and every
/// [`ComponentPool`] registered on it, so pools can reconstruct a versioned
/// owner [`Entity`], flip the pool's flag bit, and publish lifecycle
/// messages without needing a back-reference to `World` itself.
pub(crate) struct WorldShared {
    pub(crate) id: WorldId,
    pub(crate) max_entities: i32,
    pub(crate) infos: Vec<EntityInfo>,
    pub(crate) free_list: Vec<EntityId>,
    pub(crate) alive_count: i32,
    pub(crate) flags: FlagRegistry,
    pub(crate) publisher: Rc<Publisher>,
}

impl WorldShared {
    pub(crate) fn entity_of(&self, entity_id: EntityId) -> Entity {
        let version = self
            .infos
            .get(entity_id as usize)
            .map(|i| i.version)
            .unwrap_or(0);
        Entity::new(self.id, entity_id, version)
    }

    pub(crate) fn is_alive(&self, e: Entity) -> bool {
        if e.is_unbound() || e.world_id() != self.id {
            return false;
        }
        match self.infos.get(e.entity_id() as usize) {
            Some(info) => info.version == e.version(),
            None => false,
        }
    }
}

type PoolSlot = Box<dyn Any>;

/// A single ECS world: a bounded table of entity slots plus the typed
/// component pools registered on it.
pub struct World {
    pub(crate) shared: Rc<RefCell<WorldShared>>,
    pools: HashMap<TypeId, PoolSlot>,
    pool_order: Vec<TypeId>,
    pending_max_components: HashMap<TypeId, u32>,
    type_readers: HashMap<TypeId, Rc<dyn Fn(&mut dyn ComponentTypeReader)>>,
    component_readers: HashMap<TypeId, Rc<dyn Fn(EntityId, &mut dyn ComponentReader)>>,
    copy_handlers: HashMap<TypeId, Rc<dyn Fn(EntityId, EntityId) -> Result<(), Error>>>,
    world_entity_id: EntityId,
}

impl World {
    /// Creates a world able to hold at most `max_entities` live entities,
    /// including the reserved world-entity singleton at slot 0.
    pub fn new(max_entities: i32) -> Self {
        let id = registry::allocate();
        debug!("world {id} created with max_entities={max_entities}");
        let mut infos = Vec::with_capacity(max_entities.max(1) as usize);
        let mut world_entity = EntityInfo::new();
        world_entity.components.set_enabled(true);
        infos.push(world_entity);

        let shared = WorldShared {
            id,
            max_entities,
            infos,
            free_list: Vec::new(),
            alive_count: 1, // slot 0, the world entity, counts as alive
            flags: FlagRegistry::default(),
            publisher: Rc::new(Publisher::new()),
        };

        World {
            shared: Rc::new(RefCell::new(shared)),
            pools: HashMap::default(),
            pool_order: Vec::new(),
            pending_max_components: HashMap::default(),
            type_readers: HashMap::default(),
            component_readers: HashMap::default(),
            copy_handlers: HashMap::default(),
            world_entity_id: 0,
        }
    }

    /// The process-local id assigned to this world.
    pub fn id(&self) -> WorldId {
        self.shared.borrow().id
    }

    /// The capacity this world was constructed with.
    pub fn max_entities(&self) -> i32 {
        self.shared.borrow().max_entities
    }

    /// Number of currently-alive entities, including the world entity.
    pub fn entity_count(&self) -> i32 {
        self.shared.borrow().alive_count
    }

    /// The handle for the world-local singleton entity (slot 0).
    pub fn world_entity(&self) -> Entity {
        self.shared.borrow().entity_of(self.world_entity_id)
    }

    /// `true` iff `e` identifies a currently-live entity in this world.
    pub fn is_alive(&self, e: Entity) -> bool {
        self.shared.borrow().is_alive(e)
    }

    /// Allocates a new entity slot, reusing a freed one if available, and
    /// publishes [`EntityCreated`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::MaxComponents`] (component `"Entity"`) if the world
    /// is already at `max_entities`.
    pub fn create_entity(&mut self) -> Result<Entity, Error> {
        let mut shared = self.shared.borrow_mut();
        if shared.alive_count >= shared.max_entities {
            warn!("world {} is at capacity ({})", shared.id, shared.max_entities);
            return Err(Error::MaxComponents(crate::error::MaxComponents {
                component: "Entity",
                max: shared.max_entities as u32,
            }));
        }

        let entity_id = if let Some(id) = shared.free_list.pop() {
            id
        } else {
            let id = shared.infos.len() as EntityId;
            shared.infos.push(EntityInfo::new());
            id
        };

        shared.alive_count += 1;
        let info = &mut shared.infos[entity_id as usize];
        info.components = ComponentEnum::new();
        info.parents = BitSet::new();
        info.components.set_enabled(true);
        let entity = Entity::new(shared.id, entity_id, info.version);
        trace!("world {} created entity {:?}", shared.id, entity);

        let publisher = shared.publisher.clone();
        drop(shared);
        publisher.publish(&EntityCreated(entity));
        Ok(entity)
    }

    /// Disposes `e`, publishing `EntityDisposing` then `EntityDisposed` and
    /// incrementing its version (wrap-skipping `-1`) so stale handles stop
    /// comparing alive.
    ///
    /// A no-op, per contract, if `e` is already dead or invalid.
    pub fn dispose_entity(&mut self, e: Entity) {
        if !self.is_alive(e) || e.entity_id() == self.world_entity_id {
            return;
        }

        let publisher = self.shared.borrow().publisher.clone();
        publisher.publish(&EntityDisposing(e));
        publisher.publish(&EntityDisposed(e));

        let mut shared = self.shared.borrow_mut();
        let entity_id = e.entity_id();
        let info = &mut shared.infos[entity_id as usize];
        let mut next = info.version.wrapping_add(1);
        if next == -1 {
            next = next.wrapping_add(1);
        }
        info.version = next;
        info.components = ComponentEnum::new();
        info.parents = BitSet::new();
        shared.alive_count -= 1;
        shared.free_list.push(entity_id);
        trace!("world {} disposed entity {:?}", shared.id, e);
    }

    /// Checks `e` against [`Error::InvalidHandle`], for operations the spec
    /// marks "always checked" (`enable`/`disable`) rather than debug-only.
    fn check_alive(&self, e: Entity, action: &'static str) -> Result<(), Error> {
        if self.is_alive(e) {
            Ok(())
        } else {
            Err(Error::InvalidHandle(InvalidHandle { entity: e, action }))
        }
    }

    /// Sets the entity's world-local `enabled` flag, publishing
    /// `EntityEnabled` if it flips from clear to set.
    pub fn enable(&mut self, e: Entity) -> Result<(), Error> {
        self.check_alive(e, "enable")?;
        let mut shared = self.shared.borrow_mut();
        let info = &mut shared.infos[e.entity_id() as usize];
        if !info.components.is_enabled() {
            info.components.set_enabled(true);
            let publisher = shared.publisher.clone();
            drop(shared);
            publisher.publish(&EntityEnabled(e));
        }
        Ok(())
    }

    /// Clears the entity's world-local `enabled` flag, publishing
    /// `EntityDisabled` if it flips from set to clear.
    pub fn disable(&mut self, e: Entity) -> Result<(), Error> {
        self.check_alive(e, "disable")?;
        let mut shared = self.shared.borrow_mut();
        let info = &mut shared.infos[e.entity_id() as usize];
        if info.components.is_enabled() {
            info.components.set_enabled(false);
            let publisher = shared.publisher.clone();
            drop(shared);
            publisher.publish(&EntityDisabled(e));
        }
        Ok(())
    }

    /// `true` iff `e` is currently enabled.
    pub fn is_enabled(&self, e: Entity) -> bool {
        self.is_alive(e)
            && self.shared.borrow().infos[e.entity_id() as usize]
                .components
                .is_enabled()
    }

    /// Access to the bus this world's lifecycle and component messages are
    /// published on.
    pub fn publisher(&self) -> Rc<Publisher> {
        self.shared.borrow().publisher.clone()
    }

    /// Sets the capacity a not-yet-created pool for `T` will use.
    ///
    /// Idempotent before the pool exists; has no effect afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MaxComponents`] if `n <= 0`.
    pub fn set_max_component_count<T: Component + 'static>(&mut self, n: i64) -> Result<(), Error> {
        if n <= 0 {
            return Err(Error::MaxComponents(crate::error::MaxComponents {
                component: std::any::type_name::<T>(),
                max: 0,
            }));
        }
        let ty = TypeId::of::<T>();
        if !self.pools.contains_key(&ty) {
            self.pending_max_components.insert(ty, n as u32);
        }
        Ok(())
    }

    /// Registers (or returns the existing) pool for `T`, wiring its bus
    /// subscriptions (`EntityDisposed` removal, `EntityCopy` duplication)
    /// and its `read_all_component_types`/per-entity read callbacks.
    pub fn register<T>(&mut self) -> Rc<RefCell<ComponentPool<T>>>
    where
        T: Component + Clone + ReflectFields + 'static,
    {
        let ty = TypeId::of::<T>();
        if let Some(existing) = self.pools.get(&ty) {
            return existing
                .downcast_ref::<Rc<RefCell<ComponentPool<T>>>>()
                .expect("pool type mismatch")
                .clone();
        }

        let max_components = if T::IS_FLAG {
            1
        } else {
            self.pending_max_components
                .remove(&ty)
                .unwrap_or_else(|| self.shared.borrow().max_entities.max(1) as u32)
        };

        let flag = self.shared.borrow_mut().flags.flag_for::<T>();
        let pool = Rc::new(RefCell::new(ComponentPool::new(
            self.shared.clone(),
            flag,
            max_components,
        )));

        {
            let pool_for_dispose = pool.clone();
            let sub = self
                .shared
                .borrow()
                .publisher
                .subscribe::<EntityDisposed, _>(move |msg| {
                    let id = msg.0.entity_id();
                    if pool_for_dispose.borrow().has(id) {
                        let _ = pool_for_dispose.borrow_mut().remove(id);
                    }
                });
            pool.borrow_mut().keep_alive(sub);
        }
        {
            let pool_for_copy = pool.clone();
            let sub = self
                .shared
                .borrow()
                .publisher
                .subscribe::<EntityCopy, _>(move |msg| {
                    let mut p = pool_for_copy.borrow_mut();
                    if p.has(msg.src) {
                        if let Some(value) = p.get(msg.src).cloned() {
                            let _ = p.set(msg.dst, value);
                        }
                    }
                });
            pool.borrow_mut().keep_alive(sub);
        }
        {
            let pool_for_trim = pool.clone();
            let sub = self
                .shared
                .borrow()
                .publisher
                .subscribe::<TrimExcess, _>(move |_| {
                    pool_for_trim.borrow_mut().trim_excess();
                });
            pool.borrow_mut().keep_alive(sub);
        }

        let pool_for_type_read = pool.clone();
        self.type_readers.insert(
            ty,
            Rc::new(move |reader: &mut dyn ComponentTypeReader| {
                reader.on_read(std::any::type_name::<T>(), pool_for_type_read.borrow().max_components());
            }),
        );

        let pool_for_copy_handler = pool.clone();
        self.copy_handlers.insert(
            ty,
            Rc::new(move |src: EntityId, dst: EntityId| {
                let mut p = pool_for_copy_handler.borrow_mut();
                if p.has(src) {
                    let value = p.get(src).cloned().expect("has implies get");
                    p.set(dst, value)?;
                }
                Ok(())
            }),
        );

        let pool_for_component_read = pool.clone();
        self.component_readers.insert(
            ty,
            Rc::new(move |entity_id: EntityId, reader: &mut dyn ComponentReader| {
                let p = pool_for_component_read.borrow();
                if let Some((value, owner)) = p.get_with_owner(entity_id) {
                    reader.on_read(std::any::type_name::<T>(), value as &dyn ReflectFields, owner);
                }
            }),
        );

        self.pools.insert(ty, Box::new(pool.clone()));
        self.pool_order.push(ty);
        pool
    }

    /// Returns the pool for `T`, registering one with default capacity if
    /// it doesn't exist yet.
    pub fn pool<T>(&mut self) -> Rc<RefCell<ComponentPool<T>>>
    where
        T: Component + Clone + ReflectFields + 'static,
    {
        self.register::<T>()
    }

    /// Sets the singleton component `T` on the world entity.
    pub fn set<T>(&mut self, value: T) -> Result<(), Error>
    where
        T: Component + Clone + ReflectFields + 'static,
    {
        let pool = self.register::<T>();
        pool.borrow_mut().set(self.world_entity_id, value)?;
        Ok(())
    }

    /// `true` iff the world entity carries a `T`.
    pub fn has<T>(&self) -> bool
    where
        T: Component + Clone + ReflectFields + 'static,
    {
        match self.pools.get(&TypeId::of::<T>()) {
            Some(p) => p
                .downcast_ref::<Rc<RefCell<ComponentPool<T>>>>()
                .expect("pool type mismatch")
                .borrow()
                .has(self.world_entity_id),
            None => false,
        }
    }

    /// Removes `T` from the world entity, if present.
    pub fn remove<T>(&mut self) -> Result<(), Error>
    where
        T: Component + Clone + ReflectFields + 'static,
    {
        if let Some(p) = self.pools.get(&TypeId::of::<T>()) {
            let pool = p
                .downcast_ref::<Rc<RefCell<ComponentPool<T>>>>()
                .expect("pool type mismatch")
                .clone();
            if pool.borrow().has(self.world_entity_id) {
                pool.borrow_mut().remove(self.world_entity_id)?;
            }
        }
        Ok(())
    }

    /// Invokes `reader.on_read(type_name, max)` once per registered pool, in
    /// registration order.
    pub fn read_all_component_types(&self, reader: &mut dyn ComponentTypeReader) {
        for ty in &self.pool_order {
            if let Some(f) = self.type_readers.get(ty) {
                f(reader);
            }
        }
    }

    /// For every registered pool that has a component on `e`, invokes
    /// `reader.on_read(type_name, fields, owner)`.
    pub fn read_components(&self, e: Entity, reader: &mut dyn ComponentReader) -> Result<(), Error> {
        if e.world_id() != self.id() {
            return Err(Error::NullArgument(NullArgument { what: "entity from a foreign world" }));
        }
        for ty in &self.pool_order {
            if let Some(f) = self.component_readers.get(ty) {
                f(e.entity_id(), reader);
            }
        }
        Ok(())
    }

    /// The runtime flag id assigned to `T` in this world, allocating one on
    /// first use. Used to build [`crate::filter::Filter`]s generically.
    pub fn flag_of<T: 'static>(&self) -> u32 {
        self.shared.borrow_mut().flags.flag_for::<T>()
    }

    /// `TypeId`s of every registered pool, in registration order. Used by
    /// [`crate::cloner::ComponentCloner`] to walk every component type a
    /// source entity might hold without needing them named generically.
    pub(crate) fn registered_types(&self) -> &[TypeId] {
        &self.pool_order
    }

    /// The default copy-on-clone handler registered for `ty`: if the source
    /// entity holds the component, clones it onto the destination.
    pub(crate) fn copy_handler(&self, ty: TypeId) -> Option<Rc<dyn Fn(EntityId, EntityId) -> Result<(), Error>>> {
        self.copy_handlers.get(&ty).cloned()
    }

    /// A clone of `e`'s current component-membership bitset, or `None` if
    /// `e` isn't alive.
    pub(crate) fn component_enum(&self, e: Entity) -> Option<ComponentEnum> {
        if !self.is_alive(e) {
            return None;
        }
        Some(self.shared.borrow().infos[e.entity_id() as usize].components.clone())
    }

    /// Every currently-alive entity, excluding the world-entity singleton,
    /// in ascending slot order.
    pub fn alive_entities(&self) -> Vec<Entity> {
        let shared = self.shared.borrow();
        (1..shared.infos.len() as EntityId)
            .filter(|&id| {
                !shared.free_list.contains(&id)
            })
            .map(|id| shared.entity_of(id))
            .collect()
    }

    /// Triggers deferred maintenance: sorted query sets resolve pending
    /// insert placement.
    pub fn optimize(&self) {
        let publisher = self.shared.borrow().publisher.clone();
        publisher.publish(&Optimize);
    }

    /// Shrinks every registered pool's backing storage to fit its live
    /// range.
    pub fn trim_excess(&self) {
        let publisher = self.shared.borrow().publisher.clone();
        publisher.publish(&TrimExcess);
    }
}

/// Clones the `Rc` to this world's shared state, for query sets that need to
/// read entity metadata directly without going through `&World` borrows tied
/// to the subscribing closure's lifetime.
pub(crate) fn shared_handle(world: &World) -> Rc<RefCell<WorldShared>> {
    world.shared.clone()
}

impl Drop for World {
    fn drop(&mut self) {
        let id = self.shared.borrow().id;
        registry::release(id);
    }
}

/// Test-only helper letting `component.rs`'s unit tests exercise
/// `ComponentPool` directly, without going through a full `World`.
#[cfg(test)]
pub(crate) struct EntityInfoTestShim;

#[cfg(test)]
impl EntityInfoTestShim {
    pub(crate) fn fresh_shared(max_entities: i32) -> Rc<RefCell<WorldShared>> {
        let id = registry::allocate();
        let mut infos = Vec::with_capacity(max_entities.max(1) as usize);
        for _ in 0..max_entities.max(1) {
            infos.push(EntityInfo::new());
        }
        Rc::new(RefCell::new(WorldShared {
            id,
            max_entities,
            infos,
            free_list: Vec::new(),
            alive_count: 0,
            flags: FlagRegistry::default(),
            publisher: Rc::new(Publisher::new()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Num(i32);
    impl Component for Num {}
    impl ReflectFields for Num {
        fn visit_fields(&self, visitor: &mut dyn crate::serialize::FieldVisitor) {
            visitor.visit_field("0", &self.0);
        }
    }

    #[test]
    fn basic_lifecycle() {
        let mut world = World::new(10);
        let e = world.create_entity().unwrap();
        world.pool::<Num>().borrow_mut().set(e.entity_id(), Num(42)).unwrap();
        assert!(world.pool::<Num>().borrow().has(e.entity_id()));
        assert!(world.is_alive(e));

        world.dispose_entity(e);
        assert!(!world.is_alive(e));

        let e2 = world.create_entity().unwrap();
        assert_eq!(e2.entity_id(), e.entity_id());
        assert_ne!(e2.version(), e.version());
    }

    #[test]
    fn world_entity_singleton() {
        let mut world = World::new(4);
        world.set(Num(7)).unwrap();
        assert!(world.has::<Num>());
        world.remove::<Num>().unwrap();
        assert!(!world.has::<Num>());
    }

    #[test]
    fn capacity_is_enforced() {
        let mut world = World::new(2); // slot 0 is the world entity
        let _e1 = world.create_entity().unwrap();
        assert!(world.create_entity().is_err());
    }

    #[test]
    fn enable_disable_round_trip() {
        let mut world = World::new(4);
        let e = world.create_entity().unwrap();
        assert!(world.is_enabled(e));
        world.disable(e).unwrap();
        assert!(!world.is_enabled(e));
        world.enable(e).unwrap();
        assert!(world.is_enabled(e));
    }
}
