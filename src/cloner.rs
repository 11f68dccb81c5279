//! `ComponentCloner`: duplicates an entity's components onto a fresh one.
//!
//! Grounded in the world's own `EntityCopy`-shaped default pool reaction
//! (`World::register`'s copy handler, `world.rs`), generalized here with
//! per-type overrides and rollback-on-failure, matching the teacher's
//! `storage::AnyStorage` pattern of one type-erased entry point per
//! registered pool (see `storage/storages.rs`'s `MaskedStorage` drop/merge
//! dispatch for the same "iterate every registered pool generically" shape).

use std::any::TypeId;
use std::collections::HashMap;

use crate::component::Component;
use crate::entity::{Entity, EntityId};
use crate::error::{Error, InvalidHandle};
use crate::world::World;

type OverrideFn = Box<dyn Fn(&mut World, EntityId, EntityId) -> Result<(), Error>>;

/// Copies a source entity's components onto a destination entity.
///
/// For every registered component type, the default behavior is: if the
/// source holds the component, clone it onto the destination (the same
/// reaction a pool gives to a published `EntityCopy` message). Call
/// [`ComponentCloner::with_override`] to replace that behavior for a
/// specific type — the override runs instead of the default handler and is
/// responsible for checking whether the source actually holds the
/// component, exactly as the default handler does.
///
/// If any handler returns an error, the destination entity (which this
/// cloner always creates fresh) is disposed before the error propagates, so
/// a failed clone never leaves a partially-populated entity behind.
pub struct ComponentCloner<'w> {
    world: &'w mut World,
    overrides: HashMap<TypeId, OverrideFn>,
}

impl<'w> ComponentCloner<'w> {
    /// Builds a cloner with no type overrides.
    pub fn new(world: &'w mut World) -> Self {
        ComponentCloner {
            world,
            overrides: HashMap::new(),
        }
    }

    /// Replaces the default copy behavior for `T` with `handler`.
    pub fn with_override<T>(
        mut self,
        handler: impl Fn(&mut World, EntityId, EntityId) -> Result<(), Error> + 'static,
    ) -> Self
    where
        T: Component + 'static,
    {
        self.overrides.insert(TypeId::of::<T>(), Box::new(handler));
        self
    }

    /// Creates a new entity and copies every component `src` holds onto it,
    /// per registered type's handler (override or default).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandle`] if `src` isn't alive. If a copy
    /// handler errors partway through, the freshly-created destination is
    /// disposed and the handler's error is returned.
    pub fn clone_entity(&mut self, src: Entity) -> Result<Entity, Error> {
        if !self.world.is_alive(src) {
            return Err(Error::InvalidHandle(InvalidHandle { entity: src, action: "clone" }));
        }

        let dst = self.world.create_entity()?;
        match self.copy_all(src.entity_id(), dst.entity_id()) {
            Ok(()) => Ok(dst),
            Err(e) => {
                self.world.dispose_entity(dst);
                Err(e)
            }
        }
    }

    fn copy_all(&mut self, src_id: EntityId, dst_id: EntityId) -> Result<(), Error> {
        let types: Vec<TypeId> = self.world.registered_types().to_vec();
        for ty in types {
            if let Some(handler) = self.overrides.get(&ty) {
                handler(self.world, src_id, dst_id)?;
            } else if let Some(default) = self.world.copy_handler(ty) {
                default(src_id, dst_id)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::FieldVisitor;

    #[derive(Clone, Debug, PartialEq)]
    struct Position(f32, f32);
    impl Component for Position {}
    impl crate::serialize::ReflectFields for Position {
        fn visit_fields(&self, v: &mut dyn FieldVisitor) {
            v.visit_field("0", &self.0);
            v.visit_field("1", &self.1);
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Health(i32);
    impl Component for Health {}
    impl crate::serialize::ReflectFields for Health {
        fn visit_fields(&self, v: &mut dyn FieldVisitor) {
            v.visit_field("0", &self.0);
        }
    }

    #[test]
    fn default_copy_duplicates_every_component() {
        let mut world = World::new(8);
        let src = world.create_entity().unwrap();
        world.pool::<Position>().borrow_mut().set(src.entity_id(), Position(1.0, 2.0)).unwrap();
        world.pool::<Health>().borrow_mut().set(src.entity_id(), Health(10)).unwrap();

        let dst = ComponentCloner::new(&mut world).clone_entity(src).unwrap();

        assert_eq!(world.pool::<Position>().borrow().get(dst.entity_id()), Some(&Position(1.0, 2.0)));
        assert_eq!(world.pool::<Health>().borrow().get(dst.entity_id()), Some(&Health(10)));
    }

    #[test]
    fn override_replaces_default_behavior() {
        let mut world = World::new(8);
        let src = world.create_entity().unwrap();
        world.pool::<Health>().borrow_mut().set(src.entity_id(), Health(10)).unwrap();

        let dst = ComponentCloner::new(&mut world)
            .with_override::<Health>(|world, src_id, dst_id| {
                let pool = world.pool::<Health>();
                let mut pool = pool.borrow_mut();
                if let Some(&Health(v)) = pool.get(src_id) {
                    pool.set(dst_id, Health(v * 2))?;
                }
                Ok(())
            })
            .clone_entity(src)
            .unwrap();

        assert_eq!(world.pool::<Health>().borrow().get(dst.entity_id()), Some(&Health(20)));
    }

    #[test]
    fn failed_clone_disposes_destination() {
        let mut world = World::new(8);
        world.set_max_component_count::<Health>(1).unwrap();
        let src = world.create_entity().unwrap();
        // Fills the pool's only slot; copying onto a fresh `dst` needs a
        // second slot, which the 1-capacity pool can't provide.
        world.pool::<Health>().borrow_mut().set(src.entity_id(), Health(1)).unwrap();

        let before = world.entity_count();
        let result = ComponentCloner::new(&mut world).clone_entity(src);
        assert!(result.is_err());
        assert_eq!(world.entity_count(), before);
    }
}
