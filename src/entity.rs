//! The entity handle.

use std::fmt;

/// Small integer assigned to a [`World`](crate::world::World) by the
/// process-local [`registry`](crate::registry).
pub type WorldId = u16;

/// Index of an entity's slot inside one world's entity table.
pub type EntityId = i32;

/// Generation counter guarding a slot against stale handles.
///
/// `-1` is skipped when incrementing (spec'd sentinel); exhausting the
/// remaining `i16` range makes the slot permanently unreusable, which is a
/// documented limit rather than a bug.
pub type Version = i16;

/// A lightweight, `Copy` handle identifying one entity in one world.
///
/// Equality compares all three fields. A handle with `world_id == 0` is
/// *unbound* — e.g. `Entity::default()` — and never compares equal to any
/// live entity, since real worlds are assigned ids starting at 1.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Entity {
    world_id: WorldId,
    entity_id: EntityId,
    version: Version,
}

impl Entity {
    pub(crate) fn new(world_id: WorldId, entity_id: EntityId, version: Version) -> Self {
        Entity {
            world_id,
            entity_id,
            version,
        }
    }

    /// The id of the world this handle was created in.
    #[inline]
    pub fn world_id(&self) -> WorldId {
        self.world_id
    }

    /// The slot index within its world.
    #[inline]
    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    /// The version this handle was stamped with at creation.
    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Whether this handle carries the sentinel world id `0`.
    ///
    /// An unbound handle is never alive, regardless of the slot/version it
    /// otherwise names.
    #[inline]
    pub fn is_unbound(&self) -> bool {
        self.world_id == 0
    }
}

impl Default for Entity {
    fn default() -> Self {
        Entity {
            world_id: 0,
            entity_id: 0,
            version: 0,
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entity({}:{}v{})",
            self.world_id, self.entity_id, self.version
        )
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unbound() {
        let e = Entity::default();
        assert!(e.is_unbound());
    }

    #[test]
    fn equality_compares_all_fields() {
        let a = Entity::new(1, 5, 0);
        let b = Entity::new(1, 5, 0);
        let c = Entity::new(1, 5, 1);
        let d = Entity::new(2, 5, 0);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }
}
