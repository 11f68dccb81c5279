//! # hive_ecs
//!
//! A single-threaded, reactive Entity-Component-System container.
//!
//! A [`World`] holds a bounded table of versioned entity slots. Component
//! data lives in dense, per-type [`ComponentPool`]s that a `World` registers
//! lazily. Every mutating operation — creating or disposing an entity,
//! setting or removing a component, enabling or disabling either — is
//! announced synchronously on the world's [`Publisher`], and the `query`
//! module's incrementally-maintained sets and maps subscribe to that bus to
//! stay current without re-scanning.
//!
//! ```
//! use hive_ecs::prelude::*;
//!
//! #[derive(Clone)]
//! struct Position(f32, f32);
//! impl Component for Position {}
//! impl ReflectFields for Position {
//!     fn visit_fields(&self, v: &mut dyn FieldVisitor) {
//!         v.visit_field("x", &self.0);
//!         v.visit_field("y", &self.1);
//!     }
//! }
//!
//! let mut world = World::new(1024);
//! let e = world.create_entity().unwrap();
//! world.pool::<Position>().borrow_mut().set(e.entity_id(), Position(0.0, 0.0)).unwrap();
//! assert!(world.pool::<Position>().borrow().has(e.entity_id()));
//! ```

pub mod bitset;
pub mod cloner;
pub mod component;
pub mod entity;
pub mod error;
pub mod filter;
pub mod prelude;
pub mod publisher;
pub mod query;
mod registry;
pub mod serialize;
pub mod world;

pub use cloner::ComponentCloner;
pub use component::{
    ChangeKind, Component, ComponentAdded, ComponentChanged, ComponentDisabled, ComponentEnabled,
    ComponentFlagChanged, ComponentPool, ComponentRemoved, EntityCopy,
};
pub use entity::{Entity, EntityId, Version, WorldId};
pub use error::Error;
pub use filter::Filter;
pub use publisher::{Disposable, Publisher, Subscription};
pub use query::{EntityMap, EntityMultiMap, EntitySet, EntitySortedSet};
pub use world::{
    EntityCreated, EntityDisabled, EntityDisposed, EntityDisposing, EntityEnabled, Optimize,
    TrimExcess, World,
};
