//! Prelude module
//!
//! Contains all of the most common traits, structures, and functions needed
//! to get started with `hive_ecs`.

pub use crate::cloner::ComponentCloner;
pub use crate::component::{Component, ComponentAdded, ComponentChanged, ComponentPool, ComponentRemoved};
pub use crate::entity::Entity;
pub use crate::error::Error;
pub use crate::filter::Filter;
pub use crate::publisher::{Disposable, Subscription};
pub use crate::query::{EntityMap, EntityMultiMap, EntitySet, EntitySortedSet};
pub use crate::serialize::{ComponentReader, ComponentTypeReader, FieldVisitor, ReflectFields};
pub use crate::world::World;
