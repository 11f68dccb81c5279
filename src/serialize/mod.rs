//! Reflection-free field enumeration and the reader callbacks the core
//! exposes to external serialization/cloning clients.
//!
//! The spec calls for "a trait/interface each serializable component
//! implements... enumerating fields by name + visit callback" in place of
//! general reflection (see the derive macro's `ReflectFields` expansion).
//! This module defines that trait plus the two reader callbacks
//! [`World::read_all_component_types`](crate::world::World::read_all_component_types)
//! and [`World::read_components`](crate::world::World::read_components) drive.

use std::fmt;

use crate::entity::Entity;

pub mod text;

/// Receives one `(name, value)` pair per field of a component, in
/// declaration order.
pub trait FieldVisitor {
    /// A scalar field — anything that implements [`fmt::Display`].
    fn visit_field(&mut self, name: &str, value: &dyn fmt::Display);

    /// A compound field whose type itself implements [`ReflectFields`].
    fn visit_nested(&mut self, name: &str, value: &dyn ReflectFields);
}

/// Implemented by every component type that wants to support the text/binary
/// serializer or `ComponentCloner`'s reader-based inspection.
///
/// `#[derive(ReflectFields)]` generates this for ordinary structs (named or
/// tuple fields); flag types with no fields get an empty body. Hand-written
/// impls can call [`FieldVisitor::visit_nested`] for fields that are
/// themselves `ReflectFields` components.
pub trait ReflectFields {
    /// Visits every field of `self`, in order.
    fn visit_fields(&self, visitor: &mut dyn FieldVisitor);
}

/// Callback driven once per live component on a given entity.
///
/// `type_name` is `std::any::type_name::<T>()` of the pool that produced the
/// call; `fields` lets the reader enumerate the component's data without
/// knowing its concrete Rust type.
pub trait ComponentReader {
    /// Invoked once per pool that holds a component for the entity being
    /// read, in pool-registration order.
    fn on_read(&mut self, type_name: &'static str, fields: &dyn ReflectFields, owner: Entity);
}

/// Callback driven once per registered pool by
/// [`World::read_all_component_types`](crate::world::World::read_all_component_types).
pub trait ComponentTypeReader {
    /// Invoked once per registered pool, in registration order.
    fn on_read(&mut self, type_name: &'static str, max_component_count: u32);
}
