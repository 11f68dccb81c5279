//! Error types returned by `hive_ecs` operations.
//!
//! There is one specific struct per error kind plus a single [`Error`] enum
//! able to represent all of them, each with an `Into<Error>` impl, mirroring
//! the error module shape used throughout the pool and world APIs.

use std::error::Error as StdError;
use std::fmt;

use crate::entity::Entity;

/// The crate-wide error type.
#[derive(Debug)]
pub enum Error {
    /// An operation was attempted on a handle that does not identify a live
    /// entity (unbound `world_id`, or a stale `version`).
    InvalidHandle(InvalidHandle),
    /// `set_same_as` was called with a reference entity that lives in a
    /// different world.
    ForeignEntity(ForeignEntity),
    /// `set_same_as` targeted a reference lacking the component, or
    /// `notify_changed` was called for a component the entity doesn't have.
    MissingComponent(MissingComponent),
    /// A non-flag component pool is already at its configured capacity.
    MaxComponents(MaxComponents),
    /// The text/binary serializer encountered malformed input.
    SerializationError(SerializationError),
    /// A serializer or cloner API was given an absent stream or reader.
    NullArgument(NullArgument),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidHandle(e) => write!(f, "{e}"),
            Error::ForeignEntity(e) => write!(f, "{e}"),
            Error::MissingComponent(e) => write!(f, "{e}"),
            Error::MaxComponents(e) => write!(f, "{e}"),
            Error::SerializationError(e) => write!(f, "{e}"),
            Error::NullArgument(e) => write!(f, "{e}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::InvalidHandle(e) => Some(e),
            Error::ForeignEntity(e) => Some(e),
            Error::MissingComponent(e) => Some(e),
            Error::MaxComponents(e) => Some(e),
            Error::SerializationError(e) => Some(e),
            Error::NullArgument(e) => Some(e),
        }
    }
}

macro_rules! specific_error {
    ($name:ident { $($field:ident : $ty:ty),* $(,)? }, $fmt:expr) => {
        /// See the variant of the same name on [`Error`].
        #[derive(Debug)]
        pub struct $name {
            $(
                #[allow(missing_docs)]
                pub $field: $ty,
            )*
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                #[allow(unused_variables)]
                let Self { $($field),* } = self;
                write!(f, $fmt)
            }
        }

        impl StdError for $name {}

        impl From<$name> for Error {
            fn from(e: $name) -> Self {
                Error::$name(e)
            }
        }
    };
}

specific_error!(
    InvalidHandle { entity: Entity, action: &'static str },
    "tried to {action} entity {entity:?}, but it is not alive"
);

specific_error!(
    ForeignEntity { entity: Entity, reference: Entity },
    "set_same_as between {entity:?} and {reference:?} crosses world boundaries"
);

specific_error!(
    MissingComponent { entity: Entity, component: &'static str, action: &'static str },
    "entity {entity:?} has no component of type {component} to {action}"
);

specific_error!(
    MaxComponents { component: &'static str, max: u32 },
    "pool for component type {component} is full (max_components = {max})"
);

specific_error!(
    SerializationError { message: String },
    "serialization error: {message}"
);

specific_error!(
    NullArgument { what: &'static str },
    "missing required argument: {what}"
);
