//! Query sets: incrementally-maintained indices over a [`crate::filter::Filter`].
//!
//! All four variants share the reactive wiring established in `set.rs`:
//! subscribe to the world's lifecycle/`ComponentFlagChanged` bus, maintain a
//! live membership structure, and implement [`crate::publisher::Disposable`]
//! to tear the subscriptions down. Grounded in the teacher crate's
//! `storage/track.rs` `Tracked`/`ModifiedBitSet` machinery for the
//! add/modify/remove bookkeeping shape, generalized from its single-type
//! `Join` model to an arbitrary runtime filter.

pub mod map;
pub mod multimap;
pub mod set;
pub mod sorted_set;

pub use map::EntityMap;
pub use multimap::EntityMultiMap;
pub use set::EntitySet;
pub use sorted_set::EntitySortedSet;
