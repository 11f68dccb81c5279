//! The filter DSL shared by every query-set variant.
//!
//! Grounded in the teacher crate's `join/bit_and.rs` (`BitSetAnd`) and
//! `storage/track.rs` (`ModifiedBitSet`, tracked-storage reads gated by a
//! mask) for the "combine component bitsets with boolean operators" idiom,
//! generalized to a runtime-composed filter since query sets here are
//! ordinary values (not `Join` trait impls threaded through a `World`
//! borrow).

use hibitset::BitSet;

use crate::bitset::ComponentEnum;

/// A runtime-composed predicate over an entity's [`ComponentEnum`].
///
/// An entity matches when: it is enabled, it carries every flag in `with`,
/// it carries none of the flags in `without`, every group in `with_either`
/// contributes at least one present flag, and every group in
/// `without_either` is missing at least one flag.
///
/// `added`/`changed`/`removed` don't participate in [`Filter::matches`];
/// they tell a query set which flags should force a re-add pass even when
/// static membership hasn't changed (see `query::set::EntitySet`).
#[derive(Clone, Default)]
pub struct Filter {
    pub(crate) with: BitSet,
    pub(crate) without: BitSet,
    pub(crate) with_either: Vec<BitSet>,
    pub(crate) without_either: Vec<BitSet>,
    pub(crate) added: BitSet,
    pub(crate) changed: BitSet,
    pub(crate) removed: BitSet,
}

impl Filter {
    /// An empty filter: matches every enabled entity.
    pub fn new() -> Self {
        Filter::default()
    }

    /// Requires `flag` to be present.
    pub fn with(mut self, flag: u32) -> Self {
        self.with.add(flag);
        self
    }

    /// Requires `flag` to be absent.
    pub fn without(mut self, flag: u32) -> Self {
        self.without.add(flag);
        self
    }

    /// Adds an "either" group: at least one of `flags` must be present.
    pub fn with_either(mut self, flags: impl IntoIterator<Item = u32>) -> Self {
        let mut group = BitSet::new();
        for f in flags {
            group.add(f);
        }
        self.with_either.push(group);
        self
    }

    /// Adds a "without-either" group: at least one of `flags` must be
    /// absent.
    pub fn without_either(mut self, flags: impl IntoIterator<Item = u32>) -> Self {
        let mut group = BitSet::new();
        for f in flags {
            group.add(f);
        }
        self.without_either.push(group);
        self
    }

    /// Marks `flag` as a change-tracking class: `ComponentAdded` for this
    /// flag forces the query set to re-add the entity.
    pub fn added(mut self, flag: u32) -> Self {
        self.added.add(flag);
        self
    }

    /// Marks `flag` as a change-tracking class for `ComponentChanged`.
    pub fn changed(mut self, flag: u32) -> Self {
        self.changed.add(flag);
        self
    }

    /// Marks `flag` as a change-tracking class for `ComponentRemoved`.
    pub fn removed(mut self, flag: u32) -> Self {
        self.removed.add(flag);
        self
    }

    /// `true` iff this filter has any `added`/`changed`/`removed` class
    /// configured — such filters need `complete()` to clear touched-state
    /// each frame.
    pub fn has_change_classes(&self) -> bool {
        self.added.iter().next().is_some()
            || self.changed.iter().next().is_some()
            || self.removed.iter().next().is_some()
    }

    /// Whether `flag` is one of the classes this filter reacts to for
    /// `Added`/`Changed`/`Removed` messages (used by query sets to decide
    /// whether to force a re-add instead of a plain membership update).
    pub(crate) fn tracks(&self, kind: ChangeClass, flag: u32) -> bool {
        match kind {
            ChangeClass::Added => self.added.contains(flag),
            ChangeClass::Changed => self.changed.contains(flag),
            ChangeClass::Removed => self.removed.contains(flag),
        }
    }

    pub(crate) fn matches(&self, components: &ComponentEnum) -> bool {
        components.is_enabled()
            && components.contains_all(&self.with)
            && components.contains_none(&self.without)
            && self.with_either.iter().all(|g| components.contains_any(g))
            && self
                .without_either
                .iter()
                .all(|g| !components.contains_all(g))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChangeClass {
    Added,
    Changed,
    Removed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enum_with(flags: &[u32]) -> ComponentEnum {
        let mut e = ComponentEnum::new();
        e.set_enabled(true);
        for &f in flags {
            e.set(f);
        }
        e
    }

    #[test]
    fn with_and_without_combine_as_and() {
        let filter = Filter::new().with(1).without(2);
        assert!(filter.matches(&enum_with(&[1])));
        assert!(!filter.matches(&enum_with(&[1, 2])));
        assert!(!filter.matches(&enum_with(&[2])));
    }

    #[test]
    fn either_groups_require_at_least_one() {
        let filter = Filter::new().with_either([3, 4]);
        assert!(filter.matches(&enum_with(&[3])));
        assert!(filter.matches(&enum_with(&[4])));
        assert!(!filter.matches(&enum_with(&[])));
    }

    #[test]
    fn without_either_requires_at_least_one_missing() {
        let filter = Filter::new().without_either([3, 4]);
        assert!(filter.matches(&enum_with(&[3])));
        assert!(!filter.matches(&enum_with(&[3, 4])));
    }

    #[test]
    fn disabled_entity_never_matches() {
        let mut e = ComponentEnum::new();
        e.set(1);
        let filter = Filter::new().with(1);
        assert!(!filter.matches(&e));
    }
}
