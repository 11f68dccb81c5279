//! `ComponentEnum`: the per-entity bitset of owned component flags plus the
//! `enabled` flag, and the registry that lazily allocates one flag id per
//! `(World, ComponentType)` pair.
//!
//! Backed by [`hibitset::BitSet`], the same growable bitset the teacher crate
//! uses throughout `storage/` and `join/` for component masks.

use std::any::TypeId;
use ahash::AHashMap as HashMap;

use hibitset::{BitSet, BitSetLike};

/// Flag id reserved for an entity's world-local "enabled" bit.
pub const ENABLED_FLAG: u32 = 0;

/// A growable bitset of component-membership flags (plus the `enabled` flag
/// at a fixed position), embedded in each `EntityInfo`.
#[derive(Clone, Default, Debug)]
pub struct ComponentEnum {
    bits: BitSet,
}

impl ComponentEnum {
    /// An empty enum with the `enabled` flag unset.
    pub fn new() -> Self {
        ComponentEnum { bits: BitSet::new() }
    }

    /// Whether `flag` is set.
    #[inline]
    pub fn get(&self, flag: u32) -> bool {
        self.bits.contains(flag)
    }

    /// Sets `flag`.
    #[inline]
    pub fn set(&mut self, flag: u32) {
        self.bits.add(flag);
    }

    /// Clears `flag`.
    #[inline]
    pub fn clear(&mut self, flag: u32) {
        self.bits.remove(flag);
    }

    /// Whether the entity's `enabled` flag is set.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.get(ENABLED_FLAG)
    }

    /// Sets or clears the `enabled` flag.
    #[inline]
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            self.set(ENABLED_FLAG);
        } else {
            self.clear(ENABLED_FLAG);
        }
    }

    /// Borrow the raw bitset, e.g. for filter evaluation via `hibitset`
    /// combinators.
    #[inline]
    pub fn bits(&self) -> &BitSet {
        &self.bits
    }

    /// `true` iff every bit in `other` is also set here.
    pub fn contains_all(&self, other: &BitSet) -> bool {
        other.iter().all(|bit| self.bits.contains(bit))
    }

    /// `true` iff no bit in `other` is set here.
    pub fn contains_none(&self, other: &BitSet) -> bool {
        other.iter().all(|bit| !self.bits.contains(bit))
    }

    /// `true` iff at least one bit in `other` is set here.
    pub fn contains_any(&self, other: &BitSet) -> bool {
        other.iter().any(|bit| self.bits.contains(bit))
    }
}

/// Lazily allocates one flag id per component type, world-local and
/// monotonically increasing; flag `0` is reserved for `enabled`.
#[derive(Debug)]
pub struct FlagRegistry {
    next: u32,
    by_type: HashMap<TypeId, u32>,
}

impl Default for FlagRegistry {
    fn default() -> Self {
        FlagRegistry {
            next: ENABLED_FLAG + 1,
            by_type: HashMap::default(),
        }
    }
}

impl FlagRegistry {
    /// Returns the flag id for `T`, allocating a new one on first use.
    pub fn flag_for<T: 'static>(&mut self) -> u32 {
        let ty = TypeId::of::<T>();
        if let Some(&id) = self.by_type.get(&ty) {
            return id;
        }
        let id = self.next;
        self.next += 1;
        self.by_type.insert(ty, id);
        id
    }

    /// Returns the flag id for `T` if one has already been allocated.
    pub fn existing_flag_for<T: 'static>(&self) -> Option<u32> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;

    #[test]
    fn flags_are_stable_and_distinct() {
        let mut reg = FlagRegistry::default();
        let a1 = reg.flag_for::<A>();
        let b = reg.flag_for::<B>();
        let a2 = reg.flag_for::<A>();
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_ne!(a1, ENABLED_FLAG);
    }

    #[test]
    fn enabled_flag_is_independent() {
        let mut e = ComponentEnum::new();
        assert!(!e.is_enabled());
        e.set_enabled(true);
        assert!(e.is_enabled());
        e.set(5);
        assert!(e.get(5));
        e.clear(5);
        assert!(!e.get(5));
        assert!(e.is_enabled());
    }
}
