//! Entity type, allocation and the entity index.
//!
//! An [`Entity`] is a lightweight `u64` identifier with no inherent data.
//! The [`EntityIndex`] maps every live entity to the archetype table and row
//! holding its components.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::archetype::ArchetypeId;
use crate::error::{EcsError, EcsResult};

/// A unique entity identifier.
///
/// Entities are pure identifiers. Components are attached to entities to give
/// them meaning. Identifiers are never reused within a store, so a stale
/// handle always reports [`EcsError::EntityNotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(pub u64);

impl Entity {
    /// Never allocated; stands for "no entity".
    pub const INVALID: Entity = Entity(0);

    /// Wrap a raw id. Does not allocate it.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// The raw id.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// `false` only for [`Entity::INVALID`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Allocates monotonically increasing entity IDs.
///
/// Allocation only needs `&self`, so a command buffer can reserve an
/// identifier while queries still hold shared borrows of the store.
#[derive(Debug)]
pub struct EntityAllocator {
    next_id: AtomicU64,
}

impl EntityAllocator {
    /// The first identifier handed out is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Hand out the next identifier. Never returns a previous one.
    pub fn allocate(&self) -> Entity {
        Entity(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns `true` if `entity` was handed out by this allocator.
    #[must_use]
    pub fn is_allocated(&self, entity: Entity) -> bool {
        entity.is_valid() && entity.0 < self.next_id.load(Ordering::Relaxed)
    }

    /// Identifiers handed out so far, live or not.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - 1
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Where an entity's components live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLocation {
    /// The table holding the entity.
    pub archetype: ArchetypeId,
    /// Row within that table.
    pub row: usize,
}

/// Maps each live entity to its [`EntityLocation`].
#[derive(Debug, Default)]
pub struct EntityIndex {
    locations: HashMap<Entity, EntityLocation>,
}

impl EntityIndex {
    /// An empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or overwrite) the location of `entity`.
    pub fn insert(&mut self, entity: Entity, location: EntityLocation) {
        self.locations.insert(entity, location);
    }

    /// Look up the location of a live entity.
    pub fn get(&self, entity: Entity) -> EcsResult<EntityLocation> {
        self.locations
            .get(&entity)
            .copied()
            .ok_or(EcsError::EntityNotFound(entity))
    }

    /// Point `entity` at a new row in its current table. Used after a
    /// swap-remove moved it.
    pub fn set_row(&mut self, entity: Entity, row: usize) -> EcsResult<()> {
        let location = self
            .locations
            .get_mut(&entity)
            .ok_or(EcsError::EntityNotFound(entity))?;
        location.row = row;
        Ok(())
    }

    /// Forget a live entity, returning its last location.
    pub fn remove(&mut self, entity: Entity) -> EcsResult<EntityLocation> {
        self.locations
            .remove(&entity)
            .ok_or(EcsError::EntityNotFound(entity))
    }

    /// Whether `entity` is live.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.locations.contains_key(&entity)
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Returns `true` if no entity is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_round_trip_and_sentinel() {
        let entity = Entity::from_raw(42);
        assert_eq!((entity.id(), entity.to_string()), (42, "Entity(42)".to_string()));
        assert!(entity.is_valid() && !Entity::INVALID.is_valid());
    }

    #[test]
    fn test_allocation_is_monotonic_from_one() {
        let allocator = EntityAllocator::new();
        let ids: Vec<u64> = (0..3).map(|_| allocator.allocate().id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(allocator.count(), 3);
        assert!(allocator.is_allocated(Entity(2)));
        assert!(!allocator.is_allocated(Entity(4)));
        assert!(!allocator.is_allocated(Entity::INVALID));
    }

    #[test]
    fn test_index_lifecycle() {
        let mut index = EntityIndex::new();
        let e = Entity(1);
        let location = EntityLocation {
            archetype: ArchetypeId(0),
            row: 3,
        };
        index.insert(e, location);
        assert_eq!(index.get(e).unwrap(), location);

        index.set_row(e, 0).unwrap();
        assert_eq!(index.get(e).unwrap().row, 0);

        assert_eq!(index.remove(e).unwrap().row, 0);
        assert!(!index.contains(e));
        assert_eq!(index.get(e), Err(EcsError::EntityNotFound(e)));
        assert_eq!(index.set_row(e, 1), Err(EcsError::EntityNotFound(e)));
    }
}
