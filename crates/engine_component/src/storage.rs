//! Entity storage: the entity index, the archetype graph and migration.

use std::cell::{Ref, RefCell};
use std::collections::HashSet;

use tracing::trace;

use crate::archetype::{ArchetypeId, MovedRow};
use crate::bundle::Bundle;
use crate::column::Column;
use crate::component::{Component, ComponentRegistry};
use crate::entity::{Entity, EntityAllocator, EntityIndex, EntityLocation};
use crate::error::{EcsError, EcsResult};
use crate::graph::ArchetypeGraph;
use crate::query::{Query, QueryFilter, WorldQuery};
use crate::signature::Signature;

/// All entities and components of one world.
///
/// Every live entity sits in exactly one row of exactly one archetype table,
/// and the entity index always points at that row.
#[derive(Debug, Default)]
pub struct Storage {
    allocator: EntityAllocator,
    reserved: RefCell<HashSet<Entity>>,
    index: EntityIndex,
    archetypes: ArchetypeGraph,
    registry: ComponentRegistry,
}

impl Storage {
    /// An empty store with no archetypes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entity holding `bundle`.
    ///
    /// Fails with [`EcsError::DuplicateComponent`] before allocating an id if
    /// the bundle repeats a component type.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> EcsResult<Entity> {
        let signature = B::signature()?;
        let entity = self.allocator.allocate();
        self.insert_bundle(entity, signature, bundle)?;
        Ok(entity)
    }

    /// Allocate an identifier without creating the entity yet. Use
    /// [`Storage::spawn_at`] to materialise it.
    pub fn reserve_entity(&self) -> Entity {
        let entity = self.allocator.allocate();
        self.reserved.borrow_mut().insert(entity);
        entity
    }

    /// Materialise a reserved identifier with `bundle`.
    ///
    /// Each reservation can be used once. Identifiers that were never
    /// reserved, or that were already spawned and despawned, fail with
    /// [`EcsError::EntityNotFound`]; a live one fails with
    /// [`EcsError::EntityExists`].
    pub fn spawn_at<B: Bundle>(&mut self, entity: Entity, bundle: B) -> EcsResult<()> {
        if self.index.contains(entity) {
            return Err(EcsError::EntityExists(entity));
        }
        let signature = B::signature()?;
        if !self.reserved.get_mut().remove(&entity) {
            return Err(EcsError::EntityNotFound(entity));
        }
        let result = self.insert_bundle(entity, signature, bundle);
        if result.is_err() {
            self.reserved.get_mut().insert(entity);
        }
        result
    }

    /// Number of identifiers reserved but not yet spawned.
    #[must_use]
    pub fn reserved_count(&self) -> usize {
        self.reserved.borrow().len()
    }

    fn insert_bundle<B: Bundle>(
        &mut self,
        entity: Entity,
        signature: Signature,
        bundle: B,
    ) -> EcsResult<()> {
        let mut metas = Vec::new();
        B::component_metas(&mut metas);
        for meta in metas {
            self.registry.register(meta);
        }

        let archetype = self.archetypes.get_or_insert_with(signature, || {
            let mut columns = Vec::new();
            B::columns(&mut columns);
            columns
        });
        let row = self.archetypes[archetype].insert_row(entity, bundle)?;
        self.index.insert(entity, EntityLocation { archetype, row });
        trace!(%entity, archetype = archetype.0, row, "spawned entity");
        Ok(())
    }

    /// Destroy a live entity and drop its components.
    pub fn despawn(&mut self, entity: Entity) -> EcsResult<()> {
        let location = self.index.remove(entity)?;
        if let Some(moved) = self.archetypes[location.archetype].remove_row(location.row) {
            self.index.set_row(moved, location.row)?;
        }
        trace!(%entity, "despawned entity");
        Ok(())
    }

    /// Where `entity` lives.
    pub fn locate(&self, entity: Entity) -> EcsResult<EntityLocation> {
        self.index.get(entity)
    }

    /// Returns `true` if `entity` is live.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.index.contains(entity)
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.index.len()
    }

    /// Attach `value` to `entity`, migrating it to the table for its grown
    /// signature.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> EcsResult<()> {
        let location = self.index.get(entity)?;
        if self.archetypes[location.archetype].has_component(T::component_type_id()) {
            return Err(EcsError::DuplicateComponent {
                component: T::type_name(),
            });
        }
        self.registry.register(T::meta());

        let target = self.archetypes.insert_target::<T>(location.archetype);
        self.archetypes[target].check_column::<T>()?;
        let (src, dst) = self.archetypes.pair_mut(location.archetype, target);
        let moved = src.move_row(location.row, dst)?;
        dst.push_component(value)?;

        self.relocate(entity, location, target, &moved)
    }

    /// Detach the `T` component from `entity` and return it, migrating the
    /// entity to the table for its shrunk signature.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> EcsResult<T> {
        let location = self.index.get(entity)?;
        if !self.archetypes[location.archetype].has_component(T::component_type_id()) {
            return Err(EcsError::ComponentNotFound {
                component: T::type_name(),
            });
        }

        let target = self.archetypes.remove_target::<T>(location.archetype);
        let (src, dst) = self.archetypes.pair_mut(location.archetype, target);
        let moved = src.move_row(location.row, dst)?;
        self.relocate(entity, location, target, &moved)?;

        moved
            .leftovers
            .into_iter()
            .find_map(|column| column.into_any().downcast::<Column<T>>().ok())
            .and_then(|column| column.into_values().pop())
            .ok_or(EcsError::ComponentNotFound {
                component: T::type_name(),
            })
    }

    fn relocate(
        &mut self,
        entity: Entity,
        from: EntityLocation,
        to: ArchetypeId,
        moved: &MovedRow,
    ) -> EcsResult<()> {
        self.index.insert(
            entity,
            EntityLocation {
                archetype: to,
                row: moved.dst_row,
            },
        );
        if let Some(swapped) = moved.swapped {
            self.index.set_row(swapped, from.row)?;
        }
        trace!(%entity, from = from.archetype.0, to = to.0, "migrated entity");
        Ok(())
    }

    /// Returns `true` if `entity` is live and has a `T` component.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.index.get(entity).is_ok_and(|location| {
            self.archetypes[location.archetype].has_component(T::component_type_id())
        })
    }

    /// Shared borrow of the `T` component of `entity`.
    pub fn get<T: Component>(&self, entity: Entity) -> EcsResult<Ref<'_, T>> {
        let location = self.index.get(entity)?;
        let column = self.archetypes[location.archetype].borrow_column::<T>()?;
        Ok(Ref::map(column, |values| &values[location.row]))
    }

    /// Mutable access to the `T` component of `entity`.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> EcsResult<&mut T> {
        let location = self.index.get(entity)?;
        let column = self.archetypes[location.archetype].column_mut::<T>()?;
        Ok(&mut column[location.row])
    }

    /// The signature of the table holding `entity`.
    pub fn signature_of(&self, entity: Entity) -> EcsResult<&Signature> {
        let location = self.index.get(entity)?;
        Ok(self.archetypes[location.archetype].signature())
    }

    /// Every archetype table, in creation order.
    #[must_use]
    pub fn archetypes(&self) -> &ArchetypeGraph {
        &self.archetypes
    }

    /// Number of archetype tables created so far.
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Every component type this store has seen.
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// A query over every entity matching `Q`.
    pub fn query<Q: WorldQuery>(&self) -> EcsResult<Query<'_, Q>> {
        Query::new(self)
    }

    /// A query over every entity matching `Q` and the filter `F`.
    pub fn query_filtered<Q: WorldQuery, F: QueryFilter>(&self) -> EcsResult<Query<'_, Q, F>> {
        Query::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position(i32, i32);
    impl Component for Position {}

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity(i32, i32);
    impl Component for Velocity {}

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    /// Every live entity's location must point back at itself.
    fn assert_index_consistent(storage: &Storage, entities: &[Entity]) {
        for &entity in entities {
            let location = storage.locate(entity).unwrap();
            let table = &storage.archetypes()[location.archetype];
            assert_eq!(table.entities()[location.row], entity);
            assert_eq!(table.signature(), storage.signature_of(entity).unwrap());
        }
    }

    #[test]
    fn test_spawn_and_locate() {
        let mut storage = Storage::new();
        let e = storage.spawn((Position(1, 2), Velocity(3, 4))).unwrap();
        let location = storage.locate(e).unwrap();
        assert_eq!(location.row, 0);
        assert_eq!(storage.entity_count(), 1);
        assert_eq!(*storage.get::<Position>(e).unwrap(), Position(1, 2));
        assert!(storage.has::<Velocity>(e));
        assert!(!storage.has::<Health>(e));
        assert_eq!(storage.registry().len(), 2);
    }

    #[test]
    fn test_same_signature_shares_table() {
        let mut storage = Storage::new();
        let a = storage.spawn((Position(0, 0), Velocity(0, 0))).unwrap();
        let b = storage.spawn((Velocity(0, 0), Position(0, 0))).unwrap();
        assert_eq!(
            storage.locate(a).unwrap().archetype,
            storage.locate(b).unwrap().archetype
        );
        assert_eq!(storage.archetype_count(), 1);
    }

    #[test]
    fn test_spawn_duplicate_component() {
        let mut storage = Storage::new();
        let err = storage.spawn((Health(1), Health(2))).unwrap_err();
        assert!(matches!(err, EcsError::DuplicateComponent { .. }));
        assert_eq!(storage.entity_count(), 0);
        assert_eq!(storage.archetype_count(), 0);
    }

    #[test]
    fn test_despawn_fixes_swapped_entity() {
        let mut storage = Storage::new();
        let entities: Vec<_> = (0..3)
            .map(|i| storage.spawn((Health(i),)).unwrap())
            .collect();

        storage.despawn(entities[0]).unwrap();

        assert!(!storage.contains(entities[0]));
        assert_eq!(storage.locate(entities[2]).unwrap().row, 0);
        assert_eq!(*storage.get::<Health>(entities[2]).unwrap(), Health(2));
        assert_index_consistent(&storage, &entities[1..]);
        assert_eq!(
            storage.despawn(entities[0]),
            Err(EcsError::EntityNotFound(entities[0]))
        );
    }

    #[test]
    fn test_locate_unknown_entity() {
        let storage = Storage::new();
        assert_eq!(
            storage.locate(Entity(99)),
            Err(EcsError::EntityNotFound(Entity(99)))
        );
    }

    #[test]
    fn test_add_component_migrates() {
        let mut storage = Storage::new();
        let a = storage.spawn((Position(1, 1),)).unwrap();
        let b = storage.spawn((Position(2, 2),)).unwrap();

        storage.add_component(a, Velocity(5, 5)).unwrap();

        assert!(storage.has::<Velocity>(a));
        assert_eq!(*storage.get::<Position>(a).unwrap(), Position(1, 1));
        assert_eq!(storage.locate(b).unwrap().row, 0);
        assert_index_consistent(&storage, &[a, b]);
        assert_eq!(
            storage.add_component(a, Velocity(0, 0)),
            Err(EcsError::DuplicateComponent {
                component: Velocity::type_name()
            })
        );
    }

    #[test]
    fn test_migration_round_trip() {
        let mut storage = Storage::new();
        let e = storage.spawn((Position(7, 8), Health(3))).unwrap();
        let other = storage.spawn((Position(0, 0), Health(0))).unwrap();
        let original = storage.signature_of(e).unwrap().clone();
        let original_table = storage.locate(e).unwrap().archetype;

        storage.add_component(e, Velocity(1, 1)).unwrap();
        let removed = storage.remove_component::<Velocity>(e).unwrap();

        assert_eq!(removed, Velocity(1, 1));
        assert_eq!(storage.signature_of(e).unwrap(), &original);
        assert_eq!(storage.locate(e).unwrap().archetype, original_table);
        assert_eq!(*storage.get::<Position>(e).unwrap(), Position(7, 8));
        assert_eq!(*storage.get::<Health>(e).unwrap(), Health(3));
        assert_index_consistent(&storage, &[e, other]);
        assert_eq!(storage.archetype_count(), 2);
    }

    #[test]
    fn test_remove_missing_component() {
        let mut storage = Storage::new();
        let e = storage.spawn((Position(0, 0),)).unwrap();
        assert_eq!(
            storage.remove_component::<Health>(e),
            Err(EcsError::ComponentNotFound {
                component: Health::type_name()
            })
        );
    }

    #[test]
    fn test_remove_last_component_keeps_entity() {
        let mut storage = Storage::new();
        let e = storage.spawn((Health(9),)).unwrap();
        assert_eq!(storage.remove_component::<Health>(e).unwrap(), Health(9));
        assert!(storage.contains(e));
        assert!(storage.signature_of(e).unwrap().is_empty());
    }

    #[test]
    fn test_get_mut_writes_in_place() {
        let mut storage = Storage::new();
        let e = storage.spawn((Health(1),)).unwrap();
        storage.get_mut::<Health>(e).unwrap().0 = 10;
        assert_eq!(*storage.get::<Health>(e).unwrap(), Health(10));
    }

    #[test]
    fn test_reserve_and_spawn_at() {
        let mut storage = Storage::new();
        let reserved = storage.reserve_entity();
        assert!(!storage.contains(reserved));

        storage.spawn_at(reserved, (Health(4),)).unwrap();
        assert_eq!(*storage.get::<Health>(reserved).unwrap(), Health(4));
        assert_eq!(
            storage.spawn_at(reserved, (Health(5),)),
            Err(EcsError::EntityExists(reserved))
        );
        assert_eq!(
            storage.spawn_at(Entity(1000), ()),
            Err(EcsError::EntityNotFound(Entity(1000)))
        );
        assert_eq!(storage.reserved_count(), 0);
    }

    #[test]
    fn test_despawned_id_cannot_be_respawned() {
        let mut storage = Storage::new();
        let e = storage.spawn((Position(1, 1),)).unwrap();
        storage.despawn(e).unwrap();

        assert_eq!(
            storage.spawn_at(e, (Position(9, 9),)),
            Err(EcsError::EntityNotFound(e))
        );
        assert!(!storage.contains(e));

        let reserved = storage.reserve_entity();
        storage.spawn_at(reserved, (Position(2, 2),)).unwrap();
        storage.despawn(reserved).unwrap();
        assert_eq!(
            storage.spawn_at(reserved, (Position(3, 3),)),
            Err(EcsError::EntityNotFound(reserved))
        );
    }

    mod first {
        #[derive(Debug)]
        pub struct Pinned(pub u32);
        impl crate::Component for Pinned {
            fn type_name() -> &'static str {
                "Pinned"
            }
        }
    }

    mod second {
        #[derive(Debug)]
        pub struct Pinned(pub u32);
        impl crate::Component for Pinned {
            fn type_name() -> &'static str {
                "Pinned"
            }
        }
    }

    #[test]
    fn test_name_collision_leaves_table_aligned() {
        let mut storage = Storage::new();
        let kept = storage.spawn((Health(1), first::Pinned(1))).unwrap();

        let err = storage.spawn((Health(2), second::Pinned(2))).unwrap_err();
        assert_eq!(err, EcsError::ComponentNotFound { component: "Pinned" });

        let table = &storage.archetypes()[storage.locate(kept).unwrap().archetype];
        assert_eq!(table.len(), 1);
        assert_eq!(table.borrow_column::<Health>().unwrap().len(), 1);
        assert_eq!(table.borrow_column::<first::Pinned>().unwrap().len(), 1);

        let other = storage.spawn((Health(3),)).unwrap();
        assert_eq!(
            storage.add_component(other, second::Pinned(3)),
            Err(EcsError::ComponentNotFound { component: "Pinned" })
        );
        assert_eq!(table_len_of(&storage, other), 1);
        assert_eq!(*storage.get::<Health>(other).unwrap(), Health(3));
        assert_index_consistent(&storage, &[kept, other]);
    }

    fn table_len_of(storage: &Storage, entity: Entity) -> usize {
        storage.archetypes()[storage.locate(entity).unwrap().archetype].len()
    }
}
