//! Archetype tables.
//!
//! An archetype is a unique combination of component types. Entities sharing
//! the same set of components are grouped into the same table for
//! cache-friendly iteration.

use std::cell::{Ref, RefMut};
use std::collections::HashMap;

use crate::bundle::Bundle;
use crate::column::{Column, ErasedColumn};
use crate::component::{Component, ComponentMeta, ComponentTypeId};
use crate::entity::Entity;
use crate::error::{EcsError, EcsResult};
use crate::signature::Signature;

/// Identifier of an archetype table: its creation index within a store.
///
/// Tables are never deleted, so ids stay valid for the life of the store and
/// ascending ids give creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchetypeId(pub u32);

impl ArchetypeId {
    /// Position of the table in the store's table list.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Archetype({})", self.0)
    }
}

/// Cached transitions to neighbouring tables, keyed by the component type
/// that is added or removed.
#[derive(Debug, Default)]
pub(crate) struct Edges {
    pub(crate) add: HashMap<ComponentTypeId, ArchetypeId>,
    pub(crate) remove: HashMap<ComponentTypeId, ArchetypeId>,
}

/// Result of moving one row out of a table.
#[derive(Debug)]
pub struct MovedRow {
    /// Row the entity now occupies in the destination table.
    pub dst_row: usize,
    /// Entity that was swapped into the vacated source row, if any.
    pub swapped: Option<Entity>,
    /// Values from source columns the destination does not have, one
    /// single-row column each.
    pub leftovers: Vec<Box<dyn ErasedColumn>>,
}

/// A table of entities sharing the same signature.
///
/// Data is stored in struct-of-arrays layout: one column per component type,
/// sorted by type id, with entity IDs stored in a parallel vector. Row `i` of
/// every column belongs to `entities[i]`.
#[derive(Debug)]
pub struct ArchetypeTable {
    id: ArchetypeId,
    signature: Signature,
    entities: Vec<Entity>,
    components: Vec<ComponentMeta>,
    columns: Vec<Box<dyn ErasedColumn>>,
    pub(crate) edges: Edges,
}

impl ArchetypeTable {
    /// Create an empty table over `columns`, which may arrive in any order.
    #[must_use]
    pub fn new(id: ArchetypeId, mut columns: Vec<Box<dyn ErasedColumn>>) -> Self {
        columns.sort_by_key(|column| column.component().type_id);
        let components: Vec<ComponentMeta> =
            columns.iter().map(|column| column.component()).collect();
        let signature = components.iter().map(|meta| meta.type_id).collect();
        Self {
            id,
            signature,
            entities: Vec::new(),
            components,
            columns,
            edges: Edges::default(),
        }
    }

    /// Position of this table in the graph.
    #[must_use]
    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// The component set every row of this table holds.
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Component metadata in column order.
    #[must_use]
    pub fn components(&self) -> &[ComponentMeta] {
        &self.components
    }

    /// Entities in row order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Returns the number of entities in this table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if this table has no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns `true` if this table stores the given component type.
    #[must_use]
    pub fn has_component(&self, type_id: ComponentTypeId) -> bool {
        self.signature.contains(type_id)
    }

    /// Returns the column index for the given component type, if present.
    #[must_use]
    pub fn column_index(&self, type_id: ComponentTypeId) -> Option<usize> {
        self.components
            .binary_search_by_key(&type_id, |meta| meta.type_id)
            .ok()
    }

    fn column<T: Component>(&self) -> EcsResult<&Column<T>> {
        self.column_index(T::component_type_id())
            .and_then(|index| self.columns[index].as_any().downcast_ref::<Column<T>>())
            .ok_or(EcsError::ComponentNotFound {
                component: T::type_name(),
            })
    }

    fn column_typed_mut<T: Component>(&mut self) -> EcsResult<&mut Column<T>> {
        let missing = EcsError::ComponentNotFound {
            component: T::type_name(),
        };
        let index = self.column_index(T::component_type_id()).ok_or(missing.clone())?;
        self.columns[index]
            .as_any_mut()
            .downcast_mut::<Column<T>>()
            .ok_or(missing)
    }

    /// Shared borrow of the `T` column.
    pub fn borrow_column<T: Component>(&self) -> EcsResult<Ref<'_, Vec<T>>> {
        self.column::<T>()?.borrow()
    }

    /// Exclusive borrow of the `T` column through a shared table reference.
    pub fn borrow_column_mut<T: Component>(&self) -> EcsResult<RefMut<'_, Vec<T>>> {
        self.column::<T>()?.borrow_mut()
    }

    /// Direct mutable access to the `T` column.
    pub fn column_mut<T: Component>(&mut self) -> EcsResult<&mut [T]> {
        Ok(self.column_typed_mut::<T>()?.as_mut_slice())
    }

    /// Append one row holding `bundle` for `entity` and return its index.
    ///
    /// The bundle must carry exactly this table's component types.
    pub fn insert_row<B: Bundle>(&mut self, entity: Entity, bundle: B) -> EcsResult<usize> {
        let mut metas = Vec::new();
        B::component_metas(&mut metas);
        let signature = Signature::from_metas(&metas)?;
        if signature != self.signature {
            let missing = metas
                .iter()
                .find(|meta| !self.signature.contains(meta.type_id))
                .or_else(|| {
                    self.components
                        .iter()
                        .find(|meta| !signature.contains(meta.type_id))
                })
                .map_or("?", |meta| meta.name);
            return Err(EcsError::ComponentNotFound { component: missing });
        }

        B::check_columns(self)?;
        let row = self.entities.len();
        bundle.push_into(self)?;
        self.entities.push(entity);
        Ok(row)
    }

    /// Fails unless this table stores `T` in a `Column<T>`. Two Rust types
    /// pinned to the same component name share an id but not a column type.
    pub(crate) fn check_column<T: Component>(&self) -> EcsResult<()> {
        self.column::<T>().map(|_| ())
    }

    /// Append a single value to the `T` column. Callers keep rows aligned.
    pub(crate) fn push_component<T: Component>(&mut self, value: T) -> EcsResult<()> {
        self.column_typed_mut::<T>()?.push(value);
        Ok(())
    }

    /// Swap-remove `row` from every column and the entity list.
    ///
    /// Returns the entity that now occupies `row`, or `None` if the removed
    /// row was the last one.
    pub fn remove_row(&mut self, row: usize) -> Option<Entity> {
        for column in &mut self.columns {
            column.swap_remove(row);
        }
        self.entities.swap_remove(row);
        self.entities.get(row).copied()
    }

    /// Move `row` into `dst`, carrying every column both tables share.
    ///
    /// Columns `dst` lacks end up in [`MovedRow::leftovers`]. Columns only
    /// `dst` has are left one value short; the caller pushes the new value.
    pub fn move_row(&mut self, row: usize, dst: &mut ArchetypeTable) -> EcsResult<MovedRow> {
        let mut leftovers = Vec::new();
        for column in &mut self.columns {
            let type_id = column.component().type_id;
            match dst.column_index(type_id) {
                Some(index) => column.move_row(row, dst.columns[index].as_mut())?,
                None => {
                    let mut scratch = column.empty_clone();
                    column.move_row(row, scratch.as_mut())?;
                    leftovers.push(scratch);
                }
            }
        }

        let entity = self.entities.swap_remove(row);
        let dst_row = dst.entities.len();
        dst.entities.push(entity);

        Ok(MovedRow {
            dst_row,
            swapped: self.entities.get(row).copied(),
            leftovers,
        })
    }

    /// Fresh empty columns matching this table's layout.
    #[must_use]
    pub fn empty_columns(&self) -> Vec<Box<dyn ErasedColumn>> {
        self.columns.iter().map(|column| column.empty_clone()).collect()
    }
}
