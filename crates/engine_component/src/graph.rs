//! The archetype graph: every table in a store plus cached add/remove edges.

use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use tracing::debug;

use crate::archetype::{ArchetypeId, ArchetypeTable};
use crate::column::{Column, ErasedColumn};
use crate::component::Component;
use crate::descriptor::QueryDescriptor;
use crate::signature::Signature;

/// Owns the archetype tables of a store.
///
/// Holds at most one table per distinct [`Signature`]. Tables are created
/// lazily on first use and never removed.
#[derive(Debug, Default)]
pub struct ArchetypeGraph {
    tables: Vec<ArchetypeTable>,
    by_signature: HashMap<Signature, ArchetypeId>,
}

impl ArchetypeGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The table with exactly `signature`, if one exists.
    #[must_use]
    pub fn find(&self, signature: &Signature) -> Option<ArchetypeId> {
        self.by_signature.get(signature).copied()
    }

    /// The table with `id`, if it exists.
    #[must_use]
    pub fn get(&self, id: ArchetypeId) -> Option<&ArchetypeTable> {
        self.tables.get(id.index())
    }

    /// Find the table for `signature`, creating it from `columns` if absent.
    pub fn get_or_insert_with(
        &mut self,
        signature: Signature,
        columns: impl FnOnce() -> Vec<Box<dyn ErasedColumn>>,
    ) -> ArchetypeId {
        if let Some(id) = self.find(&signature) {
            return id;
        }
        self.insert(signature, columns())
    }

    fn insert(&mut self, signature: Signature, columns: Vec<Box<dyn ErasedColumn>>) -> ArchetypeId {
        let id = ArchetypeId(self.tables.len() as u32);
        let table = ArchetypeTable::new(id, columns);
        debug_assert_eq!(table.signature(), &signature);

        let components: Vec<&str> = table.components().iter().map(|meta| meta.name).collect();
        debug!(archetype = id.0, ?components, "created archetype");

        self.tables.push(table);
        self.by_signature.insert(signature, id);
        id
    }

    /// The table reached from `from` by adding `T`. Edges are cached in both
    /// directions.
    pub fn insert_target<T: Component>(&mut self, from: ArchetypeId) -> ArchetypeId {
        let type_id = T::component_type_id();
        if let Some(&to) = self[from].edges.add.get(&type_id) {
            return to;
        }

        let signature = self[from].signature().with(type_id);
        let to = match self.find(&signature) {
            Some(to) => to,
            None => {
                let mut columns = self[from].empty_columns();
                columns.push(Box::new(Column::<T>::new()));
                self.insert(signature, columns)
            }
        };

        self[from].edges.add.insert(type_id, to);
        self[to].edges.remove.insert(type_id, from);
        to
    }

    /// The table reached from `from` by removing `T`. Edges are cached in
    /// both directions.
    pub fn remove_target<T: Component>(&mut self, from: ArchetypeId) -> ArchetypeId {
        let type_id = T::component_type_id();
        if let Some(&to) = self[from].edges.remove.get(&type_id) {
            return to;
        }

        let signature = self[from].signature().without(type_id);
        let to = match self.find(&signature) {
            Some(to) => to,
            None => {
                let columns = self[from]
                    .empty_columns()
                    .into_iter()
                    .filter(|column| column.component().type_id != type_id)
                    .collect();
                self.insert(signature, columns)
            }
        };

        self[from].edges.remove.insert(type_id, to);
        self[to].edges.add.insert(type_id, from);
        to
    }

    /// Mutable access to two distinct tables at once.
    ///
    /// # Panics
    ///
    /// Panics if `a == b`.
    pub fn pair_mut(
        &mut self,
        a: ArchetypeId,
        b: ArchetypeId,
    ) -> (&mut ArchetypeTable, &mut ArchetypeTable) {
        assert_ne!(a, b, "pair_mut needs two distinct archetypes");
        if a.index() < b.index() {
            let (low, high) = self.tables.split_at_mut(b.index());
            (&mut low[a.index()], &mut high[0])
        } else {
            let (low, high) = self.tables.split_at_mut(a.index());
            (&mut high[0], &mut low[b.index()])
        }
    }

    /// Tables in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &ArchetypeTable> {
        self.tables.iter()
    }

    /// Tables whose signature satisfies `descriptor`, in creation order.
    pub fn matching<'a, 'd>(
        &'a self,
        descriptor: &'d QueryDescriptor,
    ) -> impl Iterator<Item = &'a ArchetypeTable> + use<'a, 'd> {
        self.tables
            .iter()
            .filter(move |table| descriptor.matches(table.signature()))
    }

    /// Number of tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl Index<ArchetypeId> for ArchetypeGraph {
    type Output = ArchetypeTable;

    fn index(&self, id: ArchetypeId) -> &ArchetypeTable {
        &self.tables[id.index()]
    }
}

impl IndexMut<ArchetypeId> for ArchetypeGraph {
    fn index_mut(&mut self, id: ArchetypeId) -> &mut ArchetypeTable {
        &mut self.tables[id.index()]
    }
}
