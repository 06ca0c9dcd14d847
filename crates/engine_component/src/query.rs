//! Typed queries over archetype storage.
//!
//! A [`Query`] is built from a [`WorldQuery`] (what to fetch per entity) and
//! a [`QueryFilter`] (which archetypes qualify). Construction borrows the
//! matching column of every matching table up front, so iteration is a plain
//! walk over slices and items are direct references into storage.
//!
//! ```rust
//! use engine_component::{Component, Storage, Without};
//!
//! #[derive(Debug)]
//! struct Position(f32, f32);
//! impl Component for Position {}
//!
//! #[derive(Debug)]
//! struct Frozen;
//! impl Component for Frozen {}
//!
//! let mut storage = Storage::new();
//! storage.spawn((Position(0.0, 0.0),)).unwrap();
//! storage.spawn((Position(5.0, 5.0), Frozen)).unwrap();
//!
//! let mut query = storage.query_filtered::<&mut Position, Without<Frozen>>().unwrap();
//! for position in query.iter() {
//!     position.0 += 1.0;
//! }
//! assert_eq!(query.count(), 1);
//! ```

use std::cell::{Ref, RefMut};
use std::marker::PhantomData;

use crate::archetype::{ArchetypeId, ArchetypeTable};
use crate::component::Component;
use crate::descriptor::QueryDescriptor;
use crate::entity::Entity;
use crate::error::{EcsError, EcsResult};
use crate::storage::Storage;

/// Data fetched for each matching entity.
///
/// Implemented for `&T`, `&mut T`, [`Entity`] and tuples of up to eight of
/// those.
pub trait WorldQuery {
    /// What one entity yields.
    type Item<'q>;
    /// Borrows held on one table for the life of the query.
    type Guard<'w>;
    /// Row-order iterator over one table.
    type Iter<'q>: Iterator<Item = Self::Item<'q>>;

    /// Record this query's component access.
    fn describe(descriptor: QueryDescriptor) -> QueryDescriptor;

    /// Borrow the columns this query touches in `table`.
    fn borrow(table: &ArchetypeTable) -> EcsResult<Self::Guard<'_>>;

    fn iter<'q, 'w: 'q>(guard: &'q mut Self::Guard<'w>) -> Self::Iter<'q>;

    fn fetch<'q, 'w: 'q>(guard: &'q mut Self::Guard<'w>, row: usize) -> Option<Self::Item<'q>>;
}

impl<T: Component> WorldQuery for &T {
    type Item<'q> = &'q T;
    type Guard<'w> = Ref<'w, Vec<T>>;
    type Iter<'q> = std::slice::Iter<'q, T>;

    fn describe(descriptor: QueryDescriptor) -> QueryDescriptor {
        descriptor.read(T::meta())
    }

    fn borrow(table: &ArchetypeTable) -> EcsResult<Self::Guard<'_>> {
        table.borrow_column::<T>()
    }

    fn iter<'q, 'w: 'q>(guard: &'q mut Self::Guard<'w>) -> Self::Iter<'q> {
        guard.iter()
    }

    fn fetch<'q, 'w: 'q>(guard: &'q mut Self::Guard<'w>, row: usize) -> Option<Self::Item<'q>> {
        guard.get(row)
    }
}

impl<T: Component> WorldQuery for &mut T {
    type Item<'q> = &'q mut T;
    type Guard<'w> = RefMut<'w, Vec<T>>;
    type Iter<'q> = std::slice::IterMut<'q, T>;

    fn describe(descriptor: QueryDescriptor) -> QueryDescriptor {
        descriptor.write(T::meta())
    }

    fn borrow(table: &ArchetypeTable) -> EcsResult<Self::Guard<'_>> {
        table.borrow_column_mut::<T>()
    }

    fn iter<'q, 'w: 'q>(guard: &'q mut Self::Guard<'w>) -> Self::Iter<'q> {
        guard.iter_mut()
    }

    fn fetch<'q, 'w: 'q>(guard: &'q mut Self::Guard<'w>, row: usize) -> Option<Self::Item<'q>> {
        guard.get_mut(row)
    }
}

impl WorldQuery for Entity {
    type Item<'q> = Entity;
    type Guard<'w> = &'w [Entity];
    type Iter<'q> = std::iter::Copied<std::slice::Iter<'q, Entity>>;

    fn describe(descriptor: QueryDescriptor) -> QueryDescriptor {
        descriptor
    }

    fn borrow(table: &ArchetypeTable) -> EcsResult<Self::Guard<'_>> {
        Ok(table.entities())
    }

    fn iter<'q, 'w: 'q>(guard: &'q mut Self::Guard<'w>) -> Self::Iter<'q> {
        let entities: &'q [Entity] = guard;
        entities.iter().copied()
    }

    fn fetch<'q, 'w: 'q>(guard: &'q mut Self::Guard<'w>, row: usize) -> Option<Self::Item<'q>> {
        guard.get(row).copied()
    }
}

/// Zips per-element iterators of a tuple query.
#[derive(Debug)]
pub struct TupleIter<T>(T);

macro_rules! impl_world_query_tuple {
    ($($name:ident),+) => {
        #[allow(non_snake_case)]
        impl<$($name: Iterator),+> Iterator for TupleIter<($($name,)+)> {
            type Item = ($($name::Item,)+);

            fn next(&mut self) -> Option<Self::Item> {
                let ($($name,)+) = &mut self.0;
                Some(($($name.next()?,)+))
            }
        }

        #[allow(non_snake_case)]
        impl<$($name: WorldQuery),+> WorldQuery for ($($name,)+) {
            type Item<'q> = ($($name::Item<'q>,)+);
            type Guard<'w> = ($($name::Guard<'w>,)+);
            type Iter<'q> = TupleIter<($($name::Iter<'q>,)+)>;

            fn describe(descriptor: QueryDescriptor) -> QueryDescriptor {
                $(let descriptor = $name::describe(descriptor);)+
                descriptor
            }

            fn borrow(table: &ArchetypeTable) -> EcsResult<Self::Guard<'_>> {
                Ok(($($name::borrow(table)?,)+))
            }

            fn iter<'q, 'w: 'q>(guard: &'q mut Self::Guard<'w>) -> Self::Iter<'q> {
                let ($($name,)+) = guard;
                TupleIter(($($name::iter($name),)+))
            }

            fn fetch<'q, 'w: 'q>(
                guard: &'q mut Self::Guard<'w>,
                row: usize,
            ) -> Option<Self::Item<'q>> {
                let ($($name,)+) = guard;
                Some(($($name::fetch($name, row)?,)+))
            }
        }
    };
}

impl_world_query_tuple!(A);
impl_world_query_tuple!(A, B);
impl_world_query_tuple!(A, B, C);
impl_world_query_tuple!(A, B, C, D);
impl_world_query_tuple!(A, B, C, D, E);
impl_world_query_tuple!(A, B, C, D, E, F);
impl_world_query_tuple!(A, B, C, D, E, F, G);
impl_world_query_tuple!(A, B, C, D, E, F, G, H);

/// Narrows the set of archetypes a query visits without fetching data.
pub trait QueryFilter {
    fn describe(descriptor: QueryDescriptor) -> QueryDescriptor;
}

/// Only match entities that have `T`.
pub struct With<T>(PhantomData<fn() -> T>);

/// Only match entities that do NOT have `T`.
pub struct Without<T>(PhantomData<fn() -> T>);

impl<T: Component> QueryFilter for With<T> {
    fn describe(descriptor: QueryDescriptor) -> QueryDescriptor {
        descriptor.with(T::meta())
    }
}

impl<T: Component> QueryFilter for Without<T> {
    fn describe(descriptor: QueryDescriptor) -> QueryDescriptor {
        descriptor.without(T::meta())
    }
}

macro_rules! impl_query_filter_tuple {
    ($($name:ident),*) => {
        impl<$($name: QueryFilter),*> QueryFilter for ($($name,)*) {
            fn describe(descriptor: QueryDescriptor) -> QueryDescriptor {
                $(let descriptor = $name::describe(descriptor);)*
                descriptor
            }
        }
    };
}

impl_query_filter_tuple!();
impl_query_filter_tuple!(A);
impl_query_filter_tuple!(A, B);
impl_query_filter_tuple!(A, B, C);
impl_query_filter_tuple!(A, B, C, D);
impl_query_filter_tuple!(A, B, C, D, E);
impl_query_filter_tuple!(A, B, C, D, E, F);
impl_query_filter_tuple!(A, B, C, D, E, F, G);
impl_query_filter_tuple!(A, B, C, D, E, F, G, H);

/// A live view over every entity matching `Q` and `F`.
///
/// The view is resolved when it is built: tables created afterwards are not
/// visited. Column borrows are released when the query is dropped.
pub struct Query<'w, Q: WorldQuery, F: QueryFilter = ()> {
    storage: &'w Storage,
    descriptor: QueryDescriptor,
    archetypes: Vec<ArchetypeId>,
    guards: Vec<Q::Guard<'w>>,
    _filter: PhantomData<fn() -> F>,
}

impl<'w, Q: WorldQuery, F: QueryFilter> Query<'w, Q, F> {
    /// Describe `Q` filtered by `F` and borrow every matching table.
    ///
    /// Fails with [`EcsError::ConflictingAccess`] if the query aliases a
    /// component mutably or a column is already borrowed incompatibly.
    pub fn new(storage: &'w Storage) -> EcsResult<Self> {
        let descriptor = Self::describe();
        descriptor.validate()?;

        let mut archetypes = Vec::new();
        let mut guards = Vec::new();
        let matching = storage
            .archetypes()
            .iter()
            .filter(|table| descriptor.matches(table.signature()));
        for table in matching {
            guards.push(Q::borrow(table)?);
            archetypes.push(table.id());
        }

        Ok(Self {
            storage,
            descriptor,
            archetypes,
            guards,
            _filter: PhantomData,
        })
    }

    /// The access descriptor for `Q` filtered by `F`.
    #[must_use]
    pub fn describe() -> QueryDescriptor {
        F::describe(Q::describe(QueryDescriptor::new()))
    }

    /// Component access this query was built from.
    #[must_use]
    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    /// Matching tables, in creation order.
    #[must_use]
    pub fn archetypes(&self) -> &[ArchetypeId] {
        &self.archetypes
    }

    /// Iterate every matching entity, table by table in row order.
    pub fn iter(&mut self) -> QueryIter<'_, 'w, Q> {
        QueryIter {
            guards: self.guards.iter_mut(),
            current: None,
        }
    }

    /// Number of matching entities.
    #[must_use]
    pub fn count(&self) -> usize {
        self.archetypes
            .iter()
            .map(|&id| self.storage.archetypes()[id].len())
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Returns `true` if `entity` is live and matches this query.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.storage
            .locate(entity)
            .is_ok_and(|location| self.archetypes.contains(&location.archetype))
    }

    /// The item for a single entity.
    pub fn get(&mut self, entity: Entity) -> EcsResult<Q::Item<'_>> {
        let location = self.storage.locate(entity)?;
        let slot = self
            .archetypes
            .iter()
            .position(|&id| id == location.archetype)
            .ok_or(EcsError::QueryMismatch { entity })?;
        Q::fetch(&mut self.guards[slot], location.row).ok_or(EcsError::EntityNotFound(entity))
    }
}

impl<Q: WorldQuery, F: QueryFilter> std::fmt::Debug for Query<'_, Q, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("descriptor", &self.descriptor)
            .field("archetypes", &self.archetypes)
            .finish_non_exhaustive()
    }
}

impl<'q, 'w: 'q, Q: WorldQuery, F: QueryFilter> IntoIterator for &'q mut Query<'w, Q, F> {
    type Item = Q::Item<'q>;
    type IntoIter = QueryIter<'q, 'w, Q>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator returned by [`Query::iter`].
pub struct QueryIter<'q, 'w, Q: WorldQuery> {
    guards: std::slice::IterMut<'q, Q::Guard<'w>>,
    current: Option<Q::Iter<'q>>,
}

impl<'q, 'w: 'q, Q: WorldQuery> Iterator for QueryIter<'q, 'w, Q> {
    type Item = Q::Item<'q>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.current.as_mut().and_then(Iterator::next) {
                return Some(item);
            }
            let guard = self.guards.next()?;
            self.current = Some(Q::iter(guard));
        }
    }
}
