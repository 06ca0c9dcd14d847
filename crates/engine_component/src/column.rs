//! Typed component columns behind a type-erased interface.
//!
//! An archetype table owns one column per component type. The table only
//! sees [`ErasedColumn`]; typed access goes through a downcast to
//! [`Column<T>`].

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};

use crate::component::{Component, ComponentMeta};
use crate::error::{EcsError, EcsResult};

/// Operations an archetype table needs from a column without knowing its
/// element type.
pub trait ErasedColumn: Any + Send {
    /// The component type stored in this column.
    fn component(&self) -> ComponentMeta;

    /// Number of stored values. Takes `&mut self` so it never races an
    /// outstanding borrow.
    fn len(&mut self) -> usize;

    fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    /// Drop the value at `row`, moving the last value into its place.
    fn swap_remove(&mut self, row: usize);

    /// Swap-remove the value at `row` and append it to `dst`.
    ///
    /// Fails with [`EcsError::ComponentNotFound`] if `dst` stores a
    /// different type; `self` is left untouched in that case.
    fn move_row(&mut self, row: usize, dst: &mut dyn ErasedColumn) -> EcsResult<()>;

    /// A new, empty column of the same type.
    fn empty_clone(&self) -> Box<dyn ErasedColumn>;

    /// Upcast for downcasting to [`Column<T>`].
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Owned upcast, used when a column is unwrapped into its values.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl std::fmt::Debug for dyn ErasedColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErasedColumn")
            .field("component", &self.component().name)
            .finish_non_exhaustive()
    }
}

/// Contiguous storage for one component type.
///
/// Values sit behind a [`RefCell`] so a shared query can still hand out
/// `&mut T`; overlapping borrows fail with [`EcsError::ConflictingAccess`].
#[derive(Debug)]
pub struct Column<T: Component> {
    data: RefCell<Vec<T>>,
}

impl<T: Component> Column<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: RefCell::new(Vec::new()),
        }
    }

    /// Append a value.
    pub fn push(&mut self, value: T) {
        self.data.get_mut().push(value);
    }

    /// Shared borrow of every value in the column.
    pub fn borrow(&self) -> EcsResult<Ref<'_, Vec<T>>> {
        self.data.try_borrow().map_err(|_| conflict::<T>())
    }

    /// Exclusive borrow of every value in the column.
    pub fn borrow_mut(&self) -> EcsResult<RefMut<'_, Vec<T>>> {
        self.data.try_borrow_mut().map_err(|_| conflict::<T>())
    }

    /// Direct access when the caller already holds `&mut self`.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.data.get_mut().as_mut_slice()
    }

    /// Consume the column, returning its values in row order.
    #[must_use]
    pub fn into_values(self) -> Vec<T> {
        self.data.into_inner()
    }
}

impl<T: Component> Default for Column<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn conflict<T: Component>() -> EcsError {
    EcsError::ConflictingAccess {
        component: T::type_name(),
    }
}

impl<T: Component> ErasedColumn for Column<T> {
    fn component(&self) -> ComponentMeta {
        T::meta()
    }

    fn len(&mut self) -> usize {
        self.data.get_mut().len()
    }

    fn swap_remove(&mut self, row: usize) {
        self.data.get_mut().swap_remove(row);
    }

    fn move_row(&mut self, row: usize, dst: &mut dyn ErasedColumn) -> EcsResult<()> {
        let dst = dst
            .as_any_mut()
            .downcast_mut::<Column<T>>()
            .ok_or(EcsError::ComponentNotFound {
                component: T::type_name(),
            })?;
        let value = self.data.get_mut().swap_remove(row);
        dst.push(value);
        Ok(())
    }

    fn empty_clone(&self) -> Box<dyn ErasedColumn> {
        Box::new(Column::<T>::new())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
