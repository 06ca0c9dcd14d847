//! Type-keyed singleton storage.
//!
//! A resource is any `Send + 'static` value that lives outside the entity
//! store, at most one per type. Systems reach resources through [`Res`] and
//! [`ResMut`] parameters.

use std::any::{Any, TypeId, type_name};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use crate::error::{SystemError, SystemResult};

struct ResourceSlot {
    name: &'static str,
    value: RefCell<Box<dyn Any + Send>>,
}

/// Resources of one world, keyed by type.
#[derive(Default)]
pub struct Resources {
    values: HashMap<TypeId, ResourceSlot>,
}

impl Resources {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, returning the previous value of the same type.
    pub fn insert<R: Any + Send>(&mut self, value: R) -> Option<R> {
        let previous = self.values.insert(
            TypeId::of::<R>(),
            ResourceSlot {
                name: type_name::<R>(),
                value: RefCell::new(Box::new(value)),
            },
        );
        previous.and_then(|slot| unbox(slot.value.into_inner()))
    }

    /// Take the `R` resource out of the store.
    pub fn remove<R: Any + Send>(&mut self) -> Option<R> {
        self.values
            .remove(&TypeId::of::<R>())
            .and_then(|slot| unbox(slot.value.into_inner()))
    }

    /// Whether a value of type `R` is stored.
    #[must_use]
    pub fn contains<R: Any + Send>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<R>())
    }

    /// Number of stored resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn slot<R: Any + Send>(&self) -> SystemResult<&ResourceSlot> {
        self.values
            .get(&TypeId::of::<R>())
            .ok_or(SystemError::ResourceAbsent {
                resource: type_name::<R>(),
            })
    }

    /// Shared borrow of the `R` resource.
    pub fn borrow<R: Any + Send>(&self) -> SystemResult<Ref<'_, R>> {
        let slot = self.slot::<R>()?;
        let guard = slot.value.try_borrow().map_err(|_| borrowed(slot))?;
        Ref::filter_map(guard, |value| (**value).downcast_ref::<R>()).map_err(|_| absent::<R>())
    }

    /// Exclusive borrow of the `R` resource through a shared reference.
    pub fn borrow_mut<R: Any + Send>(&self) -> SystemResult<RefMut<'_, R>> {
        let slot = self.slot::<R>()?;
        let guard = slot.value.try_borrow_mut().map_err(|_| borrowed(slot))?;
        RefMut::filter_map(guard, |value| (**value).downcast_mut::<R>())
            .map_err(|_| absent::<R>())
    }

    /// Direct mutable access when the caller owns the store exclusively.
    pub fn get_mut<R: Any + Send>(&mut self) -> Option<&mut R> {
        self.values
            .get_mut(&TypeId::of::<R>())
            .and_then(|slot| slot.value.get_mut().downcast_mut::<R>())
    }
}

fn unbox<R: Any>(value: Box<dyn Any + Send>) -> Option<R> {
    value.downcast::<R>().ok().map(|boxed| *boxed)
}

fn absent<R>() -> SystemError {
    SystemError::ResourceAbsent {
        resource: type_name::<R>(),
    }
}

fn borrowed(slot: &ResourceSlot) -> SystemError {
    SystemError::ResourceBorrowed {
        resource: slot.name,
    }
}

impl std::fmt::Debug for Resources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set()
            .entries(self.values.values().map(|slot| slot.name))
            .finish()
    }
}

/// Shared access to the `T` resource.
pub struct Res<'w, T: 'static>(Ref<'w, T>);

impl<'w, T: 'static> Res<'w, T> {
    pub(crate) fn new(inner: Ref<'w, T>) -> Self {
        Self(inner)
    }
}

impl<T: 'static> Deref for Res<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: std::fmt::Debug + 'static> std::fmt::Debug for Res<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Res").field(&*self.0).finish()
    }
}

/// Exclusive access to the `T` resource.
pub struct ResMut<'w, T: 'static>(RefMut<'w, T>);

impl<'w, T: 'static> ResMut<'w, T> {
    pub(crate) fn new(inner: RefMut<'w, T>) -> Self {
        Self(inner)
    }
}

impl<T: 'static> Deref for ResMut<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: 'static> DerefMut for ResMut<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: std::fmt::Debug + 'static> std::fmt::Debug for ResMut<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ResMut").field(&*self.0).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Gravity(f32);

    #[derive(Debug, PartialEq)]
    struct Score(u32);

    #[test]
    fn test_insert_replaces_and_returns_previous() {
        let mut resources = Resources::new();
        assert_eq!(resources.insert(Gravity(9.8)), None);
        assert_eq!(resources.insert(Gravity(1.6)), Some(Gravity(9.8)));
        assert_eq!(resources.len(), 1);
        assert_eq!(*resources.borrow::<Gravity>().unwrap(), Gravity(1.6));
    }

    #[test]
    fn test_remove_returns_value() {
        let mut resources = Resources::new();
        resources.insert(Score(3));
        assert_eq!(resources.remove::<Score>(), Some(Score(3)));
        assert!(!resources.contains::<Score>());
        assert_eq!(resources.remove::<Score>(), None);
    }

    #[test]
    fn test_missing_resource() {
        let resources = Resources::new();
        assert!(matches!(
            resources.borrow::<Score>(),
            Err(SystemError::ResourceAbsent { .. })
        ));
    }

    #[test]
    fn test_borrow_conflict() {
        let mut resources = Resources::new();
        resources.insert(Score(0));
        let mut writer = resources.borrow_mut::<Score>().unwrap();
        writer.0 += 1;
        assert!(matches!(
            resources.borrow::<Score>(),
            Err(SystemError::ResourceBorrowed { .. })
        ));
        drop(writer);
        assert_eq!(*resources.borrow::<Score>().unwrap(), Score(1));
    }

    #[test]
    fn test_get_mut() {
        let mut resources = Resources::new();
        resources.insert(Score(1));
        resources.get_mut::<Score>().unwrap().0 = 5;
        assert_eq!(resources.remove::<Score>(), Some(Score(5)));
        assert!(resources.get_mut::<Score>().is_none());
    }
}
