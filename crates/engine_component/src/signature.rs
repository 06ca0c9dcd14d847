//! Archetype signatures.
//!
//! A [`Signature`] is the ordered set of component types an entity carries.
//! Two entities with equal signatures always live in the same archetype
//! table.

use std::collections::BTreeSet;

use crate::component::{ComponentMeta, ComponentTypeId};
use crate::error::{EcsError, EcsResult};

/// An ordered set of [`ComponentTypeId`]s.
///
/// Ordering follows the type id, so the same set of types always produces the
/// same signature regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Signature(BTreeSet<ComponentTypeId>);

impl Signature {
    /// The empty signature.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a signature from component metadata, rejecting repeated types.
    pub fn from_metas(metas: &[ComponentMeta]) -> EcsResult<Self> {
        let mut set = BTreeSet::new();
        for meta in metas {
            if !set.insert(meta.type_id) {
                return Err(EcsError::DuplicateComponent {
                    component: meta.name,
                });
            }
        }
        Ok(Self(set))
    }

    /// A copy of this signature with `type_id` added.
    #[must_use]
    pub fn with(&self, type_id: ComponentTypeId) -> Self {
        let mut set = self.0.clone();
        set.insert(type_id);
        Self(set)
    }

    /// A copy of this signature with `type_id` removed.
    #[must_use]
    pub fn without(&self, type_id: ComponentTypeId) -> Self {
        let mut set = self.0.clone();
        set.remove(&type_id);
        Self(set)
    }

    /// Whether `type_id` is a member.
    #[must_use]
    pub fn contains(&self, type_id: ComponentTypeId) -> bool {
        self.0.contains(&type_id)
    }

    /// Returns `true` if every id in `types` is part of this signature.
    #[must_use]
    pub fn is_superset_of<'a>(&self, types: impl IntoIterator<Item = &'a ComponentTypeId>) -> bool {
        types.into_iter().all(|ty| self.0.contains(ty))
    }

    /// Returns `true` if no id in `types` is part of this signature.
    #[must_use]
    pub fn is_disjoint_from<'a>(
        &self,
        types: impl IntoIterator<Item = &'a ComponentTypeId>,
    ) -> bool {
        !types.into_iter().any(|ty| self.0.contains(ty))
    }

    /// Iterate the ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.0.iter().copied()
    }

    /// Number of component types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for the empty set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ComponentTypeId> for Signature {
    fn from_iter<I: IntoIterator<Item = ComponentTypeId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: u64, name: &'static str) -> ComponentMeta {
        ComponentMeta {
            type_id: ComponentTypeId(id),
            name,
        }
    }

    #[test]
    fn test_signature_order_independent() {
        let a = Signature::from_metas(&[meta(1, "A"), meta(2, "B")]).unwrap();
        let b = Signature::from_metas(&[meta(2, "B"), meta(1, "A")]).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.iter().collect::<Vec<_>>(),
            vec![ComponentTypeId(1), ComponentTypeId(2)]
        );
    }

    #[test]
    fn test_signature_rejects_duplicates() {
        let err = Signature::from_metas(&[meta(1, "A"), meta(1, "A")]).unwrap_err();
        assert_eq!(err, EcsError::DuplicateComponent { component: "A" });
    }

    #[test]
    fn test_with_and_without() {
        let base = Signature::from_metas(&[meta(1, "A")]).unwrap();
        let grown = base.with(ComponentTypeId(2));
        assert_eq!(grown.len(), 2);
        assert!(grown.contains(ComponentTypeId(2)));
        assert_eq!(grown.without(ComponentTypeId(2)), base);
        assert!(base.without(ComponentTypeId(1)).is_empty());
    }

    #[test]
    fn test_superset_and_disjoint() {
        let sig: Signature = [ComponentTypeId(1), ComponentTypeId(2)].into_iter().collect();
        assert!(sig.is_superset_of(&[ComponentTypeId(1)]));
        assert!(!sig.is_superset_of(&[ComponentTypeId(1), ComponentTypeId(3)]));
        assert!(sig.is_disjoint_from(&[ComponentTypeId(3)]));
        assert!(!sig.is_disjoint_from(&[ComponentTypeId(2)]));
        assert!(sig.is_superset_of(&Vec::<ComponentTypeId>::new()));
    }
}
