//! Query descriptors: declarative data access requirements.
//!
//! A [`QueryDescriptor`] records which component types a query reads and
//! writes and which ones it requires or excludes without accessing them.
//! The store uses it to match archetypes; the scheduler uses it to reject
//! systems whose parameters alias the same data mutably.

use crate::component::{ComponentMeta, ComponentTypeId};
use crate::error::{EcsError, EcsResult};
use crate::signature::Signature;

/// Describes the data access requirements of a query.
///
/// An archetype matches when its signature contains every type in
/// `reads ∪ writes ∪ with` and none of the types in `without`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryDescriptor {
    /// Component types read immutably.
    pub reads: Vec<ComponentMeta>,
    /// Component types accessed mutably.
    pub writes: Vec<ComponentMeta>,
    /// Component types that must be present but are not accessed.
    pub with: Vec<ComponentMeta>,
    /// Component types that must be absent.
    pub without: Vec<ComponentMeta>,
}

fn mentions(list: &[ComponentMeta], type_id: ComponentTypeId) -> bool {
    list.iter().any(|meta| meta.type_id == type_id)
}

impl QueryDescriptor {
    /// Create a new empty query descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a read-only component requirement.
    #[must_use]
    pub fn read(mut self, meta: ComponentMeta) -> Self {
        self.reads.push(meta);
        self
    }

    /// Add a mutable component requirement.
    #[must_use]
    pub fn write(mut self, meta: ComponentMeta) -> Self {
        self.writes.push(meta);
        self
    }

    /// Require a component without accessing it.
    #[must_use]
    pub fn with(mut self, meta: ComponentMeta) -> Self {
        self.with.push(meta);
        self
    }

    /// Exclude archetypes containing a component.
    #[must_use]
    pub fn without(mut self, meta: ComponentMeta) -> Self {
        self.without.push(meta);
        self
    }

    /// Returns the set of required component types (reads + writes + with).
    #[must_use]
    pub fn required_types(&self) -> Vec<ComponentTypeId> {
        self.reads
            .iter()
            .chain(&self.writes)
            .chain(&self.with)
            .map(|meta| meta.type_id)
            .collect()
    }

    /// Returns `true` if an archetype with `signature` satisfies this query.
    #[must_use]
    pub fn matches(&self, signature: &Signature) -> bool {
        signature.is_superset_of(&self.required_types())
            && signature.is_disjoint_from(self.without.iter().map(|meta| &meta.type_id))
    }

    /// Checks whether this query conflicts with another.
    ///
    /// Two queries conflict when one writes a component type that the other
    /// reads or writes:
    ///
    /// ```text
    /// A.writes ∩ (B.reads ∪ B.writes) ≠ ∅  OR
    /// B.writes ∩ (A.reads ∪ A.writes) ≠ ∅
    /// ```
    #[must_use]
    pub fn conflicts_with(&self, other: &QueryDescriptor) -> bool {
        self.first_conflict(other).is_some()
    }

    /// The first component type on which this query and `other` conflict.
    #[must_use]
    pub fn first_conflict(&self, other: &QueryDescriptor) -> Option<ComponentMeta> {
        // Check if any of our writes overlap with their reads or writes.
        for w in &self.writes {
            if mentions(&other.reads, w.type_id) || mentions(&other.writes, w.type_id) {
                return Some(*w);
            }
        }
        // Check if any of their writes overlap with our reads or writes.
        for w in &other.writes {
            if mentions(&self.reads, w.type_id) || mentions(&self.writes, w.type_id) {
                return Some(*w);
            }
        }
        None
    }

    /// Returns `true` if no archetype can satisfy both queries, because one
    /// requires a component the other excludes.
    #[must_use]
    pub fn excludes(&self, other: &QueryDescriptor) -> bool {
        let cut = |a: &QueryDescriptor, b: &QueryDescriptor| {
            a.required_types()
                .into_iter()
                .any(|type_id| mentions(&b.without, type_id))
        };
        cut(self, other) || cut(other, self)
    }

    /// Rejects a query that accesses one component mutably more than once,
    /// or both mutably and immutably.
    pub fn validate(&self) -> EcsResult<()> {
        for (i, w) in self.writes.iter().enumerate() {
            if mentions(&self.reads, w.type_id) || mentions(&self.writes[i + 1..], w.type_id) {
                return Err(EcsError::ConflictingAccess { component: w.name });
            }
        }
        Ok(())
    }
}
