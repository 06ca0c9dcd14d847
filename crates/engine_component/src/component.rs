//! Core [`Component`] trait, type identity and the component registry.
//!
//! Every piece of data stored in the ECS must implement [`Component`]. The
//! trait requires `Send + Sync + 'static` so a world can be handed to another
//! thread between frames.
//!
//! ## Type Identity
//!
//! [`ComponentTypeId`] is derived from the component's **type name** using
//! the FNV-1a 64-bit hash algorithm. The id is stable for a given name and is
//! totally ordered, which lets a [`Signature`](crate::Signature) keep its
//! members sorted.

use std::collections::BTreeMap;

/// A unique identifier for a component type, derived from its name using the
/// FNV-1a 64-bit hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// FNV-1a over the bytes of `name`. Usable in `const` contexts.
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// The id of `T`, hashed from [`Component::type_name`].
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self::from_name(T::type_name())
    }
}

/// Identity of a component type: its id plus a human-readable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentMeta {
    pub type_id: ComponentTypeId,
    /// The human-readable name of the component (e.g. `"Position"`).
    pub name: &'static str,
}

impl ComponentMeta {
    /// Metadata for the component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        T::meta()
    }
}

/// Data that can live in an archetype column.
///
/// An empty impl is enough; the name defaults to the Rust type path.
/// Override [`Component::type_name`] to pin the id across renames.
///
/// ```rust
/// use engine_component::{Component, ComponentTypeId};
///
/// struct Mass(f32);
///
/// impl Component for Mass {
///     fn type_name() -> &'static str {
///         "Mass"
///     }
/// }
///
/// assert_eq!(Mass::component_type_id(), ComponentTypeId::from_name("Mass"));
/// ```
pub trait Component: Send + Sync + 'static {
    /// Name hashed into the type id.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }

    fn meta() -> ComponentMeta {
        ComponentMeta {
            type_id: Self::component_type_id(),
            name: Self::type_name(),
        }
    }
}

/// Every component type a store has seen, keyed by id.
///
/// Signatures only carry ids; the registry turns them back into names for
/// logs and diagnostics.
#[derive(Debug, Default, Clone)]
pub struct ComponentRegistry {
    components: BTreeMap<ComponentTypeId, ComponentMeta>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a component type. Registering the same type again is a no-op.
    pub fn register(&mut self, meta: ComponentMeta) -> ComponentTypeId {
        self.components.entry(meta.type_id).or_insert(meta);
        meta.type_id
    }

    /// Returns the metadata for a registered id.
    #[must_use]
    pub fn get(&self, type_id: ComponentTypeId) -> Option<&ComponentMeta> {
        self.components.get(&type_id)
    }

    /// Returns the name for a registered id.
    #[must_use]
    pub fn name(&self, type_id: ComponentTypeId) -> Option<&'static str> {
        self.components.get(&type_id).map(|meta| meta.name)
    }

    /// Returns the number of registered component types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if no component type has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Names of the components in `signature`, in signature order. Unknown
    /// ids render as `"?"`.
    #[must_use]
    pub fn describe(&self, signature: &crate::Signature) -> Vec<&'static str> {
        signature
            .iter()
            .map(|id| self.name(id).unwrap_or("?"))
            .collect()
    }
}
