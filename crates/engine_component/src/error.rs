//! Storage-layer error types.

use crate::entity::Entity;

/// Errors raised by the entity index, archetype tables, migration and
/// queries.
///
/// All variants describe structural or programmer errors. None of them are
/// transient, so callers should surface them rather than retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// A spawn bundle carries the same component type twice, or
    /// `add_component` targets a type the entity already has.
    #[error("component `{component}` is already present")]
    DuplicateComponent {
        /// Name of the offending component type.
        component: &'static str,
    },

    /// A removal or column access targets a component type that is absent.
    #[error("component `{component}` not found")]
    ComponentNotFound {
        /// Name of the missing component type.
        component: &'static str,
    },

    /// The entity was never allocated or has already been despawned.
    #[error("{0} not found")]
    EntityNotFound(Entity),

    /// A reserved entity was materialised twice.
    #[error("{0} already exists")]
    EntityExists(Entity),

    /// A column is already borrowed in a way that conflicts with the
    /// requested access, or a query aliases one component mutably.
    #[error("conflicting access to component `{component}`")]
    ConflictingAccess {
        /// Name of the contested component type.
        component: &'static str,
    },

    /// The entity is live but its archetype does not match the query.
    #[error("{entity} does not match the query")]
    QueryMismatch {
        /// The entity that was looked up.
        entity: Entity,
    },
}

/// Convenience alias for storage results.
pub type EcsResult<T> = Result<T, EcsError>;
