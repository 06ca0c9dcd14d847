//! Runtime error types.

use engine_component::EcsError;

use crate::scheduler::SchedulerState;

/// Errors raised while running systems, resolving their parameters or
/// applying deferred commands.
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// A storage operation failed.
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// A system asked for a resource that was never inserted.
    #[error("resource `{resource}` is not present")]
    ResourceAbsent {
        /// Type name of the missing resource.
        resource: &'static str,
    },

    /// A resource is already borrowed in a way that conflicts with the
    /// requested access.
    #[error("resource `{resource}` is already borrowed")]
    ResourceBorrowed {
        /// Type name of the contested resource.
        resource: &'static str,
    },

    /// Two parameters of one system alias the same data mutably.
    #[error("system `{system}` has conflicting parameters: {reason}")]
    ConflictingParams {
        /// Name of the rejected system.
        system: String,
        /// Which data the parameters fight over.
        reason: String,
    },

    /// A scheduler phase was invoked out of order.
    #[error("cannot {action} while the scheduler is {state:?}")]
    InvalidState {
        /// The attempted phase.
        action: &'static str,
        /// The state the scheduler was in.
        state: SchedulerState,
    },

    /// Application-level failure raised inside a system body.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias for system results.
pub type SystemResult<T = ()> = Result<T, SystemError>;
