//! Plugins: bundles of systems and resources installed into an [`App`].

use std::any::type_name;

use crate::app::App;
use crate::error::SystemResult;

/// A unit of application setup.
///
/// `build` runs once, before the scheduler starts. A plugin may add further
/// plugins; those are built after the current batch.
pub trait Plugin: Send + 'static {
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    fn build(&self, app: &mut App) -> SystemResult;
}

impl<F> Plugin for F
where
    F: Fn(&mut App) -> SystemResult + Send + 'static,
{
    fn build(&self, app: &mut App) -> SystemResult {
        self(app)
    }
}
