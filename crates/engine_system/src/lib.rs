//! # engine_system
//!
//! Runtime for the archetype store in `engine_component`.
//!
//! A [`World`] owns the entity store together with everything systems share:
//! typed resources, the deferred command queue, running coroutines and the
//! running flag. A [`Scheduler`] drives systems through three phases:
//!
//! 1. **start**: lifecycle `start` hooks, then functional start systems.
//! 2. **update**: lifecycle `update` hooks, functional update systems, then
//!    one coroutine tick. Repeated while the running flag holds.
//! 3. **dispose**: lifecycle `dispose` hooks, then functional dispose systems.
//!
//! Functional systems are plain functions whose parameters are resolved
//! against the world on every invocation:
//!
//! ```rust
//! use engine_component::{Component, Query};
//! use engine_system::{App, Commands, Phase, ResMut, SystemResult};
//!
//! #[derive(Debug)]
//! struct Health(u32);
//! impl Component for Health {}
//!
//! #[derive(Debug, Default)]
//! struct Spawned(u32);
//!
//! fn spawn(mut commands: Commands, mut spawned: ResMut<Spawned>) -> SystemResult {
//!     commands.spawn((Health(10),))?;
//!     spawned.0 += 1;
//!     Ok(())
//! }
//!
//! fn decay(mut query: Query<&mut Health>) {
//!     for health in query.iter() {
//!         health.0 -= 1;
//!     }
//! }
//!
//! let mut app = App::default();
//! app.world_mut().insert_resource(Spawned::default());
//! app.add_function_system(Phase::Start, spawn).unwrap();
//! app.add_function_system(Phase::Update, decay).unwrap();
//! app.run_once().unwrap();
//!
//! let mut query = app.world().query::<&Health>().unwrap();
//! assert_eq!(query.iter().map(|h| h.0).collect::<Vec<_>>(), vec![9]);
//! ```

pub mod app;
pub mod command;
pub mod config;
pub mod coroutine;
pub mod error;
pub mod param;
pub mod plugin;
pub mod resource;
pub mod scheduler;
pub mod system;
pub mod world;

pub use app::App;
pub use command::{CommandQueue, Commands};
pub use config::TickConfig;
pub use coroutine::{CoroutineState, Coroutines};
pub use error::{SystemError, SystemResult};
pub use param::{SystemAccess, SystemParam, SystemParamItem};
pub use plugin::Plugin;
pub use resource::{Res, ResMut, Resources};
pub use scheduler::{Phase, RunHandle, Scheduler, SchedulerState};
pub use system::{
    ExclusiveSystem, FunctionSystem, FunctionalSystem, IntoSystemResult, System,
    SystemParamFunction,
};
pub use world::World;
