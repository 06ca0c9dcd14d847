//! The world: entity storage plus everything systems share.

use std::any::Any;
use std::cell::{Ref, RefCell};

use engine_component::{
    Bundle, Component, Entity, EntityLocation, Query, QueryFilter, Storage, WorldQuery,
};
use tracing::debug;

use crate::command::{CommandQueue, Commands};
use crate::coroutine::{CoroutineState, Coroutines};
use crate::error::{SystemError, SystemResult};
use crate::resource::{Res, ResMut, Resources};
use crate::scheduler::RunHandle;

/// Owns the entity store, resources, the deferred command queue, running
/// coroutines and the running flag.
#[derive(Debug, Default)]
pub struct World {
    storage: Storage,
    resources: Resources,
    commands: RefCell<CommandQueue>,
    coroutines: Coroutines,
    running: RunHandle,
}

impl World {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The entity store.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }

    /// Create an entity holding `bundle`.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> SystemResult<Entity> {
        Ok(self.storage.spawn(bundle)?)
    }

    /// Destroy a live entity.
    pub fn despawn(&mut self, entity: Entity) -> SystemResult {
        Ok(self.storage.despawn(entity)?)
    }

    /// Attach `value` to `entity`.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> SystemResult {
        Ok(self.storage.add_component(entity, value)?)
    }

    /// Detach and return the `T` component of `entity`.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> SystemResult<T> {
        Ok(self.storage.remove_component::<T>(entity)?)
    }

    /// Archetype and row of `entity`.
    pub fn locate(&self, entity: Entity) -> SystemResult<EntityLocation> {
        Ok(self.storage.locate(entity)?)
    }

    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.storage.contains(entity)
    }

    /// Shared borrow of one component of `entity`.
    pub fn get<T: Component>(&self, entity: Entity) -> SystemResult<Ref<'_, T>> {
        Ok(self.storage.get::<T>(entity)?)
    }

    /// Exclusive access to one component of `entity`.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> SystemResult<&mut T> {
        Ok(self.storage.get_mut::<T>(entity)?)
    }

    /// A query over every entity matching `Q`.
    pub fn query<Q: WorldQuery>(&self) -> SystemResult<Query<'_, Q>> {
        Ok(self.storage.query::<Q>()?)
    }

    /// A query over every entity matching `Q` and `F`.
    pub fn query_filtered<Q: WorldQuery, F: QueryFilter>(
        &self,
    ) -> SystemResult<Query<'_, Q, F>> {
        Ok(self.storage.query_filtered::<Q, F>()?)
    }

    /// Insert or replace a resource, returning the previous value.
    pub fn insert_resource<R: Any + Send>(&mut self, value: R) -> Option<R> {
        self.resources.insert(value)
    }

    /// Take a resource out of the world.
    pub fn remove_resource<R: Any + Send>(&mut self) -> Option<R> {
        self.resources.remove::<R>()
    }

    #[must_use]
    pub fn contains_resource<R: Any + Send>(&self) -> bool {
        self.resources.contains::<R>()
    }

    /// Shared access to a resource.
    pub fn resource<R: Any + Send>(&self) -> SystemResult<Res<'_, R>> {
        self.resources.borrow::<R>().map(Res::new)
    }

    /// Exclusive access to a resource through a shared world reference.
    pub fn resource_mut<R: Any + Send>(&self) -> SystemResult<ResMut<'_, R>> {
        self.resources.borrow_mut::<R>().map(ResMut::new)
    }

    /// Direct mutable access to a resource.
    pub fn get_resource_mut<R: Any + Send>(&mut self) -> Option<&mut R> {
        self.resources.get_mut::<R>()
    }

    #[must_use]
    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// A recorder for deferred structural changes.
    pub fn commands(&self) -> SystemResult<Commands<'_>> {
        let queue = self
            .commands
            .try_borrow_mut()
            .map_err(|_| SystemError::ResourceBorrowed {
                resource: "Commands",
            })?;
        Ok(Commands::new(queue, &self.storage))
    }

    /// Apply every queued command in order.
    ///
    /// Commands queued while applying run in the same flush. On failure the
    /// remaining commands are dropped.
    pub fn flush_commands(&mut self) -> SystemResult {
        loop {
            let queue = std::mem::take(self.commands.get_mut());
            if queue.is_empty() {
                return Ok(());
            }
            debug!(commands = queue.len(), "applying commands");
            if let Err(err) = queue.apply(self) {
                self.commands.get_mut().clear();
                return Err(err);
            }
        }
    }

    /// Drop every queued command without applying it.
    pub fn discard_commands(&mut self) {
        self.commands.get_mut().clear();
    }

    /// The flag that keeps the continuous run loop going.
    #[must_use]
    pub fn run_handle(&self) -> RunHandle {
        self.running.clone()
    }

    /// Stop the continuous run loop after the current update.
    pub fn stop(&self) {
        self.running.stop();
    }

    /// Whether the run loop flag is raised.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.is_running()
    }

    /// Register a coroutine, first resumed on the next coroutine tick.
    pub fn start_coroutine(
        &mut self,
        body: impl FnMut(&mut World) -> SystemResult<CoroutineState> + Send + 'static,
    ) {
        self.coroutines.start(body);
    }

    /// Number of coroutines that have not completed.
    #[must_use]
    pub fn coroutine_count(&self) -> usize {
        self.coroutines.len()
    }

    /// Resume every coroutine once, then apply any commands they queued.
    ///
    /// Coroutines started during the tick are first resumed on the next one.
    pub fn tick_coroutines(&mut self) -> SystemResult {
        let mut active = std::mem::take(&mut self.coroutines);
        let result = active.resume_all(self);
        let started = std::mem::replace(&mut self.coroutines, active);
        self.coroutines.append(started);
        result?;
        self.flush_commands()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position(i32, i32);
    impl Component for Position {}

    #[derive(Debug, PartialEq)]
    struct Ticks(u32);

    #[test]
    fn test_resource_round_trip() {
        let mut world = World::new();
        world.insert_resource(Ticks(1));
        world.resource_mut::<Ticks>().unwrap().0 += 1;
        world.get_resource_mut::<Ticks>().unwrap().0 += 1;
        assert_eq!(*world.resource::<Ticks>().unwrap(), Ticks(3));
        assert_eq!(world.remove_resource::<Ticks>(), Some(Ticks(3)));
        assert!(!world.contains_resource::<Ticks>());
    }

    #[test]
    fn test_commands_queued_while_flushing_are_applied() {
        let mut world = World::new();
        world.commands().unwrap().add(|world: &mut World| {
            world.commands()?.spawn((Position(4, 4),))?;
            Ok(())
        });
        world.flush_commands().unwrap();
        assert_eq!(world.query::<&Position>().unwrap().count(), 1);
    }

    #[test]
    fn test_second_commands_borrow_rejected() {
        let world = World::new();
        let _first = world.commands().unwrap();
        assert!(matches!(
            world.commands(),
            Err(SystemError::ResourceBorrowed { .. })
        ));
    }

    #[test]
    fn test_stop_clears_running_flag() {
        let world = World::new();
        let handle = world.run_handle();
        handle.set_running(true);
        assert!(world.is_running());
        world.stop();
        assert!(!handle.is_running());
    }

    #[test]
    fn test_coroutine_started_during_tick_waits() {
        let mut world = World::new();
        world.insert_resource(Ticks(0));
        world.start_coroutine(|world: &mut World| {
            world.resource_mut::<Ticks>()?.0 += 1;
            world.start_coroutine(|world: &mut World| {
                world.resource_mut::<Ticks>()?.0 += 10;
                Ok(CoroutineState::Complete)
            });
            Ok(CoroutineState::Complete)
        });

        world.tick_coroutines().unwrap();
        assert_eq!(*world.resource::<Ticks>().unwrap(), Ticks(1));
        assert_eq!(world.coroutine_count(), 1);

        world.tick_coroutines().unwrap();
        assert_eq!(*world.resource::<Ticks>().unwrap(), Ticks(11));
        assert_eq!(world.coroutine_count(), 0);
    }
}
