//! Deferred structural changes.
//!
//! Systems that hold queries only see the world through `&World`, so they
//! cannot spawn, despawn or migrate entities directly. They record the change
//! through [`Commands`] instead; the scheduler applies the queue right after
//! the issuing system returns, before the next system runs.
//!
//! Commands run in the order they were recorded. The first failing command
//! aborts the rest of the queue and becomes the issuing system's error.

use std::any::Any;
use std::cell::RefMut;

use engine_component::{Bundle, Component, Entity, Storage};

use crate::error::SystemResult;
use crate::world::World;

type Command = Box<dyn FnOnce(&mut World) -> SystemResult + Send>;

/// An ordered list of pending world mutations.
#[derive(Default)]
pub struct CommandQueue {
    commands: Vec<Command>,
}

impl CommandQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command.
    pub fn push(&mut self, command: impl FnOnce(&mut World) -> SystemResult + Send + 'static) {
        self.commands.push(Box::new(command));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drop every pending command.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Run every command against `world`, stopping at the first failure.
    pub fn apply(self, world: &mut World) -> SystemResult {
        for command in self.commands {
            command(world)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("len", &self.commands.len())
            .finish()
    }
}

/// Records structural changes for the world's command queue.
///
/// Entities spawned through `Commands` get their identifier immediately; the
/// entity itself exists once the queue is applied.
pub struct Commands<'w> {
    queue: RefMut<'w, CommandQueue>,
    storage: &'w Storage,
}

impl<'w> Commands<'w> {
    pub(crate) fn new(queue: RefMut<'w, CommandQueue>, storage: &'w Storage) -> Self {
        Self { queue, storage }
    }

    /// Queue the creation of an entity holding `bundle`.
    ///
    /// A bundle that repeats a component type is rejected here rather than
    /// when the queue is applied.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> SystemResult<Entity> {
        B::signature()?;
        let entity = self.storage.reserve_entity();
        self.queue.push(move |world: &mut World| {
            world.storage_mut().spawn_at(entity, bundle)?;
            Ok(())
        });
        Ok(entity)
    }

    /// Queue the destruction of `entity`.
    pub fn despawn(&mut self, entity: Entity) {
        self.queue.push(move |world: &mut World| world.despawn(entity));
    }

    /// Queue attaching `value` to `entity`.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) {
        self.queue
            .push(move |world: &mut World| world.add_component(entity, value));
    }

    /// Queue detaching the `T` component from `entity`. The value is dropped.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) {
        self.queue.push(move |world: &mut World| {
            world.remove_component::<T>(entity)?;
            Ok(())
        });
    }

    /// Queue inserting or replacing a resource.
    pub fn insert_resource<R: Any + Send>(&mut self, value: R) {
        self.queue.push(move |world: &mut World| {
            world.insert_resource(value);
            Ok(())
        });
    }

    /// Queue removing a resource.
    pub fn remove_resource<R: Any + Send>(&mut self) {
        self.queue.push(|world: &mut World| {
            world.remove_resource::<R>();
            Ok(())
        });
    }

    /// Queue an arbitrary world mutation.
    pub fn add(&mut self, command: impl FnOnce(&mut World) -> SystemResult + Send + 'static) {
        self.queue.push(command);
    }

    /// Number of commands waiting in the queue.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl std::fmt::Debug for Commands<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Commands")
            .field("pending", &self.queue.len())
            .finish()
    }
}
