//! Application bootstrap: a world, a scheduler and the plugins that fill
//! them.

use tracing::{debug, info};

use crate::config::TickConfig;
use crate::error::SystemResult;
use crate::plugin::Plugin;
use crate::scheduler::{Phase, Scheduler};
use crate::system::{System, SystemParamFunction};
use crate::world::World;

/// Owns everything needed to run a simulation.
pub struct App {
    world: World,
    scheduler: Scheduler,
    pending: Vec<Box<dyn Plugin>>,
    built: Vec<String>,
    config: TickConfig,
}

impl Default for App {
    fn default() -> Self {
        Self::new(TickConfig::default())
    }
}

impl App {
    #[must_use]
    pub fn new(config: TickConfig) -> Self {
        Self {
            world: World::new(),
            scheduler: Scheduler::new(),
            pending: Vec::new(),
            built: Vec::new(),
            config,
        }
    }

    /// Queue a plugin; it is built by [`App::build_plugins`].
    pub fn add_plugin(&mut self, plugin: impl Plugin) -> &mut Self {
        self.pending.push(Box::new(plugin));
        self
    }

    /// Register a lifecycle system. See [`Scheduler::add_system`].
    pub fn add_system(&mut self, system: impl System) -> &mut Self {
        self.scheduler.add_system(system);
        self
    }

    /// Register a functional system. See [`Scheduler::add_function_system`].
    pub fn add_function_system<M, F>(&mut self, phase: Phase, func: F) -> SystemResult<&mut Self>
    where
        M: 'static,
        F: SystemParamFunction<M>,
    {
        self.scheduler.add_function_system(phase, func)?;
        Ok(self)
    }

    /// Register a system that takes the world exclusively.
    pub fn add_exclusive_system<F>(&mut self, phase: Phase, func: F) -> &mut Self
    where
        F: FnMut(&mut World) -> SystemResult + Send + 'static,
    {
        self.scheduler.add_exclusive_system(phase, func);
        self
    }

    /// Build every queued plugin in registration order.
    ///
    /// Plugins added while building form the next batch. The first failure
    /// aborts bootstrap; plugins not yet built stay queued.
    pub fn build_plugins(&mut self) -> SystemResult {
        loop {
            if self.pending.is_empty() {
                return Ok(());
            }
            let mut batch = std::mem::take(&mut self.pending).into_iter();
            debug!(plugins = batch.len(), "building plugin batch");
            while let Some(plugin) = batch.next() {
                let name = plugin.name().to_string();
                info!(plugin = %name, "building plugin");
                if let Err(err) = plugin.build(self) {
                    let added = std::mem::replace(&mut self.pending, batch.collect());
                    self.pending.extend(added);
                    return Err(err);
                }
                self.built.push(name);
            }
        }
    }

    /// Build plugins, then run the scheduler loop with this app's config.
    pub fn run(&mut self) -> SystemResult {
        self.build_plugins()?;
        self.scheduler.run(&mut self.world, &self.config)
    }

    /// Build plugins, then start, update once and dispose.
    pub fn run_once(&mut self) -> SystemResult {
        self.build_plugins()?;
        self.scheduler.run_once(&mut self.world)
    }

    /// The world the app runs against.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The scheduler, for inspecting state and registered systems.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// The tick config used by [`App::run`].
    #[must_use]
    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut TickConfig {
        &mut self.config
    }

    /// Names of the plugins built so far, in build order.
    #[must_use]
    pub fn plugins(&self) -> &[String] {
        &self.built
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("world", &self.world)
            .field("scheduler", &self.scheduler)
            .field("pending", &self.pending.len())
            .field("built", &self.built)
            .field("config", &self.config)
            .finish()
    }
}
