//! Phase-based scheduler.
//!
//! Systems are grouped by [`Phase`]. Within a phase, lifecycle systems run
//! first, then functional systems, each group in registration order. Every
//! update ends with exactly one coroutine tick.
//!
//! The scheduler moves through `Idle → Started → Running → Disposed`; calling
//! a phase out of order fails with [`SystemError::InvalidState`]. A start
//! hook that fails parks the scheduler in `Failed`, so start hooks never run
//! twice.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::config::TickConfig;
use crate::error::{SystemError, SystemResult};
use crate::system::{ExclusiveSystem, FunctionSystem, FunctionalSystem, System, SystemParamFunction};
use crate::world::World;

/// The schedule a functional system belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Runs once, before the first update.
    Start,
    /// Runs every tick.
    Update,
    /// Runs once, after the last update.
    Dispose,
}

impl Phase {
    const fn index(self) -> usize {
        match self {
            Self::Start => 0,
            Self::Update => 1,
            Self::Dispose => 2,
        }
    }
}

/// Where the scheduler is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Built but not started.
    Idle,
    /// Start hooks have run; no update yet.
    Started,
    /// At least one update has begun.
    Running,
    /// Dispose hooks have run. Terminal.
    Disposed,
    /// A start hook failed. Terminal; every phase is rejected.
    Failed,
}

/// Shared running flag for the continuous loop.
///
/// Cloning yields a handle to the same flag, so a system, a coroutine or
/// another thread can stop the loop. The loop checks the flag between
/// updates; the current update always finishes.
#[derive(Debug, Clone, Default)]
pub struct RunHandle(Arc<AtomicBool>);

impl RunHandle {
    /// Whether the loop should keep updating.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Request the loop to exit after the current update.
    pub fn stop(&self) {
        self.set_running(false);
    }

    /// Raise or clear the flag. [`Scheduler::run`] raises it on entry.
    pub fn set_running(&self, running: bool) {
        self.0.store(running, Ordering::Release);
    }
}

/// Drives lifecycle and functional systems through start, update and
/// dispose.
pub struct Scheduler {
    systems: Vec<Box<dyn System>>,
    functional: [Vec<Box<dyn FunctionalSystem>>; 3],
    state: SchedulerState,
    ticks: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            systems: Vec::new(),
            functional: [Vec::new(), Vec::new(), Vec::new()],
            state: SchedulerState::Idle,
            ticks: 0,
        }
    }
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Number of updates run so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Number of lifecycle systems.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Functional systems registered for `phase`, in run order.
    pub fn functional_systems(&self, phase: Phase) -> impl Iterator<Item = &dyn FunctionalSystem> {
        self.functional[phase.index()].iter().map(|system| &**system)
    }

    /// Register a lifecycle system.
    pub fn add_system(&mut self, system: impl System) {
        debug!(system = system.name(), "registered lifecycle system");
        self.systems.push(Box::new(system));
    }

    /// Register a function whose parameters are resolved on every run.
    ///
    /// Fails with [`SystemError::ConflictingParams`] if two parameters alias
    /// the same component or resource mutably.
    pub fn add_function_system<M, F>(&mut self, phase: Phase, func: F) -> SystemResult
    where
        M: 'static,
        F: SystemParamFunction<M>,
    {
        let system = FunctionSystem::new(func)?;
        self.add_boxed(phase, Box::new(system));
        Ok(())
    }

    /// Register a function that takes the world exclusively.
    pub fn add_exclusive_system<F>(&mut self, phase: Phase, func: F)
    where
        F: FnMut(&mut World) -> SystemResult + Send + 'static,
    {
        self.add_boxed(phase, Box::new(ExclusiveSystem::new(func)));
    }

    fn add_boxed(&mut self, phase: Phase, system: Box<dyn FunctionalSystem>) {
        debug!(system = system.name(), ?phase, "registered functional system");
        self.functional[phase.index()].push(system);
    }

    /// Run every start hook, then the start schedule.
    ///
    /// On failure the scheduler moves to [`SchedulerState::Failed`] and the
    /// error is returned; later calls fail with
    /// [`SystemError::InvalidState`].
    pub fn start(&mut self, world: &mut World) -> SystemResult {
        self.expect_state("start", &[SchedulerState::Idle])?;
        info!(
            systems = self.systems.len(),
            functional = self.functional.iter().map(Vec::len).sum::<usize>(),
            "starting systems"
        );
        match self.run_start(world) {
            Ok(()) => {
                self.state = SchedulerState::Started;
                Ok(())
            }
            Err(err) => {
                self.state = SchedulerState::Failed;
                Err(err)
            }
        }
    }

    fn run_start(&mut self, world: &mut World) -> SystemResult {
        for system in &mut self.systems {
            system
                .start(world)
                .inspect_err(|err| log_failure(Phase::Start, system.name(), err))?;
        }
        self.run_functional(Phase::Start, world)
    }

    /// Run every update hook, the update schedule, then one coroutine tick.
    pub fn update(&mut self, world: &mut World) -> SystemResult {
        self.expect_state(
            "update",
            &[SchedulerState::Started, SchedulerState::Running],
        )?;
        self.state = SchedulerState::Running;
        debug!(tick = self.ticks, "update");

        for system in &mut self.systems {
            system
                .update(world)
                .inspect_err(|err| log_failure(Phase::Update, system.name(), err))?;
        }
        self.run_functional(Phase::Update, world)?;
        world
            .tick_coroutines()
            .inspect_err(|err| log_failure(Phase::Update, "coroutines", err))?;

        self.ticks += 1;
        Ok(())
    }

    /// Run every dispose hook, then the dispose schedule. Only once.
    pub fn dispose(&mut self, world: &mut World) -> SystemResult {
        self.expect_state(
            "dispose",
            &[SchedulerState::Started, SchedulerState::Running],
        )?;
        info!(ticks = self.ticks, "disposing systems");
        for system in &mut self.systems {
            system
                .dispose(world)
                .inspect_err(|err| log_failure(Phase::Dispose, system.name(), err))?;
        }
        self.run_functional(Phase::Dispose, world)?;
        self.state = SchedulerState::Disposed;
        Ok(())
    }

    /// Start, update until the running flag clears or `max_ticks` is hit,
    /// then dispose.
    ///
    /// The flag is raised on entry and cleared on exit, including when a
    /// system fails. A failing system aborts the run without disposing.
    pub fn run(&mut self, world: &mut World, config: &TickConfig) -> SystemResult {
        let handle = world.run_handle();
        handle.set_running(true);
        let result = self.run_loop(world, config, &handle);
        handle.set_running(false);
        result
    }

    fn run_loop(&mut self, world: &mut World, config: &TickConfig, handle: &RunHandle) -> SystemResult {
        let tick_duration = config.tick_duration();
        info!(
            tick_rate = config.tick_rate,
            max_ticks = config.max_ticks,
            "starting run loop"
        );

        self.start(world)?;
        let mut count = 0u64;
        while handle.is_running() {
            let started = Instant::now();
            self.update(world)?;
            count += 1;

            if config.max_ticks > 0 && count >= config.max_ticks {
                info!(ticks = count, "tick limit reached");
                break;
            }

            if let Some(budget) = tick_duration {
                let elapsed = started.elapsed();
                if elapsed < budget {
                    std::thread::sleep(budget - elapsed);
                } else {
                    warn!(
                        tick = self.ticks,
                        elapsed_ms = elapsed.as_millis() as u64,
                        budget_ms = budget.as_millis() as u64,
                        "tick exceeded time budget"
                    );
                }
            }
        }
        self.dispose(world)?;
        info!(ticks = count, "run loop complete");
        Ok(())
    }

    /// Start, update once, dispose.
    pub fn run_once(&mut self, world: &mut World) -> SystemResult {
        self.start(world)?;
        self.update(world)?;
        self.dispose(world)
    }

    fn run_functional(&mut self, phase: Phase, world: &mut World) -> SystemResult {
        for system in &mut self.functional[phase.index()] {
            system
                .run(world)
                .inspect_err(|err| log_failure(phase, system.name(), err))?;
        }
        Ok(())
    }

    fn expect_state(&self, action: &'static str, allowed: &[SchedulerState]) -> SystemResult {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SystemError::InvalidState {
                action,
                state: self.state,
            })
        }
    }
}

fn log_failure(phase: Phase, system: &str, err: &SystemError) {
    error!(?phase, system, error = %err, "system failed");
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |phase: Phase| {
            self.functional_systems(phase)
                .map(|system| system.name().to_string())
                .collect::<Vec<_>>()
        };
        f.debug_struct("Scheduler")
            .field("state", &self.state)
            .field("ticks", &self.ticks)
            .field(
                "systems",
                &self.systems.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("start", &names(Phase::Start))
            .field("update", &names(Phase::Update))
            .field("dispose", &names(Phase::Dispose))
            .finish()
    }
}
