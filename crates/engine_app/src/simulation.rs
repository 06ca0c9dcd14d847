//! A small kinematics simulation.
//!
//! Bodies are spawned with a velocity that friction wears down by one unit
//! per axis every update. Bodies whose velocity reaches zero lose the
//! component (and move to another archetype); once no body is moving the
//! run loop is stopped. Anchored bodies never move but still decay.

use std::time::Instant;

use engine_component::{Component, Entity, Query, Without};
use engine_system::{
    App, Commands, CoroutineState, Phase, Plugin, Res, ResMut, RunHandle, System, SystemResult,
    World,
};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}
impl Component for Position {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Velocity {
    pub x: i64,
    pub y: i64,
}
impl Component for Velocity {}

/// Marks a body that ignores its velocity.
#[derive(Debug, Clone, Copy)]
pub struct Anchored;
impl Component for Anchored {}

/// Input for the spawn system.
#[derive(Debug, Clone)]
pub struct SimulationSettings {
    pub entities: usize,
}

/// Counters updated while the simulation runs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimulationStats {
    pub ticks: u64,
    pub settled: u64,
}

pub struct SimulationPlugin {
    pub entities: usize,
}

impl Plugin for SimulationPlugin {
    fn name(&self) -> &str {
        "simulation"
    }

    fn build(&self, app: &mut App) -> SystemResult {
        let world = app.world_mut();
        world.insert_resource(SimulationSettings {
            entities: self.entities,
        });
        world.insert_resource(SimulationStats::default());
        world.start_coroutine(heartbeat(10));

        app.add_system(Reporter::default());
        app.add_function_system(Phase::Start, spawn_bodies)?
            .add_function_system(Phase::Update, apply_velocity)?
            .add_function_system(Phase::Update, apply_friction)?
            .add_function_system(Phase::Update, stop_when_settled)?;
        Ok(())
    }
}

fn initial_velocity(index: usize) -> Velocity {
    Velocity {
        x: (index % 7) as i64 + 1,
        y: (index % 5) as i64 + 1,
    }
}

fn spawn_bodies(mut commands: Commands, settings: Res<SimulationSettings>) -> SystemResult {
    for index in 0..settings.entities {
        let position = Position { x: 0, y: 0 };
        let velocity = initial_velocity(index);
        if index % 3 == 2 {
            commands.spawn((position, velocity, Anchored))?;
        } else {
            commands.spawn((position, velocity))?;
        }
    }
    debug!(entities = settings.entities, "queued bodies");
    Ok(())
}

fn apply_velocity(mut bodies: Query<(&mut Position, &Velocity), Without<Anchored>>) {
    for (position, velocity) in bodies.iter() {
        position.x += velocity.x;
        position.y += velocity.y;
    }
}

fn decay(value: i64) -> i64 {
    value - value.signum()
}

fn apply_friction(mut moving: Query<(Entity, &mut Velocity)>, mut commands: Commands) {
    for (entity, velocity) in moving.iter() {
        velocity.x = decay(velocity.x);
        velocity.y = decay(velocity.y);
        if velocity.x == 0 && velocity.y == 0 {
            commands.remove_component::<Velocity>(entity);
        }
    }
}

fn stop_when_settled(
    moving: Query<&Velocity>,
    settled: Query<Entity, Without<Velocity>>,
    mut stats: ResMut<SimulationStats>,
    running: RunHandle,
) {
    stats.ticks += 1;
    stats.settled = settled.count() as u64;
    if moving.is_empty() {
        info!(ticks = stats.ticks, settled = stats.settled, "all bodies settled");
        running.stop();
    }
}

fn heartbeat(every: u32) -> impl FnMut(&mut World) -> SystemResult<CoroutineState> + Send + 'static {
    move |world: &mut World| {
        let stats = world.resource::<SimulationStats>()?;
        debug!(ticks = stats.ticks, settled = stats.settled, "heartbeat");
        Ok(CoroutineState::Wait(every.saturating_sub(1)))
    }
}

/// Logs the run's wall-clock time and final counters.
#[derive(Default)]
struct Reporter {
    started: Option<Instant>,
}

impl System for Reporter {
    fn name(&self) -> &str {
        "reporter"
    }

    fn start(&mut self, _world: &mut World) -> SystemResult {
        self.started = Some(Instant::now());
        Ok(())
    }

    fn dispose(&mut self, world: &mut World) -> SystemResult {
        let stats = world.resource::<SimulationStats>()?;
        let elapsed_ms = self
            .started
            .map(|started| started.elapsed().as_millis() as u64)
            .unwrap_or_default();
        info!(
            ticks = stats.ticks,
            settled = stats.settled,
            archetypes = world.storage().archetype_count(),
            elapsed_ms,
            "simulation finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use engine_system::{SchedulerState, TickConfig};

    use super::*;

    fn run(entities: usize, config: TickConfig) -> App {
        let mut app = App::new(config);
        app.add_plugin(SimulationPlugin { entities });
        app.run().unwrap();
        app
    }

    #[test]
    fn test_bodies_settle_and_loop_stops() {
        let app = run(3, TickConfig::default());
        let world = app.world();

        let stats = world.resource::<SimulationStats>().unwrap();
        assert_eq!(*stats, SimulationStats { ticks: 3, settled: 3 });
        assert_eq!(app.scheduler().state(), SchedulerState::Disposed);

        let mut free = world
            .query_filtered::<&Position, Without<Anchored>>()
            .unwrap();
        let mut xs: Vec<_> = free.iter().map(|p| (p.x, p.y)).collect();
        xs.sort_unstable();
        assert_eq!(xs, vec![(1, 1), (3, 3)]);

        let mut anchored = world
            .query_filtered::<&Position, engine_component::With<Anchored>>()
            .unwrap();
        assert_eq!(
            anchored.iter().copied().collect::<Vec<_>>(),
            vec![Position { x: 0, y: 0 }]
        );
    }

    #[test]
    fn test_max_ticks_cuts_run_short() {
        let app = run(
            10,
            TickConfig {
                tick_rate: 0.0,
                max_ticks: 2,
            },
        );
        let stats = app.world().resource::<SimulationStats>().unwrap();
        assert_eq!(stats.ticks, 2);
        assert!(app.world().query::<&Velocity>().unwrap().count() > 0);
    }

    #[test]
    fn test_decay_moves_toward_zero() {
        assert_eq!(decay(3), 2);
        assert_eq!(decay(-2), -1);
        assert_eq!(decay(0), 0);
    }
}
