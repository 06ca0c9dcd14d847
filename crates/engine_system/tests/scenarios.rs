//! End-to-end scenarios: systems, queries and commands running through the
//! scheduler against a real world.

use engine_component::{Component, EcsError, Entity, Query, With, Without};
use engine_system::{
    App, Commands, CoroutineState, Phase, Plugin, Res, ResMut, RunHandle, Scheduler,
    SchedulerState, System, SystemError, SystemResult, TickConfig, World,
};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: i32,
    y: i32,
}
impl Component for Position {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Velocity {
    x: i32,
    y: i32,
}
impl Component for Velocity {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct A(u32);
impl Component for A {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct B(u32);
impl Component for B {}

#[derive(Debug, Default)]
struct Log(Vec<String>);

fn record(log: &mut Log, entry: &str) {
    log.0.push(entry.to_string());
}

#[test]
fn test_query_yields_position_and_velocity() {
    let mut world = World::new();
    let entity = world
        .spawn((Position { x: 0, y: 0 }, Velocity { x: 12, y: 12 }))
        .unwrap();
    world.spawn((Position { x: 5, y: 5 },)).unwrap();

    let mut query = world.query::<(Entity, &Position, &Velocity)>().unwrap();
    let rows: Vec<_> = query.iter().map(|(e, p, v)| (e, *p, *v)).collect();
    assert_eq!(
        rows,
        vec![(
            entity,
            Position { x: 0, y: 0 },
            Velocity { x: 12, y: 12 }
        )]
    );
}

#[test]
fn test_excluded_component_filters_archetypes() {
    let mut world = World::new();
    let only_a = world.spawn((A(1),)).unwrap();
    let both = world.spawn((A(2), B(2))).unwrap();

    let mut without_b = world.query_filtered::<Entity, (With<A>, Without<B>)>().unwrap();
    assert_eq!(without_b.iter().collect::<Vec<_>>(), vec![only_a]);
    drop(without_b);

    let mut with_b = world.query_filtered::<(Entity, &A), With<B>>().unwrap();
    assert_eq!(
        with_b.iter().map(|(e, a)| (e, *a)).collect::<Vec<_>>(),
        vec![(both, A(2))]
    );
}

fn spawn_second(mut commands: Commands) -> SystemResult {
    commands.spawn((Position { x: 2, y: 2 },))?;
    Ok(())
}

fn increment(mut query: Query<&mut Position>) {
    for position in query.iter() {
        position.x += 1;
    }
}

#[test]
fn test_start_spawn_visible_to_next_start_system() {
    let mut world = World::new();
    world.spawn((Position { x: 0, y: 0 },)).unwrap();
    let mut scheduler = Scheduler::new();
    scheduler
        .add_function_system(Phase::Start, spawn_second)
        .unwrap();
    scheduler
        .add_function_system(Phase::Start, increment)
        .unwrap();
    scheduler.start(&mut world).unwrap();

    let mut query = world.query::<&Position>().unwrap();
    let mut positions: Vec<_> = query.iter().map(|p| (p.x, p.y)).collect();
    positions.sort_unstable();
    assert_eq!(positions, vec![(1, 0), (3, 2)]);
}

struct Greeter;

impl System for Greeter {
    fn name(&self) -> &str {
        "greeter"
    }

    fn start(&mut self, world: &mut World) -> SystemResult {
        record(&mut *world.resource_mut::<Log>()?, "lifecycle");
        Ok(())
    }
}

fn functional_start(mut log: ResMut<Log>) {
    record(&mut log, "functional");
}

#[test]
fn test_lifecycle_start_precedes_functional_start() {
    let mut world = World::new();
    world.insert_resource(Log::default());
    let mut scheduler = Scheduler::new();
    // Registered first on purpose; lifecycle hooks still run first.
    scheduler
        .add_function_system(Phase::Start, functional_start)
        .unwrap();
    scheduler.add_system(Greeter);
    scheduler.start(&mut world).unwrap();

    assert_eq!(world.resource::<Log>().unwrap().0, vec!["lifecycle", "functional"]);
    assert_eq!(scheduler.state(), SchedulerState::Started);
}

fn double_velocity(mut query: Query<&mut Velocity>) {
    for velocity in query.iter() {
        velocity.x *= 2;
    }
}

fn apply_velocity(mut query: Query<(&mut Position, &Velocity)>) {
    for (position, velocity) in query.iter() {
        position.x += velocity.x;
        position.y += velocity.y;
    }
}

#[test]
fn test_mutation_visible_to_later_systems() {
    let mut world = World::new();
    let entity = world
        .spawn((Position { x: 0, y: 0 }, Velocity { x: 1, y: 1 }))
        .unwrap();
    let mut scheduler = Scheduler::new();
    scheduler
        .add_function_system(Phase::Update, double_velocity)
        .unwrap();
    scheduler
        .add_function_system(Phase::Update, apply_velocity)
        .unwrap();
    scheduler.run_once(&mut world).unwrap();

    assert_eq!(*world.get::<Position>(entity).unwrap(), Position { x: 2, y: 1 });
}

#[derive(Debug)]
struct Limit(u32);

fn stop_at_limit(mut count: ResMut<u32>, limit: Res<Limit>, running: RunHandle) {
    *count += 1;
    if *count >= limit.0 {
        running.stop();
    }
}

#[test]
fn test_run_handle_stops_loop() {
    let mut world = World::new();
    world.insert_resource(0_u32);
    world.insert_resource(Limit(4));
    let mut scheduler = Scheduler::new();
    scheduler
        .add_function_system(Phase::Update, stop_at_limit)
        .unwrap();

    scheduler.run(&mut world, &TickConfig::default()).unwrap();
    assert_eq!(*world.resource::<u32>().unwrap(), 4);
    assert_eq!(scheduler.state(), SchedulerState::Disposed);
    assert!(!world.is_running());
}

#[test]
fn test_run_handle_stops_from_another_thread() {
    let mut world = World::new();
    let handle = world.run_handle();
    let mut scheduler = Scheduler::new();
    scheduler.add_exclusive_system(Phase::Start, move |_: &mut World| {
        let handle = handle.clone();
        std::thread::spawn(move || handle.stop())
            .join()
            .map_err(|_| anyhow::anyhow!("stopper thread panicked"))?;
        Ok(())
    });

    scheduler.run(&mut world, &TickConfig::default()).unwrap();
    assert_eq!(scheduler.ticks(), 0);
}

#[test]
fn test_missing_resource_propagates_out_of_run() {
    let mut world = World::new();
    let mut scheduler = Scheduler::new();
    scheduler
        .add_function_system(Phase::Update, stop_at_limit)
        .unwrap();

    let err = scheduler
        .run(&mut world, &TickConfig::default())
        .unwrap_err();
    assert!(matches!(err, SystemError::ResourceAbsent { .. }), "{err}");
    assert!(!world.is_running());
}

#[test]
fn test_failing_command_becomes_system_error() {
    let mut world = World::new();
    let mut scheduler = Scheduler::new();
    scheduler
        .add_function_system(Phase::Start, |mut commands: Commands| {
            commands.despawn(Entity(42));
        })
        .unwrap();

    let err = scheduler.run_once(&mut world).unwrap_err();
    assert!(matches!(
        err,
        SystemError::Ecs(EcsError::EntityNotFound(Entity(42)))
    ));
}

#[test]
fn test_aliasing_system_rejected_at_registration() {
    let mut scheduler = Scheduler::new();
    let err = scheduler
        .add_function_system(
            Phase::Update,
            |_: Query<&mut Position>, _: Query<(&Position, &Velocity)>| {},
        )
        .unwrap_err();
    assert!(matches!(err, SystemError::ConflictingParams { .. }));
    assert_eq!(scheduler.functional_systems(Phase::Update).count(), 0);
}

#[test]
fn test_disjoint_filters_allow_shared_component() {
    let mut world = World::new();
    world.spawn((A(1),)).unwrap();
    world.spawn((A(10), B(0))).unwrap();
    let mut scheduler = Scheduler::new();
    scheduler
        .add_function_system(
            Phase::Update,
            |mut plain: Query<&mut A, Without<B>>, tagged: Query<&A, With<B>>| {
                let bonus: u32 = tagged.count() as u32;
                for a in plain.iter() {
                    a.0 += bonus;
                }
            },
        )
        .unwrap();
    scheduler.run_once(&mut world).unwrap();

    let mut query = world.query_filtered::<&A, Without<B>>().unwrap();
    assert_eq!(query.iter().map(|a| a.0).collect::<Vec<_>>(), vec![2]);
}

#[test]
fn test_coroutine_waits_between_updates() {
    let mut world = World::new();
    world.insert_resource(Log::default());
    let mut step = 0;
    world.start_coroutine(move |world: &mut World| {
        step += 1;
        record(&mut *world.resource_mut::<Log>()?, &format!("step {step}"));
        Ok(if step == 1 {
            CoroutineState::Wait(1)
        } else {
            CoroutineState::Complete
        })
    });

    let mut scheduler = Scheduler::new();
    scheduler.start(&mut world).unwrap();
    for _ in 0..4 {
        scheduler.update(&mut world).unwrap();
    }
    scheduler.dispose(&mut world).unwrap();

    assert_eq!(world.resource::<Log>().unwrap().0, vec!["step 1", "step 2"]);
    assert_eq!(world.coroutine_count(), 0);
}

struct Movement;

impl Plugin for Movement {
    fn build(&self, app: &mut App) -> SystemResult {
        app.world_mut()
            .spawn((Position { x: 0, y: 0 }, Velocity { x: 1, y: 2 }))?;
        app.add_function_system(Phase::Update, apply_velocity)?;
        Ok(())
    }
}

#[test]
fn test_plugin_driven_app_runs_configured_ticks() {
    let mut app = App::new(TickConfig {
        tick_rate: 0.0,
        max_ticks: 3,
    });
    app.add_plugin(Movement);
    app.run().unwrap();

    assert_eq!(app.plugins().len(), 1);
    let mut query = app.world().query::<&Position>().unwrap();
    assert_eq!(
        query.iter().copied().collect::<Vec<_>>(),
        vec![Position { x: 3, y: 6 }]
    );
}
