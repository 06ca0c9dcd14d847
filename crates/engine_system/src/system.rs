//! Systems: lifecycle objects and functional systems.
//!
//! Two flavours are supported:
//!
//! - [`System`]: a stateful object with `start`, `update` and `dispose`
//!   hooks, each receiving the world exclusively.
//! - Functional systems: plain functions whose parameters
//!   ([`Query`](engine_component::Query), [`Res`](crate::Res),
//!   [`Commands`](crate::Commands), ...) are resolved against the world on
//!   every invocation. Functions that need structural changes right away can
//!   take `&mut World` instead and run as exclusive systems.
//!
//! ```rust
//! use engine_component::{Component, Query};
//! use engine_system::{Phase, Scheduler, World};
//!
//! #[derive(Debug)]
//! struct Position(i32);
//! impl Component for Position {}
//!
//! fn step(mut query: Query<&mut Position>) {
//!     for position in query.iter() {
//!         position.0 += 1;
//!     }
//! }
//!
//! let mut world = World::new();
//! let entity = world.spawn((Position(0),)).unwrap();
//!
//! let mut scheduler = Scheduler::new();
//! scheduler.add_function_system(Phase::Update, step).unwrap();
//! scheduler.run_once(&mut world).unwrap();
//!
//! assert_eq!(world.get::<Position>(entity).unwrap().0, 1);
//! ```

use std::any::type_name;
use std::marker::PhantomData;

use crate::error::{SystemError, SystemResult};
use crate::param::{SystemAccess, SystemParam, SystemParamItem};
use crate::world::World;

/// A lifecycle system.
///
/// Every hook defaults to doing nothing, so implementors only override the
/// phases they care about.
pub trait System: Send + 'static {
    /// Name used in logs and errors.
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    /// Called once, before any update.
    fn start(&mut self, _world: &mut World) -> SystemResult {
        Ok(())
    }

    /// Called once per update.
    fn update(&mut self, _world: &mut World) -> SystemResult {
        Ok(())
    }

    /// Called once, after the last update.
    fn dispose(&mut self, _world: &mut World) -> SystemResult {
        Ok(())
    }
}

/// A registered functional system, type-erased.
pub trait FunctionalSystem: Send + 'static {
    fn name(&self) -> &str;

    /// Data touched by the system's parameters.
    fn access(&self) -> &SystemAccess;

    /// Resolve parameters, run the body, then apply or discard the commands
    /// it queued.
    fn run(&mut self, world: &mut World) -> SystemResult;
}

/// Conversion from a system body's return value.
pub trait IntoSystemResult {
    fn into_system_result(self) -> SystemResult;
}

impl IntoSystemResult for () {
    fn into_system_result(self) -> SystemResult {
        Ok(())
    }
}

impl IntoSystemResult for SystemResult {
    fn into_system_result(self) -> SystemResult {
        self
    }
}

impl IntoSystemResult for anyhow::Result<()> {
    fn into_system_result(self) -> SystemResult {
        self.map_err(SystemError::Other)
    }
}

/// A function usable as a functional system. `Marker` disambiguates the
/// implementations for different arities.
pub trait SystemParamFunction<Marker>: Send + 'static {
    type Param: SystemParam;

    fn run(&mut self, param: SystemParamItem<'_, Self::Param>) -> SystemResult;
}

macro_rules! impl_system_param_function {
    ($($param:ident),*) => {
        #[allow(non_snake_case)]
        impl<Func, Out, $($param: SystemParam),*> SystemParamFunction<fn($($param,)*) -> Out> for Func
        where
            Func: Send + 'static,
            for<'a> &'a mut Func:
                FnMut($($param),*) -> Out + FnMut($(SystemParamItem<'_, $param>),*) -> Out,
            Out: IntoSystemResult,
        {
            type Param = ($($param,)*);

            fn run(&mut self, param: SystemParamItem<'_, ($($param,)*)>) -> SystemResult {
                // Calling through a generic helper lets the compiler pick the
                // `SystemParamItem` flavour of the `FnMut` bound.
                fn call_inner<Out, $($param,)*>(
                    mut f: impl FnMut($($param,)*) -> Out,
                    $($param: $param,)*
                ) -> Out {
                    f($($param,)*)
                }
                let ($($param,)*) = param;
                call_inner(self, $($param),*).into_system_result()
            }
        }
    };
}

impl_system_param_function!();
impl_system_param_function!(A);
impl_system_param_function!(A, B);
impl_system_param_function!(A, B, C);
impl_system_param_function!(A, B, C, D);
impl_system_param_function!(A, B, C, D, E);
impl_system_param_function!(A, B, C, D, E, F);
impl_system_param_function!(A, B, C, D, E, F, G);
impl_system_param_function!(A, B, C, D, E, F, G, H);

/// A function with declared parameters, wrapped for the scheduler.
pub struct FunctionSystem<Marker, F> {
    func: F,
    name: &'static str,
    access: SystemAccess,
    _marker: PhantomData<fn() -> Marker>,
}

impl<Marker, F> FunctionSystem<Marker, F>
where
    Marker: 'static,
    F: SystemParamFunction<Marker>,
{
    /// Wrap `func`, rejecting it if two parameters alias the same data.
    pub fn new(func: F) -> SystemResult<Self> {
        let name = type_name::<F>();
        let mut access = SystemAccess::new();
        <F::Param as SystemParam>::access(&mut access);
        access
            .validate()
            .map_err(|reason| SystemError::ConflictingParams {
                system: name.to_string(),
                reason,
            })?;
        Ok(Self {
            func,
            name,
            access,
            _marker: PhantomData,
        })
    }
}

impl<Marker, F> FunctionalSystem for FunctionSystem<Marker, F>
where
    Marker: 'static,
    F: SystemParamFunction<Marker>,
{
    fn name(&self) -> &str {
        self.name
    }

    fn access(&self) -> &SystemAccess {
        &self.access
    }

    fn run(&mut self, world: &mut World) -> SystemResult {
        let result = match <F::Param as SystemParam>::fetch(world) {
            Ok(param) => self.func.run(param),
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => world.flush_commands(),
            Err(err) => {
                world.discard_commands();
                Err(err)
            }
        }
    }
}

/// A functional system that takes the world exclusively.
pub struct ExclusiveSystem<F> {
    func: F,
    name: &'static str,
    access: SystemAccess,
}

impl<F> ExclusiveSystem<F>
where
    F: FnMut(&mut World) -> SystemResult + Send + 'static,
{
    #[must_use]
    pub fn new(func: F) -> Self {
        Self {
            func,
            name: type_name::<F>(),
            access: SystemAccess::new(),
        }
    }
}

impl<F> FunctionalSystem for ExclusiveSystem<F>
where
    F: FnMut(&mut World) -> SystemResult + Send + 'static,
{
    fn name(&self) -> &str {
        self.name
    }

    fn access(&self) -> &SystemAccess {
        &self.access
    }

    fn run(&mut self, world: &mut World) -> SystemResult {
        match (self.func)(world) {
            Ok(()) => world.flush_commands(),
            Err(err) => {
                world.discard_commands();
                Err(err)
            }
        }
    }
}
