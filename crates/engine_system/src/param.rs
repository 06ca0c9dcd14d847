//! System parameters: what a functional system can ask for.
//!
//! Each parameter type knows how to describe its access (checked once, when
//! the system is registered) and how to fetch itself from a [`World`] (done
//! on every invocation). Parameters are resolved in declaration order; the
//! first one that cannot be resolved fails the invocation.

use std::any::{Any, TypeId, type_name};

use engine_component::{Query, QueryDescriptor, QueryFilter, WorldQuery};

use crate::command::Commands;
use crate::error::{SystemError, SystemResult};
use crate::resource::{Res, ResMut};
use crate::scheduler::RunHandle;
use crate::world::World;

/// A value a functional system can declare as a parameter.
pub trait SystemParam {
    /// The parameter as handed to the system, borrowing the world for `'w`.
    type Item<'w>;

    /// Record the data this parameter touches.
    fn access(access: &mut SystemAccess);

    /// Resolve the parameter against the current world.
    fn fetch(world: &World) -> SystemResult<Self::Item<'_>>;
}

/// Shorthand for the fetched form of a parameter.
pub type SystemParamItem<'w, P> = <P as SystemParam>::Item<'w>;

#[derive(Debug, Clone)]
struct ResourceAccess {
    type_id: TypeId,
    name: &'static str,
    mutable: bool,
}

/// Everything one system touches, collected from its parameters.
#[derive(Debug, Clone, Default)]
pub struct SystemAccess {
    queries: Vec<QueryDescriptor>,
    resources: Vec<ResourceAccess>,
    commands: usize,
}

impl SystemAccess {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the component access of one query parameter.
    pub fn add_query(&mut self, descriptor: QueryDescriptor) {
        self.queries.push(descriptor);
    }

    /// Record a shared or exclusive resource parameter.
    pub fn add_resource<R: Any>(&mut self, mutable: bool) {
        self.resources.push(ResourceAccess {
            type_id: TypeId::of::<R>(),
            name: type_name::<R>(),
            mutable,
        });
    }

    /// Record a command buffer parameter.
    pub fn add_commands(&mut self) {
        self.commands += 1;
    }

    /// Query descriptors, in parameter order.
    #[must_use]
    pub fn queries(&self) -> &[QueryDescriptor] {
        &self.queries
    }

    /// Check that no two parameters alias the same data mutably.
    ///
    /// Two queries only clash if some archetype could match both.
    pub fn validate(&self) -> Result<(), String> {
        for (i, query) in self.queries.iter().enumerate() {
            query.validate().map_err(|err| err.to_string())?;
            for other in &self.queries[i + 1..] {
                if query.excludes(other) {
                    continue;
                }
                if let Some(meta) = query.first_conflict(other) {
                    return Err(format!(
                        "two queries access component `{}` and at least one writes it",
                        meta.name
                    ));
                }
            }
        }

        for (i, resource) in self.resources.iter().enumerate() {
            let clash = self.resources[i + 1..].iter().any(|other| {
                other.type_id == resource.type_id && (other.mutable || resource.mutable)
            });
            if clash {
                return Err(format!(
                    "resource `{}` is borrowed mutably more than once or both mutably and immutably",
                    resource.name
                ));
            }
        }

        if self.commands > 1 {
            return Err("more than one `Commands` parameter".to_string());
        }
        Ok(())
    }
}

impl<Q, F> SystemParam for Query<'_, Q, F>
where
    Q: WorldQuery + 'static,
    F: QueryFilter + 'static,
{
    type Item<'w> = Query<'w, Q, F>;

    fn access(access: &mut SystemAccess) {
        access.add_query(Query::<Q, F>::describe());
    }

    fn fetch(world: &World) -> SystemResult<Self::Item<'_>> {
        world.query_filtered::<Q, F>()
    }
}

impl<T: Any + Send> SystemParam for Res<'_, T> {
    type Item<'w> = Res<'w, T>;

    fn access(access: &mut SystemAccess) {
        access.add_resource::<T>(false);
    }

    fn fetch(world: &World) -> SystemResult<Self::Item<'_>> {
        world.resource::<T>()
    }
}

impl<T: Any + Send> SystemParam for ResMut<'_, T> {
    type Item<'w> = ResMut<'w, T>;

    fn access(access: &mut SystemAccess) {
        access.add_resource::<T>(true);
    }

    fn fetch(world: &World) -> SystemResult<Self::Item<'_>> {
        world.resource_mut::<T>()
    }
}

/// Resolves to `None` instead of failing when the resource is absent.
impl<T: Any + Send> SystemParam for Option<Res<'_, T>> {
    type Item<'w> = Option<Res<'w, T>>;

    fn access(access: &mut SystemAccess) {
        access.add_resource::<T>(false);
    }

    fn fetch(world: &World) -> SystemResult<Self::Item<'_>> {
        optional(world.resource::<T>())
    }
}

impl<T: Any + Send> SystemParam for Option<ResMut<'_, T>> {
    type Item<'w> = Option<ResMut<'w, T>>;

    fn access(access: &mut SystemAccess) {
        access.add_resource::<T>(true);
    }

    fn fetch(world: &World) -> SystemResult<Self::Item<'_>> {
        optional(world.resource_mut::<T>())
    }
}

fn optional<T>(result: SystemResult<T>) -> SystemResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(SystemError::ResourceAbsent { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

impl SystemParam for Commands<'_> {
    type Item<'w> = Commands<'w>;

    fn access(access: &mut SystemAccess) {
        access.add_commands();
    }

    fn fetch(world: &World) -> SystemResult<Self::Item<'_>> {
        world.commands()
    }
}

impl SystemParam for RunHandle {
    type Item<'w> = RunHandle;

    fn access(_access: &mut SystemAccess) {}

    fn fetch(world: &World) -> SystemResult<Self::Item<'_>> {
        Ok(world.run_handle())
    }
}

macro_rules! impl_system_param_tuple {
    ($($param:ident),*) => {
        #[allow(non_snake_case, unused_variables)]
        impl<$($param: SystemParam),*> SystemParam for ($($param,)*) {
            type Item<'w> = ($($param::Item<'w>,)*);

            fn access(access: &mut SystemAccess) {
                $($param::access(access);)*
            }

            fn fetch(world: &World) -> SystemResult<Self::Item<'_>> {
                Ok(($($param::fetch(world)?,)*))
            }
        }
    };
}

impl_system_param_tuple!();
impl_system_param_tuple!(A);
impl_system_param_tuple!(A, B);
impl_system_param_tuple!(A, B, C);
impl_system_param_tuple!(A, B, C, D);
impl_system_param_tuple!(A, B, C, D, E);
impl_system_param_tuple!(A, B, C, D, E, F);
impl_system_param_tuple!(A, B, C, D, E, F, G);
impl_system_param_tuple!(A, B, C, D, E, F, G, H);
