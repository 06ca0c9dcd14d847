//! Component bundles: the tuples handed to `spawn`.

use crate::archetype::ArchetypeTable;
use crate::column::{Column, ErasedColumn};
use crate::component::{Component, ComponentMeta};
use crate::error::EcsResult;
use crate::signature::Signature;

/// A statically typed group of components that can be written into an
/// archetype table as one row.
///
/// Implemented for tuples of up to eight components. The empty tuple spawns
/// an entity without components.
pub trait Bundle: Send + 'static {
    /// Append the metadata of every component in the bundle, in tuple order.
    fn component_metas(metas: &mut Vec<ComponentMeta>);

    /// Append one empty column per component in the bundle.
    fn columns(columns: &mut Vec<Box<dyn ErasedColumn>>);

    /// Check that every component has a column of its own Rust type in
    /// `table`. Runs before any value is pushed so a failure leaves the
    /// table untouched.
    fn check_columns(table: &ArchetypeTable) -> EcsResult<()>;

    /// Push every value into its column of `table`.
    fn push_into(self, table: &mut ArchetypeTable) -> EcsResult<()>;

    /// The bundle's signature. Fails if a component type appears twice.
    fn signature() -> EcsResult<Signature> {
        let mut metas = Vec::new();
        Self::component_metas(&mut metas);
        Signature::from_metas(&metas)
    }
}

macro_rules! impl_bundle {
    ($($name:ident),*) => {
        #[allow(non_snake_case, unused_variables)]
        impl<$($name: Component),*> Bundle for ($($name,)*) {
            fn component_metas(metas: &mut Vec<ComponentMeta>) {
                $(metas.push($name::meta());)*
            }

            fn columns(columns: &mut Vec<Box<dyn ErasedColumn>>) {
                $(columns.push(Box::new(Column::<$name>::new()));)*
            }

            fn check_columns(table: &ArchetypeTable) -> EcsResult<()> {
                $(table.check_column::<$name>()?;)*
                Ok(())
            }

            fn push_into(self, table: &mut ArchetypeTable) -> EcsResult<()> {
                let ($($name,)*) = self;
                $(table.push_component($name)?;)*
                Ok(())
            }
        }
    };
}

impl_bundle!();
impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);
