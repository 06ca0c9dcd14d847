//! # engine_component
//!
//! The "C" in ECS: what a component is, how components are grouped into
//! archetype tables, and how systems query them.
//!
//! This crate provides:
//!
//! - [`Component`] trait, the contract all ECS data must satisfy.
//! - [`Entity`] and [`EntityAllocator`], lightweight `u64` identifiers.
//! - [`Signature`] and [`ArchetypeTable`], struct-of-arrays storage grouped
//!   by component combination.
//! - [`Storage`], the entity index plus the archetype graph that migrates
//!   entities when components are added or removed.
//! - [`Query`] and [`QueryDescriptor`], typed iteration and declarative
//!   access requirements.

pub mod archetype;
pub mod bundle;
pub mod column;
pub mod component;
pub mod descriptor;
pub mod entity;
pub mod error;
pub mod graph;
pub mod query;
pub mod signature;
pub mod storage;

pub use archetype::{ArchetypeId, ArchetypeTable, MovedRow};
pub use bundle::Bundle;
pub use column::{Column, ErasedColumn};
pub use component::{Component, ComponentMeta, ComponentRegistry, ComponentTypeId};
pub use descriptor::QueryDescriptor;
pub use entity::{Entity, EntityAllocator, EntityIndex, EntityLocation};
pub use error::{EcsError, EcsResult};
pub use graph::ArchetypeGraph;
pub use query::{Query, QueryFilter, QueryIter, TupleIter, With, Without, WorldQuery};
pub use signature::Signature;
pub use storage::Storage;
