//! Column set resolution and SQL rendering for rowbind.
//!
//! `rowbind-query` is the **statement layer**. It decides which columns a
//! write touches and renders typed statements into dialect-specific SQL.
//! Nothing here executes SQL or holds state.
//!
//! # Role In The Architecture
//!
//! - **Column policies**: [`ColumnSet`] resolves write and RETURNING columns
//!   from an [`EntityDescriptor`](rowbind_core::EntityDescriptor).
//! - **Statements**: [`Insert`], [`Update`], [`Delete`], [`Upsert`] and
//!   [`Select`] describe shape only, never values.
//! - **Rendering**: a [`Renderer`] (normally a [`Dialect`]) numbers
//!   placeholders and quotes identifiers.
//!
//! `rowbind-session` caches rendered statements per shape and binds values.

pub mod columns;
pub mod dialect;
pub mod statement;

pub use columns::{ColumnSet, ResolvedColumns, non_zero_defaults};
pub use dialect::{Dialect, Renderer};
pub use statement::{Delete, Insert, Predicate, Projection, Select, Statement, Update, Upsert};
