//! Core types and traits for rowbind.
//!
//! `rowbind-core` is the **foundation layer** of the workspace. It defines the
//! data model every other crate builds on.
//!
//! # Role In The Architecture
//!
//! - **Contract layer**: `Entity` is implemented by generated record types and
//!   `Executor` by whatever runs SQL (a connection, an open transaction, a test
//!   double).
//! - **Metadata**: `EntityDescriptor` and `RelationDescriptor` are static per
//!   table and per relation.
//! - **Binding**: `Accessor` tables and `BindMapping` move values between
//!   records and positional SQL parameters without runtime reflection.
//! - **Data model**: `Row` and `Value` carry query inputs and outputs.
//!
//! # Who Uses This Crate
//!
//! - `rowbind-query` resolves column sets from descriptors and renders SQL.
//! - `rowbind-session` runs hooks, caches statements and drives executors.
//!
//! Most applications should use the `rowbind` facade.

pub mod descriptor;
pub mod entity;
pub mod error;
pub mod executor;
pub mod identifiers;
pub mod relationship;
pub mod row;
pub mod value;

pub use descriptor::EntityDescriptor;
pub use entity::{Accessor, BindMapping, Entity};
pub use error::{
    BoxError, ConfigError, ConfigErrorKind, Error, ExecutionError, HookError, HookPoint, Result,
};
pub use executor::Executor;
pub use identifiers::{is_valid_identifier, quote_ident};
pub use relationship::{Cardinality, RelationDescriptor};
pub use row::Row;
pub use value::{FromValue, Value};
