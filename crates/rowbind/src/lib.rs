//! rowbind: record-to-SQL mapping with cached statements, hooks and soft
//! delete.
//!
//! This crate re-exports the workspace behind one import path:
//!
//! - [`rowbind_core`]: `Entity`, `Executor`, `Value`, `Row`, descriptors and errors
//! - [`rowbind_query`]: column policies and dialect rendering
//! - [`rowbind_session`]: the `Registry` and every persistence operation
//!
//! ```ignore
//! use rowbind::prelude::*;
//!
//! let registry = Registry::builder().register::<Pilot>().build()?;
//! let mut pilot = Pilot { callsign: "Kai".into(), ..Pilot::default() };
//! registry.insert(&conn, &mut pilot, &ColumnSet::Infer)?;
//! ```

pub use rowbind_core;
pub use rowbind_query;
pub use rowbind_session;

pub use rowbind_core::{
    Accessor, BindMapping, Cardinality, ConfigErrorKind, Entity, EntityDescriptor, Error,
    Executor, HookPoint, RelationDescriptor, Result, Row, Value, accessors,
};
pub use rowbind_query::{ColumnSet, Dialect};
pub use rowbind_session::{
    EngineConfig, Finder, Loaded, Registry, RegistryBuilder, Relation, UpsertOptions,
};

/// Everything an application typically needs.
pub mod prelude {
    pub use rowbind_core::{
        Accessor, BoxError, Entity, EntityDescriptor, Error, Executor, FromValue, HookPoint,
        RelationDescriptor, Result, Row, Value,
    };
    pub use rowbind_query::{ColumnSet, Dialect};
    pub use rowbind_session::{
        DebugSink, EngineConfig, Finder, Loaded, Registry, RegistryBuilder, Relation,
        TracingSink, UpsertOptions, WriterSink,
    };
}
