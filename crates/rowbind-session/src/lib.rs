//! Registry, hooks and persistence operations for rowbind.
//!
//! `rowbind-session` is where records meet an [`Executor`](rowbind_core::Executor).
//! Every operation takes the executor as an argument; the crate never opens
//! connections or manages transactions.
//!
//! # Design Philosophy
//!
//! - **Owned state**: hooks, statement caches and the debug switch live in a
//!   [`Registry`] the application builds once and shares.
//! - **Build once, render once**: write statements are rendered the first
//!   time a column-set shape is seen and then reused from a [`QueryCache`].
//! - **Soft delete is a read filter**: entities with a deleted-at column are
//!   hidden from reads unless a caller opts out.
//! - **One query per relation**: [`Registry::load_relation`] batches by key.
//!
//! # Example
//!
//! ```ignore
//! let registry = Registry::builder()
//!     .dialect(Dialect::Postgres)
//!     .hook::<Pilot, _>(HookPoint::BeforeInsert, |_, p| {
//!         p.callsign = p.callsign.trim().to_string();
//!         Ok(())
//!     })
//!     .build()?;
//!
//! let mut pilot = Pilot { callsign: "Kai".into(), ..Pilot::default() };
//! registry.insert(&conn, &mut pilot, &ColumnSet::Infer)?;
//! let veterans = registry.finder::<Pilot>().filter_eq("rank", "ace").all(&conn)?;
//! ```

pub mod cache;
pub mod debug;
pub mod finder;
pub mod hooks;
pub mod loader;
pub mod ops;
pub mod registry;

#[cfg(test)]
mod testing;

pub use cache::{CacheEntry, CacheKey, CacheKind, QueryCache};
pub use debug::{DebugSink, TracingSink, WriterSink};
pub use finder::Finder;
pub use hooks::{Hook, Hooks};
pub use loader::{Loaded, Relation, Slot};
pub use ops::UpsertOptions;
pub use registry::{Clock, EngineConfig, Registry, RegistryBuilder};
