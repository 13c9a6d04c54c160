//! The registry: per-entity hooks and statement caches, plus engine settings.
//!
//! Everything that would otherwise be process-wide mutable state lives in a
//! [`Registry`] value the application owns. Hooks can only be added through
//! the [`RegistryBuilder`], so once [`RegistryBuilder::build`] returns the
//! hook lists are fixed and the registry can be shared freely across threads.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rowbind_core::{
    BindMapping, BoxError, ConfigErrorKind, Entity, Error, Executor, HookPoint, Result, Value,
};
use rowbind_query::Dialect;
use serde::{Deserialize, Serialize};

use crate::cache::QueryCache;
use crate::debug::{DebugSink, Diagnostics, TracingSink};
use crate::hooks::{Hook, Hooks};

/// Source of "now" for automatic and soft-delete timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

// ============================================================================
// Configuration
// ============================================================================

/// Engine settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// SQL dialect statements are rendered for.
    pub dialect: Dialect,
    /// Whether statement diagnostics start enabled.
    pub debug: bool,
}

impl EngineConfig {
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            debug: false,
        }
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Parse settings from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// Per-entity state
// ============================================================================

/// Hooks and statement caches for one entity type.
pub(crate) struct EntityState<E> {
    pub(crate) hooks: Hooks<E>,
    pub(crate) insert: QueryCache,
    pub(crate) update: QueryCache,
    pub(crate) upsert: QueryCache,
}

impl<E> EntityState<E> {
    fn new() -> Self {
        Self {
            hooks: Hooks::default(),
            insert: QueryCache::new(),
            update: QueryCache::new(),
            upsert: QueryCache::new(),
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Collects entities, hooks and settings, then validates them in [`build`].
///
/// [`build`]: RegistryBuilder::build
#[derive(Default)]
pub struct RegistryBuilder {
    config: EngineConfig,
    entities: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    checks: HashMap<TypeId, fn() -> Result<()>>,
    sink: Option<Arc<dyn DebugSink>>,
    clock: Option<Clock>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.config.dialect = dialect;
        self
    }

    /// Register an entity type. Registering twice is harmless.
    #[must_use]
    pub fn register<E: Entity>(mut self) -> Self {
        self.entities
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(EntityState::<E>::new()));
        self.checks.insert(TypeId::of::<E>(), check_entity::<E>);
        self
    }

    /// Append a hook for `E` at `point`, registering `E` if needed.
    ///
    /// Hooks at the same point run in the order they were added.
    #[must_use]
    pub fn hook<E, F>(mut self, point: HookPoint, hook: F) -> Self
    where
        E: Entity,
        F: Fn(&dyn Executor, &mut E) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self = self.register::<E>();
        if let Some(state) = self
            .entities
            .get_mut(&TypeId::of::<E>())
            .and_then(|s| s.downcast_mut::<EntityState<E>>())
        {
            let hook: Hook<E> = Box::new(hook);
            state.hooks.push(point, hook);
        }
        self
    }

    /// Replace the diagnostics sink (default: [`TracingSink`]).
    #[must_use]
    pub fn debug_sink(mut self, sink: impl DebugSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Replace the clock (default: [`Utc::now`]).
    #[must_use]
    pub fn clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Validate every registered entity and produce the registry.
    ///
    /// Each descriptor must satisfy its own invariants and every declared
    /// column must have an accessor.
    pub fn build(self) -> Result<Registry> {
        for check in self.checks.values() {
            check()?;
        }

        tracing::info!(
            entities = self.entities.len(),
            dialect = self.config.dialect.name(),
            debug = self.config.debug,
            "registry built"
        );

        let sink: Arc<dyn DebugSink> = match self.sink {
            Some(sink) => sink,
            None => Arc::new(TracingSink),
        };
        let clock: Clock = match self.clock {
            Some(clock) => clock,
            None => Arc::new(Utc::now),
        };
        Ok(Registry {
            diagnostics: Diagnostics::new(self.config.debug, sink),
            clock,
            config: self.config,
            entities: self.entities,
        })
    }
}

fn check_entity<E: Entity>() -> Result<()> {
    let descriptor = E::descriptor();
    descriptor.validate()?;
    BindMapping::resolve::<E, _>(descriptor.all_columns)?;
    Ok(())
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("config", &self.config)
            .field("entities", &self.entities.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Owner of every entity's hooks and statement caches.
///
/// Cheap to share by reference; all operations take `&self`.
pub struct Registry {
    config: EngineConfig,
    entities: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    diagnostics: Diagnostics,
    clock: Clock,
}

impl Registry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    #[must_use]
    pub fn is_registered<E: Entity>(&self) -> bool {
        self.entities.contains_key(&TypeId::of::<E>())
    }

    /// Turn statement diagnostics on or off at runtime.
    pub fn set_debug(&self, enabled: bool) {
        self.diagnostics.set_enabled(enabled);
    }

    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.diagnostics.is_enabled()
    }

    /// Current time according to the configured clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Number of cached statements for `E`, across all write kinds.
    pub fn cached_statements<E: Entity>(&self) -> Result<usize> {
        let state = self.state::<E>()?;
        Ok(state.insert.len() + state.update.len() + state.upsert.len())
    }

    pub(crate) fn state<E: Entity>(&self) -> Result<&EntityState<E>> {
        self.entities
            .get(&TypeId::of::<E>())
            .and_then(|s| s.downcast_ref::<EntityState<E>>())
            .ok_or_else(|| {
                Error::config(
                    ConfigErrorKind::UnregisteredEntity,
                    format!("{} ({}) is not registered", type_name::<E>(), E::table()),
                )
            })
    }

    pub(crate) fn hooks<E: Entity>(&self) -> Result<&Hooks<E>> {
        Ok(&self.state::<E>()?.hooks)
    }

    pub(crate) fn emit(&self, sql: &str, args: &[Value]) {
        self.diagnostics.emit(sql, args);
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("entities", &self.entities.len())
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}
