//! Error types.
//!
//! Four failure families exist and callers are expected to branch on them:
//!
//! - [`Error::NotFound`]: a single-row fetch matched nothing.
//! - [`Error::Execution`]: the injected executor failed. The original cause is
//!   kept and reachable through [`std::error::Error::source`].
//! - [`Error::Config`]: descriptor/record drift or an unusable column set. These
//!   are programming or schema defects and are never worth retrying.
//! - [`Error::Hook`]: a lifecycle hook refused. A `Before*` failure means no
//!   statement was issued; an `After*` failure means the write already happened.

use std::fmt;

use thiserror::Error as ThisError;

/// Boxed error returned by executors and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for every rowbind operation.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A single-row fetch matched zero rows.
    #[error("rowbind: no rows in {table}")]
    NotFound {
        /// Table that was queried.
        table: &'static str,
    },

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Hook(#[from] HookError),
}

impl Error {
    /// Shorthand for a not-found error on `table`.
    #[must_use]
    pub const fn not_found(table: &'static str) -> Self {
        Error::NotFound { table }
    }

    /// Wrap an executor failure with the failing operation and table.
    pub fn execution(operation: &'static str, table: &'static str, source: BoxError) -> Self {
        Error::Execution(ExecutionError {
            operation,
            table,
            source,
        })
    }

    /// Build a configuration error.
    pub fn config(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Error::Config(ConfigError::new(kind, message))
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    #[must_use]
    pub const fn is_hook(&self) -> bool {
        matches!(self, Error::Hook(_))
    }

    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Error::Execution(_))
    }
}

/// A failure reported by the injected executor.
#[derive(Debug, ThisError)]
#[error("rowbind: unable to {operation} {table}: {source}")]
pub struct ExecutionError {
    /// Operation that failed (`insert`, `update`, `upsert`, `delete`, `select`, ...).
    pub operation: &'static str,
    /// Table the statement targeted.
    pub table: &'static str,
    /// Original executor error.
    #[source]
    pub source: BoxError,
}

/// Kind of configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// A resolved write-column list was empty where at least one column is required.
    EmptyWriteList,
    /// A column has no corresponding accessor on the record type.
    UnknownColumn,
    /// A value could not be assigned to a field of a different type.
    TypeMismatch,
    /// The entity type was not registered before the registry was built.
    UnregisteredEntity,
    /// An entity descriptor violates its own invariants.
    InvalidDescriptor,
    /// The requested statement shape cannot be expressed in SQL.
    Unsupported,
}

impl fmt::Display for ConfigErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfigErrorKind::EmptyWriteList => "empty write list",
            ConfigErrorKind::UnknownColumn => "unknown column",
            ConfigErrorKind::TypeMismatch => "type mismatch",
            ConfigErrorKind::UnregisteredEntity => "unregistered entity",
            ConfigErrorKind::InvalidDescriptor => "invalid descriptor",
            ConfigErrorKind::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

/// A configuration (programming/schema) defect.
#[derive(Debug, Clone, ThisError)]
#[error("rowbind: {kind}: {message}")]
pub struct ConfigError {
    pub kind: ConfigErrorKind,
    pub message: String,
}

impl ConfigError {
    pub fn new(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Lifecycle points at which hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    AfterSelect,
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
    BeforeUpsert,
    AfterUpsert,
}

impl HookPoint {
    /// Every hook point, in declaration order.
    pub const ALL: [HookPoint; 9] = [
        HookPoint::AfterSelect,
        HookPoint::BeforeInsert,
        HookPoint::AfterInsert,
        HookPoint::BeforeUpdate,
        HookPoint::AfterUpdate,
        HookPoint::BeforeDelete,
        HookPoint::AfterDelete,
        HookPoint::BeforeUpsert,
        HookPoint::AfterUpsert,
    ];

    /// True for the `After*` points, where the statement has already run.
    #[must_use]
    pub const fn is_after(self) -> bool {
        matches!(
            self,
            HookPoint::AfterSelect
                | HookPoint::AfterInsert
                | HookPoint::AfterUpdate
                | HookPoint::AfterDelete
                | HookPoint::AfterUpsert
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            HookPoint::AfterSelect => "after_select",
            HookPoint::BeforeInsert => "before_insert",
            HookPoint::AfterInsert => "after_insert",
            HookPoint::BeforeUpdate => "before_update",
            HookPoint::AfterUpdate => "after_update",
            HookPoint::BeforeDelete => "before_delete",
            HookPoint::AfterDelete => "after_delete",
            HookPoint::BeforeUpsert => "before_upsert",
            HookPoint::AfterUpsert => "after_upsert",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hook returned an error.
#[derive(Debug, ThisError)]
#[error("rowbind: {point} hook failed for {table}: {source}")]
pub struct HookError {
    pub point: HookPoint,
    pub table: &'static str,
    #[source]
    pub source: BoxError,
}
