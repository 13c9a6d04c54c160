//! Statement cache.
//!
//! Rendering a statement and resolving its bind mapping depend only on the
//! *shape* of a call (policy, populated defaults, conflict target), never on
//! the values being written. Each entity keeps one [`QueryCache`] per write
//! kind, keyed by that shape.
//!
//! Entries are append-only. A miss builds outside the lock and then inserts;
//! two threads missing on the same key may both build, and the first insert
//! wins. Content is deterministic, so the loser's work is merely wasted.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use rowbind_core::{BindMapping, Result};
use rowbind_query::ColumnSet;

/// Which write a cache serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Insert,
    Update,
    Upsert,
}

impl CacheKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CacheKind::Insert => "insert",
            CacheKind::Update => "update",
            CacheKind::Upsert => "upsert",
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural description of a call shape.
///
/// Column lists are kept as lists, so `["ab", "c"]` and `["a", "bc"]` are
/// different keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Insert policy (or the update policy, for plain updates).
    pub columns: ColumnSet,
    /// Default-bearing columns the record populated.
    pub non_zero_defaults: Vec<String>,
    /// Upsert conflict target as supplied by the caller.
    pub conflict: Vec<String>,
    /// Upsert update policy.
    pub update: Option<ColumnSet>,
    pub update_on_conflict: bool,
}

impl CacheKey {
    #[must_use]
    pub fn insert(columns: ColumnSet, non_zero_defaults: Vec<String>) -> Self {
        Self {
            columns,
            non_zero_defaults,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn update(columns: ColumnSet) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }
}

/// A rendered statement and the bind mappings that go with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub sql: String,
    /// Fields bound to the value placeholders, in placeholder order.
    pub value_binds: BindMapping,
    /// Fields receiving the RETURNING columns, in column order.
    pub return_binds: BindMapping,
}

/// Append-only map from call shape to rendered statement.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<CacheKey, Arc<CacheEntry>>>,
}

impl QueryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look `key` up, building and inserting an entry on a miss.
    ///
    /// `build` runs without any lock held. If it fails nothing is inserted.
    pub fn get_or_build<F>(&self, kind: CacheKind, key: &CacheKey, build: F) -> Result<Arc<CacheEntry>>
    where
        F: FnOnce() -> Result<CacheEntry>,
    {
        if let Some(entry) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Ok(Arc::clone(entry));
        }

        let built = Arc::new(build()?);
        tracing::debug!(kind = kind.as_str(), sql = %built.sql, "query cache miss");

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(entries.entry(key.clone()).or_insert(built)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
