//! Static per-table metadata.
//!
//! An [`EntityDescriptor`] is emitted once per record type by the code
//! generator and never changes afterwards. Everything the engine needs to
//! decide which columns participate in a statement comes from here.

use crate::error::{ConfigErrorKind, Error, Result};
use crate::identifiers::is_valid_identifier;

/// Immutable column metadata for one table.
///
/// Built with `const` builder methods so generated code can declare it as a
/// `static`:
///
/// ```
/// use rowbind_core::EntityDescriptor;
///
/// static PILOTS: EntityDescriptor = EntityDescriptor::new("pilots")
///     .columns(&["id", "name", "rank", "created_at"])
///     .with_default(&["id", "rank", "created_at"])
///     .without_default(&["name"])
///     .primary_key(&["id"])
///     .created_at("created_at");
///
/// assert!(PILOTS.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescriptor {
    /// Table name.
    pub table: &'static str,
    /// Every column, in declaration order.
    pub all_columns: &'static [&'static str],
    /// Columns with a database-side default.
    pub columns_with_default: &'static [&'static str],
    /// Columns the caller must always supply.
    pub columns_without_default: &'static [&'static str],
    /// Primary-key columns.
    pub primary_key_columns: &'static [&'static str],
    /// Columns computed by the database; never written by inference.
    pub generated_columns: &'static [&'static str],
    /// Creation timestamp column, if the table tracks one.
    pub created_at: Option<&'static str>,
    /// Modification timestamp column, if the table tracks one.
    pub updated_at: Option<&'static str>,
    /// Nullable soft-delete timestamp column. `Some` means the table supports soft delete.
    pub deleted_at: Option<&'static str>,
}

impl EntityDescriptor {
    /// Start a descriptor for `table` with no columns.
    #[must_use]
    pub const fn new(table: &'static str) -> Self {
        Self {
            table,
            all_columns: &[],
            columns_with_default: &[],
            columns_without_default: &[],
            primary_key_columns: &[],
            generated_columns: &[],
            created_at: None,
            updated_at: None,
            deleted_at: None,
        }
    }

    #[must_use]
    pub const fn columns(mut self, columns: &'static [&'static str]) -> Self {
        self.all_columns = columns;
        self
    }

    #[must_use]
    pub const fn with_default(mut self, columns: &'static [&'static str]) -> Self {
        self.columns_with_default = columns;
        self
    }

    #[must_use]
    pub const fn without_default(mut self, columns: &'static [&'static str]) -> Self {
        self.columns_without_default = columns;
        self
    }

    #[must_use]
    pub const fn primary_key(mut self, columns: &'static [&'static str]) -> Self {
        self.primary_key_columns = columns;
        self
    }

    #[must_use]
    pub const fn generated(mut self, columns: &'static [&'static str]) -> Self {
        self.generated_columns = columns;
        self
    }

    #[must_use]
    pub const fn created_at(mut self, column: &'static str) -> Self {
        self.created_at = Some(column);
        self
    }

    #[must_use]
    pub const fn updated_at(mut self, column: &'static str) -> Self {
        self.updated_at = Some(column);
        self
    }

    /// Mark the table as soft-deletable through `column`.
    #[must_use]
    pub const fn soft_delete(mut self, column: &'static str) -> Self {
        self.deleted_at = Some(column);
        self
    }

    /// True if the table supports soft delete.
    #[must_use]
    pub const fn is_soft_delete(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// True if `column` belongs to the table.
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.all_columns.contains(&column)
    }

    /// Check the descriptor's invariants.
    ///
    /// - every identifier is a plain SQL identifier;
    /// - no duplicate columns;
    /// - `columns_with_default` and `columns_without_default` are disjoint and
    ///   together equal `all_columns`;
    /// - the primary key is non-empty and a subset of `all_columns`;
    /// - generated, timestamp and soft-delete columns exist.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| {
            Err(Error::config(
                ConfigErrorKind::InvalidDescriptor,
                format!("{}: {msg}", self.table),
            ))
        };

        if !is_valid_identifier(self.table) {
            return fail("table name is not a valid identifier".to_string());
        }
        for (i, col) in self.all_columns.iter().enumerate() {
            if !is_valid_identifier(col) {
                return fail(format!("column {col:?} is not a valid identifier"));
            }
            if self.all_columns[..i].contains(col) {
                return fail(format!("column {col} is declared twice"));
            }
        }

        for col in self.columns_with_default {
            if self.columns_without_default.contains(col) {
                return fail(format!("column {col} both has and lacks a default"));
            }
        }
        let partitioned = self.columns_with_default.len() + self.columns_without_default.len();
        let covered = self
            .columns_with_default
            .iter()
            .chain(self.columns_without_default)
            .all(|c| self.has_column(c));
        if partitioned != self.all_columns.len() || !covered {
            return fail("default/non-default columns do not partition all columns".to_string());
        }

        if self.primary_key_columns.is_empty() {
            return fail("no primary key".to_string());
        }
        let named = self
            .primary_key_columns
            .iter()
            .chain(self.generated_columns)
            .copied()
            .chain(self.created_at)
            .chain(self.updated_at)
            .chain(self.deleted_at);
        for col in named {
            if !self.has_column(col) {
                return fail(format!("column {col} is not declared"));
            }
        }
        Ok(())
    }
}
