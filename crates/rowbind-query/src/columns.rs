//! Column set policies and their resolution.
//!
//! A [`ColumnSet`] tells a write operation which columns to send. Resolution
//! combines the policy with the entity descriptor and, for inference, with the
//! set of default-bearing columns the caller actually populated.

use rowbind_core::{ConfigErrorKind, Entity, EntityDescriptor, Error, Result};
use serde::{Deserialize, Serialize};

/// Which columns participate in a write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "columns", rename_all = "lowercase")]
pub enum ColumnSet {
    /// Write every column without a default, plus every default-bearing column
    /// holding a non-zero value; read the remaining defaults back.
    ///
    /// Inference cannot tell "left at default" apart from "explicitly set to
    /// the zero value": both look like the zero value. To write an explicit
    /// zero (`0`, `false`, `""`) into a default-bearing column, use
    /// [`ColumnSet::Whitelist`] or [`ColumnSet::Greylist`].
    #[default]
    Infer,
    /// Write exactly these columns.
    Whitelist(Vec<String>),
    /// Write every column except these.
    Blacklist(Vec<String>),
    /// Infer, but always write these columns too.
    Greylist(Vec<String>),
}

impl ColumnSet {
    #[must_use]
    pub fn infer() -> Self {
        ColumnSet::Infer
    }

    pub fn whitelist<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnSet::Whitelist(columns.into_iter().map(Into::into).collect())
    }

    pub fn blacklist<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnSet::Blacklist(columns.into_iter().map(Into::into).collect())
    }

    pub fn greylist<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnSet::Greylist(columns.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub const fn is_whitelist(&self) -> bool {
        matches!(self, ColumnSet::Whitelist(_))
    }

    fn listed(&self) -> &[String] {
        match self {
            ColumnSet::Infer => &[],
            ColumnSet::Whitelist(c) | ColumnSet::Blacklist(c) | ColumnSet::Greylist(c) => c,
        }
    }

    /// Resolve the columns for an INSERT.
    ///
    /// `non_zero_defaults` are the default-bearing columns the record holds a
    /// non-zero value for (see [`non_zero_defaults`]).
    #[must_use]
    pub fn insert_columns(
        &self,
        descriptor: &EntityDescriptor,
        non_zero_defaults: &[String],
    ) -> ResolvedColumns {
        let is_generated = |c: &str| descriptor.generated_columns.contains(&c);
        let inferred = |c: &str| {
            descriptor.columns_without_default.contains(&c)
                || non_zero_defaults.iter().any(|nz| nz == c)
        };

        let write: Vec<String> = match self {
            ColumnSet::Whitelist(cols) => return ResolvedColumns::write_only(cols.clone()),
            ColumnSet::Blacklist(excluded) => {
                let write = descriptor
                    .all_columns
                    .iter()
                    .filter(|c| !excluded.iter().any(|e| e == *c) && !is_generated(**c))
                    .map(|c| (*c).to_string())
                    .collect();
                return ResolvedColumns::write_only(write);
            }
            ColumnSet::Infer => descriptor
                .all_columns
                .iter()
                .filter(|c| inferred(**c) && !is_generated(**c))
                .map(|c| (*c).to_string())
                .collect(),
            ColumnSet::Greylist(always) => descriptor
                .all_columns
                .iter()
                .filter(|c| (inferred(**c) || always.iter().any(|a| a == *c)) && !is_generated(**c))
                .map(|c| (*c).to_string())
                .collect(),
        };

        let returning = descriptor
            .columns_with_default
            .iter()
            .filter(|c| !write.iter().any(|w| w == *c))
            .map(|c| (*c).to_string())
            .collect();

        ResolvedColumns { write, returning }
    }

    /// Resolve the SET columns for an UPDATE.
    ///
    /// Primary-key columns are always removed. Unless the policy is a
    /// whitelist, generated columns and the creation-timestamp column are
    /// removed as well. An empty result is a configuration error.
    pub fn update_columns(&self, descriptor: &EntityDescriptor) -> Result<Vec<String>> {
        let pk = descriptor.primary_key_columns;
        let keep = |c: &str| {
            !pk.contains(&c)
                && !descriptor.generated_columns.contains(&c)
                && descriptor.created_at != Some(c)
        };

        let set: Vec<String> = match self {
            ColumnSet::Whitelist(cols) => cols
                .iter()
                .filter(|c| !pk.contains(&c.as_str()))
                .cloned()
                .collect(),
            ColumnSet::Blacklist(excluded) => descriptor
                .all_columns
                .iter()
                .filter(|c| keep(**c) && !excluded.iter().any(|e| e == *c))
                .map(|c| (*c).to_string())
                .collect(),
            ColumnSet::Infer | ColumnSet::Greylist(_) => descriptor
                .all_columns
                .iter()
                .filter(|c| keep(**c))
                .map(|c| (*c).to_string())
                .collect(),
        };

        if set.is_empty() {
            return Err(Error::config(
                ConfigErrorKind::EmptyWriteList,
                format!(
                    "unable to update {}, could not build column list from {:?}",
                    descriptor.table,
                    self.listed()
                ),
            ));
        }
        Ok(set)
    }
}

/// Outcome of resolving a column set for an insert-like statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedColumns {
    /// Columns whose values are sent.
    pub write: Vec<String>,
    /// Default-bearing columns read back after the write.
    pub returning: Vec<String>,
}

impl ResolvedColumns {
    fn write_only(write: Vec<String>) -> Self {
        Self {
            write,
            returning: Vec::new(),
        }
    }
}

/// Default-bearing columns of `record` that hold a non-zero value.
///
/// Returned in descriptor order, so two records populating the same columns
/// always produce the same list.
pub fn non_zero_defaults<E: Entity>(record: &E) -> Result<Vec<String>> {
    let descriptor = E::descriptor();
    let mut out = Vec::new();
    for column in descriptor
        .all_columns
        .iter()
        .filter(|c| descriptor.columns_with_default.contains(*c))
    {
        if !record.column_value(column)?.is_zero() {
            out.push((*column).to_string());
        }
    }
    Ok(out)
}
