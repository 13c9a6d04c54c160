//! Filtered reads.
//!
//! A [`Finder`] is a list of equality and IN filters over one entity, not a
//! query planner. Soft-deleted rows are excluded unless
//! [`Finder::with_deleted`] is called, and every record it returns has been
//! through the entity's `AfterSelect` hooks.

use std::marker::PhantomData;

use rowbind_core::{ConfigErrorKind, Entity, Error, Executor, Result, Value};
use rowbind_query::{Delete, Predicate, Projection, Renderer, Select, Update};

use crate::ops::{check_column, soft_filter, truthy};
use crate::registry::Registry;

/// Builder for reads (and scoped writes) over `E`.
#[must_use]
pub struct Finder<'r, E> {
    registry: &'r Registry,
    filter: Vec<Predicate>,
    args: Vec<Value>,
    with_deleted: bool,
    limit: Option<u64>,
    _entity: PhantomData<fn() -> E>,
}

impl Registry {
    /// Start a filtered read over `E`.
    pub fn finder<E: Entity>(&self) -> Finder<'_, E> {
        Finder {
            registry: self,
            filter: Vec::new(),
            args: Vec::new(),
            with_deleted: false,
            limit: None,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Finder<'_, E> {
    /// Keep rows where `column` equals `value`. A NULL value matches NULL.
    pub fn filter_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if value.is_null() {
            self.filter.push(Predicate::is_null(column));
        } else {
            self.filter.push(Predicate::eq(column));
            self.args.push(value);
        }
        self
    }

    /// Keep rows where `column` is one of `values`. An empty list matches
    /// nothing.
    pub fn filter_in<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let before = self.args.len();
        self.args.extend(values.into_iter().map(Into::into));
        self.filter
            .push(Predicate::in_list(column, self.args.len() - before));
        self
    }

    /// Include soft-deleted rows.
    pub fn with_deleted(mut self) -> Self {
        self.with_deleted = true;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The first matching record, or [`rowbind_core::Error::NotFound`].
    pub fn one<X: Executor>(mut self, exec: &X) -> Result<E> {
        self.limit = Some(1);
        let select = self.select(Projection::All)?;
        self.registry
            .select::<E, X>(exec, &select, &self.args)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(E::table()))
    }

    /// Every matching record.
    pub fn all<X: Executor>(self, exec: &X) -> Result<Vec<E>> {
        let select = self.select(Projection::All)?;
        self.registry.select::<E, X>(exec, &select, &self.args)
    }

    /// Number of matching rows.
    pub fn count<X: Executor>(self, exec: &X) -> Result<u64> {
        let select = self.select(Projection::Count)?;
        let scalar = self.scalar(exec, "count", &select)?;
        scalar
            .as_ref()
            .and_then(Value::as_i64)
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| {
                Error::config(
                    ConfigErrorKind::TypeMismatch,
                    format!("count over {} returned {scalar:?}", E::table()),
                )
            })
    }

    /// Whether any row matches.
    pub fn exists<X: Executor>(self, exec: &X) -> Result<bool> {
        let select = self.select(Projection::Exists)?;
        Ok(self
            .scalar(exec, "check if exists", &select)?
            .as_ref()
            .is_some_and(truthy))
    }

    /// Delete every matching row with one statement.
    ///
    /// On a soft-delete entity a non-`hard` delete stamps the deleted-at
    /// column of every matching row with one shared timestamp. No hooks run,
    /// since no records are loaded.
    pub fn delete<X: Executor>(self, exec: &X, hard: bool) -> Result<u64> {
        self.reject_limit("delete")?;
        let desc = E::descriptor();
        let select = self.select(Projection::All)?;
        let dialect = self.registry.dialect();
        match desc.deleted_at.filter(|_| !hard) {
            None => {
                let sql = dialect.render_delete(&Delete {
                    table: desc.table,
                    filter: select.filter,
                });
                self.registry
                    .execute(exec, "delete all", desc.table, &sql, &self.args)
            }
            Some(deleted_at) => {
                let sql = dialect.render_update(&Update {
                    table: desc.table,
                    set: vec![deleted_at.to_string()],
                    filter: select.filter,
                });
                let args: Vec<Value> = std::iter::once(Value::Timestamp(self.registry.now()))
                    .chain(self.args.iter().cloned())
                    .collect();
                self.registry
                    .execute(exec, "delete all", desc.table, &sql, &args)
            }
        }
    }

    /// Set `columns` on every matching row with one statement.
    ///
    /// Values bind in the order given, ahead of the filter arguments. No
    /// hooks run and no timestamps are stamped.
    pub fn update_all<X: Executor>(self, exec: &X, columns: &[(&str, Value)]) -> Result<u64> {
        self.reject_limit("update")?;
        let desc = E::descriptor();
        if columns.is_empty() {
            return Err(Error::config(
                ConfigErrorKind::EmptyWriteList,
                format!("update all on {} has no columns to set", desc.table),
            ));
        }
        for (column, _) in columns {
            check_column(desc, column)?;
        }
        let select = self.select(Projection::All)?;
        let sql = self.registry.dialect().render_update(&Update {
            table: desc.table,
            set: columns.iter().map(|(c, _)| (*c).to_string()).collect(),
            filter: select.filter,
        });
        let args: Vec<Value> = columns
            .iter()
            .map(|(_, v)| v.clone())
            .chain(self.args.iter().cloned())
            .collect();
        self.registry
            .execute(exec, "update all", desc.table, &sql, &args)
    }

    fn reject_limit(&self, operation: &str) -> Result<()> {
        match self.limit {
            Some(_) => Err(Error::config(
                ConfigErrorKind::Unsupported,
                format!("limit is not supported on {operation}"),
            )),
            None => Ok(()),
        }
    }

    fn select(&self, projection: Projection) -> Result<Select> {
        self.registry.state::<E>()?;
        let desc = E::descriptor();
        for predicate in &self.filter {
            match predicate {
                Predicate::Eq(c) | Predicate::IsNull(c) | Predicate::In { column: c, .. } => {
                    check_column(desc, c)?;
                }
                Predicate::KeyRows { .. } => {}
            }
        }

        let mut select = Select::from(desc.table)
            .projection(projection)
            .filters(self.filter.iter().cloned());
        if !self.with_deleted {
            select = select.filters(soft_filter(desc));
        }
        if let Some(limit) = self.limit {
            select = select.limit(limit);
        }
        Ok(select)
    }

    fn scalar<X: Executor>(&self, exec: &X, operation: &'static str, select: &Select) -> Result<Option<Value>> {
        let sql = self.registry.dialect().render_select(select);
        let rows = self
            .registry
            .query(exec, operation, select.table, &sql, &self.args)?;
        Ok(rows.into_iter().next().and_then(|r| r.into_pairs().next()).map(|(_, v)| v))
    }
}
